use bytemuck::Pod;
use core::fmt::Debug;
use num_traits::{AsPrimitive, PrimInt, Unsigned};

/// The fixed-width unsigned integers that the kernels store indices, position
/// offsets, and values in.
///
/// The kernels are instantiated for a handful of widths (see the registry in
/// the `rpedecomp` crate), so everything here needs to be cheap to convert
/// to and from `usize`.
pub trait UnsignedWord:
    PrimInt + Unsigned + Pod + Default + Debug + Send + Sync + AsPrimitive<usize>
{
    /// truncating conversion (callers are responsible for range checks)
    fn from_usize(value: usize) -> Self;

    #[inline(always)]
    fn to_usize(self) -> usize {
        self.as_()
    }
}

macro_rules! impl_unsigned_word {
    ($($t:ty),*) => {
        $(
            impl UnsignedWord for $t {
                #[inline(always)]
                fn from_usize(value: usize) -> Self {
                    value as $t
                }
            }
        )*
    };
}

impl_unsigned_word!(u8, u16, u32, u64);
