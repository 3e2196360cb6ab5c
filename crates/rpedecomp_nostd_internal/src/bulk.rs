//! Bulk memory transformations, carried out collectively by a lane-group
//!
//! Each of these walks a linear index space in strides of the lane-group
//! width, so that consecutive lanes touch consecutive addresses (on a GPU,
//! this makes the accesses coalesced). Lanes whose index runs past the end of
//! the range simply sit the final stride out.

use crate::parallel::LaneGroup;
use crate::reduce_utils::ReductionOp;
use bytemuck::Pod;
use num_traits::AsPrimitive;

/// The register-width unit of a single memory write
pub type NativeWord = u32;

pub const NATIVE_WORD_SIZE: usize = core::mem::size_of::<NativeWord>();

/// Describes how a range of `T` elements decomposes into packed writes of a
/// [`NativeWord`] plus a remainder ("slack") of single-element writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteSlack {
    /// the number of elements packed into one write (1 when `T` is at least
    /// as wide as a native word, or doesn't evenly divide it)
    pub packing_factor: usize,
    pub full_writes: usize,
    pub slack_elements: usize,
}

impl WriteSlack {
    pub const fn packing_factor_for_size(element_size: usize) -> usize {
        if element_size > 0 && element_size < NATIVE_WORD_SIZE && NATIVE_WORD_SIZE % element_size == 0 {
            NATIVE_WORD_SIZE / element_size
        } else {
            1
        }
    }

    pub const fn of<T>(n_elements: usize) -> Self {
        let packing_factor = Self::packing_factor_for_size(core::mem::size_of::<T>());
        WriteSlack {
            packing_factor,
            full_writes: n_elements / packing_factor,
            slack_elements: n_elements % packing_factor,
        }
    }
}

impl<const W: usize> LaneGroup<W> {
    /// calls `f` for each index in `0..length`, one lane-stride at a time
    #[inline(always)]
    fn for_each_at_lane_stride(&self, length: usize, mut f: impl FnMut(usize)) {
        let mut base = 0;
        while base < length {
            for lane in 0..W.min(length - base) {
                f(base + lane);
            }
            base += W;
        }
    }

    /// `destination[i] = source[i] as D` for every element of `source`
    pub fn cast_and_copy<S, D>(&self, source: &[S], destination: &mut [D])
    where
        S: AsPrimitive<D>,
        D: Copy + 'static,
    {
        let destination = &mut destination[..source.len()];
        self.for_each_at_lane_stride(source.len(), |i| destination[i] = source[i].as_());
    }

    /// Copies the first `length` elements of `source` into `destination`.
    ///
    /// When `T` evenly divides a [`NativeWord`], each lane moves a whole
    /// word's worth of elements per write. The leftover elements are then
    /// written one at a time: by a single lane when the packing factor is 2
    /// (there can be at most one), otherwise by the lanes with an index below
    /// the number of leftover elements.
    pub fn copy_n<T: Pod>(&self, source: &[T], length: usize, destination: &mut [T]) -> WriteSlack {
        let source = &source[..length];
        let destination = &mut destination[..length];
        let layout = WriteSlack::of::<T>(length);
        let packing_factor = layout.packing_factor;

        if packing_factor == 1 {
            self.for_each_at_lane_stride(length, |i| destination[i] = source[i]);
            return layout;
        }

        self.for_each_at_lane_stride(layout.full_writes, |write| {
            let elements = write * packing_factor..(write + 1) * packing_factor;
            let word: NativeWord =
                bytemuck::pod_read_unaligned(bytemuck::cast_slice(&source[elements.clone()]));
            bytemuck::cast_slice_mut::<T, u8>(&mut destination[elements])
                .copy_from_slice(bytemuck::bytes_of(&word));
        });

        let first_slack = layout.full_writes * packing_factor;
        if packing_factor == 2 {
            if layout.slack_elements == 1 {
                destination[first_slack] = source[first_slack];
            }
        } else {
            self.for_each_at_lane_stride(layout.slack_elements, |i| {
                destination[first_slack + i] = source[first_slack + i];
            });
        }
        layout
    }

    pub fn copy<T: Pod>(&self, source: &[T], destination: &mut [T]) -> WriteSlack {
        self.copy_n(source, source.len(), destination)
    }

    pub fn fill_n<T: Copy>(&self, destination: &mut [T], length: usize, value: T) {
        let destination = &mut destination[..length];
        self.for_each_at_lane_stride(length, |i| destination[i] = value);
    }

    pub fn fill<T: Copy>(&self, destination: &mut [T], value: T) {
        let length = destination.len();
        self.fill_n(destination, length, value);
    }

    /// gather: `destination[i] = source[indices[i]]`
    pub fn lookup<T, I>(&self, destination: &mut [T], source: &[T], indices: &[I])
    where
        T: Copy,
        I: AsPrimitive<usize>,
    {
        let destination = &mut destination[..indices.len()];
        self.for_each_at_lane_stride(indices.len(), |i| {
            destination[i] = source[indices[i].as_()];
        });
    }

    /// `destination[i] = op(destination[i], source[i])`
    pub fn elementwise_accumulate<T: Copy, Op: ReductionOp<T>>(
        &self,
        op: &Op,
        destination: &mut [T],
        source: &[T],
    ) {
        let destination = &mut destination[..source.len()];
        self.for_each_at_lane_stride(source.len(), |i| {
            destination[i] = op.combine(destination[i], source[i]);
        });
    }

    /// `destination[i] = op(destination[i], value)` for every element
    pub fn elementwise_accumulate_scalar<T: Copy, Op: ReductionOp<T>>(
        &self,
        op: &Op,
        destination: &mut [T],
        value: T,
    ) {
        let length = destination.len();
        self.for_each_at_lane_stride(length, |i| {
            destination[i] = op.combine(destination[i], value);
        });
    }
}
