//! A lookup table of pre-instantiated decompression kernels
//!
//! Every supported combination of index, value and position-offset width (and
//! the relative/absolute flag) is monomorphized once, and the resulting
//! launch functions are stored in a table keyed by [`WidthCombination`]. This
//! lets callers that only know the widths at runtime (e.g. when the column
//! arrives as raw byte buffers) pick the right kernel.

use crate::decompress::{ExecutionMode, run_kernel};
use crate::error::Error;
use crate::launch::{DeviceProperties, KernelArguments, LaunchConfig, resolve_launch_config};
use log::{debug, info};
use rpedecomp_nostd_internal::{RpeColumnView, SegmentReport, UnsignedWord};
use std::collections::HashMap;
use std::mem::size_of;

/// The widths (in bytes) that select a kernel variant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WidthCombination {
    pub index_size: usize,
    pub value_size: usize,
    pub offset_size: usize,
    pub positions_are_relative: bool,
}

impl WidthCombination {
    pub fn of<I, P, V, const RELATIVE: bool>() -> Self {
        WidthCombination {
            index_size: size_of::<I>(),
            value_size: size_of::<V>(),
            offset_size: size_of::<P>(),
            positions_are_relative: RELATIVE,
        }
    }
}

impl core::fmt::Display for WidthCombination {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "{}-byte indices, {}-byte values & {}-byte {} position offsets",
            self.index_size,
            self.value_size,
            self.offset_size,
            if self.positions_are_relative {
                "relative"
            } else {
                "absolute"
            }
        )
    }
}

type KernelFn = fn(
    &KernelArguments<'_>,
    &LaunchConfig,
    &DeviceProperties,
    ExecutionMode,
    &mut [u8],
) -> Result<SegmentReport, Error>;

/// Reinterpret the bytes of a buffer argument as a vector of `T`
fn decode_buffer<T: UnsignedWord>(args: &KernelArguments, name: &str) -> Result<Vec<T>, Error> {
    let bytes = args.buffer(name)?;
    if bytes.len() % size_of::<T>() != 0 {
        return Err(Error::kernel_argument(
            name,
            format!(
                "{} bytes isn't a whole number of {}-byte elements",
                bytes.len(),
                size_of::<T>()
            ),
        ));
    }
    Ok(bytemuck::pod_collect_to_vec(bytes))
}

fn check_scalar(args: &KernelArguments, name: &str, actual: usize) -> Result<(), Error> {
    let expected = args.size(name)?;
    if expected != actual {
        return Err(Error::kernel_argument(
            name,
            format!("the value is {expected}, but the buffers imply {actual}"),
        ));
    }
    Ok(())
}

fn launch_variant<I, P, V, const RELATIVE: bool>(
    args: &KernelArguments<'_>,
    config: &LaunchConfig,
    device: &DeviceProperties,
    mode: ExecutionMode,
    decompressed: &mut [u8],
) -> Result<SegmentReport, Error>
where
    I: UnsignedWord,
    P: UnsignedWord,
    V: UnsignedWord,
{
    // the buffers may not be suitably aligned, so we copy them
    let run_values: Vec<V> = decode_buffer(args, "run_data")?;
    let run_start_positions: Vec<P> = decode_buffer(args, "run_start_positions")?;
    let position_anchors: Vec<I> = decode_buffer(args, "position_anchors")?;
    check_scalar(args, "num_anchors", position_anchors.len())?;
    check_scalar(args, "num_element_runs", run_values.len())?;

    let length = args.length()?;
    let view = RpeColumnView::<I, P, V, RELATIVE>::new(
        &run_values,
        &run_start_positions,
        &position_anchors,
        args.size("position_anchoring_period")?,
        length,
    )?;

    let expected_bytes = length * size_of::<V>();
    if decompressed.len() != expected_bytes {
        return Err(Error::length_mismatch(
            "the decompressed buffer (in bytes)",
            expected_bytes,
            decompressed.len(),
        ));
    }
    let mut out = vec![V::zero(); length];
    let report = run_kernel(&view, config, device.lane_group_width, mode, &mut out)?;
    decompressed.copy_from_slice(bytemuck::cast_slice(&out));
    Ok(report)
}

// Absolute position offsets must be at least as wide as the indices, so
// those variants are listed separately (instantiating a narrower one would
// fail to compile).
macro_rules! register_kernels {
    ($kernels:ident, $relative:tt: $(($index:ty, $offset:ty)),+) => {
        $(
            register_kernels!(@values $kernels, $relative, $index, $offset, u16, u32, u64);
        )+
    };
    (@values $kernels:ident, $relative:tt, $index:ty, $offset:ty, $($value:ty),+) => {
        $(
            $kernels.insert(
                WidthCombination::of::<$index, $offset, $value, $relative>(),
                launch_variant::<$index, $offset, $value, $relative> as KernelFn,
            );
        )+
    };
}

pub struct KernelRegistry {
    kernels: HashMap<WidthCombination, KernelFn>,
}

impl Default for KernelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelRegistry {
    pub fn new() -> Self {
        let mut kernels = HashMap::new();
        register_kernels!(kernels, true: (u32, u32), (u32, u64), (u64, u32), (u64, u64));
        register_kernels!(kernels, false: (u32, u32), (u32, u64), (u64, u64));
        info!("registered {} decompression kernels", kernels.len());
        KernelRegistry { kernels }
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    pub fn contains(&self, widths: &WidthCombination) -> bool {
        self.kernels.contains_key(widths)
    }

    /// Decompress the column described by `args` into `decompressed` (the
    /// raw bytes of `length` values) with the kernel registered for
    /// `widths`.
    ///
    /// `args` must hold the buffers `run_data`, `run_start_positions` &
    /// `position_anchors`, the sizes `position_anchoring_period`,
    /// `num_anchors`, `num_element_runs` & `length` (or
    /// `length_in_elements`), and the flag `positions_are_relative`.
    pub fn launch(
        &self,
        widths: &WidthCombination,
        device: &DeviceProperties,
        args: &KernelArguments,
        mode: ExecutionMode,
        decompressed: &mut [u8],
    ) -> Result<SegmentReport, Error> {
        let kernel = self
            .kernels
            .get(widths)
            .ok_or_else(|| Error::unsupported_widths(widths.to_string()))?;
        if args.flag("positions_are_relative")? != widths.positions_are_relative {
            return Err(Error::kernel_argument(
                "positions_are_relative",
                "the flag doesn't match the requested kernel variant",
            ));
        }
        let config = resolve_launch_config(device, args, widths.value_size)?;
        debug!("dispatching the kernel for {widths} ({mode:?}) with {config:?}");
        kernel(args, &config, device, mode, decompressed)
    }
}
