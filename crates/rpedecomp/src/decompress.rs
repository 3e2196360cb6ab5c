//! The user-facing entry points
//!
//! A [`Decompressor`] resolves the launch grid for a column and hands the
//! column to an executor. Typed columns go straight to the kernels, while
//! byte-buffer columns go through the [`KernelRegistry`].

use crate::encode::EncodedColumn;
use crate::error::Error;
use crate::launch::{DeviceProperties, KernelArguments, LaunchConfig, launch_config_for};
use crate::parallel_rayon::RayonExecutor;
use crate::parallel_serial::SerialExecutor;
use crate::registry::{KernelRegistry, WidthCombination};
use log::debug;
use rpedecomp_nostd_internal::{Executor, RpeColumnView, SegmentReport, UnsignedWord};

/// Selects the backend that work-groups are executed on
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// work-groups run concurrently on the rayon thread pool
    #[default]
    Parallel,
    /// work-groups run one after another on the calling thread
    Serial,
}

fn drive_with<E, I, P, V, const RELATIVE: bool>(
    executor: &mut E,
    view: &RpeColumnView<I, P, V, RELATIVE>,
    config: &LaunchConfig,
    lane_group_width: usize,
    out: &mut [V],
) -> Result<SegmentReport, Error>
where
    E: Executor,
    I: UnsignedWord,
    P: UnsignedWord,
    V: UnsignedWord,
{
    let grid = config.grid_param();
    let result = match lane_group_width {
        32 => executor.drive_decompress::<I, P, V, RELATIVE, 32>(view, &grid, out),
        64 => executor.drive_decompress::<I, P, V, RELATIVE, 64>(view, &grid, out),
        other => return Err(Error::lane_group_width(other)),
    };
    result.map_err(Error::from)
}

/// Run the work-group kernel over every segment of `view`.
pub(crate) fn run_kernel<I, P, V, const RELATIVE: bool>(
    view: &RpeColumnView<I, P, V, RELATIVE>,
    config: &LaunchConfig,
    lane_group_width: usize,
    mode: ExecutionMode,
    out: &mut [V],
) -> Result<SegmentReport, Error>
where
    I: UnsignedWord,
    P: UnsignedWord,
    V: UnsignedWord,
{
    match mode {
        ExecutionMode::Parallel => drive_with(&mut RayonExecutor, view, config, lane_group_width, out),
        ExecutionMode::Serial => drive_with(&mut SerialExecutor, view, config, lane_group_width, out),
    }
}

/// Configures a [`Decompressor`]
#[derive(Clone, Debug, Default)]
pub struct DecompressorBuilder {
    device: DeviceProperties,
    mode: ExecutionMode,
}

impl DecompressorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device(mut self, device: DeviceProperties) -> Self {
        self.device = device;
        self
    }

    pub fn execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn build(self) -> Result<Decompressor, Error> {
        match self.device.lane_group_width {
            32 | 64 => Ok(Decompressor {
                device: self.device,
                mode: self.mode,
                registry: KernelRegistry::new(),
            }),
            other => Err(Error::lane_group_width(other)),
        }
    }
}

/// Decompresses RPE-compressed columns
pub struct Decompressor {
    device: DeviceProperties,
    mode: ExecutionMode,
    registry: KernelRegistry,
}

impl Decompressor {
    pub fn builder() -> DecompressorBuilder {
        DecompressorBuilder::new()
    }

    pub fn device(&self) -> &DeviceProperties {
        &self.device
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn decompress<I, P, V, const RELATIVE: bool>(
        &self,
        column: &EncodedColumn<I, P, V, RELATIVE>,
    ) -> Result<Vec<V>, Error>
    where
        I: UnsignedWord,
        P: UnsignedWord,
        V: UnsignedWord,
    {
        let mut out = vec![V::zero(); column.uncompressed_length()];
        self.decompress_into(column, &mut out)?;
        Ok(out)
    }

    /// Decompress `column` into `out`, which must hold exactly
    /// `column.uncompressed_length()` values.
    pub fn decompress_into<I, P, V, const RELATIVE: bool>(
        &self,
        column: &EncodedColumn<I, P, V, RELATIVE>,
        out: &mut [V],
    ) -> Result<SegmentReport, Error>
    where
        I: UnsignedWord,
        P: UnsignedWord,
        V: UnsignedWord,
    {
        if out.len() != column.uncompressed_length() {
            return Err(Error::length_mismatch(
                "the output buffer",
                column.uncompressed_length(),
                out.len(),
            ));
        }
        let view = column.view()?;
        let config = launch_config_for(
            &self.device,
            column.uncompressed_length(),
            column.anchoring_period(),
            std::mem::size_of::<V>(),
        )?;
        debug!(
            "decompressing a column with {} runs ({}) using {config:?}",
            column.num_runs(),
            column.width_combination()
        );
        run_kernel(&view, &config, self.device.lane_group_width, self.mode, out)
    }

    /// Decompress a column that only exists as named, type-erased arguments
    /// (see [`KernelRegistry::launch`]).
    pub fn decompress_raw(
        &self,
        widths: &WidthCombination,
        args: &KernelArguments,
        decompressed: &mut [u8],
    ) -> Result<SegmentReport, Error> {
        self.registry
            .launch(widths, &self.device, args, self.mode, decompressed)
    }
}
