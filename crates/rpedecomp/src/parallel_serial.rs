//! Implements the "serial" backend for running work-groups

use log::trace;
use rpedecomp_nostd_internal::{
    Executor, GridParam, RpeColumnView, SegmentReport, UnsignedWord, validate_grid,
};

/// Runs every work-group, one after another, on the calling thread
///
/// Within a work-group, the lane-groups are also run one after another, in
/// order of their index. This is the reference that other backends are
/// compared against.
pub struct SerialExecutor;

impl Executor for SerialExecutor {
    fn drive_decompress<I, P, V, const RELATIVE: bool, const W: usize>(
        &mut self,
        column: &RpeColumnView<I, P, V, RELATIVE>,
        grid: &GridParam,
        decompressed: &mut [V],
    ) -> Result<SegmentReport, &'static str>
    where
        I: UnsignedWord,
        P: UnsignedWord,
        V: UnsignedWord,
    {
        validate_grid::<I, P, V, RELATIVE, W>(column, grid, decompressed.len())?;

        let mut report = SegmentReport::default();
        for (segment_index, segment_output) in decompressed
            .chunks_mut(column.anchoring_period())
            .enumerate()
        {
            trace!(
                "work-group {segment_index}: decompressing {} values",
                segment_output.len()
            );
            report += column.decompress_work_group::<W>(
                segment_index,
                grid.work_group_size,
                segment_output,
            );
        }
        Ok(report)
    }
}
