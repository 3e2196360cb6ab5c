//! Implements a multi-threaded backend, where work-groups are distributed
//! over the rayon thread pool

use log::trace;
use rayon::prelude::*;
use rpedecomp_nostd_internal::{
    Executor, GridParam, RpeColumnView, SegmentReport, UnsignedWord, validate_grid,
};

/// Runs work-groups concurrently on the global rayon thread pool
///
/// Each work-group receives its own `&mut` chunk of the output (one anchored
/// segment), so work-groups can never write to each other's positions. Each
/// individual work-group is executed exactly as [`crate::SerialExecutor`]
/// executes it, which means that the output is bitwise identical.
pub struct RayonExecutor;

impl Executor for RayonExecutor {
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

        let work_group_size = grid.work_group_size;
        let report = decompressed
            .par_chunks_mut(column.anchoring_period())
            .enumerate()
            .map(|(segment_index, segment_output)| {
                trace!(
                    "work-group {segment_index}: decompressing {} values",
                    segment_output.len()
                );
                column.decompress_work_group::<W>(segment_index, work_group_size, segment_output)
            })
            .reduce(SegmentReport::default, |lhs, rhs| lhs + rhs);
        Ok(report)
    }
}
