//! Decompression of Run-Position Encoded (RPE) columns
//!
//! A column of `uncompressed_length` values is stored as a table of runs
//! (each run is a value plus the position where it starts) and a table of
//! position anchors. The output is divided into segments of
//! `anchoring_period` positions (the last segment may be shorter) and
//! `position_anchors[g]` is the index of the run that covers the first
//! position of segment `g`.
//!
//! Run start positions are stored in one of 2 forms, selected by the
//! `RELATIVE` parameter:
//! - absolute: the position in the uncompressed column
//! - relative: the offset from the start of the segment in which the run
//!   starts (i.e. `start % anchoring_period`)
//!
//! Each segment is decompressed by one work-group. The lane-groups of a
//! work-group interleave over the segment's packed writes (write `w` belongs
//! to lane-group `(w % work_group_size) / W`), and each lane-group keeps track
//! of the lowest run that can still be relevant to its next write. Because
//! the output positions a lane-group visits only increase, the run table is
//! only ever scanned forward.

use crate::bulk::{NATIVE_WORD_SIZE, NativeWord, WriteSlack};
use crate::misc::UnsignedWord;
use crate::parallel::{LaneGroup, LaneMask};
use core::ops::{Add, AddAssign};

/// Where one segment's runs and output positions live
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SegmentDescriptor {
    pub first_run_index: usize,
    /// the number of runs that overlap the segment
    pub num_runs: usize,
    pub uncompressed_start_position: usize,
    pub decompressed_length: usize,
}

/// Tallies the work done by one or more calls to the decompression kernels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SegmentReport {
    pub positions_written: usize,
    pub run_position_reads: usize,
}

impl Add for SegmentReport {
    type Output = SegmentReport;

    fn add(self, rhs: SegmentReport) -> SegmentReport {
        SegmentReport {
            positions_written: self.positions_written + rhs.positions_written,
            run_position_reads: self.run_position_reads + rhs.run_position_reads,
        }
    }
}

impl AddAssign for SegmentReport {
    fn add_assign(&mut self, rhs: SegmentReport) {
        *self = *self + rhs;
    }
}

/// A read-only view of an RPE-compressed column.
///
/// `I` is the type of the position anchors (run indices), `P` is the type of
/// the run start positions, and `V` is the type of the values.
#[derive(Clone, Copy, Debug)]
pub struct RpeColumnView<'a, I, P, V, const RELATIVE: bool> {
    run_values: &'a [V],
    run_start_positions: &'a [P],
    position_anchors: &'a [I],
    anchoring_period: usize,
    uncompressed_length: usize,
}

impl<'a, I, P, V, const RELATIVE: bool> RpeColumnView<'a, I, P, V, RELATIVE>
where
    I: UnsignedWord,
    P: UnsignedWord,
    V: UnsignedWord,
{
    /// Absolute positions can't be stored in a type that's narrower than the
    /// run indices. Referencing this constant turns a bad combination into a
    /// compile error.
    pub const VALID_WIDTHS: () = assert!(
        core::mem::size_of::<I>().is_power_of_two()
            && core::mem::size_of::<P>().is_power_of_two()
            && (RELATIVE || core::mem::size_of::<P>() >= core::mem::size_of::<I>()),
        "unsupported combination of index and position-offset widths"
    );

    /// This only checks the lengths of the tables. The contents are trusted.
    pub fn new(
        run_values: &'a [V],
        run_start_positions: &'a [P],
        position_anchors: &'a [I],
        anchoring_period: usize,
        uncompressed_length: usize,
    ) -> Result<Self, &'static str> {
        let () = Self::VALID_WIDTHS;
        if anchoring_period == 0 {
            Err("anchoring_period must be positive")
        } else if run_values.len() != run_start_positions.len() {
            Err("run_values and run_start_positions must have the same length")
        } else if position_anchors.len() != uncompressed_length.div_ceil(anchoring_period) {
            Err("there must be one position anchor per anchoring period")
        } else if uncompressed_length > 0 && run_values.is_empty() {
            Err("a non-empty column must have at least one run")
        } else {
            Ok(Self {
                run_values,
                run_start_positions,
                position_anchors,
                anchoring_period,
                uncompressed_length,
            })
        }
    }

    pub fn num_anchors(&self) -> usize {
        self.position_anchors.len()
    }

    pub fn num_element_runs(&self) -> usize {
        self.run_values.len()
    }

    pub fn anchoring_period(&self) -> usize {
        self.anchoring_period
    }

    pub fn uncompressed_length(&self) -> usize {
        self.uncompressed_length
    }

    /// Computes the descriptor of segment `segment_index`.
    ///
    /// Anchors record run indices, not offsets into runs. So, to find out
    /// whether the run named by the next segment's anchor also overlaps this
    /// segment, we need to read that run's start position.
    pub fn resolve_segment(&self, segment_index: usize) -> SegmentDescriptor {
        let uncompressed_start_position = segment_index * self.anchoring_period;
        let first_run_index = self.position_anchors[segment_index].to_usize();
        let is_last = segment_index + 1 == self.num_anchors();

        if is_last {
            SegmentDescriptor {
                first_run_index,
                num_runs: self.num_element_runs() - first_run_index,
                uncompressed_start_position,
                decompressed_length: self.uncompressed_length - uncompressed_start_position,
            }
        } else {
            let next_anchor = self.position_anchors[segment_index + 1].to_usize();
            let next_start = self.run_start_positions[next_anchor];
            let straddles_boundary = if RELATIVE {
                next_anchor == first_run_index || next_start != P::zero()
            } else {
                next_start.to_usize() < uncompressed_start_position + self.anchoring_period
            };
            SegmentDescriptor {
                first_run_index,
                num_runs: next_anchor - first_run_index + usize::from(straddles_boundary),
                uncompressed_start_position,
                decompressed_length: self.anchoring_period,
            }
        }
    }

    /// Starting from `run` (a segment-local run index known to start at or
    /// before `position`), advance to the run that covers the
    /// segment-local `position`.
    #[inline(always)]
    fn find_covering_run(
        &self,
        segment: &SegmentDescriptor,
        mut run: usize,
        position: usize,
        reads: &mut usize,
    ) -> usize {
        let target = if RELATIVE {
            position
        } else {
            segment.uncompressed_start_position + position
        };
        while run + 1 < segment.num_runs {
            *reads += 1;
            let next_start = self.run_start_positions[segment.first_run_index + run + 1].to_usize();
            if next_start > target {
                break;
            }
            run += 1;
        }
        run
    }

    #[inline(always)]
    fn value_of(&self, segment: &SegmentDescriptor, run: usize) -> V {
        self.run_values[segment.first_run_index + run]
    }

    /// The part of the work-group kernel that's executed by lane-group
    /// `lane_group_index`.
    ///
    /// `segment_output` holds exactly the segment's `decompressed_length`
    /// positions. Lanes write `packing_factor` consecutive values per write
    /// (see [`WriteSlack`]); the values left over after the last full write
    /// are written by the lane-group that owns that write.
    pub fn decompress_segment<const W: usize>(
        &self,
        segment: &SegmentDescriptor,
        lane_group_index: usize,
        work_group_size: usize,
        segment_output: &mut [V],
    ) -> SegmentReport {
        debug_assert_eq!(segment_output.len(), segment.decompressed_length);
        debug_assert!(work_group_size > 0 && work_group_size % W == 0);

        let layout = WriteSlack::of::<V>(segment.decompressed_length);
        let packing_factor = layout.packing_factor;
        let mut report = SegmentReport::default();

        let mut first_possible_run_for_next_write = 0_usize;
        // the run found by each lane in the most recent round
        let mut found_runs = [0_usize; W];

        let mut round_start = lane_group_index * W;
        while round_start < layout.full_writes {
            let lanes_in_round = W.min(layout.full_writes - round_start);
            let group = LaneGroup::<W>::with_active_lanes(LaneMask::first_n(lanes_in_round));

            for lane in group.active_lanes_mask() {
                let first_position = (round_start + lane) * packing_factor;
                let mut run = first_possible_run_for_next_write;
                let mut packed = [V::zero(); NATIVE_WORD_SIZE];
                for (offset, slot) in packed[..packing_factor].iter_mut().enumerate() {
                    run = self.find_covering_run(
                        segment,
                        run,
                        first_position + offset,
                        &mut report.run_position_reads,
                    );
                    *slot = self.value_of(segment, run);
                }
                let destination = &mut segment_output[first_position..first_position + packing_factor];
                if packing_factor == 1 {
                    destination[0] = packed[0];
                } else {
                    let word: NativeWord =
                        bytemuck::pod_read_unaligned(bytemuck::cast_slice(&packed[..packing_factor]));
                    bytemuck::cast_slice_mut::<V, u8>(destination).copy_from_slice(bytemuck::bytes_of(&word));
                }
                found_runs[lane] = run;
            }
            report.positions_written += lanes_in_round * packing_factor;

            // the lane that covered the farthest position holds the new bound
            first_possible_run_for_next_write = if group.is_fully_active() {
                group.get_from_last_lane(&found_runs)
            } else {
                let farthest = group.select_leader_lane::<false>(group.active_lanes_mask());
                group.get_from_lane(&found_runs, farthest)
            };
            round_start += work_group_size;
        }

        if layout.slack_elements > 0 {
            let (owner_group, owner_lane) = match layout.full_writes.checked_sub(1) {
                Some(last_write) => {
                    let within_work_group = last_write % work_group_size;
                    (within_work_group / W, within_work_group % W)
                }
                None => (0, 0),
            };
            if owner_group == lane_group_index {
                let group = LaneGroup::<W>::new();
                if layout.full_writes > 0 {
                    first_possible_run_for_next_write = group.get_from_lane(&found_runs, owner_lane);
                }
                report += self.write_slack::<W>(
                    segment,
                    layout,
                    first_possible_run_for_next_write,
                    segment_output,
                );
            }
        }
        report
    }

    /// lanes with an index below the number of slack elements each write a
    /// single value
    fn write_slack<const W: usize>(
        &self,
        segment: &SegmentDescriptor,
        layout: WriteSlack,
        first_possible_run: usize,
        segment_output: &mut [V],
    ) -> SegmentReport {
        let first_slack_position = layout.full_writes * layout.packing_factor;
        let mut report = SegmentReport::default();
        let mut done = 0;
        while done < layout.slack_elements {
            let lanes = W.min(layout.slack_elements - done);
            let group = LaneGroup::<W>::with_active_lanes(LaneMask::first_n(lanes));
            for lane in group.active_lanes_mask() {
                let position = first_slack_position + done + lane;
                let run = self.find_covering_run(
                    segment,
                    first_possible_run,
                    position,
                    &mut report.run_position_reads,
                );
                segment_output[position] = self.value_of(segment, run);
            }
            report.positions_written += lanes;
            done += lanes;
        }
        report
    }

    /// The work-group kernel: decompress segment `segment_index` into
    /// `segment_output` using `work_group_size / W` lane-groups.
    pub fn decompress_work_group<const W: usize>(
        &self,
        segment_index: usize,
        work_group_size: usize,
        segment_output: &mut [V],
    ) -> SegmentReport {
        let () = Self::VALID_WIDTHS;
        let segment = self.resolve_segment(segment_index);
        let mut report = SegmentReport::default();
        for lane_group_index in 0..work_group_size / W {
            report += self.decompress_segment::<W>(
                &segment,
                lane_group_index,
                work_group_size,
                segment_output,
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec;
    use std::vec::Vec;

    /// a minimal encoder, so these tests don't depend on the host crate
    struct Encoded<P> {
        values: Vec<u32>,
        starts: Vec<P>,
        anchors: Vec<u32>,
    }

    fn encode<P: UnsignedWord>(data: &[u32], period: usize, relative: bool) -> Encoded<P> {
        let mut values = Vec::new();
        let mut absolute = Vec::new();
        for (position, value) in data.iter().enumerate() {
            if values.last() != Some(value) {
                values.push(*value);
                absolute.push(position);
            }
        }
        let anchors = (0..data.len().div_ceil(period))
            .map(|k| (absolute.partition_point(|&s| s <= k * period) - 1) as u32)
            .collect();
        let starts = absolute
            .iter()
            .map(|&s| P::from_usize(if relative { s % period } else { s }))
            .collect();
        Encoded {
            values,
            starts,
            anchors,
        }
    }

    fn run_lengths(lengths: &[(usize, u32)]) -> Vec<u32> {
        lengths
            .iter()
            .flat_map(|&(n, value)| core::iter::repeat_n(value, n))
            .collect()
    }

    fn decompress_all<const W: usize, const RELATIVE: bool>(
        column: &RpeColumnView<u32, u32, u32, RELATIVE>,
        work_group_size: usize,
    ) -> (Vec<u32>, SegmentReport) {
        let mut out = vec![u32::MAX; column.uncompressed_length()];
        let mut report = SegmentReport::default();
        for (segment_index, chunk) in out.chunks_mut(column.anchoring_period()).enumerate() {
            report += column.decompress_work_group::<W>(segment_index, work_group_size, chunk);
        }
        (out, report)
    }

    #[test]
    fn run_ending_just_before_boundary() {
        // the run of 7s starts one position before the boundary at 8
        let data = run_lengths(&[(3, 1), (4, 2), (5, 7), (4, 3)]);
        for relative in [false, true] {
            let enc = encode::<u32>(&data, 8, relative);
            assert_eq!(enc.anchors, [0, 2]);
            let check = |descriptors: [SegmentDescriptor; 2]| {
                assert_eq!(descriptors[0].first_run_index, 0);
                assert_eq!(descriptors[0].num_runs, 3);
                assert_eq!(descriptors[1].first_run_index, 2);
                assert_eq!(descriptors[1].num_runs, 2);
                assert_eq!(descriptors[1].uncompressed_start_position, 8);
                assert_eq!(descriptors[1].decompressed_length, 8);
            };
            if relative {
                let view = RpeColumnView::<u32, u32, u32, true>::new(
                    &enc.values, &enc.starts, &enc.anchors, 8, data.len(),
                )
                .unwrap();
                check([view.resolve_segment(0), view.resolve_segment(1)]);
                assert_eq!(decompress_all::<4, true>(&view, 8).0, data);
            } else {
                let view = RpeColumnView::<u32, u32, u32, false>::new(
                    &enc.values, &enc.starts, &enc.anchors, 8, data.len(),
                )
                .unwrap();
                check([view.resolve_segment(0), view.resolve_segment(1)]);
                assert_eq!(decompress_all::<4, false>(&view, 8).0, data);
            }
        }
    }

    #[test]
    fn run_starting_exactly_on_boundary() {
        let data = run_lengths(&[(8, 5), (3, 6), (1, 9)]);
        let enc = encode::<u32>(&data, 8, true);
        assert_eq!(enc.starts, [0, 0, 3]);
        let view =
            RpeColumnView::<u32, u32, u32, true>::new(&enc.values, &enc.starts, &enc.anchors, 8, 12)
                .unwrap();
        assert_eq!(view.resolve_segment(0).num_runs, 1);
        assert_eq!(view.resolve_segment(1).num_runs, 2);
        assert_eq!(view.resolve_segment(1).decompressed_length, 4);
        assert_eq!(decompress_all::<4, true>(&view, 4).0, data);
    }

    #[test]
    fn single_run_spans_several_segments() {
        let data = run_lengths(&[(2, 4), (30, 8), (1, 2)]);
        let enc = encode::<u32>(&data, 5, true);
        let view =
            RpeColumnView::<u32, u32, u32, true>::new(&enc.values, &enc.starts, &enc.anchors, 5, 33)
                .unwrap();
        // segments 1..6 lie entirely inside the long run
        for segment in 1..6 {
            let descriptor = view.resolve_segment(segment);
            assert_eq!((descriptor.first_run_index, descriptor.num_runs), (1, 1));
        }
        assert_eq!(decompress_all::<8, true>(&view, 8).0, data);
    }

    #[test]
    fn every_position_written_once() {
        let data: Vec<u32> = (0..1000).map(|i| (i / 7) as u32 % 13).collect();
        let enc = encode::<u32>(&data, 96, false);
        let view = RpeColumnView::<u32, u32, u32, false>::new(
            &enc.values, &enc.starts, &enc.anchors, 96, data.len(),
        )
        .unwrap();
        for work_group_size in [8, 16, 64] {
            let (out, report) = decompress_all::<8, false>(&view, work_group_size);
            assert_eq!(out, data);
            assert_eq!(report.positions_written, data.len());
        }
    }

    #[test]
    fn narrow_values_with_slack() {
        // u16 values are written 2 per lane, leaving one slack element per
        // segment of odd length
        let data: Vec<u16> = (0..45_u16).map(|i| i / 4).collect();
        let mut values = Vec::new();
        let mut starts = Vec::new();
        for (position, value) in data.iter().enumerate() {
            if values.last() != Some(value) {
                values.push(*value);
                starts.push(position as u64);
            }
        }
        let anchors: Vec<u32> = (0..data.len().div_ceil(9))
            .map(|k| (starts.partition_point(|&s| s <= (k * 9) as u64) - 1) as u32)
            .collect();
        let view = RpeColumnView::<u32, u64, u16, false>::new(&values, &starts, &anchors, 9, 45)
            .unwrap();

        for work_group_size in [4, 8] {
            let mut out = vec![u16::MAX; 45];
            let mut written = 0;
            for (segment_index, chunk) in out.chunks_mut(9).enumerate() {
                let report = view.decompress_work_group::<4>(segment_index, work_group_size, chunk);
                assert_eq!(report.positions_written, 9);
                written += report.positions_written;
            }
            assert_eq!(written, 45);
            assert_eq!(out, data);
        }
    }

    #[test]
    fn segment_without_full_writes() {
        let values = [3_u16];
        let starts = [0_u32];
        let anchors = [0_u32];
        let view = RpeColumnView::<u32, u32, u16, true>::new(&values, &starts, &anchors, 8, 1)
            .unwrap();
        let mut out = [0_u16; 1];
        let report = view.decompress_work_group::<4>(0, 8, &mut out);
        assert_eq!(out, [3]);
        assert_eq!(report.positions_written, 1);
    }

    #[test]
    fn run_table_reads_are_bounded() {
        let data: Vec<u32> = (0..4096).map(|i| (i / 3) as u32).collect();
        let enc = encode::<u32>(&data, 4096, false);
        let view = RpeColumnView::<u32, u32, u32, false>::new(
            &enc.values, &enc.starts, &enc.anchors, 4096, 4096,
        )
        .unwrap();
        let work_group_size = 64;
        let (out, report) = decompress_all::<32, false>(&view, work_group_size);
        assert_eq!(out, data);
        // every lane advances over each run at most once, and each search
        // ends with at most one unsuccessful read
        let num_runs = enc.values.len();
        assert!(report.run_position_reads <= data.len() + work_group_size * num_runs);
        let restart_from_first_run: usize = (0..data.len()).map(|p| p / 3 + 1).sum();
        assert!(10 * report.run_position_reads < restart_from_first_run);
    }

    #[test]
    fn view_rejects_bad_lengths() {
        let values = [1_u32, 2];
        let starts = [0_u32, 3];
        assert!(RpeColumnView::<u32, u32, u32, false>::new(&values, &starts, &[0], 0, 4).is_err());
        assert!(RpeColumnView::<u32, u32, u32, false>::new(&values, &starts[..1], &[0], 4, 4).is_err());
        assert!(RpeColumnView::<u32, u32, u32, false>::new(&values, &starts, &[0], 2, 4).is_err());
        assert!(RpeColumnView::<u32, u32, u32, false>::new(&[], &[], &[0], 2, 2).is_err());
        let view = RpeColumnView::<u32, u32, u32, false>::new(&values, &starts, &[0, 0], 2, 4).unwrap();
        assert_eq!(view.num_anchors(), 2);
        assert_eq!(view.num_element_runs(), 2);
    }
}
