//! Evaluating a predicate over a long index range and packing the results
//! into per-lane-group bitmaps.
//!
//! Bitmap `k` holds the results for indices `k*W .. k*W + W` (bit `i` for
//! index `k*W + i`). The work is organized in batches of `W` consecutive
//! group-wide evaluations: after evaluation `r` of a batch, lane `r` keeps the
//! ballot. Once the batch is done, every lane holds exactly one bitmap and the
//! whole batch is stored with a single coalesced write of `W` bitmaps.

use crate::parallel::{LaneGroup, LaneMask};

/// Describes which remainder-handling paths a call to
/// [`LaneGroup::compute_predicate_at_warp_stride`] may need.
///
/// Callers that know their lengths statically pick the narrowest marker so
/// that the unneeded paths compile away.
pub trait SlackHandling {
    /// the length may leave fewer than `W` full bitmaps after the last batch
    const FULL_GROUPS_OF_SLACK: bool;
    /// the length may not be a multiple of `W`
    const ARBITRARY_SLACK: bool;
}

/// the length is always a multiple of `W * W`
pub struct HasNoSlack;

/// the length is always a multiple of `W`
pub struct MayHaveFullGroupsOfSlack;

pub struct MayHaveArbitrarySlack;

impl SlackHandling for HasNoSlack {
    const FULL_GROUPS_OF_SLACK: bool = false;
    const ARBITRARY_SLACK: bool = false;
}

impl SlackHandling for MayHaveFullGroupsOfSlack {
    const FULL_GROUPS_OF_SLACK: bool = true;
    const ARBITRARY_SLACK: bool = false;
}

impl SlackHandling for MayHaveArbitrarySlack {
    const FULL_GROUPS_OF_SLACK: bool = true;
    const ARBITRARY_SLACK: bool = true;
}

impl<const W: usize> LaneGroup<W> {
    /// Evaluates `predicate` at every index of `0..length`, storing the packed
    /// results in `bitmaps` (which must hold at least `length.div_ceil(W)`
    /// entries).
    ///
    /// Bits of the final bitmap past `length` are left clear.
    pub fn compute_predicate_at_warp_stride<S: SlackHandling>(
        &self,
        length: usize,
        predicate: impl Fn(usize) -> bool,
        bitmaps: &mut [LaneMask],
    ) {
        debug_assert!(S::FULL_GROUPS_OF_SLACK || length % (W * W) == 0);
        debug_assert!(S::ARBITRARY_SLACK || length % W == 0);
        debug_assert!(bitmaps.len() >= length.div_ceil(W));

        let evaluate = |first_index: usize| -> [bool; W] {
            core::array::from_fn(|lane| predicate(first_index + lane))
        };

        let full_batches = length / (W * W);
        for batch in 0..full_batches {
            let batch_start = batch * W * W;
            let mut kept = [LaneMask::EMPTY; W];
            for round in 0..W {
                kept[round] = self.ballot(&evaluate(batch_start + round * W));
            }
            self.copy_n(&kept, W, &mut bitmaps[batch * W..]);
        }

        let mut bitmap_index = full_batches * W;
        if S::FULL_GROUPS_OF_SLACK {
            let full_bitmaps = length / W;
            while bitmap_index < full_bitmaps {
                bitmaps[bitmap_index] = self.ballot(&evaluate(bitmap_index * W));
                bitmap_index += 1;
            }
        }

        if S::ARBITRARY_SLACK {
            let remaining = length % W;
            if remaining > 0 {
                let tail = LaneGroup::<W>::with_active_lanes(LaneMask::first_n(remaining));
                let first_index = bitmap_index * W;
                let predicates: [bool; W] =
                    core::array::from_fn(|lane| lane < remaining && predicate(first_index + lane));
                bitmaps[bitmap_index] = tail.ballot(&predicates);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec;

    fn expected_bitmaps<const W: usize>(length: usize, predicate: impl Fn(usize) -> bool) -> std::vec::Vec<LaneMask> {
        (0..length.div_ceil(W))
            .map(|k| {
                let mut mask = LaneMask::EMPTY;
                for lane in 0..W {
                    let index = k * W + lane;
                    if index < length && predicate(index) {
                        mask = mask.with(lane);
                    }
                }
                mask
            })
            .collect()
    }

    fn is_interesting(index: usize) -> bool {
        index % 3 == 0 || index % 7 == 5
    }

    #[test]
    fn whole_batches_only() {
        let group = LaneGroup::<8>::new();
        let length = 3 * 64;
        let mut bitmaps = vec![LaneMask::EMPTY; length / 8];
        group.compute_predicate_at_warp_stride::<HasNoSlack>(length, is_interesting, &mut bitmaps);
        assert_eq!(bitmaps, expected_bitmaps::<8>(length, is_interesting));
    }

    #[test]
    fn leftover_full_bitmaps() {
        let group = LaneGroup::<4>::new();
        let length = 16 + 12;
        let mut bitmaps = vec![LaneMask::EMPTY; 7];
        group.compute_predicate_at_warp_stride::<MayHaveFullGroupsOfSlack>(
            length,
            is_interesting,
            &mut bitmaps,
        );
        assert_eq!(bitmaps, expected_bitmaps::<4>(length, is_interesting));
    }

    #[test]
    fn arbitrary_tail() {
        let group = LaneGroup::<32>::new();
        for length in [0_usize, 1, 31, 33, 1024 + 70] {
            let mut bitmaps = vec![LaneMask::from_bits(u64::MAX); length.div_ceil(32)];
            group.compute_predicate_at_warp_stride::<MayHaveArbitrarySlack>(
                length,
                |i| i % 2 == 1,
                &mut bitmaps,
            );
            assert_eq!(bitmaps, expected_bitmaps::<32>(length, |i| i % 2 == 1), "length {length}");
        }
    }

    #[test]
    fn predicate_never_sees_out_of_range_indices() {
        let group = LaneGroup::<8>::new();
        let length = 13;
        let mut bitmaps = vec![LaneMask::EMPTY; 2];
        group.compute_predicate_at_warp_stride::<MayHaveArbitrarySlack>(
            length,
            |i| {
                assert!(i < length);
                true
            },
            &mut bitmaps,
        );
        assert_eq!(bitmaps, [LaneMask::first_n(8), LaneMask::first_n(5)]);
    }
}
