//! Our parallelism abstractions use the concepts of lane-groups & work-groups
//!
//! When we decompose a decompression into pieces or "units of work":
//! - a unit of work (one anchored segment of the output) is assigned to a
//!   work-group
//! - a work-group is composed of 1 or more lane-groups. The lanes of a
//!   lane-group work together in a tightly-coupled, lockstep manner and can
//!   exchange values with each other without going through memory.
//!
//! This abstraction nicely maps to hardware:
//! - on GPUs, a lane-group corresponds to a Warp (aka a WaveFront) and each
//!   lane corresponds to a thread of that Warp
//! - on CPUs, a lane-group can be driven by a single thread, where each lane
//!   corresponds to a SIMD vector lane or simply to one iteration of a loop
//!
//! # Explicit lane state
//! On a GPU, the values held by the lanes of a Warp live in registers, and the
//! set of lanes that are still executing is tracked by the hardware. Here, we
//! make both explicit:
//! - the values held by the lanes of a group are passed around as `[T; W]`
//!   (entry `i` is the value held by lane `i`)
//! - the set of lanes that are still executing is tracked by the
//!   [`LaneMask`] stored inside of a [`LaneGroup`]
//!
//! Every collective operation is a pure function of these 2 things. This lets
//! a serial implementation reproduce the results of a lockstep implementation
//! exactly.
//!
//! <div class="warning">
//!
//! Calling a collective operation on a group whose active mask doesn't
//! reflect the lanes that have actually diverged away produces silently wrong
//! aggregate results. Construct the group for each round with
//! [`LaneGroup::with_active_lanes`].
//!
//! </div>

use crate::misc::UnsignedWord;
use crate::rpe::{RpeColumnView, SegmentReport};
use bytemuck::{Pod, Zeroable};
use core::ops::{BitAnd, BitOr};
use core::sync::atomic::{AtomicUsize, Ordering};

/// The lane-group width of the reference hardware
pub const LANE_GROUP_WIDTH: usize = 32;

/// A set of lanes, represented as a bitmask (bit `i` corresponds to lane `i`)
///
/// This is the result type of a ballot. A lane-group can hold at most 64
/// lanes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct LaneMask(u64);

impl LaneMask {
    pub const EMPTY: LaneMask = LaneMask(0);

    pub const fn from_bits(bits: u64) -> Self {
        LaneMask(bits)
    }

    /// the mask holding lanes `0..n_lanes`
    pub const fn first_n(n_lanes: usize) -> Self {
        if n_lanes >= 64 {
            LaneMask(u64::MAX)
        } else {
            LaneMask((1_u64 << n_lanes) - 1)
        }
    }

    pub const fn single(lane: usize) -> Self {
        LaneMask(1_u64 << lane)
    }

    /// the mask of all lanes with a smaller index than `lane`
    pub const fn lanes_below(lane: usize) -> Self {
        Self::first_n(lane)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn contains(self, lane: usize) -> bool {
        lane < 64 && ((self.0 >> lane) & 1) == 1
    }

    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn lowest_lane(self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros() as usize)
        }
    }

    pub const fn highest_lane(self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(63 - self.0.leading_zeros() as usize)
        }
    }

    pub const fn with(self, lane: usize) -> Self {
        LaneMask(self.0 | (1_u64 << lane))
    }

    pub const fn without(self, lane: usize) -> Self {
        LaneMask(self.0 & !(1_u64 << lane))
    }

    /// iterate over the lanes in the mask, in increasing order
    pub fn iter(self) -> LaneMaskIter {
        LaneMaskIter(self.0)
    }
}

impl BitAnd for LaneMask {
    type Output = LaneMask;

    fn bitand(self, rhs: LaneMask) -> LaneMask {
        LaneMask(self.0 & rhs.0)
    }
}

impl BitOr for LaneMask {
    type Output = LaneMask;

    fn bitor(self, rhs: LaneMask) -> LaneMask {
        LaneMask(self.0 | rhs.0)
    }
}

impl IntoIterator for LaneMask {
    type Item = usize;
    type IntoIter = LaneMaskIter;

    fn into_iter(self) -> LaneMaskIter {
        self.iter()
    }
}

pub struct LaneMaskIter(u64);

impl Iterator for LaneMaskIter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            let lane = self.0.trailing_zeros() as usize;
            self.0 &= self.0 - 1;
            Some(lane)
        }
    }
}

/// A lane-group (implementer of the collective primitives) is composed of `W`
/// lanes that execute in lockstep.
///
/// The methods are all designed to be entered by all active lanes of the group
/// at the same time. Calls to these methods should be written *as if* every
/// active lane contributes its entry of the `[T; W]` arguments and receives
/// its entry of the `[T; W]` result. Methods that return a single `T` are
/// broadcasts: every active lane receives the same value.
///
/// `W` must be a power of two no larger than 64. This is checked at compile
/// time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LaneGroup<const W: usize> {
    active: LaneMask,
}

impl<const W: usize> Default for LaneGroup<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const W: usize> LaneGroup<W> {
    const VALID_WIDTH: () = assert!(
        W.is_power_of_two() && W <= 64,
        "the lane-group width must be a power of two no larger than 64"
    );

    pub const WIDTH: usize = W;

    /// a lane-group where every lane is active
    pub fn new() -> Self {
        Self::with_active_lanes(LaneMask::first_n(W))
    }

    /// a lane-group where only the lanes in `active` are still executing
    pub fn with_active_lanes(active: LaneMask) -> Self {
        let () = Self::VALID_WIDTH;
        Self {
            active: active & LaneMask::first_n(W),
        }
    }

    pub fn active_lanes_mask(&self) -> LaneMask {
        self.active
    }

    pub fn active_lane_count(&self) -> u32 {
        self.active.count()
    }

    pub fn is_active(&self, lane: usize) -> bool {
        self.active.contains(lane)
    }

    pub fn is_fully_active(&self) -> bool {
        self.active.count() as usize == W
    }

    // Votes
    // -----

    /// the mask of active lanes whose predicate holds
    pub fn ballot(&self, predicates: &[bool; W]) -> LaneMask {
        let mut ballot = LaneMask::EMPTY;
        for lane in self.active {
            if predicates[lane] {
                ballot = ballot.with(lane);
            }
        }
        ballot
    }

    pub fn all_satisfy(&self, predicates: &[bool; W]) -> bool {
        self.ballot(predicates) == self.active
    }

    pub fn none_satisfy(&self, predicates: &[bool; W]) -> bool {
        self.ballot(predicates).is_empty()
    }

    pub fn some_satisfy(&self, predicates: &[bool; W]) -> bool {
        !self.none_satisfy(predicates)
    }

    pub fn all_lanes_agree_on(&self, predicates: &[bool; W]) -> bool {
        let ballot = self.ballot(predicates);
        ballot.is_empty() || ballot == self.active
    }

    // Lane exchanges
    // --------------
    //
    // These are the building blocks for everything else. Reading from a lane
    // that isn't active yields whatever that lane last held.

    /// lane `i` receives the value held by lane `source_lanes[i]`
    pub fn shuffle<T: Copy>(&self, values: &[T; W], source_lanes: &[usize; W]) -> [T; W] {
        core::array::from_fn(|lane| values[source_lanes[lane] % W])
    }

    /// lane `i` receives the value held by lane `i ^ lane_mask`
    pub fn shuffle_xor<T: Copy>(&self, values: &[T; W], lane_mask: usize) -> [T; W] {
        core::array::from_fn(|lane| values[(lane ^ lane_mask) % W])
    }

    /// lane `i` receives the value held by lane `i - delta` (lanes below
    /// `delta` keep their own value)
    pub fn shuffle_up<T: Copy>(&self, values: &[T; W], delta: usize) -> [T; W] {
        core::array::from_fn(|lane| {
            if lane >= delta {
                values[lane - delta]
            } else {
                values[lane]
            }
        })
    }

    // Broadcasts
    // ----------

    /// every lane receives the value held by `source_lane`
    pub fn get_from_lane<T: Copy>(&self, values: &[T; W], source_lane: usize) -> T {
        values[source_lane % W]
    }

    /// every active lane overwrites its own copy with the value held by
    /// `source_lane`
    pub fn update_from_lane<T: Copy>(&self, values: &mut [T; W], source_lane: usize) {
        let value = self.get_from_lane(values, source_lane);
        for lane in self.active {
            values[lane] = value;
        }
    }

    pub fn get_from_first_lane<T: Copy>(&self, values: &[T; W]) -> T {
        self.get_from_lane(values, 0)
    }

    pub fn get_from_last_lane<T: Copy>(&self, values: &[T; W]) -> T {
        self.get_from_lane(values, W - 1)
    }

    /// Has exactly one lane (`designated_lane`) evaluate `f`, then broadcasts
    /// the result to every lane.
    ///
    /// This is how we amortize a side-effecting computation (e.g. an atomic
    /// update of a shared counter) over the whole group.
    pub fn have_a_single_lane_compute<T, F>(&self, f: F, designated_lane: usize) -> T
    where
        T: Copy + Default,
        F: FnOnce() -> T,
    {
        debug_assert!(self.is_active(designated_lane));
        let mut slots = [T::default(); W];
        slots[designated_lane % W] = f();
        self.get_from_lane(&slots, designated_lane)
    }

    // Leader election
    // ---------------

    /// Deterministically choose a lane from `mask`: the lowest-indexed lane
    /// when `PREFER_FIRST` is `true`, the highest-indexed lane otherwise.
    ///
    /// Returns `W` when the mask is empty.
    pub fn select_leader_lane<const PREFER_FIRST: bool>(&self, mask: LaneMask) -> usize {
        let leader = if PREFER_FIRST {
            mask.lowest_lane()
        } else {
            mask.highest_lane()
        };
        leader.unwrap_or(W)
    }

    pub fn am_leader_lane<const PREFER_FIRST: bool>(&self, lane: usize) -> bool {
        lane == self.select_leader_lane::<PREFER_FIRST>(self.active)
    }

    /// the number of active lanes with a smaller index than `lane`
    pub fn lane_index_among_active_lanes(&self, lane: usize) -> u32 {
        (LaneMask::lanes_below(lane) & self.active).count()
    }

    /// Every active lane increments `counter` by one, but only a single
    /// atomic operation is issued (by the leader lane).
    ///
    /// Each active lane receives the value it would have gotten back had it
    /// performed its own increment. Inactive lanes receive `None`.
    pub fn active_lanes_increment(&self, counter: &AtomicUsize) -> [Option<usize>; W] {
        let leader = self.select_leader_lane::<true>(self.active);
        if leader == W {
            return [None; W];
        }
        let n_active = self.active_lane_count() as usize;
        let leader_value = self.have_a_single_lane_compute(
            || counter.fetch_add(n_active, Ordering::Relaxed),
            leader,
        );
        core::array::from_fn(|lane| {
            self.is_active(lane)
                .then(|| leader_value + self.lane_index_among_active_lanes(lane) as usize)
        })
    }
}

/// This struct holds standardized parameters that describe the launch grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridParam {
    /// the number of lanes in each work-group (a multiple of the lane-group
    /// width)
    pub work_group_size: usize,
    /// one work-group per anchored segment
    pub num_work_groups: usize,
}

/// Check that `grid` is consistent with `column` and the output buffer.
///
/// Executors call this before launching anything, so that the kernels
/// themselves never have to handle errors.
pub fn validate_grid<I, P, V, const RELATIVE: bool, const W: usize>(
    column: &RpeColumnView<I, P, V, RELATIVE>,
    grid: &GridParam,
    decompressed_len: usize,
) -> Result<(), &'static str>
where
    I: UnsignedWord,
    P: UnsignedWord,
    V: UnsignedWord,
{
    if grid.work_group_size == 0 || grid.work_group_size % W != 0 {
        Err("the work-group size must be a positive multiple of the lane-group width")
    } else if grid.num_work_groups != column.num_anchors() {
        Err("there must be exactly one work-group per position anchor")
    } else if decompressed_len != column.uncompressed_length() {
        Err("the output buffer must hold exactly uncompressed_length elements")
    } else {
        Ok(())
    }
}

/// a trait for expressing how to launch a decompression
///
/// The idea is that we would implement something like this for each
/// parallelism "backend," so we have a uniform interface for easily
/// switching between backends.
///
/// **NOTE:** Types that implement this trait are intended to live entirely on
/// the CPU. A GPU backend would provide a type that implements this trait in
/// order to execute the CPU calls that are needed for managing memory and
/// launching GPU calculations
pub trait Executor {
    /// run one work-group per segment of `column`, writing into `decompressed`
    fn drive_decompress<I, P, V, const RELATIVE: bool, const W: usize>(
        &mut self,
        column: &RpeColumnView<I, P, V, RELATIVE>,
        grid: &GridParam,
        decompressed: &mut [V],
    ) -> Result<SegmentReport, &'static str>
    where
        I: UnsignedWord,
        P: UnsignedWord,
        V: UnsignedWord;
}
