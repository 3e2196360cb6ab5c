#![no_std]
//! Device-side machinery for decompressing Run-Position Encoded (RPE) columns
//!
//! Everything in this crate is written so that it could be compiled for a GPU:
//! no allocations, no logging, and no runtime error handling inside the
//! kernels. The lane-group abstraction is described in [`LaneGroup`]; the
//! decompression kernels are described in [`RpeColumnView`].

#[cfg(test)]
extern crate std;

mod bulk;
mod misc;
mod parallel;
mod predicate;
mod reduce_utils;
mod rpe;
mod search;

pub use bulk::{NATIVE_WORD_SIZE, NativeWord, WriteSlack};
pub use misc::UnsignedWord;
pub use parallel::{
    Executor, GridParam, LANE_GROUP_WIDTH, LaneGroup, LaneMask, LaneMaskIter, validate_grid,
};
pub use predicate::{HasNoSlack, MayHaveArbitrarySlack, MayHaveFullGroupsOfSlack, SlackHandling};
pub use reduce_utils::{
    BitwiseAnd, BitwiseOr, BitwiseXor, Exclusive, Inclusive, Maximum, Minimum, Plus, ReductionOp,
    ScanKind,
};
pub use rpe::{RpeColumnView, SegmentDescriptor, SegmentReport};
pub use search::{MULTISEARCH_LINEAR_CUTOFF, SearchResult};
