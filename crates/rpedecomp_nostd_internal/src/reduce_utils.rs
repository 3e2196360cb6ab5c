// this defines the group-wide reductions and scans, along with the operators
// they are parameterized by.
//
// Both are written in terms of explicit lane exchanges (see parallel.rs) so
// that the order in which values get combined is exactly the order that a
// lockstep implementation would use. This matters for floating point values
// and is the reason we don't simply fold over the active lanes.

use crate::parallel::LaneGroup;
use num_traits::{Bounded, PrimInt, Zero};

/// An associative (and, for [`LaneGroup::reduce`], commutative) binary
/// operator with a neutral element.
///
/// The operator consumes and produces the same type, so a mismatch between
/// input and output types is a compile-time error.
pub trait ReductionOp<T: Copy> {
    fn neutral(&self) -> T;

    fn combine(&self, lhs: T, rhs: T) -> T;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Plus;

impl<T: Copy + Zero> ReductionOp<T> for Plus {
    #[inline(always)]
    fn neutral(&self) -> T {
        T::zero()
    }

    #[inline(always)]
    fn combine(&self, lhs: T, rhs: T) -> T {
        lhs + rhs
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Maximum;

impl<T: Copy + Bounded + PartialOrd> ReductionOp<T> for Maximum {
    #[inline(always)]
    fn neutral(&self) -> T {
        T::min_value()
    }

    #[inline(always)]
    fn combine(&self, lhs: T, rhs: T) -> T {
        if rhs > lhs { rhs } else { lhs }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Minimum;

impl<T: Copy + Bounded + PartialOrd> ReductionOp<T> for Minimum {
    #[inline(always)]
    fn neutral(&self) -> T {
        T::max_value()
    }

    #[inline(always)]
    fn combine(&self, lhs: T, rhs: T) -> T {
        if rhs < lhs { rhs } else { lhs }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BitwiseOr;

impl<T: PrimInt> ReductionOp<T> for BitwiseOr {
    fn neutral(&self) -> T {
        T::zero()
    }

    fn combine(&self, lhs: T, rhs: T) -> T {
        lhs | rhs
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BitwiseAnd;

impl<T: PrimInt> ReductionOp<T> for BitwiseAnd {
    fn neutral(&self) -> T {
        !T::zero()
    }

    fn combine(&self, lhs: T, rhs: T) -> T {
        lhs & rhs
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BitwiseXor;

impl<T: PrimInt> ReductionOp<T> for BitwiseXor {
    fn neutral(&self) -> T {
        T::zero()
    }

    fn combine(&self, lhs: T, rhs: T) -> T {
        lhs ^ rhs
    }
}

/// Selects between an inclusive and an exclusive prefix scan
pub trait ScanKind {
    const INCLUSIVE: bool;
}

/// lane `i` receives the combination of the values held by lanes `0..=i`
pub struct Inclusive;

/// lane `i` receives the combination of the values held by lanes `0..i`
/// (lane 0 receives the operator's neutral value)
pub struct Exclusive;

impl ScanKind for Inclusive {
    const INCLUSIVE: bool = true;
}

impl ScanKind for Exclusive {
    const INCLUSIVE: bool = false;
}

impl<const W: usize> LaneGroup<W> {
    /// inactive lanes contribute the neutral element
    fn neutral_where_inactive<T: Copy>(&self, values: &[T; W], op: &impl ReductionOp<T>) -> [T; W] {
        core::array::from_fn(|lane| {
            if self.is_active(lane) {
                values[lane]
            } else {
                op.neutral()
            }
        })
    }

    /// inactive lanes keep whatever they held before the collective call
    fn restore_inactive<T: Copy>(&self, result: [T; W], original: &[T; W]) -> [T; W] {
        core::array::from_fn(|lane| {
            if self.is_active(lane) {
                result[lane]
            } else {
                original[lane]
            }
        })
    }

    /// Butterfly reduction: after `log2(W)` exchange steps every active lane
    /// holds the combination of all active lanes' values.
    ///
    /// Step `s` (with `s = W/2, W/4, ..., 1`) exchanges values with the lane
    /// at XOR-distance `s`.
    pub fn reduce<T: Copy, Op: ReductionOp<T>>(&self, values: &[T; W], op: &Op) -> [T; W] {
        let mut buf = self.neutral_where_inactive(values, op);
        let mut step = W / 2;
        while step > 0 {
            let partner = self.shuffle_xor(&buf, step);
            for lane in 0..W {
                buf[lane] = op.combine(buf[lane], partner[lane]);
            }
            step /= 2;
        }
        self.restore_inactive(buf, values)
    }

    pub fn sum<T: Copy + Zero>(&self, values: &[T; W]) -> [T; W] {
        self.reduce(values, &Plus)
    }

    /// Hillis–Steele prefix scan.
    ///
    /// Step with offset `o` (`o = 1, 2, 4, ..., W/2`) combines each lane's
    /// value with the value held `o` lanes below it (lanes with an index
    /// below `o` are left untouched). The exclusive flavor pre-shifts all
    /// values up by one lane and gives lane 0 the neutral value.
    pub fn scan<K: ScanKind, T: Copy, Op: ReductionOp<T>>(&self, values: &[T; W], op: &Op) -> [T; W] {
        let mut buf = self.neutral_where_inactive(values, op);
        if !K::INCLUSIVE {
            let shifted = self.shuffle_up(&buf, 1);
            buf = core::array::from_fn(|lane| if lane == 0 { op.neutral() } else { shifted[lane] });
        }
        let mut offset = 1;
        while offset < W {
            let below = self.shuffle_up(&buf, offset);
            for lane in offset..W {
                buf[lane] = op.combine(below[lane], buf[lane]);
            }
            offset *= 2;
        }
        self.restore_inactive(buf, values)
    }
}
