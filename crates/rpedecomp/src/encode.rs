//! Owned RPE-compressed columns
//!
//! This is where compressed columns get built (from uncompressed values) or
//! validated (when they come from somewhere else). The kernels themselves
//! trust their inputs completely, so everything that reaches them goes
//! through one of the constructors in this module.

use crate::error::Error;
use crate::launch::{KernelArgument, KernelArguments};
use crate::registry::WidthCombination;
use num_traits::NumCast;
use rpedecomp_nostd_internal::{RpeColumnView, UnsignedWord};

/// Convert `value` to `T`, reporting an error if it doesn't fit
fn narrow<T: UnsignedWord>(value: usize, description: &'static str) -> Result<T, Error> {
    <T as NumCast>::from(value).ok_or_else(|| {
        Error::integer_range(
            description,
            value as u64,
            T::max_value().to_u64().unwrap_or(u64::MAX),
        )
    })
}

/// An RPE-compressed column of `V` values.
///
/// `I` holds run indices (the position anchors) and `P` holds run start
/// positions. When `RELATIVE` is `true`, each start position is stored
/// relative to the start of the segment that the run starts in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedColumn<I, P, V, const RELATIVE: bool> {
    run_values: Vec<V>,
    run_start_positions: Vec<P>,
    position_anchors: Vec<I>,
    anchoring_period: usize,
    uncompressed_length: usize,
}

pub type AbsoluteColumn<I, P, V> = EncodedColumn<I, P, V, false>;
pub type RelativeColumn<I, P, V> = EncodedColumn<I, P, V, true>;

impl<I, P, V, const RELATIVE: bool> EncodedColumn<I, P, V, RELATIVE>
where
    I: UnsignedWord,
    P: UnsignedWord,
    V: UnsignedWord,
{
    /// Compress `values` into maximal runs, with one position anchor per
    /// `anchoring_period` values.
    pub fn encode(values: &[V], anchoring_period: usize) -> Result<Self, Error> {
        let () = RpeColumnView::<I, P, V, RELATIVE>::VALID_WIDTHS;
        if anchoring_period == 0 {
            return Err(Error::anchoring_period());
        }

        let mut run_values = Vec::new();
        let mut absolute_starts: Vec<usize> = Vec::new();
        for (position, value) in values.iter().enumerate() {
            if run_values.last() != Some(value) {
                run_values.push(*value);
                absolute_starts.push(position);
            }
        }

        let mut position_anchors = Vec::with_capacity(values.len().div_ceil(anchoring_period));
        let mut covering_run = 0;
        for anchor_position in (0..values.len()).step_by(anchoring_period) {
            while covering_run + 1 < absolute_starts.len()
                && absolute_starts[covering_run + 1] <= anchor_position
            {
                covering_run += 1;
            }
            position_anchors.push(narrow::<I>(covering_run, "a run index")?);
        }

        let run_start_positions = absolute_starts
            .iter()
            .map(|&start| {
                if RELATIVE {
                    narrow::<P>(start % anchoring_period, "a relative run start position")
                } else {
                    narrow::<P>(start, "a run start position")
                }
            })
            .collect::<Result<Vec<P>, Error>>()?;

        Ok(Self {
            run_values,
            run_start_positions,
            position_anchors,
            anchoring_period,
            uncompressed_length: values.len(),
        })
    }

    /// Assemble a column from tables that were produced elsewhere.
    ///
    /// Unlike the kernels, this checks everything: the table lengths, that
    /// the runs start at strictly increasing positions (the first at 0), and
    /// that every anchor names the run covering its position.
    pub fn from_parts(
        run_values: Vec<V>,
        run_start_positions: Vec<P>,
        position_anchors: Vec<I>,
        anchoring_period: usize,
        uncompressed_length: usize,
    ) -> Result<Self, Error> {
        let () = RpeColumnView::<I, P, V, RELATIVE>::VALID_WIDTHS;
        if anchoring_period == 0 {
            return Err(Error::anchoring_period());
        } else if run_start_positions.len() != run_values.len() {
            return Err(Error::length_mismatch(
                "run_start_positions",
                run_values.len(),
                run_start_positions.len(),
            ));
        }
        let num_anchors = uncompressed_length.div_ceil(anchoring_period);
        if position_anchors.len() != num_anchors {
            return Err(Error::length_mismatch(
                "position_anchors",
                num_anchors,
                position_anchors.len(),
            ));
        } else if uncompressed_length == 0 && !run_values.is_empty() {
            return Err(Error::length_mismatch("run_values", 0, run_values.len()));
        } else if uncompressed_length > 0 && run_values.is_empty() {
            return Err(Error::missing_runs(uncompressed_length));
        }

        let absolute_starts =
            absolute_run_starts::<I, P, RELATIVE>(&run_start_positions, &position_anchors, anchoring_period)?;
        for (run_index, pair) in absolute_starts.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(Error::non_monotonic_run_positions(run_index + 1));
            }
        }
        if let Some(&first) = absolute_starts.first() {
            if first != 0 {
                return Err(Error::non_monotonic_run_positions(0));
            }
        }
        if let Some(&last) = absolute_starts.last() {
            if last >= uncompressed_length {
                return Err(Error::integer_range(
                    "a run start position",
                    last as u64,
                    uncompressed_length as u64 - 1,
                ));
            }
        }

        for (anchor_index, &anchor) in position_anchors.iter().enumerate() {
            let anchor_position = anchor_index * anchoring_period;
            let expected = absolute_starts.partition_point(|&start| start <= anchor_position) - 1;
            if anchor.to_usize() != expected {
                return Err(Error::inconsistent_anchor(
                    anchor_index,
                    expected,
                    anchor.to_usize(),
                ));
            }
        }

        Ok(Self {
            run_values,
            run_start_positions,
            position_anchors,
            anchoring_period,
            uncompressed_length,
        })
    }

    pub fn run_values(&self) -> &[V] {
        &self.run_values
    }

    pub fn run_start_positions(&self) -> &[P] {
        &self.run_start_positions
    }

    pub fn position_anchors(&self) -> &[I] {
        &self.position_anchors
    }

    pub fn anchoring_period(&self) -> usize {
        self.anchoring_period
    }

    pub fn uncompressed_length(&self) -> usize {
        self.uncompressed_length
    }

    pub fn num_runs(&self) -> usize {
        self.run_values.len()
    }

    pub fn width_combination(&self) -> WidthCombination {
        WidthCombination::of::<I, P, V, RELATIVE>()
    }

    /// The device-side view of the column
    pub fn view(&self) -> Result<RpeColumnView<'_, I, P, V, RELATIVE>, Error> {
        RpeColumnView::new(
            &self.run_values,
            &self.run_start_positions,
            &self.position_anchors,
            self.anchoring_period,
            self.uncompressed_length,
        )
        .map_err(Error::from)
    }

    /// The named, type-erased arguments that a kernel launch consumes
    pub fn kernel_arguments(&self) -> KernelArguments<'_> {
        KernelArguments::new()
            .with("run_data", KernelArgument::Buffer(bytemuck::cast_slice(&self.run_values)))
            .with(
                "run_start_positions",
                KernelArgument::Buffer(bytemuck::cast_slice(&self.run_start_positions)),
            )
            .with(
                "position_anchors",
                KernelArgument::Buffer(bytemuck::cast_slice(&self.position_anchors)),
            )
            .with(
                "position_anchoring_period",
                KernelArgument::Size(self.anchoring_period),
            )
            .with("num_anchors", KernelArgument::Size(self.position_anchors.len()))
            .with("num_element_runs", KernelArgument::Size(self.run_values.len()))
            .with("length", KernelArgument::Size(self.uncompressed_length))
            .with("positions_are_relative", KernelArgument::Flag(RELATIVE))
    }
}

/// Recover the absolute start position of every run.
///
/// For relative positions, we need to know which segment each run starts in.
/// Run `r` starts in the last segment whose anchor is smaller than `r`,
/// unless the next anchor names `r` itself and its relative position is 0
/// (the run starts exactly on that segment boundary).
fn absolute_run_starts<I, P, const RELATIVE: bool>(
    run_start_positions: &[P],
    position_anchors: &[I],
    anchoring_period: usize,
) -> Result<Vec<usize>, Error>
where
    I: UnsignedWord,
    P: UnsignedWord,
{
    if !RELATIVE {
        return Ok(run_start_positions.iter().map(|&p| p.to_usize()).collect());
    }

    let mut starts = Vec::with_capacity(run_start_positions.len());
    let mut segment = 0;
    for (run_index, &relative) in run_start_positions.iter().enumerate() {
        let relative = relative.to_usize();
        if relative >= anchoring_period {
            return Err(Error::integer_range(
                "a relative run start position",
                relative as u64,
                anchoring_period as u64 - 1,
            ));
        }
        while segment + 1 < position_anchors.len() && position_anchors[segment + 1].to_usize() < run_index {
            segment += 1;
        }
        let starts_on_next_boundary = relative == 0
            && segment + 1 < position_anchors.len()
            && position_anchors[segment + 1].to_usize() == run_index
            && position_anchors[segment].to_usize() != run_index;
        let segment_start = if starts_on_next_boundary {
            (segment + 1) * anchoring_period
        } else {
            segment * anchoring_period
        };
        starts.push(segment_start + relative);
    }
    Ok(starts)
}
