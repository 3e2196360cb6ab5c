// The internal crate reports problems with `&'static str` (it has no
// allocator and no error machinery). This crate defines the one public error
// type, which wraps those strings along with everything that can go wrong on
// the host.
//
// The kind is kept private so that we can reorganize it without breaking
// callers. Errors are only created through the `pub(crate)` constructors.

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
}

/// The underlying internal error type
#[non_exhaustive]
#[derive(Clone, Debug, thiserror::Error)]
enum ErrorKind {
    #[error("the anchoring period must be positive")]
    AnchoringPeriod,
    /// a table (or buffer) doesn't have the length implied by the others
    #[error("{what} has a length of {actual}. It should have a length of {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    /// An integer doesn't fit in the type that it must be stored in
    #[error("{description} has a value of {actual}, which exceeds the maximum of {max_val}")]
    IntegerRange {
        description: &'static str,
        actual: u64,
        max_val: u64,
    },
    #[error("a column of {length} values must have at least one run")]
    MissingRuns { length: usize },
    #[error("run {run_index} doesn't start after the preceding run")]
    NonMonotonicRunPositions { run_index: usize },
    #[error("position anchor {anchor_index} names run {actual}, but run {expected} covers its position")]
    InconsistentAnchor {
        anchor_index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("no kernel is registered for {0}")]
    UnsupportedWidths(String),
    #[error("lane-groups of width {0} aren't supported (the kernels are built for widths of 32 and 64)")]
    LaneGroupWidth(usize),
    #[error("problem with the \"{name}\" kernel argument: {problem}")]
    KernelArgument { name: String, problem: String },
    #[error("no launch configuration satisfies the device limits: {0}")]
    LaunchConfiguration(String),
    /// wraps the stringly errors from `rpedecomp_nostd_internal`
    #[error("{0}")]
    InternalLegacyAdHoc(&'static str),
}

// define constructor methods for Error
impl Error {
    pub(crate) fn anchoring_period() -> Self {
        Error {
            kind: ErrorKind::AnchoringPeriod,
        }
    }

    pub(crate) fn length_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Error {
            kind: ErrorKind::LengthMismatch {
                what,
                expected,
                actual,
            },
        }
    }

    /// produce an error indicating that an integer doesn't fit in its
    /// destination type
    pub(crate) fn integer_range(description: &'static str, actual: u64, max_val: u64) -> Self {
        Error {
            kind: ErrorKind::IntegerRange {
                description,
                actual,
                max_val,
            },
        }
    }

    pub(crate) fn missing_runs(length: usize) -> Self {
        Error {
            kind: ErrorKind::MissingRuns { length },
        }
    }

    pub(crate) fn non_monotonic_run_positions(run_index: usize) -> Self {
        Error {
            kind: ErrorKind::NonMonotonicRunPositions { run_index },
        }
    }

    pub(crate) fn inconsistent_anchor(anchor_index: usize, expected: usize, actual: usize) -> Self {
        Error {
            kind: ErrorKind::InconsistentAnchor {
                anchor_index,
                expected,
                actual,
            },
        }
    }

    pub(crate) fn unsupported_widths(description: String) -> Self {
        Error {
            kind: ErrorKind::UnsupportedWidths(description),
        }
    }

    pub(crate) fn lane_group_width(requested: usize) -> Self {
        Error {
            kind: ErrorKind::LaneGroupWidth(requested),
        }
    }

    pub(crate) fn kernel_argument(name: &str, problem: impl Into<String>) -> Self {
        Error {
            kind: ErrorKind::KernelArgument {
                name: name.to_owned(),
                problem: problem.into(),
            },
        }
    }

    pub(crate) fn launch_configuration(problem: String) -> Self {
        Error {
            kind: ErrorKind::LaunchConfiguration(problem),
        }
    }

    /// wraps a legacy internal error string
    pub(crate) fn internal_legacy_adhoc(message: &'static str) -> Self {
        Error {
            kind: ErrorKind::InternalLegacyAdHoc(message),
        }
    }
}

impl std::error::Error for Error {}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.kind, f)
    }
}

impl From<&'static str> for Error {
    fn from(message: &'static str) -> Self {
        Error::internal_legacy_adhoc(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        let err = Error::length_mismatch("position_anchors", 3, 2);
        assert_eq!(
            err.to_string(),
            "position_anchors has a length of 2. It should have a length of 3"
        );
        let err = Error::kernel_argument("length", "missing");
        assert_eq!(
            err.to_string(),
            "problem with the \"length\" kernel argument: missing"
        );
        let err: Error = "bad grid".into();
        assert_eq!(err.to_string(), "bad grid");
    }
}
