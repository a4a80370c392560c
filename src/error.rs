//! Error types for voxr

use thiserror::Error;

/// Result type alias using voxr's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in voxr operations
///
/// All errors are detected synchronously when an operation is invoked and
/// indicate caller-supplied configuration problems; none are transient and
/// none leave partially written outputs behind.
#[derive(Error, Debug)]
pub enum Error {
    /// Geometry combination the engine does not support
    #[error("Unsupported geometry: {reason}")]
    UnsupportedGeometry {
        /// Why the geometry is rejected
        reason: String,
    },

    /// Coordinate outside the declared spatial shape or batch range
    #[error("Coordinate out of bounds: row {row}, column {col} is {value}, valid range [0, {bound})")]
    CoordinateOutOfBounds {
        /// Row in the coordinate buffer
        row: usize,
        /// Column within the row (0 = batch index, 1.. = spatial dims)
        col: usize,
        /// The offending value
        value: i32,
        /// Exclusive upper bound for this column
        bound: usize,
    },

    /// Shape mismatch in an operation
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// A reuse key referenced a rulebook incompatible with the request
    #[error("Rulebook reuse mismatch for key '{key}': {reason}")]
    RulebookReuseMismatch {
        /// The reuse key
        key: String,
        /// Why the stored rulebook cannot serve this request
        reason: String,
    },

    /// Duplicate active site where uniqueness was required
    #[error("Duplicate coordinate at row {row} (first seen at row {first})")]
    DuplicateCoordinate {
        /// Row of the duplicate
        row: usize,
        /// Row of the first occurrence
        first: usize,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },
}

impl Error {
    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Create an unsupported geometry error
    pub fn unsupported_geometry(reason: impl Into<String>) -> Self {
        Self::UnsupportedGeometry {
            reason: reason.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }

    /// Create a rulebook reuse mismatch error
    pub fn reuse_mismatch(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RulebookReuseMismatch {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
