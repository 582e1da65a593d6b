//! Error taxonomy for the whole crate.
//!
//! Every fallible operation surfaces one of these variants to the caller at
//! the point that caused it. Transformations build their result on a copy
//! and commit atomically, so a returned error never leaves the IR partially
//! mutated.

use crate::isl::SolverError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed iteration-space, map or access string.
    #[error("failed to parse relation: {0}")]
    Parse(String),

    /// A computation (or buffer) name was registered twice.
    #[error("name `{0}` is already registered")]
    DuplicateName(String),

    /// Schedule input/output tuple name disagrees with the computation name.
    #[error("schedule tuple `{found}` does not match computation `{expected}`")]
    ScheduleTupleMismatch { expected: String, found: String },

    /// A split/tile/unroll factor is unusable for the targeted dimension.
    #[error("invalid factor {factor} for loop level {level}")]
    InvalidFactor { level: usize, factor: i64 },

    /// Tile/interchange/fuse levels are out of range or not consecutive.
    #[error("loop level error: {0}")]
    TilingArity(String),

    /// An expression references an iterator, buffer or computation that is
    /// not in scope.
    #[error("`{0}` is not bound to any iterator, buffer or computation in scope")]
    UnboundReference(String),

    /// The external integer-set solver returned failure.
    #[error(transparent)]
    Solver(#[from] SolverError),

    /// The statement tree could not be formed or was rejected.
    #[error("backend rejected statement tree: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, Error>;
