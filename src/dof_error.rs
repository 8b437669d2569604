//! DofError: unified error type for mesh-dofs public APIs
//!
//! Lookup misses (unknown field, unknown block/field pattern pair) are not
//! errors; they come back as `None`. Everything here is a contract violation
//! or a failed collective step.

use thiserror::Error;

use crate::topology::point::PointId;

/// Unified error type for DOF indexing operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DofError {
    /// Attempted to construct a PointId with a zero value (invalid).
    #[error("PointId must be non-zero (0 is reserved as invalid/sentinel)")]
    InvalidPointId,

    /// A query that needs a numbering was issued while the manager is unbuilt.
    #[error("global unknowns have not been built (call build_global_unknowns first)")]
    NotBuilt,

    /// `build_global_unknowns` was called without a connectivity provider.
    #[error("no connectivity manager has been set")]
    MissingConnManager,

    /// The same field name was registered twice with non-equal patterns.
    #[error("field `{name}` already registered on block {block:?} with a different pattern")]
    FieldConflict {
        name: String,
        /// `None` means the field was registered on every block.
        block: Option<usize>,
    },

    /// Two patterns active on one block describe different cell geometries.
    #[error("field `{name}` has geometry {found} but block {block} uses {expected}")]
    IncompatibleGeometry {
        name: String,
        block: usize,
        expected: String,
        found: String,
    },

    /// Element connectivity disagrees with its block's cell type.
    #[error("element {element}: expected {expected} sub-cells of dimension {dim}, got {got}")]
    ConnectivityMismatch {
        element: usize,
        dim: usize,
        expected: usize,
        got: usize,
    },

    /// An element id was added twice to a connectivity provider.
    #[error("element {0} is already registered")]
    DuplicateElement(usize),

    /// A block id was referenced before it was declared.
    #[error("element block {0} is not declared")]
    UnknownBlock(usize),

    /// Ranks disagree on the number of slots one field places on one entity.
    #[error("field {field} on entity {point}: slot count {first} disagrees with {second}")]
    SlotCountMismatch {
        point: PointId,
        field: usize,
        first: u32,
        second: u32,
    },

    /// A ghost entity was not resolved by its owner.
    #[error("no global index received for entity {point} field {field}")]
    MissingGhost { point: PointId, field: usize },

    /// A GID referenced by a transfer operator is not in the target map.
    #[error("global index {0} is not present in the index map")]
    GidNotInMap(u64),

    /// Slice lengths passed to a transfer operator do not match its maps.
    #[error("expected a slice of length {expected}, got {got}")]
    SliceLengthMismatch { expected: usize, got: usize },

    /// Communication failure with a peer rank.
    #[error("communication error with rank {neighbor}: {source}")]
    CommError {
        neighbor: usize,
        #[source]
        source: CommFailure,
    },

    /// A received buffer had an unexpected byte length.
    #[error("buffer size mismatch from rank {neighbor}: expected {expected} bytes, got {got}")]
    BufferSizeMismatch {
        neighbor: usize,
        expected: usize,
        got: usize,
    },
}

/// Message attached to a [`DofError::CommError`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CommFailure(pub String);

impl From<String> for CommFailure {
    fn from(msg: String) -> Self {
        CommFailure(msg)
    }
}

impl From<&str> for CommFailure {
    fn from(msg: &str) -> Self {
        CommFailure(msg.to_owned())
    }
}
