#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-dofs
//!
//! mesh-dofs is a distributed degree-of-freedom indexer for mesh-based PDE
//! codes. Given a partitioned mesh, a set of named fields and a pattern per
//! field, it assigns every discrete unknown a global index that all ranks
//! agree on, and derives the objects needed to assemble a distributed linear
//! system: owned and overlapped index maps, sparsity graphs, and the
//! import/export operators between the two layouts.
//!
//! ## Features
//! - Field registration, globally or per element block
//! - Aggregated per-block patterns with a canonical element DOF layout
//! - One collective numbering pass with deterministic rank-based ownership
//! - Pluggable communication backends (serial, in-process threads, MPI)
//!
//! ```toml
//! [dependencies]
//! mesh-dofs = "0.3"
//! # Optional features:
//! # features = ["mpi-support","rayon"]
//! ```
//!
//! ## Determinism
//!
//! GIDs depend only on the set of `(entity, field)` pairs and the field ids,
//! never on element or message order. Rebuilding after
//! [`DofManager::reset_indices`](dof::DofManager::reset_indices) with the same
//! inputs reproduces every GID.

pub mod algs;
pub mod dof;
pub mod dof_error;
pub mod linalg;
pub mod pattern;
pub mod topology;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{CommTag, Communicator, NoComm, RayonComm};
    pub use crate::algs::resolver::{ConsistencyResolver, OwnershipPolicy, RendezvousResolver};
    pub use crate::dof::{DofManager, FieldId, IndexerOptions};
    pub use crate::dof_error::DofError;
    pub use crate::linalg::{CrsGraph, Export, Import, IndexMap, LinearAlgebraFactory};
    pub use crate::pattern::{FieldAggPattern, FieldPattern, SubCellPattern};
    pub use crate::topology::{
        BlockId, CellType, ConnManager, ElementId, InMemoryConnManager, PointId,
    };
}
