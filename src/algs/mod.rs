//! Communication and the collective numbering algorithms.

pub mod communicator;
pub mod exchange;
pub mod resolver;
pub mod wire;

pub use communicator::{CommTag, Communicator, NoComm, NumberingCommTags, RayonComm, Wait};
#[cfg(feature = "mpi-support")]
pub use communicator::MpiComm;
pub use resolver::{
    ConsistencyResolver, DofRequest, Numbering, OwnedRanges, OwnershipPolicy, RendezvousResolver,
};
