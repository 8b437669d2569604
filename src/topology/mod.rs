//! Mesh topology primitives consumed by the DOF manager.
//!
//! - [`point::PointId`]: global entity keys
//! - [`cell_type::CellType`]: sub-cell counts per element shape
//! - [`conn_manager::ConnManager`]: element-to-entity connectivity provider
//! - [`ownership::EntityOwnership`]: owner rank of every numbered pair

pub mod cell_type;
pub mod conn_manager;
pub mod ownership;
pub mod point;

pub use cell_type::CellType;
pub use conn_manager::{BlockId, ConnManager, ElementId, InMemoryConnManager};
pub use ownership::{DofKey, EntityOwnership, OwnershipEntry};
pub use point::PointId;
