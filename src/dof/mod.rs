//! The DOF manager and its field bookkeeping.

pub mod field_registry;
pub mod manager;
pub mod options;

/// Small integer id of a registered field.
pub type FieldId = usize;

pub use field_registry::FieldRegistry;
pub use manager::DofManager;
pub use options::IndexerOptions;
