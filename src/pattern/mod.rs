//! Field patterns and their per-block aggregation.

pub mod aggregate;
pub mod field_pattern;
pub mod geometric;

pub use aggregate::{FieldAggPattern, LayoutEntry};
pub use field_pattern::{FieldPattern, SubCellPattern};
pub use geometric::GeometricAggPattern;
