//! Distributed index spaces, sparsity graphs and transfer operators.

pub mod crs_graph;
pub mod factory;
pub mod index_map;
pub mod transfer;

pub use crs_graph::CrsGraph;
pub use factory::{CsrFactory, LinearAlgebraFactory};
pub use index_map::IndexMap;
pub use transfer::{Export, Import, TransferPlan};
