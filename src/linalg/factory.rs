//! Construction seam for the distributed objects handed out by the indexer.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::linalg::crs_graph::CrsGraph;
use crate::linalg::index_map::IndexMap;
use crate::linalg::transfer::{Export, Import, TransferPlan};

/// Builds maps, graphs and transfer operators from numbering output.
///
/// Called lazily, once per object, after the collective build; none of the
/// methods communicate.
pub trait LinearAlgebraFactory: fmt::Debug + Send + Sync {
    fn build_map(&self, gids: &[u64], global_size: u64) -> Arc<IndexMap>;

    fn build_graph(
        &self,
        row_map: Arc<IndexMap>,
        rows: &BTreeMap<u64, BTreeSet<u64>>,
    ) -> Arc<CrsGraph>;

    fn build_import(
        &self,
        owned: Arc<IndexMap>,
        overlapped: Arc<IndexMap>,
        plan: Arc<TransferPlan>,
    ) -> Arc<Import>;

    fn build_export(
        &self,
        overlapped: Arc<IndexMap>,
        owned: Arc<IndexMap>,
        plan: Arc<TransferPlan>,
    ) -> Arc<Export>;
}

/// Default factory producing the in-crate CSR types.
#[derive(Copy, Clone, Debug, Default)]
pub struct CsrFactory;

impl LinearAlgebraFactory for CsrFactory {
    fn build_map(&self, gids: &[u64], global_size: u64) -> Arc<IndexMap> {
        Arc::new(IndexMap::new(gids.iter().copied(), global_size))
    }

    fn build_graph(
        &self,
        row_map: Arc<IndexMap>,
        rows: &BTreeMap<u64, BTreeSet<u64>>,
    ) -> Arc<CrsGraph> {
        Arc::new(CrsGraph::from_rows(row_map, rows))
    }

    fn build_import(
        &self,
        owned: Arc<IndexMap>,
        overlapped: Arc<IndexMap>,
        plan: Arc<TransferPlan>,
    ) -> Arc<Import> {
        Arc::new(Import::new(owned, overlapped, plan))
    }

    fn build_export(
        &self,
        overlapped: Arc<IndexMap>,
        owned: Arc<IndexMap>,
        plan: Arc<TransferPlan>,
    ) -> Arc<Export> {
        Arc::new(Export::new(overlapped, owned, plan))
    }
}
