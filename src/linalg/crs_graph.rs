//! Compressed-row sparsity graph over global indices.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::linalg::index_map::IndexMap;

/// CSR sparsity pattern whose rows follow a row [`IndexMap`].
///
/// Columns are global indices, sorted and deduplicated per row.
#[derive(Debug, Clone)]
pub struct CrsGraph {
    row_map: Arc<IndexMap>,
    /// CSR offsets into `adjncy` for each local row.
    pub xadj: Vec<usize>,
    /// Column GIDs.
    pub adjncy: Vec<u64>,
}

impl CrsGraph {
    /// Lay out `rows` in `row_map` order. Rows absent from `rows` are empty;
    /// entries of `rows` outside `row_map` are dropped.
    pub fn from_rows(row_map: Arc<IndexMap>, rows: &BTreeMap<u64, BTreeSet<u64>>) -> Self {
        let mut xadj = Vec::with_capacity(row_map.num_local() + 1);
        let mut adjncy = Vec::new();
        xadj.push(0);
        for &gid in row_map.gids() {
            if let Some(cols) = rows.get(&gid) {
                adjncy.extend(cols.iter().copied());
            }
            xadj.push(adjncy.len());
        }
        Self {
            row_map,
            xadj,
            adjncy,
        }
    }

    pub fn row_map(&self) -> &Arc<IndexMap> {
        &self.row_map
    }

    pub fn num_rows(&self) -> usize {
        self.xadj.len().saturating_sub(1)
    }

    /// Total number of stored entries.
    pub fn num_entries(&self) -> usize {
        self.adjncy.len()
    }

    /// Column GIDs of local row `i`, `None` past the last row.
    #[inline]
    pub fn columns(&self, i: usize) -> Option<&[u64]> {
        let (&lo, &hi) = (self.xadj.get(i)?, self.xadj.get(i + 1)?);
        self.adjncy.get(lo..hi)
    }

    /// Column GIDs of the row for `gid`, if this rank holds that row.
    pub fn row(&self, gid: u64) -> Option<&[u64]> {
        self.row_map.lid(gid).and_then(|lid| self.columns(lid))
    }

    /// Longest row, for allocation.
    pub fn max_row_len(&self) -> usize {
        self.xadj.windows(2).map(|w| w[1] - w[0]).max().unwrap_or(0)
    }
}
