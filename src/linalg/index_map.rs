//! Rank-local view of a distributed index space.

use std::collections::HashMap;

/// Ordered list of the GIDs this rank holds, with `gid -> lid` lookup.
///
/// Local ids are positions in the list. The owned map lists this rank's
/// contiguous range; the overlapped map lists the owned range first and the
/// ghost GIDs after it, ascending.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexMap {
    gids: Vec<u64>,
    lids: HashMap<u64, usize>,
    global_size: u64,
}

impl IndexMap {
    /// Build from local GIDs (duplicates after the first are ignored).
    pub fn new(gids: impl IntoIterator<Item = u64>, global_size: u64) -> Self {
        let mut list = Vec::new();
        let mut lids = HashMap::new();
        for gid in gids {
            if let std::collections::hash_map::Entry::Vacant(e) = lids.entry(gid) {
                e.insert(list.len());
                list.push(gid);
            }
        }
        Self {
            gids: list,
            lids,
            global_size,
        }
    }

    /// Number of GIDs on this rank.
    pub fn num_local(&self) -> usize {
        self.gids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gids.is_empty()
    }

    /// Size of the global index space the map is drawn from.
    pub fn global_size(&self) -> u64 {
        self.global_size
    }

    pub fn gids(&self) -> &[u64] {
        &self.gids
    }

    pub fn gid(&self, lid: usize) -> Option<u64> {
        self.gids.get(lid).copied()
    }

    pub fn lid(&self, gid: u64) -> Option<usize> {
        self.lids.get(&gid).copied()
    }

    pub fn contains(&self, gid: u64) -> bool {
        self.lids.contains_key(&gid)
    }

    pub fn min_gid(&self) -> Option<u64> {
        self.gids.iter().copied().min()
    }

    pub fn max_gid(&self) -> Option<u64> {
        self.gids.iter().copied().max()
    }

    /// Do the local GIDs form one ascending run without gaps?
    pub fn is_contiguous(&self) -> bool {
        self.gids.windows(2).all(|w| w[1] == w[0] + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_both_ways() {
        let m = IndexMap::new([4, 5, 9, 5], 12);
        assert_eq!(m.num_local(), 3);
        assert_eq!(m.lid(9), Some(2));
        assert_eq!(m.gid(1), Some(5));
        assert_eq!(m.lid(7), None);
        assert_eq!((m.min_gid(), m.max_gid()), (Some(4), Some(9)));
        assert!(!m.is_contiguous());
        assert_eq!(m.global_size(), 12);
    }

    #[test]
    fn empty_map() {
        let m = IndexMap::new(std::iter::empty(), 0);
        assert!(m.is_empty());
        assert!(m.is_contiguous());
        assert_eq!(m.min_gid(), None);
    }
}
