//! Transfer operators between the owned and the overlapped layouts.
//!
//! Both operators share one [`TransferPlan`]:
//! - [`Import`] fills ghost entries of an overlapped vector from their owners;
//! - [`Export`] adds ghost contributions of an overlapped vector into the
//!   owners' entries.
//!
//! Applying either is collective over the communicator the plan was built for.

use std::collections::BTreeMap;
use std::ops::AddAssign;
use std::sync::Arc;

use bytemuck::Pod;
use num_traits::Zero;

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::exchange::all_to_all;
use crate::dof_error::DofError;
use crate::linalg::index_map::IndexMap;

/// Which local entries move where.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferPlan {
    /// `(overlapped lid, owned lid)` of every GID present in both maps.
    pub same: Vec<(usize, usize)>,
    /// Per owner rank: overlapped lids of the ghosts it provides.
    pub ghost_lids: BTreeMap<usize, Vec<usize>>,
    /// Per neighbour rank: owned lids that neighbour ghosts.
    pub owned_lids: BTreeMap<usize, Vec<usize>>,
    pub tag: CommTag,
}

impl TransferPlan {
    /// Build from per-neighbour GID lists. `ghosts[r]` and the `shared[me]`
    /// list on rank `r` must enumerate the same GIDs in the same order.
    pub fn new(
        owned: &IndexMap,
        overlapped: &IndexMap,
        ghosts: &BTreeMap<usize, Vec<u64>>,
        shared: &BTreeMap<usize, Vec<u64>>,
        tag: CommTag,
    ) -> Result<Self, DofError> {
        let same = owned
            .gids()
            .iter()
            .enumerate()
            .map(|(o, &gid)| {
                overlapped
                    .lid(gid)
                    .map(|v| (v, o))
                    .ok_or(DofError::GidNotInMap(gid))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let ghost_lids = lids_per_rank(overlapped, ghosts)?;
        let owned_lids = lids_per_rank(owned, shared)?;
        Ok(Self {
            same,
            ghost_lids,
            owned_lids,
            tag,
        })
    }

    /// Number of ghost entries fetched from other ranks.
    pub fn num_ghosts(&self) -> usize {
        self.ghost_lids.values().map(Vec::len).sum()
    }
}

fn lids_per_rank(
    map: &IndexMap,
    gids: &BTreeMap<usize, Vec<u64>>,
) -> Result<BTreeMap<usize, Vec<usize>>, DofError> {
    gids.iter()
        .map(|(&rank, list)| {
            let lids = list
                .iter()
                .map(|&g| map.lid(g).ok_or(DofError::GidNotInMap(g)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((rank, lids))
        })
        .collect()
}

fn check_len(expected: usize, got: usize) -> Result<(), DofError> {
    if expected == got {
        Ok(())
    } else {
        Err(DofError::SliceLengthMismatch { expected, got })
    }
}

/// Owned → overlapped: copy owned values and fill ghosts from their owners.
#[derive(Clone, Debug)]
pub struct Import {
    source: Arc<IndexMap>,
    target: Arc<IndexMap>,
    plan: Arc<TransferPlan>,
}

impl Import {
    pub fn new(source: Arc<IndexMap>, target: Arc<IndexMap>, plan: Arc<TransferPlan>) -> Self {
        Self {
            source,
            target,
            plan,
        }
    }

    /// Owned map.
    pub fn source_map(&self) -> &Arc<IndexMap> {
        &self.source
    }

    /// Overlapped map.
    pub fn target_map(&self) -> &Arc<IndexMap> {
        &self.target
    }

    pub fn plan(&self) -> &TransferPlan {
        &self.plan
    }

    /// Overwrite `overlapped` with the owners' values.
    pub fn apply<V, C>(&self, owned: &[V], overlapped: &mut [V], comm: &C) -> Result<(), DofError>
    where
        V: Pod,
        C: Communicator,
    {
        check_len(self.source.num_local(), owned.len())?;
        check_len(self.target.num_local(), overlapped.len())?;
        for &(v, o) in &self.plan.same {
            overlapped[v] = owned[o];
        }

        let mut outgoing: Vec<Vec<V>> = vec![Vec::new(); comm.size().max(1)];
        for (&nbr, lids) in &self.plan.owned_lids {
            outgoing[nbr] = lids.iter().map(|&o| owned[o]).collect();
        }
        let incoming = all_to_all(comm, self.plan.tag, outgoing)?;
        for (&owner, lids) in &self.plan.ghost_lids {
            let vals = &incoming[owner];
            check_len(lids.len(), vals.len())?;
            for (&v, &val) in lids.iter().zip(vals) {
                overlapped[v] = val;
            }
        }
        Ok(())
    }
}

/// Overlapped → owned: sum every copy of a GID into its owner.
#[derive(Clone, Debug)]
pub struct Export {
    source: Arc<IndexMap>,
    target: Arc<IndexMap>,
    plan: Arc<TransferPlan>,
}

impl Export {
    pub fn new(source: Arc<IndexMap>, target: Arc<IndexMap>, plan: Arc<TransferPlan>) -> Self {
        Self {
            source,
            target,
            plan,
        }
    }

    /// Overlapped map.
    pub fn source_map(&self) -> &Arc<IndexMap> {
        &self.source
    }

    /// Owned map.
    pub fn target_map(&self) -> &Arc<IndexMap> {
        &self.target
    }

    pub fn plan(&self) -> &TransferPlan {
        &self.plan
    }

    /// Add `overlapped` into `owned` (existing owned values are kept).
    pub fn apply<V, C>(&self, overlapped: &[V], owned: &mut [V], comm: &C) -> Result<(), DofError>
    where
        V: Pod + AddAssign,
        C: Communicator,
    {
        check_len(self.source.num_local(), overlapped.len())?;
        check_len(self.target.num_local(), owned.len())?;
        for &(v, o) in &self.plan.same {
            owned[o] += overlapped[v];
        }

        let mut outgoing: Vec<Vec<V>> = vec![Vec::new(); comm.size().max(1)];
        for (&owner, lids) in &self.plan.ghost_lids {
            outgoing[owner] = lids.iter().map(|&v| overlapped[v]).collect();
        }
        let incoming = all_to_all(comm, self.plan.tag, outgoing)?;
        for (&nbr, lids) in &self.plan.owned_lids {
            let vals = &incoming[nbr];
            check_len(lids.len(), vals.len())?;
            for (&o, &val) in lids.iter().zip(vals) {
                owned[o] += val;
            }
        }
        Ok(())
    }

    /// Sum `overlapped` into a fresh, zero-initialised owned vector.
    pub fn assemble<V, C>(&self, overlapped: &[V], comm: &C) -> Result<Vec<V>, DofError>
    where
        V: Pod + AddAssign + Zero,
        C: Communicator,
    {
        let mut owned = vec![V::zero(); self.target.num_local()];
        self.apply(overlapped, &mut owned, comm)?;
        Ok(owned)
    }
}
