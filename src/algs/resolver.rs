//! Parallel consistency resolution: one global index run per `(entity, field)`.
//!
//! Every rank declares the `(entity, field, slots)` triples its elements touch.
//! The resolver turns those local declarations into a numbering that is
//! identical on every rank that shares an entity, with each pair owned by
//! exactly one rank.
//!
//! [`RendezvousResolver`] does this in three collective phases:
//! 1. **claim**: each pair is sent to its directory rank (`point % size`),
//!    which sees every rank touching the pair, picks the owner with the
//!    configured [`OwnershipPolicy`] and replies to every claimant;
//! 2. **number**: each rank numbers its owned pairs in ascending
//!    `(point, field)` order, all-gathers the owned totals and shifts by the
//!    exclusive prefix sum, so rank `r` owns one contiguous GID range;
//! 3. **ghost**: ranks ask the owners of their ghost pairs for the first GID
//!    of each slot run.
//!
//! The outcome only depends on the set of declarations, never on the order
//! in which elements were visited or messages arrived.

use std::collections::BTreeMap;
use std::ops::Range;

use hashbrown::HashMap;

use crate::algs::communicator::Communicator;
use crate::algs::exchange::{all_gather_u64, all_to_all};
use crate::algs::wire::{WireClaim, WireGid, WireKey, WireOwner};
use crate::dof::IndexerOptions;
use crate::dof_error::DofError;
use crate::topology::ownership::{DofKey, EntityOwnership};

/// `slots` DOFs of one field on one entity, as declared by one rank.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DofRequest {
    pub key: DofKey,
    pub slots: u32,
}

impl DofRequest {
    pub fn new(key: DofKey, slots: u32) -> Self {
        Self { key, slots }
    }
}

/// Tie-break for pairs touched by several ranks.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum OwnershipPolicy {
    /// The lowest claiming rank owns the pair.
    #[default]
    LowestRank,
    /// The highest claiming rank owns the pair.
    HighestRank,
}

impl OwnershipPolicy {
    fn pick(self, current: usize, candidate: usize) -> usize {
        match self {
            OwnershipPolicy::LowestRank => current.min(candidate),
            OwnershipPolicy::HighestRank => current.max(candidate),
        }
    }
}

/// Numbering of one `(entity, field)` pair as seen from this rank.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ResolvedDof {
    /// First GID of the contiguous slot run.
    pub base: u64,
    pub slots: u32,
    pub owner: usize,
}

/// Contiguous, rank-ordered ownership of the global index space.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OwnedRanges {
    /// `starts[r]..starts[r + 1]` is owned by rank `r`.
    starts: Vec<u64>,
}

impl OwnedRanges {
    /// Build from per-rank owned totals.
    pub fn from_totals(totals: &[u64]) -> Self {
        let mut starts = Vec::with_capacity(totals.len() + 1);
        let mut acc = 0u64;
        starts.push(acc);
        for &t in totals {
            acc += t;
            starts.push(acc);
        }
        Self { starts }
    }

    /// GIDs owned by `rank`.
    pub fn range(&self, rank: usize) -> Range<u64> {
        match (self.starts.get(rank), self.starts.get(rank + 1)) {
            (Some(&lo), Some(&hi)) => lo..hi,
            _ => 0..0,
        }
    }

    /// Rank owning `gid`, if `gid` is inside the global index space.
    pub fn owner_of(&self, gid: u64) -> Option<usize> {
        if gid >= self.global_size() {
            return None;
        }
        // last start <= gid; empty ranks share a start with their successor
        let idx = self.starts.partition_point(|&s| s <= gid);
        Some(idx - 1)
    }

    /// Total number of GIDs over all ranks.
    pub fn global_size(&self) -> u64 {
        self.starts.last().copied().unwrap_or(0)
    }

    /// Number of ranks described.
    pub fn num_ranks(&self) -> usize {
        self.starts.len().saturating_sub(1)
    }
}

/// Result of the collective numbering step on one rank.
#[derive(Clone, Debug, Default)]
pub struct Numbering {
    pub rank: usize,
    /// Every pair this rank declared, owned or ghost.
    pub dofs: BTreeMap<DofKey, ResolvedDof>,
    pub ownership: EntityOwnership,
    pub ranges: OwnedRanges,
    /// Owned pairs each neighbour ghosts, in the order values are exchanged.
    pub sends: BTreeMap<usize, Vec<DofKey>>,
    /// Ghost pairs fetched from each owner, in the order values are exchanged.
    pub recvs: BTreeMap<usize, Vec<DofKey>>,
}

impl Numbering {
    /// GID of slot `slot` of a pair.
    pub fn gid(&self, key: DofKey, slot: usize) -> Option<u64> {
        self.dofs
            .get(&key)
            .filter(|d| slot < d.slots as usize)
            .map(|d| d.base + slot as u64)
    }

    /// Owned GIDs of this rank, ascending.
    pub fn owned_range(&self) -> Range<u64> {
        self.ranges.range(self.rank)
    }

    /// GIDs of all ghost pairs, ascending.
    pub fn ghost_gids(&self) -> Vec<u64> {
        let mut gids: Vec<u64> = self
            .dofs
            .values()
            .filter(|d| d.owner != self.rank)
            .flat_map(|d| d.base..d.base + u64::from(d.slots))
            .collect();
        gids.sort_unstable();
        gids
    }

    /// Expand per-neighbour pair lists into GID lists.
    pub fn expand(&self, keys: &[DofKey]) -> Vec<u64> {
        keys.iter()
            .filter_map(|k| self.dofs.get(k))
            .flat_map(|d| d.base..d.base + u64::from(d.slots))
            .collect()
    }
}

/// Turns local declarations into a globally consistent numbering.
///
/// Collective: every rank of `comm` must call `resolve` with the same options.
pub trait ConsistencyResolver {
    fn resolve<C: Communicator>(
        &self,
        requests: &[DofRequest],
        comm: &C,
        opts: &IndexerOptions,
    ) -> Result<Numbering, DofError>;
}

/// Directory-based claim/number/ghost resolver.
#[derive(Copy, Clone, Debug, Default)]
pub struct RendezvousResolver;

#[inline]
fn directory_of(key: DofKey, size: usize) -> usize {
    (key.point.get() % size as u64) as usize
}

impl ConsistencyResolver for RendezvousResolver {
    fn resolve<C: Communicator>(
        &self,
        requests: &[DofRequest],
        comm: &C,
        opts: &IndexerOptions,
    ) -> Result<Numbering, DofError> {
        let size = comm.size().max(1);
        let me = comm.rank();

        let local = dedup_requests(requests)?;
        let owners = claim_owners(&local, comm, size, opts)?;

        // phase 2: number owned pairs
        let mut numbering = Numbering {
            rank: me,
            ..Numbering::default()
        };
        let mut local_total = 0u64;
        for (&key, &slots) in &local {
            let owner = owners.get(&key).copied().ok_or(DofError::MissingGhost {
                point: key.point,
                field: key.field,
            })?;
            numbering.ownership.set_from_owner(key, owner, me);
            let base = if owner == me {
                let b = local_total;
                local_total += u64::from(slots);
                b
            } else {
                0
            };
            numbering.dofs.insert(key, ResolvedDof { base, slots, owner });
        }
        let totals = all_gather_u64(comm, opts.tags.number, local_total)?;
        numbering.ranges = OwnedRanges::from_totals(&totals);
        let shift = numbering.ranges.range(me).start;
        for dof in numbering.dofs.values_mut().filter(|d| d.owner == me) {
            dof.base += shift;
        }
        log::debug!(
            "rank {me}: {} pairs declared, {local_total} DOFs owned of {} global",
            local.len(),
            numbering.ranges.global_size()
        );

        // phase 3: fetch ghost bases from their owners
        for (key, owner) in numbering.ownership.ghosts() {
            numbering.recvs.entry(owner).or_default().push(key);
        }
        let mut asks: Vec<Vec<WireKey>> = vec![Vec::new(); size];
        for (&owner, keys) in &numbering.recvs {
            asks[owner] = keys.iter().map(|&k| WireKey::of(k)).collect();
        }
        let asked = all_to_all(comm, opts.tags.ghost, asks)?;

        let mut answers: Vec<Vec<WireGid>> = vec![Vec::new(); size];
        for (src, batch) in asked.iter().enumerate() {
            if batch.is_empty() {
                continue;
            }
            let mut keys = Vec::with_capacity(batch.len());
            for w in batch {
                let key = w.key()?;
                let dof = numbering
                    .dofs
                    .get(&key)
                    .filter(|d| d.owner == me)
                    .ok_or(DofError::MissingGhost {
                        point: key.point,
                        field: key.field,
                    })?;
                answers[src].push(WireGid::of(dof.base));
                keys.push(key);
            }
            numbering.sends.insert(src, keys);
        }
        let answered = all_to_all(comm, opts.tags.ghost.offset(2), answers)?;

        for (&owner, keys) in &numbering.recvs {
            let bases = &answered[owner];
            if bases.len() != keys.len() {
                return Err(DofError::CommError {
                    neighbor: owner,
                    source: format!(
                        "expected {} ghost indices, got {}",
                        keys.len(),
                        bases.len()
                    )
                    .into(),
                });
            }
            for (key, base) in keys.iter().zip(bases) {
                if let Some(dof) = numbering.dofs.get_mut(key) {
                    dof.base = base.get();
                }
            }
        }
        log::debug!(
            "rank {me}: {} ghost pairs from {} owners, {} pairs ghosted by {} ranks",
            numbering.recvs.values().map(Vec::len).sum::<usize>(),
            numbering.recvs.len(),
            numbering.sends.values().map(Vec::len).sum::<usize>(),
            numbering.sends.len()
        );

        Ok(numbering)
    }
}

fn dedup_requests(requests: &[DofRequest]) -> Result<BTreeMap<DofKey, u32>, DofError> {
    let mut local: BTreeMap<DofKey, u32> = BTreeMap::new();
    for req in requests {
        match local.get(&req.key) {
            Some(&slots) if slots != req.slots => {
                return Err(DofError::SlotCountMismatch {
                    point: req.key.point,
                    field: req.key.field,
                    first: slots,
                    second: req.slots,
                });
            }
            Some(_) => {}
            None => {
                local.insert(req.key, req.slots);
            }
        }
    }
    Ok(local)
}

/// Phase 1: route claims through directory ranks and collect the owner of
/// every local pair.
fn claim_owners<C: Communicator>(
    local: &BTreeMap<DofKey, u32>,
    comm: &C,
    size: usize,
    opts: &IndexerOptions,
) -> Result<HashMap<DofKey, usize>, DofError> {
    let mut claims: Vec<Vec<WireClaim>> = vec![Vec::new(); size];
    let mut sent: Vec<Vec<DofKey>> = vec![Vec::new(); size];
    for (&key, &slots) in local {
        let dir = directory_of(key, size);
        claims[dir].push(WireClaim::new(key, slots));
        sent[dir].push(key);
    }
    let received = all_to_all(comm, opts.tags.claim, claims)?;

    let mut directory: HashMap<DofKey, (u32, usize)> = HashMap::new();
    for (src, batch) in received.iter().enumerate() {
        for claim in batch {
            let key = claim.key.key()?;
            match directory.get_mut(&key) {
                Some((slots, owner)) => {
                    if *slots != claim.slots() {
                        return Err(DofError::SlotCountMismatch {
                            point: key.point,
                            field: key.field,
                            first: *slots,
                            second: claim.slots(),
                        });
                    }
                    *owner = opts.ownership.pick(*owner, src);
                }
                None => {
                    directory.insert(key, (claim.slots(), src));
                }
            }
        }
    }

    let mut replies: Vec<Vec<WireOwner>> = vec![Vec::new(); size];
    for (src, batch) in received.iter().enumerate() {
        for claim in batch {
            let key = claim.key.key()?;
            let owner = directory.get(&key).map_or(src, |&(_, owner)| owner);
            replies[src].push(WireOwner::new(owner));
        }
    }
    let answered = all_to_all(comm, opts.tags.claim.offset(2), replies)?;

    let mut owners = HashMap::with_capacity(local.len());
    for (dir, keys) in sent.iter().enumerate() {
        let got = &answered[dir];
        if got.len() != keys.len() {
            return Err(DofError::CommError {
                neighbor: dir,
                source: format!("expected {} claim replies, got {}", keys.len(), got.len())
                    .into(),
            });
        }
        for (key, owner) in keys.iter().zip(got) {
            owners.insert(*key, owner.get());
        }
    }
    Ok(owners)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, RayonComm};
    use crate::topology::point::PointId;

    fn req(p: u64, f: usize, slots: u32) -> DofRequest {
        DofRequest::new(DofKey::new(PointId::new(p).unwrap(), f), slots)
    }

    #[test]
    fn owned_ranges_lookup() {
        let r = OwnedRanges::from_totals(&[3, 0, 2]);
        assert_eq!(r.range(0), 0..3);
        assert_eq!(r.range(1), 3..3);
        assert_eq!(r.range(2), 3..5);
        assert_eq!(r.owner_of(2), Some(0));
        assert_eq!(r.owner_of(3), Some(2));
        assert_eq!(r.owner_of(5), None);
        assert_eq!(r.global_size(), 5);
        assert_eq!(r.num_ranks(), 3);
    }

    #[test]
    fn serial_numbering_is_sorted_and_contiguous() {
        let requests = [req(5, 0, 1), req(2, 1, 2), req(2, 0, 1), req(5, 0, 1)];
        let n = RendezvousResolver
            .resolve(&requests, &NoComm, &IndexerOptions::default())
            .unwrap();
        let bases: Vec<_> = n
            .dofs
            .iter()
            .map(|(k, d)| (k.point.get(), k.field, d.base))
            .collect();
        assert_eq!(bases, vec![(2, 0, 0), (2, 1, 1), (5, 0, 3)]);
        assert_eq!(n.ranges.global_size(), 4);
        assert!(n.recvs.is_empty() && n.sends.is_empty());
    }

    #[test]
    fn conflicting_local_slots_are_rejected() {
        let requests = [req(1, 0, 1), req(1, 0, 2)];
        let err = RendezvousResolver
            .resolve(&requests, &NoComm, &IndexerOptions::default())
            .unwrap_err();
        assert!(matches!(err, DofError::SlotCountMismatch { .. }));
    }

    #[test]
    fn two_ranks_agree_on_shared_pairs() {
        let comms = RayonComm::world(2);
        let declared = [
            vec![req(1, 0, 1), req(2, 0, 1), req(3, 0, 1)],
            vec![req(2, 0, 1), req(3, 0, 1), req(4, 0, 1)],
        ];
        let handles: Vec<_> = comms
            .into_iter()
            .zip(declared)
            .map(|(comm, reqs)| {
                std::thread::spawn(move || {
                    RendezvousResolver
                        .resolve(&reqs, &comm, &IndexerOptions::default())
                        .unwrap()
                })
            })
            .collect();
        let res: Vec<Numbering> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for p in [2u64, 3] {
            let key = DofKey::new(PointId::new(p).unwrap(), 0);
            assert_eq!(res[0].dofs[&key], res[1].dofs[&key]);
            assert_eq!(res[0].dofs[&key].owner, 0);
        }
        assert_eq!(res[0].owned_range(), 0..3);
        assert_eq!(res[1].owned_range(), 3..4);
        assert_eq!(res[1].ghost_gids(), vec![1, 2]);
        assert_eq!(res[0].sends.get(&1).map(Vec::len), Some(2));
        assert_eq!(res[1].recvs.get(&0).map(Vec::len), Some(2));
    }
}
