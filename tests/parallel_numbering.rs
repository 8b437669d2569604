mod util;
use util::*;

use std::collections::{BTreeMap, BTreeSet};

use std::sync::Arc;

use mesh_dofs::algs::communicator::{Communicator, RayonComm};
use mesh_dofs::algs::resolver::OwnershipPolicy;
use mesh_dofs::dof::{DofManager, IndexerOptions};
use mesh_dofs::pattern::SubCellPattern;
use mesh_dofs::topology::{CellType, DofKey};
use proptest::prelude::*;

#[test]
fn two_rank_shared_node_sees_one_gid() {
    let res = run_ranks(2, |comm| {
        let rank = comm.rank();
        let mut dm: DofManager<RayonComm> =
            DofManager::with_conn_manager(two_rank_triangles(rank), comm);
        dm.add_field("u", nodal()).unwrap();
        dm.build_global_unknowns().unwrap();
        (
            dm.element_gids(0).unwrap().unwrap().to_vec(),
            dm.num_owned_dofs().unwrap(),
            dm.num_overlapped_dofs().unwrap(),
        )
    });
    let (e0, owned0, overlap0) = &res[0];
    let (e1, owned1, overlap1) = &res[1];
    // E0 = {1,2,3}, E1 = {2,4,3}: vertex 2 is e0[1] / e1[0], vertex 3 is e0[2] / e1[2]
    assert_eq!(e0[1], e1[0]);
    assert_eq!(e0[2], e1[2]);
    assert_eq!(e0, &vec![0, 1, 2]);
    assert_eq!(e1, &vec![1, 3, 2]);
    assert_eq!((*owned0, *overlap0), (3, 3));
    assert_eq!((*owned1, *overlap1), (1, 3));
}

#[test]
fn highest_rank_policy_moves_shared_ownership() {
    let res = run_ranks(2, |comm| {
        let rank = comm.rank();
        let opts = IndexerOptions::default().with_ownership(OwnershipPolicy::HighestRank);
        let mut dm: DofManager<RayonComm> = DofManager::with_options(comm, opts);
        dm.set_conn_manager(two_rank_triangles(rank));
        dm.add_field("u", nodal()).unwrap();
        dm.build_global_unknowns().unwrap();
        (
            dm.element_gids(0).unwrap().unwrap().to_vec(),
            dm.map().unwrap().gids().to_vec(),
        )
    });
    assert_eq!(res[0].1, vec![0]);
    assert_eq!(res[1].1, vec![1, 2, 3]);
    assert_eq!(res[0].0, vec![0, 1, 2]);
    assert_eq!(res[1].0, vec![1, 3, 2]);
}

#[test]
fn strip_over_three_ranks_is_unique_and_partitioned() {
    const TOTAL: usize = 7;
    let res = run_ranks(3, |comm| {
        let rank = comm.rank();
        let mut dm: DofManager<RayonComm> =
            DofManager::with_conn_manager(triangle_strip(rank, 3, TOTAL), comm);
        dm.add_field("u", nodal()).unwrap();
        dm.add_field("flux", edges()).unwrap();
        dm.build_global_unknowns().unwrap();

        let numbering = dm.numbering().unwrap();
        let bases: BTreeMap<DofKey, u64> =
            numbering.dofs.iter().map(|(k, d)| (*k, d.base)).collect();
        let owned = dm.map().unwrap().gids().to_vec();
        let overlapped = dm.overlap_map().unwrap().gids().to_vec();
        let mut touched: BTreeSet<u64> = BTreeSet::new();
        let conn = dm.conn_manager().unwrap();
        for e in conn.element_block(0).unwrap() {
            touched.extend(dm.element_gids(*e).unwrap().unwrap());
        }
        (bases, owned, overlapped, touched, dm.num_global_dofs().unwrap())
    });

    // vertices + edges of the strip
    let expected = (TOTAL + 2) + (2 * TOTAL + 1);
    let mut all_owned = Vec::new();
    let mut agreed: BTreeMap<DofKey, u64> = BTreeMap::new();
    for (bases, owned, overlapped, touched, global) in &res {
        assert_eq!(*global as usize, expected);
        all_owned.extend(owned.iter().copied());
        assert_eq!(&overlapped[..owned.len()], &owned[..]);
        assert!(overlapped.windows(2).skip(owned.len()).all(|w| w[0] < w[1]));
        let overlap_set: BTreeSet<u64> = overlapped.iter().copied().collect();
        assert_eq!(&overlap_set, touched);
        for (k, &b) in bases {
            let prev = agreed.insert(*k, b);
            assert!(prev.is_none() || prev == Some(b), "ranks disagree on {k:?}");
        }
    }
    let want: Vec<u64> = (0..expected as u64).collect();
    assert_eq!(all_owned, want);

    let distinct: BTreeSet<u64> = agreed.values().copied().collect();
    assert_eq!(distinct.len(), agreed.len());
    assert_eq!(agreed.len(), expected);
}

#[test]
fn rank_without_elements_takes_part() {
    let res = run_ranks(3, |comm| {
        let rank = comm.rank();
        // two triangles over three ranks: rank 2 is empty
        let mut dm: DofManager<RayonComm> =
            DofManager::with_conn_manager(triangle_strip(rank, 3, 2), comm);
        dm.add_field("u", nodal()).unwrap();
        dm.build_global_unknowns().unwrap();
        (dm.num_owned_dofs().unwrap(), dm.num_global_dofs().unwrap())
    });
    assert_eq!(res[2], (0, 4));
    assert_eq!(res.iter().map(|r| r.0).sum::<usize>(), 4);
}


/// Per rank: base GID of every local key, and the owned GIDs.
type RankNumbering = (BTreeMap<DofKey, u64>, Vec<u64>, u64);

/// Number a `total`-triangle strip over `size` ranks. Bits of `mix` pick
/// the nodal, edge and two-per-cell interior fields.
fn number_strip(total: usize, size: usize, mix: u8) -> Vec<RankNumbering> {
    run_ranks(size, move |comm| {
        let rank = comm.rank();
        let mut dm: DofManager<RayonComm> =
            DofManager::with_conn_manager(triangle_strip(rank, size, total), comm);
        if mix & 1 != 0 {
            dm.add_field("u", nodal()).unwrap();
        }
        if mix & 2 != 0 {
            dm.add_field("flux", edges()).unwrap();
        }
        if mix & 4 != 0 {
            dm.add_field("p", Arc::new(SubCellPattern::interior(CellType::Triangle, 2)))
                .unwrap();
        }
        dm.build_global_unknowns().unwrap();
        let bases = dm
            .numbering()
            .unwrap()
            .dofs
            .iter()
            .map(|(k, d)| (*k, d.base))
            .collect();
        (
            bases,
            dm.map().unwrap().gids().to_vec(),
            dm.num_global_dofs().unwrap(),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn strip_numbering_is_a_deterministic_partition(
        total in 1usize..12,
        size in 1usize..=4,
        mix in 1u8..8,
    ) {
        let res = number_strip(total, size, mix);

        let mut expected = 0;
        if mix & 1 != 0 { expected += total + 2; }
        if mix & 2 != 0 { expected += 2 * total + 1; }
        if mix & 4 != 0 { expected += 2 * total; }

        let mut all_owned = Vec::new();
        let mut agreed: BTreeMap<DofKey, u64> = BTreeMap::new();
        for (bases, owned, global) in &res {
            prop_assert_eq!(*global as usize, expected);
            all_owned.extend(owned.iter().copied());
            for (k, &b) in bases {
                let prev = agreed.insert(*k, b);
                prop_assert!(prev.is_none() || prev == Some(b), "ranks disagree on {:?}", k);
            }
        }
        let want: Vec<u64> = (0..expected as u64).collect();
        prop_assert_eq!(all_owned, want);

        prop_assert_eq!(number_strip(total, size, mix), res);
    }
}
