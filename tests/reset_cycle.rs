mod util;
use util::*;

use mesh_dofs::algs::communicator::{Communicator, NoComm, RayonComm};
use mesh_dofs::dof::DofManager;
use mesh_dofs::dof_error::DofError;

#[test]
fn empty_registry_builds_zero_dofs() {
    let mut dm: DofManager<NoComm> = DofManager::with_conn_manager(triangle_strip(0, 1, 3), NoComm);
    dm.build_global_unknowns().unwrap();
    assert_eq!(dm.num_fields(), 0);
    assert_eq!(dm.num_owned_dofs().unwrap(), 0);
    assert_eq!(dm.num_overlapped_dofs().unwrap(), 0);
    assert!(dm.map().unwrap().is_empty());
    assert!(dm.overlap_map().unwrap().is_empty());
    assert_eq!(dm.graph().unwrap().num_entries(), 0);
    for e in 0..3 {
        assert_eq!(dm.element_gids(e).unwrap(), Some(&[][..]));
    }
}

#[test]
fn reset_keeps_fields_and_rebuild_is_identical() {
    let mut dm: DofManager<NoComm> = DofManager::with_conn_manager(triangle_strip(0, 1, 4), NoComm);
    dm.add_field("u", nodal()).unwrap();
    dm.add_field("flux", edges()).unwrap();
    dm.build_global_unknowns().unwrap();
    let first: Vec<Vec<u64>> = (0..4)
        .map(|e| dm.element_gids(e).unwrap().unwrap().to_vec())
        .collect();
    let first_graph = dm.graph().unwrap();

    let conn = dm.reset_indices().unwrap();
    assert!(!dm.is_built());
    assert_eq!(dm.num_fields(), 2);
    assert_eq!(dm.element_gids(0), Err(DofError::NotBuilt));
    assert_eq!(dm.build_global_unknowns(), Err(DofError::MissingConnManager));

    dm.set_conn_manager(conn);
    dm.build_global_unknowns().unwrap();
    let second: Vec<Vec<u64>> = (0..4)
        .map(|e| dm.element_gids(e).unwrap().unwrap().to_vec())
        .collect();
    assert_eq!(first, second);
    assert_eq!(dm.num_fields(), 2);
    let second_graph = dm.graph().unwrap();
    assert_eq!(first_graph.xadj, second_graph.xadj);
    assert_eq!(first_graph.adjncy, second_graph.adjncy);
}

#[test]
fn rebuild_without_reset_replaces_cached_objects() {
    let mut dm: DofManager<NoComm> = DofManager::with_conn_manager(triangle_strip(0, 1, 2), NoComm);
    dm.add_field("u", nodal()).unwrap();
    dm.build_global_unknowns().unwrap();
    let before = dm.map().unwrap();
    dm.build_global_unknowns().unwrap();
    let after = dm.map().unwrap();
    assert!(!std::sync::Arc::ptr_eq(&before, &after));
    assert_eq!(before.gids(), after.gids());
}

#[test]
fn parallel_numbering_is_reproducible() {
    let run = || {
        run_ranks(2, |comm| {
            let rank = comm.rank();
            let mut dm: DofManager<RayonComm> =
                DofManager::with_conn_manager(triangle_strip(rank, 2, 5), comm);
            dm.add_field("u", nodal()).unwrap();
            dm.add_field("flux", edges()).unwrap();
            dm.build_global_unknowns().unwrap();
            let first: Vec<Vec<u64>> = (0..3)
                .filter_map(|e| dm.element_gids(e).unwrap().map(<[u64]>::to_vec))
                .collect();

            let conn = dm.reset_indices().unwrap();
            dm.set_conn_manager(conn);
            dm.build_global_unknowns().unwrap();
            let second: Vec<Vec<u64>> = (0..3)
                .filter_map(|e| dm.element_gids(e).unwrap().map(<[u64]>::to_vec))
                .collect();
            assert_eq!(first, second);
            first
        })
    };
    assert_eq!(run(), run());
}
