mod util;
use util::*;

use std::sync::Arc;

use mesh_dofs::algs::communicator::NoComm;
use mesh_dofs::dof::DofManager;
use mesh_dofs::dof_error::DofError;
use mesh_dofs::pattern::SubCellPattern;
use mesh_dofs::topology::{CellType, InMemoryConnManager};

fn single_triangle() -> DofManager<NoComm> {
    let mut conn = InMemoryConnManager::new();
    conn.add_block(0, CellType::Triangle);
    add_triangle(&mut conn, 0, 0, [1, 2, 3]);
    DofManager::with_conn_manager(Arc::new(conn), NoComm)
}

#[test]
fn nodal_plus_edge_on_one_triangle() {
    let mut dm = single_triangle();
    let a = dm.add_field("A", nodal()).unwrap();
    let b = dm.add_field("B", edges()).unwrap();
    dm.build_global_unknowns().unwrap();

    let gids = dm.element_gids(0).unwrap().unwrap();
    assert_eq!(gids.len(), 6);
    assert_permutation(gids, &[0, 1, 2, 3, 4, 5]);

    let a_offsets = dm.gid_field_offsets(0, a).unwrap().unwrap();
    let b_offsets = dm.gid_field_offsets(0, b).unwrap().unwrap();
    assert_eq!(a_offsets, &[0, 1, 2]);
    assert_eq!(b_offsets, &[3, 4, 5]);

    // node order: vertex keys 1,2,3
    let node_gids: Vec<u64> = a_offsets.iter().map(|&o| gids[o]).collect();
    assert_eq!(node_gids, vec![0, 1, 2]);
    // edge keys are larger than vertex keys, so edge GIDs follow
    let edge_gids: Vec<u64> = b_offsets.iter().map(|&o| gids[o]).collect();
    assert!(edge_gids.iter().all(|&g| g >= 3));
}

#[test]
fn several_slots_per_sub_cell_stay_contiguous() {
    let mut dm = single_triangle();
    let v = dm
        .add_field("velocity", Arc::new(SubCellPattern::with_counts(CellType::Triangle, &[2])))
        .unwrap();
    let p = dm.add_field("pressure", nodal()).unwrap();
    dm.build_global_unknowns().unwrap();

    // per vertex: velocity x2 then pressure
    assert_eq!(dm.gid_field_offsets(0, v).unwrap(), Some(&[0, 1, 3, 4, 6, 7][..]));
    assert_eq!(dm.gid_field_offsets(0, p).unwrap(), Some(&[2, 5, 8][..]));
    assert_eq!(
        dm.gid_field_offsets_for_sub_cell(0, v, 0, 1).unwrap(),
        Some(&[3, 4][..])
    );
    let gids = dm.element_gids(0).unwrap().unwrap();
    assert_eq!(gids[3] + 1, gids[4]);
}

#[test]
fn interior_dofs_use_the_cell_key() {
    let mut dm = single_triangle();
    let bubble = dm
        .add_field("bubble", Arc::new(SubCellPattern::interior(CellType::Triangle, 1)))
        .unwrap();
    dm.build_global_unknowns().unwrap();
    assert_eq!(dm.element_gids(0).unwrap(), Some(&[0][..]));
    assert_eq!(
        dm.gid_field_offsets_for_sub_cell(0, bubble, 2, 0).unwrap(),
        Some(&[0][..])
    );
}

#[test]
fn offsets_need_a_build() {
    let mut dm = single_triangle();
    let a = dm.add_field("A", nodal()).unwrap();
    assert_eq!(dm.gid_field_offsets(0, a), Err(DofError::NotBuilt));
}
