//! Ranks built with `RayonComm::new` share the process-global mailbox, so
//! these tests must not overlap.
mod util;
use util::*;

use mesh_dofs::algs::communicator::{CommTag, RayonComm};
use mesh_dofs::dof::{DofManager, IndexerOptions};
use serial_test::serial;

fn build_on_global_mailbox(opts: IndexerOptions) -> Vec<Vec<u64>> {
    let handles: Vec<_> = (0..2)
        .map(|rank| {
            std::thread::spawn(move || {
                let mut dm: DofManager<RayonComm> =
                    DofManager::with_options(RayonComm::new(rank, 2), opts);
                dm.set_conn_manager(two_rank_triangles(rank));
                dm.add_field("u", nodal()).unwrap();
                dm.build_global_unknowns().unwrap();
                dm.element_gids(0).unwrap().unwrap().to_vec()
            })
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
#[serial]
fn default_tags_on_global_mailbox() {
    let got = build_on_global_mailbox(IndexerOptions::default());
    assert_eq!(got, vec![vec![0, 1, 2], vec![1, 3, 2]]);
}

#[test]
#[serial]
fn custom_base_tag_on_global_mailbox() {
    let got = build_on_global_mailbox(IndexerOptions::with_base_tag(CommTag::new(0x7000)));
    assert_eq!(got, vec![vec![0, 1, 2], vec![1, 3, 2]]);
}
