#![allow(dead_code)]
use std::sync::Arc;

use mesh_dofs::{
    algs::communicator::RayonComm,
    pattern::{FieldPattern, SubCellPattern},
    topology::{CellType, ConnManager, InMemoryConnManager, PointId},
};

pub fn pid(u: u64) -> PointId {
    PointId::new(u).unwrap()
}

/// Key of the edge between two vertex keys (orientation-free).
pub fn edge_key(a: u64, b: u64) -> u64 {
    1_000_000 + a.min(b) * 1000 + a.max(b)
}

/// Key of the interior of global triangle `k`.
pub fn cell_key(k: u64) -> u64 {
    2_000_000 + k
}

/// Add a triangle with vertex keys `(a, b, c)`; edge `i` joins vertex `i`
/// and vertex `i + 1`.
pub fn add_triangle(conn: &mut InMemoryConnManager, element: usize, global: u64, v: [u64; 3]) {
    conn.add_element(
        element,
        0,
        vec![
            v.iter().map(|&x| pid(x)).collect(),
            vec![
                pid(edge_key(v[0], v[1])),
                pid(edge_key(v[1], v[2])),
                pid(edge_key(v[2], v[0])),
            ],
            vec![pid(cell_key(global))],
        ],
    )
    .unwrap();
}

/// Rank 0 holds triangle {1,2,3}, rank 1 holds triangle {2,4,3}.
pub fn two_rank_triangles(rank: usize) -> Arc<dyn ConnManager> {
    let mut conn = InMemoryConnManager::new();
    conn.add_block(0, CellType::Triangle);
    match rank {
        0 => add_triangle(&mut conn, 0, 0, [1, 2, 3]),
        _ => add_triangle(&mut conn, 0, 1, [2, 4, 3]),
    }
    Arc::new(conn)
}

/// Strip of `total` triangles, triangle `k` on vertices `(k+1, k+2, k+3)`,
/// split into contiguous chunks over `size` ranks. Local element ids start
/// at zero on every rank.
pub fn triangle_strip(rank: usize, size: usize, total: usize) -> Arc<dyn ConnManager> {
    let mut conn = InMemoryConnManager::new();
    conn.add_block(0, CellType::Triangle);
    let per = total.div_ceil(size);
    let lo = (rank * per).min(total);
    let hi = ((rank + 1) * per).min(total);
    for (local, k) in (lo..hi).enumerate() {
        let k = k as u64;
        add_triangle(&mut conn, local, k, [k + 1, k + 2, k + 3]);
    }
    Arc::new(conn)
}

pub fn nodal() -> Arc<dyn FieldPattern> {
    Arc::new(SubCellPattern::nodal(CellType::Triangle))
}

pub fn edges() -> Arc<dyn FieldPattern> {
    Arc::new(SubCellPattern::edge(CellType::Triangle))
}

/// Run `f` once per rank of a fresh in-process world, one thread per rank,
/// and collect the results by rank.
pub fn run_ranks<T, F>(size: usize, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(RayonComm) -> T + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let handles: Vec<_> = RayonComm::world(size)
        .into_iter()
        .map(|comm| {
            let f = Arc::clone(&f);
            std::thread::spawn(move || f(comm))
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

/// Assert vec is a permutation of another vec (order-agnostic).
pub fn assert_permutation<T: Ord + Copy + std::fmt::Debug>(got: &[T], want: &[T]) {
    let mut a = got.to_vec();
    a.sort_unstable();
    let mut b = want.to_vec();
    b.sort_unstable();
    assert_eq!(a, b, "not a permutation\n got={:?}\nwant={:?}", got, want);
}
