#![allow(dead_code)]
use std::collections::BTreeSet;
use std::sync::Arc;

use mesh_sparsity::prelude::*;

pub type EntrySet = BTreeSet<(usize, usize)>;

/// Number of degrees of freedom in the fixture mesh.
pub const NUM_DOFS: usize = 40;

/// Connectivities of 31 quadrilateral elements over 40 degrees of freedom.
pub const ELEMENTS: [[usize; 4]; 31] = [
    [19, 11, 7, 39],
    [33, 27, 22, 9],
    [11, 2, 3, 6],
    [8, 26, 3, 22],
    [0, 26, 5, 31],
    [1, 18, 35, 12],
    [3, 36, 23, 7],
    [16, 8, 18, 15],
    [16, 33, 10, 26],
    [25, 2, 18, 31],
    [33, 26, 4, 6],
    [19, 21, 22, 7],
    [9, 37, 29, 14],
    [18, 19, 14, 39],
    [24, 34, 37, 7],
    [16, 9, 29, 14],
    [17, 18, 11, 4],
    [16, 33, 28, 37],
    [37, 26, 11, 5],
    [8, 26, 35, 14],
    [24, 4, 30, 15],
    [16, 17, 12, 6],
    [32, 25, 35, 28],
    [24, 25, 14, 1],
    [24, 35, 5, 6],
    [28, 12, 38, 15],
    [8, 18, 35, 6],
    [28, 31, 22, 39],
    [1, 28, 13, 7],
    [17, 10, 36, 7],
    [25, 14, 30, 9],
];

/// Single-process graph of every fixture element.
pub fn reference_graph() -> LocalSparseGraph {
    let mut g = LocalSparseGraph::new();
    for e in &ELEMENTS {
        g.add_entries(e);
    }
    g
}

/// Elements assembled by `rank` when the 31 elements are split over `size` ranks.
pub fn elements_of(rank: usize, size: usize) -> &'static [[usize; 4]] {
    let b = compute_bounds(ELEMENTS.len(), size).unwrap();
    &ELEMENTS[b[rank]..b[rank + 1]]
}

/// Run `f` once per rank of a `size`-rank thread world and collect the results
/// in rank order.
pub fn on_ranks<R, F>(size: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(&ThreadComm) -> R + Sync,
{
    let comms = ThreadComm::world(size);
    run_on(&comms, f)
}

/// Like [`on_ranks`] over caller-built communicators.
pub fn run_on<R, F>(comms: &[ThreadComm], f: F) -> Vec<R>
where
    R: Send,
    F: Fn(&ThreadComm) -> R + Sync,
{
    let f = &f;
    std::thread::scope(|s| {
        let handles: Vec<_> = comms.iter().map(|c| s.spawn(move || f(c))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// Even DOF partition for `size` ranks.
pub fn dof_partition(size: usize) -> Arc<IndexPartition> {
    Arc::new(IndexPartition::even(NUM_DOFS, size).unwrap())
}
