mod util;

use std::sync::Arc;

use mesh_sparsity::prelude::*;
use util::*;

#[test]
fn empty_middle_row_is_a_zero_width_span() {
    let mut g = LocalSparseGraph::new();
    g.add_entries(&[0, 1]);
    g.add_entries(&[3, 4]);
    let csr = export_csr(&g, 5).unwrap();
    let off = csr.row_offsets();
    assert_eq!(off.len(), 6);
    assert_eq!(off[3], off[2]);
    assert_eq!(csr.row(2).unwrap(), &[] as &[usize]);
    assert_eq!(csr.global_row(3).unwrap(), &[3, 4]);
}

#[test]
fn csr_rows_are_strictly_ascending_and_complete() {
    let reference = reference_graph();
    let csr = export_csr_derived(&reference).unwrap();
    assert_eq!(csr.num_rows(), NUM_DOFS);
    assert_eq!(csr.nnz(), reference.num_entries());
    assert_eq!(csr.nnz(), 379);
    for (row, cols) in csr.iter_rows() {
        assert!(cols.windows(2).all(|w| w[0] < w[1]), "row {row} not ascending");
        if row == 20 {
            // no fixture element touches DOF 20
            assert!(cols.is_empty());
            continue;
        }
        assert!(cols.contains(&row), "row {row} lacks its diagonal");
        assert_eq!(cols, reference.columns(row).collect::<Vec<_>>().as_slice());
    }
    assert_eq!(csr.entry_set(), reference.entry_set());
}

#[test]
fn contiguous_graph_exports_the_same_csr() {
    let mut c = ContiguousRowGraph::new(NUM_DOFS);
    for e in &ELEMENTS {
        c.add_entries(e).unwrap();
    }
    let a = export_csr(&c, NUM_DOFS).unwrap();
    let b = export_csr(&reference_graph(), NUM_DOFS).unwrap();
    assert_eq!(a, b);
}

#[test]
fn distributed_export_has_one_span_per_owned_row() {
    // rank 1 owns rows 10..20; only row 12 receives entries
    let part = Arc::new(IndexPartition::even(40, 4).unwrap());
    let csrs = on_ranks(4, |c| {
        let mut g = DistributedSparseGraph::new(Arc::clone(&part), c).unwrap();
        if c.rank() == 3 {
            g.add_entries(&[12, 35]).unwrap();
        }
        g.finalize().unwrap();
        g.export_csr().unwrap()
    });
    let csr = &csrs[1];
    assert_eq!(csr.first_row(), 10);
    assert_eq!(csr.num_rows(), 10);
    assert_eq!(csr.row_offsets(), &[0, 0, 0, 2, 2, 2, 2, 2, 2, 2, 2]);
    assert_eq!(csr.global_row(12).unwrap(), &[12, 35]);
    assert_eq!(csrs[0].nnz(), 0);
    assert_eq!(csrs[3].global_row(35).unwrap(), &[12, 35]);

    let (first, offsets, cols) = csrs[1].clone().into_parts();
    assert_eq!(first, 10);
    assert_eq!(offsets.last().copied(), Some(cols.len()));
}
