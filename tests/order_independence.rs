mod util;

use std::sync::Arc;

use mesh_sparsity::prelude::*;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use util::*;

#[test]
fn shuffled_and_repeated_insertions_build_the_same_graph() {
    let want = reference_graph().entry_set();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..20 {
        let mut elements: Vec<[usize; 4]> = ELEMENTS.to_vec();
        // repeat a few elements, then shuffle elements and their nodes
        for _ in 0..5 {
            let e = elements[rng.gen_range(0..ELEMENTS.len())];
            elements.push(e);
        }
        elements.shuffle(&mut rng);
        let mut g = LocalSparseGraph::new();
        for mut e in elements {
            e.shuffle(&mut rng);
            g.add_entries(&e);
        }
        assert_eq!(g.entry_set(), want);
    }
}

#[test]
fn shuffled_distribution_over_ranks_matches_reference() {
    let want = reference_graph().entry_set();
    let mut rng = StdRng::seed_from_u64(7);
    for size in [2, 3, 5] {
        // hand every element to a random rank, in a random order
        let mut owner_of: Vec<usize> = (0..ELEMENTS.len()).map(|_| rng.gen_range(0..size)).collect();
        owner_of.shuffle(&mut rng);
        let part = dof_partition(size);
        let parts = on_ranks(size, |c| {
            let mut g = DistributedSparseGraph::new(Arc::clone(&part), c).unwrap();
            for (e, _) in ELEMENTS.iter().zip(&owner_of).filter(|(_, o)| **o == c.rank()) {
                g.add_entries(e).unwrap();
            }
            g.finalize().unwrap();
            g.local_graph().entry_set()
        });
        let union: EntrySet = parts.into_iter().flatten().collect();
        assert_eq!(union, want, "P={size}");
    }
}

proptest! {
    #[test]
    fn insertion_is_idempotent(blocks in prop::collection::vec(prop::collection::vec(0usize..30, 1..5), 1..20)) {
        let mut once = LocalSparseGraph::new();
        let mut twice = LocalSparseGraph::new();
        for b in &blocks {
            once.add_entries(b);
            twice.add_entries(b);
            twice.add_entries(b);
        }
        prop_assert_eq!(once.entry_set(), twice.entry_set());
        for b in &blocks {
            for &i in b {
                prop_assert!(once.has(i, i));
            }
        }
    }

    #[test]
    fn reversed_block_order_is_equivalent(blocks in prop::collection::vec(prop::collection::vec(0usize..30, 1..5), 1..20)) {
        let mut fwd = LocalSparseGraph::new();
        let mut rev = ContiguousRowGraph::new(30);
        for b in &blocks {
            fwd.add_entries(b);
        }
        for b in blocks.iter().rev() {
            rev.add_entries(b).unwrap();
        }
        prop_assert_eq!(fwd.entry_set(), rev.entry_set());
        let csr = export_csr(&fwd, 30).unwrap();
        prop_assert!(csr.validate_invariants().is_ok());
    }
}
