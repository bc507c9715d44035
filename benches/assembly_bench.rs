use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mesh_sparsity::prelude::*;

/// Random 8-node "elements" over `n` DOFs with local connectivity.
fn random_elements(n: usize, count: usize, seed: u64) -> Vec<Vec<usize>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let base = rng.gen_range(0..n);
            (0..8).map(|_| (base + rng.gen_range(0..64)) % n).collect()
        })
        .collect()
}

fn bench_local_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("local_assembly");
    for &n in &[10_000usize, 100_000] {
        let elements = random_elements(n, n / 4, 42);
        group.bench_with_input(BenchmarkId::new("btree", n), &elements, |b, els| {
            b.iter(|| {
                let mut g = LocalSparseGraph::new();
                for e in els {
                    g.add_entries(e);
                }
                g.num_entries()
            })
        });
        group.bench_with_input(BenchmarkId::new("contiguous", n), &elements, |b, els| {
            b.iter(|| {
                let mut g = ContiguousRowGraph::new(n);
                for e in els {
                    g.add_entries(e).unwrap();
                }
                g.num_entries()
            })
        });
    }
    group.finish();
}

fn bench_finalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("distributed_finalize");
    let n = 20_000;
    let elements = random_elements(n, n / 4, 7);
    for &ranks in &[1usize, 2, 4] {
        group.bench_with_input(BenchmarkId::from_parameter(ranks), &elements, |b, els| {
            let part = Arc::new(IndexPartition::even(n, ranks).unwrap());
            b.iter(|| {
                let comms = ThreadComm::world(ranks);
                std::thread::scope(|s| {
                    for comm in &comms {
                        let part = Arc::clone(&part);
                        s.spawn(move || {
                            let mut g = DistributedSparseGraph::new(part, comm).unwrap();
                            for e in els.iter().skip(comm.rank()).step_by(ranks) {
                                g.add_entries(e).unwrap();
                            }
                            g.finalize().unwrap();
                            g.export_csr().unwrap().nnz()
                        });
                    }
                });
            })
        });
    }
    group.finish();
}

fn bench_csr_export(c: &mut Criterion) {
    let n = 50_000;
    let mut g = LocalSparseGraph::new();
    for e in random_elements(n, n / 4, 3) {
        g.add_entries(&e);
    }
    c.bench_function("csr_export_50k", |b| b.iter(|| export_csr(&g, n).unwrap().nnz()));
}

criterion_group!(benches, bench_local_assembly, bench_finalize, bench_csr_export);
criterion_main!(benches);
