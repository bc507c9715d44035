//! Thread-local assembly followed by a merge (`rayon` feature).
//!
//! A [`LocalSparseGraph`] is not thread safe, so each rayon worker builds
//! its own and the partial graphs are unioned pairwise. The result does not
//! depend on how the work was split, since merging is a set union.

use rayon::prelude::*;

use super::distributed::DistributedSparseGraph;
use super::local::LocalSparseGraph;
use crate::GlobalIndex;
use crate::algs::communicator::Communicator;
use crate::graph_error::SparseGraphError;

/// Build the graph of every dense block `b × b` in parallel.
pub fn assemble_blocks_parallel<B>(blocks: &[B]) -> LocalSparseGraph
where
    B: AsRef<[GlobalIndex]> + Sync,
{
    blocks
        .par_iter()
        .fold(LocalSparseGraph::new, |mut g, block| {
            g.add_entries(block.as_ref());
            g
        })
        .reduce(LocalSparseGraph::new, |mut a, b| {
            if a.num_rows() < b.num_rows() {
                let mut b = b;
                b.merge(&a);
                return b;
            }
            a.merge(&b);
            a
        })
}

/// Assemble `blocks` on the local threads, then route the result into
/// `graph` by row ownership.
pub fn add_blocks_parallel<C, B>(
    graph: &mut DistributedSparseGraph<'_, C>,
    blocks: &[B],
) -> Result<(), SparseGraphError>
where
    C: Communicator,
    B: AsRef<[GlobalIndex]> + Sync,
{
    let assembled = assemble_blocks_parallel(blocks);
    graph.add_graph(&assembled)
}
