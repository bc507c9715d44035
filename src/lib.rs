#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-sparsity
//!
//! mesh-sparsity builds the sparsity pattern of large sparse matrices (for
//! example a finite-element stiffness matrix) whose rows are partitioned
//! across processes. Element connectivity lists are inserted on whichever
//! rank assembles the element; entries addressed to rows owned elsewhere are
//! staged and delivered during a single collective [`finalize`] step, after
//! which each rank holds the complete, deduplicated pattern of the rows it
//! owns and can export it as CSR arrays for a numeric matrix builder.
//!
//! ## Features
//! - [`LocalSparseGraph`] and [`ContiguousRowGraph`] single-process containers
//! - [`DistributedSparseGraph`] with ownership routing and staged outgoing mail
//! - Pluggable communication backends (serial, in-process threads, MPI)
//! - Deterministic, order-independent finalization
//! - CSR export with one span per owned row, including empty rows
//!
//! ## Usage
//!
//! ```
//! use mesh_sparsity::prelude::*;
//! use std::sync::Arc;
//!
//! let comm = NoComm;
//! let partition = Arc::new(IndexPartition::even(40, 1).unwrap());
//! let mut graph = DistributedSparseGraph::new(partition, &comm).unwrap();
//! graph.add_entries(&[19, 11, 7, 39]).unwrap();
//! graph.finalize().unwrap();
//! let csr = graph.export_csr().unwrap();
//! assert_eq!(csr.global_row(19).unwrap(), &[7, 11, 19, 39]);
//! ```
//!
//! ## Feature flags
//! - `rayon`: thread-local assembly followed by a merge (`graph::parallel`).
//! - `mpi-support`: the MPI communicator backend.
//!
//! [`finalize`]: graph::distributed::DistributedSparseGraph::finalize
//! [`LocalSparseGraph`]: graph::local::LocalSparseGraph
//! [`ContiguousRowGraph`]: graph::contiguous::ContiguousRowGraph
//! [`DistributedSparseGraph`]: graph::distributed::DistributedSparseGraph

pub mod algs;
pub mod debug_invariants;
pub mod graph;
pub mod graph_error;
pub mod partition;

pub use debug_invariants::DebugInvariants;

/// Row or column index in the global sparse matrix.
pub type GlobalIndex = usize;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::GlobalIndex;
    pub use crate::algs::collective::{ReduceOp, max_all, min_all, sum_all};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{
        CommTag, Communicator, GraphCommTags, NoComm, ThreadComm, Wait,
    };
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::graph::config::{FinalizePolicy, GraphConfig};
    pub use crate::graph::contiguous::ContiguousRowGraph;
    pub use crate::graph::csr::{CsrArrays, export_csr, export_csr_derived};
    pub use crate::graph::distributed::DistributedSparseGraph;
    pub use crate::graph::graph_trait::RowGraph;
    pub use crate::graph::local::LocalSparseGraph;
    pub use crate::graph_error::SparseGraphError;
    pub use crate::partition::bounds::{IndexPartition, compute_bounds, owner_rank_of};
}
