//! Sparsity containers, the distributed graph and its CSR export.

pub mod config;
pub mod contiguous;
pub mod csr;
pub mod distributed;
pub mod finalize;
pub mod graph_trait;
pub mod local;
#[cfg(feature = "rayon")]
pub mod parallel;
pub mod staging;

pub use config::{FinalizePolicy, GraphConfig};
pub use contiguous::ContiguousRowGraph;
pub use csr::{CsrArrays, export_csr, export_csr_derived};
pub use distributed::DistributedSparseGraph;
pub use finalize::ExchangeStats;
pub use graph_trait::RowGraph;
pub use local::LocalSparseGraph;
pub use staging::NonLocalStaging;
