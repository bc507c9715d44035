//! Row ownership: contiguous index blocks per rank.

pub mod bounds;

pub use bounds::{IndexPartition, compute_bounds, owner_rank_of};
