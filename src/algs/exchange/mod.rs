//! Two-stage all-to-all exchange: counts first, then payloads.

pub mod payload_exchange;
pub mod size_exchange;

pub use payload_exchange::{all_to_all_v, exchange_buffers};
pub use size_exchange::{all_to_all_counts, all_to_all_counts_partial};
