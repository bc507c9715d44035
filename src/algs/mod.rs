//! Communication backends and the collectives built on them.

pub mod collective;
pub mod communicator;
pub mod exchange;
pub mod wire;

pub use communicator::{CommTag, Communicator, GraphCommTags, NoComm, ThreadComm, Wait};
pub use exchange::{all_to_all_counts, all_to_all_v, exchange_buffers};
