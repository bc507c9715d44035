//! Construction-time options for [`DistributedSparseGraph`](super::distributed::DistributedSparseGraph).

use crate::algs::communicator::GraphCommTags;

/// What a second call to `finalize()` does.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FinalizePolicy {
    /// Repeated calls are no-ops.
    #[default]
    Idempotent,
    /// Repeated calls fail with `AlreadyFinalized`.
    Strict,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GraphConfig {
    pub finalize_policy: FinalizePolicy,
    /// Tags used by the finalize exchange. Two graphs finalized concurrently
    /// on the same communicator need distinct tags.
    pub tags: GraphCommTags,
    /// Deduplicate staged records before sending.
    pub compact_staging: bool,
    /// Width of the column space, starting at the partition's first index.
    /// `None` means square: the same range as the rows.
    pub num_columns: Option<usize>,
    /// Validate graph invariants after finalize even in release builds.
    pub check_invariants: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            finalize_policy: FinalizePolicy::Idempotent,
            tags: GraphCommTags::default(),
            compact_staging: true,
            num_columns: None,
            check_invariants: false,
        }
    }
}
