//! Row-partitioned sparsity graph spread over the ranks of a communicator.
//!
//! Each rank inserts the entries of the elements it assembles. Entries whose
//! row this rank owns go straight into its [`LocalSparseGraph`]; all others
//! are staged for their owner and delivered by the collective
//! [`finalize`](DistributedSparseGraph::finalize). Afterwards every rank
//! holds exactly the deduplicated entries of its own rows, whatever the
//! insertion order or the rank that inserted them.
//!
//! ```text
//! add_entries ─▶ owner == me ? ─yes─▶ local graph
//!                     │ no
//!                     ▼
//!               staging[owner] ──finalize──▶ owner's local graph
//! ```

use std::ops::Range;
use std::sync::Arc;

use super::config::{FinalizePolicy, GraphConfig};
use super::csr::CsrArrays;
use super::finalize::{ExchangeStats, exchange_and_merge};
use super::graph_trait::RowGraph;
use super::local::LocalSparseGraph;
use super::staging::NonLocalStaging;
use crate::GlobalIndex;
use crate::algs::collective::{barrier, sum_all};
use crate::algs::communicator::Communicator;
use crate::debug_invariants::DebugInvariants;
use crate::graph_error::SparseGraphError;
use crate::partition::IndexPartition;

/// Sparsity graph whose rows are owned by the ranks of `C`.
///
/// The communicator is borrowed for the graph's lifetime; the partition is
/// shared, since every graph built over the same row distribution uses it.
pub struct DistributedSparseGraph<'c, C: Communicator> {
    comm: &'c C,
    partition: Arc<IndexPartition>,
    config: GraphConfig,
    rank: usize,
    local_range: Range<GlobalIndex>,
    column_range: Range<GlobalIndex>,
    local: LocalSparseGraph,
    staging: NonLocalStaging,
    finalized: bool,
    stats: Option<ExchangeStats>,
}

impl<C: Communicator> std::fmt::Debug for DistributedSparseGraph<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedSparseGraph")
            .field("rank", &self.rank)
            .field("local_range", &self.local_range)
            .field("column_range", &self.column_range)
            .field("local_rows", &self.local.num_rows())
            .field("staged_words", &self.staging.num_words())
            .field("finalized", &self.finalized)
            .finish()
    }
}

impl<'c, C: Communicator> DistributedSparseGraph<'c, C> {
    pub fn new(partition: Arc<IndexPartition>, comm: &'c C) -> Result<Self, SparseGraphError> {
        Self::with_config(partition, comm, GraphConfig::default())
    }

    /// Build with explicit options. `partition` must have one part per rank.
    pub fn with_config(
        partition: Arc<IndexPartition>,
        comm: &'c C,
        config: GraphConfig,
    ) -> Result<Self, SparseGraphError> {
        partition.validate_invariants()?;
        if partition.num_ranks() != comm.size() {
            return Err(SparseGraphError::InvalidPartition(format!(
                "partition has {} parts but the communicator has {} ranks",
                partition.num_ranks(),
                comm.size()
            )));
        }
        let rank = comm.rank();
        let local_range = partition.local_range(rank).ok_or_else(|| {
            SparseGraphError::InvalidPartition(format!("rank {rank} has no part"))
        })?;
        let global = partition.global_range();
        let column_range = match config.num_columns {
            Some(n) => global.start..global.start + n,
            None => global,
        };
        Ok(Self {
            comm,
            partition,
            config,
            rank,
            local_range,
            column_range,
            local: LocalSparseGraph::new(),
            staging: NonLocalStaging::new(),
            finalized: false,
            stats: None,
        })
    }

    fn ensure_open(&self) -> Result<(), SparseGraphError> {
        if self.finalized {
            Err(SparseGraphError::AlreadyFinalized)
        } else {
            Ok(())
        }
    }

    #[inline]
    fn check_row(&self, row: GlobalIndex) -> Result<(), SparseGraphError> {
        self.partition.check(row)
    }

    #[inline]
    fn check_col(&self, col: GlobalIndex) -> Result<(), SparseGraphError> {
        if self.column_range.contains(&col) {
            Ok(())
        } else {
            Err(SparseGraphError::OutOfRange {
                index: col,
                start: self.column_range.start,
                end: self.column_range.end,
            })
        }
    }

    /// Send one already-validated row to its owner.
    fn route_row<I>(&mut self, row: GlobalIndex, cols: I) -> Result<(), SparseGraphError>
    where
        I: IntoIterator<Item = GlobalIndex>,
    {
        if self.local_range.contains(&row) {
            self.local.add_row_entries(row, cols);
        } else {
            let owner = self.partition.owner_rank(row)?;
            self.staging.stage_row(owner, row, cols);
        }
        Ok(())
    }

    /// Insert `(row, col)`.
    pub fn add_entry(&mut self, row: GlobalIndex, col: GlobalIndex) -> Result<(), SparseGraphError> {
        self.ensure_open()?;
        self.check_row(row)?;
        self.check_col(col)?;
        self.route_row(row, std::iter::once(col))
    }

    /// Insert the dense block `indices × indices`, diagonal included.
    ///
    /// Every index is validated before anything is inserted; on error the
    /// graph is unchanged.
    pub fn add_entries(&mut self, indices: &[GlobalIndex]) -> Result<(), SparseGraphError> {
        self.add_block(indices, indices)
    }

    /// Insert the rectangular block `rows × cols`, validated atomically.
    pub fn add_block(
        &mut self,
        rows: &[GlobalIndex],
        cols: &[GlobalIndex],
    ) -> Result<(), SparseGraphError> {
        self.ensure_open()?;
        rows.iter().try_for_each(|&r| self.check_row(r))?;
        cols.iter().try_for_each(|&c| self.check_col(c))?;
        for &row in rows {
            self.route_row(row, cols.iter().copied())?;
        }
        Ok(())
    }

    /// Insert `cols` into one row, validated atomically.
    pub fn add_row_entries(
        &mut self,
        row: GlobalIndex,
        cols: &[GlobalIndex],
    ) -> Result<(), SparseGraphError> {
        self.add_block(std::slice::from_ref(&row), cols)
    }

    /// Insert every entry of another graph, routing each row by ownership.
    pub fn add_graph<G: RowGraph>(&mut self, other: &G) -> Result<(), SparseGraphError> {
        self.ensure_open()?;
        for row in other.nonempty_rows() {
            self.check_row(row)?;
            other.columns(row).try_for_each(|c| self.check_col(c))?;
        }
        for row in other.nonempty_rows() {
            self.route_row(row, other.columns(row))?;
        }
        Ok(())
    }

    /// Collective: deliver staged entries to their owners.
    ///
    /// Every rank must call this. After success the staging is empty and the
    /// local graph holds every entry of the owned rows that any rank added.
    /// A failed finalize leaves the graph unusable for another attempt.
    pub fn finalize(&mut self) -> Result<(), SparseGraphError> {
        if self.finalized {
            return match self.config.finalize_policy {
                FinalizePolicy::Idempotent => Ok(()),
                FinalizePolicy::Strict => {
                    log::warn!("rank {}: finalize() called on a finalized graph", self.rank);
                    Err(SparseGraphError::AlreadyFinalized)
                }
            };
        }
        if self.config.compact_staging && !self.staging.is_empty() {
            self.staging.compact();
        }

        let stats = exchange_and_merge(
            self.comm,
            &self.staging,
            &mut self.local,
            &self.local_range,
            &self.column_range,
            &self.config.tags,
        )?;

        barrier(self.comm);
        self.staging.clear();
        self.finalized = true;
        self.stats = Some(stats);
        log::debug!(
            "rank {}: finalized {} rows / {} entries (sent {} words in {} bytes to {} peers, \
             received {} records in {} bytes from {} peers)",
            self.rank,
            self.local.num_rows(),
            self.local.num_entries(),
            stats.words_sent,
            stats.bytes_sent,
            stats.peers_sent,
            stats.records_received,
            stats.bytes_received,
            stats.peers_received,
        );

        if self.config.check_invariants {
            self.validate_invariants()?;
        }
        crate::debug_invariants!(self.validate_invariants(), "DistributedSparseGraph::finalize");
        Ok(())
    }

    /// CSR of the owned row range, one span per owned row.
    pub fn export_csr(&self) -> Result<CsrArrays, SparseGraphError> {
        if !self.finalized {
            return Err(SparseGraphError::NotFinalized);
        }
        CsrArrays::from_graph(&self.local, self.local_range.clone())
    }

    /// Collective: number of entries over all ranks.
    pub fn global_num_entries(&self) -> Result<usize, SparseGraphError> {
        if !self.finalized {
            return Err(SparseGraphError::NotFinalized);
        }
        sum_all(self.comm, self.local.num_entries(), self.config.tags.reduce)
    }

    /// Owned rows added so far; complete only after `finalize()`.
    pub fn local_graph(&self) -> &LocalSparseGraph {
        &self.local
    }

    /// Mail waiting for other ranks.
    pub fn staging(&self) -> &NonLocalStaging {
        &self.staging
    }

    /// Traffic of the completed finalize.
    pub fn exchange_stats(&self) -> Option<ExchangeStats> {
        self.stats
    }

    #[inline]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn partition(&self) -> &Arc<IndexPartition> {
        &self.partition
    }

    pub fn local_range(&self) -> Range<GlobalIndex> {
        self.local_range.clone()
    }

    pub fn column_range(&self) -> Range<GlobalIndex> {
        self.column_range.clone()
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }
}

impl<C: Communicator> DebugInvariants for DistributedSparseGraph<'_, C> {
    fn validate_invariants(&self) -> Result<(), SparseGraphError> {
        self.local.validate_invariants()?;
        if let Some(row) = self
            .local
            .nonempty_rows()
            .find(|r| !self.local_range.contains(r))
        {
            return Err(SparseGraphError::InvariantViolation(format!(
                "rank {} holds row {row} outside its range {:?}",
                self.rank, self.local_range
            )));
        }
        if let Some(rank) = self.staging.target_ranks().find(|&r| r == self.rank) {
            return Err(SparseGraphError::InvariantViolation(format!(
                "rank {rank} staged mail for itself"
            )));
        }
        if self.finalized && !self.staging.is_empty() {
            return Err(SparseGraphError::InvariantViolation(
                "staging is not empty after finalize".into(),
            ));
        }
        Ok(())
    }
}
