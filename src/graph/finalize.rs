//! The collective that turns staged mail into owned rows.
//!
//! ```text
//! staging ──encode──▶ sizes (all-to-all) ──▶ payloads (all-to-all-v)
//!                                                   │
//!                  local graph ◀──merge── scratch ◀─┴─decode
//!                                   ▲
//!                        status round: did any rank fail?
//! ```
//!
//! Received records are decoded into a scratch graph and only merged once
//! every rank has reported success, so a failed finalize never leaves
//! partially merged mail behind. Transport failures abort at once; malformed
//! payloads still take part in the status round so healthy peers learn
//! about them and fail with [`SparseGraphError::PeerFailure`] instead of
//! hanging.

use std::ops::Range;

use super::graph_trait::RowGraph;
use super::local::LocalSparseGraph;
use super::staging::NonLocalStaging;
use crate::GlobalIndex;
use crate::algs::collective::error_if_true_on_any_rank;
use crate::algs::communicator::{Communicator, GraphCommTags};
use crate::algs::exchange::{all_to_all_counts_partial, all_to_all_v};
use crate::algs::wire::{KIND_ROW_BLOCKS, WIRE_VERSION, WireHdr, WireIndex};
use crate::graph_error::SparseGraphError;

/// Traffic summary of one finalize.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ExchangeStats {
    pub peers_sent: usize,
    pub bytes_sent: usize,
    pub words_sent: usize,
    pub peers_received: usize,
    pub bytes_received: usize,
    pub records_received: usize,
    pub entries_received: usize,
}

fn protocol_error(
    source_rank: usize,
    expected: usize,
    actual: usize,
    reason: &'static str,
) -> SparseGraphError {
    SparseGraphError::ProtocolError {
        source_rank,
        expected,
        actual,
        reason,
    }
}

/// Decode one row-block payload from `source_rank` into `into`.
///
/// Every row must lie in `owned` and every column in `columns`.
/// Returns the number of records decoded.
pub fn decode_row_blocks(
    source_rank: usize,
    bytes: &[u8],
    owned: &Range<GlobalIndex>,
    columns: &Range<GlobalIndex>,
    into: &mut LocalSparseGraph,
) -> Result<usize, SparseGraphError> {
    let hdr = WireHdr::read(bytes).ok_or_else(|| {
        protocol_error(source_rank, WireHdr::SIZE, bytes.len(), "payload shorter than header")
    })?;
    if hdr.version() != WIRE_VERSION {
        return Err(protocol_error(
            source_rank,
            usize::from(WIRE_VERSION),
            usize::from(hdr.version()),
            "unsupported wire version",
        ));
    }
    if hdr.kind() != KIND_ROW_BLOCKS {
        return Err(protocol_error(
            source_rank,
            usize::from(KIND_ROW_BLOCKS),
            usize::from(hdr.kind()),
            "payload is not a row-block message",
        ));
    }
    let body = &bytes[WireHdr::SIZE..];
    if body.len() % WireIndex::SIZE != 0 {
        return Err(protocol_error(
            source_rank,
            body.len() - body.len() % WireIndex::SIZE,
            body.len(),
            "payload is not a whole number of words",
        ));
    }

    let mut words = body.chunks_exact(WireIndex::SIZE).map(|c| WireIndex::read(c).get());
    let mut remaining = body.len() / WireIndex::SIZE;
    let mut records = 0usize;
    while let Some(row) = words.next() {
        let count = words
            .next()
            .ok_or_else(|| protocol_error(source_rank, 2, 1, "record truncated before its count"))?;
        remaining -= 2;
        if count > remaining {
            return Err(protocol_error(
                source_rank,
                count,
                remaining,
                "record count exceeds remaining words",
            ));
        }
        if !owned.contains(&row) {
            return Err(protocol_error(
                source_rank,
                owned.start,
                row,
                "row is not owned by the receiving rank",
            ));
        }
        remaining -= count;
        for col in words.by_ref().take(count) {
            if !columns.contains(&col) {
                return Err(protocol_error(
                    source_rank,
                    columns.end,
                    col,
                    "column outside the column range",
                ));
            }
            into.add_entry(row, col);
        }
        records += 1;
    }
    Ok(records)
}

fn decode_all(
    buffers: &[Vec<u8>],
    owned: &Range<GlobalIndex>,
    columns: &Range<GlobalIndex>,
    stats: &mut ExchangeStats,
) -> Result<LocalSparseGraph, SparseGraphError> {
    let mut scratch = LocalSparseGraph::new();
    for (src, buf) in buffers.iter().enumerate().filter(|(_, b)| !b.is_empty()) {
        let n = decode_row_blocks(src, buf, owned, columns, &mut scratch)?;
        stats.peers_received += 1;
        stats.bytes_received += buf.len();
        stats.records_received += n;
    }
    Ok(scratch)
}

/// Run the exchange for one rank and merge the received rows into `local`.
///
/// Collective: every rank of `comm` must call it with the same `tags`.
/// `staging` is read, never cleared; the caller does that on success.
pub fn exchange_and_merge<C>(
    comm: &C,
    staging: &NonLocalStaging,
    local: &mut LocalSparseGraph,
    owned: &Range<GlobalIndex>,
    columns: &Range<GlobalIndex>,
    tags: &GraphCommTags,
) -> Result<ExchangeStats, SparseGraphError>
where
    C: Communicator,
{
    let size = comm.size();
    let me = comm.rank();
    let payloads = staging.encode_payloads(size);

    let mut stats = ExchangeStats {
        words_sent: staging.num_words(),
        ..ExchangeStats::default()
    };
    for (peer, p) in payloads.iter().enumerate().filter(|(_, p)| !p.is_empty()) {
        log::trace!("rank {me}: {} bytes for rank {peer}", p.len());
        stats.peers_sent += 1;
        stats.bytes_sent += p.len();
    }

    // 1) sizes, then payloads
    let send_counts: Vec<usize> = payloads.iter().map(Vec::len).collect();
    let received = match all_to_all_counts_partial(comm, &send_counts, tags.sizes) {
        Ok((recv_sizes, None)) => all_to_all_v(comm, &payloads, &recv_sizes, tags.data),
        Ok((recv_sizes, Some(err))) => {
            // Still deliver our payloads and drain every intact announcement,
            // so no mail is left queued on the data tag.
            match all_to_all_v(comm, &payloads, &recv_sizes, tags.data) {
                Err(fatal @ SparseGraphError::CommError { .. }) => Err(fatal),
                _ => Err(err),
            }
        }
        Err(err) => Err(err),
    };

    // 2) decode into scratch; transport failures abort here
    let outcome = match received {
        Err(err @ SparseGraphError::CommError { .. }) => {
            log::error!("rank {me}: finalize aborted: {err}");
            return Err(err);
        }
        Err(err) => Err(err),
        Ok(buffers) => decode_all(&buffers, owned, columns, &mut stats),
    };

    // 3) status round
    let any_failed = error_if_true_on_any_rank(comm, outcome.is_err(), tags.status)?;
    match outcome {
        Err(err) => {
            log::error!("rank {me}: finalize failed: {err}");
            Err(err)
        }
        Ok(_) if any_failed => {
            log::warn!("rank {me}: a peer failed during finalize");
            Err(SparseGraphError::PeerFailure { rank: me })
        }
        Ok(scratch) => {
            stats.entries_received = scratch.num_entries();
            local.merge(&scratch);
            Ok(stats)
        }
    }
}
