//! Stage 1 of the graph exchange: a fixed-size all-to-all of byte counts.
//!
//! Every rank tells every other rank how many bytes it is about to send.
//! The routine posts all receives, then all sends, waits for every receive
//! and drains every send handle before returning, even if an error occurs.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{WireLen, cast_slice};
use crate::graph_error::SparseGraphError;

/// Exchange one count per peer. `send_counts[d]` is the count addressed to
/// rank `d`; the result's entry `s` is the count rank `s` addressed to us.
/// The self entry is copied locally and never touches the transport.
pub fn all_to_all_counts<C>(
    comm: &C,
    send_counts: &[usize],
    tag: CommTag,
) -> Result<Vec<usize>, SparseGraphError>
where
    C: Communicator,
{
    let (counts, malformed) = all_to_all_counts_partial(comm, send_counts, tag)?;
    match malformed {
        Some(err) => Err(err),
        None => Ok(counts),
    }
}

/// Like [`all_to_all_counts`], but a malformed header does not discard the
/// counts that arrived intact.
///
/// The first [`SparseGraphError::ProtocolError`] is returned next to the
/// counts, and the count of every peer whose header was malformed is 0.
/// Transport failures are still returned as `Err`.
pub fn all_to_all_counts_partial<C>(
    comm: &C,
    send_counts: &[usize],
    tag: CommTag,
) -> Result<(Vec<usize>, Option<SparseGraphError>), SparseGraphError>
where
    C: Communicator,
{
    let size = comm.size();
    let me = comm.rank();
    if send_counts.len() != size {
        return Err(SparseGraphError::SizeMismatch {
            expected: size,
            found: send_counts.len(),
        });
    }

    // 1) post all receives
    let mut pending_recvs = Vec::with_capacity(size.saturating_sub(1));
    for peer in (0..size).filter(|&p| p != me) {
        pending_recvs.push((peer, comm.irecv(peer, tag.as_u16(), WireLen::SIZE)));
    }

    // 2) post all sends
    let mut pending_sends = Vec::with_capacity(size.saturating_sub(1));
    for peer in (0..size).filter(|&p| p != me) {
        let wire = WireLen::new(send_counts[peer]);
        pending_sends.push(comm.isend(
            peer,
            tag.as_u16(),
            cast_slice(std::slice::from_ref(&wire)),
        ));
    }

    // 3) wait for all recvs, collect counts (but do not early-return)
    let mut counts = vec![0usize; size];
    counts[me] = send_counts[me];
    let mut malformed = None;
    let mut comm_err = None;
    for (peer, h) in pending_recvs {
        match h.wait() {
            Some(data) if data.len() == WireLen::SIZE => {
                let wire: WireLen = bytemuck::pod_read_unaligned(&data);
                counts[peer] = wire.get();
                log::trace!("rank {me}: rank {peer} announces {} bytes", counts[peer]);
            }
            Some(data) => {
                log::warn!("rank {me}: {}-byte size header from rank {peer}", data.len());
                malformed.get_or_insert(SparseGraphError::ProtocolError {
                    source_rank: peer,
                    expected: WireLen::SIZE,
                    actual: data.len(),
                    reason: "size header has the wrong length",
                });
            }
            None => {
                comm_err.get_or_insert_with(|| SparseGraphError::CommError {
                    neighbor: peer,
                    source: format!("failed to receive size from rank {peer}").into(),
                });
            }
        }
    }

    // 4) always drain all send handles before returning
    for send in pending_sends {
        let _ = send.wait();
    }

    match comm_err {
        Some(err) => Err(err),
        None => Ok((counts, malformed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, ThreadComm};

    #[test]
    fn serial_counts_are_copied() {
        let got = all_to_all_counts(&NoComm, &[12], CommTag::new(1)).unwrap();
        assert_eq!(got, vec![12]);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let err = all_to_all_counts(&NoComm, &[1, 2], CommTag::new(1)).unwrap_err();
        assert_eq!(
            err,
            SparseGraphError::SizeMismatch {
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn three_ranks_transpose_counts() {
        let comms = ThreadComm::world(3);
        let results: Vec<Vec<usize>> = std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|c| {
                    s.spawn(move || {
                        let r = c.rank();
                        // rank r sends 10*r + d to rank d
                        let send: Vec<usize> = (0..3).map(|d| 10 * r + d).collect();
                        all_to_all_counts(c, &send, CommTag::new(9)).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for (d, got) in results.iter().enumerate() {
            let want: Vec<usize> = (0..3).map(|r| 10 * r + d).collect();
            assert_eq!(got, &want);
        }
    }

    #[test]
    fn truncated_header_is_a_protocol_error() {
        let comms = ThreadComm::world(2);
        // A bogus 3-byte "count" from rank 0, plus the real exchange from rank 1's view.
        comms[0].isend(1, 4, &[1, 2, 3]);
        let err = all_to_all_counts(&comms[1], &[0, 0], CommTag::new(4)).unwrap_err();
        assert!(matches!(
            err,
            SparseGraphError::ProtocolError {
                source_rank: 0,
                expected: 8,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn silent_peer_is_a_comm_error() {
        let comms = ThreadComm::world(2);
        let c1 = comms[1]
            .clone()
            .with_recv_timeout(std::time::Duration::from_millis(20));
        let err = all_to_all_counts(&c1, &[0, 0], CommTag::new(5)).unwrap_err();
        assert!(matches!(err, SparseGraphError::CommError { neighbor: 0, .. }));
    }

    #[test]
    fn malformed_header_keeps_other_counts() {
        let comms = ThreadComm::world(3);
        comms[0].isend(1, 6, &[1, 2, 3]);
        let wire = WireLen::new(24);
        comms[2].isend(1, 6, cast_slice(std::slice::from_ref(&wire)));
        let (counts, err) =
            all_to_all_counts_partial(&comms[1], &[0, 7, 0], CommTag::new(6)).unwrap();
        assert_eq!(counts, vec![0, 7, 24]);
        assert!(matches!(
            err,
            Some(SparseGraphError::ProtocolError {
                source_rank: 0,
                actual: 3,
                ..
            })
        ));
    }
}
