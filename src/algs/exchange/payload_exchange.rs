//! Stage 2 of the graph exchange: a variable-length all-to-all of payloads.
//!
//! Receive lengths come from stage 1 ([`all_to_all_counts`]). Zero-length
//! payloads are neither sent nor received; both sides know the length, so
//! skipping them on both ends keeps the message streams matched.

use super::size_exchange::all_to_all_counts;
use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::graph_error::SparseGraphError;

/// Send `send[d]` to every rank `d` and receive one buffer from every rank.
///
/// `recv_sizes[s]` is the byte length rank `s` announced. A payload whose
/// length differs from its announcement is a [`SparseGraphError::ProtocolError`];
/// a receive that never completes is a [`SparseGraphError::CommError`].
pub fn all_to_all_v<C>(
    comm: &C,
    send: &[Vec<u8>],
    recv_sizes: &[usize],
    tag: CommTag,
) -> Result<Vec<Vec<u8>>, SparseGraphError>
where
    C: Communicator,
{
    let size = comm.size();
    let me = comm.rank();
    for len in [send.len(), recv_sizes.len()] {
        if len != size {
            return Err(SparseGraphError::SizeMismatch {
                expected: size,
                found: len,
            });
        }
    }

    let mut pending_recvs = Vec::new();
    for peer in (0..size).filter(|&p| p != me && recv_sizes[p] > 0) {
        pending_recvs.push((peer, comm.irecv(peer, tag.as_u16(), recv_sizes[peer])));
    }

    let mut pending_sends = Vec::new();
    for peer in (0..size).filter(|&p| p != me && !send[p].is_empty()) {
        pending_sends.push(comm.isend(peer, tag.as_u16(), &send[peer]));
    }

    let mut received: Vec<Vec<u8>> = vec![Vec::new(); size];
    received[me] = send[me].clone();
    let mut maybe_err = None;
    for (peer, h) in pending_recvs {
        match h.wait() {
            Some(data) if data.len() == recv_sizes[peer] => received[peer] = data,
            Some(data) if maybe_err.is_none() => {
                maybe_err = Some(SparseGraphError::ProtocolError {
                    source_rank: peer,
                    expected: recv_sizes[peer],
                    actual: data.len(),
                    reason: "payload length differs from announced size",
                });
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(SparseGraphError::CommError {
                    neighbor: peer,
                    source: "No data received (wait returned None)".into(),
                });
            }
            _ => {}
        }
    }

    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(received),
    }
}

/// Size exchange followed by payload exchange.
pub fn exchange_buffers<C>(
    comm: &C,
    send: &[Vec<u8>],
    sizes_tag: CommTag,
    data_tag: CommTag,
) -> Result<Vec<Vec<u8>>, SparseGraphError>
where
    C: Communicator,
{
    let send_counts: Vec<usize> = send.iter().map(Vec::len).collect();
    let recv_sizes = all_to_all_counts(comm, &send_counts, sizes_tag)?;
    all_to_all_v(comm, send, &recv_sizes, data_tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, ThreadComm};

    #[test]
    fn serial_exchange_returns_self_payload() {
        let got = exchange_buffers(&NoComm, &[vec![1, 2, 3]], CommTag::new(1), CommTag::new(2))
            .unwrap();
        assert_eq!(got, vec![vec![1, 2, 3]]);
    }

    #[test]
    fn uneven_payloads_between_four_ranks() {
        let comms = ThreadComm::world(4);
        let results: Vec<Vec<Vec<u8>>> = std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|c| {
                    s.spawn(move || {
                        let r = c.rank() as u8;
                        // r sends `d` copies of byte r to rank d (rank 0 gets nothing)
                        let send: Vec<Vec<u8>> = (0..4u8).map(|d| vec![r; d as usize]).collect();
                        exchange_buffers(c, &send, CommTag::new(10), CommTag::new(11)).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for (d, got) in results.iter().enumerate() {
            for (src, buf) in got.iter().enumerate() {
                assert_eq!(buf, &vec![src as u8; d]);
            }
        }
    }

    #[test]
    fn oversized_payload_is_a_protocol_error() {
        let comms = ThreadComm::world(2);
        comms[0].isend(1, 21, &[0u8; 12]);
        let err = all_to_all_v(&comms[1], &[vec![], vec![]], &[8, 0], CommTag::new(21))
            .unwrap_err();
        assert_eq!(
            err,
            SparseGraphError::ProtocolError {
                source_rank: 0,
                expected: 8,
                actual: 12,
                reason: "payload length differs from announced size",
            }
        );
    }
}
