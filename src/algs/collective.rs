//! Scalar collectives built on point-to-point messages.
//!
//! Every rank contributes one value; contributions are combined in rank
//! order, so floating-point sums are bitwise identical on every rank.
//! [`reduce_to_root`] is the "local only" variant (only the root learns the
//! result); [`all_reduce`] and its `*_all` shorthands are collective.

use num_traits::Num;

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{WireHdr, WireScalar, decode_scalar, encode_scalar};
use crate::graph_error::SparseGraphError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Min,
    Max,
}

impl ReduceOp {
    pub fn apply<T: Num + PartialOrd + Copy>(self, a: T, b: T) -> T {
        match self {
            ReduceOp::Sum => a + b,
            ReduceOp::Min => {
                if b < a {
                    b
                } else {
                    a
                }
            }
            ReduceOp::Max => {
                if b > a {
                    b
                } else {
                    a
                }
            }
        }
    }
}

fn fold<T: Num + PartialOrd + Copy>(op: ReduceOp, values: &[T]) -> Option<T> {
    values.iter().copied().reduce(|acc, v| op.apply(acc, v))
}

/// Receive one scalar from each `(peer, handle)` into `values[peer]`,
/// remembering the first failure but always waiting on every handle.
fn collect_scalars<T, H>(
    pending: Vec<(usize, H)>,
    values: &mut [T],
) -> Option<SparseGraphError>
where
    T: WireScalar,
    H: Wait,
{
    let mut maybe_err = None;
    for (peer, h) in pending {
        match h.wait() {
            Some(data) => match decode_scalar::<T>(&data) {
                Some(v) => values[peer] = v,
                None if maybe_err.is_none() => {
                    maybe_err = Some(SparseGraphError::ProtocolError {
                        source_rank: peer,
                        expected: WireHdr::SIZE + 8,
                        actual: data.len(),
                        reason: "malformed reduction scalar",
                    });
                }
                None => {}
            },
            None if maybe_err.is_none() => {
                maybe_err = Some(SparseGraphError::CommError {
                    neighbor: peer,
                    source: format!("failed to receive reduction value from rank {peer}").into(),
                });
            }
            None => {}
        }
    }
    maybe_err
}

/// Combine `value` across all ranks with `op`; every rank gets the result.
pub fn all_reduce<C, T>(comm: &C, value: T, op: ReduceOp, tag: CommTag) -> Result<T, SparseGraphError>
where
    C: Communicator,
    T: WireScalar + Num + PartialOrd,
{
    let size = comm.size();
    let me = comm.rank();
    let msg = encode_scalar(value);

    let pending: Vec<_> = (0..size)
        .filter(|&p| p != me)
        .map(|p| (p, comm.irecv(p, tag.as_u16(), msg.len())))
        .collect();
    let sends: Vec<_> = (0..size)
        .filter(|&p| p != me)
        .map(|p| comm.isend(p, tag.as_u16(), &msg))
        .collect();

    let mut values = vec![value; size];
    let maybe_err = collect_scalars(pending, &mut values);
    for s in sends {
        let _ = s.wait();
    }
    match maybe_err {
        Some(err) => Err(err),
        None => Ok(fold(op, &values).unwrap_or(value)),
    }
}

/// Combine `value` across all ranks on `root` only; other ranks get `None`.
pub fn reduce_to_root<C, T>(
    comm: &C,
    value: T,
    op: ReduceOp,
    root: usize,
    tag: CommTag,
) -> Result<Option<T>, SparseGraphError>
where
    C: Communicator,
    T: WireScalar + Num + PartialOrd,
{
    let size = comm.size();
    let me = comm.rank();
    if root >= size {
        return Err(SparseGraphError::OutOfRange {
            index: root,
            start: 0,
            end: size,
        });
    }
    if me != root {
        let _ = comm.isend(root, tag.as_u16(), &encode_scalar(value)).wait();
        return Ok(None);
    }
    let pending: Vec<_> = (0..size)
        .filter(|&p| p != me)
        .map(|p| (p, comm.irecv(p, tag.as_u16(), WireHdr::SIZE + 8)))
        .collect();
    let mut values = vec![value; size];
    match collect_scalars(pending, &mut values) {
        Some(err) => Err(err),
        None => Ok(fold(op, &values)),
    }
}

pub fn sum_all<C, T>(comm: &C, value: T, tag: CommTag) -> Result<T, SparseGraphError>
where
    C: Communicator,
    T: WireScalar + Num + PartialOrd,
{
    all_reduce(comm, value, ReduceOp::Sum, tag)
}

pub fn min_all<C, T>(comm: &C, value: T, tag: CommTag) -> Result<T, SparseGraphError>
where
    C: Communicator,
    T: WireScalar + Num + PartialOrd,
{
    all_reduce(comm, value, ReduceOp::Min, tag)
}

pub fn max_all<C, T>(comm: &C, value: T, tag: CommTag) -> Result<T, SparseGraphError>
where
    C: Communicator,
    T: WireScalar + Num + PartialOrd,
{
    all_reduce(comm, value, ReduceOp::Max, tag)
}

/// Block until every rank reaches this point.
#[inline]
pub fn barrier<C: Communicator>(comm: &C) {
    if !comm.is_no_comm() {
        comm.barrier();
    }
}

/// True on every rank if `condition` is true on at least one rank.
///
/// Lets a rank that detected a local failure make its peers fail fast
/// instead of hanging in the next collective.
pub fn error_if_true_on_any_rank<C>(
    comm: &C,
    condition: bool,
    tag: CommTag,
) -> Result<bool, SparseGraphError>
where
    C: Communicator,
{
    Ok(max_all(comm, u64::from(condition), tag)? != 0)
}
