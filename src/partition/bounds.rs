//! Contiguous row-block partitions and owner lookup.
//!
//! An [`IndexPartition`] stores `P + 1` non-decreasing bounds; rank `r` owns
//! the half-open range `[b[r], b[r + 1])`. Every rank computes the same
//! bounds locally from the shared row count and rank count, so no
//! communication is needed to agree on ownership.

use std::ops::Range;

use crate::GlobalIndex;
use crate::debug_invariants::DebugInvariants;
use crate::graph_error::SparseGraphError;
use itertools::Itertools;

/// Divide `n` contiguous indices into `p` nearly-equal parts.
///
/// When `n` is not divisible by `p`, the first `n % p` parts receive one
/// extra index. Returns `p + 1` bounds starting at zero.
pub fn compute_bounds(n: usize, p: usize) -> Result<Vec<GlobalIndex>, SparseGraphError> {
    compute_bounds_with_offset(0, n, p)
}

/// Like [`compute_bounds`], with every bound shifted by `offset`.
pub fn compute_bounds_with_offset(
    offset: GlobalIndex,
    n: usize,
    p: usize,
) -> Result<Vec<GlobalIndex>, SparseGraphError> {
    if p == 0 {
        return Err(SparseGraphError::InvalidPartition(
            "cannot divide indices into zero parts".into(),
        ));
    }
    let base = n / p;
    let extra = n % p;
    let mut bounds = Vec::with_capacity(p + 1);
    let mut cursor = offset;
    bounds.push(cursor);
    for r in 0..p {
        cursor += base + usize::from(r < extra);
        bounds.push(cursor);
    }
    Ok(bounds)
}

/// Owner of `index` under `bounds`: the rank `r` with `b[r] <= index < b[r+1]`.
pub fn owner_rank_of(bounds: &[GlobalIndex], index: GlobalIndex) -> Result<usize, SparseGraphError> {
    let (start, end) = match (bounds.first(), bounds.last()) {
        (Some(&s), Some(&e)) if bounds.len() >= 2 => (s, e),
        _ => {
            return Err(SparseGraphError::InvalidPartition(format!(
                "need at least two bounds, got {}",
                bounds.len()
            )));
        }
    };
    if index < start || index >= end {
        return Err(SparseGraphError::OutOfRange { index, start, end });
    }
    // Largest r with b[r] <= index; skips empty parts that share a bound.
    Ok(bounds.partition_point(|&b| b <= index) - 1)
}

/// Partition of a global index range into one contiguous block per rank.
///
/// Serialized as its bounds; deserialization re-validates them.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "Vec<GlobalIndex>", into = "Vec<GlobalIndex>")]
pub struct IndexPartition {
    bounds: Vec<GlobalIndex>,
}

impl TryFrom<Vec<GlobalIndex>> for IndexPartition {
    type Error = SparseGraphError;

    fn try_from(bounds: Vec<GlobalIndex>) -> Result<Self, Self::Error> {
        Self::from_bounds(bounds)
    }
}

impl From<IndexPartition> for Vec<GlobalIndex> {
    fn from(p: IndexPartition) -> Self {
        p.bounds
    }
}

impl IndexPartition {
    /// Build from explicit bounds, validating that they are non-decreasing.
    pub fn from_bounds(bounds: Vec<GlobalIndex>) -> Result<Self, SparseGraphError> {
        let p = Self { bounds };
        p.validate_invariants()?;
        Ok(p)
    }

    /// Evenly divide `[0, n)` across `ranks`.
    pub fn even(n: usize, ranks: usize) -> Result<Self, SparseGraphError> {
        Ok(Self {
            bounds: compute_bounds(n, ranks)?,
        })
    }

    /// Evenly divide `[offset, offset + n)` across `ranks`.
    pub fn even_with_offset(
        offset: GlobalIndex,
        n: usize,
        ranks: usize,
    ) -> Result<Self, SparseGraphError> {
        Ok(Self {
            bounds: compute_bounds_with_offset(offset, n, ranks)?,
        })
    }

    /// Owning rank of a global index.
    #[inline]
    pub fn owner_rank(&self, index: GlobalIndex) -> Result<usize, SparseGraphError> {
        owner_rank_of(&self.bounds, index)
    }

    /// Number of ranks (parts).
    #[inline]
    pub fn num_ranks(&self) -> usize {
        self.bounds.len() - 1
    }

    /// The whole partitioned range `[b[0], b[P])`.
    pub fn global_range(&self) -> Range<GlobalIndex> {
        self.bounds[0]..self.bounds[self.num_ranks()]
    }

    /// Total number of partitioned indices.
    pub fn global_len(&self) -> usize {
        self.global_range().len()
    }

    /// Range owned by `rank`, or `None` when `rank` is out of bounds.
    pub fn local_range(&self, rank: usize) -> Option<Range<GlobalIndex>> {
        (rank < self.num_ranks()).then(|| self.bounds[rank]..self.bounds[rank + 1])
    }

    pub fn local_len(&self, rank: usize) -> usize {
        self.local_range(rank).map_or(0, |r| r.len())
    }

    /// True if `index` lies inside the partitioned range.
    #[inline]
    pub fn contains(&self, index: GlobalIndex) -> bool {
        self.global_range().contains(&index)
    }

    /// Check `index` against the partitioned range.
    pub fn check(&self, index: GlobalIndex) -> Result<(), SparseGraphError> {
        let range = self.global_range();
        if range.contains(&index) {
            Ok(())
        } else {
            Err(SparseGraphError::OutOfRange {
                index,
                start: range.start,
                end: range.end,
            })
        }
    }

    pub fn bounds(&self) -> &[GlobalIndex] {
        &self.bounds
    }

    /// Iterate `(rank, owned range)` in rank order.
    pub fn iter_ranges(&self) -> impl Iterator<Item = (usize, Range<GlobalIndex>)> + '_ {
        self.bounds
            .iter()
            .copied()
            .tuple_windows()
            .enumerate()
            .map(|(r, (lo, hi))| (r, lo..hi))
    }
}

impl DebugInvariants for IndexPartition {
    fn validate_invariants(&self) -> Result<(), SparseGraphError> {
        if self.bounds.len() < 2 {
            return Err(SparseGraphError::InvalidPartition(format!(
                "need at least two bounds, got {}",
                self.bounds.len()
            )));
        }
        if let Some((r, (lo, hi))) = self
            .bounds
            .iter()
            .tuple_windows()
            .enumerate()
            .find(|(_, (lo, hi))| lo > hi)
        {
            return Err(SparseGraphError::InvalidPartition(format!(
                "bounds decrease at rank {r}: {lo} > {hi}"
            )));
        }
        Ok(())
    }
}
