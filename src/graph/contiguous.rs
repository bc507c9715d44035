//! Graph over a fixed row range `[0, size)` stored as one hash set per row.
//!
//! Every row in range always exists, possibly empty. Lookups are O(1) and
//! insertion never rebalances a tree, which makes this the faster container
//! when the row range is known and dense. Columns are sorted on read.

use hashbrown::HashSet;
use itertools::Itertools;

use super::graph_trait::RowGraph;
use crate::GlobalIndex;
use crate::debug_invariants::DebugInvariants;
use crate::graph_error::SparseGraphError;

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContiguousRowGraph {
    rows: Vec<HashSet<GlobalIndex>>,
}

impl ContiguousRowGraph {
    /// An empty graph with rows `[0, size)`.
    pub fn new(size: usize) -> Self {
        Self {
            rows: vec![HashSet::new(); size],
        }
    }

    /// Number of rows (fixed at construction).
    #[inline]
    pub fn size(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    fn row_mut(&mut self, row: GlobalIndex) -> Result<&mut HashSet<GlobalIndex>, SparseGraphError> {
        let end = self.rows.len();
        self.rows
            .get_mut(row)
            .ok_or(SparseGraphError::OutOfRange {
                index: row,
                start: 0,
                end,
            })
    }

    fn check_rows(&self, rows: &[GlobalIndex]) -> Result<(), SparseGraphError> {
        match rows.iter().find(|&&r| r >= self.rows.len()) {
            Some(&index) => Err(SparseGraphError::OutOfRange {
                index,
                start: 0,
                end: self.rows.len(),
            }),
            None => Ok(()),
        }
    }

    pub fn add_entry(&mut self, row: GlobalIndex, col: GlobalIndex) -> Result<(), SparseGraphError> {
        self.row_mut(row)?.insert(col);
        Ok(())
    }

    /// Dense square block `indices × indices`. Nothing is inserted if any
    /// index is out of range.
    pub fn add_entries(&mut self, indices: &[GlobalIndex]) -> Result<(), SparseGraphError> {
        self.add_block(indices, indices)
    }

    /// Rectangular block `rows × cols`; only rows are range-checked.
    pub fn add_block(
        &mut self,
        rows: &[GlobalIndex],
        cols: &[GlobalIndex],
    ) -> Result<(), SparseGraphError> {
        self.check_rows(rows)?;
        for &r in rows {
            self.rows[r].extend(cols.iter().copied());
        }
        Ok(())
    }

    pub fn add_row_entries<I>(&mut self, row: GlobalIndex, cols: I) -> Result<(), SparseGraphError>
    where
        I: IntoIterator<Item = GlobalIndex>,
    {
        self.row_mut(row)?.extend(cols);
        Ok(())
    }

    /// Union `other` into this graph. Sizes must match.
    pub fn merge(&mut self, other: &ContiguousRowGraph) -> Result<(), SparseGraphError> {
        if other.size() != self.size() {
            return Err(SparseGraphError::SizeMismatch {
                expected: self.size(),
                found: other.size(),
            });
        }
        for (mine, theirs) in self.rows.iter_mut().zip(&other.rows) {
            mine.extend(theirs.iter().copied());
        }
        Ok(())
    }

    /// Every row in `[0, size)` with its columns sorted ascending.
    pub fn rows(&self) -> impl Iterator<Item = (GlobalIndex, Vec<GlobalIndex>)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .map(|(r, cols)| (r, cols.iter().copied().sorted_unstable().collect()))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(HashSet::is_empty)
    }

    /// Remove every entry; the row range is kept.
    pub fn clear(&mut self) {
        self.rows.iter_mut().for_each(HashSet::clear);
    }
}

impl RowGraph for ContiguousRowGraph {
    type Columns<'a> = std::vec::IntoIter<GlobalIndex>;

    fn columns<'a>(&'a self, row: GlobalIndex) -> Self::Columns<'a> {
        self.rows
            .get(row)
            .map(|cols| cols.iter().copied().sorted_unstable().collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter()
    }

    #[inline]
    fn has(&self, row: GlobalIndex, col: GlobalIndex) -> bool {
        self.rows.get(row).is_some_and(|cols| cols.contains(&col))
    }

    #[inline]
    fn row_len(&self, row: GlobalIndex) -> usize {
        self.rows.get(row).map_or(0, HashSet::len)
    }

    fn nonempty_rows<'a>(&'a self) -> Box<dyn Iterator<Item = GlobalIndex> + 'a> {
        Box::new(
            self.rows
                .iter()
                .enumerate()
                .filter(|(_, cols)| !cols.is_empty())
                .map(|(r, _)| r),
        )
    }

    fn num_entries(&self) -> usize {
        self.rows.iter().map(HashSet::len).sum()
    }
}

impl DebugInvariants for ContiguousRowGraph {
    fn validate_invariants(&self) -> Result<(), SparseGraphError> {
        // Hash sets cannot hold duplicates; nothing beyond the fixed size to check.
        Ok(())
    }
}
