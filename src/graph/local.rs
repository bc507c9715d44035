//! Single-process sparsity graph: row → ordered set of columns.
//!
//! Rows exist only once an entry has been added to them. Insertion is
//! idempotent, so the graph is the *set* of `(row, col)` pairs ever added,
//! independent of call order or multiplicity.
//!
//! **Not thread safe.** Build one graph per thread and [`merge`] them
//! (see `graph::parallel` behind the `rayon` feature).
//!
//! [`merge`]: LocalSparseGraph::merge

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;

use super::graph_trait::RowGraph;
use crate::GlobalIndex;
use crate::debug_invariants::DebugInvariants;
use crate::graph_error::SparseGraphError;

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawLocalGraph", into = "RawLocalGraph")]
pub struct LocalSparseGraph {
    rows: BTreeMap<GlobalIndex, BTreeSet<GlobalIndex>>,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct RawLocalGraph {
    rows: BTreeMap<GlobalIndex, BTreeSet<GlobalIndex>>,
}

impl TryFrom<RawLocalGraph> for LocalSparseGraph {
    type Error = SparseGraphError;

    fn try_from(raw: RawLocalGraph) -> Result<Self, Self::Error> {
        let g = Self { rows: raw.rows };
        g.validate_invariants()?;
        Ok(g)
    }
}

impl From<LocalSparseGraph> for RawLocalGraph {
    fn from(g: LocalSparseGraph) -> Self {
        Self { rows: g.rows }
    }
}

impl LocalSparseGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `(row, col)`, creating the row if absent.
    #[inline]
    pub fn add_entry(&mut self, row: GlobalIndex, col: GlobalIndex) {
        self.rows.entry(row).or_default().insert(col);
    }

    /// Insert the dense square block `indices × indices`, diagonal included.
    ///
    /// Both `(i, j)` and `(j, i)` are stored: the pattern is not assumed
    /// symmetric.
    pub fn add_entries(&mut self, indices: &[GlobalIndex]) {
        for &row in indices {
            self.add_row_entries(row, indices.iter().copied());
        }
    }

    /// Insert the rectangular block `rows × cols`.
    pub fn add_block(&mut self, rows: &[GlobalIndex], cols: &[GlobalIndex]) {
        if cols.is_empty() {
            return;
        }
        for &row in rows {
            self.add_row_entries(row, cols.iter().copied());
        }
    }

    /// Insert every column of `cols` into `row`.
    pub fn add_row_entries<I>(&mut self, row: GlobalIndex, cols: I)
    where
        I: IntoIterator<Item = GlobalIndex>,
    {
        let mut cols = cols.into_iter().peekable();
        if cols.peek().is_some() {
            self.rows.entry(row).or_default().extend(cols);
        }
    }

    /// Union another graph into this one.
    pub fn merge<G: RowGraph>(&mut self, other: &G) {
        for row in other.nonempty_rows() {
            self.add_row_entries(row, other.columns(row));
        }
    }

    /// Iterate `(row, columns)` in ascending row order; columns ascend too.
    pub fn rows(&self) -> impl Iterator<Item = (GlobalIndex, &BTreeSet<GlobalIndex>)> + '_ {
        self.rows.iter().map(|(&r, cols)| (r, cols))
    }

    /// Column set of `row`, if the row exists.
    pub fn row(&self, row: GlobalIndex) -> Option<&BTreeSet<GlobalIndex>> {
        self.rows.get(&row)
    }

    /// Number of rows holding at least one entry.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn min_row(&self) -> Option<GlobalIndex> {
        self.rows.first_key_value().map(|(&r, _)| r)
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Move the rows at or beyond `row` into a new graph.
    pub fn split_off(&mut self, row: GlobalIndex) -> LocalSparseGraph {
        LocalSparseGraph {
            rows: self.rows.split_off(&row),
        }
    }
}

impl RowGraph for LocalSparseGraph {
    type Columns<'a> = std::iter::Copied<std::collections::btree_set::Iter<'a, GlobalIndex>>;

    fn columns<'a>(&'a self, row: GlobalIndex) -> Self::Columns<'a> {
        static EMPTY: BTreeSet<GlobalIndex> = BTreeSet::new();
        self.rows.get(&row).unwrap_or(&EMPTY).iter().copied()
    }

    #[inline]
    fn has(&self, row: GlobalIndex, col: GlobalIndex) -> bool {
        self.rows.get(&row).is_some_and(|cols| cols.contains(&col))
    }

    fn row_len(&self, row: GlobalIndex) -> usize {
        self.rows.get(&row).map_or(0, BTreeSet::len)
    }

    fn nonempty_rows<'a>(&'a self) -> Box<dyn Iterator<Item = GlobalIndex> + 'a> {
        Box::new(self.rows.keys().copied())
    }

    fn num_entries(&self) -> usize {
        self.rows.values().map(BTreeSet::len).sum()
    }

    fn max_row(&self) -> Option<GlobalIndex> {
        self.rows.last_key_value().map(|(&r, _)| r)
    }
}

impl DebugInvariants for LocalSparseGraph {
    fn validate_invariants(&self) -> Result<(), SparseGraphError> {
        // Rows exist only when non-empty.
        if let Some((&row, _)) = self.rows.iter().find(|(_, cols)| cols.is_empty()) {
            return Err(SparseGraphError::InvariantViolation(format!(
                "row {row} exists with no entries"
            )));
        }
        debug_assert!(self.rows.keys().tuple_windows().all(|(a, b)| a < b));
        Ok(())
    }
}
