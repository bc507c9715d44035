//! Compressed sparse row export of a sparsity pattern.
//!
//! [`CsrArrays`] is immutable once built: one offset per row of the
//! exported range (empty rows give zero-width spans, never skipped rows),
//! strictly ascending columns inside each span. `first_row` lets the owned
//! block of a distributed graph be addressed by global row.

use std::ops::Range;

use itertools::Itertools;

use super::graph_trait::RowGraph;
use crate::GlobalIndex;
use crate::debug_invariants::DebugInvariants;
use crate::graph_error::SparseGraphError;

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawCsr", into = "RawCsr")]
pub struct CsrArrays {
    first_row: GlobalIndex,
    /// `row_offsets[i]..row_offsets[i + 1]` spans local row `i`.
    row_offsets: Vec<usize>,
    col_indices: Vec<GlobalIndex>,
}

/// Serialized form of [`CsrArrays`]; validated on the way back in.
#[derive(serde::Serialize, serde::Deserialize)]
struct RawCsr {
    first_row: GlobalIndex,
    row_offsets: Vec<usize>,
    col_indices: Vec<GlobalIndex>,
}

impl TryFrom<RawCsr> for CsrArrays {
    type Error = SparseGraphError;

    fn try_from(raw: RawCsr) -> Result<Self, Self::Error> {
        Self::from_parts(raw.first_row, raw.row_offsets, raw.col_indices)
    }
}

impl From<CsrArrays> for RawCsr {
    fn from(csr: CsrArrays) -> Self {
        let (first_row, row_offsets, col_indices) = csr.into_parts();
        Self {
            first_row,
            row_offsets,
            col_indices,
        }
    }
}

impl Default for CsrArrays {
    fn default() -> Self {
        Self {
            first_row: 0,
            row_offsets: vec![0],
            col_indices: Vec::new(),
        }
    }
}

impl CsrArrays {
    /// Export the rows in `rows` of `graph`.
    ///
    /// Fails with `OutOfRange` if the graph holds entries in a row outside
    /// `rows`: dropping them silently would hand an incomplete pattern to
    /// the numeric builder.
    pub fn from_graph<G: RowGraph>(graph: &G, rows: Range<GlobalIndex>) -> Result<Self, SparseGraphError> {
        if let Some(stray) = graph.nonempty_rows().find(|r| !rows.contains(r)) {
            return Err(SparseGraphError::OutOfRange {
                index: stray,
                start: rows.start,
                end: rows.end,
            });
        }

        // 1) degree prefix sums
        let mut row_offsets = Vec::with_capacity(rows.len() + 1);
        row_offsets.push(0usize);
        let mut nnz = 0usize;
        for r in rows.clone() {
            nnz += graph.row_len(r);
            row_offsets.push(nnz);
        }

        // 2) columns, already ascending per row
        let mut col_indices = Vec::with_capacity(nnz);
        for r in rows.clone() {
            col_indices.extend(graph.columns(r));
        }

        let csr = Self {
            first_row: rows.start,
            row_offsets,
            col_indices,
        };
        csr.debug_assert_invariants();
        Ok(csr)
    }

    /// Build from raw arrays, validating them.
    pub fn from_parts(
        first_row: GlobalIndex,
        row_offsets: Vec<usize>,
        col_indices: Vec<GlobalIndex>,
    ) -> Result<Self, SparseGraphError> {
        let csr = Self {
            first_row,
            row_offsets,
            col_indices,
        };
        csr.validate_invariants()?;
        Ok(csr)
    }

    #[inline]
    pub fn first_row(&self) -> GlobalIndex {
        self.first_row
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.row_offsets.len().saturating_sub(1)
    }

    /// Global rows covered by this export.
    pub fn row_range(&self) -> Range<GlobalIndex> {
        self.first_row..self.first_row + self.num_rows()
    }

    /// Number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.col_indices.len()
    }

    pub fn row_offsets(&self) -> &[usize] {
        &self.row_offsets
    }

    pub fn col_indices(&self) -> &[GlobalIndex] {
        &self.col_indices
    }

    /// Columns of local row `i` (0-based from `first_row`).
    pub fn row(&self, i: usize) -> Option<&[GlobalIndex]> {
        let lo = *self.row_offsets.get(i)?;
        let hi = *self.row_offsets.get(i + 1)?;
        Some(&self.col_indices[lo..hi])
    }

    /// Columns of global row `g`.
    pub fn global_row(&self, g: GlobalIndex) -> Option<&[GlobalIndex]> {
        self.row(g.checked_sub(self.first_row)?)
    }

    /// `(global row, columns)` for every exported row, empty ones included.
    pub fn iter_rows(&self) -> impl Iterator<Item = (GlobalIndex, &[GlobalIndex])> + '_ {
        self.row_offsets
            .iter()
            .tuple_windows()
            .enumerate()
            .map(|(i, (&lo, &hi))| (self.first_row + i, &self.col_indices[lo..hi]))
    }

    /// `(first_row, row_offsets, col_indices)` for a numeric matrix builder.
    pub fn into_parts(self) -> (GlobalIndex, Vec<usize>, Vec<GlobalIndex>) {
        (self.first_row, self.row_offsets, self.col_indices)
    }
}

/// CSR of rows `[0, num_rows)`.
pub fn export_csr<G: RowGraph>(graph: &G, num_rows: usize) -> Result<CsrArrays, SparseGraphError> {
    CsrArrays::from_graph(graph, 0..num_rows)
}

/// CSR of rows `[0, max_row + 1)`; an empty graph exports zero rows.
pub fn export_csr_derived<G: RowGraph>(graph: &G) -> Result<CsrArrays, SparseGraphError> {
    let num_rows = graph.max_row().map_or(0, |r| r + 1);
    export_csr(graph, num_rows)
}

impl RowGraph for CsrArrays {
    type Columns<'a> = std::iter::Copied<std::slice::Iter<'a, GlobalIndex>>;

    fn columns<'a>(&'a self, row: GlobalIndex) -> Self::Columns<'a> {
        self.global_row(row).unwrap_or(&[]).iter().copied()
    }

    fn has(&self, row: GlobalIndex, col: GlobalIndex) -> bool {
        self.global_row(row)
            .is_some_and(|cols| cols.binary_search(&col).is_ok())
    }

    fn row_len(&self, row: GlobalIndex) -> usize {
        self.global_row(row).map_or(0, <[GlobalIndex]>::len)
    }

    fn nonempty_rows<'a>(&'a self) -> Box<dyn Iterator<Item = GlobalIndex> + 'a> {
        Box::new(
            self.iter_rows()
                .filter(|(_, cols)| !cols.is_empty())
                .map(|(r, _)| r),
        )
    }

    fn num_entries(&self) -> usize {
        self.nnz()
    }
}

impl DebugInvariants for CsrArrays {
    fn validate_invariants(&self) -> Result<(), SparseGraphError> {
        let bad = |msg: String| Err(SparseGraphError::InvariantViolation(msg));
        match self.row_offsets.first() {
            Some(0) => {}
            Some(&o) => return bad(format!("row_offsets[0] = {o}, expected 0")),
            None => return bad("row_offsets is empty".into()),
        }
        if let Some((i, _)) = self
            .row_offsets
            .iter()
            .tuple_windows()
            .enumerate()
            .find(|(_, (lo, hi))| lo > hi)
        {
            return bad(format!("row_offsets decrease after local row {i}"));
        }
        let last = self.row_offsets[self.row_offsets.len() - 1];
        if last != self.col_indices.len() {
            return bad(format!(
                "row_offsets end at {last} but {} columns are stored",
                self.col_indices.len()
            ));
        }
        for (row, cols) in self.iter_rows() {
            if cols.iter().tuple_windows().any(|(a, b)| a >= b) {
                return bad(format!("columns of row {row} are not strictly ascending"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::local::LocalSparseGraph;

    #[test]
    fn empty_middle_row_gets_zero_width_span() {
        let mut g = LocalSparseGraph::new();
        g.add_entry(0, 0);
        g.add_entry(0, 2);
        g.add_entry(2, 1);
        let csr = export_csr(&g, 3).unwrap();
        assert_eq!(csr.row_offsets(), &[0, 2, 2, 3]);
        assert_eq!(csr.col_indices(), &[0, 2, 1]);
        assert_eq!(csr.row(1), Some(&[][..]));
        assert_eq!(csr.iter_rows().count(), 3);
        csr.validate_invariants().unwrap();
    }

    #[test]
    fn derived_row_count_and_trailing_rows() {
        let mut g = LocalSparseGraph::new();
        g.add_entries(&[1, 3]);
        assert_eq!(export_csr_derived(&g).unwrap().num_rows(), 4);
        // explicit count may exceed max_row + 1
        let csr = export_csr(&g, 6).unwrap();
        assert_eq!(csr.row_offsets(), &[0, 0, 2, 2, 4, 4, 4]);
        assert_eq!(export_csr_derived(&LocalSparseGraph::new()).unwrap().num_rows(), 0);
    }

    #[test]
    fn rows_outside_range_are_rejected() {
        let mut g = LocalSparseGraph::new();
        g.add_entry(5, 5);
        assert_eq!(
            CsrArrays::from_graph(&g, 0..5),
            Err(SparseGraphError::OutOfRange {
                index: 5,
                start: 0,
                end: 5
            })
        );
    }

    #[test]
    fn offset_block_is_addressed_by_global_row() {
        let mut g = LocalSparseGraph::new();
        g.add_entries(&[10, 12, 30]);
        g = g.split_off(10);
        let _ = g.split_off(20);
        let csr = CsrArrays::from_graph(&g, 10..20).unwrap();
        assert_eq!(csr.first_row(), 10);
        assert_eq!(csr.global_row(12), Some(&[10, 12, 30][..]));
        assert_eq!(csr.global_row(9), None);
        assert!(csr.has(10, 30) && !csr.has(11, 30));
        assert_eq!(csr.entry_set(), g.entry_set());
        let (first, offsets, cols) = csr.into_parts();
        assert_eq!((first, offsets.len(), cols.len()), (10, 11, 6));
    }

    #[test]
    fn from_parts_validates() {
        assert!(CsrArrays::from_parts(0, vec![0, 2], vec![3, 3]).is_err());
        assert!(CsrArrays::from_parts(0, vec![0, 3], vec![1, 2]).is_err());
        assert!(CsrArrays::from_parts(0, vec![1, 1], vec![]).is_err());
        let ok = CsrArrays::from_parts(4, vec![0, 1, 1], vec![7]).unwrap();
        assert_eq!(ok.row_range(), 4..6);
        assert_eq!(CsrArrays::default().num_rows(), 0);
    }

    #[test]
    fn deserialize_rejects_inconsistent_arrays() {
        let bad = r#"{"first_row":0,"row_offsets":[0,5],"col_indices":[]}"#;
        assert!(serde_json::from_str::<CsrArrays>(bad).is_err());
        let good = r#"{"first_row":2,"row_offsets":[0,1],"col_indices":[9]}"#;
        let csr: CsrArrays = serde_json::from_str(good).unwrap();
        assert_eq!(csr.global_row(2), Some(&[9][..]));
        assert_eq!(serde_json::to_string(&csr).unwrap(), good);
    }
}
