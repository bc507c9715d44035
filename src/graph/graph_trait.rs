//! Read-only view shared by every sparsity container.
//!
//! CSR export, graph comparison and merging are written once against
//! [`RowGraph`] and work for [`LocalSparseGraph`](super::local::LocalSparseGraph),
//! [`ContiguousRowGraph`](super::contiguous::ContiguousRowGraph) and
//! [`CsrArrays`](super::csr::CsrArrays) alike.

use std::collections::BTreeSet;

use crate::GlobalIndex;

pub trait RowGraph {
    type Columns<'a>: Iterator<Item = GlobalIndex> + 'a
    where
        Self: 'a;

    /// Columns of `row` in ascending order; empty if the row has no entries.
    fn columns<'a>(&'a self, row: GlobalIndex) -> Self::Columns<'a>;

    fn has(&self, row: GlobalIndex, col: GlobalIndex) -> bool;

    fn row_len(&self, row: GlobalIndex) -> usize;

    /// Rows holding at least one entry, ascending.
    fn nonempty_rows<'a>(&'a self) -> Box<dyn Iterator<Item = GlobalIndex> + 'a>;

    /// Total number of `(row, col)` entries.
    fn num_entries(&self) -> usize;

    /// Largest row holding an entry.
    fn max_row(&self) -> Option<GlobalIndex> {
        self.nonempty_rows().last()
    }

    /// Every `(row, col)` entry in row-major ascending order.
    fn entries<'a>(&'a self) -> Box<dyn Iterator<Item = (GlobalIndex, GlobalIndex)> + 'a> {
        Box::new(
            self.nonempty_rows()
                .flat_map(move |r| self.columns(r).map(move |c| (r, c))),
        )
    }

    /// The entry set, for order-agnostic comparison between containers.
    fn entry_set(&self) -> BTreeSet<(GlobalIndex, GlobalIndex)> {
        self.entries().collect()
    }
}
