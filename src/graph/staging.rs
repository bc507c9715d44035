//! Outgoing mail for rows owned by other ranks.
//!
//! Each target rank gets one contiguous arena of wire words holding
//! `(row, count, col_1 .. col_count)` records back to back. Staging a
//! record is an append; duplicates are allowed and collapse either in
//! [`NonLocalStaging::compact`] or when the owner merges them.

use std::collections::{BTreeMap, BTreeSet};

use crate::GlobalIndex;
use crate::algs::wire::{WireIndex, encode_row_blocks};

#[derive(Clone, Debug, Default)]
pub struct NonLocalStaging {
    arenas: BTreeMap<usize, Vec<WireIndex>>,
}

impl NonLocalStaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one `(row, cols)` record for `rank`. Empty column lists are
    /// not recorded.
    pub fn stage_row<I>(&mut self, rank: usize, row: GlobalIndex, cols: I)
    where
        I: IntoIterator<Item = GlobalIndex>,
    {
        let mut cols = cols.into_iter().peekable();
        if cols.peek().is_none() {
            return;
        }
        let arena = self.arenas.entry(rank).or_default();
        arena.push(WireIndex::of(row));
        let count_at = arena.len();
        arena.push(WireIndex::of(0));
        let before = arena.len();
        arena.extend(cols.map(WireIndex::of));
        arena[count_at] = WireIndex::of(arena.len() - before);
    }

    #[inline]
    pub fn stage_entry(&mut self, rank: usize, row: GlobalIndex, col: GlobalIndex) {
        self.stage_row(rank, row, std::iter::once(col));
    }

    pub fn is_empty(&self) -> bool {
        self.arenas.is_empty()
    }

    /// Number of ranks with pending mail.
    pub fn num_targets(&self) -> usize {
        self.arenas.len()
    }

    /// Ranks with pending mail, ascending.
    pub fn target_ranks(&self) -> impl Iterator<Item = usize> + '_ {
        self.arenas.keys().copied()
    }

    /// Total staged words (rows, counts and columns) across all arenas.
    pub fn num_words(&self) -> usize {
        self.arenas.values().map(Vec::len).sum()
    }

    /// Raw arena for `rank`.
    pub fn words(&self, rank: usize) -> &[WireIndex] {
        self.arenas.get(&rank).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Records staged for `rank`, in staging order.
    pub fn records(&self, rank: usize) -> Records<'_> {
        Records {
            words: self.words(rank),
        }
    }

    /// Staged `(row, col)` pairs for `rank` as a set.
    pub fn entries_for(&self, rank: usize) -> BTreeSet<(GlobalIndex, GlobalIndex)> {
        self.records(rank)
            .flat_map(|(row, cols)| cols.iter().map(move |c| (row, c.get())))
            .collect()
    }

    /// Rewrite every arena as one record per row with ascending, unique
    /// columns.
    pub fn compact(&mut self) {
        let before = self.num_words();
        for arena in self.arenas.values_mut() {
            let mut rows: BTreeMap<GlobalIndex, BTreeSet<GlobalIndex>> = BTreeMap::new();
            for (row, cols) in (Records { words: arena.as_slice() }) {
                rows.entry(row)
                    .or_default()
                    .extend(cols.iter().map(WireIndex::get));
            }
            let mut out = Vec::with_capacity(arena.len());
            for (row, cols) in rows {
                out.push(WireIndex::of(row));
                out.push(WireIndex::of(cols.len()));
                out.extend(cols.into_iter().map(WireIndex::of));
            }
            *arena = out;
        }
        log::debug!(
            "staging compacted from {before} to {} words over {} targets",
            self.num_words(),
            self.num_targets()
        );
    }

    /// One encoded row-block payload per rank of a `size`-rank group.
    /// Ranks without mail get an empty buffer, which is never sent.
    pub fn encode_payloads(&self, size: usize) -> Vec<Vec<u8>> {
        (0..size)
            .map(|rank| match self.arenas.get(&rank) {
                Some(arena) if !arena.is_empty() => encode_row_blocks(arena),
                _ => Vec::new(),
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.arenas.clear();
    }
}

/// Iterator over `(row, columns)` records of one arena.
pub struct Records<'a> {
    words: &'a [WireIndex],
}

impl<'a> Iterator for Records<'a> {
    type Item = (GlobalIndex, &'a [WireIndex]);

    fn next(&mut self) -> Option<Self::Item> {
        let (row, rest) = self.words.split_first()?;
        let (count, rest) = rest.split_first()?;
        let n = count.get().min(rest.len());
        let (cols, rest) = rest.split_at(n);
        self.words = rest;
        Some((row.get(), cols))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_layout_is_row_count_cols() {
        let mut s = NonLocalStaging::new();
        s.stage_row(2, 19, [11, 7]);
        s.stage_entry(2, 5, 5);
        let words: Vec<usize> = s.words(2).iter().map(WireIndex::get).collect();
        assert_eq!(words, vec![19, 2, 11, 7, 5, 1, 5]);
        assert_eq!(s.records(2).count(), 2);
        assert!(s.words(0).is_empty());
    }

    #[test]
    fn empty_column_lists_are_skipped() {
        let mut s = NonLocalStaging::new();
        s.stage_row(1, 3, std::iter::empty());
        assert!(s.is_empty());
    }

    #[test]
    fn compact_dedups_and_sorts() {
        let mut s = NonLocalStaging::new();
        s.stage_row(1, 9, [4, 2]);
        s.stage_row(3, 30, [30]);
        s.stage_row(1, 8, [1]);
        s.stage_row(1, 9, [2, 3]);
        let before = s.entries_for(1);
        s.compact();
        assert_eq!(s.entries_for(1), before);
        let words: Vec<usize> = s.words(1).iter().map(WireIndex::get).collect();
        assert_eq!(words, vec![8, 1, 1, 9, 3, 2, 3, 4]);
        assert_eq!(s.target_ranks().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn payloads_cover_every_rank() {
        let mut s = NonLocalStaging::new();
        s.stage_entry(2, 1, 1);
        let p = s.encode_payloads(4);
        assert_eq!(p.len(), 4);
        assert!(p[0].is_empty() && p[1].is_empty() && p[3].is_empty());
        assert_eq!(p[2].len(), 8 + 3 * 8);
        s.clear();
        assert_eq!(s.num_words(), 0);
    }
}
