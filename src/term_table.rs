//! Term table contract and a hash-banked implementation
//!
//! The term table maps terms to the rows whose intersection encodes them.
//! Construction of production term tables (treatments, frequency analysis)
//! happens outside the ingestion core; the core consumes this contract.

use crate::term::{Rank, RowId, RowIndex, Term, MAX_RANK};

/// Reserved hash for the document-active system term. Its single rank-0 row
/// holds a `1` bit for every document that is not soft-deleted.
const DOCUMENT_ACTIVE_HASH: u64 = 0;

/// Reserved hash for the match-all system term.
const MATCH_ALL_HASH: u64 = 1;

/// Rank-0 row indexes reserved for the system terms.
const DOCUMENT_ACTIVE_ROW: RowIndex = 0;
const MATCH_ALL_ROW: RowIndex = 1;
const SYSTEM_ROW_COUNT: RowIndex = 2;

/// Contract the ingestion core requires of a term table.
pub trait TermTable: Send + Sync {
    /// Total number of rows at `rank`, system rows included.
    fn total_row_count(&self, rank: Rank) -> RowIndex;

    /// Highest rank with any rows. Drives the capacity quantum.
    fn max_rank_used(&self) -> Rank;

    /// System term marking documents as active (not soft-deleted). Must
    /// expand to exactly one rank-0 row.
    fn document_active_term(&self) -> Term;

    /// System term whose row matches every document.
    fn match_all_term(&self) -> Term;

    /// Rows encoding `term`, in ascending row order.
    fn row_ids(&self, term: &Term) -> Vec<RowId>;
}

/// Iterator over the rows a term expands to.
pub struct RowIdSequence {
    rows: std::vec::IntoIter<RowId>,
}

impl RowIdSequence {
    pub fn new(term: &Term, table: &dyn TermTable) -> Self {
        Self {
            rows: table.row_ids(term).into_iter(),
        }
    }
}

impl Iterator for RowIdSequence {
    type Item = RowId;

    fn next(&mut self) -> Option<RowId> {
        self.rows.next()
    }
}

/// Term table that derives each term's rows from its hash.
///
/// Rows at each rank form a bank of `row_counts[rank]` rows; a term at rank
/// `r` maps to `rows_per_term` distinct rows drawn from bank `r` by
/// iterating a mixed hash. Rank 0 reserves rows 0 and 1 for the
/// document-active and match-all system terms.
pub struct BankedTermTable {
    row_counts: Vec<RowIndex>,
    rows_per_term: usize,
}

impl BankedTermTable {
    /// `row_counts` gives the number of rows per rank, `[0, MAX_RANK]`.
    /// Missing trailing ranks default to zero rows.
    pub fn new(mut row_counts: Vec<RowIndex>, rows_per_term: usize) -> Self {
        assert!(
            row_counts.len() <= MAX_RANK + 1,
            "row counts beyond MAX_RANK"
        );
        row_counts.resize(MAX_RANK + 1, 0);
        assert!(
            row_counts[0] >= SYSTEM_ROW_COUNT,
            "rank 0 must hold the system rows"
        );
        assert!(rows_per_term > 0, "terms must map to at least one row");
        Self {
            row_counts,
            rows_per_term,
        }
    }

    fn user_rows(&self, rank: Rank) -> RowIndex {
        let reserved = if rank == 0 { SYSTEM_ROW_COUNT } else { 0 };
        self.row_counts[rank].saturating_sub(reserved)
    }
}

impl TermTable for BankedTermTable {
    fn total_row_count(&self, rank: Rank) -> RowIndex {
        self.row_counts[rank]
    }

    fn max_rank_used(&self) -> Rank {
        self.row_counts
            .iter()
            .rposition(|&count| count > 0)
            .unwrap_or(0)
    }

    fn document_active_term(&self) -> Term {
        Term::from_hash(DOCUMENT_ACTIVE_HASH, 0, 1, 0)
    }

    fn match_all_term(&self) -> Term {
        Term::from_hash(MATCH_ALL_HASH, 0, 1, 0)
    }

    fn row_ids(&self, term: &Term) -> Vec<RowId> {
        if term.stream() == 0 && term.gram_size() == 1 && term.rank() == 0 {
            match term.raw_hash() {
                DOCUMENT_ACTIVE_HASH => return vec![RowId::new(0, DOCUMENT_ACTIVE_ROW)],
                MATCH_ALL_HASH => return vec![RowId::new(0, MATCH_ALL_ROW)],
                _ => {}
            }
        }

        let rank = term.rank().min(MAX_RANK);
        let bank = self.user_rows(rank);
        if bank == 0 {
            return Vec::new();
        }
        let base = if rank == 0 { SYSTEM_ROW_COUNT } else { 0 };

        let mut rows = Vec::with_capacity(self.rows_per_term);
        let mut state = term.raw_hash();
        while rows.len() < self.rows_per_term.min(bank as usize) {
            state = mix(state);
            let index = base + (state % bank as u64) as RowIndex;
            let row = RowId::new(rank, index);
            if !rows.contains(&row) {
                rows.push(row);
            }
        }
        rows.sort_by_key(|r| r.index());
        rows
    }
}

/// splitmix64 finalizer; spreads consecutive hashes across the bank.
fn mix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_terms_single_rank0_row() {
        let table = BankedTermTable::new(vec![16, 0, 0, 8], 3);

        let active = table.row_ids(&table.document_active_term());
        assert_eq!(active, vec![RowId::new(0, 0)]);

        let match_all = table.row_ids(&table.match_all_term());
        assert_eq!(match_all, vec![RowId::new(0, 1)]);
    }

    #[test]
    fn test_max_rank_used() {
        assert_eq!(BankedTermTable::new(vec![16], 2).max_rank_used(), 0);
        assert_eq!(BankedTermTable::new(vec![16, 0, 4], 2).max_rank_used(), 2);
    }

    #[test]
    fn test_term_rows_deterministic_and_in_bank() {
        let table = BankedTermTable::new(vec![32, 0, 0, 8], 4);

        let term = Term::new("cat", 0, 0);
        let rows = table.row_ids(&term);
        assert_eq!(rows, table.row_ids(&term));
        assert_eq!(rows.len(), 4);
        for row in &rows {
            assert_eq!(row.rank(), 0);
            assert!(row.index() >= 2);
            assert!(row.index() < 32);
        }

        let ranked = Term::new("cat", 0, 3);
        for row in table.row_ids(&ranked) {
            assert_eq!(row.rank(), 3);
            assert!(row.index() < 8);
        }
    }

    #[test]
    fn test_empty_bank_yields_no_rows() {
        let table = BankedTermTable::new(vec![4], 2);
        let term = Term::new("cat", 0, 5);
        assert!(table.row_ids(&term).is_empty());
    }

    #[test]
    fn test_row_id_sequence_iterates() {
        let table = BankedTermTable::new(vec![32], 3);
        let term = Term::new("dog", 0, 0);
        let collected: Vec<RowId> = RowIdSequence::new(&term, &table).collect();
        assert_eq!(collected, table.row_ids(&term));
    }
}
