//! Core identifier types shared across the ingestion core

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Caller-chosen 64-bit document identifier, globally unique for the
/// lifetime of the index.
pub type DocId = u64;

/// Dense 0-based position of a document inside one slice. Only meaningful
/// paired with the slice that produced it.
pub type DocIndex = usize;

/// Index of a shard within the ingestor's shard table.
pub type ShardId = usize;

/// Identifier for an expiration group of documents. Group operations are
/// reserved surface; see `Ingestor`.
pub type GroupId = u64;

/// Row rank. Rank-r rows cover `2^r` consecutive documents per bit.
pub type Rank = usize;

/// 0-based index of a row within a (rank, shard) group.
pub type RowIndex = u32;

/// Identifies which token stream a term was drawn from.
pub type StreamId = u8;

/// Highest rank a row table may use.
pub const MAX_RANK: Rank = 6;

/// Number of documents covered by one rank-0 row quantum. Slice capacities
/// are multiples of this value so that every rank up to `max_rank_used`
/// packs its rows into whole 64-bit words.
pub fn docs_in_rank0_row(quanta: usize, max_rank_used: Rank) -> usize {
    quanta * (64 << max_rank_used)
}

/// Handle naming a fact row. Facts expand to exactly one row in the term
/// table, so a fact can be asserted true or false per document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactHandle(pub u64);

/// Names a single bit-slice: a row at a given rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowId {
    rank: Rank,
    index: RowIndex,
}

impl RowId {
    pub fn new(rank: Rank, index: RowIndex) -> Self {
        Self { rank, index }
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn index(&self) -> RowIndex {
        self.index
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row({}, {})", self.rank, self.index)
    }
}

/// A hashed token: the unit the term table maps to rows.
///
/// The raw hash folds in the stream so the same text indexed under two
/// streams produces distinct terms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Term {
    raw_hash: u64,
    stream: StreamId,
    gram_size: u8,
    rank: Rank,
}

impl Term {
    /// Create a unigram term from token text.
    pub fn new(text: &str, stream: StreamId, rank: Rank) -> Self {
        Self {
            raw_hash: hash_token(text, stream),
            stream,
            gram_size: 1,
            rank,
        }
    }

    /// Create an n-gram term from a phrase of tokens.
    pub fn new_gram(tokens: &[&str], stream: StreamId, rank: Rank) -> Self {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        stream.hash(&mut hasher);
        for token in tokens {
            token.hash(&mut hasher);
        }
        Self {
            raw_hash: hasher.finish(),
            stream,
            gram_size: tokens.len() as u8,
            rank,
        }
    }

    /// Fact terms carry the fact handle as their hash and always live at
    /// rank 0.
    pub fn from_fact(fact: FactHandle) -> Self {
        Self {
            raw_hash: fact.0,
            stream: 0,
            gram_size: 1,
            rank: 0,
        }
    }

    /// Construct a term from a precomputed hash. Used for the system terms
    /// the term table reserves.
    pub fn from_hash(raw_hash: u64, stream: StreamId, gram_size: u8, rank: Rank) -> Self {
        Self {
            raw_hash,
            stream,
            gram_size,
            rank,
        }
    }

    pub fn raw_hash(&self) -> u64 {
        self.raw_hash
    }

    pub fn stream(&self) -> StreamId {
        self.stream
    }

    pub fn gram_size(&self) -> u8 {
        self.gram_size
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }
}

fn hash_token(text: &str, stream: StreamId) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    stream.hash(&mut hasher);
    text.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_hashing() {
        let a = Term::new("hello", 0, 0);
        let b = Term::new("hello", 0, 0);
        let c = Term::new("world", 0, 0);
        let d = Term::new("hello", 1, 0);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.gram_size(), 1);
    }

    #[test]
    fn test_gram_term() {
        let phrase = Term::new_gram(&["hello", "world"], 0, 0);
        assert_eq!(phrase.gram_size(), 2);
        assert_ne!(phrase, Term::new("hello world", 0, 0));
    }

    #[test]
    fn test_rank0_quantum() {
        assert_eq!(docs_in_rank0_row(1, 0), 64);
        assert_eq!(docs_in_rank0_row(1, 6), 4096);
        assert_eq!(docs_in_rank0_row(2, 3), 1024);
    }

    #[test]
    fn test_fact_term() {
        let term = Term::from_fact(FactHandle(77));
        assert_eq!(term.raw_hash(), 77);
        assert_eq!(term.rank(), 0);
    }
}
