//! Per-shard term frequency accounting
//!
//! Accumulated during ingestion and dumped once at the end: the document
//! frequency table (CSV, descending frequency), the cumulative term count
//! curve (CSV, sampled at document-count powers of two), and the indexed
//! IDF table (binary).

use std::collections::HashMap;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::term::Term;

/// One sample of the cumulative term count curve.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CumulativeCount {
    pub documents: u64,
    pub distinct_terms: u64,
    pub postings: u64,
}

/// One entry of the binary indexed IDF table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdfEntry {
    pub hash: u64,
    pub stream: u8,
    pub gram_size: u8,
    /// IDF scaled by ten and saturated at 6.0.
    pub idf_x10: u8,
}

const MAX_IDF_X10: u8 = 60;

#[derive(Default)]
pub struct DocumentFrequencyTableBuilder {
    document_count: u64,
    posting_count: u64,
    term_counts: HashMap<Term, u64>,
    cumulative: Vec<CumulativeCount>,
}

impl DocumentFrequencyTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one committed document. Samples the cumulative curve when
    /// the document count is a power of two.
    pub fn on_document_enter(&mut self) {
        self.document_count += 1;
        if self.document_count.is_power_of_two() {
            self.cumulative.push(CumulativeCount {
                documents: self.document_count,
                distinct_terms: self.term_counts.len() as u64,
                postings: self.posting_count,
            });
        }
    }

    /// Record one posting.
    pub fn on_term(&mut self, term: &Term) {
        self.posting_count += 1;
        *self.term_counts.entry(*term).or_insert(0) += 1;
    }

    pub fn document_count(&self) -> u64 {
        self.document_count
    }

    pub fn posting_count(&self) -> u64 {
        self.posting_count
    }

    pub fn distinct_term_count(&self) -> usize {
        self.term_counts.len()
    }

    /// Entries sorted by descending document count, ties broken by hash so
    /// output is deterministic.
    fn sorted_entries(&self) -> Vec<(Term, u64)> {
        let mut entries: Vec<(Term, u64)> =
            self.term_counts.iter().map(|(t, c)| (*t, *c)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.raw_hash().cmp(&b.0.raw_hash())));
        entries
    }

    /// CSV rows `hash,gram_size,stream,frequency`, most frequent first,
    /// truncated below `truncation_frequency`.
    pub fn write_frequencies(
        &self,
        out: &mut dyn Write,
        truncation_frequency: f64,
    ) -> Result<()> {
        if self.document_count == 0 {
            return Ok(());
        }
        for (term, count) in self.sorted_entries() {
            let frequency = count as f64 / self.document_count as f64;
            if frequency < truncation_frequency {
                break;
            }
            writeln!(
                out,
                "{:x},{},{},{}",
                term.raw_hash(),
                term.gram_size(),
                term.stream(),
                frequency
            )?;
        }
        Ok(())
    }

    /// CSV rows `documents,distinct_terms,postings`.
    pub fn write_cumulative_term_counts(&self, out: &mut dyn Write) -> Result<()> {
        for sample in &self.cumulative {
            writeln!(
                out,
                "{},{},{}",
                sample.documents, sample.distinct_terms, sample.postings
            )?;
        }
        Ok(())
    }

    /// Binary table of quantized IDF values for every term at or above the
    /// truncation frequency.
    pub fn write_indexed_idf_table(
        &self,
        out: &mut dyn Write,
        truncation_frequency: f64,
    ) -> Result<()> {
        let mut table = Vec::new();
        if self.document_count > 0 {
            for (term, count) in self.sorted_entries() {
                let frequency = count as f64 / self.document_count as f64;
                if frequency < truncation_frequency {
                    break;
                }
                let idf = (self.document_count as f64 / count as f64).log10();
                let idf_x10 = ((idf * 10.0).round() as u64).min(MAX_IDF_X10 as u64) as u8;
                table.push(IdfEntry {
                    hash: term.raw_hash(),
                    stream: term.stream(),
                    gram_size: term.gram_size(),
                    idf_x10,
                });
            }
        }
        bincode::serialize_into(out, &table)?;
        Ok(())
    }
}
