//! Document length histogram
//!
//! Tracks how many documents were ingested at each posting count. The
//! distribution feeds shard boundary tuning; it is written once at the end
//! of ingestion.

use std::collections::BTreeMap;
use std::io::Write;

use parking_lot::Mutex;

use crate::error::Result;

#[derive(Default)]
struct HistogramData {
    counts: BTreeMap<u64, u64>,
    document_count: u64,
    posting_count: u64,
}

#[derive(Default)]
pub struct DocumentLengthHistogram {
    data: Mutex<HistogramData>,
}

impl DocumentLengthHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&self, posting_count: usize) {
        let mut data = self.data.lock();
        *data.counts.entry(posting_count as u64).or_insert(0) += 1;
        data.document_count += 1;
        data.posting_count += posting_count as u64;
    }

    pub fn document_count(&self) -> u64 {
        self.data.lock().document_count
    }

    /// Total postings across all recorded documents.
    pub fn posting_count(&self) -> u64 {
        self.data.lock().posting_count
    }

    /// Number of documents recorded at exactly `posting_count` postings.
    pub fn count_at(&self, posting_count: usize) -> u64 {
        self.data
            .lock()
            .counts
            .get(&(posting_count as u64))
            .copied()
            .unwrap_or(0)
    }

    /// Binary dump of `(posting_count, document_count)` pairs in ascending
    /// posting-count order.
    pub fn write(&self, out: &mut dyn Write) -> Result<()> {
        let data = self.data.lock();
        let entries: Vec<(u64, u64)> = data.counts.iter().map(|(k, v)| (*k, *v)).collect();
        bincode::serialize_into(out, &entries)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_counts() {
        let histogram = DocumentLengthHistogram::new();
        histogram.add_document(10);
        histogram.add_document(10);
        histogram.add_document(25);

        assert_eq!(histogram.document_count(), 3);
        assert_eq!(histogram.posting_count(), 45);
        assert_eq!(histogram.count_at(10), 2);
        assert_eq!(histogram.count_at(25), 1);
        assert_eq!(histogram.count_at(7), 0);
    }

    #[test]
    fn test_write_round_trips() {
        let histogram = DocumentLengthHistogram::new();
        histogram.add_document(3);
        histogram.add_document(100);
        histogram.add_document(3);

        let mut out = Vec::new();
        histogram.write(&mut out).unwrap();
        let entries: Vec<(u64, u64)> = bincode::deserialize(&out).unwrap();
        assert_eq!(entries, vec![(3, 2), (100, 1)]);
    }
}
