//! The ingestion core: slices, shards, and the ingestor
//!
//! Storage is organized as shards (partitioned by document posting count),
//! each a sequence of fixed-capacity slices backed by contiguous buffers.
//! Postings are bits at the intersection of a term's rows and a document's
//! column; deletion is a soft-delete bit plus deferred slice reclamation.

pub mod doc_frequency;
pub mod doc_table;
pub mod document;
pub mod document_map;
pub mod histogram;
pub mod ingestor;
pub mod layout;
pub mod row_table;
pub mod shard;
pub mod slice;

pub use doc_frequency::{CumulativeCount, DocumentFrequencyTableBuilder, IdfEntry};
pub use doc_table::DocTableDescriptor;
pub use document::{Document, DocumentHandle};
pub use document_map::DocumentMap;
pub use histogram::DocumentLengthHistogram;
pub use ingestor::Ingestor;
pub use layout::SliceLayout;
pub use row_table::RowTableDescriptor;
pub use shard::{RetiredSliceList, Shard, SliceList};
pub use slice::Slice;
