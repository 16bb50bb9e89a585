//! sigdex: the ingestion core of a bit-sliced signature search index
//!
//! Documents stream in, their postings land as bits in rank-stratified row
//! tables packed into fixed-size slice buffers, and expired storage is
//! reclaimed through a token-based epoch scheme so readers never observe
//! freed buffers.

pub mod allocator;
pub mod config;
pub mod error;
pub mod index;
pub mod persistence;
pub mod query;
pub mod recycler;
pub mod schema;
pub mod term;
pub mod term_table;
pub mod testing;
pub mod tokens;

pub use allocator::{SliceBuffer, SliceBufferAllocator};
pub use config::ShardDefinition;
pub use error::{Result, SigdexError};
pub use index::{
    Document, DocumentHandle, DocumentLengthHistogram, DocumentMap, Ingestor, Shard, Slice,
    SliceLayout,
};
pub use persistence::{FileDescriptor, FileManager};
pub use query::{QueryParser, TermMatchNode};
pub use recycler::{DeferredSliceDelete, Recycler};
pub use schema::{DocumentDataSchema, FixedSizeBlobId, VariableSizeBlobId};
pub use term::{
    DocId, DocIndex, FactHandle, GroupId, Rank, RowId, RowIndex, ShardId, StreamId, Term,
    MAX_RANK,
};
pub use term_table::{BankedTermTable, RowIdSequence, TermTable};
pub use tokens::{Token, TokenManager, TokenTracker};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
