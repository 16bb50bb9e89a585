//! Top-level ingestion entry point
//!
//! Routes documents to shards by posting count, owns the document map,
//! the token manager, the recycler, and the posting-count histogram, and
//! guarantees the single-rollback-point contract: any failure between
//! document allocation and the map insert unwinds through `expire`, with
//! rollback errors logged and swallowed so the primary failure reaches the
//! caller unmasked.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::allocator::SliceBufferAllocator;
use crate::config::ShardDefinition;
use crate::error::{Result, SigdexError};
use crate::index::document::{Document, DocumentHandle};
use crate::index::document_map::DocumentMap;
use crate::index::histogram::DocumentLengthHistogram;
use crate::index::shard::Shard;
use crate::persistence::FileManager;
use crate::recycler::Recycler;
use crate::schema::DocumentDataSchema;
use crate::term::{DocId, FactHandle, GroupId, ShardId};
use crate::term_table::TermTable;
use crate::tokens::TokenManager;

/// Truncation frequency applied to the statistics writers. Kept at zero
/// until term treatments consume these tables.
const TRUNCATION_FREQUENCY: f64 = 0.0;

pub struct Ingestor {
    file_manager: FileManager,
    shard_definition: ShardDefinition,
    shards: Vec<Arc<Shard>>,
    documents: DocumentMap,
    tokens: Arc<TokenManager>,
    recycler: Arc<Recycler>,
    histogram: DocumentLengthHistogram,
    document_count: AtomicU64,
    /// Serializes deletes against each other; a delete mutates slice
    /// expiry counters, so two deletes of the same id must not race.
    delete_lock: Mutex<()>,
}

impl Ingestor {
    pub fn new(
        file_manager: FileManager,
        schema: &DocumentDataSchema,
        term_table: Arc<dyn TermTable>,
        shard_definition: ShardDefinition,
        allocator: Arc<SliceBufferAllocator>,
    ) -> Result<Self> {
        let tokens = Arc::new(TokenManager::new());
        let recycler = Arc::new(Recycler::new(Arc::clone(&tokens)));

        let mut shards = Vec::with_capacity(shard_definition.shard_count());
        for id in 0..shard_definition.shard_count() {
            shards.push(Arc::new(Shard::new(
                id,
                Arc::clone(&term_table),
                schema,
                Arc::clone(&allocator),
                Arc::clone(&recycler),
            )?));
        }

        Ok(Self {
            file_manager,
            shard_definition,
            shards,
            documents: DocumentMap::new(),
            tokens,
            recycler,
            histogram: DocumentLengthHistogram::new(),
            document_count: AtomicU64::new(0),
            delete_lock: Mutex::new(()),
        })
    }

    /// Ingest one document under `id`.
    pub fn add(&self, id: DocId, document: &dyn Document) -> Result<()> {
        let posting_count = document.posting_count();
        self.histogram.add_document(posting_count);

        let shard_id = self.shard_definition.get_shard(posting_count);
        let shard = &self.shards[shard_id];
        let handle = shard.allocate_document(id);

        if let Err(primary) = document.ingest(&handle) {
            self.abandon(&handle, false);
            return Err(primary);
        }

        handle.activate();
        shard.record_document();
        handle.slice().commit_document();

        if let Err(primary) = self.documents.add(handle.clone()) {
            self.abandon(&handle, true);
            return Err(primary);
        }

        self.document_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Unwind a partially ingested document. `committed` records whether
    /// the column already went through `commit_document`; expiry requires
    /// a prior commit.
    fn abandon(&self, handle: &DocumentHandle, committed: bool) {
        if !committed {
            handle.slice().commit_document();
        }
        handle.expire_for_rollback();
    }

    /// Soft-delete `id`. A missing id is not an error: range-based delete
    /// sweeps pass ids that were never ingested.
    pub fn delete(&self, id: DocId) -> Result<bool> {
        let _token = self.tokens.request_token()?;
        let _guard = self.delete_lock.lock();

        match self.documents.remove(id) {
            Some(handle) => {
                handle.expire()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// True iff the most recent of `add(id)` / `delete(id)` was an add.
    pub fn contains(&self, id: DocId) -> bool {
        self.documents.find(id).is_some()
    }

    /// Reserved: fact assertion against an already ingested document.
    pub fn assert_fact(&self, _id: DocId, _fact: FactHandle, _value: bool) -> Result<()> {
        Err(SigdexError::NotImplemented("Ingestor::assert_fact"))
    }

    /// Reserved: group lifecycle.
    pub fn open_group(&self, _group: GroupId) -> Result<()> {
        Err(SigdexError::NotImplemented("Ingestor::open_group"))
    }

    /// Reserved: group lifecycle.
    pub fn close_group(&self) -> Result<()> {
        Err(SigdexError::NotImplemented("Ingestor::close_group"))
    }

    /// Reserved: group lifecycle.
    pub fn expire_group(&self, _group: GroupId) -> Result<()> {
        Err(SigdexError::NotImplemented("Ingestor::expire_group"))
    }

    /// Reserved: per-index capacity accounting.
    pub fn used_capacity_in_bytes(&self) -> Result<usize> {
        Err(SigdexError::NotImplemented("Ingestor::used_capacity_in_bytes"))
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn shard(&self, shard: ShardId) -> &Arc<Shard> {
        &self.shards[shard]
    }

    pub fn recycler(&self) -> &Arc<Recycler> {
        &self.recycler
    }

    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    pub fn document_count(&self) -> u64 {
        self.document_count.load(Ordering::Relaxed)
    }

    /// Refuse new tokens, wait for outstanding readers to drain, then stop
    /// the recycler. After this only destruction is legal.
    pub fn shutdown(&self) {
        info!("shutting down ingestor");
        self.tokens.shutdown();
        self.recycler.shutdown();
    }

    /// Human-readable ingestion summary.
    pub fn print_statistics(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "Shard count: {}", self.shards.len())?;
        writeln!(out, "Document count: {}", self.document_count())?;
        writeln!(out, "Posting count: {}", self.histogram.posting_count())?;
        Ok(())
    }

    /// Dump the histogram and the per-shard frequency tables through the
    /// file manager.
    pub fn write_statistics(&self) -> Result<()> {
        {
            let mut out = self.file_manager.document_length_histogram().open_for_write()?;
            self.histogram.write(&mut out)?;
            out.flush()?;
        }

        for (shard_id, shard) in self.shards.iter().enumerate() {
            {
                let mut out = self
                    .file_manager
                    .cumulative_term_counts(shard_id)
                    .open_for_write()?;
                shard.write_cumulative_term_counts(&mut out)?;
                out.flush()?;
            }
            {
                let mut out = self.file_manager.doc_freq_table(shard_id).open_for_write()?;
                shard.write_document_frequency_table(&mut out, TRUNCATION_FREQUENCY)?;
                out.flush()?;
            }
            {
                let mut out = self
                    .file_manager
                    .indexed_idf_table(shard_id)
                    .open_for_write()?;
                shard.write_indexed_idf_table(&mut out, TRUNCATION_FREQUENCY)?;
                out.flush()?;
            }
        }
        Ok(())
    }
}
