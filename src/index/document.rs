//! Documents and the handle they ingest through
//!
//! The core never parses documents itself. A caller-provided `Document`
//! reports its posting count (for shard routing) and drives postings and
//! fact assertions through the `DocumentHandle` it is given.

use std::ptr::NonNull;
use std::sync::Arc;

use tracing::error;

use crate::error::Result;
use crate::index::shard::Shard;
use crate::index::slice::Slice;
use crate::schema::{FixedSizeBlobId, VariableSizeBlobId};
use crate::term::{DocId, DocIndex, FactHandle, Term};

/// Contract a document must satisfy to be ingested.
pub trait Document {
    /// Number of postings `ingest` will add. Routes the document to a
    /// shard before any storage is allocated.
    fn posting_count(&self) -> usize;

    /// Write the document's postings and fact assertions through `handle`.
    fn ingest(&self, handle: &DocumentHandle) -> Result<()>;
}

/// Names one allocated document column: the shard, the slice, and the
/// column index, together with the external id.
#[derive(Clone)]
pub struct DocumentHandle {
    shard: Arc<Shard>,
    slice: Arc<Slice>,
    index: DocIndex,
    doc_id: DocId,
}

impl DocumentHandle {
    pub(crate) fn new(
        shard: Arc<Shard>,
        slice: Arc<Slice>,
        index: DocIndex,
        doc_id: DocId,
    ) -> Self {
        Self {
            shard,
            slice,
            index,
            doc_id,
        }
    }

    pub fn shard(&self) -> &Arc<Shard> {
        &self.shard
    }

    pub fn slice(&self) -> &Arc<Slice> {
        &self.slice
    }

    pub fn index(&self) -> DocIndex {
        self.index
    }

    pub fn doc_id(&self) -> DocId {
        self.doc_id
    }

    /// Record one posting for this column.
    pub fn add_posting(&self, term: &Term) {
        self.shard
            .add_posting(term, self.index, self.slice.buffer());
    }

    /// Assert a fact true or false for this column.
    pub fn assert_fact(&self, fact: FactHandle, value: bool) -> Result<()> {
        self.shard
            .assert_fact(fact, value, self.index, self.slice.buffer())
    }

    /// Mark ingestion complete by raising the document-active bit. The bit
    /// is already raised by slice initialization; this is the explicit
    /// ingestion-complete transition in the state machine.
    pub fn activate(&self) {
        self.shard
            .set_document_active(self.slice.buffer(), self.index, true);
    }

    /// Soft-delete this document: clear the active bit and expire the
    /// column. When the slice thereby becomes fully expired, its founding
    /// reference is dropped and the shard recycles it.
    pub fn expire(&self) -> Result<()> {
        self.shard
            .set_document_active(self.slice.buffer(), self.index, false);
        if self.slice.expire_document()? {
            Slice::decrement_ref_count(&self.slice, &self.shard)?;
        }
        Ok(())
    }

    /// Expire during ingest rollback: failures here are logged and
    /// swallowed so the primary failure reaches the caller unmasked.
    pub(crate) fn expire_for_rollback(&self) {
        if let Err(cleanup) = self.expire() {
            error!(
                doc_id = self.doc_id,
                error = %cleanup,
                "error while rolling back failed add"
            );
        }
    }

    /// Copy `bytes` into this column's fixed-size blob.
    pub fn write_fixed_size_blob(&self, blob: FixedSizeBlobId, bytes: &[u8]) {
        self.shard
            .layout()
            .doc_table()
            .write_fixed_size_blob(self.slice.buffer(), self.index, blob, bytes);
    }

    /// Copy this column's fixed-size blob into `out`.
    pub fn read_fixed_size_blob(&self, blob: FixedSizeBlobId, out: &mut [u8]) {
        self.shard
            .layout()
            .doc_table()
            .read_fixed_size_blob(self.slice.buffer(), self.index, blob, out);
    }

    /// Allocate (or replace) this column's variable-size blob.
    pub fn allocate_variable_size_blob(
        &self,
        blob: VariableSizeBlobId,
        byte_count: usize,
    ) -> NonNull<u8> {
        self.shard.layout().doc_table().allocate_variable_size_blob(
            self.slice.buffer(),
            self.index,
            blob,
            byte_count,
        )
    }

    /// Pointer to this column's variable-size blob, if allocated.
    pub fn variable_size_blob(&self, blob: VariableSizeBlobId) -> Option<NonNull<u8>> {
        self.shard
            .layout()
            .doc_table()
            .get_variable_size_blob(self.slice.buffer(), self.index, blob)
    }
}
