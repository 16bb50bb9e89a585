//! Shard: one posting-count partition of the index
//!
//! A shard owns the active slice, the published list of live slice
//! buffers, and the layout shared by every slice it creates. The list is
//! published as an atomic pointer to an immutable vector: readers holding
//! a token iterate it without locks, writers build a replacement under the
//! slices lock and retire the superseded vector through the recycler.

use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::allocator::{SliceBuffer, SliceBufferAllocator};
use crate::error::{Result, SigdexError};
use crate::index::doc_frequency::DocumentFrequencyTableBuilder;
use crate::index::document::DocumentHandle;
use crate::index::layout::SliceLayout;
use crate::index::slice::Slice;
use crate::recycler::{DeferredSliceDelete, Recycler};
use crate::schema::DocumentDataSchema;
use crate::term::{DocId, DocIndex, FactHandle, RowId, ShardId, Term};
use crate::term_table::{RowIdSequence, TermTable};
use crate::tokens::Token;

/// Immutable snapshot of the slices whose buffers are live in this shard.
pub type SliceList = Vec<Arc<Slice>>;

/// A superseded slice list awaiting destruction by the recycler. Readers
/// may still be iterating it; the wrapper defers the deallocation without
/// creating an aliasing `Box` in the meantime.
pub struct RetiredSliceList(*mut SliceList);

unsafe impl Send for RetiredSliceList {}

impl RetiredSliceList {
    fn from_raw(raw: *mut SliceList) -> Self {
        Self(raw)
    }
}

impl Drop for RetiredSliceList {
    fn drop(&mut self) {
        drop(unsafe { Box::from_raw(self.0) });
    }
}

pub struct Shard {
    id: ShardId,
    term_table: Arc<dyn TermTable>,
    allocator: Arc<SliceBufferAllocator>,
    recycler: Arc<Recycler>,
    layout: Arc<SliceLayout>,
    document_active_row: RowId,
    /// Active slice; also serializes slice-list publication.
    active_slice: Mutex<Option<Arc<Slice>>>,
    slice_list: AtomicPtr<SliceList>,
    frequency_builder: Mutex<DocumentFrequencyTableBuilder>,
}

impl Shard {
    pub fn new(
        id: ShardId,
        term_table: Arc<dyn TermTable>,
        schema: &DocumentDataSchema,
        allocator: Arc<SliceBufferAllocator>,
        recycler: Arc<Recycler>,
    ) -> Result<Self> {
        let document_active_row = resolve_document_active_row(term_table.as_ref())?;
        let layout = Arc::new(SliceLayout::new(
            allocator.buffer_size(),
            schema,
            term_table.as_ref(),
        ));

        Ok(Self {
            id,
            term_table,
            allocator,
            recycler,
            layout,
            document_active_row,
            active_slice: Mutex::new(None),
            slice_list: AtomicPtr::new(Box::into_raw(Box::new(Vec::new()))),
            frequency_builder: Mutex::new(DocumentFrequencyTableBuilder::new()),
        })
    }

    pub fn id(&self) -> ShardId {
        self.id
    }

    pub fn term_table(&self) -> &dyn TermTable {
        self.term_table.as_ref()
    }

    pub fn layout(&self) -> Arc<SliceLayout> {
        Arc::clone(&self.layout)
    }

    pub fn allocator(&self) -> Arc<SliceBufferAllocator> {
        Arc::clone(&self.allocator)
    }

    pub fn slice_capacity(&self) -> DocIndex {
        self.layout.capacity()
    }

    pub fn document_active_row(&self) -> RowId {
        self.document_active_row
    }

    /// The active slice, if the shard currently has one.
    pub fn active_slice(&self) -> Option<Arc<Slice>> {
        self.active_slice.lock().clone()
    }

    /// Claim a document column, creating a new active slice if the current
    /// one is out of columns.
    pub fn allocate_document(self: &Arc<Self>, id: DocId) -> DocumentHandle {
        let mut active = self.active_slice.lock();

        let allocated = active
            .as_ref()
            .and_then(|slice| slice.try_allocate_document().map(|i| (Arc::clone(slice), i)));
        let (slice, index) = match allocated {
            Some(found) => found,
            None => {
                let slice = self.create_new_active_slice(&mut active);
                let index = slice
                    .try_allocate_document()
                    .expect("newly created slice has no space");
                (slice, index)
            }
        };

        self.layout.doc_table().set_doc_id(slice.buffer(), index, id);
        DocumentHandle::new(Arc::clone(self), slice, index, id)
    }

    /// Create a slice, publish a list that appends its buffer, and retire
    /// the superseded list. Called with the slices lock held.
    fn create_new_active_slice(&self, active: &mut Option<Arc<Slice>>) -> Arc<Slice> {
        let slice = Slice::new(self);

        let current = unsafe { &*self.slice_list.load(Ordering::Acquire) };
        let mut next: SliceList = current.clone();
        next.push(Arc::clone(&slice));
        let old = self
            .slice_list
            .swap(Box::into_raw(Box::new(next)), Ordering::AcqRel);
        *active = Some(Arc::clone(&slice));

        // The buffers the old vector names are still live; only the vector
        // itself is retired.
        self.recycler.schedule(DeferredSliceDelete::new(
            None,
            Some(RetiredSliceList::from_raw(old)),
        ));

        debug!(shard = self.id, "published new active slice");
        slice
    }

    /// Flip the bits of every row the term expands to, for one document
    /// column. Lock-free with respect to other columns.
    pub fn add_posting(&self, term: &Term, doc: DocIndex, buffer: &SliceBuffer) {
        self.frequency_builder.lock().on_term(term);

        for row in RowIdSequence::new(term, self.term_table.as_ref()) {
            self.layout
                .row_table(row.rank())
                .set_bit(buffer, row.index(), doc);
        }
    }

    /// Set or clear the single row naming `fact` for one document column.
    /// A fact that expands to zero rows or to more than one row is an
    /// error.
    pub fn assert_fact(
        &self,
        fact: FactHandle,
        value: bool,
        doc: DocIndex,
        buffer: &SliceBuffer,
    ) -> Result<()> {
        let term = Term::from_fact(fact);
        let rows = self.term_table.row_ids(&term);
        let row = match rows.as_slice() {
            [row] => *row,
            [] => {
                return Err(SigdexError::TermResolution(
                    "fact term expands to no rows".to_string(),
                ))
            }
            _ => {
                return Err(SigdexError::TermResolution(
                    "fact term expands to more than one row".to_string(),
                ))
            }
        };

        let table = self.layout.row_table(row.rank());
        if value {
            table.set_bit(buffer, row.index(), doc);
        } else {
            table.clear_bit(buffer, row.index(), doc);
        }
        Ok(())
    }

    /// Raise or clear the document-active bit for a column.
    pub(crate) fn set_document_active(&self, buffer: &SliceBuffer, doc: DocIndex, active: bool) {
        let row = self.document_active_row;
        let table = self.layout.row_table(row.rank());
        if active {
            table.set_bit(buffer, row.index(), doc);
        } else {
            table.clear_bit(buffer, row.index(), doc);
        }
    }

    /// Take a fully expired slice out of publication and schedule it,
    /// together with the superseded list, for deferred destruction.
    pub fn recycle_slice(&self, slice: &Arc<Slice>) -> Result<()> {
        let retired = {
            let mut active = self.active_slice.lock();

            if !slice.is_expired() {
                return Err(SigdexError::SliceNotExpired);
            }

            let current = unsafe { &*self.slice_list.load(Ordering::Acquire) };
            let next: SliceList = current
                .iter()
                .filter(|published| !Arc::ptr_eq(published, slice))
                .cloned()
                .collect();
            if next.len() + 1 != current.len() {
                return Err(SigdexError::SliceNotPublished);
            }

            let old = self
                .slice_list
                .swap(Box::into_raw(Box::new(next)), Ordering::AcqRel);

            if active
                .as_ref()
                .map_or(false, |current| Arc::ptr_eq(current, slice))
            {
                // The recycled slice was the last one in the shard.
                *active = None;
            }

            RetiredSliceList::from_raw(old)
        };

        // Scheduling happens outside the lock.
        self.recycler.schedule(DeferredSliceDelete::new(
            Some(Arc::clone(slice)),
            Some(retired),
        ));

        debug!(shard = self.id, "scheduled slice for recycling");
        Ok(())
    }

    /// Published slices, readable for the lifetime of the caller's token.
    /// The recycler keeps superseded lists alive until every token that
    /// could have seen them drains, so no lock is needed here.
    pub fn slice_list<'t>(&self, _token: &'t Token) -> &'t SliceList {
        unsafe { &*self.slice_list.load(Ordering::Acquire) }
    }

    /// Bytes held by published slice buffers. Buffers retired but not yet
    /// recycled stop counting as soon as the new list is published.
    pub fn used_capacity_in_bytes(&self) -> usize {
        let _active = self.active_slice.lock();
        let current = unsafe { &*self.slice_list.load(Ordering::Acquire) };
        current.len() * self.layout.buffer_size()
    }

    /// Record one committed document with the frequency builder.
    pub fn record_document(&self) {
        self.frequency_builder.lock().on_document_enter();
    }

    pub fn write_document_frequency_table(
        &self,
        out: &mut dyn std::io::Write,
        truncation_frequency: f64,
    ) -> Result<()> {
        self.frequency_builder
            .lock()
            .write_frequencies(out, truncation_frequency)
    }

    pub fn write_cumulative_term_counts(&self, out: &mut dyn std::io::Write) -> Result<()> {
        self.frequency_builder.lock().write_cumulative_term_counts(out)
    }

    pub fn write_indexed_idf_table(
        &self,
        out: &mut dyn std::io::Write,
        truncation_frequency: f64,
    ) -> Result<()> {
        self.frequency_builder
            .lock()
            .write_indexed_idf_table(out, truncation_frequency)
    }
}

impl Drop for Shard {
    fn drop(&mut self) {
        let raw = self
            .slice_list
            .swap(std::ptr::null_mut(), Ordering::AcqRel);
        if !raw.is_null() {
            drop(unsafe { Box::from_raw(raw) });
        }
    }
}

fn resolve_document_active_row(term_table: &dyn TermTable) -> Result<RowId> {
    let rows = term_table.row_ids(&term_table.document_active_term());
    match rows.as_slice() {
        [row] if row.rank() == 0 => Ok(*row),
        [_] => Err(SigdexError::TermResolution(
            "document-active row must be rank 0".to_string(),
        )),
        [] => Err(SigdexError::TermResolution(
            "document-active term expands to no rows".to_string(),
        )),
        _ => Err(SigdexError::TermResolution(
            "document-active term expands to more than one row".to_string(),
        )),
    }
}
