//! Per-document metadata region of a slice buffer
//!
//! The DocTable is an array of fixed-size records, one per document column.
//! A record stores the external DocId, one pointer slot per variable-size
//! blob, then the fixed-size blobs. Records are padded to 8-byte alignment
//! so the DocId and pointer slots support atomic access. All accessors are
//! offset arithmetic over the buffer; none of them lock.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;
use std::sync::atomic::Ordering;

use crate::allocator::SliceBuffer;
use crate::schema::{DocumentDataSchema, FixedSizeBlobId, VariableSizeBlobId};
use crate::term::{DocId, DocIndex};

const DOC_ID_BYTES: usize = 8;
const BLOB_SLOT_BYTES: usize = 8;
const VAR_BLOB_HEADER: usize = 8;

/// Computes record offsets and mediates blob access for one slice layout.
#[derive(Clone, Debug)]
pub struct DocTableDescriptor {
    capacity: DocIndex,
    base_offset: usize,
    record_size: usize,
    variable_count: usize,
    /// Offset of each fixed blob within a record, paired with its length.
    fixed_blobs: Vec<(usize, usize)>,
}

impl DocTableDescriptor {
    pub fn new(capacity: DocIndex, schema: &DocumentDataSchema, base_offset: usize) -> Self {
        assert!(base_offset % 8 == 0, "doc table must start word-aligned");

        let variable_count = schema.variable_size_blob_count();
        let mut offset = DOC_ID_BYTES + variable_count * BLOB_SLOT_BYTES;
        let mut fixed_blobs = Vec::with_capacity(schema.fixed_size_blob_sizes().len());
        for &size in schema.fixed_size_blob_sizes() {
            fixed_blobs.push((offset, size));
            offset += size;
        }

        Self {
            capacity,
            base_offset,
            record_size: round_up_word(offset),
            variable_count,
            fixed_blobs,
        }
    }

    /// Bytes the DocTable region occupies for `capacity` documents.
    pub fn buffer_size(capacity: DocIndex, schema: &DocumentDataSchema) -> usize {
        Self::new(capacity, schema, 0).region_size()
    }

    pub fn region_size(&self) -> usize {
        self.capacity * self.record_size
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    fn record_offset(&self, doc: DocIndex) -> usize {
        assert!(doc < self.capacity, "doc index out of range");
        self.base_offset + doc * self.record_size
    }

    fn slot_offset(&self, doc: DocIndex, blob: VariableSizeBlobId) -> usize {
        assert!(blob.0 < self.variable_count, "unknown variable blob");
        self.record_offset(doc) + DOC_ID_BYTES + blob.0 * BLOB_SLOT_BYTES
    }

    /// Zero the region. Called once per buffer while it is exclusively
    /// owned by the new slice.
    pub fn initialize(&self, buffer: &SliceBuffer) {
        buffer.zero_region(self.base_offset, self.region_size());
    }

    /// Free every variable-size blob still allocated in the region.
    pub fn cleanup(&self, buffer: &SliceBuffer) {
        for doc in 0..self.capacity {
            for slot in 0..self.variable_count {
                let offset = self.slot_offset(doc, VariableSizeBlobId(slot));
                let raw = buffer.atomic_u64(offset).swap(0, Ordering::AcqRel);
                if raw != 0 {
                    unsafe { var_blob_free(raw as *mut u8) };
                }
            }
        }
    }

    pub fn set_doc_id(&self, buffer: &SliceBuffer, doc: DocIndex, id: DocId) {
        buffer
            .atomic_u64(self.record_offset(doc))
            .store(id, Ordering::Release);
    }

    pub fn get_doc_id(&self, buffer: &SliceBuffer, doc: DocIndex) -> DocId {
        buffer
            .atomic_u64(self.record_offset(doc))
            .load(Ordering::Acquire)
    }

    /// Raw pointer to a fixed-size blob plus its length. The caller owns
    /// the document column it writes through.
    pub fn fixed_size_blob(
        &self,
        buffer: &SliceBuffer,
        doc: DocIndex,
        blob: FixedSizeBlobId,
    ) -> (*mut u8, usize) {
        let (offset, len) = self.fixed_blobs[blob.0];
        let offset = self.record_offset(doc) + offset;
        (unsafe { buffer.as_ptr().add(offset) }, len)
    }

    /// Copy `bytes` into a fixed-size blob. Truncation is a programmer
    /// error.
    pub fn write_fixed_size_blob(
        &self,
        buffer: &SliceBuffer,
        doc: DocIndex,
        blob: FixedSizeBlobId,
        bytes: &[u8],
    ) {
        let (offset, len) = self.fixed_blobs[blob.0];
        assert!(bytes.len() <= len, "fixed blob overflow");
        buffer.write_bytes(self.record_offset(doc) + offset, bytes);
    }

    /// Copy a fixed-size blob out of the buffer.
    pub fn read_fixed_size_blob(
        &self,
        buffer: &SliceBuffer,
        doc: DocIndex,
        blob: FixedSizeBlobId,
        out: &mut [u8],
    ) {
        let (offset, len) = self.fixed_blobs[blob.0];
        assert!(out.len() <= len, "fixed blob overread");
        buffer.read_bytes(self.record_offset(doc) + offset, out);
    }

    /// Allocate (or replace) the variable-size blob for a slot and return
    /// a pointer to its zeroed payload. Replacement frees the previous
    /// allocation.
    pub fn allocate_variable_size_blob(
        &self,
        buffer: &SliceBuffer,
        doc: DocIndex,
        blob: VariableSizeBlobId,
        byte_count: usize,
    ) -> NonNull<u8> {
        let base = unsafe { var_blob_alloc(byte_count) };
        let slot = buffer.atomic_u64(self.slot_offset(doc, blob));
        let old = slot.swap(base.as_ptr() as u64, Ordering::AcqRel);
        if old != 0 {
            unsafe { var_blob_free(old as *mut u8) };
        }
        unsafe { NonNull::new_unchecked(base.as_ptr().add(VAR_BLOB_HEADER)) }
    }

    /// Pointer to the payload of a variable-size blob, or `None` while the
    /// slot is unallocated.
    pub fn get_variable_size_blob(
        &self,
        buffer: &SliceBuffer,
        doc: DocIndex,
        blob: VariableSizeBlobId,
    ) -> Option<NonNull<u8>> {
        let raw = buffer
            .atomic_u64(self.slot_offset(doc, blob))
            .load(Ordering::Acquire);
        NonNull::new(raw as *mut u8)
            .map(|base| unsafe { NonNull::new_unchecked(base.as_ptr().add(VAR_BLOB_HEADER)) })
    }

    /// Length of an allocated variable-size blob.
    pub fn variable_size_blob_len(
        &self,
        buffer: &SliceBuffer,
        doc: DocIndex,
        blob: VariableSizeBlobId,
    ) -> Option<usize> {
        let raw = buffer
            .atomic_u64(self.slot_offset(doc, blob))
            .load(Ordering::Acquire);
        if raw == 0 {
            return None;
        }
        Some(unsafe { (*(raw as *const u64)) as usize })
    }
}

fn round_up_word(bytes: usize) -> usize {
    (bytes + 7) & !7
}

fn var_blob_layout(byte_count: usize) -> Layout {
    Layout::from_size_align(VAR_BLOB_HEADER + byte_count, 8).expect("variable blob layout")
}

/// Allocate a zeroed blob with its length stored in the leading word.
unsafe fn var_blob_alloc(byte_count: usize) -> NonNull<u8> {
    let layout = var_blob_layout(byte_count);
    let raw = alloc_zeroed(layout);
    let Some(base) = NonNull::new(raw) else {
        std::alloc::handle_alloc_error(layout);
    };
    (base.as_ptr() as *mut u64).write(byte_count as u64);
    base
}

/// Free a blob previously produced by `var_blob_alloc`; `base` is the
/// header pointer stored in the slot.
unsafe fn var_blob_free(base: *mut u8) {
    let byte_count = (base as *const u64).read() as usize;
    dealloc(base, var_blob_layout(byte_count));
}
