//! One capacity-bounded generation of documents inside a shard
//!
//! A slice owns one buffer from the shard's allocator and tracks the
//! allocate/commit/expire state machine for its document columns. The
//! reference count keeps the slice alive while it is the active slice,
//! while document-map entries point into it, or while auxiliary holders
//! (such as a backup writer) reference it; the 1 -> 0 transition hands the
//! slice to the shard for recycling.

use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::allocator::{SliceBuffer, SliceBufferAllocator};
use crate::error::{Result, SigdexError};
use crate::index::layout::SliceLayout;
use crate::index::shard::Shard;
use crate::term::DocIndex;

#[derive(Debug)]
struct DocCounters {
    unallocated: DocIndex,
    commit_pending: DocIndex,
    expired: DocIndex,
}

pub struct Slice {
    layout: Arc<SliceLayout>,
    allocator: Arc<SliceBufferAllocator>,
    buffer: ManuallyDrop<SliceBuffer>,
    capacity: DocIndex,
    counters: Mutex<DocCounters>,
    ref_count: AtomicU32,
}

impl Slice {
    /// Allocate a buffer from the shard's allocator, initialize the
    /// DocTable and RowTables through it, and plant the back-pointer in
    /// the trailing word.
    pub fn new(shard: &Shard) -> Arc<Self> {
        let layout = shard.layout();
        let allocator = shard.allocator();
        let capacity = layout.capacity();

        let buffer = allocator.allocate(layout.buffer_size());
        layout.initialize(&buffer, shard.term_table());

        let slice = Arc::new(Self {
            capacity,
            buffer: ManuallyDrop::new(buffer),
            counters: Mutex::new(DocCounters {
                unallocated: capacity,
                commit_pending: 0,
                expired: 0,
            }),
            ref_count: AtomicU32::new(1),
            layout,
            allocator,
        });

        slice
            .buffer
            .atomic_u64(slice.layout.slice_ptr_offset())
            .store(Arc::as_ptr(&slice) as usize as u64, Ordering::Release);

        debug!(capacity, "created slice");
        slice
    }

    pub fn buffer(&self) -> &SliceBuffer {
        &self.buffer
    }

    pub fn capacity(&self) -> DocIndex {
        self.capacity
    }

    /// Recover the owning slice from a bare buffer pointer. The result is
    /// only dereferenceable while the caller holds a token covering the
    /// publication of this buffer.
    pub fn slice_from_buffer(buffer: &SliceBuffer, slice_ptr_offset: usize) -> *const Slice {
        buffer.atomic_u64(slice_ptr_offset).load(Ordering::Acquire) as usize as *const Slice
    }

    /// Claim the next document column. Returns `None` once every column
    /// has been handed out.
    pub fn try_allocate_document(&self) -> Option<DocIndex> {
        let mut counters = self.counters.lock();
        if counters.unallocated == 0 {
            return None;
        }
        let index = self.capacity - counters.unallocated;
        counters.unallocated -= 1;
        counters.commit_pending += 1;
        Some(index)
    }

    /// Finish one pending document. Returns true when this commit made the
    /// slice full, so the caller can run post-full housekeeping.
    pub fn commit_document(&self) -> bool {
        let mut counters = self.counters.lock();
        assert!(
            counters.commit_pending > 0,
            "commit_document with no commit pending"
        );
        counters.commit_pending -= 1;
        counters.unallocated + counters.commit_pending == 0
    }

    /// Expire one committed document. Returns true when the slice just
    /// became fully expired.
    pub fn expire_document(&self) -> Result<bool> {
        let mut counters = self.counters.lock();
        let committed = self.capacity - counters.unallocated - counters.commit_pending;
        if counters.expired >= committed {
            return Err(SigdexError::NothingToExpire);
        }
        counters.expired += 1;
        Ok(counters.expired == self.capacity)
    }

    pub fn is_expired(&self) -> bool {
        self.counters.lock().expired == self.capacity
    }

    pub fn is_full(&self) -> bool {
        let counters = self.counters.lock();
        counters.unallocated == 0 && counters.commit_pending == 0
    }

    pub fn unallocated_count(&self) -> DocIndex {
        self.counters.lock().unallocated
    }

    pub fn commit_pending_count(&self) -> DocIndex {
        self.counters.lock().commit_pending
    }

    pub fn expired_count(&self) -> DocIndex {
        self.counters.lock().expired
    }

    pub fn committed_count(&self) -> DocIndex {
        let counters = self.counters.lock();
        self.capacity - counters.unallocated - counters.commit_pending
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count.load(Ordering::Acquire)
    }

    pub fn increment_ref_count(&self) {
        self.ref_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Drop one reference; on the 1 -> 0 transition the shard takes the
    /// slice out of publication and schedules it for recycling.
    pub fn decrement_ref_count(this: &Arc<Self>, shard: &Shard) -> Result<()> {
        let previous = this.ref_count.fetch_sub(1, Ordering::AcqRel);
        assert!(previous > 0, "ref count underflow");
        if previous == 1 {
            shard.recycle_slice(this)?;
        }
        Ok(())
    }
}

impl Drop for Slice {
    fn drop(&mut self) {
        self.layout.doc_table().cleanup(&self.buffer);
        let buffer = unsafe { ManuallyDrop::take(&mut self.buffer) };
        self.allocator.release(buffer);
    }
}
