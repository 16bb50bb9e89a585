//! Slice buffer layout
//!
//! A slice buffer holds, in order: the DocTable region, one RowTable region
//! per rank from 0 through `MAX_RANK`, padding, and a trailing machine word
//! reserved for the owning-slice back-pointer. `SliceLayout` fits the
//! largest capacity the configured buffer size can hold and owns the
//! descriptors for that capacity.

use crate::allocator::SliceBuffer;
use crate::index::doc_table::DocTableDescriptor;
use crate::index::row_table::RowTableDescriptor;
use crate::schema::DocumentDataSchema;
use crate::term::{docs_in_rank0_row, DocIndex, Rank, MAX_RANK};
use crate::term_table::TermTable;

const SLICE_PTR_BYTES: usize = std::mem::size_of::<u64>();

#[derive(Debug)]
pub struct SliceLayout {
    capacity: DocIndex,
    buffer_size: usize,
    doc_table: DocTableDescriptor,
    row_tables: Vec<RowTableDescriptor>,
    slice_ptr_offset: usize,
}

impl SliceLayout {
    /// Bytes a slice buffer needs for `capacity` documents, back-pointer
    /// word included.
    pub fn byte_size(
        capacity: DocIndex,
        schema: &DocumentDataSchema,
        term_table: &dyn TermTable,
    ) -> usize {
        let mut offset = DocTableDescriptor::buffer_size(capacity, schema);
        for rank in 0..=MAX_RANK {
            offset += RowTableDescriptor::buffer_size(
                capacity,
                term_table.total_row_count(rank),
                rank,
            );
        }
        offset + SLICE_PTR_BYTES
    }

    /// Largest capacity (a multiple of the rank-0 quantum) whose layout
    /// fits in `buffer_size` bytes. A buffer too small for one quantum is
    /// a configuration bug and fatal.
    pub fn capacity_for_byte_size(
        buffer_size: usize,
        schema: &DocumentDataSchema,
        term_table: &dyn TermTable,
    ) -> DocIndex {
        let quantum = docs_in_rank0_row(1, term_table.max_rank_used());
        let mut capacity = 0;
        loop {
            let suggested = capacity + quantum;
            if Self::byte_size(suggested, schema, term_table) > buffer_size {
                break;
            }
            capacity = suggested;
        }
        assert!(capacity > 0, "slice buffer size too small for one quantum");
        capacity
    }

    pub fn new(
        buffer_size: usize,
        schema: &DocumentDataSchema,
        term_table: &dyn TermTable,
    ) -> Self {
        assert!(
            buffer_size % SLICE_PTR_BYTES == 0,
            "slice buffer size must be word-aligned"
        );
        let capacity = Self::capacity_for_byte_size(buffer_size, schema, term_table);

        let doc_table = DocTableDescriptor::new(capacity, schema, 0);
        let mut offset = doc_table.region_size();
        let mut row_tables = Vec::with_capacity(MAX_RANK + 1);
        for rank in 0..=MAX_RANK {
            let row_count = term_table.total_row_count(rank);
            let table = RowTableDescriptor::new(capacity, row_count, rank, offset);
            offset += table.region_size();
            row_tables.push(table);
        }
        assert!(
            offset + SLICE_PTR_BYTES <= buffer_size,
            "slice layout overflows its buffer"
        );

        Self {
            capacity,
            buffer_size,
            doc_table,
            row_tables,
            slice_ptr_offset: buffer_size - SLICE_PTR_BYTES,
        }
    }

    pub fn capacity(&self) -> DocIndex {
        self.capacity
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn doc_table(&self) -> &DocTableDescriptor {
        &self.doc_table
    }

    pub fn row_table(&self, rank: Rank) -> &RowTableDescriptor {
        &self.row_tables[rank]
    }

    /// Offset of the trailing word that stores the owning-slice pointer.
    pub fn slice_ptr_offset(&self) -> usize {
        self.slice_ptr_offset
    }

    /// Zero-initialize every region of a fresh buffer and raise the
    /// document-active row.
    pub fn initialize(&self, buffer: &SliceBuffer, term_table: &dyn TermTable) {
        self.doc_table.initialize(buffer);
        for table in &self.row_tables {
            table.initialize(buffer, term_table);
        }
    }
}
