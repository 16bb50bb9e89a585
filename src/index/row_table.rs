//! Bit-matrix region of a slice buffer, one table per rank
//!
//! A rank-r row packs one bit per `2^r` consecutive document columns, so a
//! row occupies `capacity / (8 * 2^r)` bytes. Bit accessors are pure offset
//! arithmetic plus a single atomic byte operation; they never lock.

use std::sync::atomic::Ordering;

use crate::allocator::SliceBuffer;
use crate::term::{DocIndex, Rank, RowIndex};
use crate::term_table::{RowIdSequence, TermTable};

#[derive(Clone, Debug)]
pub struct RowTableDescriptor {
    capacity: DocIndex,
    row_count: RowIndex,
    rank: Rank,
    base_offset: usize,
    row_bytes: usize,
}

impl RowTableDescriptor {
    pub fn new(capacity: DocIndex, row_count: RowIndex, rank: Rank, base_offset: usize) -> Self {
        let row_bytes = row_bytes(capacity, rank);
        Self {
            capacity,
            row_count,
            rank,
            base_offset,
            row_bytes,
        }
    }

    /// Bytes the table occupies for `row_count` rows at `rank`.
    pub fn buffer_size(capacity: DocIndex, row_count: RowIndex, rank: Rank) -> usize {
        row_count as usize * row_bytes(capacity, rank)
    }

    pub fn region_size(&self) -> usize {
        self.row_count as usize * self.row_bytes
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn row_count(&self) -> RowIndex {
        self.row_count
    }

    /// Byte offset of `row` within the slice buffer.
    pub fn row_offset(&self, row: RowIndex) -> usize {
        assert!(row < self.row_count, "row index out of range");
        self.base_offset + row as usize * self.row_bytes
    }

    /// Zero the region, then raise every bit of each row the
    /// document-active system term expands to at this rank.
    pub fn initialize(&self, buffer: &SliceBuffer, term_table: &dyn TermTable) {
        buffer.zero_region(self.base_offset, self.region_size());

        let active = term_table.document_active_term();
        for row in RowIdSequence::new(&active, term_table) {
            if row.rank() == self.rank {
                buffer.fill_region(self.row_offset(row.index()), self.row_bytes, 0xFF);
            }
        }
    }

    pub fn set_bit(&self, buffer: &SliceBuffer, row: RowIndex, doc: DocIndex) {
        let (offset, mask) = self.bit_position(row, doc);
        buffer.atomic_u8(offset).fetch_or(mask, Ordering::Relaxed);
    }

    pub fn clear_bit(&self, buffer: &SliceBuffer, row: RowIndex, doc: DocIndex) {
        let (offset, mask) = self.bit_position(row, doc);
        buffer.atomic_u8(offset).fetch_and(!mask, Ordering::Relaxed);
    }

    pub fn get_bit(&self, buffer: &SliceBuffer, row: RowIndex, doc: DocIndex) -> bool {
        let (offset, mask) = self.bit_position(row, doc);
        buffer.atomic_u8(offset).load(Ordering::Relaxed) & mask != 0
    }

    /// Number of raised bits in `row`.
    pub fn count_bits(&self, buffer: &SliceBuffer, row: RowIndex) -> usize {
        let base = self.row_offset(row);
        (0..self.row_bytes)
            .map(|i| {
                buffer
                    .atomic_u8(base + i)
                    .load(Ordering::Relaxed)
                    .count_ones() as usize
            })
            .sum()
    }

    fn bit_position(&self, row: RowIndex, doc: DocIndex) -> (usize, u8) {
        assert!(doc < self.capacity, "doc index out of range");
        let column = doc >> self.rank;
        let offset = self.row_offset(row) + (column >> 3);
        (offset, 1 << (column & 7))
    }
}

fn row_bytes(capacity: DocIndex, rank: Rank) -> usize {
    capacity / (8 << rank)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::SliceBufferAllocator;
    use crate::term_table::BankedTermTable;

    fn buffer_for(table: &RowTableDescriptor) -> (SliceBufferAllocator, SliceBuffer) {
        let allocator = SliceBufferAllocator::new(table.region_size());
        let buffer = allocator.allocate(table.region_size());
        (allocator, buffer)
    }

    #[test]
    fn test_row_bytes_by_rank() {
        assert_eq!(RowTableDescriptor::buffer_size(4096, 1, 0), 512);
        assert_eq!(RowTableDescriptor::buffer_size(4096, 1, 3), 64);
        assert_eq!(RowTableDescriptor::buffer_size(4096, 1, 6), 8);
        assert_eq!(RowTableDescriptor::buffer_size(4096, 10, 0), 5120);
    }

    #[test]
    fn test_set_clear_get_bit() {
        let table = RowTableDescriptor::new(256, 4, 0, 0);
        let (allocator, buffer) = buffer_for(&table);

        assert!(!table.get_bit(&buffer, 2, 100));
        table.set_bit(&buffer, 2, 100);
        assert!(table.get_bit(&buffer, 2, 100));

        // Neighbors and other rows stay clear.
        assert!(!table.get_bit(&buffer, 2, 99));
        assert!(!table.get_bit(&buffer, 2, 101));
        assert!(!table.get_bit(&buffer, 1, 100));
        assert!(!table.get_bit(&buffer, 3, 100));

        table.clear_bit(&buffer, 2, 100);
        assert!(!table.get_bit(&buffer, 2, 100));

        allocator.release(buffer);
    }

    #[test]
    fn test_higher_rank_shares_bits() {
        let table = RowTableDescriptor::new(256, 2, 3, 0);
        let (allocator, buffer) = buffer_for(&table);

        // Rank-3 bits cover 8 consecutive documents.
        table.set_bit(&buffer, 0, 16);
        for doc in 16..24 {
            assert!(table.get_bit(&buffer, 0, doc));
        }
        assert!(!table.get_bit(&buffer, 0, 15));
        assert!(!table.get_bit(&buffer, 0, 24));

        allocator.release(buffer);
    }

    #[test]
    fn test_initialize_raises_active_row() {
        let term_table = BankedTermTable::new(vec![4], 2);
        let capacity = 64;
        let table = RowTableDescriptor::new(capacity, 4, 0, 0);
        let (allocator, buffer) = buffer_for(&table);
        buffer.fill_region(0, buffer.len(), 0xA5);

        table.initialize(&buffer, &term_table);

        // Row 0 is the document-active row: every column raised.
        assert_eq!(table.count_bits(&buffer, 0), capacity);
        for row in 1..4 {
            assert_eq!(table.count_bits(&buffer, row), 0);
        }

        allocator.release(buffer);
    }
}
