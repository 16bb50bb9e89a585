//! Per-document data schema
//!
//! A schema is an ordered registry of blob slots stored in the DocTable
//! region of every slice buffer. It is frozen before any shard is created;
//! blob ids are stable integers from then on.

use serde::{Deserialize, Serialize};

/// Identifies a variable-size blob slot within a schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableSizeBlobId(pub usize);

/// Identifies a fixed-size blob slot within a schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixedSizeBlobId(pub usize);

/// Ordered list of variable-size and fixed-size blob slots.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DocumentDataSchema {
    /// Number of variable-size blob slots.
    variable_count: usize,
    /// Byte length of each fixed-size blob slot, in registration order.
    fixed_sizes: Vec<usize>,
}

impl DocumentDataSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a variable-size blob slot and return its stable id.
    pub fn register_variable_size_blob(&mut self) -> VariableSizeBlobId {
        let id = VariableSizeBlobId(self.variable_count);
        self.variable_count += 1;
        id
    }

    /// Register a fixed-size blob slot of `byte_count` bytes and return its
    /// stable id.
    pub fn register_fixed_size_blob(&mut self, byte_count: usize) -> FixedSizeBlobId {
        let id = FixedSizeBlobId(self.fixed_sizes.len());
        self.fixed_sizes.push(byte_count);
        id
    }

    pub fn variable_size_blob_count(&self) -> usize {
        self.variable_count
    }

    pub fn fixed_size_blob_sizes(&self) -> &[usize] {
        &self.fixed_sizes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_ids() {
        let mut schema = DocumentDataSchema::new();
        assert_eq!(schema.register_variable_size_blob(), VariableSizeBlobId(0));
        assert_eq!(schema.register_variable_size_blob(), VariableSizeBlobId(1));
        assert_eq!(schema.register_fixed_size_blob(10), FixedSizeBlobId(0));
        assert_eq!(schema.register_fixed_size_blob(4), FixedSizeBlobId(1));

        assert_eq!(schema.variable_size_blob_count(), 2);
        assert_eq!(schema.fixed_size_blob_sizes(), &[10, 4]);
    }
}
