//! External id to storage location mapping
//!
//! Maps each `DocId` to the handle naming its slice and column. Sharded
//! internally by the map, so concurrent adds on different ids do not
//! contend.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{Result, SigdexError};
use crate::index::document::DocumentHandle;
use crate::term::DocId;

#[derive(Default)]
pub struct DocumentMap {
    map: DashMap<DocId, DocumentHandle>,
}

impl DocumentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a handle under its document id. Ids are unique; a second add
    /// of the same id fails without touching the existing entry.
    pub fn add(&self, handle: DocumentHandle) -> Result<()> {
        match self.map.entry(handle.doc_id()) {
            Entry::Occupied(_) => Err(SigdexError::DuplicateDocument(handle.doc_id())),
            Entry::Vacant(vacant) => {
                vacant.insert(handle);
                Ok(())
            }
        }
    }

    pub fn find(&self, id: DocId) -> Option<DocumentHandle> {
        self.map.get(&id).map(|entry| entry.value().clone())
    }

    /// Remove and return the handle for `id`, if present.
    pub fn remove(&self, id: DocId) -> Option<DocumentHandle> {
        self.map.remove(&id).map(|(_, handle)| handle)
    }

    pub fn contains(&self, id: DocId) -> bool {
        self.map.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
