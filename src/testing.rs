//! Test documents
//!
//! Minimal `Document` implementations used by the crate's own tests and
//! by downstream integration tests.

use crate::error::Result;
use crate::index::document::{Document, DocumentHandle};
use crate::schema::{FixedSizeBlobId, VariableSizeBlobId};
use crate::term::{FactHandle, Term};

/// Document built from an explicit term list plus optional fact
/// assertions and blob payloads.
#[derive(Clone, Debug, Default)]
pub struct TermListDocument {
    terms: Vec<Term>,
    facts: Vec<(FactHandle, bool)>,
    fixed_payloads: Vec<(FixedSizeBlobId, Vec<u8>)>,
    variable_payloads: Vec<(VariableSizeBlobId, Vec<u8>)>,
}

impl TermListDocument {
    pub fn new(terms: Vec<Term>) -> Self {
        Self {
            terms,
            ..Self::default()
        }
    }

    /// Build a rank-0, stream-0 document from token texts.
    pub fn from_tokens(tokens: &[&str]) -> Self {
        Self::new(tokens.iter().map(|t| Term::new(t, 0, 0)).collect())
    }

    pub fn with_fact(mut self, fact: FactHandle, value: bool) -> Self {
        self.facts.push((fact, value));
        self
    }

    pub fn with_fixed_payload(mut self, blob: FixedSizeBlobId, bytes: Vec<u8>) -> Self {
        self.fixed_payloads.push((blob, bytes));
        self
    }

    pub fn with_variable_payload(mut self, blob: VariableSizeBlobId, bytes: Vec<u8>) -> Self {
        self.variable_payloads.push((blob, bytes));
        self
    }
}

impl Document for TermListDocument {
    fn posting_count(&self) -> usize {
        self.terms.len()
    }

    fn ingest(&self, handle: &DocumentHandle) -> Result<()> {
        for term in &self.terms {
            handle.add_posting(term);
        }
        for (fact, value) in &self.facts {
            handle.assert_fact(*fact, *value)?;
        }
        for (blob, bytes) in &self.fixed_payloads {
            handle.write_fixed_size_blob(*blob, bytes);
        }
        for (blob, bytes) in &self.variable_payloads {
            let payload = handle.allocate_variable_size_blob(*blob, bytes.len());
            unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), payload.as_ptr(), bytes.len())
            };
        }
        Ok(())
    }
}

/// Document whose ingest always fails; exercises the rollback path.
#[derive(Clone, Debug)]
pub struct FailingDocument {
    posting_count: usize,
}

impl FailingDocument {
    pub fn new(posting_count: usize) -> Self {
        Self { posting_count }
    }
}

impl Document for FailingDocument {
    fn posting_count(&self) -> usize {
        self.posting_count
    }

    fn ingest(&self, _handle: &DocumentHandle) -> Result<()> {
        Err(crate::error::SigdexError::TermResolution(
            "synthetic ingest failure".to_string(),
        ))
    }
}
