use thiserror::Error;

/// Main error type for sigdex operations
///
/// Variants cover the recoverable failures of the ingestion core. Invariant
/// violations that imply a programmer bug (commit with nothing pending,
/// a freshly created slice refusing its first allocation, a slice buffer
/// too small for one capacity quantum) are asserts, not errors.
#[derive(Error, Debug)]
pub enum SigdexError {
    #[error("duplicate document id: {0}")]
    DuplicateDocument(u64),

    #[error("parse error at position {position}: {message}")]
    Parse { message: String, position: usize },

    #[error("term resolution error: {0}")]
    TermResolution(String),

    #[error("slice being recycled has not been fully expired")]
    SliceNotExpired,

    #[error("slice buffer to be removed is not in the published buffer list")]
    SliceNotPublished,

    #[error("expired more documents than were committed")]
    NothingToExpire,

    #[error("token manager is shut down")]
    TokensShutDown,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
}

/// Result type alias for sigdex operations
pub type Result<T> = std::result::Result<T, SigdexError>;

impl SigdexError {
    /// Errors a caller can retry around without repairing index state first.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SigdexError::Io(_) | SigdexError::Serialization(_))
    }
}
