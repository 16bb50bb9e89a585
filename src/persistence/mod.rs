//! Parameterized artifact files
//!
//! The core never names files directly; it asks the file manager for a
//! descriptor and opens a stream through it. Statistics artifacts split
//! across two directories: intermediate (build-time byproducts) and index
//! (tables later loaded next to the term tables).

mod file_manager;

pub use file_manager::{FileDescriptor, FileManager};
