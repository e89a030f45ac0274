//! Interface definitions for the document and record stores.
//!
//! This module defines the abstract `DocumentStore` and `RecordStore` traits
//! that allow for dependency injection and swappable backend implementations.

mod document_store;
mod record_store;

pub use document_store::DocumentStore;
pub use record_store::{RecordScan, RecordStore};
