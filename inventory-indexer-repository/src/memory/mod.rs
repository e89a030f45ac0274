//! In-memory store implementations.
//!
//! Both stores keep their data in process and mirror the observable behavior
//! of the real backends closely enough to drive the synchronizer and the
//! processors end to end. Failure injection hooks let callers exercise the
//! error paths without a live cluster or database.

mod document_store;
mod record_store;

pub use document_store::InMemoryDocumentStore;
pub use record_store::InMemoryRecordStore;
