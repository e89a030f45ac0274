//! OpenSearch implementation of the document store.
//!
//! This module provides a concrete implementation of `DocumentStore`
//! using OpenSearch as the backend.

mod document_store;

pub use document_store::OpenSearchDocumentStore;
