//! Request and response types for document and record store operations.

use serde_json::Value;

/// Outcome the document store reported for a single document write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
    Deleted,
    NotFound,
    Noop,
}

impl WriteOutcome {
    /// Parse the `result` field of a document write response.
    pub fn from_result(result: &str) -> Option<Self> {
        match result {
            "created" => Some(Self::Created),
            "updated" => Some(Self::Updated),
            "deleted" => Some(Self::Deleted),
            "not_found" => Some(Self::NotFound),
            "noop" => Some(Self::Noop),
            _ => None,
        }
    }
}

/// Acknowledgment of an index-level operation (create or delete).
///
/// `ok == false` means the store processed the request and reported it invalid;
/// the diagnostic carries the store's explanation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexAck {
    pub ok: bool,
    pub diagnostic: Option<String>,
}

impl IndexAck {
    pub fn acknowledged() -> Self {
        Self {
            ok: true,
            diagnostic: None,
        }
    }

    pub fn rejected(diagnostic: impl Into<String>) -> Self {
        Self {
            ok: false,
            diagnostic: Some(diagnostic.into()),
        }
    }
}

/// Result of a write for a single document, standalone or within a bulk batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemResponse {
    /// The document ID the write targeted.
    pub id: String,
    /// Whether the store applied the write.
    pub ok: bool,
    /// What the store did, when it said so.
    pub outcome: Option<WriteOutcome>,
    /// Store diagnostic for failed writes.
    pub diagnostic: Option<String>,
}

impl ItemResponse {
    pub fn success(id: impl Into<String>, outcome: WriteOutcome) -> Self {
        Self {
            id: id.into(),
            ok: true,
            outcome: Some(outcome),
            diagnostic: None,
        }
    }

    pub fn failure(id: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ok: false,
            outcome: None,
            diagnostic: Some(diagnostic.into()),
        }
    }

    /// A delete that found nothing to delete.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ok: false,
            outcome: Some(WriteOutcome::NotFound),
            diagnostic: Some("document not found".to_string()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.outcome == Some(WriteOutcome::NotFound)
    }
}

/// A single operation within a bulk write.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOperation {
    /// Index (create or replace) a document.
    Index { id: String, document: Value },
}

impl BulkOperation {
    pub fn id(&self) -> &str {
        match self {
            BulkOperation::Index { id, .. } => id,
        }
    }
}

/// Response of a bulk write.
///
/// Per-item failures are reported in `items` rather than raised, so callers
/// inspect `items[i].ok` to find what was rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkResponse {
    /// Whether any item in the batch failed.
    pub errors: bool,
    /// One response per submitted operation, in submission order.
    pub items: Vec<ItemResponse>,
}

impl BulkResponse {
    /// Build a response from item results, deriving the error flag.
    ///
    /// Stores that report their own flag overwrite `errors` afterwards.
    pub fn from_items(items: Vec<ItemResponse>) -> Self {
        let errors = items.iter().any(|item| !item.ok);
        Self { errors, items }
    }

    /// Response for an empty batch.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append the items of a later chunk of the same logical batch.
    pub fn merge(&mut self, other: BulkResponse) {
        self.errors |= other.errors;
        self.items.extend(other.items);
    }

    pub fn failed_items(&self) -> impl Iterator<Item = &ItemResponse> {
        self.items.iter().filter(|item| !item.ok)
    }

    pub fn succeeded_count(&self) -> usize {
        self.items.iter().filter(|item| item.ok).count()
    }
}

/// One page of a record store scan.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPage<E> {
    /// Records in this page.
    pub items: Vec<E>,
    /// Cursor for the next page, `None` when the scan is complete.
    pub next_cursor: Option<String>,
}

impl<E> RecordPage<E> {
    pub fn last(items: Vec<E>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }
}
