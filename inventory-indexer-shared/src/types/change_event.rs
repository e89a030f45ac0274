//! Change event types.
//!
//! Defines the typed change notifications that the change feed decoder produces
//! and the change event processor consumes.

use std::fmt;

/// The kind of change the record store reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeOperation {
    /// A new record was written.
    Insert,
    /// An existing record was modified.
    Modify,
    /// A record was removed.
    Remove,
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeOperation::Insert => "insert",
            ChangeOperation::Modify => "modify",
            ChangeOperation::Remove => "remove",
        };
        f.write_str(name)
    }
}

/// A single change notification for an entity.
///
/// Insert and modify events carry the new entity snapshot. Remove events only
/// carry the identifier of the removed record.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent<E> {
    /// The type of change.
    pub operation: ChangeOperation,
    /// The entity after the change (insert and modify only).
    pub entity: Option<E>,
    /// The document identifier the change applies to.
    pub identifier: String,
}

impl<E> ChangeEvent<E> {
    /// Create an insert event.
    pub fn insert(identifier: impl Into<String>, entity: E) -> Self {
        Self {
            operation: ChangeOperation::Insert,
            entity: Some(entity),
            identifier: identifier.into(),
        }
    }

    /// Create a modify event.
    pub fn modify(identifier: impl Into<String>, entity: E) -> Self {
        Self {
            operation: ChangeOperation::Modify,
            entity: Some(entity),
            identifier: identifier.into(),
        }
    }

    /// Create a remove event.
    pub fn remove(identifier: impl Into<String>) -> Self {
        Self {
            operation: ChangeOperation::Remove,
            entity: None,
            identifier: identifier.into(),
        }
    }
}
