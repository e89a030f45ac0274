//! The trait implemented by every entity that can be kept in a search index.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

/// An entity type that has its own search index.
///
/// The entity kind is the key used to look up the index binding in the
/// synchronizer configuration, so no runtime inspection of the type is needed.
/// The document ID is the identifier the search engine keys documents by.
pub trait IndexedEntity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Stable name of the entity kind (e.g. `"inventory_item"`).
    const KIND: &'static str;

    /// Serialized name of the attribute holding the document ID.
    ///
    /// Used to recover the identifier of a removed record from its key
    /// attributes when no full snapshot is available.
    const ID_ATTRIBUTE: &'static str;

    /// The identifier this entity is stored under in the search index.
    fn document_id(&self) -> String;

    /// Settings and mappings used when the entity's index is created.
    fn index_settings() -> Value {
        default_index_settings()
    }
}

/// Index settings without explicit mappings.
///
/// - 1 primary shard
/// - 1 replica for redundancy
pub fn default_index_settings() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        }
    })
}
