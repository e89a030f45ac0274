//! # Inventory Indexer Shared
//!
//! This crate defines shared data structures and types used across the inventory
//! search indexer. It includes the indexed inventory entity, the trait every
//! indexable entity implements, and the change events that flow from the record
//! store's change feed into the indexer.

pub mod types;

pub use types::change_event::{ChangeEvent, ChangeOperation};
pub use types::indexed_entity::{default_index_settings, IndexedEntity};
pub use types::inventory_item::InventoryItem;
