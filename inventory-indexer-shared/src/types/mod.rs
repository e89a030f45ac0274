//! This module defines the core data structures and types used across the indexer.
//! It re-exports the inventory entity, the indexed entity trait, and change events.

pub mod change_event;
pub mod indexed_entity;
pub mod inventory_item;

pub use change_event::{ChangeEvent, ChangeOperation};
pub use indexed_entity::IndexedEntity;
pub use inventory_item::InventoryItem;
