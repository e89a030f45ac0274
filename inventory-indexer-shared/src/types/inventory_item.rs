//! Vehicle inventory records.
//!
//! This module defines the inventory entity as it is stored in the record store
//! and indexed in the search engine. Both sides use the table's camelCase
//! attribute names, so the serde renames are the field-name translation table
//! between the two.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::indexed_entity::IndexedEntity;

/// A vehicle inventory record.
///
/// The VIN is the document identifier in the search index. The client
/// identifier is the record store's partition key and is indexed as a plain
/// keyword so results can be filtered per client.
///
/// # Fields
///
/// - `client_identifier`: Owning client of the vehicle
/// - `vin`: Vehicle identification number (document ID)
/// - `body`: Optional body style (e.g. "Sedan")
/// - `book_value`: Optional book value, kept as the table stores it
/// - `certified`: Optional certification flag, kept as the table stores it
/// - `doors`: Number of doors
/// - `drive_type`: Optional drive type (e.g. "AWD")
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InventoryItem {
    #[serde(rename = "clientIdentifier")]
    pub client_identifier: String,
    #[serde(rename = "vin")]
    pub vin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(
        rename = "bookValue",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub book_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certified: Option<String>,
    #[serde(default)]
    pub doors: i32,
    #[serde(
        rename = "driveType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub drive_type: Option<String>,
}

impl InventoryItem {
    /// Create a new inventory item with no optional attributes set.
    ///
    /// # Example
    ///
    /// ```
    /// use inventory_indexer_shared::InventoryItem;
    ///
    /// let item = InventoryItem::new("client-1", "1HGCM82633A004352")
    ///     .with_body("Sedan")
    ///     .with_doors(4);
    /// assert_eq!(item.doors, 4);
    /// ```
    pub fn new(client_identifier: impl Into<String>, vin: impl Into<String>) -> Self {
        Self {
            client_identifier: client_identifier.into(),
            vin: vin.into(),
            body: None,
            book_value: None,
            certified: None,
            doors: 0,
            drive_type: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_book_value(mut self, book_value: impl Into<String>) -> Self {
        self.book_value = Some(book_value.into());
        self
    }

    pub fn with_certified(mut self, certified: impl Into<String>) -> Self {
        self.certified = Some(certified.into());
        self
    }

    pub fn with_doors(mut self, doors: i32) -> Self {
        self.doors = doors;
        self
    }

    pub fn with_drive_type(mut self, drive_type: impl Into<String>) -> Self {
        self.drive_type = Some(drive_type.into());
        self
    }
}

impl IndexedEntity for InventoryItem {
    const KIND: &'static str = "inventory_item";
    const ID_ATTRIBUTE: &'static str = "vin";

    fn document_id(&self) -> String {
        self.vin.clone()
    }

    /// Keyword fields for identifiers and exact-match filters, `body` as
    /// full text with a `raw` keyword sub-field for aggregations.
    fn index_settings() -> Value {
        json!({
            "settings": {
                "number_of_shards": 1,
                "number_of_replicas": 1
            },
            "mappings": {
                "properties": {
                    "clientIdentifier": { "type": "keyword" },
                    "vin": { "type": "keyword" },
                    "body": {
                        "type": "text",
                        "fields": {
                            "raw": { "type": "keyword" }
                        }
                    },
                    "bookValue": { "type": "keyword" },
                    "certified": { "type": "keyword" },
                    "doors": { "type": "integer" },
                    "driveType": { "type": "keyword" }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_item_new() {
        let item = InventoryItem::new("client-1", "VIN123");

        assert_eq!(item.client_identifier, "client-1");
        assert_eq!(item.vin, "VIN123");
        assert!(item.body.is_none());
        assert!(item.book_value.is_none());
        assert!(item.certified.is_none());
        assert_eq!(item.doors, 0);
        assert!(item.drive_type.is_none());
    }

    #[test]
    fn test_document_id_is_vin() {
        let item = InventoryItem::new("client-1", "VIN123").with_doors(4);
        assert_eq!(item.document_id(), "VIN123");
    }

    #[test]
    fn test_serializes_table_attribute_names() {
        let item = InventoryItem::new("client-1", "VIN123")
            .with_book_value("12000")
            .with_drive_type("AWD")
            .with_doors(2);

        let value = serde_json::to_value(&item).unwrap();

        assert_eq!(value["clientIdentifier"], "client-1");
        assert_eq!(value["vin"], "VIN123");
        assert_eq!(value["bookValue"], "12000");
        assert_eq!(value["driveType"], "AWD");
        assert_eq!(value["doors"], 2);
        // Unset optional attributes are omitted
        assert!(value.get("body").is_none());
        assert!(value.get("certified").is_none());
    }

    #[test]
    fn test_deserializes_sparse_document() {
        let item: InventoryItem =
            serde_json::from_value(json!({ "clientIdentifier": "c", "vin": "V1" })).unwrap();

        assert_eq!(item, InventoryItem::new("c", "V1"));
    }

    #[test]
    fn test_index_settings_mappings() {
        let settings = InventoryItem::index_settings();
        let properties = &settings["mappings"]["properties"];

        assert_eq!(properties["vin"]["type"], "keyword");
        assert_eq!(properties["clientIdentifier"]["type"], "keyword");
        assert_eq!(properties["body"]["type"], "text");
        assert_eq!(properties["body"]["fields"]["raw"]["type"], "keyword");
        assert_eq!(properties["doors"]["type"], "integer");
    }
}
