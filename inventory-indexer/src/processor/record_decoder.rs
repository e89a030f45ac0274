//! Raw change record decoding.
//!
//! Change feed messages carry table stream records: an event name plus the
//! key attributes and the old and new images of the row, each attribute
//! wrapped in a type descriptor (`{"S": "..."}`, `{"N": "4"}`, ...). This
//! module splits feed payloads into individual records, flattens their images
//! into plain JSON and deserializes them into typed change events.
//!
//! Records travel undecoded until the change event processor picks them up,
//! so one malformed record only fails its own event.

use std::collections::BTreeMap;

use inventory_indexer_repository::IndexSyncError;
use inventory_indexer_shared::{ChangeEvent, ChangeOperation, IndexedEntity};
use serde::Deserialize;
use serde_json::{Map, Number, Value};

use crate::errors::IngestError;

/// A typed attribute value as it appears in a stream image.
///
/// Type descriptors this indexer has no use for are kept as
/// `Unsupported` rather than failing the whole record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub enum AttributeValue {
    String(String),
    /// Numbers are transported as strings.
    Number(String),
    /// Base64 encoded bytes.
    Binary(String),
    Bool(bool),
    Null(bool),
    StringSet(Vec<String>),
    NumberSet(Vec<String>),
    BinarySet(Vec<String>),
    List(Vec<AttributeValue>),
    Map(BTreeMap<String, AttributeValue>),
    Unsupported { tag: String, value: Value },
}

impl TryFrom<Map<String, Value>> for AttributeValue {
    type Error = String;

    fn try_from(descriptor: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut entries = descriptor.into_iter();
        let (tag, value) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => return Err("attribute value must have exactly one type descriptor".to_string()),
        };

        let invalid = |e: serde_json::Error| format!("invalid '{}' attribute: {}", tag, e);
        Ok(match tag.as_str() {
            "S" => Self::String(serde_json::from_value(value).map_err(invalid)?),
            "N" => Self::Number(serde_json::from_value(value).map_err(invalid)?),
            "B" => Self::Binary(serde_json::from_value(value).map_err(invalid)?),
            "BOOL" => Self::Bool(serde_json::from_value(value).map_err(invalid)?),
            "NULL" => Self::Null(serde_json::from_value(value).map_err(invalid)?),
            "SS" => Self::StringSet(serde_json::from_value(value).map_err(invalid)?),
            "NS" => Self::NumberSet(serde_json::from_value(value).map_err(invalid)?),
            "BS" => Self::BinarySet(serde_json::from_value(value).map_err(invalid)?),
            "L" => Self::List(serde_json::from_value(value).map_err(invalid)?),
            "M" => Self::Map(serde_json::from_value(value).map_err(invalid)?),
            _ => Self::Unsupported { tag, value },
        })
    }
}

impl AttributeValue {
    /// Convert to plain JSON.
    pub fn to_json(&self) -> Result<Value, IndexSyncError> {
        Ok(match self {
            AttributeValue::String(s) | AttributeValue::Binary(s) => Value::String(s.clone()),
            AttributeValue::Number(n) => Value::Number(parse_number(n)?),
            AttributeValue::Bool(b) => Value::Bool(*b),
            AttributeValue::Null(_) => Value::Null,
            AttributeValue::StringSet(values) | AttributeValue::BinarySet(values) => {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            }
            AttributeValue::NumberSet(values) => Value::Array(
                values
                    .iter()
                    .map(|n| parse_number(n).map(Value::Number))
                    .collect::<Result<_, _>>()?,
            ),
            AttributeValue::List(values) => Value::Array(
                values
                    .iter()
                    .map(AttributeValue::to_json)
                    .collect::<Result<_, _>>()?,
            ),
            AttributeValue::Map(attributes) => flatten_image(attributes)?,
            AttributeValue::Unsupported { value, .. } => value.clone(),
        })
    }
}

fn parse_number(raw: &str) -> Result<Number, IndexSyncError> {
    if let Ok(int) = raw.parse::<i64>() {
        return Ok(Number::from(int));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| IndexSyncError::parse(format!("Invalid number attribute '{}'", raw)))
}

/// Attribute name to typed value, as found in `Keys`, `NewImage` and `OldImage`.
pub type AttributeMap = BTreeMap<String, AttributeValue>;

/// Flatten an attribute map into a JSON object.
pub fn flatten_image(image: &AttributeMap) -> Result<Value, IndexSyncError> {
    let mut object = Map::with_capacity(image.len());
    for (name, value) in image {
        object.insert(name.clone(), value.to_json()?);
    }
    Ok(Value::Object(object))
}

/// Map a stream event name to its change operation.
pub fn parse_event_name(event_name: &str) -> Result<ChangeOperation, IndexSyncError> {
    match event_name {
        "INSERT" => Ok(ChangeOperation::Insert),
        "MODIFY" => Ok(ChangeOperation::Modify),
        "REMOVE" => Ok(ChangeOperation::Remove),
        other => Err(IndexSyncError::parse(format!(
            "Unknown change event name '{}'",
            other
        ))),
    }
}

/// The row data carried by a stream record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StreamRecord {
    #[serde(rename = "Keys", default)]
    pub keys: Option<AttributeMap>,
    #[serde(rename = "NewImage", default)]
    pub new_image: Option<AttributeMap>,
    #[serde(rename = "OldImage", default)]
    pub old_image: Option<AttributeMap>,
}

/// A single change record as delivered by the change feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawChangeRecord {
    #[serde(rename = "eventID", default)]
    pub event_id: Option<String>,
    /// `INSERT`, `MODIFY` or `REMOVE`.
    #[serde(rename = "eventName")]
    pub event_name: String,
    #[serde(rename = "dynamodb", default)]
    pub record: StreamRecord,
}

impl RawChangeRecord {
    /// Deserialize one undecoded record from the feed.
    pub fn from_value(value: Value) -> Result<Self, IndexSyncError> {
        serde_json::from_value(value)
            .map_err(|e| IndexSyncError::parse(format!("Malformed change record: {}", e)))
    }

    /// Best-effort operation and identifier of a record that failed to
    /// deserialize, for reporting.
    pub fn describe_undecoded(value: &Value, id_attribute: &str) -> (Option<ChangeOperation>, String) {
        let operation = value
            .get("eventName")
            .and_then(Value::as_str)
            .and_then(|name| parse_event_name(name).ok());

        let identifier = ["NewImage", "OldImage", "Keys"]
            .into_iter()
            .find_map(|image| {
                value
                    .get("dynamodb")?
                    .get(image)?
                    .get(id_attribute)?
                    .get("S")?
                    .as_str()
                    .map(str::to_string)
            })
            .unwrap_or_default();

        (operation, identifier)
    }

    /// The change operation named by the record.
    pub fn operation(&self) -> Result<ChangeOperation, IndexSyncError> {
        parse_event_name(&self.event_name)
    }

    /// Best-effort identifier of the changed record, for reporting.
    ///
    /// Looks at the new image, then the old image, then the keys. Empty when
    /// none of them carry a string `id_attribute`.
    pub fn identifier_hint(&self, id_attribute: &str) -> String {
        [
            &self.record.new_image,
            &self.record.old_image,
            &self.record.keys,
        ]
        .into_iter()
        .flatten()
        .find_map(|image| match image.get(id_attribute) {
            Some(AttributeValue::String(id)) => Some(id.clone()),
            _ => None,
        })
        .unwrap_or_default()
    }

    /// Decode the record into a typed change event.
    ///
    /// Insert and modify records are decoded from the new image. Remove records
    /// carry no new image, so the identifier is taken from the old image or,
    /// failing that, the keys.
    pub fn decode<E: IndexedEntity>(&self) -> Result<ChangeEvent<E>, IndexSyncError> {
        let operation = self.operation()?;

        match operation {
            ChangeOperation::Insert | ChangeOperation::Modify => {
                let image = self.record.new_image.as_ref().ok_or_else(|| {
                    IndexSyncError::parse(format!("{} record has no new image", operation))
                })?;
                let entity: E = serde_json::from_value(flatten_image(image)?)?;
                let identifier = entity.document_id();

                Ok(match operation {
                    ChangeOperation::Insert => ChangeEvent::insert(identifier, entity),
                    _ => ChangeEvent::modify(identifier, entity),
                })
            }
            ChangeOperation::Remove => {
                let identifier = [&self.record.old_image, &self.record.keys]
                    .into_iter()
                    .flatten()
                    .find_map(|image| match image.get(E::ID_ATTRIBUTE) {
                        Some(AttributeValue::String(id)) => Some(id.clone()),
                        _ => None,
                    })
                    .ok_or_else(|| {
                        IndexSyncError::parse(format!(
                            "remove record carries no '{}' attribute",
                            E::ID_ATTRIBUTE
                        ))
                    })?;

                Ok(ChangeEvent::remove(identifier))
            }
        }
    }
}

/// Split a change feed message payload into undecoded records.
///
/// A payload is either a single record or an envelope `{"Records": [...]}`.
/// Only the payload's outer shape is checked here; each record is decoded
/// on its own later.
pub fn parse_change_payload(payload: &[u8]) -> Result<Vec<Value>, IngestError> {
    let parsed: Value = serde_json::from_slice(payload).map_err(|e| {
        IngestError::parse(format!("Failed to decode change record payload: {}", e))
    })?;

    match parsed {
        Value::Object(mut object) if object.contains_key("Records") => {
            match object.remove("Records") {
                Some(Value::Array(records)) => Ok(records),
                _ => Err(IngestError::parse("Change record envelope 'Records' is not an array")),
            }
        }
        record @ Value::Object(_) => Ok(vec![record]),
        _ => Err(IngestError::parse("Change record payload is not a JSON object")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventory_indexer_shared::InventoryItem;
    use serde_json::json;

    fn insert_payload() -> Value {
        json!({
            "eventID": "1",
            "eventName": "INSERT",
            "dynamodb": {
                "Keys": {
                    "clientIdentifier": { "S": "client-1" },
                    "vin": { "S": "VIN123" }
                },
                "NewImage": {
                    "clientIdentifier": { "S": "client-1" },
                    "vin": { "S": "VIN123" },
                    "body": { "S": "Sedan" },
                    "doors": { "N": "4" },
                    "driveType": { "S": "AWD" },
                    "certified": { "NULL": true }
                }
            }
        })
    }

    #[test]
    fn test_decode_insert() {
        let record: RawChangeRecord = serde_json::from_value(insert_payload()).unwrap();

        let event = record.decode::<InventoryItem>().unwrap();

        assert_eq!(event.operation, ChangeOperation::Insert);
        assert_eq!(event.identifier, "VIN123");
        assert_eq!(
            event.entity,
            Some(
                InventoryItem::new("client-1", "VIN123")
                    .with_body("Sedan")
                    .with_doors(4)
                    .with_drive_type("AWD")
            )
        );
    }

    #[test]
    fn test_decode_remove_uses_old_image_or_keys() {
        let with_old_image: RawChangeRecord = serde_json::from_value(json!({
            "eventName": "REMOVE",
            "dynamodb": {
                "OldImage": { "clientIdentifier": { "S": "c" }, "vin": { "S": "VIN9" } }
            }
        }))
        .unwrap();
        let keys_only: RawChangeRecord = serde_json::from_value(json!({
            "eventName": "REMOVE",
            "dynamodb": { "Keys": { "vin": { "S": "VIN8" } } }
        }))
        .unwrap();

        let first = with_old_image.decode::<InventoryItem>().unwrap();
        let second = keys_only.decode::<InventoryItem>().unwrap();

        assert_eq!(first, ChangeEvent::remove("VIN9"));
        assert_eq!(second.identifier, "VIN8");
        assert!(second.entity.is_none());
    }

    #[test]
    fn test_decode_remove_without_identifier_fails() {
        let record: RawChangeRecord = serde_json::from_value(json!({
            "eventName": "REMOVE",
            "dynamodb": { "Keys": { "clientIdentifier": { "S": "c" } } }
        }))
        .unwrap();

        let err = record.decode::<InventoryItem>().unwrap_err();
        assert!(matches!(err, IndexSyncError::ParseError(_)));
    }

    #[test]
    fn test_decode_modify_without_new_image_fails() {
        let record: RawChangeRecord = serde_json::from_value(json!({
            "eventName": "MODIFY",
            "dynamodb": { "Keys": { "vin": { "S": "VIN1" } } }
        }))
        .unwrap();

        assert!(record.decode::<InventoryItem>().is_err());
        assert_eq!(record.identifier_hint("vin"), "VIN1");
    }

    #[test]
    fn test_unknown_event_name() {
        let record: RawChangeRecord =
            serde_json::from_value(json!({ "eventName": "TRUNCATE" })).unwrap();
        assert!(matches!(
            record.operation().unwrap_err(),
            IndexSyncError::ParseError(_)
        ));
    }

    #[test]
    fn test_decode_wrong_attribute_type_is_serialization_error() {
        let record: RawChangeRecord = serde_json::from_value(json!({
            "eventName": "INSERT",
            "dynamodb": {
                "NewImage": {
                    "clientIdentifier": { "S": "c" },
                    "vin": { "S": "VIN1" },
                    "doors": { "S": "four" }
                }
            }
        }))
        .unwrap();

        let err = record.decode::<InventoryItem>().unwrap_err();
        assert!(matches!(err, IndexSyncError::SerializationError(_)));
    }

    #[test]
    fn test_flatten_nested_attributes() {
        let image: AttributeMap = serde_json::from_value(json!({
            "price": { "N": "12999.5" },
            "tags": { "SS": ["a", "b"] },
            "options": { "L": [ { "BOOL": true }, { "N": "2" } ] },
            "dealer": { "M": { "name": { "S": "Main St" } } }
        }))
        .unwrap();

        let flat = flatten_image(&image).unwrap();

        assert_eq!(
            flat,
            json!({
                "price": 12999.5,
                "tags": ["a", "b"],
                "options": [true, 2],
                "dealer": { "name": "Main St" }
            })
        );
    }

    #[test]
    fn test_invalid_number() {
        assert!(AttributeValue::Number("1e".to_string()).to_json().is_err());
    }

    #[test]
    fn test_parse_single_record_payload() {
        let payload = serde_json::to_vec(&insert_payload()).unwrap();
        let records = parse_change_payload(&payload).unwrap();
        assert_eq!(records, vec![insert_payload()]);
    }

    #[test]
    fn test_parse_envelope_keeps_records_separate() {
        let payload = serde_json::to_vec(&json!({
            "Records": [
                insert_payload(),
                { "dynamodb": { "Keys": { "vin": { "S": "VIN2" } } } },
                { "eventName": "REMOVE", "dynamodb": { "Keys": { "vin": { "S": "VIN123" } } } }
            ]
        }))
        .unwrap();

        let records = parse_change_payload(&payload).unwrap();

        assert_eq!(records.len(), 3);
        assert!(RawChangeRecord::from_value(records[0].clone()).is_ok());
        assert!(matches!(
            RawChangeRecord::from_value(records[1].clone()).unwrap_err(),
            IndexSyncError::ParseError(_)
        ));
        assert_eq!(
            RawChangeRecord::from_value(records[2].clone()).unwrap().event_name,
            "REMOVE"
        );
    }

    #[test]
    fn test_parse_invalid_payload() {
        let err = parse_change_payload(b"not json").unwrap_err();
        assert!(matches!(err, IngestError::ParseError(_)));

        let err = parse_change_payload(br#"{"Records": {"eventName": "INSERT"}}"#).unwrap_err();
        assert!(matches!(err, IngestError::ParseError(_)));

        let err = parse_change_payload(b"[1, 2]").unwrap_err();
        assert!(matches!(err, IngestError::ParseError(_)));
    }

    #[test]
    fn test_binary_and_unknown_attributes_do_not_fail_the_record() {
        let record = RawChangeRecord::from_value(json!({
            "eventName": "INSERT",
            "dynamodb": {
                "NewImage": {
                    "clientIdentifier": { "S": "client-1" },
                    "vin": { "S": "VIN2" },
                    "doors": { "N": "2" },
                    "photo": { "B": "AAE=" },
                    "thumbnails": { "BS": ["AAE=", "AAI="] },
                    "futureType": { "XX": { "anything": 1 } }
                }
            }
        }))
        .unwrap();

        let event = record.decode::<InventoryItem>().unwrap();

        assert_eq!(event.identifier, "VIN2");
        assert_eq!(event.entity.map(|e| e.doors), Some(2));
        assert_eq!(
            record.record.new_image.unwrap()["futureType"],
            AttributeValue::Unsupported {
                tag: "XX".to_string(),
                value: json!({ "anything": 1 })
            }
        );
    }

    #[test]
    fn test_attribute_with_two_descriptors_is_rejected() {
        let result = serde_json::from_value::<AttributeValue>(json!({ "S": "a", "N": "1" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_describe_undecoded_record() {
        let value = json!({
            "eventName": "MODIFY",
            "dynamodb": { "Keys": { "vin": { "S": "VIN7" } }, "NewImage": 42 }
        });

        assert!(RawChangeRecord::from_value(value.clone()).is_err());
        assert_eq!(
            RawChangeRecord::describe_undecoded(&value, "vin"),
            (Some(ChangeOperation::Modify), "VIN7".to_string())
        );
        assert_eq!(
            RawChangeRecord::describe_undecoded(&json!({}), "vin"),
            (None, String::new())
        );
    }
}
