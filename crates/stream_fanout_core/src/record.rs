//! DynamoDB Stream change records.
//!
//! Records decode leniently: every field defaults when absent so that a
//! partially-populated record still reaches the classifier. Attribute values
//! stay in their typed-wrapper form (`{"S": "..."}`) and are forwarded
//! verbatim in the outbound message.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::error::DecodeError;

pub const PARTITION_KEY_ATTRIBUTE: &str = "PK";
pub const SORT_KEY_ATTRIBUTE: &str = "SK";
pub const EVENT_TYPE_ATTRIBUTE: &str = "eventType";

/// Attribute name to typed wrapper, e.g. `{"PK": {"S": "LICENSE#abc"}}`.
pub type Image = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventName {
    Insert,
    Modify,
    Remove,
    #[default]
    Unknown,
}

impl EventName {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "INSERT" => Self::Insert,
            "MODIFY" => Self::Modify,
            "REMOVE" => Self::Remove,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Modify => "MODIFY",
            Self::Remove => "REMOVE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl<'de> Deserialize<'de> for EventName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(EventName::parse).unwrap_or_default())
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StreamRecord {
    #[serde(rename = "Keys", default, deserialize_with = "null_as_default")]
    pub keys: Image,
    #[serde(rename = "NewImage", default, skip_serializing_if = "Option::is_none")]
    pub new_image: Option<Image>,
    #[serde(rename = "OldImage", default, skip_serializing_if = "Option::is_none")]
    pub old_image: Option<Image>,
    #[serde(
        rename = "SequenceNumber",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sequence_number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChangeRecord {
    #[serde(rename = "eventID", default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(rename = "eventName", default)]
    pub event_name: EventName,
    #[serde(
        rename = "eventSource",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub event_source: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dynamodb: StreamRecord,
}

impl ChangeRecord {
    pub fn partition_key(&self) -> Option<&str> {
        string_attribute(&self.dynamodb.keys, PARTITION_KEY_ATTRIBUTE)
    }

    pub fn sort_key(&self) -> Option<&str> {
        string_attribute(&self.dynamodb.keys, SORT_KEY_ATTRIBUTE)
    }

    /// Embedded `eventType`, read from the new image and then the old image
    /// so that REMOVE records still carry it.
    pub fn source_event_type(&self) -> Option<&str> {
        self.dynamodb
            .new_image
            .as_ref()
            .and_then(|image| string_attribute(image, EVENT_TYPE_ATTRIBUTE))
            .or_else(|| {
                self.dynamodb
                    .old_image
                    .as_ref()
                    .and_then(|image| string_attribute(image, EVENT_TYPE_ATTRIBUTE))
            })
    }

    /// Identifier reported back to the stream source for partial batch
    /// failures. DynamoDB Stream checkpoints only accept the sequence number,
    /// so `eventID` is not a substitute.
    pub fn item_identifier(&self) -> Option<&str> {
        self.dynamodb.sequence_number.as_deref()
    }

    /// Stable digest of the record identity. A redelivered record produces the
    /// same fingerprint, which lets subscribers drop replays.
    pub fn fingerprint(&self) -> String {
        let identity = json!({
            "eventName": self.event_name,
            "keys": self.dynamodb.keys,
            "itemIdentifier": self.item_identifier(),
        });
        let mut hasher = Sha256::new();
        hasher.update(identity.to_string());
        format!("{:x}", hasher.finalize())
    }
}

/// Reads the string value of a typed wrapper (`{"S": "..."}`).
pub fn string_attribute<'a>(image: &'a Image, name: &str) -> Option<&'a str> {
    image.get(name)?.get("S")?.as_str()
}

/// `Records` entry whose fields carry the wrong JSON types. The sequence
/// number is read from the raw entry so it can still be reported as a
/// partial batch failure.
#[derive(Debug)]
pub struct UndecodedRecord {
    pub index: usize,
    pub sequence_number: Option<String>,
    pub source: serde_json::Error,
}

impl From<UndecodedRecord> for DecodeError {
    fn from(record: UndecodedRecord) -> Self {
        DecodeError::InvalidRecord {
            index: record.index,
            source: record.source,
        }
    }
}

/// Decodes the `Records` array of a DynamoDB Stream Lambda event. The first
/// undecodable record fails the whole event.
pub fn decode_stream_event(event: Value) -> Result<Vec<ChangeRecord>, DecodeError> {
    let (records, undecoded) = decode_stream_records(event)?;
    match undecoded.into_iter().next() {
        Some(record) => Err(record.into()),
        None => Ok(records),
    }
}

/// Decodes each `Records` entry on its own, splitting the batch into decoded
/// records and the entries that failed to decode. Only a missing `Records`
/// array fails the whole event.
pub fn decode_stream_records(
    event: Value,
) -> Result<(Vec<ChangeRecord>, Vec<UndecodedRecord>), DecodeError> {
    let Value::Object(mut object) = event else {
        return Err(DecodeError::NotAnObject);
    };

    let Some(Value::Array(entries)) = object.remove("Records") else {
        return Err(DecodeError::MissingRecords);
    };

    let mut records = Vec::with_capacity(entries.len());
    let mut undecoded = Vec::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let sequence_number = entry
            .pointer("/dynamodb/SequenceNumber")
            .and_then(Value::as_str)
            .map(str::to_string);
        match serde_json::from_value(entry) {
            Ok(record) => records.push(record),
            Err(source) => undecoded.push(UndecodedRecord {
                index,
                sequence_number,
                source,
            }),
        }
    }

    Ok((records, undecoded))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
