use serde::{Deserialize, Serialize};

use crate::classify::Category;
use crate::record::{ChangeRecord, EventName, Image};

pub const EVENT_TYPE_ATTRIBUTE: &str = "eventType";
pub const EVENT_NAME_ATTRIBUTE: &str = "eventName";
pub const SOURCE_EVENT_TYPE_ATTRIBUTE: &str = "sourceEventType";
pub const RECORD_FINGERPRINT_ATTRIBUTE: &str = "recordFingerprint";

/// Outbound envelope published once per change record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FanoutMessage {
    pub event_name: EventName,
    pub keys: Image,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_image: Option<Image>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_image: Option<Image>,
    pub timestamp: String,
    pub environment: String,
}

impl FanoutMessage {
    pub fn from_record(
        record: &ChangeRecord,
        environment: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            event_name: record.event_name,
            keys: record.dynamodb.keys.clone(),
            new_image: record.dynamodb.new_image.clone(),
            old_image: record.dynamodb.old_image.clone(),
            timestamp: timestamp.into(),
            environment: environment.into(),
        }
    }
}

/// String attributes subscribers filter on without parsing the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAttributes {
    pub event_type: Category,
    pub event_name: EventName,
    pub source_event_type: Option<String>,
    pub record_fingerprint: String,
}

impl MessageAttributes {
    pub fn for_record(record: &ChangeRecord, category: Category) -> Self {
        Self {
            event_type: category,
            event_name: record.event_name,
            source_event_type: record
                .source_event_type()
                .filter(|value| !value.trim().is_empty())
                .map(str::to_string),
            record_fingerprint: record.fingerprint(),
        }
    }

    /// Attribute name/value pairs in publish order. Empty values are left out
    /// because the transport rejects empty string attributes.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            (EVENT_TYPE_ATTRIBUTE, self.event_type.as_str().to_string()),
            (EVENT_NAME_ATTRIBUTE, self.event_name.as_str().to_string()),
        ];
        if let Some(source_event_type) = &self.source_event_type {
            pairs.push((SOURCE_EVENT_TYPE_ATTRIBUTE, source_event_type.clone()));
        }
        if !self.record_fingerprint.is_empty() {
            pairs.push((RECORD_FINGERPRINT_ATTRIBUTE, self.record_fingerprint.clone()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn record(value: Value) -> ChangeRecord {
        serde_json::from_value(value).expect("record should decode")
    }

    #[test]
    fn message_uses_camel_case_and_omits_missing_images() {
        let inserted = record(json!({
            "eventName": "INSERT",
            "dynamodb": {
                "Keys": {"PK": {"S": "LICENSE#abc"}, "SK": {"S": "META"}},
                "NewImage": {"status": {"S": "active"}}
            }
        }));

        let message = FanoutMessage::from_record(&inserted, "prod", "2026-10-19T00:00:00+00:00");
        let body = serde_json::to_value(&message).expect("message should serialize");

        assert_eq!(
            body,
            json!({
                "eventName": "INSERT",
                "keys": {"PK": {"S": "LICENSE#abc"}, "SK": {"S": "META"}},
                "newImage": {"status": {"S": "active"}},
                "timestamp": "2026-10-19T00:00:00+00:00",
                "environment": "prod"
            })
        );
    }

    #[test]
    fn message_body_round_trips_through_subscribers() {
        let removed = record(json!({
            "eventName": "REMOVE",
            "dynamodb": {
                "Keys": {"PK": {"S": "CUST#1"}, "SK": {"S": "MEMBER#2"}},
                "OldImage": {"role": {"S": "admin"}}
            }
        }));
        let message = FanoutMessage::from_record(&removed, "dev", "2026-10-19T00:00:00+00:00");
        let text = serde_json::to_string(&message).expect("message should serialize");
        let parsed: FanoutMessage = serde_json::from_str(&text).expect("message should parse");

        assert_eq!(parsed, message);
        assert!(parsed.new_image.is_none());
        assert_eq!(parsed.event_name, EventName::Remove);
    }

    #[test]
    fn attributes_carry_category_and_event_name() {
        let record = record(json!({
            "eventName": "MODIFY",
            "dynamodb": {"Keys": {"SK": {"S": "SUB#1"}}}
        }));
        let attributes = MessageAttributes::for_record(&record, Category::Payment);
        let pairs = attributes.pairs();

        assert_eq!(pairs[0], ("eventType", "PAYMENT".to_string()));
        assert_eq!(pairs[1], ("eventName", "MODIFY".to_string()));
        assert!(pairs.iter().all(|(name, _)| *name != "sourceEventType"));
        assert!(pairs
            .iter()
            .any(|(name, value)| *name == "recordFingerprint" && value.len() == 64));
    }

    #[test]
    fn attributes_forward_embedded_event_type() {
        let record = record(json!({
            "eventName": "INSERT",
            "dynamodb": {
                "Keys": {"PK": {"S": "EVENT#1"}},
                "NewImage": {"eventType": {"S": "invoice.paid"}}
            }
        }));
        let attributes = MessageAttributes::for_record(&record, Category::Payment);

        assert_eq!(attributes.source_event_type.as_deref(), Some("invoice.paid"));
        assert!(attributes
            .pairs()
            .contains(&("sourceEventType", "invoice.paid".to_string())));
    }
}
