use serde::{Deserialize, Serialize};

use crate::record::ChangeRecord;

pub const EVENT_ENTITY_PREFIX: &str = "EVENT#";
pub const PAYMENT_KEY_PREFIXES: [&str; 2] = ["SUB#", "INV#"];
pub const LICENSE_KEY_PREFIXES: [&str; 3] = ["LICENSE#", "DEVICE#", "MACHINE#"];
pub const PROFILE_SORT_KEY: &str = "PROFILE";
pub const MEMBER_KEY_PREFIX: &str = "MEMBER#";

const PAYMENT_EVENT_MARKERS: [&str; 3] = ["payment", "invoice", "subscription"];
const LICENSE_EVENT_MARKERS: [&str; 2] = ["license", "machine"];

/// Topic partition a change record is republished to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Payment,
    #[default]
    Customer,
    License,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Payment, Category::Customer, Category::License];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Payment => "PAYMENT",
            Self::Customer => "CUSTOMER",
            Self::License => "LICENSE",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-form `eventType` of an `EVENT#` item, decoded once into a tag.
///
/// Event names are matched by family marker (`payment.succeeded`,
/// `invoice.paid`, `license.expired`, ...) rather than by an exhaustive list
/// so that event names introduced upstream keep routing without a redeploy.
/// The raw name is kept for forwarding as a message attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEventType {
    Payment(String),
    License(String),
    Other(String),
}

impl SourceEventType {
    /// Markers match ASCII case-insensitively, so `Invoice.Payment_Failed`
    /// and `LICENSE.EXPIRED` route like their lower-case forms.
    pub fn decode(raw: &str) -> Self {
        let normalized = raw.to_ascii_lowercase();
        if contains_any(&normalized, &PAYMENT_EVENT_MARKERS) {
            Self::Payment(raw.to_string())
        } else if contains_any(&normalized, &LICENSE_EVENT_MARKERS) {
            Self::License(raw.to_string())
        } else {
            Self::Other(raw.to_string())
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Self::Payment(_) => Category::Payment,
            Self::License(_) => Category::License,
            Self::Other(_) => Category::Customer,
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            Self::Payment(raw) | Self::License(raw) | Self::Other(raw) => raw,
        }
    }
}

/// Assigns exactly one category to every record. First match wins:
/// `EVENT#` items route on their embedded event type, everything else on key
/// prefixes, and unmatched records fall back to [`Category::Customer`].
pub fn classify(record: &ChangeRecord) -> Category {
    let partition_key = record.partition_key().unwrap_or_default();
    let sort_key = record.sort_key().unwrap_or_default();

    if partition_key.starts_with(EVENT_ENTITY_PREFIX) {
        return record
            .source_event_type()
            .map(|raw| SourceEventType::decode(raw).category())
            .unwrap_or_default();
    }

    let keys = [sort_key, partition_key];
    if keys.iter().any(|key| starts_with_any(key, &PAYMENT_KEY_PREFIXES)) {
        return Category::Payment;
    }

    if keys.iter().any(|key| starts_with_any(key, &LICENSE_KEY_PREFIXES)) {
        return Category::License;
    }

    if sort_key == PROFILE_SORT_KEY || sort_key.starts_with(MEMBER_KEY_PREFIX) {
        return Category::Customer;
    }

    Category::default()
}

fn starts_with_any(value: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|prefix| value.starts_with(prefix))
}

fn contains_any(value: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| value.contains(marker))
}
