//! Event records: the raw wire message and its canonical normalized form.
//!
//! Both the historical fetch and the live stream deliver the same raw
//! shape. The normalizer in `tideline-core` turns a [`RawMessage`] into an
//! [`Event`], which is what the buffer orders and the widget renders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Wire contract
// ---------------------------------------------------------------------------

/// A raw inbound message as delivered by either feed source.
///
/// ```json
/// { "type": "order.created", "time": "2024-01-01T00:00:00Z", "id": "e-1",
///   "person": "alice", "data": { "total": 42 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RawMessage {
    /// Category label of the message.
    #[serde(rename = "type")]
    pub kind: String,
    /// ISO-8601 instant, kept as text until normalization.
    pub time: String,
    /// Opaque identifier.
    pub id: String,
    /// Actor identifier, possibly an anonymous marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<String>,
    /// Opaque payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Canonical record
// ---------------------------------------------------------------------------

/// A normalized, timestamped occurrence ready for display.
///
/// `timestamp` is the only sort key. `id` is used for keying rendered rows
/// and nothing else; two events may share an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Event {
    /// Opaque unique identifier.
    pub id: String,
    /// Category/type label.
    pub title: String,
    /// When the event happened.
    pub timestamp: DateTime<Utc>,
    /// Actor identifier. Absent for anonymous actors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<String>,
    /// Opaque payload, passed through unmodified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn raw_message_uses_type_on_the_wire() {
        let raw: RawMessage = serde_json::from_value(serde_json::json!({
            "type": "deploy",
            "time": "2024-01-01T00:00:00Z",
            "id": "e-1"
        }))
        .unwrap();
        assert_eq!(raw.kind, "deploy");
        assert!(raw.person.is_none());
        assert!(raw.data.is_none());

        let json = serde_json::to_value(&raw).unwrap();
        assert_eq!(json.get("type").and_then(|v| v.as_str()), Some("deploy"));
        assert!(json.get("person").is_none());
    }

    #[test]
    fn event_omits_absent_person() {
        let event = Event {
            id: String::from("e-1"),
            title: String::from("deploy"),
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            person: None,
            data: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("person").is_none());
        assert_eq!(json.get("title").and_then(|v| v.as_str()), Some("deploy"));
    }
}
