//! Read-side projections handed to the rendering layer.
//!
//! The driver publishes a [`TimelineView`] after every change. Day groups
//! and category styles are derived from it on demand.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::event::Event;
use crate::subscription::SubscriptionDescriptor;

// ---------------------------------------------------------------------------
// Feed status
// ---------------------------------------------------------------------------

/// Lifecycle state of the feed, also used as the connectivity signal shown
/// to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "state", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum FeedStatus {
    /// No subscription.
    #[default]
    Idle,
    /// Sources requested, not all of them established yet.
    Subscribing,
    /// Every requested source is established.
    Active,
    /// The live stream failed and a reconnect is scheduled.
    Reconnecting {
        /// Consecutive failed attempts so far.
        attempt: u32,
        /// Delay before the next attempt, in milliseconds.
        retry_in_ms: u64,
    },
    /// The reconnect budget is exhausted; re-subscribe to try again.
    CircuitOpen {
        /// Consecutive failed attempts that opened the circuit.
        attempts: u32,
    },
}

impl FeedStatus {
    /// Short label for logs and the HTML page.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Subscribing => "subscribing",
            Self::Active => "active",
            Self::Reconnecting { .. } => "reconnecting",
            Self::CircuitOpen { .. } => "offline",
        }
    }
}

/// Snapshot of the buffer and the subscription it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TimelineView {
    /// The feed being shown, if any.
    pub descriptor: Option<SubscriptionDescriptor>,
    /// Feed lifecycle state.
    pub status: FeedStatus,
    /// Buffered events, newest first.
    pub events: Vec<Event>,
}

// ---------------------------------------------------------------------------
// Day grouping
// ---------------------------------------------------------------------------

/// Human-relative date bucket an event falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(tag = "kind", content = "date", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum DayBucket {
    /// Same calendar day as "now".
    Today,
    /// The calendar day before "now".
    Yesterday,
    /// Any other calendar day.
    Date(NaiveDate),
}

impl DayBucket {
    /// Heading shown above the group, e.g. `Today` or `Monday, January 1, 2024`.
    pub fn label(&self) -> String {
        match self {
            Self::Today => String::from("Today"),
            Self::Yesterday => String::from("Yesterday"),
            Self::Date(date) => date.format("%A, %B %-d, %Y").to_string(),
        }
    }
}

/// A run of consecutive buffered events sharing a [`DayBucket`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EventGroup {
    /// Bucket shared by every event in the group.
    pub bucket: DayBucket,
    /// Rendered heading for the bucket.
    pub label: String,
    /// Events in buffer order.
    pub events: Vec<Event>,
}

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

/// Icon and color used to render an event category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CategoryStyle {
    /// Icon name understood by the widget.
    pub icon: String,
    /// CSS color.
    pub color: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_labels() {
        assert_eq!(DayBucket::Today.label(), "Today");
        assert_eq!(DayBucket::Yesterday.label(), "Yesterday");
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).map(DayBucket::Date);
        assert_eq!(
            date.map(|b| b.label()),
            Some(String::from("Monday, January 1, 2024"))
        );
    }

    #[test]
    fn status_serializes_with_state_tag() {
        let status = FeedStatus::Reconnecting {
            attempt: 2,
            retry_in_ms: 400,
        };
        let json = serde_json::to_value(status).unwrap_or_default();
        assert_eq!(json.get("state").and_then(|v| v.as_str()), Some("reconnecting"));
        assert_eq!(json.get("attempt").and_then(serde_json::Value::as_u64), Some(2));
        assert_eq!(FeedStatus::CircuitOpen { attempts: 5 }.label(), "offline");
    }
}
