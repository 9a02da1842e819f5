//! Subscription identity: which feed a buffer is showing and how.
//!
//! A [`SubscriptionDescriptor`] is compared as a whole. Any change to it
//! invalidates the buffer and starts a fresh subscription cycle.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Which sources feed the timeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export, export_to = "bindings/")]
pub enum FeedMode {
    /// Historical fetch only.
    Journey,
    /// Live stream only.
    Livestream,
    /// Historical fetch followed by the live stream.
    #[default]
    JourneyAndStream,
}

impl FeedMode {
    /// Whether this mode issues a historical fetch.
    pub const fn includes_history(self) -> bool {
        matches!(self, Self::Journey | Self::JourneyAndStream)
    }

    /// Whether this mode opens a live subscription.
    pub const fn includes_live(self) -> bool {
        matches!(self, Self::Livestream | Self::JourneyAndStream)
    }

    /// Wire name of the mode.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Journey => "journey",
            Self::Livestream => "livestream",
            Self::JourneyAndStream => "journey-and-stream",
        }
    }
}

impl fmt::Display for FeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known [`FeedMode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown feed mode `{0}` (expected journey, livestream or journey-and-stream)")]
pub struct UnknownFeedMode(pub String);

impl FromStr for FeedMode {
    type Err = UnknownFeedMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "journey" => Ok(Self::Journey),
            "livestream" => Ok(Self::Livestream),
            "journey-and-stream" => Ok(Self::JourneyAndStream),
            other => Err(UnknownFeedMode(other.to_owned())),
        }
    }
}

/// The identity of "what feed is this buffer showing".
///
/// `filter` and `pagination` are opaque query expressions forwarded to the
/// server untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SubscriptionDescriptor {
    /// Stream to read from.
    pub stream_id: String,
    /// Query filter expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Query pagination expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<String>,
    /// Which sources to consume.
    #[serde(default)]
    pub mode: FeedMode,
}

impl SubscriptionDescriptor {
    /// Descriptor for `stream_id` with no filter or pagination.
    pub fn new(stream_id: impl Into<String>, mode: FeedMode) -> Self {
        Self {
            stream_id: stream_id.into(),
            filter: None,
            pagination: None,
            mode,
        }
    }

    /// Set the filter expression.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Set the pagination expression.
    #[must_use]
    pub fn with_pagination(mut self, pagination: impl Into<String>) -> Self {
        self.pagination = Some(pagination.into());
        self
    }
}

/// A request from the rendering layer to change what the feed shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "action", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum SubscriptionRequest {
    /// Show the given feed, replacing the current one if it differs.
    Subscribe {
        /// The feed to show.
        descriptor: SubscriptionDescriptor,
    },
    /// Tear the feed down and return to idle.
    Unsubscribe,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_wire_names() {
        assert_eq!(
            serde_json::to_value(FeedMode::JourneyAndStream).ok(),
            Some(serde_json::json!("journey-and-stream"))
        );
        assert_eq!("livestream".parse::<FeedMode>(), Ok(FeedMode::Livestream));
        assert_eq!(" Journey ".parse::<FeedMode>(), Ok(FeedMode::Journey));
        assert!("stream".parse::<FeedMode>().is_err());
    }

    #[test]
    fn unknown_mode_error_names_the_input() {
        let err = "stream".parse::<FeedMode>().err();
        assert_eq!(err, Some(UnknownFeedMode(String::from("stream"))));
        let message = err.map(|e| e.to_string()).unwrap_or_default();
        assert_eq!(
            message,
            "unknown feed mode `stream` (expected journey, livestream or journey-and-stream)"
        );
        let boxed: Box<dyn std::error::Error> = Box::new(UnknownFeedMode(String::from("x")));
        assert!(boxed.to_string().contains("`x`"));
    }

    #[test]
    fn mode_legs() {
        assert!(FeedMode::Journey.includes_history());
        assert!(!FeedMode::Journey.includes_live());
        assert!(!FeedMode::Livestream.includes_history());
        assert!(FeedMode::Livestream.includes_live());
        assert!(FeedMode::JourneyAndStream.includes_history());
        assert!(FeedMode::JourneyAndStream.includes_live());
    }

    #[test]
    fn descriptor_defaults_mode_when_absent() {
        let descriptor: Option<SubscriptionDescriptor> =
            serde_json::from_value(serde_json::json!({ "stream_id": "orders" })).ok();
        assert_eq!(
            descriptor,
            Some(SubscriptionDescriptor::new("orders", FeedMode::JourneyAndStream))
        );
    }
}
