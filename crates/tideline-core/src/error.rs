//! Error types for event ingestion.
//!
//! A [`ParseError`] is never fatal: the coordinator drops the offending
//! message and keeps going.

/// Why an inbound message could not become an [`Event`](tideline_types::Event).
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The push frame was not valid JSON (keep-alives, stray text).
    #[error("push payload is not JSON: {0}")]
    Payload(#[source] serde_json::Error),

    /// The JSON value does not match the raw message wire contract.
    #[error("message does not match the wire contract: {0}")]
    Shape(#[source] serde_json::Error),

    /// The `time` field is not an ISO-8601 instant.
    #[error("invalid timestamp {value:?}: {source}")]
    Timestamp {
        /// The offending text.
        value: String,
        /// The underlying chrono parse error.
        source: chrono::ParseError,
    },
}
