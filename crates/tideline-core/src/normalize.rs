//! Conversion of raw inbound messages into canonical [`Event`] records.
//!
//! Both feed sources deliver the same wire shape (see [`RawMessage`]). The
//! functions here are pure: they never log, never touch the buffer, and
//! report every failure as a [`ParseError`] for the caller to drop.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tideline_types::{Event, RawMessage};

use crate::error::ParseError;

/// Substring marking an actor as anonymous.
pub const ANONYMOUS_MARKER: &str = "anon";

/// Normalize an arbitrary JSON value into an [`Event`].
///
/// # Errors
///
/// Returns [`ParseError::Shape`] when the value is not a raw message and
/// [`ParseError::Timestamp`] when its `time` is not an ISO-8601 instant.
pub fn normalize(raw: &serde_json::Value) -> Result<Event, ParseError> {
    let message = RawMessage::deserialize(raw).map_err(ParseError::Shape)?;
    normalize_message(message)
}

/// Normalize an already-typed [`RawMessage`].
///
/// # Errors
///
/// Returns [`ParseError::Timestamp`] when `time` is not an ISO-8601 instant.
pub fn normalize_message(raw: RawMessage) -> Result<Event, ParseError> {
    let timestamp = parse_timestamp(&raw.time)?;
    Ok(Event {
        id: raw.id,
        title: raw.kind,
        timestamp,
        person: raw.person.filter(|person| !is_anonymous(person)),
        data: raw.data,
    })
}

/// Parse the text of one live push frame into JSON.
///
/// # Errors
///
/// Returns [`ParseError::Payload`] for anything that is not JSON, which is
/// how keep-alives and stray text are recognised.
pub fn parse_push_payload(text: &str) -> Result<serde_json::Value, ParseError> {
    serde_json::from_str(text).map_err(ParseError::Payload)
}

/// Offset-carrying ISO-8601 forms tried after RFC 3339. `%#z` accepts
/// `Z`, `+00`, `+0000` and `+00:00`.
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M%#z"];

/// Offset-less forms, read as UTC.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Parse an ISO-8601 instant.
///
/// RFC 3339 is tried first. Basic and hour-only offsets and minute
/// precision are also accepted. A date-time without an offset is read as
/// UTC.
///
/// # Errors
///
/// Returns [`ParseError::Timestamp`] carrying the original text and the
/// RFC 3339 parse error.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ParseError> {
    let trimmed = value.trim();
    let rfc_err = match DateTime::parse_from_rfc3339(trimmed) {
        Ok(instant) => return Ok(instant.with_timezone(&Utc)),
        Err(err) => err,
    };
    OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(trimmed, format).ok())
        .map(|instant| instant.with_timezone(&Utc))
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
                .map(|naive| naive.and_utc())
        })
        .ok_or_else(|| ParseError::Timestamp {
            value: value.to_owned(),
            source: rfc_err,
        })
}

/// Whether a person identifier marks an anonymous actor.
pub fn is_anonymous(person: &str) -> bool {
    person.contains(ANONYMOUS_MARKER)
}
