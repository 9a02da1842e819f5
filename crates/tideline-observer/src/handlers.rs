//! REST endpoint handlers for the rendering API.
//!
//! Reads are served from the last published [`TimelineView`] in
//! [`AppState`]; they never touch the feed driver. Subscription changes
//! are forwarded to the driver over its control channel and take effect
//! asynchronously.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | HTML timeline grouped by day |
//! | `GET` | `/api/timeline` | Buffered events with category styles |
//! | `GET` | `/api/timeline/groups` | Today / Yesterday / date groups |
//! | `GET` | `/api/status` | Feed status and descriptor |
//! | `PUT` | `/api/subscription` | Subscribe to a descriptor |
//! | `DELETE` | `/api/subscription` | Unsubscribe |

use std::fmt::Write as _;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use chrono::{DateTime, FixedOffset, Local, Utc};
use tideline_core::group_by_relative_day;
use tideline_types::{CategoryStyle, Event, SubscriptionDescriptor, SubscriptionRequest};
use tracing::info;

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for the grouped views.
#[derive(Debug, Default, serde::Deserialize)]
pub struct GroupsQuery {
    /// Viewer's UTC offset in minutes east. Defaults to the server's zone.
    pub offset_minutes: Option<i32>,
}

impl GroupsQuery {
    fn now(&self) -> Result<DateTime<FixedOffset>, ObserverError> {
        let Some(minutes) = self.offset_minutes else {
            return Ok(Local::now().fixed_offset());
        };
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ObserverError::InvalidRequest(format!("offset_minutes out of range: {minutes}"))
            })?;
        Ok(Utc::now().with_timezone(&offset))
    }
}

/// An event with its category style, as served by `GET /api/timeline`.
#[derive(Debug, serde::Serialize)]
pub struct StyledEvent {
    /// The event.
    #[serde(flatten)]
    pub event: Event,
    /// Icon and color for the event's category.
    pub style: CategoryStyle,
}

// ---------------------------------------------------------------------------
// GET / -- HTML timeline
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page rendering the timeline grouped by day.
///
/// # Errors
///
/// Returns [`ObserverError::InvalidRequest`] for an out-of-range offset.
pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GroupsQuery>,
) -> Result<impl IntoResponse, ObserverError> {
    let now = params.now()?;
    let view = state.timeline.read().await.clone();
    let groups = group_by_relative_day(view.events.iter(), &now);
    let stream = view
        .descriptor
        .as_ref()
        .map_or_else(|| String::from("(none)"), |d| escape_html(&d.stream_id));
    let status = view.status.label();

    let mut body = String::new();
    {
        let mut styles = state.styles.lock().await;
        for group in &groups {
            let _ = write!(body, "    <h2>{}</h2>\n    <ul>\n", escape_html(&group.label));
            for event in &group.events {
                let style = styles.style_for(&event.title);
                let _ = writeln!(
                    body,
                    r#"        <li><span class="icon" style="color:{color}">[{icon}]</span> <b>{title}</b> <span class="time">{time}</span>{person}</li>"#,
                    color = escape_html(&style.color),
                    icon = escape_html(&style.icon),
                    title = escape_html(&event.title),
                    time = event.timestamp.with_timezone(&now.timezone()).format("%H:%M:%S"),
                    person = event
                        .person
                        .as_deref()
                        .map(|p| format!(r#" <span class="person">{}</span>"#, escape_html(p)))
                        .unwrap_or_default(),
                );
            }
            body.push_str("    </ul>\n");
        }
    }
    if groups.is_empty() {
        body.push_str("    <p class=\"empty\">No events yet.</p>\n");
    }

    Ok(Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Tideline</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        h2 {{ color: #8b949e; font-size: 1rem; border-bottom: 1px solid #30363d; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        .time, .person, .empty {{ color: #8b949e; }}
        .status {{ color: #3fb950; font-weight: bold; }}
    </style>
</head>
<body>
    <h1>Tideline</h1>
    <p class="subtitle">Stream: {stream} -- <span class="status">{status}</span></p>
{body}</body>
</html>"#
    )))
}

// ---------------------------------------------------------------------------
// GET /api/timeline -- buffered events
// ---------------------------------------------------------------------------

/// Return the buffered events, newest first, each with its category style.
pub async fn get_timeline(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let view = state.timeline.read().await.clone();
    let mut styles = state.styles.lock().await;
    let events: Vec<StyledEvent> = view
        .events
        .into_iter()
        .map(|event| StyledEvent {
            style: styles.style_for(&event.title),
            event,
        })
        .collect();

    Json(serde_json::json!({
        "descriptor": view.descriptor,
        "status": view.status,
        "count": events.len(),
        "events": events,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/timeline/groups -- grouped projection
// ---------------------------------------------------------------------------

/// Return the buffered events grouped into Today, Yesterday and dated runs.
///
/// Groups are computed at request time against the viewer's clock.
///
/// # Query Parameters
///
/// - `offset_minutes`: viewer's UTC offset (default: server zone)
///
/// # Errors
///
/// Returns [`ObserverError::InvalidRequest`] for an out-of-range offset.
pub async fn get_groups(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GroupsQuery>,
) -> Result<impl IntoResponse, ObserverError> {
    let now = params.now()?;
    let timeline = state.timeline.read().await;
    let groups = group_by_relative_day(timeline.events.iter(), &now);
    Ok(Json(serde_json::json!({
        "count": groups.len(),
        "groups": groups,
    })))
}

// ---------------------------------------------------------------------------
// GET /api/status -- feed status
// ---------------------------------------------------------------------------

/// Return the feed status, the current descriptor and the buffer size.
pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timeline = state.timeline.read().await;
    Json(serde_json::json!({
        "label": timeline.status.label(),
        "status": timeline.status,
        "descriptor": timeline.descriptor,
        "buffered": timeline.events.len(),
        "controllable": state.control.is_some(),
    }))
}

// ---------------------------------------------------------------------------
// PUT / DELETE /api/subscription -- steer the feed
// ---------------------------------------------------------------------------

/// Ask the driver to show `descriptor`.
///
/// # Errors
///
/// Returns [`ObserverError::InvalidRequest`] for an empty stream ID and
/// [`ObserverError::Unavailable`] if no driver is attached or it stopped.
pub async fn put_subscription(
    State(state): State<Arc<AppState>>,
    Json(descriptor): Json<SubscriptionDescriptor>,
) -> Result<impl IntoResponse, ObserverError> {
    if descriptor.stream_id.trim().is_empty() {
        return Err(ObserverError::InvalidRequest(String::from(
            "stream_id must not be empty",
        )));
    }
    info!(
        stream_id = %descriptor.stream_id,
        mode = %descriptor.mode,
        "subscription requested"
    );
    forward(&state, SubscriptionRequest::Subscribe { descriptor }).await
}

/// Ask the driver to tear the feed down.
///
/// # Errors
///
/// Returns [`ObserverError::Unavailable`] if no driver is attached or it
/// stopped.
pub async fn delete_subscription(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    info!("unsubscribe requested");
    forward(&state, SubscriptionRequest::Unsubscribe).await
}

async fn forward(
    state: &AppState,
    request: SubscriptionRequest,
) -> Result<(StatusCode, Json<serde_json::Value>), ObserverError> {
    let control = state
        .control
        .as_ref()
        .ok_or_else(|| ObserverError::Unavailable(String::from("feed driver not attached")))?;
    control
        .send(request)
        .await
        .map_err(|_| ObserverError::Unavailable(String::from("feed driver stopped")))?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "ok": true })),
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
