//! The live event stream.
//!
//! A live subscription is one long-lived `GET` answered with
//! `text/event-stream`. The body is read chunk by chunk through the
//! [`SseDecoder`]; each decoded `data` payload is handed to the
//! coordinator as raw text, since deciding what is or is not JSON is the
//! coordinator's job.

use std::collections::VecDeque;

use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tideline_types::SubscriptionDescriptor;
use tracing::debug;

use crate::endpoint::Endpoints;
use crate::error::ClientError;
use crate::sse::SseDecoder;

/// Opens live subscriptions.
#[derive(Debug, Clone)]
pub struct LiveClient {
    client: reqwest::Client,
    endpoints: Endpoints,
}

impl LiveClient {
    /// Create a client sharing `client`'s connection pool.
    pub const fn new(client: reqwest::Client, endpoints: Endpoints) -> Self {
        Self { client, endpoints }
    }

    /// Open the live stream for `descriptor`.
    ///
    /// Resolves once response headers arrive with a success status.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the connection fails and
    /// [`ClientError::Status`] on a non-success status.
    pub async fn open(&self, descriptor: &SubscriptionDescriptor) -> Result<LiveStream, ClientError> {
        let url = self.endpoints.live_url(descriptor)?;
        debug!(%url, "opening live stream");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| ClientError::Http(format!("live request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(LiveStream {
            response,
            decoder: SseDecoder::new(),
            ready: VecDeque::new(),
        })
    }
}

/// An open live stream. Dropping it closes the connection.
#[derive(Debug)]
pub struct LiveStream {
    response: reqwest::Response,
    decoder: SseDecoder,
    ready: VecDeque<String>,
}

impl LiveStream {
    /// Wait for the next pushed message.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::StreamClosed`] when the server ends the
    /// body and [`ClientError::Http`] if the connection breaks.
    pub async fn next_message(&mut self) -> Result<String, ClientError> {
        loop {
            if let Some(message) = self.ready.pop_front() {
                return Ok(message);
            }
            match self.response.chunk().await {
                Ok(Some(chunk)) => self.ready.extend(self.decoder.push(&chunk)),
                Ok(None) => return Err(ClientError::StreamClosed),
                Err(e) => return Err(ClientError::Http(format!("live stream broke: {e}"))),
            }
        }
    }
}
