//! One-shot fetch of a historical page.

use reqwest::header::ACCEPT;
use tideline_types::SubscriptionDescriptor;
use tracing::debug;

use crate::endpoint::Endpoints;
use crate::error::ClientError;

/// Fetches historical pages as raw JSON values.
///
/// Items are returned undecoded so the coordinator can drop bad ones
/// individually instead of failing the whole page.
#[derive(Debug, Clone)]
pub struct HistoryClient {
    client: reqwest::Client,
    endpoints: Endpoints,
}

impl HistoryClient {
    /// Create a client sharing `client`'s connection pool.
    pub const fn new(client: reqwest::Client, endpoints: Endpoints) -> Self {
        Self { client, endpoints }
    }

    /// Fetch the page described by `descriptor`.
    ///
    /// No timeout is applied.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the request fails,
    /// [`ClientError::Status`] on a non-success status, and
    /// [`ClientError::Decode`] if the body is not a JSON array.
    pub async fn fetch(
        &self,
        descriptor: &SubscriptionDescriptor,
    ) -> Result<Vec<serde_json::Value>, ClientError> {
        let url = self.endpoints.history_url(descriptor)?;
        debug!(%url, "fetching history");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ClientError::Http(format!("history request failed: {e}")))?;

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

        response
            .json::<Vec<serde_json::Value>>()
            .await
            .map_err(|e| ClientError::Decode(format!("history page is not a JSON array: {e}")))
    }
}
