//! Error types for the feed transport.

/// Errors raised while talking to the feed API.
///
/// History failures are logged and end the historical leg. Live failures
/// feed the reconnect backoff. Neither is fatal.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request could not be sent or the connection broke.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The response body was not the expected JSON.
    #[error("decode error: {0}")]
    Decode(String),

    /// The live stream ended.
    #[error("live stream closed by server")]
    StreamClosed,

    /// The configured base URL cannot carry the feed paths.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The driver task is gone and can no longer take requests.
    #[error("feed driver stopped")]
    DriverStopped,
}
