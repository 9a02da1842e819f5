//! Error types for the `tideline` binary.

/// Top-level error for the binary.
///
/// Each variant wraps a subsystem error so `run` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The feed driver could not be built or has stopped.
    #[error("feed error: {source}")]
    Feed {
        /// The underlying client error.
        #[from]
        source: tideline_client::ClientError,
    },

    /// The rendering API server failed to start.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying startup error.
        #[from]
        source: tideline_observer::StartupError,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
