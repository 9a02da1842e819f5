//! Observer startup helper for embedding in the `tideline` binary.
//!
//! [`spawn_observer`] binds the listener eagerly, so a taken port is
//! reported to the caller, then serves on a background task.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::server::{ServerConfig, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the observer server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Bind `config`'s address and serve on a background task.
///
/// The caller should hold the returned handle and abort it on shutdown.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the address is invalid or cannot
/// be bound.
pub async fn spawn_observer(
    config: &ServerConfig,
    state: Arc<AppState>,
) -> Result<JoinHandle<()>, StartupError> {
    let listener = crate::server::bind(config).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("listener has no address: {e}")))?;

    let handle = tokio::spawn(async move {
        if let Err(e) = crate::server::serve(listener, state).await {
            tracing::error!(error = %e, "observer server exited with error");
        }
    });

    tracing::info!(%addr, "observer server spawned on background task");
    Ok(handle)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_host_is_reported_before_spawning() {
        let config = ServerConfig {
            host: String::from("not an address"),
            port: 0,
        };
        let result = spawn_observer(&config, Arc::new(AppState::new())).await;
        assert!(matches!(result, Err(StartupError::Server(ServerError::Bind(_)))));
    }

    #[tokio::test]
    async fn binds_an_ephemeral_port() {
        let config = ServerConfig {
            host: String::from("127.0.0.1"),
            port: 0,
        };
        let handle = spawn_observer(&config, Arc::new(AppState::new())).await.unwrap();
        handle.abort();
    }
}
