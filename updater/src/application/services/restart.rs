//! Application service: forced restarts.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::{Context, Result};

use crate::application::ports::{RestartRequest, ServiceHost};

/// Stop then start `service`.
///
/// # Errors
///
/// Returns an error if either step fails.
pub async fn restart_service(host: &impl ServiceHost, service: &str) -> Result<()> {
    host.stop(service)
        .await
        .with_context(|| format!("stopping {service}"))?;
    host.start(service)
        .await
        .with_context(|| format!("starting {service}"))
}

/// Restart and reply. The requester only hears back on success; a failure
/// is logged and the request is left to time out.
pub async fn handle_restart<R: RestartRequest>(host: &impl ServiceHost, service: &str, request: R) {
    match restart_service(host, service).await {
        Ok(()) => {
            tracing::info!(service, "service restarted on request");
            if let Err(e) = request.respond().await {
                tracing::error!(error = %format!("{e:#}"), "could not reply to restart request");
            }
        }
        Err(e) => tracing::error!(service, error = %format!("{e:#}"), "forced restart failed"),
    }
}
