//! Application service: keep the messaging channel connected and subscribed.
//!
//! Imports only from `crate::domain`, `crate::application::ports` and the
//! in-process scheduler.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::application::ports::Channel;
use crate::scheduler::{JobControl, JobHandle, Scheduler};

/// Name of the retry job while the channel is unreachable.
pub const RECONNECT_JOB: &str = "reconnect";

/// Connect if needed, then subscribe.
///
/// # Errors
///
/// Returns the connect or subscribe error.
pub async fn establish(channel: &impl Channel) -> Result<()> {
    if !channel.is_connected() {
        channel.connect().await?;
        tracing::info!("connected to messaging service");
    }
    channel.subscribe().await?;
    tracing::info!("subscribed to update subjects");
    Ok(())
}

/// Try once now. On failure, retry every `interval` from a periodic job that
/// removes itself after the first success. A subscribe failure after a
/// successful connect is retried the same way.
///
/// Returns the retry job when one was scheduled.
pub async fn supervise<C: Channel>(
    channel: Arc<C>,
    scheduler: &Scheduler,
    interval: Duration,
) -> Option<JobHandle> {
    match establish(channel.as_ref()).await {
        Ok(()) => None,
        Err(e) => {
            tracing::warn!(
                error = %format!("{e:#}"),
                retry_in_secs = interval.as_secs(),
                "messaging service unavailable"
            );
            Some(scheduler.run_every(RECONNECT_JOB, interval, move || {
                let channel = Arc::clone(&channel);
                async move {
                    match establish(channel.as_ref()).await {
                        Ok(()) => JobControl::Stop,
                        Err(e) => {
                            tracing::warn!(error = %format!("{e:#}"), "reconnect attempt failed");
                            JobControl::Continue
                        }
                    }
                }
            }))
        }
    }
}
