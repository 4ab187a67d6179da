//! Application service: settling durable messages.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::{Context, Result};

use crate::application::ports::DurableMessage;
use crate::domain::disposition::Disposition;

/// Apply `disposition` to `msg`.
///
/// # Errors
///
/// Returns the first acknowledgement call that failed.
pub async fn settle(msg: &impl DurableMessage, disposition: Disposition) -> Result<()> {
    tracing::debug!(subject = msg.subject(), seq = ?msg.sequence(), ?disposition, "settling message");
    match disposition {
        Disposition::Ack => msg.ack().await.context("ack"),
        Disposition::AckAndTerm => {
            msg.ack().await.context("ack")?;
            msg.term().await.context("term")
        }
        Disposition::Nak(delay) => msg
            .nak_with_delay(delay)
            .await
            .with_context(|| format!("nak with {}s delay", delay.as_secs())),
    }
}

/// [`settle`], logging instead of returning failures.
pub async fn settle_logged(msg: &impl DurableMessage, disposition: Disposition) {
    if let Err(e) = settle(msg, disposition).await {
        tracing::error!(
            subject = msg.subject(),
            error = %format!("{e:#}"),
            "could not settle message"
        );
    }
}
