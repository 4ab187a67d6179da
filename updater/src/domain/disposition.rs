//! Terminal outcome of a durable message.

use std::time::Duration;

/// How a durable message is settled. Every handled message reaches exactly
/// one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Done; never redeliver.
    Ack,
    /// Acknowledge, then terminate so no copy is redelivered either.
    AckAndTerm,
    /// Redeliver after the delay.
    Nak(Duration),
}

