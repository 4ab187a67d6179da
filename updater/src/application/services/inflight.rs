//! Application service: admission of held messages.
//!
//! A message is held from admission until its job settles it. While held:
//! - a redelivery of the same stream sequence is ignored (the held copy
//!   settles it);
//! - a different message carrying the same version and digest is a
//!   duplicate and is acked and terminated;
//! - anything else is admitted and queued behind the artifact's lane.
//!
//! Once closed, lanes stop handing out turns. [`InFlight::close`] waits for
//! the operations already holding a lane, since a swap past its backup step
//! must not be interrupted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::layout::ArtifactKind;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Held {
    ticket: u64,
    kind: ArtifactKind,
    sequence: Option<u64>,
    version: String,
    sha256: String,
}

#[derive(Default)]
struct State {
    next_ticket: u64,
    held: Vec<Held>,
}

/// Held messages and per-artifact serialization lanes.
#[derive(Default)]
pub struct InFlight {
    state: Mutex<State>,
    lanes: Mutex<HashMap<ArtifactKind, Arc<AsyncMutex<()>>>>,
    closed: AtomicBool,
}

/// Exclusive turn on an artifact's lane.
pub type LaneTurn = OwnedMutexGuard<()>;

/// Result of [`InFlight::admit`].
pub enum Admission {
    Accepted(AdmissionGuard),
    /// Same stream sequence is already held.
    Redelivery,
    /// Same version and digest is already held under another sequence.
    Duplicate,
}

/// Releases the held entry when dropped.
pub struct AdmissionGuard {
    registry: Arc<InFlight>,
    ticket: u64,
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        self.registry.state().held.retain(|h| h.ticket != self.ticket);
    }
}

impl InFlight {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn admit(
        self: &Arc<Self>,
        kind: ArtifactKind,
        sequence: Option<u64>,
        version: &str,
        sha256: &str,
    ) -> Admission {
        let mut state = self.state();
        for held in state.held.iter().filter(|h| h.kind == kind) {
            if sequence.is_some() && held.sequence == sequence {
                return Admission::Redelivery;
            }
            if held.version == version && held.sha256 == sha256 {
                return Admission::Duplicate;
            }
        }
        state.next_ticket += 1;
        let ticket = state.next_ticket;
        state.held.push(Held {
            ticket,
            kind,
            sequence,
            version: version.to_string(),
            sha256: sha256.to_string(),
        });
        Admission::Accepted(AdmissionGuard {
            registry: Arc::clone(self),
            ticket,
        })
    }

    /// Whether a message with this sequence is held.
    #[must_use]
    pub fn holds_sequence(&self, sequence: u64) -> bool {
        self.state().held.iter().any(|h| h.sequence == Some(sequence))
    }

    /// Number of held messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state().held.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lock serializing every operation on `kind`.
    #[must_use]
    pub fn lane(&self, kind: ArtifactKind) -> Arc<AsyncMutex<()>> {
        let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(lanes.entry(kind).or_default())
    }

    /// Wait for a turn on `kind`'s lane. `None` once closed.
    pub async fn enter(&self, kind: ArtifactKind) -> Option<LaneTurn> {
        if self.is_closed() {
            return None;
        }
        let turn = self.lane(kind).lock_owned().await;
        (!self.is_closed()).then_some(turn)
    }

    /// A turn on `kind`'s lane if it is free right now and not closed.
    #[must_use]
    pub fn try_enter(&self, kind: ArtifactKind) -> Option<LaneTurn> {
        if self.is_closed() {
            return None;
        }
        self.lane(kind).try_lock_owned().ok()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop handing out turns, then wait until no lane is held.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        for kind in ArtifactKind::ALL {
            let lane = self.lane(kind);
            drop(lane.lock().await);
        }
    }
}
