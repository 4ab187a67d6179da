//! Application services: use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain`,
//! `crate::application::ports` and the in-process scheduler, never from
//! `crate::infra`.

pub mod companion;
pub mod connection;
pub mod inflight;
pub mod messaging;
pub mod restart;
pub mod rollback;
pub mod status;
pub mod swap;
pub mod update;
pub mod watchdog;
