//! Application layer: port trait definitions and use-case orchestration.
//!
//! This module depends only on `crate::domain` and the scheduler, never on
//! `crate::infra`.

pub mod ports;
pub mod services;

pub use ports::{
    ArtifactFetcher, Channel, Clock, CommandRunner, Delivery, DurableMessage, LocalFs,
    RestartRequest, ServiceHost, StatusStore,
};
