//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, service
//! managers, filesystem access, downloads, status persistence, the messaging
//! connection, and configuration loading.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.

pub mod clock;
pub mod command_runner;
pub mod config;
pub mod fetcher;
pub mod fs;
pub mod nats;
#[cfg(windows)]
pub mod registry_store;
pub mod service_host;
pub mod status_store;
