//! Domain layer: pure decisions, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::application`,
//! `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod command;
pub mod config;
pub mod disposition;
pub mod error;
pub mod layout;
pub mod routing;
pub mod status;
pub mod watchdog;

pub use command::{Schedule, UpdateCommand, decode_update_command};
pub use config::{StatusBackend, UpdaterConfig};
pub use disposition::Disposition;
pub use error::{CommandError, ConfigError, StatusError, SwapError};
pub use layout::{ArtifactKind, ArtifactLayout};
pub use routing::Route;
pub use status::{ExecutionStatus, Outcome};
pub use watchdog::WatchdogAction;
