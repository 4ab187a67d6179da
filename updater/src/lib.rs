//! Agent updater library: exposes modules for the binary and for testing.

#![cfg_attr(test, allow(clippy::expect_used))]

pub mod app;
pub mod application;
pub mod cli;
pub mod daemon;
pub mod domain;
pub mod infra;
pub mod logging;
pub mod scheduler;
