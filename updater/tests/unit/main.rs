//! Unit tests for the agent updater
//!
//! These tests use recording port doubles and temporary directories and run
//! fast without network access or a service manager.

mod architecture;
mod property_tests;
mod scheduler;
mod update_service;
