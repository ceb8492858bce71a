//! Shared utilities for stock-research-rs
//!
//! This crate provides the logging bootstrap and the process-level settings
//! read from the environment.

pub mod config;
pub mod logging;

pub use config::{AppSettings, SettingsError};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
