//! Command-line interface module.
//!
//! This module provides the CLI functionality for:
//! - Server startup
//! - Logging setup

pub mod commands;
pub mod handlers;

pub use handlers::{init_logging, run_server};
