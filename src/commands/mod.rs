//! Console command handlers
//!
//! This module contains the line commands a user types to drive a capture
//! controller.

pub mod console;

pub use console::{execute, log_events, run_console, ConsoleCommand, StatusReport};
