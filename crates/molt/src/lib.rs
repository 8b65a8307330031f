//! molt - format-preserving Python refactoring.
//!
//! This crate provides the `molt` binary and the command implementations it
//! dispatches to.
//!
//! ## Modules
//!
//! - `cli` - command implementations and their reports

pub mod cli;

// Re-export core types for convenience
pub use molt_core::error::{MoltError, MoltResult, OutputErrorCode};
pub use molt_python::{Params, Refactoring, Registry};
