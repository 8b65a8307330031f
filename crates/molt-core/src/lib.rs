//! Core infrastructure for molt.
//!
//! This crate provides language-agnostic infrastructure:
//! - Error taxonomy and process exit codes
//! - Byte spans and text position utilities
//! - Batch span editor (format-preserving edit layer)
//! - Target specification parser
//! - Unified diff generation for dry runs

pub mod diff;
pub mod edit;
pub mod error;
pub mod patch;
pub mod target;
pub mod text;
