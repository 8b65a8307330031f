//! Python refactoring catalog for molt.
//!
//! Parses Python with tree-sitter and rewrites it through span edits, so
//! everything outside an edited span (comments, blank lines, quoting) is
//! preserved byte for byte.
//!
//! ## Modules
//!
//! - `cst` - parsed module wrapper, navigation and traversal
//! - `transform` - transformer protocol and statement layout helpers
//! - `analysis` - variable flow, instance state and scope queries
//! - `validators` - conflict checks, decorator and property handling
//! - `pattern` - conditional ladder extraction and scanning
//! - `references` - cross-file reference search and call-site rewriting
//! - `refactorings` - the nine refactorings
//! - `registry` - name to constructor table
//! - `files` - file discovery and write-back
//! - `validation` - identifier validation and naming helpers

pub mod analysis;
pub mod cst;
pub mod files;
pub mod pattern;
pub mod references;
pub mod refactorings;
pub mod registry;
pub mod transform;
pub mod validation;
pub mod validators;

pub use refactorings::{Params, Refactoring};
pub use registry::{RefactoringDescriptor, Registry};
