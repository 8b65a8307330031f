//! Read-only analyses over one function or method.
//!
//! - [`flow`]: ordered read/write log and range queries
//! - [`cross_scope`]: free variables of a line range
//! - [`instance`]: `self` attribute usage and method classification

pub mod cross_scope;
pub mod flow;
pub mod instance;

pub use cross_scope::CrossScopeAnalyzer;
pub use flow::{VariableAccess, VariableFlowAnalyzer};
pub use instance::InstanceVariableTracker;
