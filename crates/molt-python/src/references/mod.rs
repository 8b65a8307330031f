// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Cross-file reference engine.
//!
//! - [`search`]: literal text search backends producing [`TextMatch`]es
//! - [`pattern`]: usage patterns and structural validators
//! - [`call_site`]: validated [`Reference`]s and per-file rewriting

pub mod call_site;
pub mod pattern;
pub mod search;

pub use call_site::{CallSiteUpdater, Reference, RewriteSite, UpdateSummary};
pub use pattern::{validator_for, UsagePattern, UsageValidator};
pub use search::{SearchBackend, SearchError, TextMatch};
