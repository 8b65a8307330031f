// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! The refactoring catalog.
//!
//! Each refactoring is a small struct built from string parameters. It
//! resolves its target in one parsed module and returns the rewritten
//! source from [`Refactoring::apply`], which never touches the filesystem.
//! Refactorings that also change other files (call sites of a hidden
//! delegate, for example) do that work in [`Refactoring::follow_up`], which
//! the caller runs after the primary file has been written.
//!
//! See [`crate::registry`] for the name to constructor table.

pub mod consolidate_conditional;
pub mod extract_function;
pub mod extract_method;
mod extraction;
pub mod hide_delegate;
pub mod magic_number;
pub mod method_object;
pub mod pull_up_method;
pub mod rename;
pub mod split_temporary;

use std::collections::BTreeMap;
use std::fmt;

use tree_sitter::Node;

use molt_core::error::{MoltError, MoltResult};

use crate::cst::{is_scope_boundary, walk, PythonModule, VisitResult};
use crate::references::{CallSiteUpdater, UpdateSummary};
use crate::validation::validate_python_identifier;

pub use consolidate_conditional::ConsolidateConditionalExpression;
pub use extract_function::ExtractFunction;
pub use extract_method::ExtractMethod;
pub use hide_delegate::HideDelegate;
pub use magic_number::ReplaceMagicNumber;
pub use method_object::ReplaceMethodWithMethodObject;
pub use pull_up_method::PullUpMethod;
pub use rename::Rename;
pub use split_temporary::SplitTemporaryVariable;

/// Named string parameters of one invocation (`--param key=value`).
pub type Params = BTreeMap<String, String>;

// ============================================================================
// Refactoring Trait
// ============================================================================

/// One configured refactoring.
pub trait Refactoring: fmt::Debug {
    /// Catalog name, e.g. `extract-method`.
    fn name(&self) -> &'static str;

    /// Rewrite `source`. Pure: the result is returned, nothing is written.
    fn apply(&self, source: &str) -> MoltResult<String>;

    /// True if [`apply`](Self::apply) would succeed on `source`.
    fn validate(&self, source: &str) -> bool {
        self.apply(source).is_ok()
    }

    /// Cross-file updates to run after the primary file was written.
    fn follow_up(&self, _updater: &CallSiteUpdater) -> MoltResult<Option<UpdateSummary>> {
        Ok(None)
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// The value of a required parameter, or a format error naming it.
pub fn required_param<'p>(params: &'p Params, key: &str) -> MoltResult<&'p str> {
    params
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| MoltError::format(format!("missing required parameter '{}'", key)))
}

pub fn optional_param<'p>(params: &'p Params, key: &str) -> Option<&'p str> {
    params.get(key).map(String::as_str)
}

/// A parameter that must be a valid Python identifier.
pub(crate) fn identifier_param(params: &Params, key: &str) -> MoltResult<String> {
    let name = required_param(params, key)?;
    validate_python_identifier(name)?;
    Ok(name.to_string())
}

pub(crate) fn parse(source: &str) -> MoltResult<PythonModule> {
    Ok(PythonModule::parse(source)?)
}

// ============================================================================
// Shared Helpers
// ============================================================================

/// Identifiers under `root` that refer to the variable `name`.
///
/// Attribute members (`x.name`) and keyword-argument names (`f(name=1)`)
/// are not variable references. Nested functions and lambdas that bind
/// `name` as a parameter are skipped.
pub(crate) fn variable_occurrences<'m>(
    module: &'m PythonModule,
    root: Node<'m>,
    name: &str,
) -> Vec<Node<'m>> {
    let mut found = Vec::new();
    walk(root, &mut |node: Node<'m>| {
        if node.id() != root.id()
            && is_scope_boundary(node)
            && module.parameter_names(node).iter().any(|p| p == name)
        {
            return VisitResult::SkipChildren;
        }
        if node.kind() == "identifier"
            && module.text_of(node) == name
            && !is_member_name(node)
        {
            found.push(node);
        }
        VisitResult::Continue
    });
    found
}

/// True for the `attr` of `obj.attr` and the name of `name=value` arguments.
fn is_member_name(identifier: Node<'_>) -> bool {
    let Some(parent) = identifier.parent() else {
        return false;
    };
    let field = match parent.kind() {
        "attribute" => "attribute",
        "keyword_argument" => "name",
        _ => return false,
    };
    parent
        .child_by_field_name(field)
        .is_some_and(|slot| slot.id() == identifier.id())
}
