// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Exact-container collision checks for methods, fields and classes.
//!
//! Each checker looks at one container only: the named module-level class
//! (or the module itself for classes). Nested classes and unrelated classes
//! that happen to declare the same member never count as conflicts.

use tree_sitter::Node;

use molt_core::error::{MoltError, MoltResult};

use crate::analysis::instance::self_attribute;
use crate::cst::{body_statements, class_methods, is_scope_boundary, walk, PythonModule, VisitResult};

fn class_scope(class_name: &str) -> String {
    format!("class '{}'", class_name)
}

/// Does class `C` already define method `m`?
pub struct MethodConflictChecker;

impl MethodConflictChecker {
    /// True if `method_name` is defined directly in `class_name`.
    ///
    /// Fails with `NotFound` if the class does not exist.
    pub fn exists(module: &PythonModule, class_name: &str, method_name: &str) -> MoltResult<bool> {
        let class = module.require_class(class_name)?;
        Ok(class_methods(class)
            .into_iter()
            .any(|m| module.name_of(m) == Some(method_name)))
    }

    /// Fail with a conflict if `method_name` is already defined in `class_name`.
    pub fn check(module: &PythonModule, class_name: &str, method_name: &str) -> MoltResult<()> {
        if Self::exists(module, class_name, method_name)? {
            return Err(MoltError::conflict(method_name, class_scope(class_name)));
        }
        Ok(())
    }
}

/// Does class `C` already have field `f`?
pub struct FieldConflictChecker;

impl FieldConflictChecker {
    /// True if `field_name` is assigned in the class body or as
    /// `self.<field_name>` inside one of the class's own methods.
    pub fn exists(module: &PythonModule, class_name: &str, field_name: &str) -> MoltResult<bool> {
        let class = module.require_class(class_name)?;
        let in_body = body_statements(class)
            .into_iter()
            .any(|stmt| class_body_assigns(module, stmt, field_name));
        if in_body {
            return Ok(true);
        }
        Ok(class_methods(class)
            .into_iter()
            .any(|method| method_assigns_self_field(module, method, field_name)))
    }

    /// Fail with a conflict if the class already has `field_name`.
    pub fn check(module: &PythonModule, class_name: &str, field_name: &str) -> MoltResult<()> {
        if Self::exists(module, class_name, field_name)? {
            return Err(MoltError::conflict(field_name, class_scope(class_name)));
        }
        Ok(())
    }
}

/// Does the module already define class `C`?
pub struct ClassConflictChecker;

impl ClassConflictChecker {
    pub fn exists(module: &PythonModule, class_name: &str) -> bool {
        module.find_class(class_name).is_some()
    }

    /// Fail with a conflict if a module-level class `class_name` exists.
    pub fn check(module: &PythonModule, class_name: &str) -> MoltResult<()> {
        if Self::exists(module, class_name) {
            return Err(MoltError::conflict(class_name, "module"));
        }
        Ok(())
    }
}

fn class_body_assigns(module: &PythonModule, statement: Node<'_>, field_name: &str) -> bool {
    if statement.kind() != "expression_statement" {
        return false;
    }
    let mut current = statement.named_child(0);
    while let Some(node) = current {
        if node.kind() != "assignment" {
            return false;
        }
        let hit = node
            .child_by_field_name("left")
            .is_some_and(|left| left.kind() == "identifier" && module.text_of(left) == field_name);
        if hit {
            return true;
        }
        current = node.child_by_field_name("right");
    }
    false
}

fn method_assigns_self_field(module: &PythonModule, method: Node<'_>, field_name: &str) -> bool {
    let Some(body) = method.child_by_field_name("body") else {
        return false;
    };
    let mut found = false;
    walk(body, &mut |node: Node<'_>| {
        if is_scope_boundary(node) {
            return VisitResult::SkipChildren;
        }
        let target = match node.kind() {
            "assignment" | "augmented_assignment" => node.child_by_field_name("left"),
            _ => None,
        };
        if target.is_some_and(|t| self_attribute(module, t) == Some(field_name)) {
            found = true;
            return VisitResult::Stop;
        }
        VisitResult::Continue
    });
    found
}
