// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Module-level name collision checks.

use tracing::debug;

use molt_core::error::{MoltError, MoltResult};

use crate::cst::{unwrap_definition, PythonModule};

const MODULE_SCOPE: &str = "module";

/// Answers "is this name already declared at module level?".
///
/// Only top-level declarations count. A method or a local variable with the
/// same name never conflicts.
#[derive(Debug, Clone, Default)]
pub struct NameConflictValidator {
    classes: Vec<String>,
    functions: Vec<String>,
    assignments: Vec<String>,
}

impl NameConflictValidator {
    /// Parse `source` once and index its top-level declarations.
    pub fn new(source: &str) -> MoltResult<Self> {
        let module = PythonModule::parse(source)?;
        Ok(Self::from_module(&module))
    }

    /// Index an already parsed module.
    pub fn from_module(module: &PythonModule) -> Self {
        let mut validator = NameConflictValidator::default();
        for statement in module.statements() {
            if let Some(definition) = unwrap_definition(statement) {
                let Some(name) = module.name_of(definition) else {
                    continue;
                };
                match definition.kind() {
                    "class_definition" => validator.classes.push(name.to_string()),
                    _ => validator.functions.push(name.to_string()),
                }
                continue;
            }
            validator
                .assignments
                .extend(assigned_names(module, statement));
        }
        debug!(
            classes = validator.classes.len(),
            functions = validator.functions.len(),
            assignments = validator.assignments.len(),
            "indexed module-level names"
        );
        validator
    }

    /// Fail if a module-level class named `name` exists.
    pub fn validate_class_name(&self, name: &str) -> MoltResult<()> {
        check(&self.classes, name)
    }

    /// Fail if `name` is already assigned at module level.
    pub fn validate_constant_name(&self, name: &str) -> MoltResult<()> {
        check(&self.assignments, name)
    }

    /// Fail if a module-level function named `name` exists.
    pub fn validate_function_name(&self, name: &str) -> MoltResult<()> {
        check(&self.functions, name)
    }

    /// True if `name` is taken by any top-level class, function or assignment.
    pub fn is_declared(&self, name: &str) -> bool {
        [&self.classes, &self.functions, &self.assignments]
            .iter()
            .any(|names| names.iter().any(|n| n == name))
    }
}

fn check(names: &[String], name: &str) -> MoltResult<()> {
    if names.iter().any(|n| n == name) {
        Err(MoltError::conflict(name, MODULE_SCOPE))
    } else {
        Ok(())
    }
}

/// Plain identifiers bound by a top-level assignment statement
/// (`X = ...`, `X: int = ...`, `A = B = ...`).
fn assigned_names(module: &PythonModule, statement: tree_sitter::Node<'_>) -> Vec<String> {
    let mut names = Vec::new();
    if statement.kind() != "expression_statement" {
        return names;
    }
    let mut current = statement.named_child(0);
    while let Some(node) = current {
        if node.kind() != "assignment" {
            break;
        }
        if let Some(left) = node.child_by_field_name("left") {
            if left.kind() == "identifier" {
                names.push(module.text_of(left).to_string());
            }
        }
        current = node.child_by_field_name("right");
    }
    names
}
