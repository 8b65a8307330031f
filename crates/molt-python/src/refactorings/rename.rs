// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Rename a module-level function, a class or a method within one file.
//!
//! Analysis collects the identifier nodes to change; a
//! [`NodeReplacements`] transform pass then replaces exactly those nodes.
//!
//! - A function or class is renamed at its definition and at every variable
//!   reference in the module that is not shadowed by a parameter.
//! - A method is renamed at its definition and at `self.m`, `cls.m` and
//!   `Class.m` accesses.

use tracing::debug;
use tree_sitter::Node;

use molt_core::error::{MoltError, MoltResult};
use molt_core::target::TargetSpec;

use crate::cst::{walk, PythonModule, VisitResult};
use crate::refactorings::{
    identifier_param, parse, required_param, variable_occurrences, Params, Refactoring,
};
use crate::transform::{transform, NodeReplacements};
use crate::validators::conflict::{ClassConflictChecker, MethodConflictChecker};
use crate::validators::name_conflict::NameConflictValidator;

#[derive(Debug)]
pub struct Rename {
    target: TargetSpec,
    new_name: String,
}

impl Rename {
    pub fn from_params(params: &Params) -> MoltResult<Self> {
        let target = TargetSpec::parse(required_param(params, "target")?)?;
        if target.qualifiers().len() > 2 || target.line_range().is_some() {
            return Err(MoltError::format(format!(
                "rename target '{}' must be 'function', 'Class' or 'Class::method'",
                target
            )));
        }
        Ok(Rename {
            target,
            new_name: identifier_param(params, "new_name")?,
        })
    }

    /// Identifier nodes that spell the renamed symbol.
    fn occurrences<'m>(&self, module: &'m PythonModule) -> MoltResult<Vec<Node<'m>>> {
        let old = self.target.leaf();
        match self.target.container() {
            [] => {
                if module.find_class(old).is_some() {
                    ClassConflictChecker::check(module, &self.new_name)?;
                } else if module.find_function(None, old).is_some() {
                    NameConflictValidator::from_module(module)
                        .validate_function_name(&self.new_name)?;
                } else {
                    return Err(MoltError::not_found("symbol", old));
                }
                Ok(variable_occurrences(module, module.root(), old))
            }
            [class_name] => {
                let method = module.require_function(Some(class_name), old)?;
                MethodConflictChecker::check(module, class_name, &self.new_name)?;
                let mut found: Vec<Node<'m>> =
                    method.child_by_field_name("name").into_iter().collect();
                found.extend(method_accesses(module, class_name, old));
                Ok(found)
            }
            _ => Err(MoltError::format(format!("invalid rename target '{}'", self.target))),
        }
    }
}

/// Member identifiers of `self.m`, `cls.m` and `Class.m`.
fn method_accesses<'m>(module: &'m PythonModule, class_name: &str, method: &str) -> Vec<Node<'m>> {
    let mut found = Vec::new();
    walk(module.root(), &mut |node: Node<'m>| {
        if node.kind() != "attribute" {
            return VisitResult::Continue;
        }
        let (Some(object), Some(member)) = (
            node.child_by_field_name("object"),
            node.child_by_field_name("attribute"),
        ) else {
            return VisitResult::Continue;
        };
        let receiver = module.text_of(object);
        if module.text_of(member) == method
            && (matches!(receiver, "self" | "cls") || receiver == class_name)
        {
            found.push(member);
        }
        VisitResult::Continue
    });
    found
}

impl Refactoring for Rename {
    fn name(&self) -> &'static str {
        "rename"
    }

    fn apply(&self, source: &str) -> MoltResult<String> {
        let module = parse(source)?;
        let occurrences = self.occurrences(&module)?;
        debug!(
            target = %self.target,
            new_name = %self.new_name,
            occurrences = occurrences.len(),
            "renaming"
        );
        let mut replacements = NodeReplacements::new();
        for node in occurrences {
            replacements.insert(node, self.new_name.as_str());
        }
        transform(&module, &mut replacements)
    }
}
