// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Split a temporary variable that is assigned more than once.
//!
//! The top-level statements of the function are scanned in order. Every
//! plain `var = ...` statement after the first starts a new generation:
//! the k-th assignment binds `var_k`, its right-hand side still reads the
//! previous generation, and every later use reads the new one. Augmented
//! assignments and assignments nested in blocks are uses, not split points.

use tracing::debug;
use tree_sitter::Node;

use molt_core::error::{MoltError, MoltResult};
use molt_core::target::TargetSpec;

use crate::analysis::flow::VariableFlowAnalyzer;
use crate::cst::{body_statements, PythonModule};
use crate::refactorings::{parse, required_param, variable_occurrences, Params, Refactoring};
use crate::transform::{transform, NodeReplacements};

#[derive(Debug)]
pub struct SplitTemporaryVariable {
    target: TargetSpec,
}

impl SplitTemporaryVariable {
    pub fn from_params(params: &Params) -> MoltResult<Self> {
        let target = TargetSpec::parse(required_param(params, "target")?)?;
        if !(2..=3).contains(&target.qualifiers().len()) || target.line_range().is_some() {
            return Err(MoltError::format(format!(
                "split-temporary-variable target '{}' must be 'function::var' or 'Class::method::var'",
                target
            )));
        }
        Ok(SplitTemporaryVariable { target })
    }
}

/// The target identifier of `var = value` when `statement` is exactly that.
fn split_point<'m>(module: &PythonModule, statement: Node<'m>, var: &str) -> Option<Node<'m>> {
    if statement.kind() != "expression_statement" || statement.named_child_count() != 1 {
        return None;
    }
    let assignment = statement.named_child(0)?;
    if assignment.kind() != "assignment" {
        return None;
    }
    let left = assignment.child_by_field_name("left")?;
    (left.kind() == "identifier" && module.text_of(left) == var).then_some(left)
}

impl Refactoring for SplitTemporaryVariable {
    fn name(&self) -> &'static str {
        "split-temporary-variable"
    }

    fn apply(&self, source: &str) -> MoltResult<String> {
        let module = parse(source)?;
        let qualifiers = self.target.qualifiers();
        let var = self.target.leaf();
        let class_name = qualifiers
            .first()
            .filter(|_| qualifiers.len() == 3)
            .map(String::as_str);
        let function_name = qualifiers[qualifiers.len() - 2].as_str();
        let function = module.require_function(class_name, function_name)?;

        let statements = body_statements(function);
        let split_points: Vec<Node<'_>> = statements
            .iter()
            .filter_map(|s| split_point(&module, *s, var))
            .collect();
        if split_points.is_empty() {
            let used = statements
                .iter()
                .any(|s| !variable_occurrences(&module, *s, var).is_empty());
            return Err(if used {
                MoltError::invalid_args(format!("'{}' is assigned only once", var))
            } else {
                MoltError::not_found("variable", var)
            });
        }
        if split_points.len() < 2 {
            return Err(MoltError::invalid_args(format!(
                "'{}' is assigned only once in '{}'",
                var, function_name
            )));
        }

        let flow = VariableFlowAnalyzer::for_function(&module, function);
        let mut taken = module.parameter_names(function);
        taken.extend(flow.accesses().iter().map(|a| a.name.clone()));
        for generation in 2..=split_points.len() {
            let name = format!("{}_{}", var, generation);
            if taken.contains(&name) {
                return Err(MoltError::conflict(name, format!("function '{}'", function_name)));
            }
        }

        let mut replacements = NodeReplacements::new();
        let mut generation = 1;
        let mut current = var.to_string();
        for statement in &statements {
            let target = split_point(&module, *statement, var);
            let starts_generation = target.is_some_and(|t| {
                split_points.first().is_some_and(|first| first.id() != t.id())
            });
            for node in variable_occurrences(&module, *statement, var) {
                if starts_generation && target.is_some_and(|t| t.id() == node.id()) {
                    continue;
                }
                if generation > 1 {
                    replacements.insert(node, current.as_str());
                }
            }
            if let (true, Some(target)) = (starts_generation, target) {
                generation += 1;
                current = format!("{}_{}", var, generation);
                replacements.insert(target, current.as_str());
            }
        }
        debug!(
            target = %self.target,
            generations = generation,
            replacements = replacements.len(),
            "splitting temporary variable"
        );
        transform(&module, &mut replacements)
    }
}
