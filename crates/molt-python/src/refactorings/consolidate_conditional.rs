// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Consolidate a ladder of conditionals that return the same value.
//!
//! ```python
//! if employee.seniority < 2:
//!     return 0
//! if employee.is_part_time:
//!     return 0
//! ```
//!
//! becomes `if employee.seniority < 2 or employee.is_part_time: return 0`.
//! With a `name`, the combined condition moves into a predicate
//! (`def is_not_eligible(employee): return ...`) and the ladder becomes
//! `if is_not_eligible(employee): return 0`.
//!
//! Functions in the same container whose leading ladder has the same
//! normalized signature are consolidated the same way.

use std::collections::BTreeSet;

use tracing::debug;
use tree_sitter::Node;

use molt_core::edit::EditPrimitive;
use molt_core::error::{MoltError, MoltResult};
use molt_core::patch::Span;
use molt_core::target::TargetSpec;
use molt_core::text::line_end_inclusive;

use crate::cst::{body_statements, definition_statement, top_level_statement, PythonModule};
use crate::pattern::{normalize_condition, Branch, ExtractedPattern, PatternExtractor, PatternScanner};
use crate::refactorings::{optional_param, parse, required_param, Params, Refactoring};
use crate::transform::{body_indent, insert_before_statement, line_indent, statement_lines, Rewrite};
use crate::validation::validate_python_identifier;
use crate::validators::conflict::MethodConflictChecker;
use crate::validators::name_conflict::NameConflictValidator;

#[derive(Debug)]
pub struct ConsolidateConditionalExpression {
    target: TargetSpec,
    name: Option<String>,
}

impl ConsolidateConditionalExpression {
    pub fn from_params(params: &Params) -> MoltResult<Self> {
        let target = TargetSpec::parse(required_param(params, "target")?)?;
        if target.qualifiers().len() > 2 {
            return Err(MoltError::format(format!(
                "consolidate-conditional-expression target '{}' must be 'function#L..' or 'Class::method#L..'",
                target
            )));
        }
        target.require_line_range()?;
        let name = match optional_param(params, "name") {
            Some(name) => {
                validate_python_identifier(name)?;
                Some(name.to_string())
            }
            None => None,
        };
        Ok(ConsolidateConditionalExpression { target, name })
    }
}

/// Leading branches that return the same text.
fn leading_run<'m>(module: &PythonModule, pattern: &ExtractedPattern<'m>) -> Vec<Branch<'m>> {
    let Some(first) = pattern.branches.first() else {
        return Vec::new();
    };
    let value = module.text_of(first.return_value);
    pattern
        .branches
        .iter()
        .take_while(|b| module.text_of(b.return_value) == value)
        .copied()
        .collect()
}

/// The `if` statement a branch belongs to.
fn owner<'m>(branch: &Branch<'m>) -> Option<Node<'m>> {
    if branch.clause.kind() == "if_statement" {
        Some(branch.clause)
    } else {
        branch.clause.parent()
    }
}

fn alternatives(statement: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = statement.walk();
    statement
        .children_by_field_name("alternative", &mut cursor)
        .collect()
}

fn has_else(statement: Node<'_>) -> bool {
    alternatives(statement)
        .iter()
        .any(|alternative| alternative.kind() == "else_clause")
}

fn clause_count(statement: Node<'_>) -> usize {
    1 + alternatives(statement)
        .iter()
        .filter(|alternative| alternative.kind() == "elif_clause")
        .count()
}

/// Byte span from the first branch's `if` line to the end of the last
/// branch's `return` line.
///
/// The branches must come from consecutive `if` statements of `function`;
/// every statement but the last must be fully covered and have no `else`,
/// and each statement's branches must start at its `if`.
fn ladder_span(
    module: &PythonModule,
    function: Node<'_>,
    run: &[Branch<'_>],
) -> MoltResult<Span> {
    let reject = || MoltError::invalid_args("conditional branches are not a mergeable ladder");
    let mut owners: Vec<(Node<'_>, usize)> = Vec::new();
    for branch in run {
        let statement = owner(branch).ok_or_else(reject)?;
        let same_statement = owners
            .last()
            .is_some_and(|(last, _)| last.id() == statement.id());
        if same_statement {
            if let Some((_, count)) = owners.last_mut() {
                *count += 1;
            }
        } else if branch.clause.kind() == "if_statement" {
            owners.push((statement, 1));
        } else {
            return Err(reject());
        }
    }
    let statements = body_statements(function);
    let position = |node: Node<'_>| statements.iter().position(|s| s.id() == node.id());
    for (index, (statement, count)) in owners.iter().enumerate() {
        if index + 1 < owners.len() && (has_else(*statement) || *count != clause_count(*statement)) {
            return Err(reject());
        }
        if index > 0 {
            let previous = position(owners[index - 1].0).ok_or_else(reject)?;
            if position(*statement) != Some(previous + 1) {
                return Err(reject());
            }
        }
    }
    let (Some((first, _)), Some(last)) = (owners.first(), run.last()) else {
        return Err(reject());
    };
    Ok(Span::new(
        statement_lines(module, *first).start,
        line_end_inclusive(module.source(), last.return_value.end_byte()),
    ))
}

/// Wrap a condition in parentheses where `or` would bind tighter.
fn operand(module: &PythonModule, condition: Node<'_>) -> String {
    let text = module.text_of(condition);
    match condition.kind() {
        "conditional_expression" | "lambda" | "named_expression" => format!("({})", text),
        _ => text.to_string(),
    }
}

fn combined(module: &PythonModule, run: &[Branch<'_>]) -> String {
    run.iter()
        .map(|b| operand(module, b.condition))
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Parameter positions the conditions refer to, ascending.
fn referenced_positions(
    module: &PythonModule,
    pattern: &ExtractedPattern<'_>,
    run: &[Branch<'_>],
) -> Vec<usize> {
    let mut positions = BTreeSet::new();
    for branch in run {
        let normalized = normalize_condition(module.text_of(branch.condition), &pattern.param_map);
        for (index, _) in normalized.match_indices('$') {
            let digits: String = normalized[index + 1..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if let Ok(position) = digits.parse::<usize>() {
                positions.insert(position);
            }
        }
    }
    positions.into_iter().collect()
}

/// The predicate a ladder is rewritten to call.
struct Predicate<'a> {
    name: &'a str,
    /// Parameter positions passed to the predicate.
    positions: Vec<usize>,
    /// The predicate is a method called through the receiver.
    method: bool,
}

impl Predicate<'_> {
    fn call(&self, module: &PythonModule, function: Node<'_>) -> String {
        let params = module.parameter_names(function);
        let args: Vec<&str> = self
            .positions
            .iter()
            .filter(|p| !(self.method && **p == 0))
            .filter_map(|p| params.get(*p).map(String::as_str))
            .collect();
        match (self.method, params.first()) {
            (true, Some(receiver)) => format!("{}.{}({})", receiver, self.name, args.join(", ")),
            _ => format!("{}({})", self.name, args.join(", ")),
        }
    }
}

/// Edit that replaces one ladder with a single `if`.
fn consolidation(
    module: &PythonModule,
    pattern: &ExtractedPattern<'_>,
    run: &[Branch<'_>],
    predicate: Option<&Predicate<'_>>,
) -> MoltResult<EditPrimitive> {
    let span = ladder_span(module, pattern.function, run)?;
    let (Some(first), Some(last)) = (run.first(), run.last()) else {
        return Err(MoltError::internal("empty ladder"));
    };
    let condition = match predicate {
        Some(predicate) => predicate.call(module, pattern.function),
        None => combined(module, run),
    };
    let if_indent = line_indent(module, first.clause);
    let return_indent = line_indent(module, last.return_value);
    Ok(EditPrimitive::Replace {
        span,
        new_text: format!(
            "{}if {}:\n{}return {}\n",
            if_indent,
            condition,
            return_indent,
            module.text_of(first.return_value)
        ),
    })
}

impl Refactoring for ConsolidateConditionalExpression {
    fn name(&self) -> &'static str {
        "consolidate-conditional-expression"
    }

    fn apply(&self, source: &str) -> MoltResult<String> {
        let module = parse(source)?;
        let class_name = self.target.container().first().map(String::as_str);
        let function_name = self.target.leaf();
        let (lo, hi) = self.target.require_line_range()?;
        let pattern = PatternExtractor::extract(&module, class_name, function_name, lo, hi)?
            .ok_or_else(|| {
                MoltError::invalid_args(format!("no conditional ladder in '{}'", self.target))
            })?;
        let run = leading_run(&module, &pattern);
        if run.len() < 2 {
            return Err(MoltError::invalid_args(format!(
                "'{}' needs at least two branches returning the same value",
                self.target
            )));
        }

        let mut rewrite = Rewrite::new(&module);
        let predicate = match &self.name {
            Some(name) => {
                let method = class_name.is_some();
                match class_name {
                    Some(class_name) => MethodConflictChecker::check(&module, class_name, name)?,
                    None => NameConflictValidator::from_module(&module).validate_function_name(name)?,
                }
                let mut positions = referenced_positions(&module, &pattern, &run);
                if method && positions.first() != Some(&0) {
                    positions.insert(0, 0);
                }
                let predicate = Predicate {
                    name: name.as_str(),
                    positions,
                    method,
                };
                let params = module.parameter_names(pattern.function);
                let predicate_params: Vec<&str> = predicate
                    .positions
                    .iter()
                    .filter_map(|p| params.get(*p).map(String::as_str))
                    .collect();
                let statement = definition_statement(pattern.function);
                let def_indent = line_indent(&module, statement);
                let inner = body_indent(&module, pattern.function);
                let definition = format!(
                    "{d}def {}({}):\n{i}return {}\n",
                    name,
                    predicate_params.join(", "),
                    combined(&module, &run),
                    d = def_indent,
                    i = inner
                );
                if method {
                    let end = statement_lines(&module, statement).end;
                    let separator = if source[..end].ends_with('\n') { "\n" } else { "\n\n" };
                    rewrite.push(EditPrimitive::InsertAt {
                        position: end,
                        text: format!("{}{}", separator, definition),
                    });
                } else {
                    rewrite.push(insert_before_statement(
                        &module,
                        top_level_statement(pattern.function),
                        &format!("{}\n\n", definition),
                    ));
                }
                Some(predicate)
            }
            None => None,
        };
        rewrite.push(consolidation(&module, &pattern, &run, predicate.as_ref())?);

        // Duplicated ladders in the same container.
        let mut duplicates = Vec::new();
        for found in PatternScanner::scan(&module, &pattern.signature, Some((class_name, function_name))) {
            if found.class_name.as_deref() != class_name {
                continue;
            }
            let Some(other) = PatternExtractor::extract(
                &module,
                class_name,
                &found.function_name,
                found.start_line,
                found.end_line,
            )?
            else {
                continue;
            };
            let other_run = leading_run(&module, &other);
            if other_run.len() != other.branches.len() {
                continue;
            }
            if let Ok(edit) = consolidation(&module, &other, &other_run, predicate.as_ref()) {
                rewrite.push(edit);
                duplicates.push(found.function_name);
            }
        }
        debug!(
            target = %self.target,
            branches = run.len(),
            predicate = ?self.name,
            ?duplicates,
            "consolidating conditional"
        );
        rewrite.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consolidate(target: &str, name: Option<&str>) -> ConsolidateConditionalExpression {
        let mut params = Params::new();
        params.insert("target".into(), target.into());
        if let Some(name) = name {
            params.insert("name".into(), name.into());
        }
        ConsolidateConditionalExpression::from_params(&params).unwrap()
    }

    const AMOUNTS: &str = "\
def disability_amount(employee):
    if employee.seniority < 2:
        return 0
    if employee.months_disabled > 12:
        return 0
    if employee.is_part_time:
        return 0
    # calculate disability amount
    return 100


def vacation_days(worker):
    if worker.seniority < 2:
        return 0
    if worker.months_disabled > 12:
        return 0
    if worker.is_part_time:
        return 0
    return worker.seniority * 2
";

    mod merging {
        use super::*;

        #[test]
        fn separate_ifs_become_one_condition() {
            let output = consolidate("disability_amount#L2-L7", None).apply(AMOUNTS).unwrap();
            assert!(output.starts_with(
                "\
def disability_amount(employee):
    if employee.seniority < 2 or employee.months_disabled > 12 or employee.is_part_time:
        return 0
    # calculate disability amount
    return 100
"
            ));
        }

        #[test]
        fn duplicate_ladders_are_merged_too() {
            let output = consolidate("disability_amount#L2-L7", None).apply(AMOUNTS).unwrap();
            assert!(output.contains(
                "def vacation_days(worker):\n    if worker.seniority < 2 or worker.months_disabled > 12 or worker.is_part_time:\n        return 0\n    return worker.seniority * 2\n"
            ));
        }

        #[test]
        fn elif_prefix_keeps_the_rest_of_the_chain() {
            let source = "\
def grade(score):
    if score < 0:
        return 0
    elif score > 100:
        return 0
    elif score > 90:
        return 4
    else:
        return 3
";
            let output = consolidate("grade#L2-L9", None).apply(source).unwrap();
            assert_eq!(
                output,
                "\
def grade(score):
    if score < 0 or score > 100:
        return 0
    elif score > 90:
        return 4
    else:
        return 3
"
            );
        }

        #[test]
        fn conditional_expressions_are_parenthesized() {
            let source = "def f(a, b):\n    if a if b else 0:\n        return 1\n    if b:\n        return 1\n    return 2\n";
            let output = consolidate("f#L2-L5", None).apply(source).unwrap();
            assert!(output.contains("    if (a if b else 0) or b:\n        return 1\n"));
        }
    }

    mod predicates {
        use super::*;

        #[test]
        fn module_level_predicate_is_shared() {
            let output = consolidate("disability_amount#L2-L7", Some("is_not_eligible"))
                .apply(AMOUNTS)
                .unwrap();
            assert!(output.starts_with(
                "\
def is_not_eligible(employee):
    return employee.seniority < 2 or employee.months_disabled > 12 or employee.is_part_time


def disability_amount(employee):
    if is_not_eligible(employee):
        return 0
"
            ));
            assert!(output.contains("def vacation_days(worker):\n    if is_not_eligible(worker):\n"));
        }

        #[test]
        fn method_predicate_is_called_through_the_receiver() {
            let source = "\
class Order:
    def get_discount(self, total):
        if total > 1000:
            return 0.1
        if self.is_vip:
            return 0.1
        return 0.0
";
            let output = consolidate("Order::get_discount#L3-L6", Some("qualifies"))
                .apply(source)
                .unwrap();
            assert!(output.contains("        if self.qualifies(total):\n            return 0.1\n"));
            assert!(output.ends_with(
                "\n    def qualifies(self, total):\n        return total > 1000 or self.is_vip\n"
            ));
        }

        #[test]
        fn predicate_name_conflict() {
            let err = consolidate("disability_amount#L2-L7", Some("vacation_days"))
                .apply(AMOUNTS)
                .unwrap_err();
            assert!(matches!(err, MoltError::Conflict { .. }));
        }
    }

    mod rejection {
        use super::*;

        #[test]
        fn different_values_do_not_merge() {
            let source = "def f(x):\n    if x < 0:\n        return 0\n    if x > 9:\n        return 1\n    return 2\n";
            let err = consolidate("f#L2-L5", None).apply(source).unwrap_err();
            assert!(matches!(err, MoltError::InvalidArguments { .. }));
        }

        #[test]
        fn no_ladder_in_range() {
            let err = consolidate("vacation_days#L19", None).apply(AMOUNTS).unwrap_err();
            assert!(matches!(err, MoltError::InvalidArguments { .. }));
        }

        #[test]
        fn line_range_is_required() {
            let params: Params = [("target".to_string(), "f".to_string())].into_iter().collect();
            assert!(matches!(
                ConsolidateConditionalExpression::from_params(&params),
                Err(MoltError::Format { .. })
            ));
        }
    }
}
