// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Replace a magic number with a module-level symbolic constant.
//!
//! 1. Find the numeric literal on the target line of the target function
//!    (`value` picks one when the line has several).
//! 2. Validate the constant name: `UPPER_SNAKE_CASE`, not yet declared at
//!    module level.
//! 3. Choose the insertion point: after existing constants, else after the
//!    imports, else above the first definition.
//! 4. Insert `NAME = value` and replace every equal literal below the
//!    insertion point with `NAME`.

use tracing::debug;
use tree_sitter::Node;

use molt_core::edit::EditPrimitive;
use molt_core::error::{MoltError, MoltResult};
use molt_core::target::TargetSpec;
use molt_core::text::line_end_inclusive;

use crate::cst::{end_line_of, line_of, unwrap_definition, walk, PythonModule, VisitResult};
use crate::refactorings::{
    identifier_param, optional_param, parse, required_param, Params, Refactoring,
};
use crate::transform::{statement_lines, Rewrite};
use crate::validators::name_conflict::NameConflictValidator;

#[derive(Debug)]
pub struct ReplaceMagicNumber {
    target: TargetSpec,
    name: String,
    value: Option<String>,
}

impl ReplaceMagicNumber {
    pub fn from_params(params: &Params) -> MoltResult<Self> {
        let target = TargetSpec::parse(required_param(params, "target")?)?;
        if target.qualifiers().len() > 2 {
            return Err(MoltError::format(format!(
                "target '{}' must be 'function#L..' or 'Class::method#L..'",
                target
            )));
        }
        target.require_line_range()?;
        let name = identifier_param(params, "name")?;
        if !is_upper_snake_case(&name) {
            return Err(MoltError::invalid_args(format!(
                "constant name '{}' must be UPPER_SNAKE_CASE",
                name
            )));
        }
        Ok(ReplaceMagicNumber {
            target,
            name,
            value: optional_param(params, "value").map(str::to_string),
        })
    }

    /// The literal text to replace, taken from the target line.
    fn literal_text(&self, module: &PythonModule, function: Node<'_>) -> MoltResult<String> {
        let (line, _) = self.target.require_line_range()?;
        if line < line_of(function) || line > end_line_of(function) {
            return Err(MoltError::invalid_args(format!(
                "line {} is outside '{}'",
                line,
                self.target.leaf()
            )));
        }
        let mut on_line: Vec<String> = Vec::new();
        for literal in numeric_literals(function) {
            let text = module.text_of(literal).to_string();
            if line_of(literal) == line && !on_line.contains(&text) {
                on_line.push(text);
            }
        }
        match (&self.value, on_line.as_slice()) {
            (Some(value), found) if found.contains(value) => Ok(value.clone()),
            (Some(value), _) => Err(MoltError::not_found("number", value.as_str())),
            (None, [only]) => Ok(only.clone()),
            (None, []) => Err(MoltError::not_found("number", format!("line {}", line))),
            (None, _) => Err(MoltError::invalid_args(format!(
                "line {} has several numbers ({}); pass 'value' to choose one",
                line,
                on_line.join(", ")
            ))),
        }
    }
}

fn is_upper_snake_case(name: &str) -> bool {
    let name = name.trim_start_matches('_');
    name.chars().next().is_some_and(|c| !c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn numeric_literals<'t>(root: Node<'t>) -> Vec<Node<'t>> {
    let mut found = Vec::new();
    walk(root, &mut |node: Node<'t>| {
        if matches!(node.kind(), "integer" | "float") {
            found.push(node);
            return VisitResult::SkipChildren;
        }
        VisitResult::Continue
    });
    found
}

/// Byte offset where the constant goes, and the text to insert there.
fn insertion(module: &PythonModule, assignment: &str) -> (usize, String) {
    let source = module.source();
    let statements = module.statements();
    let first_definition = statements
        .iter()
        .position(|s| unwrap_definition(*s).is_some());
    let preamble = &statements[..first_definition.unwrap_or(statements.len())];

    let last_constant = preamble.iter().rev().find(|s| {
        s.kind() == "expression_statement"
            && s.named_child(0).is_some_and(|a| {
                a.kind() == "assignment"
                    && a.child_by_field_name("left").is_some_and(|left| {
                        left.kind() == "identifier" && is_upper_snake_case(module.text_of(left))
                    })
            })
    });
    if let Some(constant) = last_constant {
        return (statement_lines(module, *constant).end, assignment.to_string());
    }

    let last_import = preamble.iter().rev().find(|s| {
        matches!(
            s.kind(),
            "import_statement" | "import_from_statement" | "future_import_statement"
        )
    });
    if let Some(import) = last_import {
        return (statement_lines(module, *import).end, format!("\n{}", assignment));
    }

    if let Some(index) = first_definition {
        let definition = statements[index];
        return (
            statement_lines(module, definition).start,
            format!("{}\n\n", assignment),
        );
    }

    // No imports or definitions: below the first statement.
    match statements.first() {
        Some(first) => (
            line_end_inclusive(source, first.end_byte()),
            format!("\n\n{}", assignment),
        ),
        None => (0, assignment.to_string()),
    }
}

impl Refactoring for ReplaceMagicNumber {
    fn name(&self) -> &'static str {
        "replace-magic-number-with-symbolic-constant"
    }

    fn apply(&self, source: &str) -> MoltResult<String> {
        let module = parse(source)?;
        let class_name = self.target.container().first().map(String::as_str);
        let function = module.require_function(class_name, self.target.leaf())?;
        let literal = self.literal_text(&module, function)?;

        let validator = NameConflictValidator::from_module(&module);
        validator.validate_constant_name(&self.name)?;
        if validator.is_declared(&self.name) {
            return Err(MoltError::conflict(self.name.as_str(), "module"));
        }

        let assignment = format!("{} = {}\n", self.name, literal);
        let (position, text) = insertion(&module, &assignment);
        let mut rewrite = Rewrite::new(&module);
        rewrite.push(EditPrimitive::InsertAt { position, text });
        let mut replaced = 0;
        for node in numeric_literals(module.root()) {
            if node.start_byte() >= position && module.text_of(node) == literal {
                rewrite.replace(node, self.name.as_str());
                replaced += 1;
            }
        }
        debug!(name = %self.name, literal = %literal, replaced, "introducing constant");
        rewrite.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refactoring(
        target: &str,
        name: &str,
        value: Option<&str>,
    ) -> MoltResult<ReplaceMagicNumber> {
        let mut params = Params::new();
        params.insert("target".into(), target.into());
        params.insert("name".into(), name.into());
        if let Some(value) = value {
            params.insert("value".into(), value.into());
        }
        ReplaceMagicNumber::from_params(&params)
    }

    const PHYSICS: &str = "\
\"\"\"Physics helpers.\"\"\"


def potential_energy(mass, height):
    return mass * 9.81 * height


def calculate_force(mass):
    gravity = 9.81
    return mass * gravity * 2
";

    mod replacing {
        use super::*;

        #[test]
        fn constant_above_first_definition_and_all_uses_replaced() {
            let output = refactoring("potential_energy#L5", "GRAVITATIONAL_CONSTANT", None)
                .unwrap()
                .apply(PHYSICS)
                .unwrap();
            assert_eq!(
                output,
                "\
\"\"\"Physics helpers.\"\"\"


GRAVITATIONAL_CONSTANT = 9.81


def potential_energy(mass, height):
    return mass * GRAVITATIONAL_CONSTANT * height


def calculate_force(mass):
    gravity = GRAVITATIONAL_CONSTANT
    return mass * gravity * 2
"
            );
        }

        #[test]
        fn explicit_value() {
            let output = refactoring("calculate_force#L10", "FACTOR", Some("2"))
                .unwrap()
                .apply(PHYSICS)
                .unwrap();
            assert!(output.contains("FACTOR = 2\n\n\ndef potential_energy"));
            assert!(output.contains("return mass * gravity * FACTOR\n"));
            assert!(output.contains("gravity = 9.81\n"));
        }

        #[test]
        fn goes_after_existing_constants() {
            let source = "import math\n\nPI = 3.14\n\n\ndef area(r):\n    return PI * r * 2\n";
            let output = refactoring("area#L7", "TWO", None).unwrap().apply(source).unwrap();
            assert_eq!(
                output,
                "import math\n\nPI = 3.14\nTWO = 2\n\n\ndef area(r):\n    return PI * r * TWO\n"
            );
        }

        #[test]
        fn goes_after_imports() {
            let source = "import math\n\n\ndef area(r):\n    return math.pi * r * 2\n";
            let output = refactoring("area#L5", "TWO", None).unwrap().apply(source).unwrap();
            assert!(output.starts_with("import math\n\nTWO = 2\n\n\ndef area(r):"));
        }
    }

    mod rejection {
        use super::*;

        #[test]
        fn lower_case_name() {
            let err = refactoring("f#L1", "gravity", None).unwrap_err();
            assert!(matches!(err, MoltError::InvalidArguments { .. }));
        }

        #[test]
        fn declared_name_leaves_source_untouched() {
            let source = "G = 1\n\n\ndef f(x):\n    return x * 9.81\n";
            let err = refactoring("f#L5", "G", None).unwrap().apply(source).unwrap_err();
            assert!(matches!(err, MoltError::Conflict { .. }));
        }

        #[test]
        fn missing_value_on_line() {
            let err = refactoring("potential_energy#L5", "G", Some("3"))
                .unwrap()
                .apply(PHYSICS)
                .unwrap_err();
            assert!(matches!(err, MoltError::NotFound { .. }));
        }

        #[test]
        fn several_numbers_need_a_value() {
            let source = "def f(x):\n    return x * 3 + 4\n";
            let err = refactoring("f#L2", "K", None).unwrap().apply(source).unwrap_err();
            assert!(matches!(err, MoltError::InvalidArguments { .. }));
        }
    }
}
