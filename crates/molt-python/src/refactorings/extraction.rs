// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Region extraction shared by extract-method and extract-function.
//!
//! A region is a run of top-level statements of one function body, chosen by
//! a line range. Its interface follows the flow log:
//!
//! 1. Inputs (names read before any write inside the region) become
//!    parameters, restricted to names local to the function.
//! 2. Names that the region only updates with augmented assignment are
//!    seeded with `name = 0` inside the new callable instead.
//! 3. Outputs (written inside, read after) are returned, one as a bare
//!    value and several as a tuple that the call site destructures.
//! 4. A `return` as the region's last statement makes the call site
//!    `return helper(...)`; a `return` anywhere else is rejected.

use tree_sitter::Node;

use molt_core::edit::EditPrimitive;
use molt_core::error::{MoltError, MoltResult};
use molt_core::patch::Span;
use molt_core::text::reindent;

use crate::analysis::flow::VariableFlowAnalyzer;
use crate::cst::{
    body_statements, end_line_of, is_scope_boundary, line_of, named_children, walk, PythonModule,
    VisitResult,
};
use crate::transform::{line_indent, statement_lines};

/// The statements selected by a line range.
#[derive(Debug)]
pub(crate) struct Region<'m> {
    pub statements: Vec<Node<'m>>,
    pub start_line: u32,
    pub end_line: u32,
    /// The last statement is a `return`.
    pub tail_return: bool,
}

impl<'m> Region<'m> {
    /// Select the top-level statements of `function` that start in
    /// `[lo, hi]`.
    pub fn select(function: Node<'m>, lo: u32, hi: u32) -> MoltResult<Self> {
        let body = body_statements(function);
        if let Some(split) = body
            .iter()
            .find(|s| line_of(**s) < lo && end_line_of(**s) >= lo)
        {
            return Err(MoltError::invalid_args(format!(
                "line {} is inside the statement starting on line {}",
                lo,
                line_of(*split)
            )));
        }
        let statements: Vec<Node<'m>> = body
            .into_iter()
            .filter(|s| (lo..=hi).contains(&line_of(*s)))
            .collect();
        let (Some(first), Some(last)) = (statements.first(), statements.last()) else {
            return Err(MoltError::invalid_args(format!(
                "no statements on lines {}-{}",
                lo, hi
            )));
        };
        let tail_return = last.kind() == "return_statement";
        let returns = statements
            .iter()
            .map(|s| count_returns(*s))
            .sum::<usize>();
        if returns > usize::from(tail_return) {
            return Err(MoltError::invalid_args(
                "cannot extract a region that returns before its last statement",
            ));
        }
        Ok(Region {
            start_line: line_of(*first),
            end_line: end_line_of(*last),
            tail_return,
            statements,
        })
    }

    fn first(&self) -> Node<'m> {
        self.statements[0]
    }

    fn last(&self) -> Node<'m> {
        self.statements[self.statements.len() - 1]
    }

    /// Whole-line span covering the region.
    pub fn span(&self, module: &PythonModule) -> Span {
        Span::new(
            statement_lines(module, self.first()).start,
            statement_lines(module, self.last()).end,
        )
    }

    /// True if `name` appears as an identifier anywhere in the region.
    pub fn mentions(&self, module: &PythonModule, name: &str) -> bool {
        self.statements.iter().any(|statement| {
            !walk(*statement, &mut |node: Node<'_>| {
                if node.kind() == "identifier" && module.text_of(node) == name {
                    VisitResult::Stop
                } else {
                    VisitResult::Continue
                }
            })
        })
    }
}

/// `return` statements under `statement`, nested scopes excluded.
fn count_returns(statement: Node<'_>) -> usize {
    let mut count = 0;
    walk(statement, &mut |node: Node<'_>| {
        if is_scope_boundary(node) {
            return VisitResult::SkipChildren;
        }
        if node.kind() == "return_statement" {
            count += 1;
        }
        VisitResult::Continue
    });
    count
}

/// Parameters, seeds and outputs of a region.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Interface {
    pub params: Vec<String>,
    pub seeds: Vec<String>,
    pub outputs: Vec<String>,
}

impl Interface {
    /// Build the interface from the region's `inputs`, as computed by the
    /// caller's analyzer.
    pub fn new(
        module: &PythonModule,
        flow: &VariableFlowAnalyzer<'_>,
        region: &Region<'_>,
        inputs: Vec<String>,
    ) -> Self {
        let function = flow.function();
        let mut locals = module.parameter_names(function);
        for access in flow.accesses().iter().filter(|a| a.is_write) {
            if !locals.contains(&access.name) {
                locals.push(access.name.clone());
            }
        }

        let (augmented, assigned) = region_targets(module, region);
        let (seeds, params): (Vec<String>, Vec<String>) = inputs
            .into_iter()
            .filter(|name| locals.contains(name))
            .partition(|name| augmented.contains(name) && !assigned.contains(name));

        let outputs = if region.tail_return {
            Vec::new()
        } else {
            flow.outputs_from_region(region.start_line, region.end_line)
        };
        Interface {
            params,
            seeds,
            outputs,
        }
    }
}

/// Identifier targets of augmented and of plain assignments in the region.
fn region_targets(module: &PythonModule, region: &Region<'_>) -> (Vec<String>, Vec<String>) {
    let mut augmented = Vec::new();
    let mut assigned = Vec::new();
    for statement in &region.statements {
        walk(*statement, &mut |node: Node<'_>| {
            if is_scope_boundary(node) {
                return VisitResult::SkipChildren;
            }
            let bucket = match node.kind() {
                "augmented_assignment" => &mut augmented,
                "assignment" | "for_statement" | "for_in_clause" => &mut assigned,
                _ => return VisitResult::Continue,
            };
            if let Some(left) = node.child_by_field_name("left") {
                bound_identifiers(module, left, bucket);
            }
            VisitResult::Continue
        });
    }
    (augmented, assigned)
}

fn bound_identifiers(module: &PythonModule, target: Node<'_>, out: &mut Vec<String>) {
    match target.kind() {
        "identifier" => out.push(module.text_of(target).to_string()),
        "attribute" | "subscript" => {}
        _ => {
            for child in named_children(target) {
                bound_identifiers(module, child, out);
            }
        }
    }
}

/// Render the body of the new callable at `indent`.
///
/// With `fold_assignment`, a lone `x = expr` whose only output is `x`
/// becomes `return expr`.
pub(crate) fn render_body(
    module: &PythonModule,
    region: &Region<'_>,
    interface: &Interface,
    indent: &str,
    fold_assignment: bool,
) -> String {
    if let ([statement], [output]) = (region.statements.as_slice(), interface.outputs.as_slice()) {
        let folded = simple_assignment_value(module, *statement, output)
            .filter(|_| fold_assignment && interface.seeds.is_empty());
        if let Some(value) = folded {
            return format!("{}return {}\n", indent, module.text_of(value));
        }
    }

    let span = region.span(module);
    let mut body = String::new();
    for seed in &interface.seeds {
        body.push_str(&format!("{}{} = 0\n", indent, seed));
    }
    body.push_str(&reindent(&module.source()[span.start..span.end], indent));
    if !body.ends_with('\n') {
        body.push('\n');
    }
    if !interface.outputs.is_empty() {
        body.push_str(&format!("{}return {}\n", indent, interface.outputs.join(", ")));
    }
    body
}

/// The value of `name = value` when `statement` is exactly that.
fn simple_assignment_value<'m>(
    module: &PythonModule,
    statement: Node<'m>,
    name: &str,
) -> Option<Node<'m>> {
    if statement.kind() != "expression_statement" || statement.named_child_count() != 1 {
        return None;
    }
    let assignment = statement.named_child(0)?;
    if assignment.kind() != "assignment" {
        return None;
    }
    let left = assignment.child_by_field_name("left")?;
    let right = assignment.child_by_field_name("right")?;
    (left.kind() == "identifier"
        && module.text_of(left) == name
        && right.kind() != "assignment"
        && assignment.child_by_field_name("type").is_none())
    .then_some(right)
}

/// Edit that replaces the region with a call to the new callable.
pub(crate) fn call_site_edit(
    module: &PythonModule,
    region: &Region<'_>,
    interface: &Interface,
    call: &str,
) -> EditPrimitive {
    let statement = if region.tail_return {
        format!("return {}", call)
    } else if interface.outputs.is_empty() {
        call.to_string()
    } else {
        format!("{} = {}", interface.outputs.join(", "), call)
    };
    EditPrimitive::Replace {
        span: region.span(module),
        new_text: format!("{}{}\n", line_indent(module, region.first()), statement),
    }
}
