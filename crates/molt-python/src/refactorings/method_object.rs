// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Replace a long method with a method object.
//!
//! `Account::gamma(self, input_val, quantity)` becomes a class `Gamma`
//! placed below `Account`:
//!
//! - `__init__` stores a back-reference to the source object (named after
//!   the source class in snake case) and one field per parameter.
//! - `compute` holds the original body, with parameters read as
//!   `self.<param>` and other receiver uses routed through the
//!   back-reference (`self.delta()` becomes `self.account.delta()`).
//! - Private helpers that only this method calls move along and stay
//!   reachable as `self._helper(...)`.
//!
//! The original method keeps its signature and decorators; its body
//! becomes `return Gamma(self, input_val, quantity).compute()`.

use tracing::debug;
use tree_sitter::Node;

use molt_core::edit::EditPrimitive;
use molt_core::error::{MoltError, MoltResult};
use molt_core::patch::Span;
use molt_core::target::TargetSpec;
use molt_core::text::reindent;

use crate::analysis::instance::InstanceVariableTracker;
use crate::cst::{
    class_methods, definition_statement, line_of, parameter_identifier, parameter_nodes, span_of,
    walk, PythonModule, VisitResult,
};
use crate::refactorings::{
    optional_param, parse, required_param, variable_occurrences, Params, Refactoring,
};
use crate::transform::{body_indent, remove_statements, statement_lines, Rewrite};
use crate::validation::{capitalize, snake_case, validate_python_identifier};
use crate::validators::conflict::ClassConflictChecker;

#[derive(Debug)]
pub struct ReplaceMethodWithMethodObject {
    target: TargetSpec,
    name: Option<String>,
}

impl ReplaceMethodWithMethodObject {
    pub fn from_params(params: &Params) -> MoltResult<Self> {
        let target = TargetSpec::parse_with_arity(required_param(params, "target")?, 2)?;
        if target.line_range().is_some() {
            return Err(MoltError::format(format!(
                "replace-method-with-method-object target '{}' must be 'Class::method'",
                target
            )));
        }
        let name = match optional_param(params, "name") {
            Some(name) => {
                validate_python_identifier(name)?;
                Some(name.to_string())
            }
            None => None,
        };
        Ok(ReplaceMethodWithMethodObject { target, name })
    }
}

/// Parameters after the receiver, by name. Star parameters are rejected.
fn object_parameters(module: &PythonModule, method: Node<'_>) -> MoltResult<Vec<String>> {
    let mut names = Vec::new();
    for parameter in parameter_nodes(method).into_iter().skip(1) {
        if matches!(parameter.kind(), "list_splat_pattern" | "dictionary_splat_pattern") {
            return Err(MoltError::invalid_args(format!(
                "cannot move star parameter '{}' into a method object",
                module.text_of(parameter)
            )));
        }
        if let Some(identifier) = parameter_identifier(parameter) {
            names.push(module.text_of(identifier).to_string());
        }
    }
    Ok(names)
}

/// True if `scope` contains `<receiver>.<member>`.
fn accesses_member(module: &PythonModule, scope: Node<'_>, receiver: &str, member: &str) -> bool {
    !walk(scope, &mut |node: Node<'_>| {
        if node.kind() != "attribute" {
            return VisitResult::Continue;
        }
        let hit = node
            .child_by_field_name("object")
            .is_some_and(|o| module.text_of(o) == receiver)
            && node
                .child_by_field_name("attribute")
                .is_some_and(|a| module.text_of(a) == member);
        if hit {
            VisitResult::Stop
        } else {
            VisitResult::Continue
        }
    })
}

fn receiver_of(module: &PythonModule, method: Node<'_>) -> Option<String> {
    module.parameter_names(method).into_iter().next()
}

/// Private helpers called by `method` and by no other method of `class`.
fn private_helpers<'m>(
    module: &'m PythonModule,
    class: Node<'m>,
    method: Node<'m>,
) -> Vec<Node<'m>> {
    let methods = class_methods(class);
    let receiver = receiver_of(module, method).unwrap_or_default();
    methods
        .iter()
        .copied()
        .filter(|helper| {
            let Some(name) = module.name_of(*helper) else {
                return false;
            };
            if !name.starts_with('_') || name.starts_with("__") || helper.id() == method.id() {
                return false;
            }
            if !accesses_member(module, method, &receiver, name) {
                return false;
            }
            !methods.iter().any(|other| {
                other.id() != method.id()
                    && other.id() != helper.id()
                    && receiver_of(module, *other)
                        .is_some_and(|r| accesses_member(module, *other, &r, name))
            })
        })
        .collect()
}

/// Text of `span` with non-overlapping `edits` applied.
fn splice(source: &str, span: Span, mut edits: Vec<(Span, String)>) -> String {
    edits.sort_by_key(|(s, _)| std::cmp::Reverse(s.start));
    let mut text = source[span.start..span.end].to_string();
    for (s, replacement) in edits {
        text.replace_range(s.start - span.start..s.end - span.start, &replacement);
    }
    text
}

/// Receiver rewrites for code that moves into the method object.
struct Relocation<'a> {
    /// The receiver name in the moved code.
    receiver: &'a str,
    /// The receiver name in the method object.
    new_receiver: &'a str,
    back_reference: &'a str,
    helpers: &'a [String],
    /// Names read as `self.<name>` after the move.
    fields: &'a [String],
}

impl Relocation<'_> {
    fn edits(&self, module: &PythonModule, scope: Node<'_>) -> Vec<(Span, String)> {
        let mut edits = Vec::new();
        for node in variable_occurrences(module, scope, self.receiver) {
            let calls_helper = node.parent().is_some_and(|parent| {
                parent.kind() == "attribute"
                    && parent
                        .child_by_field_name("attribute")
                        .is_some_and(|a| self.helpers.iter().any(|h| h == module.text_of(a)))
            });
            let replacement = if calls_helper {
                self.new_receiver.to_string()
            } else {
                format!("{}.{}", self.new_receiver, self.back_reference)
            };
            edits.push((span_of(node), replacement));
        }
        for field in self.fields {
            for node in variable_occurrences(module, scope, field) {
                edits.push((span_of(node), format!("{}.{}", self.new_receiver, field)));
            }
        }
        edits
    }
}

impl Refactoring for ReplaceMethodWithMethodObject {
    fn name(&self) -> &'static str {
        "replace-method-with-method-object"
    }

    fn apply(&self, source: &str) -> MoltResult<String> {
        let module = parse(source)?;
        let class_name = self.target.qualifiers()[0].as_str();
        let method_name = self.target.leaf();
        let class = module.require_class(class_name)?;
        let method = module.require_function(Some(class_name), method_name)?;
        if !InstanceVariableTracker::new(&module, class_name, method_name)?.is_method() {
            return Err(MoltError::invalid_args(format!(
                "'{}' is not an instance method",
                self.target
            )));
        }
        let object_name = self.name.clone().unwrap_or_else(|| capitalize(method_name));
        ClassConflictChecker::check(&module, &object_name)?;

        let back_reference = snake_case(class_name);
        let fields = object_parameters(&module, method)?;
        if fields.contains(&back_reference) {
            return Err(MoltError::conflict(
                back_reference,
                format!("class '{}'", object_name),
            ));
        }
        let receiver = receiver_of(&module, method).unwrap_or_else(|| "self".to_string());
        let Some(body) = method.child_by_field_name("body") else {
            return Err(MoltError::internal("function without a body"));
        };
        if line_of(body) == line_of(method) {
            return Err(MoltError::invalid_args(format!(
                "'{}' has a one-line body",
                self.target
            )));
        }

        let helpers = private_helpers(&module, class, method);
        let helper_names: Vec<String> = helpers
            .iter()
            .filter_map(|h| module.name_of(*h).map(str::to_string))
            .collect();
        debug!(
            target = %self.target,
            object = %object_name,
            back_reference = %back_reference,
            ?fields,
            helpers = ?helper_names,
            "replacing method with method object"
        );

        let member_indent = body_indent(&module, class);
        let inner_indent = body_indent(&module, method);

        // compute(): the original body, relocated.
        let body_lines = statement_lines(&module, body);
        let relocation = Relocation {
            receiver: &receiver,
            new_receiver: "self",
            back_reference: &back_reference,
            helpers: &helper_names,
            fields: &fields,
        };
        let compute_body = reindent(
            &splice(source, body_lines, relocation.edits(&module, body)),
            &inner_indent,
        );

        let mut init_params = vec!["self".to_string(), back_reference.clone()];
        init_params.extend(fields.iter().cloned());
        let mut object = format!(
            "class {}:\n{m}def __init__({}):\n",
            object_name,
            init_params.join(", "),
            m = member_indent
        );
        for field in std::iter::once(&back_reference).chain(fields.iter()) {
            object.push_str(&format!("{}self.{f} = {f}\n", inner_indent, f = field));
        }
        object.push_str(&format!("\n{}def compute(self):\n{}", member_indent, compute_body));

        // Moved helpers keep their own receiver name.
        for helper in &helpers {
            let statement = definition_statement(*helper);
            let helper_receiver = receiver_of(&module, *helper).unwrap_or_else(|| "self".to_string());
            let relocation = Relocation {
                receiver: &helper_receiver,
                new_receiver: &helper_receiver,
                back_reference: &back_reference,
                helpers: &helper_names,
                fields: &[],
            };
            let edits = match helper.child_by_field_name("body") {
                Some(helper_body) => relocation.edits(&module, helper_body),
                None => Vec::new(),
            };
            let text = splice(source, statement_lines(&module, statement), edits);
            object.push('\n');
            object.push_str(&reindent(&text, &member_indent));
        }

        let mut call_args = vec![receiver.clone()];
        call_args.extend(fields.iter().cloned());
        let stub = format!(
            "{}return {}({}).compute()\n",
            inner_indent,
            object_name,
            call_args.join(", ")
        );

        let mut rewrite = Rewrite::new(&module);
        rewrite.push(EditPrimitive::Replace {
            span: body_lines,
            new_text: stub,
        });
        rewrite.extend(remove_statements(&module, class, &helpers));
        let end = statement_lines(&module, definition_statement(class)).end;
        let separator = if source[..end].ends_with('\n') { "\n\n" } else { "\n\n\n" };
        rewrite.push(EditPrimitive::InsertAt {
            position: end,
            text: format!("{}{}", separator, object),
        });
        rewrite.finish()
    }
}
