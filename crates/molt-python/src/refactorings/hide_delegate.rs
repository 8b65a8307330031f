// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Hide a delegate behind a getter on the server class.
//!
//! For `Person::department` with member `manager`:
//!
//! 1. `self.department` becomes `self._department` throughout `Person`.
//! 2. `def get_manager(self): return self._department.manager` is added
//!    below `__init__` (or at the end of the class).
//! 3. Clients spelling `x.department.manager` are rewritten to
//!    `x.get_manager()`, in the file itself by [`apply`](Refactoring::apply)
//!    and in the rest of the tree by [`follow_up`](Refactoring::follow_up).
//!    A called access such as `x.department.manager()` is left as written
//!    in both places.

use tracing::debug;
use tree_sitter::Node;

use molt_core::edit::EditPrimitive;
use molt_core::error::{MoltError, MoltResult};
use molt_core::target::TargetSpec;

use crate::analysis::instance::self_attribute;
use crate::cst::{class_methods, definition_statement, walk, PythonModule, VisitResult};
use crate::references::call_site::{CallSiteUpdater, UpdateSummary};
use crate::references::pattern::{is_callee, UsagePattern};
use crate::refactorings::{
    identifier_param, optional_param, parse, required_param, Params, Refactoring,
};
use crate::transform::{append_to_body, body_indent, collect_edits, statement_lines, NodeReplacements};
use crate::validation::{private_name, public_name, validate_python_identifier};
use crate::validators::conflict::{FieldConflictChecker, MethodConflictChecker};

#[derive(Debug)]
pub struct HideDelegate {
    target: TargetSpec,
    member: String,
    method: String,
}

impl HideDelegate {
    pub fn from_params(params: &Params) -> MoltResult<Self> {
        let target = TargetSpec::parse_with_arity(required_param(params, "target")?, 2)?;
        if target.line_range().is_some() {
            return Err(MoltError::format(format!(
                "hide-delegate target '{}' must be 'Class::field'",
                target
            )));
        }
        let member = identifier_param(params, "member")?;
        let method = match optional_param(params, "method") {
            Some(method) => {
                validate_python_identifier(method)?;
                method.to_string()
            }
            None => format!("get_{}", public_name(&member)),
        };
        Ok(HideDelegate {
            target,
            member,
            method,
        })
    }

    fn class_name(&self) -> &str {
        self.target.qualifiers()[0].as_str()
    }

    fn field(&self) -> &str {
        self.target.leaf()
    }
}

/// `base` of `base.<field>.<member>` when `node` is exactly that chain and
/// is not itself being called.
fn delegated_access<'t>(
    module: &PythonModule,
    node: Node<'t>,
    field: &str,
    member: &str,
) -> Option<Node<'t>> {
    if node.kind() != "attribute" || is_callee(node) {
        return None;
    }
    let leaf = node.child_by_field_name("attribute")?;
    let object = node.child_by_field_name("object")?;
    if module.text_of(leaf) != member || object.kind() != "attribute" {
        return None;
    }
    let delegate = object.child_by_field_name("attribute")?;
    if module.text_of(delegate) != field {
        return None;
    }
    object.child_by_field_name("object")
}

/// Strip `.<field>.<member>` from the end of an access's text.
fn strip_delegation<'a>(text: &'a str, field: &str, member: &str) -> Option<&'a str> {
    let rest = text.strip_suffix(member)?.trim_end().strip_suffix('.')?.trim_end();
    let base = rest.strip_suffix(field)?.trim_end().strip_suffix('.')?;
    Some(base.trim_end())
}

impl Refactoring for HideDelegate {
    fn name(&self) -> &'static str {
        "hide-delegate"
    }

    fn apply(&self, source: &str) -> MoltResult<String> {
        let module = parse(source)?;
        let class_name = self.class_name();
        let field = self.field();
        let class = module.require_class(class_name)?;
        if !FieldConflictChecker::exists(&module, class_name, field)? {
            return Err(MoltError::not_found("field", format!("{}.{}", class_name, field)));
        }
        let private = private_name(field);
        if private != field {
            FieldConflictChecker::check(&module, class_name, &private)?;
        }
        MethodConflictChecker::check(&module, class_name, &self.method)?;

        // Pass 1: the server's own accesses and the clients' delegations.
        let mut replacements = NodeReplacements::new();
        let mut renamed = 0;
        let mut delegations = 0;
        walk(module.root(), &mut |node: Node<'_>| {
            if node.kind() != "attribute" {
                return VisitResult::Continue;
            }
            let inside_server = node.start_byte() >= class.start_byte()
                && node.end_byte() <= class.end_byte();
            if inside_server {
                if self_attribute(&module, node) == Some(field) {
                    if let Some(leaf) = node.child_by_field_name("attribute") {
                        replacements.insert(leaf, private.as_str());
                        renamed += 1;
                    }
                }
                return VisitResult::Continue;
            }
            match delegated_access(&module, node, field, &self.member) {
                Some(base) => {
                    replacements.insert(node, format!("{}.{}()", module.text_of(base), self.method));
                    delegations += 1;
                    VisitResult::SkipChildren
                }
                None => VisitResult::Continue,
            }
        });
        debug!(target = %self.target, renamed, delegations, method = %self.method, "hiding delegate");

        // Pass 2: apply the replacements and add the getter.
        let indent = body_indent(&module, class);
        let getter = format!(
            "{indent}def {method}(self):\n{indent}    return self.{private}.{member}\n",
            indent = indent,
            method = self.method,
            private = private,
            member = self.member,
        );
        let init = class_methods(class)
            .into_iter()
            .find(|m| module.name_of(*m) == Some("__init__"));
        let mut rewrite = collect_edits(&module, &mut replacements);
        match init {
            Some(init) => {
                let end = statement_lines(&module, definition_statement(init)).end;
                let separator = if source[..end].ends_with('\n') { "\n" } else { "\n\n" };
                rewrite.push(EditPrimitive::InsertAt {
                    position: end,
                    text: format!("{}{}", separator, getter),
                });
            }
            None => rewrite.push(append_to_body(&module, class, &getter)),
        }
        rewrite.finish()
    }

    fn follow_up(&self, updater: &CallSiteUpdater) -> MoltResult<Option<UpdateSummary>> {
        let field = self.field();
        let summary = updater.update_all(
            &self.member,
            UsagePattern::AttributeAccess,
            |site| {
                delegated_access(site.module, site.node, field, &self.member)?;
                let base = strip_delegation(site.text, field, &self.member)?;
                Some(format!("{}.{}()", base, self.method))
            },
            None,
        )?;
        Ok(Some(summary))
    }
}
