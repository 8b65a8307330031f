//! Instance-scope analysis: is the target a method, and which `self`
//! attributes does it use.

use std::cell::OnceCell;

use tree_sitter::Node;

use molt_core::error::MoltResult;

use crate::cst::{is_scope_boundary, line_of, walk, PythonModule, VisitResult};
use crate::validators::decorator::DecoratorHandler;

/// Tracks `self` usage for one method.
pub struct InstanceVariableTracker<'m> {
    module: &'m PythonModule,
    class_name: String,
    function: Node<'m>,
    self_references: OnceCell<Vec<String>>,
}

impl<'m> InstanceVariableTracker<'m> {
    pub fn new(module: &'m PythonModule, class_name: &str, method_name: &str) -> MoltResult<Self> {
        let function = module.require_function(Some(class_name), method_name)?;
        Ok(InstanceVariableTracker {
            module,
            class_name: class_name.to_string(),
            function,
            self_references: OnceCell::new(),
        })
    }

    /// True when the first parameter is `self` and no `staticmethod` or
    /// `classmethod` decorator is applied.
    pub fn is_method(&self) -> bool {
        let decorators = DecoratorHandler::new(self.module);
        if decorators.has_any(self.function, &["staticmethod", "classmethod"]) {
            return false;
        }
        self.module
            .parameter_names(self.function)
            .first()
            .is_some_and(|first| first == "self")
    }

    /// Attribute names accessed as `self.<attr>` in the method, deduplicated
    /// in first-seen order.
    pub fn self_references(&self) -> &[String] {
        self.self_references
            .get_or_init(|| self.collect_self_references(None))
    }

    /// Like [`self_references`](Self::self_references), restricted to
    /// accesses starting on lines `[lo, hi]`.
    pub fn self_references_in_range(&self, lo: u32, hi: u32) -> Vec<String> {
        self.collect_self_references(Some((lo, hi)))
    }

    /// True when the method touches any `self` attribute.
    pub fn needs_self_parameter(&self) -> bool {
        !self.self_references().is_empty()
    }

    /// Attributes assigned as `self.<attr> = ...` (or annotated) in the
    /// class's `__init__`.
    pub fn init_instance_variables(&self) -> Vec<String> {
        if self.module.name_of(self.function) == Some("__init__") {
            return self.assigned_self_attributes();
        }
        match InstanceVariableTracker::new(self.module, &self.class_name, "__init__") {
            Ok(init) => init.init_instance_variables(),
            Err(_) => Vec::new(),
        }
    }

    fn collect_self_references(&self, range: Option<(u32, u32)>) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let Some(body) = self.function.child_by_field_name("body") else {
            return names;
        };
        walk(body, &mut |node: Node<'m>| {
            if node.kind() != "attribute" {
                return VisitResult::Continue;
            }
            let in_range = range.is_none_or(|(lo, hi)| {
                let line = line_of(node);
                lo <= line && line <= hi
            });
            if in_range {
                if let Some(attr) = self_attribute(self.module, node) {
                    if !names.iter().any(|n| n == attr) {
                        names.push(attr.to_string());
                    }
                }
            }
            VisitResult::Continue
        });
        names
    }

    fn assigned_self_attributes(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let Some(body) = self.function.child_by_field_name("body") else {
            return names;
        };
        walk(body, &mut |node: Node<'m>| {
            if is_scope_boundary(node) {
                return VisitResult::SkipChildren;
            }
            if node.kind() == "assignment" {
                if let Some(attr) = node
                    .child_by_field_name("left")
                    .and_then(|left| self_attribute(self.module, left))
                {
                    if !names.iter().any(|n| n == attr) {
                        names.push(attr.to_string());
                    }
                }
            }
            VisitResult::Continue
        });
        names
    }
}

/// `attr` when `node` is exactly `self.attr`.
pub fn self_attribute<'a>(module: &'a PythonModule, node: Node<'_>) -> Option<&'a str> {
    if node.kind() != "attribute" {
        return None;
    }
    let object = node.child_by_field_name("object")?;
    if object.kind() != "identifier" || module.text_of(object) != "self" {
        return None;
    }
    node.child_by_field_name("attribute")
        .map(|attr| module.text_of(attr))
}
