// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Decorator inspection and re-rendering.

use tree_sitter::Node;

use molt_core::text::{dedent, detect_indentation, reindent};

use crate::cst::{decorators, definition_statement, named_children, PythonModule};

/// Decorators that change how a method is bound or exposed and must travel
/// with it when it is moved or duplicated.
pub const PRESERVABLE: &[&str] = &["property", "staticmethod", "classmethod"];

/// Reads and re-renders the decorators of definitions in one module.
#[derive(Debug, Clone, Copy)]
pub struct DecoratorHandler<'m> {
    module: &'m PythonModule,
}

impl<'m> DecoratorHandler<'m> {
    pub fn new(module: &'m PythonModule) -> Self {
        DecoratorHandler { module }
    }

    /// The final name segment a decorator refers to.
    ///
    /// `@property` gives `property`, `@functools.cache` gives `cache`,
    /// `@app.route("/")` gives `route`.
    pub fn terminal_name(&self, decorator: Node<'_>) -> Option<&'m str> {
        let expression = named_children(decorator)
            .into_iter()
            .find(|n| n.kind() != "comment")?;
        self.expression_terminal(expression)
    }

    fn expression_terminal(&self, expression: Node<'_>) -> Option<&'m str> {
        match expression.kind() {
            "identifier" => Some(self.module.text_of(expression)),
            "attribute" => expression
                .child_by_field_name("attribute")
                .map(|attr| self.module.text_of(attr)),
            "call" => expression
                .child_by_field_name("function")
                .and_then(|function| match function.kind() {
                    "identifier" | "attribute" => self.expression_terminal(function),
                    _ => None,
                }),
            _ => None,
        }
    }

    /// True if any decorator of `definition` has one of `names` as its
    /// terminal name.
    pub fn has_any(&self, definition: Node<'_>, names: &[&str]) -> bool {
        decorators(definition)
            .into_iter()
            .any(|d| self.terminal_name(d).is_some_and(|name| names.contains(&name)))
    }

    /// Source text (with `@`) of the decorators in [`PRESERVABLE`], in
    /// their original order.
    pub fn preservable(&self, definition: Node<'_>) -> Vec<String> {
        decorators(definition)
            .into_iter()
            .filter(|d| {
                self.terminal_name(*d)
                    .is_some_and(|name| PRESERVABLE.contains(&name))
            })
            .map(|d| self.module.text_of(d).to_string())
            .collect()
    }

    /// The full-line text of a definition with its decorators left out.
    ///
    /// The first line keeps the indentation the `def` had in the source.
    pub fn create_undecorated_method(&self, definition: Node<'_>) -> String {
        let source = self.module.source();
        let statement = definition_statement(definition);
        let indent = detect_indentation(source, statement.start_byte());
        let mut text = format!("{}{}", indent, self.module.text_of(definition));
        if !text.ends_with('\n') {
            text.push('\n');
        }
        text
    }
}

/// Put `decorators` on their own lines above `definition_text` and indent
/// the whole block to `indent`.
///
/// Decorators may be given with or without their leading `@`.
pub fn apply_decorators(decorators: &[String], definition_text: &str, indent: &str) -> String {
    let mut block = String::new();
    for decorator in decorators {
        block.push('@');
        block.push_str(decorator.trim().trim_start_matches('@'));
        block.push('\n');
    }
    let body = dedent(definition_text);
    block.push_str(&body);
    if !block.ends_with('\n') {
        block.push('\n');
    }
    reindent(&block, indent)
}
