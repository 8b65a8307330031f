// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Concrete syntax tree wrapper over tree-sitter-python.
//!
//! A [`PythonModule`] owns a source text and its parse tree. The tree is
//! never mutated: refactorings read positions from it and express their
//! changes as span edits against the original text (see
//! [`molt_core::edit::BatchSpanEditor`]). Bytes outside the edited spans are
//! copied through unchanged, so an untouched module re-serializes to exactly
//! its input.
//!
//! This module also defines the traversal protocol used by every analysis
//! and transformer pass: a [`Visitor`] receives `enter`/`leave` callbacks for
//! each named node, driven by [`walk`].

use thiserror::Error;
use tree_sitter::{Node, Parser, Tree};

use molt_core::error::{MoltError, MoltResult};
use molt_core::patch::Span;
use molt_core::text::line_start_offset;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while building a syntax tree.
#[derive(Debug, Error)]
pub enum CstError {
    /// The grammar could not be loaded into the parser.
    #[error("failed to load Python grammar: {message}")]
    Language { message: String },

    /// The parser gave up without producing a tree.
    #[error("parser produced no tree")]
    NoTree,

    /// The source contains a syntax error.
    #[error("invalid syntax at line {line}, column {column}")]
    Syntax { line: u32, column: u32 },
}

/// Result type for syntax tree operations.
pub type CstResult<T> = Result<T, CstError>;

impl From<CstError> for MoltError {
    fn from(err: CstError) -> Self {
        match err {
            CstError::Syntax { line, .. } => MoltError::parse("<source>", line, err.to_string()),
            CstError::NoTree => MoltError::parse("<source>", 0, err.to_string()),
            CstError::Language { .. } => MoltError::internal(err.to_string()),
        }
    }
}

// ============================================================================
// Module
// ============================================================================

/// A parsed Python source file.
pub struct PythonModule {
    source: String,
    tree: Tree,
}

impl std::fmt::Debug for PythonModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PythonModule")
            .field("len", &self.source.len())
            .finish()
    }
}

impl PythonModule {
    /// Parse Python source text.
    ///
    /// A tree that contains any error or missing node is rejected with the
    /// position of the first one.
    pub fn parse(source: impl Into<String>) -> CstResult<Self> {
        let source = source.into();
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| CstError::Language {
                message: e.to_string(),
            })?;
        let tree = parser.parse(&source, None).ok_or(CstError::NoTree)?;

        let root = tree.root_node();
        if root.has_error() {
            let bad = first_error_node(root).unwrap_or(root);
            return Err(CstError::Syntax {
                line: line_of(bad),
                column: column_of(bad),
            });
        }

        Ok(PythonModule { source, tree })
    }

    /// The source text the tree was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Root `module` node.
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Source text covered by a node.
    pub fn text_of(&self, node: Node<'_>) -> &str {
        &self.source[node.byte_range()]
    }

    /// Name of a class or function definition.
    pub fn name_of(&self, definition: Node<'_>) -> Option<&str> {
        definition
            .child_by_field_name("name")
            .map(|n| self.text_of(n))
    }

    /// Top-level statements of the module (comments excluded).
    pub fn statements(&self) -> Vec<Node<'_>> {
        block_statements(self.root())
    }

    /// Find a class defined at module level.
    pub fn find_class(&self, name: &str) -> Option<Node<'_>> {
        self.statements()
            .into_iter()
            .filter_map(unwrap_definition)
            .find(|def| def.kind() == "class_definition" && self.name_of(*def) == Some(name))
    }

    /// Find a function by its exact container.
    ///
    /// With `class_name == None` only module-level functions are considered;
    /// otherwise only methods defined directly in that module-level class.
    pub fn find_function(&self, class_name: Option<&str>, name: &str) -> Option<Node<'_>> {
        let candidates = match class_name {
            None => self
                .statements()
                .into_iter()
                .filter_map(unwrap_definition)
                .collect(),
            Some(class_name) => class_methods(self.find_class(class_name)?),
        };
        candidates
            .into_iter()
            .find(|def| def.kind() == "function_definition" && self.name_of(*def) == Some(name))
    }

    /// Like [`find_class`](Self::find_class), failing with `NotFound`.
    pub fn require_class(&self, name: &str) -> MoltResult<Node<'_>> {
        self.find_class(name)
            .ok_or_else(|| MoltError::not_found("class", name))
    }

    /// Like [`find_function`](Self::find_function), failing with `NotFound`.
    pub fn require_function(&self, class_name: Option<&str>, name: &str) -> MoltResult<Node<'_>> {
        self.find_function(class_name, name).ok_or_else(|| match class_name {
            Some(class_name) => {
                if self.find_class(class_name).is_none() {
                    MoltError::not_found("class", class_name)
                } else {
                    MoltError::not_found("method", format!("{}::{}", class_name, name))
                }
            }
            None => MoltError::not_found("function", name),
        })
    }

    /// Parameter names of a function definition, in declaration order.
    pub fn parameter_names(&self, function: Node<'_>) -> Vec<String> {
        parameter_nodes(function)
            .into_iter()
            .filter_map(parameter_identifier)
            .map(|id| self.text_of(id).to_string())
            .collect()
    }

    /// Source text of each decorator (including `@`), outermost first.
    pub fn decorator_texts(&self, definition: Node<'_>) -> Vec<String> {
        decorators(definition)
            .into_iter()
            .map(|d| self.text_of(d).to_string())
            .collect()
    }

    /// The identifier starting exactly at `(line, column)`.
    ///
    /// `line` is 1-indexed, `column` is a 0-indexed byte column.
    pub fn identifier_at(&self, line: u32, column: u32) -> Option<Node<'_>> {
        let offset = line_start_offset(&self.source, line)? + column as usize;
        if offset >= self.source.len() {
            return None;
        }
        let node = self
            .root()
            .named_descendant_for_byte_range(offset, offset + 1)?;
        (node.kind() == "identifier" && node.start_byte() == offset).then_some(node)
    }
}

// ============================================================================
// Position Metadata
// ============================================================================

/// 1-indexed line where a node starts.
pub fn line_of(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

/// 1-indexed line where a node ends.
pub fn end_line_of(node: Node<'_>) -> u32 {
    node.end_position().row as u32 + 1
}

/// 0-indexed byte column where a node starts.
pub fn column_of(node: Node<'_>) -> u32 {
    node.start_position().column as u32
}

/// Byte span of a node.
pub fn span_of(node: Node<'_>) -> Span {
    Span::new(node.start_byte(), node.end_byte())
}

fn first_error_node<'t>(root: Node<'t>) -> Option<Node<'t>> {
    let mut found = None;
    walk(root, &mut |node: Node<'t>| {
        if node.is_error() || node.is_missing() {
            found = Some(node);
            VisitResult::Stop
        } else if node.has_error() {
            VisitResult::Continue
        } else {
            VisitResult::SkipChildren
        }
    });
    found.map(innermost_error)
}

/// Narrow an `ERROR` node to the token where parsing went wrong.
///
/// Error recovery often folds earlier, well-formed statements into one
/// `ERROR` node that starts far above the real problem. Those statements are
/// skipped; the first remaining child is followed down.
fn innermost_error(node: Node<'_>) -> Node<'_> {
    let mut current = node;
    loop {
        if current.is_missing() {
            return current;
        }
        let Some(child) = all_children(current)
            .into_iter()
            .find(|child| !is_complete_statement(*child))
        else {
            return current;
        };
        if child.is_error() || child.is_missing() {
            current = child;
        } else if child.has_error() {
            match first_error_below(child) {
                Some(inner) => current = inner,
                None => return child,
            }
        } else {
            return child;
        }
    }
}

fn first_error_below(node: Node<'_>) -> Option<Node<'_>> {
    for child in all_children(node) {
        if child.is_error() || child.is_missing() {
            return Some(child);
        }
        if child.has_error() {
            return first_error_below(child).or(Some(child));
        }
    }
    None
}

fn all_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

fn is_complete_statement(node: Node<'_>) -> bool {
    if !node.is_named() || node.has_error() {
        return false;
    }
    let kind = node.kind();
    kind == "comment"
        || kind == "decorated_definition"
        || kind.ends_with("_statement")
        || kind.ends_with("_definition")
}

// ============================================================================
// Structural Helpers
// ============================================================================

/// Named children of a node.
pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// Statements of a `block` or `module`, comments excluded.
pub fn block_statements(block: Node<'_>) -> Vec<Node<'_>> {
    named_children(block)
        .into_iter()
        .filter(|n| n.kind() != "comment")
        .collect()
}

/// Body statements of a function or class definition.
pub fn body_statements(definition: Node<'_>) -> Vec<Node<'_>> {
    definition
        .child_by_field_name("body")
        .map(block_statements)
        .unwrap_or_default()
}

/// The class or function definition a statement declares, looking through
/// decorators.
pub fn unwrap_definition(statement: Node<'_>) -> Option<Node<'_>> {
    match statement.kind() {
        "function_definition" | "class_definition" => Some(statement),
        "decorated_definition" => statement
            .child_by_field_name("definition")
            .and_then(unwrap_definition),
        _ => None,
    }
}

/// The statement that holds a definition: its `decorated_definition`
/// wrapper when decorated, otherwise the definition itself.
pub fn definition_statement(definition: Node<'_>) -> Node<'_> {
    match definition.parent() {
        Some(parent) if parent.kind() == "decorated_definition" => parent,
        _ => definition,
    }
}

/// The module-level statement that contains `node`.
pub fn top_level_statement(node: Node<'_>) -> Node<'_> {
    let mut current = node;
    while let Some(parent) = current.parent() {
        if parent.kind() == "module" {
            break;
        }
        current = parent;
    }
    current
}

/// Decorator nodes of a definition, outermost first.
pub fn decorators(definition: Node<'_>) -> Vec<Node<'_>> {
    match definition.parent() {
        Some(parent) if parent.kind() == "decorated_definition" => named_children(parent)
            .into_iter()
            .filter(|n| n.kind() == "decorator")
            .collect(),
        _ => Vec::new(),
    }
}

/// Function definitions directly inside a class body (decorated or not).
pub fn class_methods(class: Node<'_>) -> Vec<Node<'_>> {
    body_statements(class)
        .into_iter()
        .filter_map(unwrap_definition)
        .filter(|def| def.kind() == "function_definition")
        .collect()
}

/// Parameter nodes of a function or lambda, separators excluded.
pub fn parameter_nodes(function: Node<'_>) -> Vec<Node<'_>> {
    function
        .child_by_field_name("parameters")
        .map(named_children)
        .unwrap_or_default()
        .into_iter()
        .filter(|n| !matches!(n.kind(), "comment" | "keyword_separator" | "positional_separator"))
        .collect()
}

/// The identifier a parameter binds.
pub fn parameter_identifier(parameter: Node<'_>) -> Option<Node<'_>> {
    match parameter.kind() {
        "identifier" => Some(parameter),
        "default_parameter" | "typed_default_parameter" => {
            parameter.child_by_field_name("name")
        }
        "typed_parameter" | "list_splat_pattern" | "dictionary_splat_pattern" => {
            named_children(parameter)
                .into_iter()
                .find_map(parameter_identifier)
        }
        _ => None,
    }
}

/// True for nodes that open a new Python scope.
pub fn is_scope_boundary(node: Node<'_>) -> bool {
    matches!(
        node.kind(),
        "function_definition" | "class_definition" | "lambda"
    )
}

// ============================================================================
// Traversal Protocol
// ============================================================================

/// What a visitor wants after entering a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitResult {
    /// Visit the node's children.
    Continue,
    /// Do not visit the node's children; `leave` is still called.
    SkipChildren,
    /// Abort the walk immediately; no further callbacks.
    Stop,
}

/// Callbacks for a depth-first walk over named nodes.
pub trait Visitor<'tree> {
    /// Called before a node's children are visited.
    fn enter(&mut self, _node: Node<'tree>) -> VisitResult {
        VisitResult::Continue
    }

    /// Called after a node's children were visited.
    fn leave(&mut self, _node: Node<'tree>) {}
}

impl<'tree, F> Visitor<'tree> for F
where
    F: FnMut(Node<'tree>) -> VisitResult,
{
    fn enter(&mut self, node: Node<'tree>) -> VisitResult {
        self(node)
    }
}

/// Walk the named nodes under `root` (inclusive) in source order.
///
/// Returns `false` if the visitor stopped the walk.
pub fn walk<'tree, V>(root: Node<'tree>, visitor: &mut V) -> bool
where
    V: Visitor<'tree> + ?Sized,
{
    let mut cursor = root.walk();
    let mut depth = 0usize;

    loop {
        let node = cursor.node();
        let descend = if node.is_named() {
            match visitor.enter(node) {
                VisitResult::Continue => true,
                VisitResult::SkipChildren => false,
                VisitResult::Stop => return false,
            }
        } else {
            false
        };

        if descend && cursor.goto_first_child() {
            depth += 1;
            continue;
        }

        if node.is_named() {
            visitor.leave(node);
        }

        loop {
            if depth == 0 {
                return true;
            }
            if cursor.goto_next_sibling() {
                break;
            }
            cursor.goto_parent();
            depth -= 1;
            let parent = cursor.node();
            if parent.is_named() {
                visitor.leave(parent);
            }
        }
    }
}

/// Tracks the enclosing class/function path during a walk.
///
/// Call [`enter`](ScopeTracker::enter) and [`leave`](ScopeTracker::leave)
/// from the corresponding visitor hooks.
#[derive(Debug, Default)]
pub struct ScopeTracker {
    stack: Vec<(ScopeKind, String)>,
}

/// Kind of a scope on the [`ScopeTracker`] stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Class,
    Function,
}

impl ScopeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a scope if `node` is a class or function definition.
    pub fn enter(&mut self, module: &PythonModule, node: Node<'_>) {
        let kind = match node.kind() {
            "class_definition" => ScopeKind::Class,
            "function_definition" => ScopeKind::Function,
            _ => return,
        };
        let name = module.name_of(node).unwrap_or_default().to_string();
        self.stack.push((kind, name));
    }

    /// Pop the scope opened by `node`, if any.
    pub fn leave(&mut self, node: Node<'_>) {
        if matches!(node.kind(), "class_definition" | "function_definition") {
            self.stack.pop();
        }
    }

    /// Number of open scopes.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Name of the innermost enclosing class, if it is the innermost scope
    /// or directly encloses the innermost function.
    pub fn current_class(&self) -> Option<&str> {
        match self.stack.as_slice() {
            [.., (ScopeKind::Class, name)] => Some(name),
            [.., (ScopeKind::Class, name), (ScopeKind::Function, _)] => Some(name),
            _ => None,
        }
    }

    /// Name of the innermost enclosing function.
    pub fn current_function(&self) -> Option<&str> {
        match self.stack.last() {
            Some((ScopeKind::Function, name)) => Some(name),
            _ => None,
        }
    }

    /// Dotted path of open scopes, e.g. `Order.total`.
    pub fn path(&self) -> String {
        self.stack
            .iter()
            .map(|(_, name)| name.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }
}

// ============================================================================
// Tests
// ============================================================================
