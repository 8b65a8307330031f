// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! The two-pass rewrite protocol.
//!
//! Every refactoring works in two passes over one parsed module:
//!
//! 1. **Analyze**: read-only analysis structs are built from the tree.
//! 2. **Transform**: a [`Transformer`] built from that analysis walks the
//!    tree again and queues [`EditPrimitive`]s on a [`Rewrite`], usually from
//!    its `leave` hooks. New declarations are appended from the `leave` hook
//!    of their container.
//!
//! [`Rewrite::finish`] applies the queued edits with the batch span editor
//! and re-parses the result. Bytes outside the edited spans are copied
//! verbatim, so an empty rewrite returns the input unchanged.
//!
//! The layout helpers below compute whole-line spans and indentation so that
//! inserted and removed blocks keep the surrounding formatting intact.

use std::collections::HashMap;

use tracing::debug;
use tree_sitter::Node;

use molt_core::edit::{BatchEditOptions, BatchSpanEditor, EditPrimitive};
use molt_core::error::{MoltError, MoltResult};
use molt_core::patch::Span;
use molt_core::text::{detect_indentation, full_line_span, indent_one_level, line_start};

use crate::cst::{
    block_statements, definition_statement, line_of, span_of, walk, PythonModule, VisitResult,
    Visitor,
};

// ============================================================================
// Rewrite
// ============================================================================

/// Edits queued against one module.
pub struct Rewrite<'m> {
    module: &'m PythonModule,
    edits: Vec<EditPrimitive>,
}

impl<'m> Rewrite<'m> {
    pub fn new(module: &'m PythonModule) -> Self {
        Rewrite {
            module,
            edits: Vec::new(),
        }
    }

    /// The module the edits apply to.
    pub fn module(&self) -> &'m PythonModule {
        self.module
    }

    pub fn push(&mut self, edit: EditPrimitive) {
        self.edits.push(edit);
    }

    pub fn extend(&mut self, edits: impl IntoIterator<Item = EditPrimitive>) {
        self.edits.extend(edits);
    }

    /// Replace the text of `node`.
    pub fn replace(&mut self, node: Node<'_>, new_text: impl Into<String>) {
        self.push(EditPrimitive::Replace {
            span: span_of(node),
            new_text: new_text.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Apply the queued edits and return the new source text.
    ///
    /// The output must still parse; if it does not, the rewrite is a bug
    /// and an internal error is returned instead.
    pub fn finish(self) -> MoltResult<String> {
        let source = self.module.source();
        if self.edits.is_empty() {
            return Ok(source.to_string());
        }
        let count = self.edits.len();
        let mut editor = BatchSpanEditor::with_options(
            source,
            BatchEditOptions {
                allow_empty: true,
                ..Default::default()
            },
        );
        editor.add_all(self.edits);
        let output = editor.apply()?;
        if let Err(err) = PythonModule::parse(output.as_str()) {
            return Err(MoltError::internal(format!(
                "rewritten source no longer parses: {}",
                err
            )));
        }
        debug!(edits = count, before = source.len(), after = output.len(), "rewrite applied");
        Ok(output)
    }
}

// ============================================================================
// Transformer
// ============================================================================

/// Second-pass visitor that turns analysis results into edits.
pub trait Transformer<'m> {
    fn enter(&mut self, _node: Node<'m>, _rewrite: &mut Rewrite<'m>) -> VisitResult {
        VisitResult::Continue
    }

    fn leave(&mut self, _node: Node<'m>, _rewrite: &mut Rewrite<'m>) {}
}

struct Driver<'t, 'm, T: ?Sized> {
    transformer: &'t mut T,
    rewrite: Rewrite<'m>,
}

impl<'m, T> Visitor<'m> for Driver<'_, 'm, T>
where
    T: Transformer<'m> + ?Sized,
{
    fn enter(&mut self, node: Node<'m>) -> VisitResult {
        self.transformer.enter(node, &mut self.rewrite)
    }

    fn leave(&mut self, node: Node<'m>) {
        self.transformer.leave(node, &mut self.rewrite);
    }
}

/// Transformer that replaces nodes chosen by an earlier analysis pass.
///
/// A replaced node's children are not visited.
#[derive(Debug, Default)]
pub struct NodeReplacements {
    replacements: HashMap<usize, String>,
}

impl NodeReplacements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `node` with `text`. A later call for the same node wins.
    pub fn insert(&mut self, node: Node<'_>, text: impl Into<String>) {
        self.replacements.insert(node.id(), text.into());
    }

    pub fn len(&self) -> usize {
        self.replacements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }
}

impl<'m> Transformer<'m> for NodeReplacements {
    fn enter(&mut self, node: Node<'m>, rewrite: &mut Rewrite<'m>) -> VisitResult {
        match self.replacements.get(&node.id()) {
            Some(text) => {
                rewrite.replace(node, text.clone());
                VisitResult::SkipChildren
            }
            None => VisitResult::Continue,
        }
    }
}

/// Walk `module` with `transformer` and return the queued edits.
pub fn collect_edits<'m, T>(module: &'m PythonModule, transformer: &mut T) -> Rewrite<'m>
where
    T: Transformer<'m> + ?Sized,
{
    let mut driver = Driver {
        transformer,
        rewrite: Rewrite::new(module),
    };
    walk(module.root(), &mut driver);
    driver.rewrite
}

/// Walk `module` with `transformer` and apply the resulting edits.
pub fn transform<'m, T>(module: &'m PythonModule, transformer: &mut T) -> MoltResult<String>
where
    T: Transformer<'m> + ?Sized,
{
    collect_edits(module, transformer).finish()
}

// ============================================================================
// Layout Helpers
// ============================================================================

/// Leading whitespace of the line a node starts on.
pub fn line_indent<'m>(module: &'m PythonModule, node: Node<'_>) -> &'m str {
    detect_indentation(module.source(), line_start(module.source(), node.start_byte()))
}

/// Indentation of the statements in a definition's body.
///
/// Falls back to one level deeper than the definition for one-line bodies
/// such as `def f(): pass`.
pub fn body_indent(module: &PythonModule, definition: Node<'_>) -> String {
    let body = definition
        .child_by_field_name("body")
        .map(block_statements)
        .unwrap_or_default();
    match body.first() {
        Some(first) if line_of(*first) > line_of(definition) => line_indent(module, *first).to_string(),
        _ => indent_one_level(line_indent(module, definition)),
    }
}

/// The whole lines a node occupies, including the final newline.
pub fn statement_lines(module: &PythonModule, node: Node<'_>) -> Span {
    full_line_span(module.source(), span_of(node))
}

/// True if the definition's body is exactly one `pass` statement.
pub fn is_lone_pass(definition: Node<'_>) -> bool {
    let body = definition
        .child_by_field_name("body")
        .map(block_statements)
        .unwrap_or_default();
    matches!(body.as_slice(), [only] if only.kind() == "pass_statement")
}

fn is_blank_line(line: &str) -> bool {
    line.trim().is_empty()
}

/// Extend `start` backwards over blank lines.
fn absorb_blank_lines_before(source: &str, mut start: usize) -> usize {
    while start > 0 {
        let prev_start = line_start(source, start - 1);
        if !is_blank_line(&source[prev_start..start]) {
            break;
        }
        start = prev_start;
    }
    start
}

/// Extend `end` forwards over blank lines.
fn absorb_blank_lines_after(source: &str, mut end: usize) -> usize {
    while end < source.len() {
        let next_end = source[end..]
            .find('\n')
            .map(|i| end + i + 1)
            .unwrap_or(source.len());
        if !is_blank_line(&source[end..next_end]) {
            break;
        }
        end = next_end;
    }
    end
}

/// Edits that remove `statements` from the body of `owner` (a class or
/// function definition). Decorated definitions are removed together with
/// their decorators.
///
/// Each statement is removed with its whole lines and the blank lines that
/// separate it from its neighbour. If nothing would remain in the body, the
/// statements are replaced by a single `pass`.
pub fn remove_statements(
    module: &PythonModule,
    owner: Node<'_>,
    statements: &[Node<'_>],
) -> Vec<EditPrimitive> {
    let source = module.source();
    let body = owner
        .child_by_field_name("body")
        .map(block_statements)
        .unwrap_or_default();
    let removed = |node: &Node<'_>| {
        statements
            .iter()
            .any(|s| definition_statement(*s).id() == node.id())
    };

    if !body.is_empty() && body.iter().all(removed) {
        let (Some(first), Some(last)) = (body.first(), body.last()) else {
            return Vec::new();
        };
        let span = Span::new(
            statement_lines(module, *first).start,
            statement_lines(module, *last).end,
        );
        let indent = body_indent(module, owner);
        return vec![EditPrimitive::Replace {
            span,
            new_text: format!("{}pass\n", indent),
        }];
    }

    // Consecutive removed statements are deleted as one run so the blank
    // lines between them go too.
    let mut edits = Vec::new();
    let mut index = 0;
    while index < body.len() {
        if !removed(&body[index]) {
            index += 1;
            continue;
        }
        let first = index;
        while index + 1 < body.len() && removed(&body[index + 1]) {
            index += 1;
        }
        let start = statement_lines(module, body[first]).start;
        let end = statement_lines(module, body[index]).end;
        let span = if first > 0 {
            Span::new(absorb_blank_lines_before(source, start), end)
        } else {
            Span::new(start, absorb_blank_lines_after(source, end))
        };
        edits.push(EditPrimitive::Delete { span });
        index += 1;
    }
    edits
}

/// Whole-line text of a statement, including its final newline.
pub fn statement_text<'m>(module: &'m PythonModule, statement: Node<'_>) -> &'m str {
    let lines = statement_lines(module, statement);
    &module.source()[lines.start..lines.end]
}

/// Edit that appends `block` (full lines, already indented) to the body of
/// `owner`, separated by a blank line. A lone `pass` body is replaced.
pub fn append_to_body(module: &PythonModule, owner: Node<'_>, block: &str) -> EditPrimitive {
    let source = module.source();
    let body = owner
        .child_by_field_name("body")
        .map(block_statements)
        .unwrap_or_default();
    if is_lone_pass(owner) {
        if let Some(pass) = body.first() {
            if line_of(*pass) > line_of(owner) {
                return EditPrimitive::Replace {
                    span: statement_lines(module, *pass),
                    new_text: block.to_string(),
                };
            }
        }
    }
    let end = body
        .last()
        .map(|last| statement_lines(module, *last).end)
        .unwrap_or_else(|| statement_lines(module, owner).end);
    let separator = if source[..end].ends_with('\n') { "\n" } else { "\n\n" };
    EditPrimitive::InsertAt {
        position: end,
        text: format!("{}{}", separator, block),
    }
}

/// Edit that appends a top-level `block` to the end of the module, two
/// blank lines below the last statement.
pub fn append_to_module(module: &PythonModule, block: &str) -> EditPrimitive {
    let source = module.source();
    let trimmed = source.trim_end_matches(['\n', ' ', '\t', '\r']);
    let separator = if trimmed.is_empty() { "" } else { "\n\n\n" };
    EditPrimitive::Replace {
        span: Span::new(trimmed.len(), source.len()),
        new_text: format!("{}{}", separator, block),
    }
}

/// Edit that inserts `block` (full lines) directly above `statement`.
pub fn insert_before_statement(
    module: &PythonModule,
    statement: Node<'_>,
    block: &str,
) -> EditPrimitive {
    EditPrimitive::InsertAt {
        position: statement_lines(module, statement).start,
        text: block.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod rewrite {
        use super::*;

        #[test]
        fn empty_rewrite_is_identity() {
            let source = "x = 1  # keep\n\n\ndef f():\n    return x\n";
            let module = PythonModule::parse(source).unwrap();
            assert_eq!(Rewrite::new(&module).finish().unwrap(), source);
        }

        #[test]
        fn invalid_output_is_internal_error() {
            let module = PythonModule::parse("x = 1\n").unwrap();
            let mut rewrite = Rewrite::new(&module);
            rewrite.push(EditPrimitive::InsertAt {
                position: 0,
                text: "def (\n".to_string(),
            });
            let err = rewrite.finish().unwrap_err();
            assert_eq!(err.error_code().code(), 10);
        }

        #[test]
        fn transformer_edits_from_leave_hooks() {
            struct Upper;
            impl<'m> Transformer<'m> for Upper {
                fn leave(&mut self, node: Node<'m>, rewrite: &mut Rewrite<'m>) {
                    if node.kind() == "identifier" {
                        let text = rewrite.module().text_of(node).to_uppercase();
                        rewrite.replace(node, text);
                    }
                }
            }
            let module = PythonModule::parse("a = b  # c\n").unwrap();
            assert_eq!(transform(&module, &mut Upper).unwrap(), "A = B  # c\n");
        }

        #[test]
        fn node_replacements_skip_replaced_subtrees() {
            let module = PythonModule::parse("total = f(a, b)\n").unwrap();
            let statement = module.statements()[0];
            let assignment = statement.named_child(0).unwrap();
            let call = assignment.child_by_field_name("right").unwrap();
            let mut replacements = NodeReplacements::new();
            replacements.insert(call, "g()");
            replacements.insert(call.child_by_field_name("function").unwrap(), "h");
            assert_eq!(replacements.len(), 2);
            assert_eq!(transform(&module, &mut replacements).unwrap(), "total = g()\n");
        }
    }

    mod layout {
        use super::*;

        const CLASS: &str = "\
class Box:
    def open(self):
        return 1

    def close(self):
        return 2

    def lock(self):
        return 3


class Empty:
    pass
";

        fn method<'m>(module: &'m PythonModule, name: &str) -> Node<'m> {
            module.find_function(Some("Box"), name).unwrap()
        }

        fn apply(module: &PythonModule, edits: Vec<EditPrimitive>) -> String {
            let mut rewrite = Rewrite::new(module);
            rewrite.extend(edits);
            rewrite.finish().unwrap()
        }

        #[test]
        fn remove_middle_statement_takes_its_blank_line() {
            let module = PythonModule::parse(CLASS).unwrap();
            let class = module.find_class("Box").unwrap();
            let edits = remove_statements(&module, class, &[method(&module, "close")]);
            let out = apply(&module, edits);
            assert!(out.starts_with(
                "class Box:\n    def open(self):\n        return 1\n\n    def lock(self):\n"
            ));
        }

        #[test]
        fn remove_first_statement_takes_following_blank_line() {
            let module = PythonModule::parse(CLASS).unwrap();
            let class = module.find_class("Box").unwrap();
            let edits = remove_statements(&module, class, &[method(&module, "open")]);
            let out = apply(&module, edits);
            assert!(out.starts_with("class Box:\n    def close(self):\n"));
        }

        #[test]
        fn removing_everything_leaves_pass() {
            let module = PythonModule::parse(CLASS).unwrap();
            let class = module.find_class("Box").unwrap();
            let all = [method(&module, "open"), method(&module, "close"), method(&module, "lock")];
            let out = apply(&module, remove_statements(&module, class, &all));
            assert!(out.starts_with("class Box:\n    pass\n\n\nclass Empty:"));
        }

        #[test]
        fn append_replaces_lone_pass() {
            let module = PythonModule::parse(CLASS).unwrap();
            let class = module.find_class("Empty").unwrap();
            let edit = append_to_body(&module, class, "    def f(self):\n        return 0\n");
            let out = apply(&module, vec![edit]);
            assert!(out.ends_with("class Empty:\n    def f(self):\n        return 0\n"));
        }

        #[test]
        fn append_after_last_statement() {
            let module = PythonModule::parse(CLASS).unwrap();
            let class = module.find_class("Box").unwrap();
            let edit = append_to_body(&module, class, "    def f(self):\n        return 0\n");
            let out = apply(&module, vec![edit]);
            assert!(out.contains("        return 3\n\n    def f(self):\n        return 0\n\n\nclass Empty:"));
        }

        #[test]
        fn body_indent_of_one_liner() {
            let module = PythonModule::parse("def f(): pass\n").unwrap();
            let function = module.find_function(None, "f").unwrap();
            assert_eq!(body_indent(&module, function), "    ");
            assert!(is_lone_pass(function));
        }

        #[test]
        fn append_to_module_uses_two_blank_lines() {
            let module = PythonModule::parse("x = 1\n\n").unwrap();
            let out = apply(&module, vec![append_to_module(&module, "def g():\n    pass\n")]);
            assert_eq!(out, "x = 1\n\n\ndef g():\n    pass\n");
        }
    }
}
