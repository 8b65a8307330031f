//! Span edits applied to the original text of one module.
//!
//! A refactoring never mutates source text directly. It queues
//! [`EditPrimitive`]s whose offsets all refer to the untouched input, and a
//! [`BatchSpanEditor`] splices them in from the end of the file toward the
//! start. Bytes outside the edited ranges come through unchanged, so
//! comments and hand formatting elsewhere in the file survive.
//!
//! ```
//! use molt_core::edit::{BatchSpanEditor, EditPrimitive};
//! use molt_core::patch::Span;
//!
//! let mut editor = BatchSpanEditor::new("total = price * 1.2\n");
//! editor.add(EditPrimitive::Replace {
//!     span: Span::new(16, 19),
//!     new_text: "TAX_RATE".to_string(),
//! });
//! editor.add(EditPrimitive::InsertAt {
//!     position: 0,
//!     text: "TAX_RATE = 1.2\n".to_string(),
//! });
//! assert_eq!(
//!     editor.apply().unwrap(),
//!     "TAX_RATE = 1.2\ntotal = price * TAX_RATE\n"
//! );
//! ```

use std::cmp::Reverse;

use thiserror::Error;
use tracing::trace;

use crate::error::MoltError;
use crate::patch::Span;

/// One queued change to the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditPrimitive {
    /// Swap the bytes of `span` for `new_text`.
    Replace { span: Span, new_text: String },
    /// Remove the bytes of `span`.
    Delete { span: Span },
    /// Splice `text` in at a byte offset without removing anything.
    InsertAt { position: usize, text: String },
}

impl EditPrimitive {
    /// The range of original bytes this edit consumes. Insertions are
    /// zero-width.
    pub fn range(&self) -> Span {
        match self {
            EditPrimitive::Replace { span, .. } | EditPrimitive::Delete { span } => *span,
            EditPrimitive::InsertAt { position, .. } => Span {
                start: *position,
                end: *position,
            },
        }
    }

    fn replacement(&self) -> &str {
        match self {
            EditPrimitive::Replace { new_text, .. } => new_text,
            EditPrimitive::Delete { .. } => "",
            EditPrimitive::InsertAt { text, .. } => text,
        }
    }

    fn is_insert(&self) -> bool {
        matches!(self, EditPrimitive::InsertAt { .. })
    }
}

/// Reasons a batch cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchEditError {
    #[error("edits at {first} and {second} touch the same text")]
    OverlappingEdits { first: Span, second: Span },

    #[error("edit at {span} falls outside a {source_len}-byte source")]
    SpanOutOfBounds { span: Span, source_len: usize },

    #[error("no edits were queued")]
    EmptyEdits,
}

impl From<BatchEditError> for MoltError {
    fn from(err: BatchEditError) -> Self {
        MoltError::internal(err.to_string())
    }
}

/// Knobs for [`BatchSpanEditor`].
#[derive(Debug, Clone)]
pub struct BatchEditOptions {
    /// Edits that share only an endpoint may coexist. On by default.
    pub allow_adjacent: bool,
    /// An empty batch yields the source unchanged instead of an error.
    pub allow_empty: bool,
}

impl Default for BatchEditOptions {
    fn default() -> Self {
        Self {
            allow_adjacent: true,
            allow_empty: false,
        }
    }
}

/// Collects edits against one source string and applies them together.
///
/// Several insertions at the same offset land in the order they were queued.
pub struct BatchSpanEditor<'src> {
    source: &'src str,
    edits: Vec<EditPrimitive>,
    options: BatchEditOptions,
}

impl<'src> BatchSpanEditor<'src> {
    pub fn new(source: &'src str) -> Self {
        Self::with_options(source, BatchEditOptions::default())
    }

    pub fn with_options(source: &'src str, options: BatchEditOptions) -> Self {
        Self {
            source,
            edits: Vec::new(),
            options,
        }
    }

    pub fn add(&mut self, edit: EditPrimitive) {
        self.edits.push(edit);
    }

    pub fn add_all(&mut self, edits: impl IntoIterator<Item = EditPrimitive>) {
        self.edits.extend(edits);
    }

    /// Validate the whole batch, then produce the edited text.
    ///
    /// Nothing is applied unless every edit is in bounds, on a character
    /// boundary, and clear of every other edit.
    pub fn apply(self) -> Result<String, BatchEditError> {
        if self.edits.is_empty() {
            if self.options.allow_empty {
                return Ok(self.source.to_string());
            }
            return Err(BatchEditError::EmptyEdits);
        }

        let source_len = self.source.len();
        if let Some(span) = self
            .edits
            .iter()
            .map(EditPrimitive::range)
            .find(|span| !self.in_bounds(span))
        {
            return Err(BatchEditError::SpanOutOfBounds { span, source_len });
        }

        // Back to front. At one offset the consuming edit goes first, then
        // inserts in reverse queue order so they read forward in the output.
        let mut order: Vec<(usize, &EditPrimitive)> = self.edits.iter().enumerate().collect();
        order.sort_by_key(|(index, edit)| {
            (Reverse(edit.range().start), edit.is_insert(), Reverse(*index))
        });

        for pair in order.windows(2) {
            let later = pair[0].1.range();
            let earlier = pair[1].1.range();
            if self.collide(&earlier, &later) {
                return Err(BatchEditError::OverlappingEdits {
                    first: earlier,
                    second: later,
                });
            }
        }

        trace!(edits = order.len(), source_len, "splicing edits");
        let mut text = self.source.to_string();
        for (_, edit) in order {
            let range = edit.range();
            text.replace_range(range.start..range.end, edit.replacement());
        }
        Ok(text)
    }

    fn in_bounds(&self, span: &Span) -> bool {
        span.end <= self.source.len()
            && self.source.is_char_boundary(span.start)
            && self.source.is_char_boundary(span.end)
    }

    fn collide(&self, earlier: &Span, later: &Span) -> bool {
        if self.options.allow_adjacent {
            earlier.start < later.end && later.start < earlier.end
        } else {
            let both_points = earlier.start == earlier.end && later.start == later.end;
            earlier.start <= later.end && later.start <= earlier.end && !both_points
        }
    }
}
