//! Text position and indentation utilities.
//!
//! ## Coordinate Conventions
//!
//! - Lines are **1-indexed** (matching editor conventions and target specs)
//! - Columns are **0-indexed byte offsets** within the line
//! - Byte offsets are **0-indexed**

use crate::patch::Span;

// ============================================================================
// Position Conversions
// ============================================================================

/// Convert a byte offset to a 1-indexed line and 0-indexed byte column.
///
/// If `offset` exceeds content length, returns the position at end of content.
pub fn byte_offset_to_position(content: &str, offset: usize) -> (u32, u32) {
    let offset = offset.min(content.len());
    let mut line = 1u32;
    let mut col = 0u32;

    for &byte in &content.as_bytes()[..offset] {
        if byte == b'\n' {
            line += 1;
            col = 0;
        } else {
            col += 1;
        }
    }

    (line, col)
}

/// Get the byte offset of the start of a 1-indexed line.
///
/// Returns `None` if the line does not exist.
pub fn line_start_offset(content: &str, line: u32) -> Option<usize> {
    if line == 0 {
        return None;
    }
    if line == 1 {
        return Some(0);
    }

    let mut current_line = 1u32;
    for (i, byte) in content.bytes().enumerate() {
        if byte == b'\n' {
            current_line += 1;
            if current_line == line {
                return Some(i + 1);
            }
        }
    }
    None
}

/// Count the number of lines in the content.
pub fn line_count(content: &str) -> u32 {
    let newlines = content.bytes().filter(|&b| b == b'\n').count() as u32;
    if content.is_empty() {
        0
    } else if content.ends_with('\n') {
        newlines
    } else {
        newlines + 1
    }
}

/// Byte offset of the start of the line containing `position`.
pub fn line_start(content: &str, position: usize) -> usize {
    let position = position.min(content.len());
    content[..position].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

/// Byte offset just past the newline that ends the line containing `position`.
///
/// Returns the content length when the line is the last one and has no
/// trailing newline.
pub fn line_end_inclusive(content: &str, position: usize) -> usize {
    let position = position.min(content.len());
    content[position..]
        .find('\n')
        .map(|i| position + i + 1)
        .unwrap_or(content.len())
}

/// Widen a span to whole lines: from the start of its first line to just past
/// the newline of its last line.
pub fn full_line_span(content: &str, span: Span) -> Span {
    let start = line_start(content, span.start);
    let end = line_end_inclusive(content, span.end.saturating_sub(1).max(span.start));
    Span::new(start, end)
}

// ============================================================================
// Indentation
// ============================================================================

/// Detect the indentation of the line containing `position`.
///
/// If that line is blank, the previous line's indentation is used.
pub fn detect_indentation(content: &str, position: usize) -> &str {
    if content.is_empty() || position > content.len() {
        return "";
    }

    let start = line_start(content, position);
    let line_end = content[start..]
        .find('\n')
        .map(|i| start + i)
        .unwrap_or(content.len());
    let line = &content[start..line_end];
    let indent_len = leading_whitespace_len(line);

    if indent_len > 0 || !line.trim().is_empty() {
        return &content[start..start + indent_len];
    }

    if start > 0 {
        let prev_start = line_start(content, start - 1);
        let prev = &content[prev_start..start - 1];
        let prev_len = leading_whitespace_len(prev);
        return &content[prev_start..prev_start + prev_len];
    }

    ""
}

/// One indentation level deeper than `indent`, matching its style.
pub fn indent_one_level(indent: &str) -> String {
    if indent.contains('\t') {
        format!("{}\t", indent)
    } else {
        format!("{}    ", indent)
    }
}

/// Remove the common leading whitespace of all non-blank lines.
pub fn dedent(text: &str) -> String {
    let common = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(leading_whitespace_len)
        .min()
        .unwrap_or(0);

    let mut result = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            result.push_str(line.trim_start_matches([' ', '\t']));
        } else {
            result.push_str(&line[common.min(line.len())..]);
        }
    }
    result
}

/// Prefix every non-blank line of `text` with `indent`.
pub fn indent_lines(text: &str, indent: &str) -> String {
    let mut result = String::with_capacity(text.len() + indent.len() * 4);
    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            result.push_str(line.trim_start_matches([' ', '\t']));
        } else {
            result.push_str(indent);
            result.push_str(line);
        }
    }
    result
}

/// Re-indent a block of text so its least indented line sits at `indent`.
pub fn reindent(text: &str, indent: &str) -> String {
    indent_lines(&dedent(text), indent)
}

fn leading_whitespace_len(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

// ============================================================================
// Identifier scanning
// ============================================================================

/// True if `name` occurs in `text` as a whole identifier (not as part of a
/// longer identifier).
pub fn contains_identifier(text: &str, name: &str) -> bool {
    find_identifier_occurrences(text, name).next().is_some()
}

/// Byte offsets of every whole-identifier occurrence of `name` in `text`.
pub fn find_identifier_occurrences<'a>(
    text: &'a str,
    name: &'a str,
) -> impl Iterator<Item = usize> + 'a {
    text.match_indices(name).filter_map(move |(i, _)| {
        let before = text[..i].chars().next_back();
        let after = text[i + name.len()..].chars().next();
        let is_ident = |c: char| c.is_alphanumeric() || c == '_';
        if before.is_some_and(is_ident) || after.is_some_and(is_ident) {
            None
        } else {
            Some(i)
        }
    })
}

// ============================================================================
// Tests
// ============================================================================
