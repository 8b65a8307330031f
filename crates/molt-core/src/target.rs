//! Target specifications: the mini-language naming the code element a
//! refactoring acts on.
//!
//! ```text
//! name(::name)*(#L<start>(-L?<end>)?)?
//! ```
//!
//! Examples: `add_numbers`, `Order::total`, `Order::total::temp`,
//! `Order::total#L12`, `compute#L9-L11`, `compute#L9-11`.
//!
//! Qualifiers are ordered outer to inner. The last qualifier is always the
//! leaf (function, method or variable); everything before it is the
//! containing path.

use std::fmt;

use serde::Serialize;

use crate::error::{MoltError, MoltResult};

const QUALIFIER_SEPARATOR: &str = "::";
const LINE_SEPARATOR: char = '#';
const LINE_PREFIX: char = 'L';
const RANGE_SEPARATOR: char = '-';

/// A parsed target specification.
///
/// Invariants: `qualifiers` is non-empty; when a line locator is present
/// `line_start <= line_end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetSpec {
    qualifiers: Vec<String>,
    line_start: Option<u32>,
    line_end: Option<u32>,
}

impl TargetSpec {
    /// Parse a raw target string.
    pub fn parse(raw: &str) -> MoltResult<Self> {
        let (path, locator) = match raw.split_once(LINE_SEPARATOR) {
            Some((path, locator)) => (path, Some(locator)),
            None => (raw, None),
        };

        let qualifiers = parse_qualifiers(raw, path)?;

        let (line_start, line_end) = match locator {
            Some(locator) => {
                let (start, end) = parse_line_locator(raw, locator)?;
                (Some(start), Some(end))
            }
            None => (None, None),
        };

        Ok(TargetSpec {
            qualifiers,
            line_start,
            line_end,
        })
    }

    /// Parse a raw target string and require exactly `expected` qualifiers.
    pub fn parse_with_arity(raw: &str, expected: usize) -> MoltResult<Self> {
        let spec = Self::parse(raw)?;
        if spec.qualifiers.len() != expected {
            return Err(MoltError::format(format!(
                "invalid target '{}': expected {} part(s) separated by '{}', found {}",
                raw,
                expected,
                QUALIFIER_SEPARATOR,
                spec.qualifiers.len()
            )));
        }
        Ok(spec)
    }

    /// All qualifiers, outer to inner.
    pub fn qualifiers(&self) -> &[String] {
        &self.qualifiers
    }

    /// The innermost qualifier.
    pub fn leaf(&self) -> &str {
        // Non-empty by construction.
        self.qualifiers.last().map(String::as_str).unwrap_or_default()
    }

    /// Every qualifier before the leaf.
    pub fn container(&self) -> &[String] {
        &self.qualifiers[..self.qualifiers.len().saturating_sub(1)]
    }

    /// True when the target names a module-level element.
    pub fn is_module_level(&self) -> bool {
        self.qualifiers.len() == 1
    }

    /// The inclusive line range, if a locator was given.
    pub fn line_range(&self) -> Option<(u32, u32)> {
        match (self.line_start, self.line_end) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    /// The inclusive line range, or a format error naming what the caller
    /// expected.
    pub fn require_line_range(&self) -> MoltResult<(u32, u32)> {
        self.line_range().ok_or_else(|| {
            MoltError::format(format!(
                "target '{}' requires a line locator such as '#L10' or '#L10-L12'",
                self
            ))
        })
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualifiers.join(QUALIFIER_SEPARATOR))?;
        match self.line_range() {
            Some((start, end)) if start == end => write!(f, "#L{}", start),
            Some((start, end)) => write!(f, "#L{}-L{}", start, end),
            None => Ok(()),
        }
    }
}

fn parse_qualifiers(raw: &str, path: &str) -> MoltResult<Vec<String>> {
    if path.is_empty() {
        return Err(MoltError::format(format!(
            "invalid target '{}': no qualifiers",
            raw
        )));
    }

    path.split(QUALIFIER_SEPARATOR)
        .map(|segment| {
            if is_name(segment) {
                Ok(segment.to_string())
            } else {
                Err(MoltError::format(format!(
                    "invalid target '{}': '{}' is not a valid name",
                    raw, segment
                )))
            }
        })
        .collect()
}

fn is_name(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn parse_line_locator(raw: &str, locator: &str) -> MoltResult<(u32, u32)> {
    let bad = |detail: &str| {
        MoltError::format(format!(
            "invalid line locator in '{}': {} (expected '#L<start>' or '#L<start>-L<end>')",
            raw, detail
        ))
    };

    let rest = locator
        .strip_prefix(LINE_PREFIX)
        .ok_or_else(|| bad("missing 'L' prefix"))?;

    let (start_text, end_text) = match rest.split_once(RANGE_SEPARATOR) {
        Some((start, end)) => (start, Some(end.strip_prefix(LINE_PREFIX).unwrap_or(end))),
        None => (rest, None),
    };

    let start = parse_line_number(start_text).ok_or_else(|| bad("start line is not a number"))?;
    let end = match end_text {
        Some(text) => parse_line_number(text).ok_or_else(|| bad("end line is not a number"))?,
        None => start,
    };

    if start > end {
        return Err(bad(&format!("start line {} is after end line {}", start, end)));
    }

    Ok((start, end))
}

fn parse_line_number(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    mod valid_targets {
        use super::*;

        #[test]
        fn single_name() {
            let spec = TargetSpec::parse("add_numbers").unwrap();
            assert_eq!(spec.qualifiers(), ["add_numbers"]);
            assert_eq!(spec.leaf(), "add_numbers");
            assert!(spec.container().is_empty());
            assert!(spec.is_module_level());
            assert_eq!(spec.line_range(), None);
        }

        #[test]
        fn three_levels() {
            let spec = TargetSpec::parse("Order::total::temp").unwrap();
            assert_eq!(spec.leaf(), "temp");
            assert_eq!(spec.container(), ["Order", "total"]);
            assert!(!spec.is_module_level());
        }

        #[test]
        fn single_line_sets_both_bounds() {
            let spec = TargetSpec::parse("Order::total#L12").unwrap();
            assert_eq!(spec.line_range(), Some((12, 12)));
        }

        #[test]
        fn range_with_and_without_second_prefix() {
            assert_eq!(
                TargetSpec::parse("compute#L9-L11").unwrap().line_range(),
                Some((9, 11))
            );
            assert_eq!(
                TargetSpec::parse("compute#L9-11").unwrap().line_range(),
                Some((9, 11))
            );
        }

        #[test]
        fn arity_matches() {
            let spec = TargetSpec::parse_with_arity("Order::total#L3-L4", 2).unwrap();
            assert_eq!(spec.container(), ["Order"]);
        }

        #[test]
        fn display_round_trips() {
            for raw in ["f", "A::m::v", "A::m#L3", "f#L2-L7"] {
                assert_eq!(TargetSpec::parse(raw).unwrap().to_string(), raw);
            }
        }
    }

    mod format_errors {
        use super::*;

        fn assert_format_error(raw: &str) {
            match TargetSpec::parse(raw) {
                Err(MoltError::Format { .. }) => {}
                other => panic!("expected format error for {:?}, got {:?}", raw, other),
            }
        }

        #[test]
        fn empty_and_malformed_qualifiers() {
            assert_format_error("");
            assert_format_error("::method");
            assert_format_error("Class::");
            assert_format_error("Class:::method");
            assert_format_error("has space");
            assert_format_error("1abc");
            assert_format_error("#L4");
        }

        #[test]
        fn malformed_line_locators() {
            assert_format_error("f#4");
            assert_format_error("f#L");
            assert_format_error("f#Lx");
            assert_format_error("f#L4-");
            assert_format_error("f#L4-Lx");
            assert_format_error("f#L-4");
            assert_format_error("f#L4-L5-L6");
            assert_format_error("f#L4#L5");
            assert_format_error("f#L+4");
        }

        #[test]
        fn reversed_range() {
            assert_format_error("f#L10-L5");
        }

        #[test]
        fn arity_violation() {
            let err = TargetSpec::parse_with_arity("Order", 2).unwrap_err();
            assert!(err.to_string().contains("expected 2 part(s)"));
        }

        #[test]
        fn missing_locator_when_required() {
            let spec = TargetSpec::parse("f").unwrap();
            assert!(matches!(
                spec.require_line_range(),
                Err(MoltError::Format { .. })
            ));
        }
    }
}
