//! Byte ranges into a module's original text.
//!
//! Every offset molt records, from a tree-sitter node to a queued edit,
//! points into the source as it was read from disk.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Half-open byte range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// # Panics
    /// If `start` is past `end`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(start <= end, "span {}..{} is inverted", start, end);
        Span { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `inner` lies entirely within this range.
    pub fn contains(&self, inner: &Span) -> bool {
        self.start <= inner.start && inner.end <= self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containment_includes_equal_ranges() {
        let body = Span::new(10, 42);
        assert!(body.contains(&body));
        assert!(body.contains(&Span::new(12, 20)));
        assert!(!body.contains(&Span::new(8, 20)));
        assert!(!body.contains(&Span::new(40, 43)));
    }

    #[test]
    fn length_and_display() {
        let name = Span::new(4, 11);
        assert_eq!(name.len(), 7);
        assert!(!name.is_empty());
        assert!(Span::new(3, 3).is_empty());
        assert_eq!(name.to_string(), "4..11");
    }

    #[test]
    #[should_panic(expected = "inverted")]
    fn inverted_range_panics() {
        let _ = Span::new(9, 2);
    }
}
