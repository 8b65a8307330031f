//! Unified diff generation for dry runs.
//!
//! A refactoring rewrites one contiguous region more often than not, so the
//! diff is computed as a single hunk spanning everything between the common
//! leading lines and the common trailing lines of the two texts, padded with
//! up to three lines of context.

const CONTEXT_LINES: usize = 3;

/// Generate a unified diff of `old` against `new` for `file`.
///
/// Returns an empty string when the texts are identical.
pub fn generate_unified_diff(file: &str, old: &str, new: &str) -> String {
    if old == new {
        return String::new();
    }

    let old_lines: Vec<&str> = old.split_inclusive('\n').collect();
    let new_lines: Vec<&str> = new.split_inclusive('\n').collect();

    let prefix = old_lines
        .iter()
        .zip(&new_lines)
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = old_lines.len().min(new_lines.len()) - prefix;
    let suffix = old_lines
        .iter()
        .rev()
        .zip(new_lines.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let context_start = prefix.saturating_sub(CONTEXT_LINES);
    let old_change_end = old_lines.len() - suffix;
    let new_change_end = new_lines.len() - suffix;
    let old_context_end = (old_change_end + CONTEXT_LINES).min(old_lines.len());
    let new_context_end = (new_change_end + CONTEXT_LINES).min(new_lines.len());

    let old_count = old_context_end - context_start;
    let new_count = new_context_end - context_start;

    let mut diff = String::new();
    diff.push_str(&format!("--- a/{}\n", file));
    diff.push_str(&format!("+++ b/{}\n", file));
    diff.push_str(&format!(
        "@@ -{} +{} @@\n",
        hunk_range(context_start, old_count),
        hunk_range(context_start, new_count)
    ));

    for line in &old_lines[context_start..prefix] {
        push_line(&mut diff, ' ', line);
    }
    for line in &old_lines[prefix..old_change_end] {
        push_line(&mut diff, '-', line);
    }
    for line in &new_lines[prefix..new_change_end] {
        push_line(&mut diff, '+', line);
    }
    for line in &old_lines[old_change_end..old_context_end] {
        push_line(&mut diff, ' ', line);
    }

    diff
}

fn hunk_range(start: usize, count: usize) -> String {
    // An empty range is reported at the line before it, per the unified format.
    if count == 0 {
        format!("{},0", start)
    } else {
        format!("{},{}", start + 1, count)
    }
}

fn push_line(diff: &mut String, marker: char, line: &str) {
    diff.push(marker);
    diff.push_str(line);
    if !line.ends_with('\n') {
        diff.push_str("\n\\ No newline at end of file\n");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_texts_produce_no_diff() {
        assert!(generate_unified_diff("a.py", "x = 1\n", "x = 1\n").is_empty());
    }

    #[test]
    fn single_line_change_with_context() {
        let old = "a\nb\nc\nd\ne\nf\ng\nh\n";
        let new = "a\nb\nc\nd\nE\nf\ng\nh\n";
        let diff = generate_unified_diff("test.py", old, new);
        assert_eq!(
            diff,
            "--- a/test.py\n+++ b/test.py\n@@ -2,7 +2,7 @@\n b\n c\n d\n-e\n+E\n f\n g\n h\n"
        );
    }

    #[test]
    fn insertion_at_start() {
        let diff = generate_unified_diff("m.py", "x = 1\n", "MAX = 5\n\n\nx = 1\n");
        assert!(diff.contains("@@ -1,1 +1,4 @@"));
        assert!(diff.contains("+MAX = 5\n"));
        assert!(diff.contains(" x = 1\n"));
    }

    #[test]
    fn missing_trailing_newline_is_marked() {
        let diff = generate_unified_diff("m.py", "x = 1", "x = 2");
        assert!(diff.contains("-x = 1\n\\ No newline at end of file\n"));
        assert!(diff.contains("+x = 2\n\\ No newline at end of file\n"));
    }
}
