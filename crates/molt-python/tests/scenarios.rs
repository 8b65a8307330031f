// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! End-to-end refactoring scenarios.
//!
//! Each test writes a Python file into a temporary directory, runs a
//! refactoring through the registry the way the CLI does, and checks the
//! file on disk afterwards.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use molt_core::error::{MoltError, MoltResult};
use molt_python::files::{read_source, write_back};
use molt_python::{Params, Registry};

// ============================================================================
// Helpers
// ============================================================================

fn workspace(name: &str, source: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(name);
    fs::write(&path, source).unwrap();
    (dir, path)
}

fn params(pairs: &[(&str, &str)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Read, refactor and write back one file.
fn run(name: &str, path: &Path, pairs: &[(&str, &str)]) -> MoltResult<String> {
    let refactoring = Registry::builtin().construct(name, path, &params(pairs))?;
    let original = read_source(path)?;
    let updated = refactoring.apply(&original)?;
    write_back(path, &original, &updated)?;
    read_source(path)
}

// ============================================================================
// Scenario A: rename
// ============================================================================

mod rename {
    use super::*;

    #[test]
    fn function_and_its_calls() {
        let (_dir, path) = workspace(
            "calc.py",
            "def add_numbers(a, b):\n    return a + b\n\n\ntotal = add_numbers(1, 2)\n",
        );
        let output = run(
            "rename",
            &path,
            &[("target", "add_numbers"), ("new_name", "calculate_sum")],
        )
        .unwrap();
        assert!(output.contains("def calculate_sum(a, b):"));
        assert!(output.contains("total = calculate_sum(1, 2)"));
        assert!(!output.contains("add_numbers"));
    }
}

// ============================================================================
// Scenario B: extract with a return value
// ============================================================================

mod extract_with_return_value {
    use super::*;

    #[test]
    fn assigned_value_is_returned_to_the_caller() {
        let (_dir, path) = workspace(
            "calculator.py",
            "\
class Calculator:
    def compute(self, x, y):
        base = x * y
        print(\"computing\")
        return base + 1
",
        );
        let output = run(
            "extract-method",
            &path,
            &[("target", "Calculator::compute#L3"), ("name", "calculate_base")],
        )
        .unwrap();
        assert!(output.contains("        base = self.calculate_base(x, y)\n"));
        assert!(output.contains(
            "    def calculate_base(self, x, y):\n        base = x * y\n        return base\n"
        ));
        assert!(output.contains("        return base + 1\n"));
    }
}

// ============================================================================
// Scenario C: conflicts leave the file untouched
// ============================================================================

mod conflict_rejection {
    use super::*;

    const SOURCE: &str = "\
MAX_RETRIES = 3


class Order:
    def total(self, items):
        subtotal = sum(items)
        return subtotal * 1.08

    def tax(self):
        return 0


class Total:
    pass
";

    fn assert_conflict_untouched(name: &str, pairs: &[(&str, &str)]) {
        let (_dir, path) = workspace("order.py", SOURCE);
        let err = run(name, &path, pairs).unwrap_err();
        assert!(matches!(err, MoltError::Conflict { .. }), "{name}: {err}");
        assert_eq!(err.error_code().code(), 4);
        assert_eq!(fs::read(&path).unwrap(), SOURCE.as_bytes());
    }

    #[test]
    fn method_name_taken() {
        assert_conflict_untouched(
            "extract-method",
            &[("target", "Order::total#L6"), ("name", "tax")],
        );
    }

    #[test]
    fn constant_name_taken() {
        assert_conflict_untouched(
            "replace-magic-number-with-symbolic-constant",
            &[("target", "Order::total#L7"), ("name", "MAX_RETRIES")],
        );
    }

    #[test]
    fn class_name_taken() {
        assert_conflict_untouched("replace-method-with-method-object", &[("target", "Order::total")]);
    }
}

// ============================================================================
// Scenario D: split temporary variable
// ============================================================================

mod split_temporary {
    use super::*;

    #[test]
    fn only_the_second_generation_is_renamed() {
        let (_dir, path) = workspace(
            "geometry.py",
            "\
def describe(height, width):
    temp = 2 * (height + width)
    print(temp)
    temp = height * width
    print(temp)
    return temp
",
        );
        let output = run("split-temporary-variable", &path, &[("target", "describe::temp")]).unwrap();
        assert_eq!(
            output,
            "\
def describe(height, width):
    temp = 2 * (height + width)
    print(temp)
    temp_2 = height * width
    print(temp_2)
    return temp_2
"
        );
    }
}

// ============================================================================
// Untouched text
// ============================================================================

mod preservation {
    use super::*;

    #[test]
    fn comments_and_spacing_outside_the_edit_survive() {
        let source = "\
# pricing rules
def price(quantity):   # keep this comment


    base = quantity * 10  # per unit
    return base
";
        let (_dir, path) = workspace("pricing.py", source);
        let output = run(
            "replace-magic-number-with-symbolic-constant",
            &path,
            &[("target", "price#L5"), ("name", "UNIT_PRICE"), ("value", "10")],
        )
        .unwrap();
        assert!(output.contains("def price(quantity):   # keep this comment\n\n\n"));
        assert!(output.contains("    base = quantity * UNIT_PRICE  # per unit\n"));
        assert!(output.contains("UNIT_PRICE = 10\n"));
    }

    #[test]
    fn invalid_source_is_a_parse_error_and_not_written() {
        let source = "def broken(:\n    return 1\n";
        let (_dir, path) = workspace("broken.py", source);
        let err = run("rename", &path, &[("target", "broken"), ("new_name", "fixed")]).unwrap_err();
        assert!(matches!(err, MoltError::Parse { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), source);
    }
}
