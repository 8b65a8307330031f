// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Conditional ladders and their normalized signatures.
//!
//! A *ladder* is a run of top-level `if`/`elif` branches in one function
//! whose bodies are each a single `return <value>` with values of the same
//! kind:
//!
//! ```python
//! def disability_amount(self):
//!     if self.seniority < 2:
//!         return 0
//!     if self.months_disabled > 12:
//!         return 0
//! ```
//!
//! Conditions are normalized by replacing each parameter name with its
//! position (`$0`, `$1`, ...), so the same ladder written against differently
//! named parameters produces the same [`ConditionalPatternSignature`]. The
//! scanner uses that signature to find duplicates of a ladder elsewhere in a
//! module.

use std::collections::BTreeMap;

use regex::{NoExpand, Regex};
use serde::Serialize;
use tracing::debug;
use tree_sitter::Node;

use molt_core::error::MoltResult;

use crate::cst::{
    block_statements, body_statements, end_line_of, line_of, named_children, walk, PythonModule,
    ScopeTracker, VisitResult, Visitor,
};

// ============================================================================
// Normalization
// ============================================================================

/// Parameter name to placeholder (`$0`, `$1`, ...).
pub type ParamMap = BTreeMap<String, String>;

/// Map every parameter of `function` (including `self`) to its positional
/// placeholder.
pub fn build_param_map(module: &PythonModule, function: Node<'_>) -> ParamMap {
    module
        .parameter_names(function)
        .into_iter()
        .enumerate()
        .map(|(index, name)| (name, format!("${}", index)))
        .collect()
}

/// Replace parameter names in `text` by their placeholders.
///
/// Names are replaced longest first and only at word boundaries, so `x`
/// never clobbers part of `x_max`.
pub fn normalize_condition(text: &str, param_map: &ParamMap) -> String {
    let mut names: Vec<(&String, &String)> = param_map.iter().collect();
    names.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

    let mut normalized = text.to_string();
    for (name, placeholder) in names {
        let pattern = format!(r"\b{}\b", regex::escape(name));
        let Ok(re) = Regex::new(&pattern) else {
            continue;
        };
        normalized = re
            .replace_all(&normalized, NoExpand(placeholder.as_str()))
            .into_owned();
    }
    normalized
}

// ============================================================================
// Signature
// ============================================================================

/// Normalized identity of a ladder: its sorted conditions and branch count.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ConditionalPatternSignature {
    pub conditions: Vec<String>,
    pub num_statements: usize,
}

impl ConditionalPatternSignature {
    /// Signature of a set of normalized conditions, in any order.
    pub fn from_conditions(conditions: Vec<String>) -> Self {
        let mut conditions = conditions;
        conditions.sort();
        let num_statements = conditions.len();
        ConditionalPatternSignature {
            conditions,
            num_statements,
        }
    }
}

// ============================================================================
// Ladder Derivation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReturnKind {
    Number,
    Other,
}

impl ReturnKind {
    fn of(value: Node<'_>) -> Self {
        match value.kind() {
            "integer" | "float" => ReturnKind::Number,
            _ => ReturnKind::Other,
        }
    }

    /// Only numeric returns can continue a ladder.
    fn continues(self, next: ReturnKind) -> bool {
        self == ReturnKind::Number && next == ReturnKind::Number
    }
}

/// One `if`/`elif` branch of a ladder.
#[derive(Debug, Clone, Copy)]
pub struct Branch<'m> {
    /// The `if_statement` or `elif_clause` node.
    pub clause: Node<'m>,
    pub condition: Node<'m>,
    pub return_value: Node<'m>,
}

impl Branch<'_> {
    pub fn line(&self) -> u32 {
        line_of(self.clause)
    }
}

/// The `(clause, condition, consequence)` triples of an `if` statement:
/// the `if` itself followed by its `elif` clauses.
fn clauses(statement: Node<'_>) -> Vec<(Node<'_>, Node<'_>, Node<'_>)> {
    let mut out = Vec::new();
    let head = (
        statement.child_by_field_name("condition"),
        statement.child_by_field_name("consequence"),
    );
    if let (Some(condition), Some(consequence)) = head {
        out.push((statement, condition, consequence));
    }
    let mut cursor = statement.walk();
    for alternative in statement.children_by_field_name("alternative", &mut cursor) {
        if alternative.kind() != "elif_clause" {
            continue;
        }
        let pair = (
            alternative.child_by_field_name("condition"),
            alternative.child_by_field_name("consequence"),
        );
        if let (Some(condition), Some(consequence)) = pair {
            out.push((alternative, condition, consequence));
        }
    }
    out
}

/// The value of a block that is exactly one `return <value>`.
fn single_return_value(block: Node<'_>) -> Option<Node<'_>> {
    match block_statements(block).as_slice() {
        [only] if only.kind() == "return_statement" => named_children(*only)
            .into_iter()
            .find(|n| n.kind() != "comment"),
        _ => None,
    }
}

/// How a derivation treats branches that do not return a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Only branches starting inside `[lo, hi]` count; others are skipped.
    Region(u32, u32),
    /// The leading ladder of a whole function; a non-returning branch after
    /// the first ladder branch ends it.
    Leading,
}

fn derive_ladder<'m>(function: Node<'m>, mode: Mode) -> Vec<Branch<'m>> {
    let mut branches: Vec<Branch<'m>> = Vec::new();
    let mut kind: Option<ReturnKind> = None;

    for statement in body_statements(function) {
        if statement.kind() != "if_statement" {
            continue;
        }
        for (clause, condition, consequence) in clauses(statement) {
            if let Mode::Region(lo, hi) = mode {
                let line = line_of(clause);
                if line < lo || line > hi {
                    continue;
                }
            }
            let Some(return_value) = single_return_value(consequence) else {
                if mode == Mode::Leading && !branches.is_empty() {
                    return branches;
                }
                continue;
            };
            let next = ReturnKind::of(return_value);
            match kind {
                None => kind = Some(next),
                Some(current) if current.continues(next) => {}
                Some(_) => return branches,
            }
            branches.push(Branch {
                clause,
                condition,
                return_value,
            });
        }
    }
    branches
}

// ============================================================================
// Extraction
// ============================================================================

/// A ladder found in a line region of one function.
#[derive(Debug, Clone)]
pub struct ExtractedPattern<'m> {
    pub function: Node<'m>,
    pub branches: Vec<Branch<'m>>,
    pub param_map: ParamMap,
    pub signature: ConditionalPatternSignature,
}

impl ExtractedPattern<'_> {
    /// Line of the first branch.
    pub fn start_line(&self) -> u32 {
        line_range(&self.branches).0
    }

    /// Last line of the last branch.
    pub fn end_line(&self) -> u32 {
        line_range(&self.branches).1
    }
}

fn line_range(branches: &[Branch<'_>]) -> (u32, u32) {
    let start = branches.first().map(Branch::line).unwrap_or(0);
    let end = branches
        .last()
        .map(|b| end_line_of(b.return_value))
        .unwrap_or(0);
    (start, end)
}

/// Pulls a ladder out of a line region.
pub struct PatternExtractor;

impl PatternExtractor {
    /// The ladder among the top-level branches of `class_name::function_name`
    /// that start within `[lo, hi]`, or `None` if the region holds none.
    pub fn extract<'m>(
        module: &'m PythonModule,
        class_name: Option<&str>,
        function_name: &str,
        lo: u32,
        hi: u32,
    ) -> MoltResult<Option<ExtractedPattern<'m>>> {
        let function = module.require_function(class_name, function_name)?;
        let branches = derive_ladder(function, Mode::Region(lo, hi));
        if branches.is_empty() {
            return Ok(None);
        }
        let param_map = build_param_map(module, function);
        let signature = signature_of(module, &branches, &param_map);
        debug!(
            function = function_name,
            branches = branches.len(),
            "extracted conditional ladder"
        );
        Ok(Some(ExtractedPattern {
            function,
            branches,
            param_map,
            signature,
        }))
    }
}

fn signature_of(
    module: &PythonModule,
    branches: &[Branch<'_>],
    param_map: &ParamMap,
) -> ConditionalPatternSignature {
    ConditionalPatternSignature::from_conditions(
        branches
            .iter()
            .map(|b| normalize_condition(module.text_of(b.condition), param_map))
            .collect(),
    )
}

// ============================================================================
// Scanning
// ============================================================================

/// A function whose leading ladder matches a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternMatch {
    pub function_name: String,
    pub class_name: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
    /// Conditions as written in that function.
    pub conditions: Vec<String>,
    pub return_value: Option<String>,
}

/// Every function in a module with its directly enclosing class.
struct FunctionCollector<'m> {
    module: &'m PythonModule,
    scopes: ScopeTracker,
    found: Vec<(Option<String>, Node<'m>)>,
}

impl<'m> Visitor<'m> for FunctionCollector<'m> {
    fn enter(&mut self, node: Node<'m>) -> VisitResult {
        if node.kind() == "function_definition" {
            let class = match self.scopes.current_function() {
                None => self.scopes.current_class().map(str::to_string),
                Some(_) => None,
            };
            self.found.push((class, node));
        }
        self.scopes.enter(self.module, node);
        VisitResult::Continue
    }

    fn leave(&mut self, node: Node<'m>) {
        self.scopes.leave(node);
    }
}

/// Finds functions whose leading ladder has a given signature.
pub struct PatternScanner;

impl PatternScanner {
    /// Matches of `signature` in `module`, skipping the function named by
    /// `exclude` (`(class, function)`).
    pub fn scan(
        module: &PythonModule,
        signature: &ConditionalPatternSignature,
        exclude: Option<(Option<&str>, &str)>,
    ) -> Vec<PatternMatch> {
        let mut collector = FunctionCollector {
            module,
            scopes: ScopeTracker::new(),
            found: Vec::new(),
        };
        walk(module.root(), &mut collector);

        let mut matches = Vec::new();
        for (class_name, function) in collector.found {
            let Some(function_name) = module.name_of(function) else {
                continue;
            };
            if let Some((excluded_class, excluded_function)) = exclude {
                if excluded_function == function_name && excluded_class == class_name.as_deref() {
                    continue;
                }
            }
            let branches = derive_ladder(function, Mode::Leading);
            if branches.len() != signature.num_statements || branches.is_empty() {
                continue;
            }
            let param_map = build_param_map(module, function);
            if signature_of(module, &branches, &param_map) != *signature {
                continue;
            }
            let (start_line, end_line) = line_range(&branches);
            matches.push(PatternMatch {
                function_name: function_name.to_string(),
                class_name,
                start_line,
                end_line,
                conditions: branches
                    .iter()
                    .map(|b| module.text_of(b.condition).to_string())
                    .collect(),
                return_value: branches
                    .first()
                    .map(|b| module.text_of(b.return_value).to_string()),
            });
        }
        debug!(matches = matches.len(), "scanned for conditional ladders");
        matches
    }
}

// ============================================================================
// Tests
// ============================================================================
