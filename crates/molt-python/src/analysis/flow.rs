//! Variable read/write flow inside one function.
//!
//! [`VariableFlowAnalyzer`] records every variable touch of a target function
//! as a flat, ordered [`VariableAccess`] log and answers range queries over
//! it: which names a line range reads or writes, which it needs as inputs and
//! which it must hand back as outputs.
//!
//! ## Traversal rule
//!
//! Only statements of the target function itself are analyzed. Statements
//! nested in `if`/`for`/`while`/`with`/`try` blocks belong to the function;
//! nested `def`, `class` and `lambda` bodies do not and are never entered.
//!
//! The log is built on first query and cached for the analyzer's lifetime.

use std::cell::{Cell, OnceCell};

use serde::Serialize;
use tracing::trace;
use tree_sitter::Node;

use molt_core::error::MoltResult;

use crate::cst::{line_of, named_children, PythonModule};

/// Names never reported as variables.
pub const BUILTIN_NAMES: &[&str] = &[
    "True", "False", "None", "self", "cls", "len", "print", "str", "int", "float", "list", "dict",
    "set", "tuple", "range", "enumerate", "zip", "hasattr",
];

/// Check if a name is excluded from flow analysis.
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_NAMES.contains(&name)
}

/// One read or write of a variable.
///
/// An augmented assignment produces two records for the same name and line:
/// a read followed by a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableAccess {
    pub name: String,
    /// 1-indexed line of the statement (or condition) that touched the name.
    pub line: u32,
    pub is_read: bool,
    pub is_write: bool,
}

impl VariableAccess {
    fn read(name: &str, line: u32) -> Self {
        VariableAccess {
            name: name.to_string(),
            line,
            is_read: true,
            is_write: false,
        }
    }

    fn write(name: &str, line: u32) -> Self {
        VariableAccess {
            name: name.to_string(),
            line,
            is_read: false,
            is_write: true,
        }
    }

    fn in_range(&self, lo: u32, hi: u32) -> bool {
        lo <= self.line && self.line <= hi
    }
}

// ============================================================================
// Analyzer
// ============================================================================

/// Lazily built, memoized read/write log of one function.
pub struct VariableFlowAnalyzer<'m> {
    module: &'m PythonModule,
    function: Node<'m>,
    log: OnceCell<Vec<VariableAccess>>,
    traversals: Cell<usize>,
}

impl<'m> VariableFlowAnalyzer<'m> {
    /// Analyzer for `function_name`, a method of `class_name` or a
    /// module-level function when `class_name` is `None`.
    pub fn new(
        module: &'m PythonModule,
        class_name: Option<&str>,
        function_name: &str,
    ) -> MoltResult<Self> {
        let function = module.require_function(class_name, function_name)?;
        Ok(Self::for_function(module, function))
    }

    /// Analyzer for an already resolved `function_definition` node.
    pub fn for_function(module: &'m PythonModule, function: Node<'m>) -> Self {
        VariableFlowAnalyzer {
            module,
            function,
            log: OnceCell::new(),
            traversals: Cell::new(0),
        }
    }

    /// The analyzed function definition.
    pub fn function(&self) -> Node<'m> {
        self.function
    }

    /// The full access log in source order.
    pub fn accesses(&self) -> &[VariableAccess] {
        self.log.get_or_init(|| {
            self.traversals.set(self.traversals.get() + 1);
            let mut collector = AccessCollector {
                module: self.module,
                log: Vec::new(),
            };
            if let Some(body) = self.function.child_by_field_name("body") {
                collector.block(body);
            }
            trace!(records = collector.log.len(), "built variable access log");
            collector.log
        })
    }

    /// How many times the function body has been traversed (0 or 1).
    pub fn traversal_count(&self) -> usize {
        self.traversals.get()
    }

    /// Unique names read in `[lo, hi]`, first-seen order.
    pub fn reads_in_range(&self, lo: u32, hi: u32) -> Vec<String> {
        unique_names(
            self.accesses()
                .iter()
                .filter(|a| a.is_read && a.in_range(lo, hi)),
        )
    }

    /// Unique names written in `[lo, hi]`, first-seen order.
    pub fn writes_in_range(&self, lo: u32, hi: u32) -> Vec<String> {
        unique_names(
            self.accesses()
                .iter()
                .filter(|a| a.is_write && a.in_range(lo, hi)),
        )
    }

    /// Names the region must receive: read in range before (in log order)
    /// any write to them in range.
    pub fn inputs_for_region(&self, lo: u32, hi: u32) -> Vec<String> {
        let log = self.accesses();
        self.reads_in_range(lo, hi)
            .into_iter()
            .filter(|name| {
                let first = |want_read: bool| {
                    log.iter().position(|a| {
                        a.name == *name
                            && a.in_range(lo, hi)
                            && if want_read { a.is_read } else { a.is_write }
                    })
                };
                match (first(true), first(false)) {
                    (Some(read), Some(write)) => read < write,
                    (Some(_), None) => true,
                    _ => false,
                }
            })
            .collect()
    }

    /// Names written in range and read anywhere after `hi`.
    pub fn outputs_from_region(&self, lo: u32, hi: u32) -> Vec<String> {
        self.writes_in_range(lo, hi)
            .into_iter()
            .filter(|name| self.is_read_after(name, hi))
            .collect()
    }

    /// True if `name` is read on any line after `line`.
    pub fn is_read_after(&self, name: &str, line: u32) -> bool {
        self.accesses()
            .iter()
            .any(|a| a.is_read && a.name == name && a.line > line)
    }
}

fn unique_names<'a>(accesses: impl Iterator<Item = &'a VariableAccess>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for access in accesses {
        if !names.contains(&access.name) {
            names.push(access.name.clone());
        }
    }
    names
}

// ============================================================================
// Collector
// ============================================================================

/// Builds the access log for one function body.
pub(crate) struct AccessCollector<'m> {
    pub(crate) module: &'m PythonModule,
    pub(crate) log: Vec<VariableAccess>,
}

impl<'m> AccessCollector<'m> {
    pub(crate) fn block(&mut self, block: Node<'m>) {
        for statement in named_children(block) {
            self.statement(statement);
        }
    }

    fn statement(&mut self, statement: Node<'m>) {
        let line = line_of(statement);
        match statement.kind() {
            "expression_statement" => {
                for part in named_children(statement) {
                    match part.kind() {
                        "assignment" => self.assignment(part, line),
                        "augmented_assignment" => self.augmented_assignment(part, line),
                        _ => self.reads(part, line),
                    }
                }
            }
            "return_statement" | "raise_statement" | "assert_statement" => {
                for value in named_children(statement) {
                    self.reads(value, line);
                }
            }
            "if_statement" => {
                self.condition(statement);
                self.field_block(statement, "consequence");
                let mut cursor = statement.walk();
                let alternatives: Vec<Node<'m>> = statement
                    .children_by_field_name("alternative", &mut cursor)
                    .collect();
                for clause in alternatives {
                    match clause.kind() {
                        "elif_clause" => {
                            self.condition(clause);
                            self.field_block(clause, "consequence");
                        }
                        _ => self.field_block(clause, "body"),
                    }
                }
            }
            "for_statement" => {
                if let Some(iterable) = statement.child_by_field_name("right") {
                    self.reads(iterable, line);
                }
                if let Some(target) = statement.child_by_field_name("left") {
                    self.writes(target, line);
                }
                self.field_block(statement, "body");
                self.else_clause(statement);
            }
            "while_statement" => {
                self.condition(statement);
                self.field_block(statement, "body");
                self.else_clause(statement);
            }
            "with_statement" => {
                for clause in named_children(statement) {
                    if clause.kind() != "with_clause" {
                        continue;
                    }
                    for item in named_children(clause) {
                        if let Some(value) = item.child_by_field_name("value") {
                            self.with_item_value(value, line);
                        }
                    }
                }
                self.field_block(statement, "body");
            }
            "try_statement" => {
                for part in named_children(statement) {
                    match part.kind() {
                        "block" => self.block(part),
                        "except_clause" | "except_group_clause" | "else_clause"
                        | "finally_clause" => {
                            for child in named_children(part) {
                                if child.kind() == "block" {
                                    self.block(child);
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    fn field_block(&mut self, node: Node<'m>, field: &str) {
        if let Some(block) = node.child_by_field_name(field) {
            self.block(block);
        }
    }

    fn else_clause(&mut self, node: Node<'m>) {
        if let Some(clause) = node.child_by_field_name("alternative") {
            self.field_block(clause, "body");
        }
    }

    fn condition(&mut self, node: Node<'m>) {
        if let Some(condition) = node.child_by_field_name("condition") {
            self.reads(condition, line_of(condition));
        }
    }

    fn with_item_value(&mut self, value: Node<'m>, line: u32) {
        if value.kind() == "as_pattern" {
            let children = named_children(value);
            if let Some(context) = children.first() {
                self.reads(*context, line);
            }
            if let Some(alias) = value.child_by_field_name("alias") {
                self.writes(alias, line);
            }
        } else {
            self.reads(value, line);
        }
    }

    /// `a = b = value`: reads of the value first, then every target.
    fn assignment(&mut self, node: Node<'m>, line: u32) {
        let mut targets = Vec::new();
        let mut current = node;
        let value = loop {
            if let Some(left) = current.child_by_field_name("left") {
                targets.push(left);
            }
            match current.child_by_field_name("right") {
                Some(right) if right.kind() == "assignment" => current = right,
                other => break other,
            }
        };
        if let Some(value) = value {
            self.reads(value, line);
        }
        for target in targets {
            self.writes(target, line);
        }
    }

    fn augmented_assignment(&mut self, node: Node<'m>, line: u32) {
        if let Some(target) = node.child_by_field_name("left") {
            if target.kind() == "identifier" {
                let name = self.module.text_of(target);
                if !is_builtin(name) {
                    self.log.push(VariableAccess::read(name, line));
                    self.log.push(VariableAccess::write(name, line));
                }
            } else {
                self.reads(target, line);
            }
        }
        if let Some(value) = node.child_by_field_name("right") {
            self.reads(value, line);
        }
    }

    /// Record writes for an assignment target. Attribute and subscript
    /// targets only read their base.
    fn writes(&mut self, target: Node<'m>, line: u32) {
        match target.kind() {
            "identifier" => {
                let name = self.module.text_of(target);
                if !is_builtin(name) {
                    self.log.push(VariableAccess::write(name, line));
                }
            }
            "attribute" | "subscript" => self.reads(target, line),
            _ => {
                for child in named_children(target) {
                    self.writes(child, line);
                }
            }
        }
    }

    fn reads(&mut self, expression: Node<'m>, line: u32) {
        let mut names = Vec::new();
        collect_read_names(self.module, expression, &[], &mut names);
        for name in names {
            self.log.push(VariableAccess::read(name, line));
        }
    }
}

/// Collect identifiers read by an expression, in source order.
///
/// Attribute member names and keyword-argument names are not reads;
/// comprehension variables are local to their comprehension; lambda and
/// nested definition bodies are skipped.
pub(crate) fn collect_read_names<'a>(
    module: &'a PythonModule,
    node: Node<'_>,
    bound: &[&'a str],
    out: &mut Vec<&'a str>,
) {
    match node.kind() {
        "identifier" => {
            let name = module.text_of(node);
            if !is_builtin(name) && !bound.contains(&name) {
                out.push(name);
            }
        }
        "attribute" => {
            if let Some(object) = node.child_by_field_name("object") {
                collect_read_names(module, object, bound, out);
            }
        }
        "keyword_argument" => {
            if let Some(value) = node.child_by_field_name("value") {
                collect_read_names(module, value, bound, out);
            }
        }
        "lambda" | "function_definition" | "class_definition" | "comment" => {}
        "list_comprehension" | "set_comprehension" | "dictionary_comprehension"
        | "generator_expression" => {
            let mut inner: Vec<&'a str> = bound.to_vec();
            for clause in named_children(node) {
                if clause.kind() == "for_in_clause" {
                    if let Some(left) = clause.child_by_field_name("left") {
                        bind_names(module, left, &mut inner);
                    }
                }
            }
            for child in named_children(node) {
                collect_read_names(module, child, &inner, out);
            }
        }
        _ => {
            for child in named_children(node) {
                collect_read_names(module, child, bound, out);
            }
        }
    }
}

fn bind_names<'a>(module: &'a PythonModule, target: Node<'_>, bound: &mut Vec<&'a str>) {
    if target.kind() == "identifier" {
        bound.push(module.text_of(target));
    } else {
        for child in named_children(target) {
            bind_names(module, child, bound);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer<'m>(module: &'m PythonModule, class: Option<&str>, func: &str) -> VariableFlowAnalyzer<'m> {
        VariableFlowAnalyzer::new(module, class, func).unwrap()
    }

    mod range_queries {
        use super::*;

        const SOURCE: &str = "\
def process(param):
    x = 10
    y = x + param
    return y
";

        #[test]
        fn reads_and_writes() {
            let module = PythonModule::parse(SOURCE).unwrap();
            let flow = analyzer(&module, None, "process");
            assert_eq!(flow.reads_in_range(3, 3), vec!["x", "param"]);
            assert_eq!(flow.writes_in_range(2, 3), vec!["x", "y"]);
        }

        #[test]
        fn inputs_and_outputs() {
            let module = PythonModule::parse(SOURCE).unwrap();
            let flow = analyzer(&module, None, "process");
            assert_eq!(flow.inputs_for_region(2, 3), vec!["param"]);
            assert_eq!(flow.inputs_for_region(3, 3), vec!["x", "param"]);
            assert_eq!(flow.outputs_from_region(2, 3), vec!["y"]);
            assert!(flow.outputs_from_region(4, 4).is_empty());
        }

        #[test]
        fn self_assignment_reads_before_writing() {
            let module =
                PythonModule::parse("def f(n):\n    n = n + 1\n    return n\n").unwrap();
            let flow = analyzer(&module, None, "f");
            assert_eq!(flow.inputs_for_region(2, 2), vec!["n"]);
        }
    }

    mod recording {
        use super::*;

        #[test]
        fn augmented_assignment_is_two_records() {
            let module = PythonModule::parse("def f(a):\n    total += a\n").unwrap();
            let flow = analyzer(&module, None, "f");
            let log = flow.accesses();
            assert_eq!(log.len(), 3);
            assert_eq!((log[0].name.as_str(), log[0].is_read), ("total", true));
            assert_eq!((log[1].name.as_str(), log[1].is_write), ("total", true));
            assert_eq!((log[2].name.as_str(), log[2].is_read), ("a", true));
        }

        #[test]
        fn nested_blocks_included_nested_defs_excluded() {
            let source = "\
def outer(items):
    count = 0
    for item in items:
        if item > limit:
            count += 1
    def inner(hidden):
        return hidden + secret
    fn = lambda z: z + other
    return count
";
            let module = PythonModule::parse(source).unwrap();
            let flow = analyzer(&module, None, "outer");
            let reads = flow.reads_in_range(1, 9);
            assert!(reads.contains(&"items".to_string()));
            assert!(reads.contains(&"limit".to_string()));
            assert!(!reads.contains(&"hidden".to_string()));
            assert!(!reads.contains(&"secret".to_string()));
            assert!(!reads.contains(&"z".to_string()));
            assert!(!reads.contains(&"other".to_string()));
            assert_eq!(flow.writes_in_range(3, 3), vec!["item"]);
        }

        #[test]
        fn builtins_attributes_and_keywords_excluded() {
            let source = "\
class A:
    def m(self, data):
        result = len(data) + self.offset
        print(result, sep=separator)
";
            let module = PythonModule::parse(source).unwrap();
            let flow = analyzer(&module, Some("A"), "m");
            assert_eq!(flow.reads_in_range(3, 4), vec!["data", "result", "separator"]);
        }

        #[test]
        fn comprehension_variables_are_local() {
            let module = PythonModule::parse(
                "def f(rows):\n    out = [r * k for r in rows]\n    return out\n",
            )
            .unwrap();
            let flow = analyzer(&module, None, "f");
            assert_eq!(flow.reads_in_range(2, 2), vec!["k", "rows"]);
        }

        #[test]
        fn tuple_targets_are_written() {
            let module = PythonModule::parse("def f(p):\n    a, b = p\n").unwrap();
            let flow = analyzer(&module, None, "f");
            assert_eq!(flow.writes_in_range(2, 2), vec!["a", "b"]);
        }
    }

    mod memoization {
        use super::*;

        #[test]
        fn repeated_queries_traverse_once() {
            let module = PythonModule::parse("def f(a):\n    b = a\n    return b\n").unwrap();
            let flow = analyzer(&module, None, "f");
            assert_eq!(flow.traversal_count(), 0);
            let first = flow.inputs_for_region(2, 3);
            let second = flow.inputs_for_region(2, 3);
            assert_eq!(first, second);
            assert_eq!(flow.reads_in_range(2, 3), flow.reads_in_range(2, 3));
            assert_eq!(flow.traversal_count(), 1);
        }

        #[test]
        fn missing_function_is_not_found() {
            let module = PythonModule::parse("x = 1\n").unwrap();
            let err = VariableFlowAnalyzer::new(&module, None, "nope").err().unwrap();
            assert_eq!(err.error_code().code(), 3);
        }
    }
}
