// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Usage patterns and their structural validators.
//!
//! A text search finds every place a symbol's name appears. A
//! [`UsageValidator`] decides whether the syntax tree at that place really
//! is the requested kind of usage: `obj.field`, `obj.method(...)`,
//! `function(...)` or `name = ...`. Comments, strings and other kinds of
//! usage are rejected.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tree_sitter::Node;

use molt_core::error::{MoltError, MoltResult};

use crate::cst::PythonModule;

// ============================================================================
// Usage Patterns
// ============================================================================

/// The ways a symbol can be used.
///
/// Only the first four have validators; the rest are recognized so that a
/// request for them fails with a clear "not implemented" error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsagePattern {
    /// `obj.field`
    AttributeAccess,
    /// `obj.method(...)`
    MethodCall,
    /// `function(...)`
    FunctionCall,
    /// `x = value`
    AssignmentTarget,
    /// `def f(x):`
    Parameter,
    /// `from x import y`
    Import,
    /// `x: SomeType`
    TypeAnnotation,
    /// `class Foo(Base):`
    BaseClass,
    /// `@decorator`
    Decorator,
    /// `obj[key]`
    Subscript,
    /// `except Error:`
    ExceptionType,
    /// `with ctx as x:`
    WithTarget,
    /// `for x in items:`
    ForTarget,
    /// `[x for x in items]`
    ComprehensionVar,
    /// `del obj.attr`
    DeleteTarget,
    /// `x += 1`
    AugmentedAssign,
}

impl UsagePattern {
    /// Every pattern, implemented or not.
    pub const ALL: &'static [UsagePattern] = &[
        UsagePattern::AttributeAccess,
        UsagePattern::MethodCall,
        UsagePattern::FunctionCall,
        UsagePattern::AssignmentTarget,
        UsagePattern::Parameter,
        UsagePattern::Import,
        UsagePattern::TypeAnnotation,
        UsagePattern::BaseClass,
        UsagePattern::Decorator,
        UsagePattern::Subscript,
        UsagePattern::ExceptionType,
        UsagePattern::WithTarget,
        UsagePattern::ForTarget,
        UsagePattern::ComprehensionVar,
        UsagePattern::DeleteTarget,
        UsagePattern::AugmentedAssign,
    ];

    /// Short tag used on the command line.
    pub fn tag(&self) -> &'static str {
        match self {
            UsagePattern::AttributeAccess => "attr",
            UsagePattern::MethodCall => "call",
            UsagePattern::FunctionCall => "func",
            UsagePattern::AssignmentTarget => "assign",
            UsagePattern::Parameter => "param",
            UsagePattern::Import => "import",
            UsagePattern::TypeAnnotation => "type",
            UsagePattern::BaseClass => "base",
            UsagePattern::Decorator => "decorator",
            UsagePattern::Subscript => "subscript",
            UsagePattern::ExceptionType => "except",
            UsagePattern::WithTarget => "with",
            UsagePattern::ForTarget => "for",
            UsagePattern::ComprehensionVar => "comp",
            UsagePattern::DeleteTarget => "del",
            UsagePattern::AugmentedAssign => "aug",
        }
    }
}

impl fmt::Display for UsagePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for UsagePattern {
    type Err = MoltError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UsagePattern::ALL
            .iter()
            .copied()
            .find(|p| p.tag() == s)
            .ok_or_else(|| MoltError::invalid_args(format!("unknown usage pattern '{}'", s)))
    }
}

// ============================================================================
// Validators
// ============================================================================

/// Structural check for one usage pattern.
pub trait UsageValidator {
    /// The pattern this validator recognizes.
    fn pattern(&self) -> UsagePattern;

    /// The pattern node whose leaf name is `identifier`, if the identifier
    /// sits in the leaf position of this pattern's node kind.
    fn candidate<'t>(&self, identifier: Node<'t>) -> Option<Node<'t>>;

    /// True if `node` is this pattern's node kind, its leaf name is
    /// `symbol`, and (when given) its leftmost base name is `base_object`.
    fn matches(
        &self,
        node: Node<'_>,
        module: &PythonModule,
        symbol: &str,
        base_object: Option<&str>,
    ) -> bool;
}

/// Validator for `pattern`.
///
/// Patterns without a validator fail with `UnsupportedPattern`.
pub fn validator_for(pattern: UsagePattern) -> MoltResult<&'static dyn UsageValidator> {
    match pattern {
        UsagePattern::AttributeAccess => Ok(&AttributeAccessValidator),
        UsagePattern::MethodCall => Ok(&MethodCallValidator),
        UsagePattern::FunctionCall => Ok(&FunctionCallValidator),
        UsagePattern::AssignmentTarget => Ok(&AssignmentTargetValidator),
        other => Err(MoltError::unsupported_pattern(format!("{:?}", other))),
    }
}

/// The leftmost simple name of an attribute chain: `a` in `a.b.c`.
pub fn leftmost_name<'t>(mut node: Node<'t>) -> Option<Node<'t>> {
    loop {
        match node.kind() {
            "identifier" => return Some(node),
            "attribute" => node = node.child_by_field_name("object")?,
            _ => return None,
        }
    }
}

fn base_matches(module: &PythonModule, object: Option<Node<'_>>, base_object: Option<&str>) -> bool {
    match base_object {
        None => true,
        Some(expected) => object
            .and_then(leftmost_name)
            .is_some_and(|base| module.text_of(base) == expected),
    }
}

/// Whether `node` is the function being called in a `call`.
pub(crate) fn is_callee(node: Node<'_>) -> bool {
    node.parent().is_some_and(|parent| {
        parent.kind() == "call"
            && parent
                .child_by_field_name("function")
                .is_some_and(|f| f.id() == node.id())
    })
}

fn is_field(parent: Node<'_>, field: &str, child: Node<'_>) -> bool {
    parent
        .child_by_field_name(field)
        .is_some_and(|n| n.id() == child.id())
}

/// `obj.field` outside callee position.
pub struct AttributeAccessValidator;

impl UsageValidator for AttributeAccessValidator {
    fn pattern(&self) -> UsagePattern {
        UsagePattern::AttributeAccess
    }

    fn candidate<'t>(&self, identifier: Node<'t>) -> Option<Node<'t>> {
        let parent = identifier.parent()?;
        (parent.kind() == "attribute" && is_field(parent, "attribute", identifier)).then_some(parent)
    }

    fn matches(
        &self,
        node: Node<'_>,
        module: &PythonModule,
        symbol: &str,
        base_object: Option<&str>,
    ) -> bool {
        if node.kind() != "attribute" || is_callee(node) {
            return false;
        }
        let leaf = node.child_by_field_name("attribute");
        if !leaf.is_some_and(|leaf| module.text_of(leaf) == symbol) {
            return false;
        }
        base_matches(module, node.child_by_field_name("object"), base_object)
    }
}

/// `obj.method(...)`.
pub struct MethodCallValidator;

impl UsageValidator for MethodCallValidator {
    fn pattern(&self) -> UsagePattern {
        UsagePattern::MethodCall
    }

    fn candidate<'t>(&self, identifier: Node<'t>) -> Option<Node<'t>> {
        let attribute = AttributeAccessValidator.candidate(identifier)?;
        let call = attribute.parent()?;
        (call.kind() == "call" && is_field(call, "function", attribute)).then_some(call)
    }

    fn matches(
        &self,
        node: Node<'_>,
        module: &PythonModule,
        symbol: &str,
        base_object: Option<&str>,
    ) -> bool {
        if node.kind() != "call" {
            return false;
        }
        let Some(function) = node.child_by_field_name("function") else {
            return false;
        };
        if function.kind() != "attribute" {
            return false;
        }
        let leaf = function.child_by_field_name("attribute");
        if !leaf.is_some_and(|leaf| module.text_of(leaf) == symbol) {
            return false;
        }
        base_matches(module, function.child_by_field_name("object"), base_object)
    }
}

/// `function(...)` with a bare name as callee.
pub struct FunctionCallValidator;

impl UsageValidator for FunctionCallValidator {
    fn pattern(&self) -> UsagePattern {
        UsagePattern::FunctionCall
    }

    fn candidate<'t>(&self, identifier: Node<'t>) -> Option<Node<'t>> {
        let call = identifier.parent()?;
        (call.kind() == "call" && is_field(call, "function", identifier)).then_some(call)
    }

    fn matches(
        &self,
        node: Node<'_>,
        module: &PythonModule,
        symbol: &str,
        _base_object: Option<&str>,
    ) -> bool {
        node.kind() == "call"
            && node
                .child_by_field_name("function")
                .is_some_and(|f| f.kind() == "identifier" && module.text_of(f) == symbol)
    }
}

/// `name = value`, including chained targets.
pub struct AssignmentTargetValidator;

impl UsageValidator for AssignmentTargetValidator {
    fn pattern(&self) -> UsagePattern {
        UsagePattern::AssignmentTarget
    }

    fn candidate<'t>(&self, identifier: Node<'t>) -> Option<Node<'t>> {
        let assignment = identifier.parent()?;
        (assignment.kind() == "assignment" && is_field(assignment, "left", identifier))
            .then_some(assignment)
    }

    fn matches(
        &self,
        node: Node<'_>,
        module: &PythonModule,
        symbol: &str,
        _base_object: Option<&str>,
    ) -> bool {
        node.kind() == "assignment"
            && node
                .child_by_field_name("left")
                .is_some_and(|l| l.kind() == "identifier" && module.text_of(l) == symbol)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cst::{walk, VisitResult};

    const SOURCE: &str = "\
boss = person.department.manager
person.department.manager()
other.manager = 3
manager(1)
manager = 2
# person.department.manager
text = \"x.manager\"
";

    /// Nodes under the module that `validator` accepts.
    fn accepted(module: &PythonModule, pattern: UsagePattern, base: Option<&str>) -> Vec<String> {
        let validator = validator_for(pattern).unwrap();
        let mut found = Vec::new();
        walk(module.root(), &mut |node: Node<'_>| {
            if validator.matches(node, module, "manager", base) {
                found.push(module.text_of(node).to_string());
            }
            VisitResult::Continue
        });
        found
    }

    mod patterns {
        use super::*;

        #[test]
        fn tags_round_trip() {
            for pattern in UsagePattern::ALL {
                assert_eq!(pattern.tag().parse::<UsagePattern>().unwrap(), *pattern);
            }
            assert!("bogus".parse::<UsagePattern>().is_err());
        }

        #[test]
        fn unimplemented_pattern_is_explicit() {
            let err = validator_for(UsagePattern::Decorator).err().unwrap();
            assert_eq!(err.error_code().code(), 5);
            assert!(err.to_string().contains("Decorator"));
        }
    }

    mod validators {
        use super::*;

        #[test]
        fn attribute_access_excludes_callees() {
            let module = PythonModule::parse(SOURCE).unwrap();
            assert_eq!(
                accepted(&module, UsagePattern::AttributeAccess, None),
                vec!["person.department.manager", "other.manager"]
            );
        }

        #[test]
        fn base_object_is_leftmost_name() {
            let module = PythonModule::parse(SOURCE).unwrap();
            assert_eq!(
                accepted(&module, UsagePattern::AttributeAccess, Some("person")),
                vec!["person.department.manager"]
            );
            assert!(accepted(&module, UsagePattern::AttributeAccess, Some("department")).is_empty());
        }

        #[test]
        fn method_and_function_calls() {
            let module = PythonModule::parse(SOURCE).unwrap();
            assert_eq!(
                accepted(&module, UsagePattern::MethodCall, None),
                vec!["person.department.manager()"]
            );
            assert_eq!(accepted(&module, UsagePattern::FunctionCall, None), vec!["manager(1)"]);
        }

        #[test]
        fn assignment_target_is_plain_name() {
            let module = PythonModule::parse(SOURCE).unwrap();
            assert_eq!(
                accepted(&module, UsagePattern::AssignmentTarget, None),
                vec!["manager = 2"]
            );
        }

        #[test]
        fn candidate_walks_up_from_leaf() {
            let module = PythonModule::parse(SOURCE).unwrap();
            // `manager` in `manager(1)` on line 4.
            let identifier = module.identifier_at(4, 0).unwrap();
            let call = FunctionCallValidator.candidate(identifier).unwrap();
            assert_eq!(module.text_of(call), "manager(1)");
            assert!(AttributeAccessValidator.candidate(identifier).is_none());
        }
    }
}
