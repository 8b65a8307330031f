// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Pull a method up from a subclass into its direct superclass.
//!
//! The method moves with all of its decorators. A property moves as a
//! group (getter, setter and deleter together). Other direct subclasses of
//! the superclass that define a textually identical copy of a plain method
//! lose their copy too, since they now inherit it.

use tracing::debug;
use tree_sitter::Node;

use molt_core::error::{MoltError, MoltResult};
use molt_core::target::TargetSpec;
use molt_core::text::dedent;

use crate::cst::{definition_statement, named_children, unwrap_definition, PythonModule};
use crate::refactorings::{identifier_param, parse, required_param, Params, Refactoring};
use crate::transform::{append_to_body, body_indent, remove_statements, statement_text, Rewrite};
use crate::validators::conflict::MethodConflictChecker;
use crate::validators::decorator::{apply_decorators, DecoratorHandler};
use crate::validators::property::PropertyMethodHandler;

#[derive(Debug)]
pub struct PullUpMethod {
    target: TargetSpec,
    to: String,
}

impl PullUpMethod {
    pub fn from_params(params: &Params) -> MoltResult<Self> {
        let target = TargetSpec::parse_with_arity(required_param(params, "target")?, 2)?;
        if target.line_range().is_some() {
            return Err(MoltError::format(format!(
                "pull-up-method target '{}' must be 'Class::method'",
                target
            )));
        }
        Ok(PullUpMethod {
            target,
            to: identifier_param(params, "to")?,
        })
    }
}

/// True if `class` lists `base` among its superclasses (`base` or
/// `module.base`).
fn inherits(module: &PythonModule, class: Node<'_>, base: &str) -> bool {
    let Some(superclasses) = class.child_by_field_name("superclasses") else {
        return false;
    };
    named_children(superclasses).into_iter().any(|node| {
        let name = match node.kind() {
            "attribute" => node.child_by_field_name("attribute"),
            "identifier" => Some(node),
            _ => None,
        };
        name.is_some_and(|n| module.text_of(n) == base)
    })
}

/// Dedented full text of a method, decorators included.
fn method_text(module: &PythonModule, method: Node<'_>) -> String {
    dedent(statement_text(module, definition_statement(method)))
}

impl Refactoring for PullUpMethod {
    fn name(&self) -> &'static str {
        "pull-up-method"
    }

    fn apply(&self, source: &str) -> MoltResult<String> {
        let module = parse(source)?;
        let sub_name = self.target.qualifiers()[0].as_str();
        let method_name = self.target.leaf();
        let sub = module.require_class(sub_name)?;
        let method = module.require_function(Some(sub_name), method_name)?;
        let parent = module.require_class(&self.to)?;
        if !inherits(&module, sub, &self.to) {
            return Err(MoltError::invalid_args(format!(
                "'{}' does not inherit from '{}'",
                sub_name, self.to
            )));
        }
        MethodConflictChecker::check(&module, &self.to, method_name)?;

        let mut rewrite = Rewrite::new(&module);
        let properties = PropertyMethodHandler::new(&module, sub_name)?;
        if let Some(property) = properties.find(method_name) {
            debug!(target = %self.target, to = %self.to, "pulling up property");
            rewrite.extend(properties.removal_edits(&property));
            rewrite.extend(properties.insertion_edits(&property, parent));
            return rewrite.finish();
        }

        let decorators = DecoratorHandler::new(&module);
        let block = apply_decorators(
            &module.decorator_texts(method),
            &decorators.create_undecorated_method(method),
            &body_indent(&module, parent),
        );
        rewrite.push(append_to_body(&module, parent, &block));
        rewrite.extend(remove_statements(&module, sub, &[method]));

        let text = method_text(&module, method);
        let mut siblings = Vec::new();
        for class in module
            .statements()
            .into_iter()
            .filter_map(unwrap_definition)
            .filter(|def| def.kind() == "class_definition")
        {
            if class.id() == sub.id() || !inherits(&module, class, &self.to) {
                continue;
            }
            let Some(class_name) = module.name_of(class) else {
                continue;
            };
            let Some(copy) = module.find_function(Some(class_name), method_name) else {
                continue;
            };
            if method_text(&module, copy) == text {
                rewrite.extend(remove_statements(&module, class, &[copy]));
                siblings.push(class_name);
            }
        }
        debug!(target = %self.target, to = %self.to, ?siblings, "pulling up method");
        rewrite.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pull_up(target: &str, to: &str) -> PullUpMethod {
        let params: Params = [("target", target), ("to", to)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PullUpMethod::from_params(&params).unwrap()
    }

    mod moving {
        use super::*;

        #[test]
        fn identical_copies_in_siblings_are_removed() {
            let source = "\
class Employee:
    pass


class Salesman(Employee):
    def get_annual_cost(self):
        return self.monthly_cost * 12

    def commission(self):
        return self.get_annual_cost() * 0.05


class Engineer(Employee):
    def get_annual_cost(self):
        return self.monthly_cost * 12


class Contractor(Employee):
    def get_annual_cost(self):
        return self.rate * 2000
";
            let output = pull_up("Salesman::get_annual_cost", "Employee")
                .apply(source)
                .unwrap();
            assert_eq!(
                output,
                "\
class Employee:
    def get_annual_cost(self):
        return self.monthly_cost * 12


class Salesman(Employee):
    def commission(self):
        return self.get_annual_cost() * 0.05


class Engineer(Employee):
    pass


class Contractor(Employee):
    def get_annual_cost(self):
        return self.rate * 2000
"
            );
        }

        #[test]
        fn decorators_travel_with_the_method() {
            let source = "\
class Base:
    def describe(self):
        return \"base\"


class Child(Base):
    @staticmethod
    @cache
    def unit():
        return 1
";
            let output = pull_up("Child::unit", "Base").apply(source).unwrap();
            assert!(output.starts_with(
                "class Base:\n    def describe(self):\n        return \"base\"\n\n    @staticmethod\n    @cache\n    def unit():\n        return 1\n"
            ));
            assert!(output.ends_with("class Child(Base):\n    pass\n"));
        }

        #[test]
        fn property_moves_as_a_group() {
            let source = "\
class Base:
    pass


class Account(Base):
    @property
    def balance(self):
        return self._balance

    @balance.setter
    def balance(self, value):
        self._balance = value

    def deposit(self, amount):
        self._balance += amount
";
            let output = pull_up("Account::balance", "Base").apply(source).unwrap();
            assert!(output.starts_with(
                "class Base:\n    @property\n    def balance(self):\n        return self._balance\n\n    @balance.setter\n    def balance(self, value):\n"
            ));
            assert!(output.contains("class Account(Base):\n    def deposit(self, amount):"));
        }
    }

    mod rejection {
        use super::*;

        const SOURCE: &str = "\
class Base:
    def area(self):
        return 0


class Other:
    pass


class Square(Base):
    def area(self):
        return self.side ** 2

    def side_length(self):
        return self.side
";

        #[test]
        fn not_a_superclass() {
            let err = pull_up("Square::side_length", "Other").apply(SOURCE).unwrap_err();
            assert!(matches!(err, MoltError::InvalidArguments { .. }));
        }

        #[test]
        fn superclass_already_defines_it() {
            let err = pull_up("Square::area", "Base").apply(SOURCE).unwrap_err();
            assert!(matches!(err, MoltError::Conflict { .. }));
        }

        #[test]
        fn line_range_is_rejected() {
            let params: Params = [("target", "Square::area#L12"), ("to", "Base")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            let err = PullUpMethod::from_params(&params).unwrap_err();
            assert!(matches!(err, MoltError::Format { .. }));
            assert_eq!(err.error_code().code(), 2);
        }

        #[test]
        fn unknown_superclass() {
            let err = pull_up("Square::area", "Shape").apply(SOURCE).unwrap_err();
            assert!(matches!(err, MoltError::NotFound { .. }));
        }
    }
}
