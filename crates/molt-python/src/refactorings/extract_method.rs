// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Extract a line range of a method into a new method of the same class.
//!
//! The new method is inserted directly below the source method and keeps
//! its binding: instance methods get a `self` helper, class methods a
//! `@classmethod` helper called through `cls`, static methods a
//! `@staticmethod` helper called through the class name.

use tracing::debug;

use molt_core::edit::EditPrimitive;
use molt_core::error::{MoltError, MoltResult};
use molt_core::target::TargetSpec;

use crate::analysis::flow::VariableFlowAnalyzer;
use crate::analysis::instance::InstanceVariableTracker;
use crate::cst::definition_statement;
use crate::refactorings::extraction::{call_site_edit, render_body, Interface, Region};
use crate::refactorings::{identifier_param, parse, required_param, Params, Refactoring};
use crate::transform::{body_indent, line_indent, statement_lines, Rewrite};
use crate::validators::conflict::MethodConflictChecker;
use crate::validators::decorator::{apply_decorators, DecoratorHandler};

/// How the source method is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    Instance,
    Class,
    Static,
}

#[derive(Debug)]
pub struct ExtractMethod {
    target: TargetSpec,
    name: String,
}

impl ExtractMethod {
    pub fn from_params(params: &Params) -> MoltResult<Self> {
        let target = TargetSpec::parse_with_arity(required_param(params, "target")?, 2)?;
        target.require_line_range()?;
        Ok(ExtractMethod {
            target,
            name: identifier_param(params, "name")?,
        })
    }
}

impl Refactoring for ExtractMethod {
    fn name(&self) -> &'static str {
        "extract-method"
    }

    fn apply(&self, source: &str) -> MoltResult<String> {
        let module = parse(source)?;
        let class_name = self.target.qualifiers()[0].as_str();
        let method_name = self.target.leaf();
        let (lo, hi) = self.target.require_line_range()?;

        let method = module.require_function(Some(class_name), method_name)?;
        MethodConflictChecker::check(&module, class_name, &self.name)?;

        let tracker = InstanceVariableTracker::new(&module, class_name, method_name)?;
        let decorators = DecoratorHandler::new(&module);
        let binding = if tracker.is_method() {
            Binding::Instance
        } else if decorators.has_any(method, &["classmethod"]) {
            Binding::Class
        } else if decorators.has_any(method, &["staticmethod"]) {
            Binding::Static
        } else {
            return Err(MoltError::invalid_args(format!(
                "'{}' is not an instance, class or static method",
                self.target
            )));
        };

        let region = Region::select(method, lo, hi)?;
        let flow = VariableFlowAnalyzer::for_function(&module, method);
        let inputs = flow.inputs_for_region(region.start_line, region.end_line);
        let interface = Interface::new(&module, &flow, &region, inputs);
        debug!(
            target = %self.target,
            ?binding,
            params = ?interface.params,
            outputs = ?interface.outputs,
            "extracting method"
        );

        let receiver = match binding {
            Binding::Static => None,
            _ => module.parameter_names(method).into_iter().next(),
        };
        let mut params: Vec<String> = receiver.iter().cloned().collect();
        params.extend(interface.params.iter().cloned());
        let call_args = interface.params.join(", ");
        let call = match (binding, &receiver) {
            (Binding::Static, _) | (_, None) => {
                format!("{}.{}({})", class_name, self.name, call_args)
            }
            (_, Some(receiver)) => format!("{}.{}({})", receiver, self.name, call_args),
        };

        let statement = definition_statement(method);
        let def_indent = line_indent(&module, statement);
        let body = body_indent(&module, method);
        let unit = body.strip_prefix(def_indent).unwrap_or("    ");
        let definition = format!(
            "def {}({}):\n{}",
            self.name,
            params.join(", "),
            render_body(&module, &region, &interface, unit, false)
        );
        let helper_decorators: Vec<String> = match binding {
            Binding::Instance => Vec::new(),
            Binding::Class => vec!["classmethod".to_string()],
            Binding::Static => vec!["staticmethod".to_string()],
        };
        let helper = apply_decorators(&helper_decorators, &definition, def_indent);

        let end = statement_lines(&module, statement).end;
        let separator = if source[..end].ends_with('\n') { "\n" } else { "\n\n" };
        let mut rewrite = Rewrite::new(&module);
        rewrite.push(call_site_edit(&module, &region, &interface, &call));
        rewrite.push(EditPrimitive::InsertAt {
            position: end,
            text: format!("{}{}", separator, helper),
        });
        rewrite.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(target: &str, name: &str) -> ExtractMethod {
        let params: Params = [("target", target), ("name", name)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ExtractMethod::from_params(&params).unwrap()
    }

    mod instance_methods {
        use super::*;

        const SOURCE: &str = "\
class Calculator:
    def __init__(self, x, y):
        self.x = x
        self.y = y

    def compute(self):
        base = self.x * self.y
        print(\"computing\")
        return base + 1

    def other(self):
        pass
";

        #[test]
        fn extracted_value_is_returned_and_assigned() {
            let output = extract("Calculator::compute#L7", "calculate_base")
                .apply(SOURCE)
                .unwrap();
            assert!(output.contains("        base = self.calculate_base()\n        print(\"computing\")"));
            assert!(output.contains(
                "    def calculate_base(self):\n        base = self.x * self.y\n        return base\n\n    def other(self):"
            ));
        }

        #[test]
        fn locals_become_parameters() {
            let source = "\
class Order:
    def print_owing(self, amount):
        outstanding = amount * 2
        print(outstanding)
        print(amount)
";
            let output = extract("Order::print_owing#L4-L5", "print_details")
                .apply(source)
                .unwrap();
            assert!(output.contains("        self.print_details(outstanding, amount)\n"));
            assert!(output.ends_with(
                "\n    def print_details(self, outstanding, amount):\n        print(outstanding)\n        print(amount)\n"
            ));
        }

        #[test]
        fn tail_return_moves_into_the_helper() {
            let output = extract("Calculator::compute#L8-L9", "finish")
                .apply(SOURCE)
                .unwrap();
            assert!(output.contains("        return self.finish(base)\n"));
            assert!(output.contains("    def finish(self, base):\n        print(\"computing\")\n        return base + 1\n"));
        }

        #[test]
        fn existing_method_is_a_conflict() {
            let err = extract("Calculator::compute#L7", "other").apply(SOURCE).unwrap_err();
            assert!(matches!(err, MoltError::Conflict { .. }));
        }
    }

    mod bindings {
        use super::*;

        const SOURCE: &str = "\
class Prices:
    RATE = 2

    @staticmethod
    def double(value):
        scaled = value * 2
        return scaled

    @classmethod
    def rated(cls, value):
        scaled = value * cls.RATE
        return scaled
";

        #[test]
        fn static_helper_is_called_through_the_class() {
            let output = extract("Prices::double#L6", "scale").apply(SOURCE).unwrap();
            assert!(output.contains("        scaled = Prices.scale(value)\n"));
            assert!(output.contains(
                "    @staticmethod\n    def scale(value):\n        scaled = value * 2\n        return scaled\n"
            ));
        }

        #[test]
        fn class_helper_is_called_through_cls() {
            let output = extract("Prices::rated#L11", "scale").apply(SOURCE).unwrap();
            assert!(output.contains("        scaled = cls.scale(value)\n"));
            assert!(output.contains("    @classmethod\n    def scale(cls, value):\n"));
        }

        #[test]
        fn target_needs_a_line_range() {
            let params: Params = [("target", "Prices::double"), ("name", "x")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            assert!(matches!(
                ExtractMethod::from_params(&params),
                Err(MoltError::Format { .. })
            ));
        }
    }
}
