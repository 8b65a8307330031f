// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Grouping of `@property` accessors.
//!
//! A property is up to three methods sharing one name: the getter
//! (`@property`), the setter (`@<name>.setter`) and the deleter
//! (`@<name>.deleter`). Moving or removing a property must treat the group
//! as a unit.

use serde::Serialize;
use tree_sitter::Node;

use molt_core::edit::EditPrimitive;
use molt_core::error::MoltResult;
use molt_core::patch::Span;
use molt_core::text::{full_line_span, reindent};

use crate::cst::{
    class_methods, decorators, definition_statement, named_children, span_of, PythonModule,
};
use crate::transform::{append_to_body, body_indent, remove_statements};

/// Accessor methods of one property, as spans of their full statements
/// (decorators included).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyDefinition {
    pub name: String,
    pub getter: Option<Span>,
    pub setter: Option<Span>,
    pub deleter: Option<Span>,
}

impl PropertyDefinition {
    /// Accessor spans in getter, setter, deleter order.
    pub fn members(&self) -> impl Iterator<Item = Span> + '_ {
        [self.getter, self.setter, self.deleter].into_iter().flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccessorKind {
    Getter,
    Setter,
    Deleter,
}

/// Finds and relocates property groups in one class.
pub struct PropertyMethodHandler<'m> {
    module: &'m PythonModule,
    class: Node<'m>,
}

impl<'m> PropertyMethodHandler<'m> {
    /// Handler for module-level class `class_name`.
    pub fn new(module: &'m PythonModule, class_name: &str) -> MoltResult<Self> {
        let class = module.require_class(class_name)?;
        Ok(PropertyMethodHandler { module, class })
    }

    /// Properties of the class, in order of first accessor.
    pub fn properties(&self) -> Vec<PropertyDefinition> {
        let mut properties: Vec<PropertyDefinition> = Vec::new();
        for method in class_methods(self.class) {
            let Some(kind) = self.accessor_kind(method) else {
                continue;
            };
            let Some(name) = self.module.name_of(method) else {
                continue;
            };
            let span = span_of(definition_statement(method));
            let index = match properties.iter().position(|p| p.name == name) {
                Some(index) => index,
                None => {
                    properties.push(PropertyDefinition {
                        name: name.to_string(),
                        getter: None,
                        setter: None,
                        deleter: None,
                    });
                    properties.len() - 1
                }
            };
            let property = &mut properties[index];
            match kind {
                AccessorKind::Getter => property.getter = Some(span),
                AccessorKind::Setter => property.setter = Some(span),
                AccessorKind::Deleter => property.deleter = Some(span),
            }
        }
        properties
    }

    /// The property called `name`, if the class has one.
    pub fn find(&self, name: &str) -> Option<PropertyDefinition> {
        self.properties().into_iter().find(|p| p.name == name)
    }

    /// True if `method` carries a property, setter or deleter decorator.
    pub fn is_property_method(&self, method: Node<'_>) -> bool {
        self.accessor_kind(method).is_some()
    }

    /// Edits that delete every accessor of `property` from the class.
    ///
    /// If the class body would become empty a `pass` takes its place.
    pub fn removal_edits(&self, property: &PropertyDefinition) -> Vec<EditPrimitive> {
        let members = self.member_statements(property);
        remove_statements(self.module, self.class, &members)
    }

    /// The accessors of `property` rendered as a block for the body of
    /// `target_class`, separated by blank lines.
    pub fn insertion_text(&self, property: &PropertyDefinition, target_class: Node<'_>) -> String {
        let indent = body_indent(self.module, target_class);
        let source = self.module.source();
        property
            .members()
            .map(|span| {
                let lines = self.lines_of(span);
                reindent(&source[lines.start..lines.end], &indent)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Edit that appends `property` to `target_class`, replacing a lone
    /// `pass` placeholder.
    pub fn insertion_edits(
        &self,
        property: &PropertyDefinition,
        target_class: Node<'_>,
    ) -> Vec<EditPrimitive> {
        let block = self.insertion_text(property, target_class);
        vec![append_to_body(self.module, target_class, &block)]
    }

    fn accessor_kind(&self, method: Node<'_>) -> Option<AccessorKind> {
        decorators(method).into_iter().find_map(|decorator| {
            let expression = named_children(decorator).into_iter().next()?;
            match expression.kind() {
                "identifier" if self.module.text_of(expression) == "property" => {
                    Some(AccessorKind::Getter)
                }
                "attribute" => {
                    let attr = expression.child_by_field_name("attribute")?;
                    match self.module.text_of(attr) {
                        "setter" => Some(AccessorKind::Setter),
                        "deleter" => Some(AccessorKind::Deleter),
                        _ => None,
                    }
                }
                _ => None,
            }
        })
    }

    fn member_statements(&self, property: &PropertyDefinition) -> Vec<Node<'m>> {
        let spans: Vec<Span> = property.members().collect();
        class_methods(self.class)
            .into_iter()
            .map(definition_statement)
            .filter(|statement| spans.contains(&span_of(*statement)))
            .collect()
    }

    fn lines_of(&self, span: Span) -> Span {
        full_line_span(self.module.source(), span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Rewrite;

    const SOURCE: &str = "\
class Base:
    pass


class Account:
    @property
    def balance(self):
        return self._balance

    @balance.setter
    def balance(self, value):
        self._balance = value

    @balance.deleter
    def balance(self):
        del self._balance

    def deposit(self, amount):
        self._balance += amount

    @property
    def owner(self):
        return self._owner
";

    fn apply(module: &PythonModule, edits: Vec<EditPrimitive>) -> String {
        let mut rewrite = Rewrite::new(module);
        rewrite.extend(edits);
        rewrite.finish().unwrap()
    }

    mod grouping {
        use super::*;

        #[test]
        fn accessors_grouped_by_name() {
            let module = PythonModule::parse(SOURCE).unwrap();
            let handler = PropertyMethodHandler::new(&module, "Account").unwrap();
            let properties = handler.properties();
            assert_eq!(properties.len(), 2);
            let balance = &properties[0];
            assert_eq!(balance.name, "balance");
            assert!(balance.getter.is_some() && balance.setter.is_some() && balance.deleter.is_some());
            assert_eq!(balance.members().count(), 3);
            let owner = handler.find("owner").unwrap();
            assert!(owner.setter.is_none());
            assert!(handler.find("deposit").is_none());
        }

        #[test]
        fn plain_methods_are_not_property_methods() {
            let module = PythonModule::parse(SOURCE).unwrap();
            let handler = PropertyMethodHandler::new(&module, "Account").unwrap();
            let deposit = module.find_function(Some("Account"), "deposit").unwrap();
            assert!(!handler.is_property_method(deposit));
        }

        #[test]
        fn unknown_class_is_not_found() {
            let module = PythonModule::parse(SOURCE).unwrap();
            assert!(PropertyMethodHandler::new(&module, "Missing").is_err());
        }
    }

    mod relocation {
        use super::*;

        #[test]
        fn removal_deletes_every_accessor() {
            let module = PythonModule::parse(SOURCE).unwrap();
            let handler = PropertyMethodHandler::new(&module, "Account").unwrap();
            let balance = handler.find("balance").unwrap();
            let out = apply(&module, handler.removal_edits(&balance));
            assert!(!out.contains("def balance"));
            assert!(out.contains("class Account:\n    def deposit(self, amount):\n"));
        }

        #[test]
        fn removing_only_member_leaves_pass() {
            let source = "class Only:\n    @property\n    def x(self):\n        return 1\n";
            let module = PythonModule::parse(source).unwrap();
            let handler = PropertyMethodHandler::new(&module, "Only").unwrap();
            let x = handler.find("x").unwrap();
            assert_eq!(apply(&module, handler.removal_edits(&x)), "class Only:\n    pass\n");
        }

        #[test]
        fn insertion_replaces_pass_placeholder() {
            let module = PythonModule::parse(SOURCE).unwrap();
            let handler = PropertyMethodHandler::new(&module, "Account").unwrap();
            let owner = handler.find("owner").unwrap();
            let base = module.find_class("Base").unwrap();
            let out = apply(&module, handler.insertion_edits(&owner, base));
            assert!(out.starts_with(
                "class Base:\n    @property\n    def owner(self):\n        return self._owner\n\n\nclass Account:"
            ));
        }

        #[test]
        fn insertion_text_separates_accessors() {
            let module = PythonModule::parse(SOURCE).unwrap();
            let handler = PropertyMethodHandler::new(&module, "Account").unwrap();
            let balance = handler.find("balance").unwrap();
            let base = module.find_class("Base").unwrap();
            let text = handler.insertion_text(&balance, base);
            assert!(text.contains("        return self._balance\n\n    @balance.setter\n"));
            assert_eq!(text.matches("def balance").count(), 3);
        }
    }
}
