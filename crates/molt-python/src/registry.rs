// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Name to constructor table for the refactoring catalog.
//!
//! The table is a static slice, so listing and lookup need no setup and the
//! CLI can print the catalog without parsing anything.

use std::path::Path;

use serde::Serialize;
use tracing::debug;

use molt_core::error::{MoltError, MoltResult};

use crate::refactorings::{
    ConsolidateConditionalExpression, ExtractFunction, ExtractMethod, HideDelegate, Params,
    PullUpMethod, Refactoring, Rename, ReplaceMagicNumber, ReplaceMethodWithMethodObject,
    SplitTemporaryVariable,
};

/// Builds a configured refactoring from its parameters.
pub type Constructor = fn(&Params) -> MoltResult<Box<dyn Refactoring>>;

/// One catalog entry.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RefactoringDescriptor {
    pub name: &'static str,
    pub summary: &'static str,
    pub required_params: &'static [&'static str],
    pub optional_params: &'static [&'static str],
    #[serde(skip)]
    pub construct: Constructor,
}

fn boxed<R, F>(build: F, params: &Params) -> MoltResult<Box<dyn Refactoring>>
where
    R: Refactoring + 'static,
    F: FnOnce(&Params) -> MoltResult<R>,
{
    Ok(Box::new(build(params)?))
}

static BUILTIN: &[RefactoringDescriptor] = &[
    RefactoringDescriptor {
        name: "rename",
        summary: "Rename a function, class or method and its references in the file",
        required_params: &["target", "new_name"],
        optional_params: &[],
        construct: |p| boxed(Rename::from_params, p),
    },
    RefactoringDescriptor {
        name: "extract-method",
        summary: "Move a line range of a method into a new method of the same class",
        required_params: &["target", "name"],
        optional_params: &[],
        construct: |p| boxed(ExtractMethod::from_params, p),
    },
    RefactoringDescriptor {
        name: "extract-function",
        summary: "Move a line range into a new module-level function",
        required_params: &["target", "name"],
        optional_params: &[],
        construct: |p| boxed(ExtractFunction::from_params, p),
    },
    RefactoringDescriptor {
        name: "split-temporary-variable",
        summary: "Give each assignment of a reused temporary its own name",
        required_params: &["target"],
        optional_params: &[],
        construct: |p| boxed(SplitTemporaryVariable::from_params, p),
    },
    RefactoringDescriptor {
        name: "replace-magic-number-with-symbolic-constant",
        summary: "Replace a numeric literal with a module-level constant",
        required_params: &["target", "name"],
        optional_params: &["value"],
        construct: |p| boxed(ReplaceMagicNumber::from_params, p),
    },
    RefactoringDescriptor {
        name: "replace-method-with-method-object",
        summary: "Turn a long method into a class whose compute() holds the body",
        required_params: &["target"],
        optional_params: &["name"],
        construct: |p| boxed(ReplaceMethodWithMethodObject::from_params, p),
    },
    RefactoringDescriptor {
        name: "pull-up-method",
        summary: "Move a method from a subclass into its superclass",
        required_params: &["target", "to"],
        optional_params: &[],
        construct: |p| boxed(PullUpMethod::from_params, p),
    },
    RefactoringDescriptor {
        name: "hide-delegate",
        summary: "Add a delegating getter and route client accesses through it",
        required_params: &["target", "member"],
        optional_params: &["method"],
        construct: |p| boxed(HideDelegate::from_params, p),
    },
    RefactoringDescriptor {
        name: "consolidate-conditional-expression",
        summary: "Merge conditionals that return the same value into one condition",
        required_params: &["target"],
        optional_params: &["name"],
        construct: |p| boxed(ConsolidateConditionalExpression::from_params, p),
    },
];

/// The refactoring catalog.
#[derive(Debug, Clone, Copy)]
pub struct Registry {
    descriptors: &'static [RefactoringDescriptor],
}

impl Registry {
    /// Every refactoring this crate implements.
    pub fn builtin() -> Self {
        Registry {
            descriptors: BUILTIN,
        }
    }

    pub fn get(&self, name: &str) -> Option<&'static RefactoringDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    /// Catalog names in listing order.
    pub fn names(&self) -> Vec<&'static str> {
        self.descriptors.iter().map(|d| d.name).collect()
    }

    pub fn descriptors(&self) -> &'static [RefactoringDescriptor] {
        self.descriptors
    }

    /// Build the refactoring `name` for the file at `path`.
    ///
    /// Fails with `InvalidArguments` for an unknown name and with a format
    /// error for a missing required parameter.
    pub fn construct(
        &self,
        name: &str,
        path: &Path,
        params: &Params,
    ) -> MoltResult<Box<dyn Refactoring>> {
        let descriptor = self.get(name).ok_or_else(|| {
            MoltError::invalid_args(format!(
                "unknown refactoring '{}' (available: {})",
                name,
                self.names().join(", ")
            ))
        })?;
        if let Some(missing) = descriptor
            .required_params
            .iter()
            .find(|key| !params.contains_key(**key))
        {
            return Err(MoltError::format(format!(
                "{} requires parameter '{}'",
                name, missing
            )));
        }
        debug!(refactoring = name, file = %path.display(), ?params, "constructing refactoring");
        (descriptor.construct)(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn every_entry_constructs_under_its_own_name() {
        let registry = Registry::builtin();
        let cases: &[(&str, &[(&str, &str)])] = &[
            ("rename", &[("target", "f"), ("new_name", "g")]),
            ("extract-method", &[("target", "A::m#L2-L3"), ("name", "h")]),
            ("extract-function", &[("target", "f#L2"), ("name", "h")]),
            ("split-temporary-variable", &[("target", "f::temp")]),
            (
                "replace-magic-number-with-symbolic-constant",
                &[("target", "f#L2"), ("name", "LIMIT")],
            ),
            ("replace-method-with-method-object", &[("target", "A::m")]),
            ("pull-up-method", &[("target", "B::m"), ("to", "A")]),
            ("hide-delegate", &[("target", "A::d"), ("member", "m")]),
            ("consolidate-conditional-expression", &[("target", "f#L2-L5")]),
        ];
        assert_eq!(cases.len(), registry.names().len());
        for (name, pairs) in cases {
            let refactoring = registry
                .construct(name, Path::new("x.py"), &params(pairs))
                .unwrap();
            assert_eq!(refactoring.name(), *name);
        }
    }

    #[test]
    fn unknown_name_is_invalid_arguments() {
        let err = Registry::builtin()
            .construct("inline-everything", Path::new("x.py"), &Params::new())
            .unwrap_err();
        assert!(matches!(err, MoltError::InvalidArguments { .. }));
        assert_eq!(err.error_code().code(), 2);
    }

    #[test]
    fn missing_required_parameter_is_a_format_error() {
        let err = Registry::builtin()
            .construct("rename", Path::new("x.py"), &params(&[("target", "f")]))
            .unwrap_err();
        assert!(matches!(err, MoltError::Format { .. }));
        assert!(err.to_string().contains("new_name"));
    }

    #[test]
    fn descriptors_serialize_without_constructor() {
        let descriptor = Registry::builtin().get("hide-delegate").unwrap();
        let json = serde_json::to_value(descriptor).unwrap();
        assert_eq!(json["name"], "hide-delegate");
        assert_eq!(json["required_params"], serde_json::json!(["target", "member"]));
        assert!(json.get("construct").is_none());
    }

    #[test]
    fn names_are_unique() {
        let mut names = Registry::builtin().names();
        let count = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), count);
    }
}
