// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Extract a line range of a function or method into a new module-level
//! function.
//!
//! 1. Parameters are the region's free variables that are local to the
//!    source function. A method's receiver is passed first when the region
//!    uses it.
//! 2. The function is placed above the top-level statement that contains
//!    the source, separated by two blank lines.
//! 3. A region that is a single `x = expr` whose value is needed later
//!    becomes `return expr`.

use tracing::debug;
use tree_sitter::Node;

use molt_core::error::{MoltError, MoltResult};
use molt_core::target::TargetSpec;

use crate::analysis::cross_scope::CrossScopeAnalyzer;
use crate::cst::{top_level_statement, PythonModule};
use crate::refactorings::extraction::{call_site_edit, render_body, Interface, Region};
use crate::refactorings::{identifier_param, parse, required_param, Params, Refactoring};
use crate::transform::{body_indent, insert_before_statement, line_indent, Rewrite};
use crate::validators::name_conflict::NameConflictValidator;

#[derive(Debug)]
pub struct ExtractFunction {
    target: TargetSpec,
    name: String,
}

impl ExtractFunction {
    pub fn from_params(params: &Params) -> MoltResult<Self> {
        let target = TargetSpec::parse(required_param(params, "target")?)?;
        if target.qualifiers().len() > 2 {
            return Err(MoltError::format(format!(
                "extract-function target '{}' must be 'function#L..' or 'Class::method#L..'",
                target
            )));
        }
        target.require_line_range()?;
        Ok(ExtractFunction {
            target,
            name: identifier_param(params, "name")?,
        })
    }
}

impl Refactoring for ExtractFunction {
    fn name(&self) -> &'static str {
        "extract-function"
    }

    fn apply(&self, source: &str) -> MoltResult<String> {
        let module = parse(source)?;
        let class_name = self.target.container().first().map(String::as_str);
        let (lo, hi) = self.target.require_line_range()?;
        let function = module.require_function(class_name, self.target.leaf())?;
        NameConflictValidator::from_module(&module).validate_function_name(&self.name)?;

        let region = Region::select(function, lo, hi)?;
        let analyzer = CrossScopeAnalyzer::for_function(&module, function);
        let free = analyzer.free_variables(region.start_line, region.end_line);
        let interface = Interface::new(&module, analyzer.flow(), &region, free);

        let mut params: Vec<String> = Vec::new();
        if class_name.is_some() {
            if let Some(receiver) = module.parameter_names(function).into_iter().next() {
                if region.mentions(&module, &receiver) && !interface.params.contains(&receiver) {
                    params.push(receiver);
                }
            }
        }
        params.extend(interface.params.iter().cloned());
        debug!(target = %self.target, ?params, outputs = ?interface.outputs, "extracting function");

        let unit = indent_unit(&module, function);
        let definition = format!(
            "def {}({}):\n{}\n\n",
            self.name,
            params.join(", "),
            render_body(&module, &region, &interface, &unit, true)
        );
        let call = format!("{}({})", self.name, params.join(", "));

        let mut rewrite = Rewrite::new(&module);
        rewrite.push(call_site_edit(&module, &region, &interface, &call));
        rewrite.push(insert_before_statement(
            &module,
            top_level_statement(function),
            &definition,
        ));
        rewrite.finish()
    }
}

/// One level of the source function's indentation.
fn indent_unit(module: &PythonModule, function: Node<'_>) -> String {
    let body = body_indent(module, function);
    body.strip_prefix(line_indent(module, function))
        .filter(|unit| !unit.is_empty())
        .unwrap_or("    ")
        .to_string()
}
