//! Free-variable detection for code regions.

use tree_sitter::Node;

use molt_core::error::MoltResult;

use crate::analysis::flow::VariableFlowAnalyzer;
use crate::cst::PythonModule;

/// Answers "what would this region capture if it became its own callable".
///
/// Shares the memoized access log of a [`VariableFlowAnalyzer`].
pub struct CrossScopeAnalyzer<'m> {
    flow: VariableFlowAnalyzer<'m>,
}

impl<'m> CrossScopeAnalyzer<'m> {
    pub fn new(
        module: &'m PythonModule,
        class_name: Option<&str>,
        function_name: &str,
    ) -> MoltResult<Self> {
        Ok(Self::from_flow(VariableFlowAnalyzer::new(
            module,
            class_name,
            function_name,
        )?))
    }

    pub fn for_function(module: &'m PythonModule, function: Node<'m>) -> Self {
        Self::from_flow(VariableFlowAnalyzer::for_function(module, function))
    }

    pub fn from_flow(flow: VariableFlowAnalyzer<'m>) -> Self {
        CrossScopeAnalyzer { flow }
    }

    /// The underlying flow analyzer.
    pub fn flow(&self) -> &VariableFlowAnalyzer<'m> {
        &self.flow
    }

    /// Names read in `[lo, hi]` whose nearest preceding write is absent or
    /// lies outside the range. First-seen order, no duplicates.
    pub fn free_variables(&self, lo: u32, hi: u32) -> Vec<String> {
        let log = self.flow.accesses();
        let mut free: Vec<String> = Vec::new();
        for (index, access) in log.iter().enumerate() {
            if !access.is_read || access.line < lo || access.line > hi {
                continue;
            }
            let definition = log[..index]
                .iter()
                .rev()
                .find(|a| a.is_write && a.name == access.name);
            let defined_inside = definition.is_some_and(|d| lo <= d.line && d.line <= hi);
            if !defined_inside && !free.contains(&access.name) {
                free.push(access.name.clone());
            }
        }
        free
    }

    /// True when the region reads anything defined outside it.
    pub fn needs_closure(&self, lo: u32, hi: u32) -> bool {
        !self.free_variables(lo, hi).is_empty()
    }

    /// Variables a closure over the region would capture.
    pub fn captured_variables(&self, lo: u32, hi: u32) -> Vec<String> {
        self.free_variables(lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "\
def process(factor):
    x = 10
    y = x + 5
    z = y * factor
    x = 3
    return x + z
";

    #[test]
    fn region_using_outer_definition_needs_closure() {
        let module = PythonModule::parse(SOURCE).unwrap();
        let analyzer = CrossScopeAnalyzer::new(&module, None, "process").unwrap();
        assert_eq!(analyzer.free_variables(3, 3), vec!["x"]);
        assert!(analyzer.needs_closure(3, 3));
    }

    #[test]
    fn self_contained_region_has_no_free_variables() {
        let module = PythonModule::parse(SOURCE).unwrap();
        let analyzer = CrossScopeAnalyzer::new(&module, None, "process").unwrap();
        assert!(analyzer.free_variables(2, 3).is_empty());
        assert!(!analyzer.needs_closure(2, 3));
    }

    #[test]
    fn parameters_are_free() {
        let module = PythonModule::parse(SOURCE).unwrap();
        let analyzer = CrossScopeAnalyzer::new(&module, None, "process").unwrap();
        assert_eq!(analyzer.captured_variables(2, 4), vec!["factor"]);
    }

    #[test]
    fn nearest_definition_wins() {
        let module = PythonModule::parse(SOURCE).unwrap();
        let analyzer = CrossScopeAnalyzer::new(&module, None, "process").unwrap();
        // `x` on line 6 comes from line 5, `z` from line 4.
        assert!(analyzer.free_variables(5, 6).contains(&"z".to_string()));
        assert!(!analyzer.free_variables(5, 6).contains(&"x".to_string()));
    }

    #[test]
    fn shares_memoized_log() {
        let module = PythonModule::parse(SOURCE).unwrap();
        let analyzer = CrossScopeAnalyzer::new(&module, None, "process").unwrap();
        analyzer.free_variables(2, 3);
        analyzer.needs_closure(4, 5);
        assert_eq!(analyzer.flow().traversal_count(), 1);
    }
}
