// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Cross-file reference discovery and rewriting.
//!
//! [`CallSiteUpdater`] turns lexical search hits into structurally
//! validated [`Reference`]s and rewrites them file by file:
//!
//! 1. One text search over the root for the symbol's name.
//! 2. Each candidate file is read and parsed once. A hit becomes a
//!    reference only if the identifier starting at its exact position sits
//!    in the leaf slot of the requested usage pattern and the pattern's
//!    validator accepts the enclosing node.
//! 3. For rewriting, every file gets one traversal; rewrites run in `leave`
//!    order, so a reference that encloses another sees the inner rewrite
//!    already applied to its own text.
//!
//! Any file that cannot be read or parsed aborts the whole operation.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};
use tree_sitter::Node;

use molt_core::edit::EditPrimitive;
use molt_core::error::{MoltError, MoltResult};
use molt_core::patch::Span;

use crate::cst::{column_of, line_of, span_of, PythonModule};
use crate::files::{read_source, write_back};
use crate::references::pattern::{validator_for, UsagePattern, UsageValidator};
use crate::references::search::{SearchBackend, TextMatch};
use crate::transform::{collect_edits, Rewrite, Transformer};

// ============================================================================
// Types
// ============================================================================

/// A validated use of a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub file: PathBuf,
    /// 1-indexed line of the symbol's leaf identifier.
    pub line: u32,
    /// 0-indexed byte column of the symbol's leaf identifier.
    pub column: u32,
    /// Byte span of the whole pattern node (e.g. the full call).
    pub span: Span,
    pub pattern: UsagePattern,
    /// The search hit this reference was resolved from.
    pub text_match: TextMatch,
}

/// Outcome of [`CallSiteUpdater::update_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateSummary {
    /// Files whose content changed, in path order.
    pub files_modified: Vec<PathBuf>,
    /// Number of references whose text was replaced.
    pub references_updated: usize,
}

/// What a rewrite callback sees for one reference.
pub struct RewriteSite<'a> {
    pub reference: &'a Reference,
    pub module: &'a PythonModule,
    /// The pattern node in the original tree.
    pub node: Node<'a>,
    /// Current text of the node, with rewrites of nested references applied.
    pub text: &'a str,
}

// ============================================================================
// Updater
// ============================================================================

/// Finds and rewrites symbol usages under a root directory.
#[derive(Debug, Clone)]
pub struct CallSiteUpdater {
    root: PathBuf,
    backend: Option<SearchBackend>,
}

impl CallSiteUpdater {
    /// Updater for `root`, using the best available search backend.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CallSiteUpdater {
            root: root.into(),
            backend: None,
        }
    }

    /// Use a specific search backend.
    pub fn with_backend(mut self, backend: SearchBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn backend(&self) -> SearchBackend {
        self.backend.unwrap_or_else(SearchBackend::best_available)
    }

    /// Search and group candidate hits by file.
    fn candidates(&self, symbol: &str) -> MoltResult<BTreeMap<PathBuf, Vec<TextMatch>>> {
        let mut by_file: BTreeMap<PathBuf, Vec<TextMatch>> = BTreeMap::new();
        for hit in self.backend().search(symbol, &self.root)? {
            by_file.entry(hit.file.clone()).or_default().push(hit);
        }
        Ok(by_file)
    }

    /// All validated references to `symbol` used as `pattern`.
    pub fn find_references(
        &self,
        symbol: &str,
        pattern: UsagePattern,
        base_object: Option<&str>,
    ) -> MoltResult<Vec<Reference>> {
        let validator = validator_for(pattern)?;
        let mut references = Vec::new();
        for (file, hits) in self.candidates(symbol)? {
            let module = parse_file(&file)?;
            references.extend(
                resolve(&module, validator, hits, symbol, base_object)
                    .into_iter()
                    .map(|(_, reference)| reference),
            );
        }
        debug!(symbol, pattern = %pattern, references = references.len(), "resolved references");
        Ok(references)
    }

    /// Rewrite every reference to `symbol` used as `pattern`.
    ///
    /// `rewrite` returns the replacement text for a site, or `None` to
    /// leave it alone. Each file is parsed, traversed and written at most
    /// once; files whose text does not change are not written.
    pub fn update_all<F>(
        &self,
        symbol: &str,
        pattern: UsagePattern,
        mut rewrite: F,
        base_object: Option<&str>,
    ) -> MoltResult<UpdateSummary>
    where
        F: FnMut(&RewriteSite<'_>) -> Option<String>,
    {
        let validator = validator_for(pattern)?;
        let mut summary = UpdateSummary::default();
        for (file, hits) in self.candidates(symbol)? {
            let original = read_source(&file)?;
            let module = PythonModule::parse(original.as_str())
                .map_err(|e| MoltError::from(e).in_file(&file))?;
            let resolved = resolve(&module, validator, hits, symbol, base_object);
            if resolved.is_empty() {
                continue;
            }

            let mut transformer = SiteRewriter {
                sites: resolved
                    .into_iter()
                    .map(|(node, reference)| (site_key(node), reference))
                    .collect(),
                pending: Vec::new(),
                rewritten: 0,
                rewrite: &mut rewrite,
            };
            let edits = collect_edits(&module, &mut transformer);
            let rewritten = transformer.rewritten;
            let updated = edits.finish()?;
            if write_back(&file, &original, &updated)? {
                summary.references_updated += rewritten;
                summary.files_modified.push(file);
            }
        }
        info!(
            symbol,
            files = summary.files_modified.len(),
            references = summary.references_updated,
            "updated references"
        );
        Ok(summary)
    }
}

fn parse_file(path: &Path) -> MoltResult<PythonModule> {
    let source = read_source(path)?;
    PythonModule::parse(source).map_err(|e| MoltError::from(e).in_file(path))
}

/// Turn the hits in one file into references, keeping the pattern node of
/// each. Hits that do not validate are dropped.
fn resolve<'m>(
    module: &'m PythonModule,
    validator: &dyn UsageValidator,
    hits: Vec<TextMatch>,
    symbol: &str,
    base_object: Option<&str>,
) -> Vec<(Node<'m>, Reference)> {
    let mut resolved: Vec<(Node<'m>, Reference)> = Vec::new();
    for hit in hits {
        let Some(identifier) = module.identifier_at(hit.line, hit.column) else {
            continue;
        };
        if module.text_of(identifier) != symbol {
            continue;
        }
        let Some(node) = validator.candidate(identifier) else {
            continue;
        };
        if !validator.matches(node, module, symbol, base_object) {
            continue;
        }
        if resolved.iter().any(|(seen, _)| seen.id() == node.id()) {
            continue;
        }
        resolved.push((
            node,
            Reference {
                file: hit.file.clone(),
                line: line_of(identifier),
                column: column_of(identifier),
                span: span_of(node),
                pattern: validator.pattern(),
                text_match: hit,
            },
        ));
    }
    resolved
}

// ============================================================================
// Rewriting
// ============================================================================

type SiteKey = (usize, usize, u16);

fn site_key(node: Node<'_>) -> SiteKey {
    (node.start_byte(), node.end_byte(), node.kind_id())
}

struct SiteRewriter<'r, F> {
    sites: HashMap<SiteKey, Reference>,
    /// Replacements made so far, innermost first.
    pending: Vec<(Span, String)>,
    rewritten: usize,
    rewrite: &'r mut F,
}

impl<F> SiteRewriter<'_, F> {
    /// Text of `span` with the pending inner replacements applied.
    fn current_text(&self, source: &str, span: Span) -> String {
        let mut inner: Vec<&(Span, String)> = self
            .pending
            .iter()
            .filter(|(s, _)| span.contains(s))
            .collect();
        inner.sort_by_key(|(s, _)| std::cmp::Reverse(s.start));
        let mut text = source[span.start..span.end].to_string();
        for (s, replacement) in inner {
            text.replace_range(s.start - span.start..s.end - span.start, replacement);
        }
        text
    }
}

impl<'m, F> Transformer<'m> for SiteRewriter<'_, F>
where
    F: FnMut(&RewriteSite<'_>) -> Option<String>,
{
    fn leave(&mut self, node: Node<'m>, rewrite: &mut Rewrite<'m>) {
        let module = rewrite.module();
        if node.kind() == "module" {
            rewrite.extend(self.pending.drain(..).map(|(span, new_text)| {
                EditPrimitive::Replace { span, new_text }
            }));
            return;
        }
        let Some(reference) = self.sites.get(&site_key(node)) else {
            return;
        };
        let span = span_of(node);
        let text = self.current_text(module.source(), span);
        let site = RewriteSite {
            reference,
            module,
            node,
            text: &text,
        };
        let Some(replacement) = (self.rewrite)(&site) else {
            return;
        };
        if replacement == text {
            return;
        }
        self.pending.retain(|(s, _)| !span.contains(s));
        self.pending.push((span, replacement));
        self.rewritten += 1;
    }
}
