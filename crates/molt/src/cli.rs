//! Command implementations behind the `molt` binary.
//!
//! Each command returns a serializable report; `main.rs` decides whether to
//! render it as text or JSON. Nothing here prints.
//!
//! ## Error Handling
//!
//! All functions return `MoltResult<T>`. The caller maps the error to its
//! [`OutputErrorCode`](molt_core::error::OutputErrorCode) exit status.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use molt_core::diff::generate_unified_diff;
use molt_core::error::{MoltError, MoltResult};
use molt_core::target::TargetSpec;
use molt_python::files::{read_source, write_back};
use molt_python::references::{CallSiteUpdater, Reference, SearchBackend, UpdateSummary, UsagePattern};
use molt_python::{Params, Registry};

// ============================================================================
// Parameters
// ============================================================================

/// Parse one `--param key=value` argument.
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!(
            "invalid parameter '{}', expected 'key=value' (e.g. 'new_name=total')",
            raw
        )),
    }
}

/// Collect `key=value` pairs, rejecting a key given twice.
pub fn collect_params(pairs: Vec<(String, String)>) -> MoltResult<Params> {
    let mut params = Params::new();
    for (key, value) in pairs {
        if params.contains_key(&key) {
            return Err(MoltError::invalid_args(format!(
                "parameter '{}' given more than once",
                key
            )));
        }
        params.insert(key, value);
    }
    Ok(params)
}

// ============================================================================
// apply
// ============================================================================

/// Inputs of one `apply` invocation.
#[derive(Debug, Clone)]
pub struct ApplyRequest {
    pub refactoring: String,
    pub file: PathBuf,
    pub params: Params,
    pub dry_run: bool,
    /// Root searched for cross-file updates (defaults to the file's directory).
    pub root: Option<PathBuf>,
    pub backend: Option<SearchBackend>,
}

impl ApplyRequest {
    fn search_root(&self) -> PathBuf {
        match (&self.root, self.file.parent()) {
            (Some(root), _) => root.clone(),
            (None, Some(parent)) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn updater(&self) -> CallSiteUpdater {
        let updater = CallSiteUpdater::new(self.search_root());
        match self.backend {
            Some(backend) => updater.with_backend(backend),
            None => updater,
        }
    }
}

/// Outcome of `apply`.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub refactoring: String,
    pub file: PathBuf,
    pub changed: bool,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cross_file: Option<UpdateSummary>,
}

impl fmt::Display for ApplyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(diff) = &self.diff {
            return f.write_str(diff);
        }
        write!(f, "Applied {} to {}", self.refactoring, self.file.display())?;
        if let Some(summary) = &self.cross_file {
            write!(
                f,
                "\nUpdated {} reference(s) in {} other file(s)",
                summary.references_updated,
                summary.files_modified.len()
            )?;
        }
        Ok(())
    }
}

/// Run a registry refactoring on one file.
///
/// 1. Construct the refactoring (unknown names and missing parameters fail
///    before the file is read).
/// 2. Apply it to the file's text.
/// 3. Dry run: diff and stop. Otherwise write the file if it changed.
/// 4. Run the refactoring's cross-file follow-up under the search root.
pub fn run_apply(request: &ApplyRequest) -> MoltResult<ApplyReport> {
    let refactoring = Registry::builtin().construct(
        &request.refactoring,
        &request.file,
        &request.params,
    )?;
    let original = read_source(&request.file)?;
    let updated = refactoring
        .apply(&original)
        .map_err(|e| e.in_file(&request.file))?;

    let mut report = ApplyReport {
        refactoring: request.refactoring.clone(),
        file: request.file.clone(),
        changed: original != updated,
        dry_run: request.dry_run,
        diff: None,
        cross_file: None,
    };
    if request.dry_run {
        let label = request.file.display().to_string();
        report.diff = Some(generate_unified_diff(&label, &original, &updated));
        return Ok(report);
    }

    write_back(&request.file, &original, &updated)?;
    report.cross_file = refactoring.follow_up(&request.updater())?;
    info!(
        refactoring = %request.refactoring,
        file = %request.file.display(),
        changed = report.changed,
        "applied refactoring"
    );
    Ok(report)
}

// ============================================================================
// list
// ============================================================================

/// One line of `molt list`.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub summary: &'static str,
    pub required_params: &'static [&'static str],
    pub optional_params: &'static [&'static str],
}

impl fmt::Display for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<45} {}", self.name, self.required_params.join(", "))?;
        if !self.optional_params.is_empty() {
            write!(f, " [{}]", self.optional_params.join(", "))?;
        }
        Ok(())
    }
}

pub fn list_refactorings() -> Vec<CatalogEntry> {
    Registry::builtin()
        .descriptors()
        .iter()
        .map(|d| CatalogEntry {
            name: d.name,
            summary: d.summary,
            required_params: d.required_params,
            optional_params: d.optional_params,
        })
        .collect()
}

// ============================================================================
// references
// ============================================================================

/// Validated references to a symbol under a root.
pub fn find_references(
    root: &Path,
    symbol: &str,
    pattern: UsagePattern,
    base_object: Option<&str>,
    backend: Option<SearchBackend>,
) -> MoltResult<Vec<Reference>> {
    let updater = CallSiteUpdater::new(root);
    let updater = match backend {
        Some(backend) => updater.with_backend(backend),
        None => updater,
    };
    updater.find_references(symbol, pattern, base_object)
}

/// `file:line:column: text` for one reference.
pub fn format_reference(reference: &Reference) -> String {
    format!(
        "{}:{}:{}: {}",
        reference.file.display(),
        reference.line,
        reference.column + 1,
        reference.text_match.line_text.trim_end()
    )
}

// ============================================================================
// target
// ============================================================================

/// Parsed structure of a target string.
#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub raw: String,
    pub qualifiers: Vec<String>,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
}

impl fmt::Display for TargetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "qualifiers: {}", self.qualifiers.join(" > "))?;
        if let (Some(start), Some(end)) = (self.start_line, self.end_line) {
            write!(f, "\nlines: {}-{}", start, end)?;
        }
        Ok(())
    }
}

pub fn describe_target(raw: &str) -> MoltResult<TargetReport> {
    let spec = TargetSpec::parse(raw)?;
    let range = spec.line_range();
    Ok(TargetReport {
        raw: raw.to_string(),
        qualifiers: spec.qualifiers().to_vec(),
        start_line: range.map(|(start, _)| start),
        end_line: range.map(|(_, end)| end),
    })
}

// ============================================================================
// Tests
// ============================================================================
