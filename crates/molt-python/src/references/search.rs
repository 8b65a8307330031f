// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Pluggable literal text search over Python files.
//!
//! External tools are preferred when installed (`rg`, then `ag`, then
//! `grep`); the builtin scanner is always available. Every backend returns
//! the same [`TextMatch`] shape with one entry per occurrence, so a line
//! that mentions the pattern twice yields two matches regardless of how the
//! tool reports it.
//!
//! Which files are searched is decided by
//! [`collect_python_files`](crate::files::collect_python_files) alone.
//! External tools run with their own ignore rules switched off and their
//! hits are kept only for files in that set.

use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use molt_core::error::MoltError;

use crate::files::{collect_python_files, read_source};

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by a search backend.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The backend's executable is not installed.
    #[error("search backend '{backend}' is not available")]
    Unavailable { backend: SearchBackend },

    /// The external tool could not be started.
    #[error("failed to run {backend}: {source}")]
    Spawn {
        backend: SearchBackend,
        #[source]
        source: io::Error,
    },

    /// The external tool exited with an error status.
    #[error("{backend} failed: {stderr}")]
    ToolFailed {
        backend: SearchBackend,
        stderr: String,
    },

    /// The builtin scanner could not read the tree.
    #[error(transparent)]
    Molt(#[from] MoltError),
}

impl From<SearchError> for MoltError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Molt(inner) => inner,
            other => MoltError::internal(other.to_string()),
        }
    }
}

/// Result type for search operations.
pub type SearchResult<T> = Result<T, SearchError>;

// ============================================================================
// Text Match
// ============================================================================

/// One literal occurrence of the search pattern.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct TextMatch {
    pub file: PathBuf,
    /// 1-indexed line number.
    pub line: u32,
    /// 0-indexed byte column of the match start.
    pub column: u32,
    /// The matched text (the pattern itself).
    pub text: String,
    /// The full line containing the match, without its newline.
    pub line_text: String,
}

/// One match per occurrence of `pattern` in `line_text`.
fn expand_line(file: &Path, line: u32, line_text: &str, pattern: &str) -> Vec<TextMatch> {
    if pattern.is_empty() {
        return Vec::new();
    }
    line_text
        .match_indices(pattern)
        .map(|(column, _)| TextMatch {
            file: file.to_path_buf(),
            line,
            column: column as u32,
            text: pattern.to_string(),
            line_text: line_text.to_string(),
        })
        .collect()
}

// ============================================================================
// Backends
// ============================================================================

/// Available search implementations, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchBackend {
    Ripgrep,
    SilverSearcher,
    Grep,
    Builtin,
}

impl SearchBackend {
    /// All backends, fastest first.
    pub const PRIORITY: [SearchBackend; 4] = [
        SearchBackend::Ripgrep,
        SearchBackend::SilverSearcher,
        SearchBackend::Grep,
        SearchBackend::Builtin,
    ];

    /// Executable name for external backends.
    pub fn program(&self) -> Option<&'static str> {
        match self {
            SearchBackend::Ripgrep => Some("rg"),
            SearchBackend::SilverSearcher => Some("ag"),
            SearchBackend::Grep => Some("grep"),
            SearchBackend::Builtin => None,
        }
    }

    /// True if the backend can run on this machine.
    pub fn is_available(&self) -> bool {
        match self.program() {
            Some(program) => which::which(program).is_ok(),
            None => true,
        }
    }

    /// The first available backend in [`PRIORITY`](Self::PRIORITY) order.
    pub fn best_available() -> SearchBackend {
        let backend = Self::PRIORITY
            .into_iter()
            .find(|b| b.is_available())
            .unwrap_or(SearchBackend::Builtin);
        debug!(backend = %backend, "selected search backend");
        backend
    }

    /// Find every literal occurrence of `pattern` in the `.py` files under
    /// `directory`.
    pub fn search(&self, pattern: &str, directory: &Path) -> SearchResult<Vec<TextMatch>> {
        let mut matches = match self {
            SearchBackend::Builtin => builtin_search(pattern, directory)?,
            external => {
                let selected: BTreeSet<PathBuf> =
                    collect_python_files(directory)?.into_iter().collect();
                let mut found = external_search(*external, pattern, directory)?;
                found.retain(|m| selected.contains(&m.file));
                found
            }
        };
        matches.sort();
        matches.dedup();
        debug!(backend = %self, pattern, matches = matches.len(), "text search finished");
        Ok(matches)
    }
}

impl fmt::Display for SearchBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchBackend::Ripgrep => "rg",
            SearchBackend::SilverSearcher => "ag",
            SearchBackend::Grep => "grep",
            SearchBackend::Builtin => "builtin",
        };
        f.write_str(name)
    }
}

impl FromStr for SearchBackend {
    type Err = MoltError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rg" | "ripgrep" => Ok(SearchBackend::Ripgrep),
            "ag" => Ok(SearchBackend::SilverSearcher),
            "grep" => Ok(SearchBackend::Grep),
            "builtin" => Ok(SearchBackend::Builtin),
            other => Err(MoltError::invalid_args(format!(
                "unknown search backend '{}'",
                other
            ))),
        }
    }
}

fn builtin_search(pattern: &str, directory: &Path) -> SearchResult<Vec<TextMatch>> {
    let mut matches = Vec::new();
    for file in collect_python_files(directory)? {
        let content = read_source(&file)?;
        for (index, line_text) in content.lines().enumerate() {
            matches.extend(expand_line(&file, index as u32 + 1, line_text, pattern));
        }
    }
    Ok(matches)
}

fn external_search(
    backend: SearchBackend,
    pattern: &str,
    directory: &Path,
) -> SearchResult<Vec<TextMatch>> {
    let program = backend
        .program()
        .filter(|_| backend.is_available())
        .ok_or(SearchError::Unavailable { backend })?;

    let mut command = Command::new(program);
    match backend {
        SearchBackend::Ripgrep => {
            command
                .current_dir(directory)
                .args(["--line-number", "--no-heading", "--with-filename", "--null"])
                .args(["--no-ignore", "--hidden", "--no-messages"])
                .args(["--color", "never", "--type", "py", "--fixed-strings", "--"])
                .arg(pattern);
        }
        SearchBackend::SilverSearcher => {
            command
                .current_dir(directory)
                .args(["--line-numbers", "--nogroup", "--nocolor", "--filename", "--null"])
                .args(["--hidden", "--skip-vcs-ignores", "--python", "--literal", "--"])
                .arg(pattern);
        }
        _ => {
            command
                .args(["-r", "-n", "-H", "-F", "--null", "--include=*.py", "--"])
                .arg(pattern)
                .arg(directory);
        }
    }

    let output = command
        .output()
        .map_err(|source| SearchError::Spawn { backend, source })?;
    // Exit status 1 means "no matches" for all three tools.
    if !output.status.success() && output.status.code() != Some(1) {
        return Err(SearchError::ToolFailed {
            backend,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let relative_to = match backend {
        SearchBackend::Grep => None,
        _ => Some(directory),
    };
    let mut seen: BTreeSet<(PathBuf, u32)> = BTreeSet::new();
    let mut matches = Vec::new();
    for raw in stdout.lines() {
        let Some((file, line, line_text)) = parse_output_line(raw) else {
            warn!(backend = %backend, line = raw, "unparsable search output");
            continue;
        };
        let file = match relative_to {
            Some(dir) => dir.join(file),
            None => PathBuf::from(file),
        };
        if seen.insert((file.clone(), line)) {
            matches.extend(expand_line(&file, line, line_text, pattern));
        }
    }
    Ok(matches)
}

/// Split one line of tool output into file, line number and text.
///
/// Accepts `path\0line:text` (the `--null` form) and falls back to
/// `path.py:line:text`, anchored on the `.py:<digits>:` suffix so colons
/// inside the path (drive letters) stay part of it.
fn parse_output_line(raw: &str) -> Option<(&str, u32, &str)> {
    if let Some((file, rest)) = raw.split_once('\0') {
        let rest = rest.strip_prefix(':').unwrap_or(rest);
        let (line, text) = rest.split_once(':')?;
        return Some((file, line.parse().ok()?, text));
    }
    raw.match_indices(".py:").find_map(|(index, suffix)| {
        let file_end = index + suffix.len() - 1;
        let (line, text) = raw[file_end + 1..].split_once(':')?;
        if line.is_empty() || !line.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some((&raw[..file_end], line.parse().ok()?, text))
    })
}

// ============================================================================
// Tests
// ============================================================================
