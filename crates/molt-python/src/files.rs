//! Python file discovery and write-back.
//!
//! Provides directory walking for the builtin search backend and the single
//! read/write path every refactoring goes through.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use molt_core::error::{MoltError, MoltResult};

/// Tool-generated directories never descended into. Hidden directories
/// (`.git`, `.venv`, `.tox`) are skipped as well; ordinary names such as
/// `env` or `build` are searched like any other package.
const EXCLUDED_DIRS: &[&str] = &["__pycache__", "site-packages"];

fn is_excluded_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || EXCLUDED_DIRS.contains(&name.as_ref())
}

/// Collect `.py` files under `root`, sorted by path.
///
/// This is the file-selection policy for every search backend. A `root`
/// that is itself a `.py` file yields just that file.
pub fn collect_python_files(root: &Path) -> MoltResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_excluded_dir(e))
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            MoltError::io(&path, e.into())
        })?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "py") {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    debug!(root = %root.display(), count = files.len(), "collected python files");
    Ok(files)
}

/// Read a source file.
pub fn read_source(path: &Path) -> MoltResult<String> {
    fs::read_to_string(path).map_err(|e| MoltError::io(path, e))
}

/// Write `updated` to `path` if it differs from `original`.
///
/// Returns whether the file was written.
pub fn write_back(path: &Path, original: &str, updated: &str) -> MoltResult<bool> {
    if original == updated {
        debug!(path = %path.display(), "no changes; file left untouched");
        return Ok(false);
    }
    fs::write(path, updated).map_err(|e| MoltError::io(path, e))?;
    debug!(path = %path.display(), bytes = updated.len(), "wrote file");
    Ok(true)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn collects_python_files_and_skips_excluded_dirs() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.py", "x = 1\n");
        write(temp.path(), "pkg/b.py", "y = 2\n");
        write(temp.path(), "pkg/readme.md", "# no\n");
        write(temp.path(), ".hidden/c.py", "z = 3\n");
        write(temp.path(), "venv/lib/site-packages/d.py", "z = 3\n");
        write(temp.path(), "pkg/__pycache__/e.py", "z = 3\n");
        write(temp.path(), "env/settings.py", "z = 3\n");
        write(temp.path(), "build/steps.py", "z = 3\n");

        let files = collect_python_files(temp.path()).unwrap();
        let rel: Vec<String> = files
            .iter()
            .map(|p| {
                p.strip_prefix(temp.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        assert_eq!(rel, vec!["a.py", "build/steps.py", "env/settings.py", "pkg/b.py"]);
    }

    #[test]
    fn write_back_skips_unchanged() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("m.py");
        fs::write(&path, "x = 1\n").unwrap();
        assert!(!write_back(&path, "x = 1\n", "x = 1\n").unwrap());
        assert!(write_back(&path, "x = 1\n", "x = 2\n").unwrap());
        assert_eq!(read_source(&path).unwrap(), "x = 2\n");
    }

    #[test]
    fn read_missing_file_is_io_error() {
        let err = read_source(Path::new("/definitely/not/here.py")).unwrap_err();
        assert_eq!(err.error_code().code(), 10);
    }
}
