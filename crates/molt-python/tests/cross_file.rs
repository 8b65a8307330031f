// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Cross-file reference search and rewriting over a temporary tree.
//!
//! All tests pin the builtin backend so they do not depend on which
//! external search tools are installed.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use molt_core::error::MoltError;
use molt_python::files::{read_source, write_back};
use molt_python::references::{CallSiteUpdater, SearchBackend, UsagePattern};
use molt_python::{Params, Registry};

fn write(root: &Path, name: &str, source: &str) {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, source).unwrap();
}

fn read(root: &Path, name: &str) -> String {
    fs::read_to_string(root.join(name)).unwrap()
}

fn updater(root: &Path) -> CallSiteUpdater {
    CallSiteUpdater::new(root).with_backend(SearchBackend::Builtin)
}

// ============================================================================
// Attribute access vs. method call
// ============================================================================

mod precision {
    use super::*;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.py", "def boss(x):\n    return x.manager\n");
        write(dir.path(), "pkg/b.py", "def names(x):\n    print(x.manager.name)\n");
        write(dir.path(), "c.py", "def ask(x):\n    return x.manager()\n");
        dir
    }

    #[test]
    fn find_references_sees_only_attribute_accesses() {
        let dir = tree();
        let references = updater(dir.path())
            .find_references("manager", UsagePattern::AttributeAccess, None)
            .unwrap();
        let mut files: Vec<_> = references
            .iter()
            .map(|r| r.file.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        files.sort();
        assert_eq!(files, vec![Path::new("a.py"), Path::new("pkg/b.py")]);
        assert!(references.iter().all(|r| r.line == 2));
    }

    #[test]
    fn update_all_rewrites_exactly_the_attribute_forms() {
        let dir = tree();
        let summary = updater(dir.path())
            .update_all(
                "manager",
                UsagePattern::AttributeAccess,
                |site| Some(site.text.replace("manager", "supervisor")),
                None,
            )
            .unwrap();
        assert_eq!(summary.references_updated, 2);
        assert_eq!(summary.files_modified.len(), 2);
        assert_eq!(read(dir.path(), "a.py"), "def boss(x):\n    return x.supervisor\n");
        assert_eq!(
            read(dir.path(), "pkg/b.py"),
            "def names(x):\n    print(x.supervisor.name)\n"
        );
        assert_eq!(read(dir.path(), "c.py"), "def ask(x):\n    return x.manager()\n");
    }

    #[test]
    fn method_calls_are_their_own_pattern() {
        let dir = tree();
        let references = updater(dir.path())
            .find_references("manager", UsagePattern::MethodCall, None)
            .unwrap();
        assert_eq!(references.len(), 1);
        assert!(references[0].file.ends_with("c.py"));
    }

    #[test]
    fn base_object_narrows_the_match() {
        let dir = tree();
        write(dir.path(), "d.py", "def other(y):\n    return y.manager\n");
        let references = updater(dir.path())
            .find_references("manager", UsagePattern::AttributeAccess, Some("y"))
            .unwrap();
        assert_eq!(references.len(), 1);
        assert!(references[0].file.ends_with("d.py"));
    }
}

// ============================================================================
// Failure policy
// ============================================================================

mod failures {
    use super::*;

    #[test]
    fn one_unparsable_file_aborts_the_update() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.py", "def boss(x):\n    return x.manager\n");
        write(dir.path(), "z.py", "def broken(:\n    x.manager\n");
        let err = updater(dir.path())
            .find_references("manager", UsagePattern::AttributeAccess, None)
            .unwrap_err();
        assert!(matches!(err, MoltError::Parse { .. }));
        assert!(err.to_string().contains("z.py"));
    }

    #[test]
    fn unimplemented_pattern_is_rejected() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.py", "def f(manager):\n    return manager\n");
        let err = updater(dir.path())
            .find_references("manager", UsagePattern::Parameter, None)
            .unwrap_err();
        assert!(matches!(err, MoltError::UnsupportedPattern { .. }));
        assert_eq!(err.error_code().code(), 5);
    }
}

// ============================================================================
// Backend parity
// ============================================================================

mod backend_parity {
    use super::*;

    fn relative(root: &Path, backend: SearchBackend) -> Vec<String> {
        let mut files: Vec<String> = CallSiteUpdater::new(root)
            .with_backend(backend)
            .find_references("manager", UsagePattern::AttributeAccess, None)
            .unwrap()
            .into_iter()
            .map(|r| {
                r.file
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        files.sort();
        files
    }

    #[test]
    fn virtualenv_contents_never_reach_the_parser() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.py", "def boss(x):\n    return x.manager\n");
        write(dir.path(), "env/b.py", "def boss(x):\n    return x.manager\n");
        write(dir.path(), ".venv/lib/c.py", "def broken(:\n    x.manager\n");

        let builtin = relative(dir.path(), SearchBackend::Builtin);
        assert_eq!(builtin, vec!["a.py", "env/b.py"]);
        if SearchBackend::Grep.is_available() {
            assert_eq!(relative(dir.path(), SearchBackend::Grep), builtin);
        }
    }
}

// ============================================================================
// Hide delegate across files
// ============================================================================

mod hide_delegate {
    use super::*;

    const PERSON: &str = "\
class Person:
    def __init__(self, name, department):
        self.name = name
        self.department = department
";

    #[test]
    fn clients_in_other_files_call_the_getter() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "person.py", PERSON);
        write(
            dir.path(),
            "reports.py",
            "\
def manager_of(person):
    return person.department.manager


def budget_of(person):
    return person.department.budget


def call_manager(person):
    return person.department.manager()
",
        );

        let path = dir.path().join("person.py");
        let params: Params = [("target", "Person::department"), ("member", "manager")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let refactoring = Registry::builtin()
            .construct("hide-delegate", &path, &params)
            .unwrap();
        let original = read_source(&path).unwrap();
        let updated = refactoring.apply(&original).unwrap();
        assert!(write_back(&path, &original, &updated).unwrap());

        let summary = refactoring
            .follow_up(&updater(dir.path()))
            .unwrap()
            .unwrap();
        assert_eq!(summary.references_updated, 1);

        let reports = read(dir.path(), "reports.py");
        assert!(reports.contains("    return person.get_manager()\n"));
        assert!(reports.contains("    return person.department.budget\n"));
        assert!(reports.contains("    return person.department.manager()\n"));
        assert!(read(dir.path(), "person.py").contains("    def get_manager(self):\n"));
    }

    #[test]
    fn refactorings_without_cross_file_work_report_none() {
        let dir = TempDir::new().unwrap();
        let params: Params = [("target", "f"), ("new_name", "g")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let refactoring = Registry::builtin()
            .construct("rename", &dir.path().join("x.py"), &params)
            .unwrap();
        assert!(refactoring.follow_up(&updater(dir.path())).unwrap().is_none());
    }
}
