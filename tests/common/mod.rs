//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// During step appending the package name to `build.log` in the root
pub const LOGGING_STEPS: &str = r#"
[[steps.during]]
name = "build"
command = ["sh", "-c", 'echo "$BILT_PACKAGE_NAME" >> "$BILT_ROOT/build.log"']
"#;

/// The packages `e, d(->e), c(->e), b(->d), a(->b,c), f` under `packages/`
pub const SAMPLE_GRAPH: &[(&str, &[&str])] = &[
    ("a", &["b", "c"]),
    ("b", &["d"]),
    ("c", &["e"]),
    ("d", &["e"]),
    ("e", &[]),
    ("f", &[]),
];

/// Test project context
///
/// Creates a temporary directory for test repositories and provides
/// utilities for setting up test scenarios.
pub struct TestProject {
    /// Temporary directory for the test project
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new test project in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Project with `.biltrc.toml` and the packages of `graph`
    pub fn with_packages(config: &str, graph: &[(&str, &[&str])]) -> Self {
        let project = Self::new();
        project.create_file(".biltrc.toml", config);
        project.create_file("package.json", r#"{ "private": true }"#);
        for (name, deps) in graph {
            project.add_package(name, deps);
        }
        project
    }

    /// Get the path to the test project directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Create a file in the test project
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Add `packages/<name>` with a package.json and an index.js
    pub fn add_package(&self, name: &str, deps: &[&str]) {
        let deps: serde_json::Map<String, serde_json::Value> = deps
            .iter()
            .map(|d| ((*d).to_string(), serde_json::Value::from("*")))
            .collect();
        let manifest = serde_json::json!({
            "name": name,
            "version": "1.0.0",
            "dependencies": deps,
        });
        self.create_file(&format!("packages/{name}/package.json"), &manifest.to_string());
        self.create_file(&format!("packages/{name}/index.js"), "module.exports = {};\n");
    }

    /// Check if a file exists in the test project
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Read a file from the test project
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("Failed to read file")
    }

    /// Package names logged by [`LOGGING_STEPS`], then clear the log
    pub fn take_build_log(&self) -> Vec<String> {
        let path = self.dir.path().join("build.log");
        let Ok(content) = std::fs::read_to_string(&path) else {
            return Vec::new();
        };
        std::fs::remove_file(&path).expect("Failed to remove build log");
        content.lines().map(ToString::to_string).collect()
    }

    /// Run bilt in the project directory
    pub fn bilt(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_bilt"))
            .current_dir(self.path())
            .env_remove("BILT_CONFIG")
            .args(args)
            .output()
            .expect("Failed to execute bilt")
    }

    /// Run git in the project directory, panicking on failure
    pub fn git(&self, args: &[&str]) {
        let output = Command::new("git")
            .current_dir(self.path())
            .env("GIT_AUTHOR_NAME", "Test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "Test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .args(["-c", "commit.gpgsign=false"])
            .args(args)
            .output()
            .expect("Failed to execute git");
        assert!(
            output.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    /// Turn the project into a git repository with everything committed
    pub fn init_git(&self) {
        self.create_file(".gitignore", "build.log\n");
        self.git(&["init", "-q"]);
        self.commit_all("initial");
    }

    /// Commit every change
    pub fn commit_all(&self, message: &str) {
        self.git(&["add", "-A"]);
        self.git(&["commit", "-q", "-m", message]);
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a program is available to the tests
pub fn has_program(program: &str) -> bool {
    which::which(program).is_ok()
}

/// Standard output as a string
pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Standard error as a string
pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Directories in a `--json` build report, in report order
pub fn reported(output: &Output, result: &str) -> Vec<String> {
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Build report is not JSON");
    report["results"]
        .as_array()
        .expect("Build report has no results")
        .iter()
        .filter(|r| r["build_result"] == result)
        .map(|r| {
            r["package"]["directory"]
                .as_str()
                .expect("Result has no directory")
                .trim_start_matches("packages/")
                .to_string()
        })
        .collect()
}
