//! Git operations
//!
//! Reads the commit history and the working tree status with the git CLI,
//! and the HEAD commit with the gix crate. All paths handed out are relative
//! to the bilt root, which may be a subdirectory of the git work tree; files
//! outside it are dropped.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

use crate::config::defaults::STATE_DIR;
use crate::core::changes::Commit;
use crate::core::package::{timestamp_from_secs, Timestamp};

/// Git operation errors
#[derive(Error, Debug)]
pub enum GitError {
    /// The root is not inside a git work tree
    #[error("'{path}' is not inside a git work tree")]
    NotARepository { path: PathBuf },

    /// Failed to run git
    #[error("Failed to run git {command}: {error}")]
    CommandFailed { command: String, error: String },

    /// Unexpected git output
    #[error("Unexpected output from git {command}: {error}")]
    ParseFailed { command: String, error: String },

    /// Invalid repository
    #[error("Invalid repository at '{path}': {error}")]
    InvalidRepository { path: PathBuf, error: String },
}

/// HEAD commit of the repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadCommit {
    /// Full commit id
    pub id: String,
    /// Commit time
    pub time: Timestamp,
}

/// Git repository containing a bilt root
#[derive(Debug)]
pub struct GitRepository {
    root: PathBuf,
    prefix: String,
}

impl GitRepository {
    /// Open the repository containing `root`
    pub async fn open(root: &Path) -> Result<Self, GitError> {
        let output = Command::new("git")
            .args(["rev-parse", "--show-prefix"])
            .current_dir(root)
            .output()
            .await
            .map_err(|e| GitError::CommandFailed {
                command: "rev-parse".to_string(),
                error: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(GitError::NotARepository {
                path: root.to_path_buf(),
            });
        }

        let prefix = String::from_utf8_lossy(&output.stdout).trim().to_string();
        tracing::debug!("Bilt root is '{prefix}' inside the git work tree");
        Ok(Self {
            root: root.to_path_buf(),
            prefix,
        })
    }

    /// The bilt root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether HEAD points at a commit
    pub async fn has_commits(&self) -> Result<bool, GitError> {
        let output = Command::new("git")
            .args(["rev-parse", "--verify", "-q", "HEAD"])
            .current_dir(&self.root)
            .output()
            .await
            .map_err(|e| GitError::CommandFailed {
                command: "rev-parse".to_string(),
                error: e.to_string(),
            })?;
        Ok(output.status.success())
    }

    /// Up to `depth` commits reachable from HEAD, newest first
    pub async fn history(&self, depth: usize) -> Result<Vec<Commit>, GitError> {
        if depth == 0 || !self.has_commits().await? {
            return Ok(Vec::new());
        }

        let max_count = format!("--max-count={depth}");
        let stdout = self
            .run(&[
                "-c",
                "core.quotePath=false",
                "log",
                "--no-renames",
                "--format=%x1e%H %ct",
                "--name-only",
                &max_count,
            ])
            .await?;

        let mut commits = parse_log(&stdout)?;
        for commit in &mut commits {
            commit.files = self.relative_to_root(std::mem::take(&mut commit.files));
        }
        tracing::debug!("Read {} commits", commits.len());
        Ok(commits)
    }

    /// Files with uncommitted changes, untracked files included
    pub async fn uncommitted_files(&self) -> Result<Vec<String>, GitError> {
        let stdout = self
            .run(&["status", "--porcelain=v1", "-z", "--untracked-files=all"])
            .await?;
        let files = parse_status(&stdout)?;
        Ok(self.relative_to_root(files))
    }

    /// The HEAD commit, `None` in a repository without commits
    pub async fn head_commit(&self) -> Result<Option<HeadCommit>, GitError> {
        if !self.has_commits().await? {
            return Ok(None);
        }

        let invalid = |e: &dyn std::fmt::Display| GitError::InvalidRepository {
            path: self.root.clone(),
            error: e.to_string(),
        };
        let repo = gix::discover(&self.root).map_err(|e| invalid(&e))?;
        let commit = repo.head_commit().map_err(|e| invalid(&e))?;
        let time = commit.time().map_err(|e| invalid(&e))?;

        Ok(Some(HeadCommit {
            id: commit.id.to_string(),
            time: timestamp_from_secs(time.seconds),
        }))
    }

    async fn run(&self, args: &[&str]) -> Result<String, GitError> {
        let command = args.join(" ");

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .await
            .map_err(|e| GitError::CommandFailed {
                command: command.clone(),
                error: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command,
                error: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|e| GitError::ParseFailed {
            command,
            error: e.to_string(),
        })
    }

    /// Work tree paths to root-relative paths, dropping bilt state files
    fn relative_to_root(&self, files: Vec<String>) -> Vec<String> {
        files
            .into_iter()
            .filter_map(|file| file.strip_prefix(self.prefix.as_str()).map(ToString::to_string))
            .filter(|file| !file.starts_with(&format!("{STATE_DIR}/")))
            .collect()
    }
}

/// Parse `git log --format=%x1e%H %ct --name-only`
fn parse_log(stdout: &str) -> Result<Vec<Commit>, GitError> {
    let parse_error = |error: String| GitError::ParseFailed {
        command: "log".to_string(),
        error,
    };

    stdout
        .split('\x1e')
        .filter(|record| !record.trim().is_empty())
        .map(|record| {
            let mut lines = record.lines();
            let header = lines.next().unwrap_or_default();
            let (id, time) = header
                .split_once(' ')
                .ok_or_else(|| parse_error(format!("bad commit header '{header}'")))?;
            let time = time
                .trim()
                .parse::<i64>()
                .map(timestamp_from_secs)
                .map_err(|e| parse_error(format!("bad commit time '{time}': {e}")))?;
            let files = lines
                .map(str::trim_end)
                .filter(|line| !line.is_empty())
                .map(ToString::to_string)
                .collect();

            Ok(Commit {
                id: id.to_string(),
                time,
                files,
            })
        })
        .collect()
}

/// Parse `git status --porcelain=v1 -z`
///
/// Renames and copies list the new path, then the original path as a
/// separate entry; both count as changed.
fn parse_status(stdout: &str) -> Result<Vec<String>, GitError> {
    let mut files = Vec::new();
    let mut entries = stdout.split('\0').filter(|e| !e.is_empty());

    while let Some(entry) = entries.next() {
        if entry.len() < 4 || !entry.is_char_boundary(3) {
            return Err(GitError::ParseFailed {
                command: "status".to_string(),
                error: format!("bad status entry '{entry}'"),
            });
        }
        let (status, path) = entry.split_at(3);
        files.push(path.to_string());
        if status.starts_with('R') || status.starts_with('C') {
            if let Some(original) = entries.next() {
                files.push(original.to_string());
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}
