//! Step processes
//!
//! Runs one build step command in a directory. The program is resolved with
//! `which` before spawning so that a missing tool is reported by name.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::error::StepError;

/// A fully substituted command ready to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCommand {
    /// Step name, for errors and output
    pub name: String,
    /// Program followed by its arguments
    pub argv: Vec<String>,
    /// Working directory
    pub cwd: PathBuf,
    /// Environment added to the inherited one
    pub env: BTreeMap<String, String>,
}

/// Captured output of a successful step
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

/// Resolve a program the way a shell would, relative paths against `cwd`
pub fn resolve_program(program: &str, cwd: &Path) -> Option<PathBuf> {
    which::which_in(program, std::env::var_os("PATH"), cwd).ok()
}

/// Run a step to completion
///
/// Output is captured; on failure the tail of stderr becomes part of the
/// error.
pub async fn run_step(step: &StepCommand) -> Result<StepOutput, StepError> {
    let Some((program, args)) = step.argv.split_first() else {
        return Err(StepError::SpawnFailed {
            step: step.name.clone(),
            error: "empty command".to_string(),
        });
    };

    let resolved = resolve_program(program, &step.cwd).ok_or_else(|| StepError::ProgramNotFound {
        step: step.name.clone(),
        program: program.clone(),
    })?;

    tracing::debug!("{}: {} (in {})", step.name, step.argv.join(" "), step.cwd.display());

    let output = Command::new(&resolved)
        .args(args)
        .current_dir(&step.cwd)
        .envs(&step.env)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| StepError::SpawnFailed {
            step: step.name.clone(),
            error: e.to_string(),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        let status = match output.status.code() {
            Some(code) => format!("exit code {code}"),
            None => "a signal".to_string(),
        };
        let tail = tail_lines(&stderr, 20);
        return Err(StepError::Failed {
            step: step.name.clone(),
            status: if tail.is_empty() { status } else { format!("{status}\n{tail}") },
        });
    }

    Ok(StepOutput { stdout, stderr })
}

fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    lines[lines.len().saturating_sub(count)..].join("\n")
}
