//! Error types for bilt
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration (.biltrc.toml) errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No configuration file found walking up from the start directory
    #[error("No .biltrc.toml found in '{start}' or any parent directory")]
    NotFound { start: PathBuf },

    /// Failed to read config file
    #[error("Failed to read config file '{path}': {error}")]
    ReadError { path: PathBuf, error: String },

    /// Failed to parse config file
    #[error("Failed to parse config file '{path}': {error}")]
    ParseError { path: PathBuf, error: String },

    /// A step refers to an option that is not declared in `[options]`
    #[error("Step '{step}' uses undeclared option '{option}'")]
    UndeclaredOption { step: String, option: String },

    /// A step has an empty command
    #[error("Step '{step}' has an empty command")]
    EmptyCommand { step: String },

    /// `--enable`/`--disable` named an unknown option
    #[error("Unknown option '{option}'")]
    UnknownOption { option: String },
}

/// package.json manifest errors
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Failed to read manifest
    #[error("Failed to read '{path}': {error}")]
    ReadError { path: PathBuf, error: String },

    /// Failed to parse manifest
    #[error("Failed to parse '{path}': {error}")]
    ParseError { path: PathBuf, error: String },

    /// Manifest has no name
    #[error("Package at '{path}' has no name")]
    MissingName { path: PathBuf },
}

/// Package discovery errors
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// A configured package directory does not contain a package.json
    #[error("No package.json in configured package directory '{directory}'")]
    MissingManifest { directory: String },

    /// Two packages share a name
    #[error("Package name '{name}' is used by both '{first}' and '{second}'")]
    DuplicateName {
        name: String,
        first: String,
        second: String,
    },

    /// Directory walk failed
    #[error("Failed to walk '{path}': {error}")]
    WalkError { path: PathBuf, error: String },

    /// Manifest error
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Package selection errors (CLI selectors resolved against known packages)
#[derive(Error, Debug)]
pub enum SelectionError {
    /// Selector does not match any package
    #[error("'{selector}' does not match any package directory or name")]
    UnknownPackage { selector: String },
}

/// Last-build marker errors
#[derive(Error, Debug)]
pub enum MarkerError {
    /// Failed to read marker
    #[error("Failed to read build marker '{path}': {error}")]
    ReadError { path: PathBuf, error: String },

    /// Failed to parse marker
    #[error("Failed to parse build marker '{path}': {error}")]
    ParseError { path: PathBuf, error: String },

    /// Failed to write marker
    #[error("Failed to write build marker '{path}': {error}")]
    WriteError { path: PathBuf, error: String },
}

/// Build step errors
#[derive(Error, Debug)]
pub enum StepError {
    /// Program not found on PATH
    #[error("Step '{step}': program '{program}' not found")]
    ProgramNotFound { step: String, program: String },

    /// Failed to spawn the step process
    #[error("Step '{step}' failed to start: {error}")]
    SpawnFailed { step: String, error: String },

    /// Step exited with a non-zero status
    #[error("Step '{step}' failed with {status}")]
    Failed { step: String, status: String },

    /// Variable substitution failed
    #[error("Step '{step}': {error}")]
    Substitution { step: String, error: String },
}

/// Build executor errors
///
/// These indicate that the build order and the package infos disagree, which
/// is a programming error rather than a build failure.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExecutorError {
    /// A build order node refers to an unknown package
    #[error("Build order refers to '{directory}' which has no package info")]
    MissingPackageInfo { directory: String },
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },
}

/// Errors of operations spanning git, markers and the filesystem
#[derive(Error, Debug)]
pub enum BiltError {
    /// Git error
    #[error("Git error: {0}")]
    Git(#[from] crate::infra::git::GitError),

    /// Marker error
    #[error("Marker error: {0}")]
    Marker(#[from] MarkerError),

    /// Filesystem error
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] FilesystemError),
}
