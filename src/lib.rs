//! Bilt - incremental builds for monorepos
//!
//! This library finds the packages of a repository, works out which of them
//! changed since they were last built, and builds those together with the
//! packages depending on them, dependencies first.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Dependency graph, change detection and build scheduling
//! - [`infra`] - Infrastructure layer (filesystem, git, processes)
//! - [`config`] - Configuration constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
