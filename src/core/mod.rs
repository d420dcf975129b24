//! Core business logic module
//!
//! Graph algorithms and scheduling are pure; reading markers and running
//! build steps go through [`crate::infra`].
//!
//! # Submodules
//!
//! - [`package`] - Package model
//! - [`manifest`] - Manifest (package.json) parsing
//! - [`config`] - Repository configuration (.biltrc.toml)
//! - [`graph`] - Dependency graph, cycle snipping and dirty propagation
//! - [`packages_to_build`] - Selection of the packages to build
//! - [`build_order`] - Dependency-first build forest
//! - [`executor`] - Build execution and failure propagation
//! - [`changes`] - Latest change of each package
//! - [`marker`] - Last-build markers
//! - [`dirty`] - Build times from markers and changes
//! - [`phases`] - Before, during and after phase steps
//! - [`selection`] - Command line package selectors

pub mod build_order;
pub mod changes;
pub mod config;
pub mod dirty;
pub mod executor;
pub mod graph;
pub mod manifest;
pub mod marker;
pub mod package;
pub mod packages_to_build;
pub mod phases;
pub mod selection;
