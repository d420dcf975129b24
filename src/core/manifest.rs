//! Package manifest (package.json) parsing
//!
//! Only the fields bilt needs are read: the package name, the four
//! dependency tables and the scripts.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::ManifestError;

/// The parts of a package.json bilt uses
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Package name
    #[serde(default)]
    pub name: Option<String>,

    /// Runtime dependencies
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,

    /// Development dependencies
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,

    /// Peer dependencies
    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,

    /// Optional dependencies
    #[serde(default)]
    pub optional_dependencies: BTreeMap<String, String>,

    /// npm scripts
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
}

impl Manifest {
    /// Parse manifest text
    pub fn from_json(content: &str, path: &Path) -> Result<Self, ManifestError> {
        serde_json::from_str(content).map_err(|e| ManifestError::ParseError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Load a manifest file
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::ReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_json(&content, path)
    }

    /// Package name, required for every package
    pub fn require_name(&self, path: &Path) -> Result<&str, ManifestError> {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ManifestError::MissingName {
                path: path.to_path_buf(),
            })
    }

    /// Names of all dependencies of any kind, sorted and deduplicated
    pub fn dependency_names(&self) -> BTreeSet<String> {
        [
            &self.dependencies,
            &self.dev_dependencies,
            &self.peer_dependencies,
            &self.optional_dependencies,
        ]
        .into_iter()
        .flat_map(BTreeMap::keys)
        .cloned()
        .collect()
    }

    /// Whether the manifest defines a script
    pub fn has_script(&self, script: &str) -> bool {
        self.scripts.contains_key(script)
    }
}
