//! Last-build markers
//!
//! One JSON file per package under `.bilt/last-build/` records when a package
//! was last built, the commit it was built at and, when the working tree had
//! uncommitted changes in that package, the hashes of those files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::defaults::{MARKER_DIR, STATE_DIR};
use crate::core::changes::find_changed_files;
use crate::core::package::{current_timestamp, Package, Timestamp, ROOT_DIRECTORY};
use crate::error::{BiltError, MarkerError};
use crate::infra::filesystem::hash_files;
use crate::infra::git::{GitRepository, HeadCommit};

/// Record of a package's last successful build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastBuildMarker {
    /// HEAD commit at build time; `None` in a repository without commits
    pub commit: Option<String>,

    /// Commit time of `commit` (0 without commits)
    pub commit_time: Timestamp,

    /// When the build finished
    pub build_time: Timestamp,

    /// Uncommitted files of the package and their SHA-256 at build time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_files_in_workspace: Option<BTreeMap<String, String>>,
}

impl LastBuildMarker {
    /// Workspace hashes, empty when none were recorded
    pub fn workspace_hashes(&self) -> BTreeMap<String, String> {
        self.changed_files_in_workspace.clone().unwrap_or_default()
    }
}

/// Reads and writes markers of one repository
#[derive(Debug, Clone)]
pub struct MarkerStore {
    dir: PathBuf,
}

impl MarkerStore {
    /// Marker store of the repository at `root`
    pub fn new(root: &Path) -> Self {
        Self {
            dir: root.join(STATE_DIR).join(MARKER_DIR),
        }
    }

    /// Directory holding the marker files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a package's marker file
    pub fn marker_path(&self, package: &Package) -> PathBuf {
        let stem = if package.directory == ROOT_DIRECTORY {
            "_root".to_string()
        } else {
            package.directory.replace('/', "__")
        };
        self.dir.join(format!("{stem}.json"))
    }

    /// Load a package's marker; `None` if it was never built
    pub fn load(&self, package: &Package) -> Result<Option<LastBuildMarker>, MarkerError> {
        let path = self.marker_path(package);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| MarkerError::ReadError {
            path: path.clone(),
            error: e.to_string(),
        })?;

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| MarkerError::ParseError {
                path,
                error: e.to_string(),
            })
    }

    /// Load the markers of several packages, keyed by directory
    pub fn load_all<'a>(
        &self,
        packages: impl IntoIterator<Item = &'a Package>,
    ) -> Result<BTreeMap<String, LastBuildMarker>, MarkerError> {
        let mut markers = BTreeMap::new();
        for package in packages {
            if let Some(marker) = self.load(package)? {
                markers.insert(package.directory.clone(), marker);
            }
        }
        Ok(markers)
    }

    /// Save a package's marker
    pub fn save(&self, package: &Package, marker: &LastBuildMarker) -> Result<(), MarkerError> {
        let path = self.marker_path(package);
        fs::create_dir_all(&self.dir).map_err(|e| MarkerError::WriteError {
            path: self.dir.clone(),
            error: e.to_string(),
        })?;

        let content = serde_json::to_string_pretty(marker).map_err(|e| MarkerError::WriteError {
            path: path.clone(),
            error: e.to_string(),
        })?;

        fs::write(&path, content).map_err(|e| MarkerError::WriteError {
            path,
            error: e.to_string(),
        })
    }
}

/// Writes markers for packages as they finish building
#[derive(Debug)]
pub struct MarkerRecorder<'a> {
    store: MarkerStore,
    git: &'a GitRepository,
    head: Option<HeadCommit>,
}

impl<'a> MarkerRecorder<'a> {
    /// Recorder stamping markers with the current HEAD commit
    pub async fn new(store: MarkerStore, git: &'a GitRepository) -> Result<Self, BiltError> {
        let head = git.head_commit().await?;
        Ok(Self { store, git, head })
    }

    /// Record a successful build of `package`
    ///
    /// The working tree is read again so that files the build itself left
    /// behind are part of the recorded state.
    pub async fn record(&self, package: &Package) -> Result<(), BiltError> {
        let uncommitted = self.git.uncommitted_files().await?;
        let hashes = hash_files(
            self.git.root(),
            find_changed_files(package, &uncommitted),
        )?;

        let marker = LastBuildMarker {
            commit: self.head.as_ref().map(|head| head.id.clone()),
            commit_time: self.head.as_ref().map_or(0, |head| head.time),
            build_time: current_timestamp(),
            changed_files_in_workspace: (!hashes.is_empty()).then_some(hashes),
        };
        self.store.save(package, &marker)?;
        tracing::debug!("Recorded build of {package}");
        Ok(())
    }
}
