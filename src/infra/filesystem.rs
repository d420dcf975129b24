//! Filesystem operations
//!
//! Handles file reads and content hashing.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::defaults::DELETED_FILE_HASH;
use crate::error::FilesystemError;

/// SHA-256 of a file's content as lowercase hex
pub fn hash_file(path: &Path) -> Result<String, FilesystemError> {
    let content = std::fs::read(path).map_err(|e| FilesystemError::ReadFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    Ok(hex::encode(Sha256::digest(&content)))
}

/// Hash root-relative files
///
/// Files that no longer exist hash to a fixed marker so that a deletion is
/// still recorded as a change.
pub fn hash_files<'a>(
    root: &Path,
    files: impl IntoIterator<Item = &'a str>,
) -> Result<BTreeMap<String, String>, FilesystemError> {
    let mut hashes = BTreeMap::new();
    for file in files {
        let path = root.join(file);
        let hash = if path.is_file() {
            hash_file(&path)?
        } else {
            DELETED_FILE_HASH.to_string()
        };
        hashes.insert(file.to_string(), hash);
    }
    Ok(hashes)
}
