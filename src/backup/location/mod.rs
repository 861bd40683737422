pub mod http_store;
pub mod local_dir;

use crate::backup::location::http_store::HttpObjectStoreLocation;
use crate::backup::location::local_dir::LocalDirectoryLocation;
use crate::backup::manifest::BackupManifest;
use crate::backup::result_error::result::Result;
use derive_more::From;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::result;
use validator::{Validate, ValidationErrors};

/// Configuration for the backup storage destinations
///
/// - LocalDirectory: a directory on the local filesystem
/// - HttpObjectStore: a named-blob HTTP endpoint
#[derive(Clone, From, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum LocationConfig {
    LocalDirectory(LocalDirectoryLocation),
    HttpObjectStore(HttpObjectStoreLocation),
}

impl Validate for LocationConfig {
    fn validate(&self) -> result::Result<(), ValidationErrors> {
        match self {
            LocationConfig::LocalDirectory(c) => c.validate(),
            LocationConfig::HttpObjectStore(c) => c.validate(),
        }
    }
}

/// A backup storage destination.
///
/// `store` must be atomic from the caller's perspective: the manifest only
/// becomes visible at the destination once every archive of the set made it
/// there, so a restore is never attempted against a partial archive set.
/// Duplicate handling is variant-specific and documented per variant.
pub trait Location {
    /// Human-readable identifier used in reports and error messages.
    fn display_id(&self) -> String;

    /// Ships every archive of one backup set plus its manifest side-file.
    fn store(&self, archives: &[PathBuf], manifest_file: &Path) -> Result<()>;

    /// Manifests of every backup set available at this destination,
    /// sorted by timestamp.
    fn list_available_backups(&self) -> Result<Vec<BackupManifest>>;

    /// Materializes the archives of `manifest` as local files under
    /// `temp_dir`. The caller owns the copies and deletes them after use.
    fn retrieve(&self, manifest: &BackupManifest, temp_dir: &Path) -> Result<Vec<PathBuf>>;
}

pub(crate) fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            crate::backup::result_error::error::Error::from(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{:?} has no file name", path),
            ))
        })
}

impl Location for LocationConfig {
    fn display_id(&self) -> String {
        match self {
            LocationConfig::LocalDirectory(c) => c.display_id(),
            LocationConfig::HttpObjectStore(c) => c.display_id(),
        }
    }

    fn store(&self, archives: &[PathBuf], manifest_file: &Path) -> Result<()> {
        match self {
            LocationConfig::LocalDirectory(c) => c.store(archives, manifest_file),
            LocationConfig::HttpObjectStore(c) => c.store(archives, manifest_file),
        }
    }

    fn list_available_backups(&self) -> Result<Vec<BackupManifest>> {
        match self {
            LocationConfig::LocalDirectory(c) => c.list_available_backups(),
            LocationConfig::HttpObjectStore(c) => c.list_available_backups(),
        }
    }

    fn retrieve(&self, manifest: &BackupManifest, temp_dir: &Path) -> Result<Vec<PathBuf>> {
        match self {
            LocationConfig::LocalDirectory(c) => c.retrieve(manifest, temp_dir),
            LocationConfig::HttpObjectStore(c) => c.retrieve(manifest, temp_dir),
        }
    }
}
