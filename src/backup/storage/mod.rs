pub mod tar;

use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithDebugObjectAndFnName;
use crate::backup::selector::FileSet;
use crate::backup::storage::tar::TarStorage;
use crate::backup::FileExtProvider;
use derive_more::{Display, From};
use getset::Getters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::result;
use std::sync::Arc;
use validator::{Validate, ValidationErrors};

/// Per-file conflict rule applied when unpacking onto existing data.
///
/// Persisted in the backup manifest so a restore never has to consult live
/// configuration to know how to behave.
#[derive(Clone, Copy, Default, Debug, Display, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RestorePolicy {
    /// Replace any existing file at the target path unconditionally.
    #[default]
    Overwrite,
    /// Leave an existing file untouched and log the skip; never an error.
    SkipExisting,
}

/// The output of one packaging run: every produced archive file plus the
/// base name they share. Consumers treat the set atomically.
#[derive(Debug, Getters)]
#[getset(get = "pub")]
pub struct ArchiveDescriptor {
    archives: Vec<PathBuf>,
    file_name_base: String,
}

impl ArchiveDescriptor {
    pub fn new<S: Into<String>>(archives: Vec<PathBuf>, file_name_base: S) -> Self {
        Self {
            archives,
            file_name_base: file_name_base.into(),
        }
    }

    /// File names (without directories) of every produced archive.
    pub fn file_names(&self) -> Vec<String> {
        self.archives
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }
}

/// Outcome counters for one restore pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub restored: usize,
    pub skipped: usize,
}

/// Configuration for the archive packaging strategies
///
/// Currently a tar archive with a pluggable compressor; the enum is the
/// seam where further packaging strategies plug in.
#[derive(Clone, From, Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum StorageConfig {
    Tar(TarStorage),
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Tar(TarStorage::default())
    }
}

impl Validate for StorageConfig {
    fn validate(&self) -> result::Result<(), ValidationErrors> {
        match self {
            StorageConfig::Tar(c) => c.validate(),
        }
    }
}

/// Strategy packaging a file set into transportable archives and reversing
/// that packaging on restore.
pub trait Storage {
    /// Packages `files` into archives under `temp_dir`, named from
    /// `file_name_base`. Paths inside the archive are the entries'
    /// root-relative paths so restore can reconstruct the original tree.
    fn archive(
        &self,
        files: &FileSet,
        temp_dir: &Path,
        file_name_base: &str,
    ) -> Result<ArchiveDescriptor>;

    /// Unpacks every archive of one backup set beneath `target_root`,
    /// resolving per-file conflicts with `policy`.
    fn restore(
        &self,
        archives: &[PathBuf],
        target_root: &Path,
        policy: RestorePolicy,
    ) -> Result<RestoreSummary>;
}

impl Storage for StorageConfig {
    fn archive(
        &self,
        files: &FileSet,
        temp_dir: &Path,
        file_name_base: &str,
    ) -> Result<ArchiveDescriptor> {
        match self {
            StorageConfig::Tar(c) => c.archive(files, temp_dir, file_name_base),
        }
        .with_debug_object_and_fn_name(self.clone(), "archive")
    }

    fn restore(
        &self,
        archives: &[PathBuf],
        target_root: &Path,
        policy: RestorePolicy,
    ) -> Result<RestoreSummary> {
        match self {
            StorageConfig::Tar(c) => c.restore(archives, target_root, policy),
        }
        .with_debug_object_and_fn_name(self.clone(), "restore")
    }
}

impl FileExtProvider for StorageConfig {
    fn file_ext(&self) -> Option<Arc<str>> {
        match self {
            StorageConfig::Tar(c) => c.file_ext(),
        }
    }
}
