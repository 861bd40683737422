//! The backup executor: drives one backup cycle end to end (selection,
//! archiving, distribution, cleanup) and the reverse restore flow.

use crate::backup::function_path;
use crate::backup::location::{Location, LocationConfig};
use crate::backup::manifest::{generate_file_name_base, BackupManifest};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::{convert_error_vec, Result};
use crate::backup::result_error::WithMsg;
use crate::backup::selector::{FileSelector, FileSet, SelectorConfig};
use crate::backup::storage::{ArchiveDescriptor, RestorePolicy, Storage, StorageConfig};
use crate::backup::validate::{
    validate_dir_exist, validate_valid_archive_base_name, validate_writable_dir,
};

use bon::Builder;
use chrono::{DateTime, Utc};
use function_name::named;
use getset::Getters;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use std::fmt::{self, Display};
use std::fs::{create_dir_all, remove_dir_all, remove_file};
use std::path::{Path, PathBuf};

/// Top-level configuration for one backup pipeline.
///
/// `root_dir` is the live data directory backups are taken from and must
/// exist; `temp_dir` is scratch space for archives in flight and is created
/// if missing. At least one selector and one location are required.
#[derive(Clone, Serialize, Deserialize, Debug, Validate, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct BackupConfig {
    #[validate(custom(function = validate_dir_exist))]
    #[builder(into)]
    root_dir: PathBuf,
    #[validate(custom(function = validate_writable_dir))]
    #[builder(into)]
    temp_dir: PathBuf,
    #[validate(length(min = 1), nested)]
    selectors: Vec<SelectorConfig>,
    #[serde(default)]
    #[builder(default)]
    #[validate(nested)]
    storage: StorageConfig,
    #[validate(length(min = 1), nested)]
    locations: Vec<LocationConfig>,
}

/// Outcome of one backup cycle.
///
/// A cycle fails as a whole only when selection or archiving fails; failures
/// at individual locations are recorded here and never prevent the other
/// locations from receiving the backup.
#[derive(Debug, Getters)]
#[getset(get = "pub")]
pub struct BackupReport {
    file_name_base: String,
    files_selected: usize,
    archive_count: usize,
    succeeded: Vec<String>,
    failed: Vec<(String, Error)>,
    warnings: Vec<String>,
}

impl BackupReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    /// Ok when every location accepted the backup, otherwise the recorded
    /// location failures folded into one error.
    pub fn into_result(self) -> Result<()> {
        convert_error_vec(self.failed.into_iter().map(|(_, e)| e).collect())
    }
}

impl Display for BackupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "backup {}: {} file(s) in {} archive(s), stored at {}/{} location(s)",
            self.file_name_base,
            self.files_selected,
            self.archive_count,
            self.succeeded.len(),
            self.succeeded.len() + self.failed.len()
        )?;
        for (location, error) in &self.failed {
            writeln!(f, "  failed at {}: {}", location, error)?;
        }
        for warning in &self.warnings {
            writeln!(f, "  warning: {}", warning)?;
        }
        Ok(())
    }
}

/// Outcome counters of one restore run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub files_restored: usize,
    pub files_skipped: usize,
}

impl Display for RestoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "restored {} file(s), skipped {} existing file(s)",
            self.files_restored, self.files_skipped
        )
    }
}

impl BackupConfig {
    /// Runs one full backup cycle.
    ///
    /// Selection failures and archiving failures abort the cycle; per-entry
    /// selection errors are downgraded to warnings so one unreadable file
    /// never loses the rest of the backup. Locations are shipped to in
    /// parallel and independently, and temp archives are removed afterwards
    /// whether distribution succeeded or not.
    #[named]
    pub fn run_backup(&self) -> Result<BackupReport> {
        let mut warnings = Vec::new();

        info!("Collecting files under {:?}", self.root_dir);
        let files = self.collect_files(&mut warnings)?;
        info!("Selected {} file(s)", files.len());

        let timestamp = Utc::now();
        let file_name_base = generate_file_name_base(&timestamp);
        let descriptor = self
            .storage
            .archive(&files, &self.temp_dir, &file_name_base)
            .with_msg(function_path!())
            .map_err(Error::archive)?;
        info!(
            "Packaged {} archive(s) as {}",
            descriptor.archives().len(),
            file_name_base
        );

        let restore_policy = self
            .selectors
            .first()
            .map(FileSelector::restore_policy)
            .unwrap_or_default();

        let outcomes: Vec<(String, Result<()>)> = self
            .locations
            .par_iter()
            .enumerate()
            .map(|(idx, location)| {
                let id = location.display_id();
                let result =
                    self.distribute_to(location, idx, &descriptor, timestamp, restore_policy);
                (id, result)
            })
            .collect();

        for archive in descriptor.archives() {
            if let Err(e) = remove_file(archive) {
                warn!("Cannot remove temp archive {:?}: {}", archive, e);
                warnings.push(format!("cannot remove temp archive {:?}: {}", archive, e));
            }
        }

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for (id, result) in outcomes {
            match result {
                Ok(()) => {
                    info!("Stored backup {} at {}", file_name_base, id);
                    succeeded.push(id);
                }
                Err(e) => {
                    warn!("Storing backup {} at {} failed: {}", file_name_base, id, e);
                    failed.push((id, e));
                }
            }
        }

        Ok(BackupReport {
            file_name_base,
            files_selected: files.len(),
            archive_count: descriptor.archives().len(),
            succeeded,
            failed,
            warnings,
        })
    }

    /// Union of every selector's output, deduplicated by relative path.
    fn collect_files(&self, warnings: &mut Vec<String>) -> Result<FileSet> {
        let mut files = FileSet::new();
        for selector in &self.selectors {
            let entries = selector
                .select(&self.root_dir)
                .map_err(Error::selection)?;
            for entry in entries {
                match entry {
                    Ok(entry) => {
                        files.insert(entry);
                    }
                    Err(e) => {
                        warn!("Skipping unreadable entry: {}", e);
                        warnings.push(format!("skipped unreadable entry: {}", e));
                    }
                }
            }
        }
        Ok(files)
    }

    /// Ships one archive set plus a freshly written manifest to one
    /// location. The manifest is staged in a per-location scratch
    /// subdirectory so parallel distributions never collide, and the
    /// scratch directory is removed whether the store succeeded or not.
    fn distribute_to(
        &self,
        location: &LocationConfig,
        location_idx: usize,
        descriptor: &ArchiveDescriptor,
        timestamp: DateTime<Utc>,
        restore_policy: RestorePolicy,
    ) -> Result<()> {
        let manifest = BackupManifest::builder()
            .file_name_base(descriptor.file_name_base())
            .timestamp(timestamp)
            .selectors(self.selectors.clone())
            .storage(self.storage.clone())
            .location(location.clone())
            .restore_policy(restore_policy)
            .archives(descriptor.file_names())
            .build();

        let scratch_dir = self
            .temp_dir
            .join(format!("{}.loc{}", descriptor.file_name_base(), location_idx));
        create_dir_all(&scratch_dir)
            .map_err(Error::from)
            .with_msg(format!("Cannot create scratch dir {:?}", scratch_dir))?;

        let manifest_file = scratch_dir.join(manifest.file_name());
        let result = manifest
            .write_to_file(&manifest_file)
            .and_then(|_| location.store(descriptor.archives(), &manifest_file));

        if let Err(e) = remove_dir_all(&scratch_dir) {
            warn!("Cannot remove scratch dir {:?}: {}", scratch_dir, e);
        }

        result.map_err(|e| {
            if e.is_duplicate_backup() {
                e
            } else {
                e.at_location(location.display_id())
            }
        })
    }
}

/// Restores one stored backup set beneath `target_root`.
///
/// Archives are retrieved into a scratch subdirectory of `temp_dir`,
/// unpacked with the restore policy recorded in the manifest, and the
/// scratch directory removed whether the restore succeeded or not, so a
/// retrieve that fails partway never leaks the copies it already made.
pub fn run_restore(
    location: &LocationConfig,
    manifest: &BackupManifest,
    target_root: &Path,
    temp_dir: &Path,
) -> Result<RestoreReport> {
    info!(
        "Restoring backup {} from {}",
        manifest.file_name_base(),
        location.display_id()
    );
    let scratch_dir = temp_dir.join(format!("{}.restore", manifest.file_name_base()));
    create_dir_all(&scratch_dir)
        .map_err(Error::from)
        .with_msg(format!("Cannot create scratch dir {:?}", scratch_dir))?;

    let result = location.retrieve(manifest, &scratch_dir).and_then(|archives| {
        manifest
            .storage()
            .restore(&archives, target_root, *manifest.restore_policy())
    });

    if let Err(e) = remove_dir_all(&scratch_dir) {
        warn!("Cannot remove scratch dir {:?}: {}", scratch_dir, e);
    }

    let summary = result.map_err(Error::restore)?;
    info!(
        "Restored {} file(s), skipped {}",
        summary.restored, summary.skipped
    );
    Ok(RestoreReport {
        files_restored: summary.restored,
        files_skipped: summary.skipped,
    })
}

/// Finds the stored backup with the given base name at `location`.
pub fn find_backup(location: &LocationConfig, file_name_base: &str) -> Result<BackupManifest> {
    if let Err(e) = validate_valid_archive_base_name(file_name_base) {
        return Err(Error::from(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid backup name {file_name_base:?}: {e}"),
        )));
    }
    location
        .list_available_backups()?
        .into_iter()
        .find(|m| m.file_name_base() == file_name_base)
        .ok_or_else(|| {
            Error::from(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!(
                    "no backup named {} at {}",
                    file_name_base,
                    location.display_id()
                ),
            ))
        })
}
