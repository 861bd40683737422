use crate::backup::location::{file_name_of, Location};
use crate::backup::manifest::{is_manifest_file_name, BackupManifest};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::validate::validate_dir_exist_or_created;

use bon::Builder;
use getset::Getters;
use serde::{Deserialize, Serialize};
use validator::Validate;

use std::fs;
use std::path::{Path, PathBuf};

/// A backup destination on the local filesystem.
///
/// Archives are copied in via a `.part` temporary name and renamed into
/// place, archives before the manifest, so a visible manifest always points
/// at a complete archive set; a failed archive copy rolls the set back.
///
/// Duplicate handling: with `overwrite` (the default), re-storing the same
/// `file_name_base` deterministically replaces the previous set; with
/// `overwrite: false` it is rejected as a duplicate backup.
#[derive(Clone, Serialize, Deserialize, Debug, Validate, Builder, Getters, PartialEq, Eq)]
pub struct LocalDirectoryLocation {
    #[validate(custom(function = validate_dir_exist_or_created))]
    #[builder(into)]
    #[getset(get = "pub")]
    path: PathBuf,
    #[serde(default = "default_overwrite")]
    #[builder(default = true)]
    overwrite: bool,
}

fn default_overwrite() -> bool {
    true
}

impl LocalDirectoryLocation {
    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    fn copy_into_place(&self, src: &Path, file_name: &str) -> Result<PathBuf> {
        let dest = self.path.join(file_name);
        let part = self.path.join(format!("{file_name}.part"));
        let res = fs::copy(src, &part)
            .and_then(|_| fs::rename(&part, &dest))
            .map_err(Error::from)
            .with_msg(format!("Copying {:?} to {:?} failed", src, dest));
        if res.is_err() {
            let _ = fs::remove_file(&part);
        }
        res.map(|_| dest)
    }
}

impl Location for LocalDirectoryLocation {
    fn display_id(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    fn store(&self, archives: &[PathBuf], manifest_file: &Path) -> Result<()> {
        fs::create_dir_all(&self.path)
            .map_err(Error::from)
            .with_msg(format!("Cannot create location directory {:?}", self.path))?;

        let manifest_name = file_name_of(manifest_file)?;
        let manifest_dest = self.path.join(&manifest_name);
        if manifest_dest.exists() {
            if !self.overwrite {
                return Err(Error::DuplicateBackup {
                    location: self.display_id(),
                    file_name_base: manifest_name
                        .strip_suffix(crate::backup::manifest::MANIFEST_FILE_SUFFIX)
                        .unwrap_or(&manifest_name)
                        .to_string(),
                });
            }
            // the old set's archives are about to be replaced; its manifest
            // must go out of sight first so it never points at a torn set
            fs::remove_file(&manifest_dest)
                .map_err(Error::from)
                .with_msg(format!("Cannot remove old manifest {:?}", manifest_dest))?;
        }

        let mut stored: Vec<PathBuf> = Vec::new();
        for archive in archives {
            let name = file_name_of(archive)?;
            match self.copy_into_place(archive, &name) {
                Ok(dest) => stored.push(dest),
                Err(e) => {
                    // roll back so no partial archive set is left visible
                    for dest in &stored {
                        if let Err(rm) = fs::remove_file(dest) {
                            tracing::warn!("Rollback of {:?} failed: {}", dest, rm);
                        }
                    }
                    return Err(e);
                }
            }
        }

        self.copy_into_place(manifest_file, &manifest_name)?;
        tracing::info!(
            "Stored {} archive(s) and manifest {:?} in {:?}",
            archives.len(),
            manifest_name,
            self.path
        );
        Ok(())
    }

    fn list_available_backups(&self) -> Result<Vec<BackupManifest>> {
        let mut manifests: Vec<BackupManifest> = Vec::new();
        for entry in fs::read_dir(&self.path)
            .map_err(Error::from)
            .with_msg(format!("Cannot read location directory {:?}", self.path))?
        {
            let path = entry.map_err(Error::from)?.path();
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n,
                None => continue,
            };
            if !is_manifest_file_name(name) {
                continue;
            }
            match BackupManifest::read_from_file(&path) {
                Ok(manifest) => manifests.push(manifest),
                Err(e) => tracing::warn!("Skipping unparsable manifest {:?}: {}", path, e),
            }
        }
        manifests.sort_by_key(|m| *m.timestamp());
        Ok(manifests)
    }

    fn retrieve(&self, manifest: &BackupManifest, temp_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut local: Vec<PathBuf> = Vec::new();
        for name in manifest.archives() {
            let src = self.path.join(name);
            if !src.is_file() {
                return Err(Error::from(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("archive {:?} is missing from location {:?}", name, self.path),
                )));
            }
            let dest = temp_dir.join(name);
            fs::copy(&src, &dest)
                .map_err(Error::from)
                .with_msg(format!("Retrieving {:?} to {:?} failed", src, dest))?;
            local.push(dest);
        }
        Ok(local)
    }
}
