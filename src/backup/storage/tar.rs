use crate::backup::compress::{CompressorBuilder, CompressorConfig};
use crate::backup::finish::Finish;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::selector::{FileKind, FileSet};
use crate::backup::storage::{ArchiveDescriptor, RestorePolicy, RestoreSummary, Storage};
use crate::backup::FileExtProvider;

use bon::Builder;
use getset::Getters;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use validator::Validate;

use std::fs::File;
use std::io::{BufReader, BufWriter, IntoInnerError};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

static TAR_FILE_EXT: OnceLock<Arc<str>> = OnceLock::new();

/// Tar packaging with a pluggable compressor.
///
/// One archive is produced per run, named `{file_name_base}.tar[.xz]`.
/// Entries keep their root-relative paths; regular files are read through,
/// symlink entries are stored as symlinks.
#[derive(Clone, Default, Debug, Serialize, Deserialize, Validate, Builder, Getters)]
pub struct TarStorage {
    #[serde(default)]
    #[builder(default)]
    #[validate(nested)]
    #[getset(get = "pub")]
    compressor: CompressorConfig,
}

impl FileExtProvider for TarStorage {
    fn file_ext(&self) -> Option<Arc<str>> {
        Some(
            std::iter::once(TAR_FILE_EXT.get_or_init(|| "tar".into()))
                .chain(self.compressor.file_ext().iter())
                .join(".")
                .into(),
        )
    }
}

impl Storage for TarStorage {
    fn archive(
        &self,
        files: &FileSet,
        temp_dir: &Path,
        file_name_base: &str,
    ) -> Result<ArchiveDescriptor> {
        let file_name = match self.file_ext() {
            Some(ext) => format!("{file_name_base}.{ext}"),
            None => file_name_base.to_string(),
        };
        let archive_path = temp_dir.join(&file_name);
        tracing::info!(
            "Writing archive {:?} with {} entries",
            archive_path,
            files.len()
        );

        match self.write_archive(&archive_path, files) {
            Ok(()) => Ok(ArchiveDescriptor::new(vec![archive_path], file_name_base)),
            Err(e) => {
                if let Err(rm) = std::fs::remove_file(&archive_path) {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!("Could not delete partial archive {:?}: {}", archive_path, rm);
                    }
                }
                Err(e.with_msg(format!("Writing archive {:?} failed", archive_path)))
            }
        }
    }

    fn restore(
        &self,
        archives: &[PathBuf],
        target_root: &Path,
        policy: RestorePolicy,
    ) -> Result<RestoreSummary> {
        std::fs::create_dir_all(target_root)
            .map_err(Error::from)
            .with_msg(format!("Cannot create restore target {:?}", target_root))?;

        let mut summary = RestoreSummary::default();
        for archive_path in archives {
            if !archive_path.is_file() {
                return Err(Error::from(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("archive {:?} is missing", archive_path),
                )));
            }
            tracing::info!(
                "Unpacking {:?} into {:?} with policy {}",
                archive_path,
                target_root,
                policy
            );

            let reader = File::open(archive_path)
                .map(BufReader::new)
                .map_err(Error::from)
                .and_then(|f| self.compressor.build_decompressor(f))
                .map(BufReader::new)?;
            let mut archive = tar::Archive::new(reader);

            for entry in archive.entries()? {
                let mut entry = entry?;
                let rel = entry.path()?.to_path_buf();
                let dest = target_root.join(&rel);

                if let Ok(md) = dest.symlink_metadata() {
                    match policy {
                        RestorePolicy::SkipExisting => {
                            tracing::info!("Skipping existing {:?}", dest);
                            summary.skipped += 1;
                            continue;
                        }
                        RestorePolicy::Overwrite => {
                            if !md.file_type().is_dir() {
                                std::fs::remove_file(&dest)
                                    .map_err(Error::from)
                                    .with_msg(format!("Cannot replace {:?}", dest))?;
                            }
                        }
                    }
                }

                if entry.unpack_in(target_root)? {
                    summary.restored += 1;
                } else {
                    tracing::warn!("Refused to unpack {:?} outside of {:?}", rel, target_root);
                }
            }
        }

        tracing::info!(
            "Restore finished: {} restored, {} skipped",
            summary.restored,
            summary.skipped
        );
        Ok(summary)
    }
}

impl TarStorage {
    fn write_archive(&self, archive_path: &Path, files: &FileSet) -> Result<()> {
        let mut writer = File::create_new(archive_path)
            .map(BufWriter::new)
            .map_err(Error::from)
            .and_then(|f| self.compressor.build_compressor(f))
            .map(BufWriter::new)
            .map(tar::Builder::new)?;

        writer.follow_symlinks(true);

        for entry in files.iter() {
            match entry.kind() {
                FileKind::File => {
                    writer.append_path_with_name(entry.abs_path(), entry.rel_path())?;
                }
                FileKind::Directory => {
                    writer.append_dir(entry.rel_path(), entry.abs_path())?;
                }
                FileKind::Symlink => {
                    let target = std::fs::read_link(entry.abs_path())?;
                    let mut header = tar::Header::new_gnu();
                    header.set_entry_type(tar::EntryType::Symlink);
                    header.set_size(0);
                    writer.append_link(&mut header, entry.rel_path(), target)?;
                }
            }
        }

        writer
            .into_inner()?
            .into_inner()
            .map_err(IntoInnerError::into_error)?
            .finish()?
            .into_inner()
            .map_err(IntoInnerError::into_error)?;

        Ok(())
    }
}
