use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::selector::{FileEntry, FileKind, FileSelector};
use crate::backup::storage::RestorePolicy;

use dyn_iter::{DynIter, IntoDynIterator};
use serde::{Deserialize, Serialize};
use validator::Validate;
use walkdir::WalkDir;

use std::fs;
use std::path::{Path, PathBuf};

/// Config-only file selection, no pattern filtering.
///
/// Collects the `*.xml` files directly under the backup root, the entire
/// file tree beneath every subdirectory of `jobs/` (auxiliary per-job files
/// from addon systems must survive, not just `config.xml`), `users/users.xml`
/// if present, and `users/<user>/config.xml` for each user subdirectory. A
/// user directory without a `config.xml` is logged and skipped. Missing
/// `jobs/` or `users/` directories simply contribute nothing.
///
/// The three phases are chained lazily; no directory is listed or walked
/// before iteration reaches it.
///
/// Restores from a config-only backup always overwrite existing files.
#[derive(Clone, Default, Debug, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct ConfigOnlySelector {}

impl FileSelector for ConfigOnlySelector {
    fn select(&self, root_dir: &Path) -> Result<DynIter<'static, Result<FileEntry>>> {
        if !root_dir.is_dir() {
            tracing::error!(
                "Backup root does not exist or is not a directory: {:?}",
                root_dir
            );
            return Err(Error::from(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("backup root {:?} is not a directory", root_dir),
            )));
        }

        tracing::info!("Starting config-only scan of {:?}", root_dir);
        let root = root_dir.to_path_buf();
        Ok(root_xml_files(root.clone())
            .chain(job_files(root.clone()))
            .chain(user_files(root))
            .into_dyn_iter())
    }

    fn restore_policy(&self) -> RestorePolicy {
        RestorePolicy::Overwrite
    }
}

fn file_entry(root_dir: &Path, abs_path: PathBuf, kind: FileKind) -> Result<FileEntry> {
    let rel = abs_path
        .strip_prefix(root_dir)
        .map(Path::to_path_buf)
        .map_err(Error::from)
        .with_msg(format!(
            "Stripping {:?} from {:?} failed",
            root_dir, abs_path
        ))?;
    Ok(FileEntry::new(abs_path, rel, kind))
}

/// All `*.xml` files directly under the backup root.
fn root_xml_files(root: PathBuf) -> impl Iterator<Item = Result<FileEntry>> {
    std::iter::once(()).flat_map(move |_| {
        let (paths, errors) = sorted_dir_listing(&root);
        let root = root.clone();
        let files = paths
            .into_iter()
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "xml"))
            .map(move |p| file_entry(&root, p, FileKind::File));
        errors.into_iter().map(Err).chain(files)
    })
}

/// The entire file tree beneath every subdirectory of `jobs/`, walked
/// job by job as iteration demands.
fn job_files(root: PathBuf) -> impl Iterator<Item = Result<FileEntry>> {
    std::iter::once(()).flat_map(move |_| {
        let jobs_dir = root.join("jobs");
        if !jobs_dir.is_dir() {
            tracing::debug!("No jobs directory under {:?}", root);
            return DynIter::new(std::iter::empty());
        }

        let (paths, errors) = sorted_dir_listing(&jobs_dir);
        let root = root.clone();
        let walks = paths
            .into_iter()
            .filter(|p| p.is_dir())
            .flat_map(move |job_dir| {
                let root = root.clone();
                WalkDir::new(&job_dir)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(move |res| match res {
                        Ok(de) => {
                            let kind = if de.file_type().is_symlink() {
                                FileKind::Symlink
                            } else if de.file_type().is_file() {
                                FileKind::File
                            } else {
                                return None;
                            };
                            Some(file_entry(&root, de.into_path(), kind))
                        }
                        Err(e) => Some(Err(e.into())),
                    })
            });
        DynIter::new(errors.into_iter().map(Err).chain(walks))
    })
}

/// `users/users.xml` plus each user's `config.xml`.
fn user_files(root: PathBuf) -> impl Iterator<Item = Result<FileEntry>> {
    std::iter::once(()).flat_map(move |_| {
        let users_dir = root.join("users");
        if !users_dir.is_dir() {
            tracing::debug!("No users directory under {:?}", root);
            return DynIter::new(std::iter::empty());
        }

        let mut entries: Vec<Result<FileEntry>> = Vec::new();
        let users_xml = users_dir.join("users.xml");
        if users_xml.is_file() {
            entries.push(file_entry(&root, users_xml, FileKind::File));
        }

        let (paths, errors) = sorted_dir_listing(&users_dir);
        entries.extend(errors.into_iter().map(Err));
        for user_dir in paths.into_iter().filter(|p| p.is_dir()) {
            let user_config = user_dir.join("config.xml");
            if user_config.is_file() {
                entries.push(file_entry(&root, user_config, FileKind::File));
            } else {
                tracing::warn!(
                    "{:?} does not exist or is not a file, skipping user",
                    user_config
                );
            }
        }
        DynIter::new(entries.into_iter())
    })
}

/// Sorted directory listing; an unreadable directory contributes error
/// entries instead of aborting the whole selection.
fn sorted_dir_listing(dir: &Path) -> (Vec<PathBuf>, Vec<Error>) {
    match fs::read_dir(dir) {
        Ok(read_dir) => {
            let mut paths: Vec<PathBuf> = Vec::new();
            let mut errors: Vec<Error> = Vec::new();
            for res in read_dir {
                match res {
                    Ok(de) => paths.push(de.path()),
                    Err(e) => errors.push(
                        Error::from(e).with_msg(format!("Listing directory {:?} failed", dir)),
                    ),
                }
            }
            paths.sort();
            (paths, errors)
        }
        Err(e) => (
            Vec::new(),
            vec![Error::from(e).with_msg(format!("Cannot read directory {:?}", dir))],
        ),
    }
}
