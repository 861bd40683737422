use crate::backup::function_path;
use crate::backup::path_matcher::PathMatcher;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::selector::{FileEntry, FileKind, FileSelector};
use crate::backup::storage::RestorePolicy;

use bon::Builder;
use dyn_iter::{DynIter, IntoDynIterator};
use function_name::named;
use getset::Getters;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use validator::Validate;
use walkdir::{DirEntry, WalkDir};

use std::path::Path;

/// Full-tree file selection: recursively walks the backup root and keeps
/// the files whose root-relative path passes the include/exclude filter.
///
/// Traversal is sorted by file name so identical inputs always produce the
/// same selection order. Symlinks are followed only when `follow_symlinks`
/// is set; an unfollowed symlink is still selected as a leaf entry, its
/// target is never descended into.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, PartialEq, Eq, Getters)]
pub struct FullTreeSelector {
    /// Semicolon-delimited include globs; blank or absent means everything.
    #[serde(default)]
    #[builder(into)]
    #[getset(get = "pub")]
    includes: Option<String>,
    /// Semicolon-delimited exclude globs; blank or absent means nothing.
    /// Exclude always takes precedence over include.
    #[serde(default)]
    #[builder(into)]
    #[getset(get = "pub")]
    excludes: Option<String>,
    #[serde(default)]
    #[builder(default)]
    follow_symlinks: bool,
    #[serde(default)]
    #[builder(default)]
    restore_policy: RestorePolicy,
}

impl FullTreeSelector {
    pub fn follow_symlinks(&self) -> bool {
        self.follow_symlinks
    }
}

impl FileSelector for FullTreeSelector {
    #[named]
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

        let matcher = PathMatcher::new(self.includes.as_deref(), self.excludes.as_deref())?;
        tracing::info!(
            "Starting full-tree scan of {:?} (includes: {:?}, excludes: {:?}, follow_symlinks: {})",
            root_dir,
            self.includes,
            self.excludes,
            self.follow_symlinks
        );

        let root = root_dir.to_path_buf();
        let entries = WalkDir::new(root_dir)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |res| match res {
                Ok(de) => visit_dir_entry(de, &root, &matcher),
                Err(e) => Some(Err(e.into())),
            })
            .map(move |res| res.with_msg(function_path!()));

        Ok(entries.into_dyn_iter())
    }

    fn restore_policy(&self) -> RestorePolicy {
        self.restore_policy
    }
}

fn visit_dir_entry(de: DirEntry, root: &Path, matcher: &PathMatcher) -> Option<Result<FileEntry>> {
    let file_type = de.file_type();
    let kind = if file_type.is_symlink() {
        FileKind::Symlink
    } else if file_type.is_file() {
        FileKind::File
    } else {
        // directories are implied by their files and rebuilt on restore
        tracing::trace!("Skipping {:?}, not a file", de.path());
        return None;
    };

    let path = de.into_path();
    let rel = match path.strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        Err(e) => {
            return Some(Err(Error::from(e).with_msg(format!(
                "Stripping {:?} from {:?} failed",
                root, path
            ))))
        }
    };

    if !matcher.matches(&rel) {
        tracing::trace!("Skipping {:?}, patterns not matched", rel);
        return None;
    }

    tracing::trace!("Including {:?} -> {:?}", path, rel);
    Some(Ok(FileEntry::new(path, rel, kind)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_test_basedir(dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(dir.join("jobs/myjob/builds/1"))?;
        std::fs::create_dir_all(dir.join("plugins"))?;
        std::fs::write(dir.join("config.xml"), "<root/>")?;
        std::fs::write(dir.join("jobs/myjob/config.xml"), "<job/>")?;
        std::fs::write(dir.join("jobs/myjob/builds/1/build.xml"), "<build/>")?;
        std::fs::write(dir.join("jobs/myjob/nextBuildNumber"), "2")?;
        std::fs::write(dir.join("plugins/periodicbackup.jpl"), "jpl")?;
        Ok(())
    }

    fn selected_rel_paths(selector: &FullTreeSelector, root: &Path) -> Vec<PathBuf> {
        selector
            .select(root)
            .unwrap()
            .map(|res| res.unwrap().rel_path().clone())
            .collect()
    }

    #[test]
    fn test_default_selection_is_full_file_list() {
        let temp_dir = TempDir::new().unwrap();
        create_test_basedir(temp_dir.path()).unwrap();

        let selector = FullTreeSelector::builder().build();
        let rels = selected_rel_paths(&selector, temp_dir.path());

        assert_eq!(
            rels,
            vec![
                PathBuf::from("config.xml"),
                PathBuf::from("jobs/myjob/builds/1/build.xml"),
                PathBuf::from("jobs/myjob/config.xml"),
                PathBuf::from("jobs/myjob/nextBuildNumber"),
                PathBuf::from("plugins/periodicbackup.jpl"),
            ]
        );
    }

    #[test]
    fn test_blank_patterns_select_everything() {
        let temp_dir = TempDir::new().unwrap();
        create_test_basedir(temp_dir.path()).unwrap();

        let selector = FullTreeSelector::builder()
            .includes("   ")
            .excludes("   ")
            .build();
        assert_eq!(selected_rel_paths(&selector, temp_dir.path()).len(), 5);
    }

    #[test]
    fn test_include_xml_exclude_root_config() {
        let temp_dir = TempDir::new().unwrap();
        create_test_basedir(temp_dir.path()).unwrap();

        let selector = FullTreeSelector::builder()
            .includes("**/*.xml")
            .excludes("config.xml")
            .build();
        let rels = selected_rel_paths(&selector, temp_dir.path());

        assert_eq!(
            rels,
            vec![
                PathBuf::from("jobs/myjob/builds/1/build.xml"),
                PathBuf::from("jobs/myjob/config.xml"),
            ]
        );
    }

    #[test]
    fn test_directory_exclude_patterns() {
        let temp_dir = TempDir::new().unwrap();
        create_test_basedir(temp_dir.path()).unwrap();

        let selector = FullTreeSelector::builder()
            .excludes("jobs/*/builds/; **/nextBuildNumber")
            .build();
        let rels = selected_rel_paths(&selector, temp_dir.path());

        assert_eq!(
            rels,
            vec![
                PathBuf::from("config.xml"),
                PathBuf::from("jobs/myjob/config.xml"),
                PathBuf::from("plugins/periodicbackup.jpl"),
            ]
        );
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let selector = FullTreeSelector::builder().build();
        assert!(selector.select(Path::new("/nonexistent/directory")).is_err());
    }

    #[test]
    fn test_file_as_root_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("not_a_directory.txt");
        std::fs::write(&file_path, "content").unwrap();

        let selector = FullTreeSelector::builder().build();
        assert!(selector.select(&file_path).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_unfollowed_symlink_is_a_leaf_entry() {
        let temp_dir = TempDir::new().unwrap();
        create_test_basedir(temp_dir.path()).unwrap();
        std::os::unix::fs::symlink(
            temp_dir.path().join("config.xml"),
            temp_dir.path().join("soft-link-to-source.txt"),
        )
        .unwrap();

        let selector = FullTreeSelector::builder().build();
        let entries: Vec<_> = selector
            .select(temp_dir.path())
            .unwrap()
            .map(|res| res.unwrap())
            .collect();

        let link = entries
            .iter()
            .find(|e| e.rel_path() == Path::new("soft-link-to-source.txt"))
            .expect("symlink entry missing");
        assert_eq!(*link.kind(), FileKind::Symlink);
    }

    #[cfg(unix)]
    #[test]
    fn test_followed_symlink_is_resolved() {
        let temp_dir = TempDir::new().unwrap();
        create_test_basedir(temp_dir.path()).unwrap();
        std::os::unix::fs::symlink(
            temp_dir.path().join("config.xml"),
            temp_dir.path().join("soft-link-to-source.txt"),
        )
        .unwrap();

        let selector = FullTreeSelector::builder().follow_symlinks(true).build();
        let entries: Vec<_> = selector
            .select(temp_dir.path())
            .unwrap()
            .map(|res| res.unwrap())
            .collect();

        let link = entries
            .iter()
            .find(|e| e.rel_path() == Path::new("soft-link-to-source.txt"))
            .expect("symlink entry missing");
        assert_eq!(*link.kind(), FileKind::File);
    }
}
