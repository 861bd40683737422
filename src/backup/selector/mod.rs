pub mod config_only;
pub mod full_tree;

use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithDebugObjectAndFnName;
use crate::backup::selector::config_only::ConfigOnlySelector;
use crate::backup::selector::full_tree::FullTreeSelector;
use crate::backup::storage::RestorePolicy;
use derive_more::{Display, From};
use dyn_iter::DynIter;
use getset::Getters;
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::result;
use validator::{Validate, ValidationErrors};

/// What kind of filesystem object a selected entry is.
///
/// Symlink entries are only produced when a selector does not follow
/// symlinks; with link-following enabled the walk resolves them and the
/// entry is reported as the target's kind.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
    Symlink,
}

/// A single file selected for backup.
///
/// The relative path is the entry's identity within a backup run and the
/// path it is archived under, so restore reconstructs the original tree.
#[derive(Clone, Debug, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct FileEntry {
    abs_path: PathBuf,
    rel_path: PathBuf,
    kind: FileKind,
}

impl FileEntry {
    pub fn new<A: Into<PathBuf>, B: Into<PathBuf>>(abs_path: A, rel_path: B, kind: FileKind) -> Self {
        Self {
            abs_path: abs_path.into(),
            rel_path: rel_path.into(),
            kind,
        }
    }
}

/// Path-deduplicated set of selected files, merged by union across
/// selectors. Keyed by relative path so overlapping selectors never
/// duplicate archive entries and iteration order is deterministic.
#[derive(Debug, Default)]
pub struct FileSet {
    entries: BTreeMap<PathBuf, FileEntry>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry, returning false if an entry with the same relative
    /// path was already present (the first selector wins).
    pub fn insert(&mut self, entry: FileEntry) -> bool {
        match self.entries.entry(entry.rel_path.clone()) {
            btree_map::Entry::Occupied(_) => false,
            btree_map::Entry::Vacant(v) => {
                v.insert(entry);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.values()
    }
}

impl FromIterator<FileEntry> for FileSet {
    fn from_iter<T: IntoIterator<Item = FileEntry>>(iter: T) -> Self {
        let mut set = FileSet::new();
        for entry in iter {
            set.insert(entry);
        }
        set
    }
}

/// Configuration for the different file selection strategies
///
/// - FullTree: recursive walk with include/exclude glob filtering and a
///   symlink-following policy
/// - ConfigOnly: root-level XML files, per-job file trees and per-user
///   config files, without pattern filtering
#[derive(Clone, From, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum SelectorConfig {
    FullTree(FullTreeSelector),
    ConfigOnly(ConfigOnlySelector),
}

impl Validate for SelectorConfig {
    fn validate(&self) -> result::Result<(), ValidationErrors> {
        match self {
            SelectorConfig::FullTree(c) => c.validate(),
            SelectorConfig::ConfigOnly(c) => c.validate(),
        }
    }
}

/// Strategy producing the set of files to back up.
///
/// `select` yields a finite lazy sequence of entries; per-entry I/O failures
/// are yielded as `Err` items for the caller to aggregate, while a missing
/// or non-directory root is an immediate error. Each selector also carries
/// the restore policy to apply when its backups are unpacked later.
pub trait FileSelector {
    fn select(&self, root_dir: &Path) -> Result<DynIter<'static, Result<FileEntry>>>;

    fn restore_policy(&self) -> RestorePolicy;
}

impl FileSelector for SelectorConfig {
    fn select(&self, root_dir: &Path) -> Result<DynIter<'static, Result<FileEntry>>> {
        match self {
            SelectorConfig::FullTree(c) => c.select(root_dir),
            SelectorConfig::ConfigOnly(c) => c.select(root_dir),
        }
        .with_debug_object_and_fn_name(self.clone(), "select")
    }

    fn restore_policy(&self) -> RestorePolicy {
        match self {
            SelectorConfig::FullTree(c) => c.restore_policy(),
            SelectorConfig::ConfigOnly(c) => c.restore_policy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_set_dedup_by_relative_path() {
        let mut set = FileSet::new();
        assert!(set.insert(FileEntry::new("/root/a.xml", "a.xml", FileKind::File)));
        assert!(!set.insert(FileEntry::new("/other/a.xml", "a.xml", FileKind::File)));
        assert_eq!(set.len(), 1);
        // first insert wins
        assert_eq!(
            set.iter().next().unwrap().abs_path(),
            &PathBuf::from("/root/a.xml")
        );
    }

    #[test]
    fn test_file_set_iteration_is_sorted() {
        let set: FileSet = [
            FileEntry::new("/r/b", "b", FileKind::File),
            FileEntry::new("/r/a", "a", FileKind::File),
            FileEntry::new("/r/c/d", "c/d", FileKind::File),
        ]
        .into_iter()
        .collect();

        let rels: Vec<_> = set.iter().map(|e| e.rel_path().clone()).collect();
        assert_eq!(
            rels,
            vec![PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("c/d")]
        );
    }

    #[test]
    fn test_selector_config_serde_tags() {
        let yaml = "type: config_only";
        let config: SelectorConfig = serde_yml::from_str(yaml).unwrap();
        assert_eq!(
            config,
            SelectorConfig::ConfigOnly(ConfigOnlySelector::default())
        );

        let yaml = "type: full_tree\nincludes: '**/*.xml'\n";
        let config: SelectorConfig = serde_yml::from_str(yaml).unwrap();
        match config {
            SelectorConfig::FullTree(c) => {
                assert_eq!(c.includes().as_deref(), Some("**/*.xml"));
                assert!(!c.follow_symlinks());
            }
            _ => panic!("Expected FullTree"),
        }
    }
}
