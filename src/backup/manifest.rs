//! The backup manifest: the metadata record shipped alongside every archive
//! set, sufficient on its own to drive a later restore.

use crate::backup::location::LocationConfig;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::selector::SelectorConfig;
use crate::backup::storage::{RestorePolicy, StorageConfig};

use bon::Builder;
use chrono::{DateTime, Utc};
use getset::Getters;
use serde::{Deserialize, Serialize};

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Manifest side-file suffix; a stored backup set is discoverable by this.
pub static MANIFEST_FILE_SUFFIX: &str = ".manifest.yml";

static TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Describes one stored backup run: the selector and archiver configuration
/// actually used, the destination, the timestamp, the restore policy and the
/// archive file names.
///
/// A manifest must always be sufficient, on its own, to restore the
/// associated archives without consulting live configuration. Unknown
/// fields are ignored on read so older readers tolerate newer manifests.
#[derive(Clone, Serialize, Deserialize, Debug, Builder, Getters)]
#[getset(get = "pub")]
pub struct BackupManifest {
    #[builder(into)]
    file_name_base: String,
    timestamp: DateTime<Utc>,
    selectors: Vec<SelectorConfig>,
    storage: StorageConfig,
    location: LocationConfig,
    #[builder(default)]
    restore_policy: RestorePolicy,
    archives: Vec<String>,
}

impl BackupManifest {
    /// File name of the manifest side-file for this backup set.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.file_name_base, MANIFEST_FILE_SUFFIX)
    }

    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .map_err(Error::from)
            .with_msg(format!("Cannot create manifest file {:?}", path))?;
        serde_yml::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn read_from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(Error::from)
            .with_msg(format!("Cannot open manifest file {:?}", path))?;
        Ok(serde_yml::from_reader(BufReader::new(file))?)
    }
}

pub fn is_manifest_file_name(name: &str) -> bool {
    name.ends_with(MANIFEST_FILE_SUFFIX)
}

/// Generates the shared base name for one backup run's archives and
/// manifest: `backup_{timestamp}_{millis}_{pid}`.
///
/// Fixed-width and lexically sortable by recency. The millisecond component
/// keeps back-to-back runs apart and the pid keeps concurrent processes
/// sharing a temp directory apart.
pub fn generate_file_name_base(timestamp: &DateTime<Utc>) -> String {
    format!(
        "backup_{}_{:03}_{:x}",
        timestamp.format(TIME_FORMAT),
        timestamp.timestamp_subsec_millis(),
        std::process::id()
    )
}
