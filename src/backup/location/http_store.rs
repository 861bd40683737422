use crate::backup::location::{file_name_of, Location};
use crate::backup::manifest::{is_manifest_file_name, BackupManifest, MANIFEST_FILE_SUFFIX};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;

use bon::Builder;
use getset::Getters;
use reqwest::blocking::{Body, Client};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use validator::Validate;

use std::fs::File;
use std::path::{Path, PathBuf};

/// A backup destination behind a minimal named-blob HTTP endpoint.
///
/// Expected endpoint contract, deliberately the thinnest possible:
/// `PUT`/`GET`/`DELETE` on `{base_url}/{name}` for individual objects, and
/// `GET` on `{base_url}/` returning a JSON array of stored object names.
///
/// Duplicate handling: storing a `file_name_base` whose manifest object
/// already exists is rejected as a duplicate backup; the probe is a `HEAD`
/// on the manifest object before any upload starts.
#[derive(Clone, Serialize, Deserialize, Debug, Validate, Builder, Getters, PartialEq, Eq)]
pub struct HttpObjectStoreLocation {
    #[validate(url)]
    #[builder(into)]
    #[getset(get = "pub")]
    base_url: String,
}

impl HttpObjectStoreLocation {
    fn object_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), name)
    }

    fn listing_url(&self) -> String {
        format!("{}/", self.base_url.trim_end_matches('/'))
    }

    fn upload(&self, client: &Client, path: &Path, name: &str) -> Result<()> {
        let file = File::open(path)
            .map_err(Error::from)
            .with_msg(format!("Cannot open {:?} for upload", path))?;
        client
            .put(self.object_url(name))
            .body(Body::from(file))
            .send()?
            .error_for_status()?;
        tracing::debug!("Uploaded {:?} as {}", path, name);
        Ok(())
    }

    fn fetch_to(&self, client: &Client, name: &str, dest: &Path) -> Result<()> {
        let mut response = client
            .get(self.object_url(name))
            .send()?
            .error_for_status()?;
        let mut file = File::create(dest)
            .map_err(Error::from)
            .with_msg(format!("Cannot create {:?}", dest))?;
        std::io::copy(&mut response, &mut file)?;
        Ok(())
    }
}

impl Location for HttpObjectStoreLocation {
    fn display_id(&self) -> String {
        self.base_url.clone()
    }

    fn store(&self, archives: &[PathBuf], manifest_file: &Path) -> Result<()> {
        let client = Client::new();
        let manifest_name = file_name_of(manifest_file)?;

        let probe = client.head(self.object_url(&manifest_name)).send()?;
        if probe.status() != StatusCode::NOT_FOUND {
            probe.error_for_status()?;
            return Err(Error::DuplicateBackup {
                location: self.display_id(),
                file_name_base: manifest_name
                    .strip_suffix(MANIFEST_FILE_SUFFIX)
                    .unwrap_or(&manifest_name)
                    .to_string(),
            });
        }

        let mut uploaded: Vec<String> = Vec::new();
        for archive in archives {
            let name = file_name_of(archive)?;
            match self.upload(&client, archive, &name) {
                Ok(()) => uploaded.push(name),
                Err(e) => {
                    // best-effort rollback; the manifest was never uploaded
                    for name in &uploaded {
                        if let Err(rm) = client
                            .delete(self.object_url(name))
                            .send()
                            .and_then(|r| r.error_for_status())
                        {
                            tracing::warn!("Rollback of {} failed: {}", name, rm);
                        }
                    }
                    return Err(e);
                }
            }
        }

        self.upload(&client, manifest_file, &manifest_name)?;
        tracing::info!(
            "Stored {} archive(s) and manifest {} at {}",
            archives.len(),
            manifest_name,
            self.base_url
        );
        Ok(())
    }

    fn list_available_backups(&self) -> Result<Vec<BackupManifest>> {
        let client = Client::new();
        let names: Vec<String> = client
            .get(self.listing_url())
            .send()?
            .error_for_status()?
            .json()?;

        let mut manifests: Vec<BackupManifest> = Vec::new();
        for name in names.iter().filter(|n| is_manifest_file_name(n)) {
            let body = client
                .get(self.object_url(name))
                .send()?
                .error_for_status()?
                .text()?;
            match serde_yml::from_str(&body) {
                Ok(manifest) => manifests.push(manifest),
                Err(e) => tracing::warn!("Skipping unparsable manifest {}: {}", name, e),
            }
        }
        manifests.sort_by_key(|m| *m.timestamp());
        Ok(manifests)
    }

    fn retrieve(&self, manifest: &BackupManifest, temp_dir: &Path) -> Result<Vec<PathBuf>> {
        let client = Client::new();
        let mut local: Vec<PathBuf> = Vec::new();
        for name in manifest.archives() {
            let dest = temp_dir.join(name);
            self.fetch_to(&client, name, &dest)
                .with_msg(format!("Retrieving {} from {} failed", name, self.base_url))?;
            local.push(dest);
        }
        Ok(local)
    }
}
