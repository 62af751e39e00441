// SPDX-License-Identifier: MIT OR Apache-2.0
//! Source snapshot acquisition (spec.md §4.4 C4).
//!
//! Resolves an archive URL, downloads it with `reqwest` streaming, and
//! unzips it into a fresh temporary directory the caller owns and must
//! remove.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod archive;
mod extract;

use octorunner_core::EventScope;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors raised while acquiring a source snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Resolving the archive URL via the forge API failed.
    #[error("failed to resolve archive url: {0}")]
    UrlResolution(String),
    /// Downloading or writing the archive failed.
    #[error("snapshot i/o error: {0}")]
    Io(String),
    /// The archive could not be opened as a zip file.
    #[error("snapshot archive is corrupt: {0}")]
    Zip(String),
    /// The archive had no usable root directory.
    #[error("snapshot archive has no recognisable root directory")]
    Structure,
    /// The event scope was cancelled before the fetch completed.
    #[error("snapshot fetch cancelled")]
    Cancelled,
}

impl SnapshotError {
    /// Classify this error per spec.md §7.
    #[must_use]
    pub fn kind(&self) -> octorunner_core::ErrorKind {
        match self {
            SnapshotError::Structure => octorunner_core::ErrorKind::SnapshotStructure,
            _ => octorunner_core::ErrorKind::SnapshotIo,
        }
    }
}

/// A downloaded-and-extracted source snapshot. On [`Drop`] the directory is
/// left in place — cleanup is the orchestrator's responsibility on every
/// exit path per spec.md §4.10, so the caller can hold this past errors.
#[derive(Debug)]
pub struct Snapshot {
    /// Root of the extracted working tree (already resolved past the
    /// archive's own wrapper directory).
    pub workdir: PathBuf,
    /// The temporary directory that owns `workdir` and must be removed by
    /// the caller once the event finishes.
    pub temp_root: PathBuf,
}

/// Fetches and extracts source snapshots from a forge.
#[derive(Debug, Clone)]
pub struct SnapshotFetcher {
    client: reqwest::Client,
    forge_api_base: String,
    forge_web_base: String,
}

impl SnapshotFetcher {
    /// Construct a fetcher pointed at a forge's web and API bases (e.g.
    /// `https://github.com` and `https://api.github.com`).
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] if the HTTP client cannot be built.
    pub fn new(forge_web_base: &str, forge_api_base: &str) -> Result<Self, SnapshotError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| SnapshotError::Io(e.to_string()))?;
        Ok(Self {
            client,
            forge_api_base: forge_api_base.to_string(),
            forge_web_base: forge_web_base.to_string(),
        })
    }

    /// Fetch the snapshot for `(owner, repo, commit)`, using `token` to
    /// authenticate against the forge API when present (spec.md §4.4).
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] on any network, filesystem, or archive
    /// structure failure, or [`SnapshotError::Cancelled`] if `scope` is
    /// cancelled mid-fetch.
    pub async fn fetch(
        &self,
        owner: &str,
        repo: &str,
        commit: &str,
        token: Option<&str>,
        scope: &EventScope,
    ) -> Result<Snapshot, SnapshotError> {
        let url = archive::resolve_archive_url(
            &self.client,
            &self.forge_web_base,
            &self.forge_api_base,
            owner,
            repo,
            commit,
            token,
        );
        let url = match scope.race(url).await {
            Some(result) => result?,
            None => return Err(SnapshotError::Cancelled),
        };

        let temp_root = unique_temp_dir(owner, repo, commit);
        tokio::fs::create_dir_all(&temp_root)
            .await
            .map_err(|e| SnapshotError::Io(e.to_string()))?;

        let result = self.download_and_extract(&url, token, &temp_root, scope).await;
        match result {
            Ok(workdir) => Ok(Snapshot { workdir, temp_root }),
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&temp_root).await;
                Err(e)
            }
        }
    }

    async fn download_and_extract(
        &self,
        url: &str,
        token: Option<&str>,
        temp_root: &Path,
        scope: &EventScope,
    ) -> Result<PathBuf, SnapshotError> {
        let archive_path = temp_root.join("snapshot.zip");
        let download = archive::download_to_file(&self.client, url, token, &archive_path);
        match scope.race(download).await {
            Some(result) => result?,
            None => return Err(SnapshotError::Cancelled),
        }

        let extract_root = temp_root.join("tree");
        let extracted = {
            let archive_path = archive_path.clone();
            let extract_root = extract_root.clone();
            tokio::task::spawn_blocking(move || extract::extract_zip(&archive_path, &extract_root))
                .await
                .map_err(|e| SnapshotError::Io(e.to_string()))??
        };

        let _ = tokio::fs::remove_file(&archive_path).await;
        Ok(extracted)
    }
}

fn unique_temp_dir(owner: &str, repo: &str, commit: &str) -> PathBuf {
    let id = uuid::Uuid::new_v4();
    std::env::temp_dir().join(format!("octorunner-{owner}-{repo}-{commit}-{id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_temp_dir_is_distinct_per_call() {
        let a = unique_temp_dir("alice", "proj", "abc");
        let b = unique_temp_dir("alice", "proj", "abc");
        assert_ne!(a, b);
    }
}
