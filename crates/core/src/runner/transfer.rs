//! Artifact transfer between object storage and the scratch directory.

use std::path::PathBuf;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::metrics::{ARTIFACT_CACHE_HITS, ARTIFACT_DOWNLOADS, ARTIFACT_UPLOADS};
use crate::storage::{ObjectStore, ObjectStoreError};

use super::cache::{ArtifactCache, ArtifactState, Claim};

/// Errors that can occur while moving artifacts.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Object storage read failed during a download.
    #[error("Fetch of `{filename}` failed: {source}")]
    Fetch {
        filename: String,
        #[source]
        source: ObjectStoreError,
    },

    /// Object storage write failed during an upload.
    #[error("Upload of `{filename}` failed: {source}")]
    Upload {
        filename: String,
        #[source]
        source: ObjectStoreError,
    },

    /// Local filesystem read or write failed.
    #[error("Local I/O for `{filename}` failed: {source}")]
    Io {
        filename: String,
        #[source]
        source: std::io::Error,
    },

    /// The task that owned the fetch of this filename failed; this task only
    /// observed the shared failure.
    #[error("Fetch of `{0}` failed in the owning task")]
    FetchAborted(String),

    /// The transfer did not finish within its deadline.
    #[error("Transfer of `{filename}` timed out after {timeout_secs} seconds")]
    Timeout { filename: String, timeout_secs: u64 },
}

/// Which storage sub-prefix an artifact lives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Executable, stored under `{prefix}/bin/`.
    Binary,
    /// Input or output data, stored under `{prefix}/workdir/`.
    Input,
}

impl ArtifactKind {
    pub fn sub_prefix(&self) -> &'static str {
        match self {
            ArtifactKind::Binary => "bin",
            ArtifactKind::Input => "workdir",
        }
    }
}

/// Immutable per-invocation context shared by every transfer task.
#[derive(Debug, Clone)]
pub struct BatchContext {
    pub bucket: String,
    pub prefix: String,
    pub scratch_dir: PathBuf,
}

impl BatchContext {
    /// Storage key for an artifact of the given kind.
    pub fn storage_key(&self, kind: ArtifactKind, filename: &str) -> String {
        format!("{}/{}/{}", self.prefix, kind.sub_prefix(), filename)
    }

    /// Local path of an artifact in the scratch directory.
    pub fn local_path(&self, filename: &str) -> PathBuf {
        self.scratch_dir.join(filename)
    }
}

/// Fetch one artifact into the scratch directory, coordinating through the
/// cache so each distinct filename is fetched at most once per invocation.
///
/// Returns `true` if this call performed the fetch, `false` if it joined
/// another task's fetch.
pub async fn download(
    store: &dyn ObjectStore,
    cache: &ArtifactCache,
    ctx: &BatchContext,
    kind: ArtifactKind,
    filename: &str,
) -> Result<bool, TransferError> {
    let claim = match cache.claim(filename).await {
        Claim::Fetch(claim) => claim,
        Claim::Wait(rx) => {
            ARTIFACT_CACHE_HITS.inc();
            debug!(filename, "Awaiting in-flight fetch");
            return match ArtifactCache::wait(rx).await {
                ArtifactState::Ready => Ok(false),
                _ => Err(TransferError::FetchAborted(filename.to_string())),
            };
        }
    };

    let key = ctx.storage_key(kind, filename);
    let outfile = ctx.local_path(filename);
    debug!(%key, outfile = %outfile.display(), "Downloading artifact");

    let bytes = match store.get_object(&ctx.bucket, &key).await {
        Ok(bytes) => bytes,
        Err(source) => {
            ARTIFACT_DOWNLOADS.with_label_values(&["failed"]).inc();
            claim.fail();
            return Err(TransferError::Fetch {
                filename: filename.to_string(),
                source,
            });
        }
    };

    let digest = Sha256::digest(&bytes);
    debug!(filename, bytes = bytes.len(), sha256 = %format!("{:x}", digest), "Artifact fetched");

    if let Err(source) = tokio::fs::write(&outfile, &bytes).await {
        ARTIFACT_DOWNLOADS.with_label_values(&["failed"]).inc();
        claim.fail();
        return Err(TransferError::Io {
            filename: filename.to_string(),
            source,
        });
    }

    ARTIFACT_DOWNLOADS.with_label_values(&["fetched"]).inc();
    claim.complete();
    Ok(true)
}

/// Push one output artifact from the scratch directory to object storage.
///
/// Output keys always live under `workdir/`. Uploads record `Pending`/`Ready`
/// in the cache for symmetry with downloads but are never deduplicated.
pub async fn upload(
    store: &dyn ObjectStore,
    cache: &ArtifactCache,
    ctx: &BatchContext,
    filename: &str,
) -> Result<(), TransferError> {
    let claim = cache.track(filename).await;
    let key = ctx.storage_key(ArtifactKind::Input, filename);
    let file = ctx.local_path(filename);
    debug!(file = %file.display(), %key, "Uploading artifact");

    let bytes = match tokio::fs::read(&file).await {
        Ok(bytes) => bytes,
        Err(source) => {
            ARTIFACT_UPLOADS.with_label_values(&["failed"]).inc();
            claim.fail();
            return Err(TransferError::Io {
                filename: filename.to_string(),
                source,
            });
        }
    };

    if let Err(source) = store.put_object(&ctx.bucket, &key, bytes).await {
        ARTIFACT_UPLOADS.with_label_values(&["failed"]).inc();
        claim.fail();
        return Err(TransferError::Upload {
            filename: filename.to_string(),
            source,
        });
    }

    ARTIFACT_UPLOADS.with_label_values(&["uploaded"]).inc();
    claim.complete();
    Ok(())
}
