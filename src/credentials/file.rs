//! File-backed token store.
//!
//! One file per key, written through a temporary file and a rename so a
//! crash never leaves a half-written token behind.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::io::AsyncWriteExt;

use super::TokenStore;

pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn with_path(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create token dir: {dir:?}"))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn token_file(&self, key: &str) -> Result<PathBuf> {
        let safe = !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains(['/', '\\', '\0']);
        if !safe {
            anyhow::bail!("Invalid token key {key:?}: must be a single path segment");
        }
        Ok(self.dir.join(format!("{key}.token")))
    }
}

/// Create `path` readable only by the owner and write `payload` to it.
async fn write_private(path: &Path, payload: &[u8]) -> Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options
        .open(path)
        .await
        .with_context(|| format!("Failed to create token file: {path:?}"))?;
    file.write_all(payload)
        .await
        .with_context(|| format!("Failed to write token file: {path:?}"))?;
    file.sync_all()
        .await
        .with_context(|| format!("Failed to flush token file: {path:?}"))
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self, key: &str) -> Result<Option<SecretString>> {
        let path = self.token_file(key)?;
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to read token file: {path:?}"))
            }
        };

        let token = raw.trim();
        if token.is_empty() {
            return Ok(None);
        }
        Ok(Some(SecretString::from(token.to_string())))
    }

    async fn save(&self, key: &str, token: SecretString) -> Result<()> {
        let path = self.token_file(key)?;
        let tmp = path.with_extension("token.tmp");
        let payload = format!("{}\n", token.expose_secret().trim());

        // Leftover from an interrupted save.
        match tokio::fs::remove_file(&tmp).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to remove stale {tmp:?}"))
            }
        }

        let written = match write_private(&tmp, payload.as_bytes()).await {
            Ok(()) => tokio::fs::rename(&tmp, &path)
                .await
                .with_context(|| format!("Failed to move token file into place: {path:?}")),
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err);
        }

        tracing::debug!(key, "Stored token");
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        let path = self.token_file(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("Failed to delete token file: {path:?}")),
        }
    }
}
