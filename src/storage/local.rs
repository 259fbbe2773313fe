//! Local filesystem storage implementation.
//!
//! State files are written atomically (temp file, then rename) so a reader
//! never sees a partially written state.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::Result;
use crate::models::PageState;
use crate::storage::{Loaded, StateStore};
use crate::utils::fs::temp_path;
use crate::utils::slug;

/// State file extension.
const STATE_EXT: &str = "json";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStateStore {
    root_dir: PathBuf,
}

impl LocalStateStore {
    /// Create a new store rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Create the data directory (owner-only) if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<()> {
        if tokio::fs::metadata(&self.root_dir).await.is_ok() {
            return Ok(());
        }

        create_private_dir(&self.root_dir).await?;

        log::debug!("Created data directory {}", self.root_dir.display());
        Ok(())
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Read bytes, returning None if the file doesn't exist.
    async fn read_bytes(&self, path: &Path) -> std::io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Create a directory and its missing parents, owner-only.
async fn create_private_dir(path: &Path) -> std::io::Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(crate::utils::fs::PRIVATE_DIR_MODE);
    builder.create(path).await
}

#[async_trait]
impl StateStore for LocalStateStore {
    fn path_for(&self, url: &str) -> PathBuf {
        self.root_dir.join(format!("{}.{}", slug(url), STATE_EXT))
    }

    async fn load(&self, url: &str) -> Loaded {
        let path = self.path_for(url);
        log::debug!("Data file path: {}", path.display());

        let bytes = match self.read_bytes(&path).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Loaded::Missing,
            Err(e) => return Loaded::Invalid(format!("{}: {}", path.display(), e)),
        };

        match std::str::from_utf8(&bytes)
            .map_err(|e| e.to_string())
            .and_then(|raw| PageState::from_json(raw).map_err(|e| e.to_string()))
        {
            Ok(state) => Loaded::Found(state),
            Err(e) => Loaded::Invalid(format!("{}: {}", path.display(), e)),
        }
    }

    async fn write(&self, path: &Path, payload: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            create_private_dir(parent).await?;
        }

        let tmp = temp_path(path);
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(payload).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        tokio::fs::remove_file(path).await?;
        Ok(())
    }
}
