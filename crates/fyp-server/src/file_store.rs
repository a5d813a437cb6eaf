//! On-disk storage for uploaded proposal and deliverable files.
//!
//! Files are stored flat under the upload directory, named by a fresh UUID.
//! The portal only ever hands out `/files/{id}` links, so client-supplied
//! names never reach the filesystem.

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ServerError;

/// Verify that a resolved path stays within the expected base directory.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, ServerError> {
    let canonical_base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    let mut resolved = canonical_base.clone();
    for component in target
        .strip_prefix(base)
        .unwrap_or(target)
        .components()
    {
        match component {
            Component::Normal(c) => resolved.push(c),
            Component::ParentDir => {
                return Err(ServerError::BadRequest("Path traversal detected".to_string()));
            }
            _ => {}
        }
    }
    if !resolved.starts_with(&canonical_base) {
        return Err(ServerError::BadRequest("Path traversal detected".to_string()));
    }
    Ok(resolved)
}

#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: PathBuf,
    max_size: usize,
}

impl FileStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::FileStorage(format!(
                "Failed to create upload directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Upload store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub async fn store(&self, data: &[u8]) -> Result<Uuid, ServerError> {
        if data.is_empty() {
            return Err(ServerError::BadRequest("Uploaded file is empty".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::UploadTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let id = Uuid::new_v4();
        let path = self.path_for(&id)?;

        fs::write(&path, data)
            .await
            .map_err(|e| ServerError::FileStorage(format!("Failed to write file {id}: {e}")))?;

        debug!(id = %id, size = data.len(), "Stored upload");
        Ok(id)
    }

    pub async fn get(&self, id: Uuid) -> Result<Vec<u8>, ServerError> {
        let path = self.path_for(&id)?;

        if !path.exists() {
            return Err(ServerError::NotFound("File"));
        }

        fs::read(&path)
            .await
            .map_err(|e| ServerError::FileStorage(format!("Failed to read file {id}: {e}")))
    }

    /// Remove a stored file. Used to undo an upload whose database write
    /// failed; a missing file is not an error.
    pub async fn discard(&self, id: Uuid) {
        let Ok(path) = self.path_for(&id) else {
            return;
        };
        match fs::remove_file(&path).await {
            Ok(()) => debug!(id = %id, "Discarded upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(id = %id, error = %e, "Failed to discard upload"),
        }
    }

    fn path_for(&self, id: &Uuid) -> Result<PathBuf, ServerError> {
        let raw = self.base_path.join(id.to_string());
        ensure_within(&self.base_path, &raw)
    }
}
