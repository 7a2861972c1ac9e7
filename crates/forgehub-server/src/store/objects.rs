// SPDX-License-Identifier: Apache-2.0

use crate::store::{human_size_label, ObjectStoreBackend, StoreError, StoredObject};
use async_trait::async_trait;
use forgehub_model::ProjectId;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

fn sanitize_file_name(name: &str) -> Result<String, StoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.len() > 255 {
        return Err(StoreError(format!("invalid file name: {name:?}")));
    }
    if trimmed.contains('/') || trimmed.contains('\\') || trimmed == "." || trimmed == ".." {
        return Err(StoreError(format!(
            "file name must not contain path segments: {name:?}"
        )));
    }
    Ok(trimmed.to_string())
}

/// Blob storage on a local directory, one subdirectory per project.
/// Writes go through a temp file and rename so readers never observe a
/// partial object.
pub struct LocalFsBackend {
    root: PathBuf,
}

impl LocalFsBackend {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn object_path(&self, location: &str) -> Result<PathBuf, StoreError> {
        // Locations are produced by `put` and shaped project/file; reject
        // anything else before touching the filesystem.
        let mut parts = location.split('/');
        let (Some(project), Some(file), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(StoreError(format!("malformed storage location: {location}")));
        };
        let project = ProjectId::parse(project)
            .map_err(|e| StoreError(format!("malformed storage location: {e}")))?;
        let file = sanitize_file_name(file)?;
        Ok(self.root.join(project.as_str()).join(file))
    }
}

#[async_trait]
impl ObjectStoreBackend for LocalFsBackend {
    async fn put(
        &self,
        project: &ProjectId,
        name: &str,
        bytes: &[u8],
    ) -> Result<StoredObject, StoreError> {
        let file = sanitize_file_name(name)?;
        let dir = self.root.join(project.as_str());
        let target = dir.join(&file);
        let tmp = dir.join(format!(".{file}.tmp"));
        let size = bytes.len() as u64;
        let payload = bytes.to_vec();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            std::fs::create_dir_all(&dir).map_err(|e| StoreError(e.to_string()))?;
            std::fs::write(&tmp, &payload).map_err(|e| StoreError(e.to_string()))?;
            std::fs::rename(&tmp, &target).map_err(|e| StoreError(e.to_string()))
        })
        .await
        .map_err(|e| StoreError(e.to_string()))??;
        Ok(StoredObject {
            location: format!("{}/{}", project.as_str(), file),
            size_label: human_size_label(size),
        })
    }

    async fn delete(&self, location: &str) -> Result<(), StoreError> {
        let path = self.object_path(location)?;
        tokio::task::spawn_blocking(move || match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError(e.to_string())),
        })
        .await
        .map_err(|e| StoreError(e.to_string()))?
    }
}

/// In-memory blob store for tests. `fail_deletes` exercises the
/// best-effort cleanup path of check-in.
#[derive(Default)]
pub struct MemoryObjectStore {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub fail_deletes: bool,
}

impl MemoryObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, location: &str) -> bool {
        self.objects.lock().await.contains_key(location)
    }
}

#[async_trait]
impl ObjectStoreBackend for MemoryObjectStore {
    async fn put(
        &self,
        project: &ProjectId,
        name: &str,
        bytes: &[u8],
    ) -> Result<StoredObject, StoreError> {
        let file = sanitize_file_name(name)?;
        let location = format!("{}/{}", project.as_str(), file);
        self.objects
            .lock()
            .await
            .insert(location.clone(), bytes.to_vec());
        Ok(StoredObject {
            location,
            size_label: human_size_label(bytes.len() as u64),
        })
    }

    async fn delete(&self, location: &str) -> Result<(), StoreError> {
        if self.fail_deletes {
            return Err(StoreError("synthetic delete failure".to_string()));
        }
        self.objects.lock().await.remove(location);
        Ok(())
    }
}

/// Best-effort removal used for displaced files and project deletion.
/// Failures are logged, never surfaced: orphaned blobs are a cleanup
/// concern, not a correctness concern.
pub async fn delete_objects_best_effort(
    backend: &dyn ObjectStoreBackend,
    locations: impl IntoIterator<Item = String>,
) {
    for location in locations {
        if let Err(e) = backend.delete(&location).await {
            tracing::warn!(location = %location, "object delete failed: {e}");
        }
    }
}
