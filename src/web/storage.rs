use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use axum::{
    extract::{Path as AxumPath, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{error, warn};
use uuid::Uuid;

use crate::web::AppState;

/// On-disk store for piece images. Files are keyed by a generated UUID name;
/// the piece row references the file by that name only.
#[derive(Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Ensure the media root exists before the first write.
    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("failed to ensure media root at {}", self.root.display()))
    }

    pub fn path_for(&self, stored_name: &str) -> PathBuf {
        self.root.join(stored_name)
    }

    /// Persist image bytes under a freshly generated name, returning the name.
    pub async fn store_image(&self, extension: &str, bytes: &[u8]) -> Result<String> {
        let stored_name = format!("{}.{}", Uuid::new_v4(), extension);
        let path = self.path_for(&stored_name);

        let mut file = File::create(&path)
            .await
            .with_context(|| format!("failed to create media file {}", path.display()))?;
        file.write_all(bytes)
            .await
            .with_context(|| format!("failed to write media file {}", path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("failed to flush media file {}", path.display()))?;

        Ok(stored_name)
    }

    /// Best-effort removal of a stored image. The row is the source of truth;
    /// an orphaned file only wastes disk space.
    pub async fn delete(&self, stored_name: &str) {
        let path = self.path_for(stored_name);
        if let Err(err) = tokio::fs::remove_file(&path).await {
            warn!(?err, file = %path.display(), "failed to remove media file");
        }
    }
}

/// Serve a stored image inline. Names are UUID-derived, so anything that
/// sanitizes differently (path separators, traversal) is rejected outright.
pub async fn serve_media(
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
) -> Result<Response, StatusCode> {
    if name.is_empty() || sanitize_filename::sanitize(&name) != name {
        return Err(StatusCode::NOT_FOUND);
    }

    let path = state.media().path_for(&name);
    if !is_media_path(&path) {
        return Err(StatusCode::NOT_FOUND);
    }
    let bytes = tokio::fs::read(&path).await.map_err(|err| {
        error!(?err, file = %path.display(), "failed to read media file");
        StatusCode::NOT_FOUND
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("image/jpeg"),
    );

    Ok((headers, bytes).into_response())
}

/// Only files the store itself could have written are servable.
pub fn is_media_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| crate::validation::ALLOWED_IMAGE_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_and_delete_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let media = MediaStore::new(dir.path());
        media.ensure_root().await.expect("ensure root");

        let stored = media.store_image("jpg", b"jpeg-bytes").await.expect("store");
        assert!(stored.ends_with(".jpg"));

        let path = media.path_for(&stored);
        assert_eq!(tokio::fs::read(&path).await.expect("read back"), b"jpeg-bytes");
        assert!(is_media_path(&path));

        media.delete(&stored).await;
        assert!(!path.exists());
    }

    #[test]
    fn non_image_paths_rejected() {
        assert!(!is_media_path(Path::new("notes.txt")));
        assert!(!is_media_path(Path::new("bare")));
    }
}
