use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// URL prefix under which the storage directory is served.
pub const ARTIFACT_ROUTE: &str = "/images";

#[derive(Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    public_base_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
    #[error("Storage task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Upload,
    Original,
    Annotated,
}

#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub path: PathBuf,
    pub url: String,
}

impl ArtifactKind {
    pub fn file_name(&self, id: Uuid) -> String {
        match self {
            ArtifactKind::Upload => format!("{}.dcm", id),
            ArtifactKind::Original => format!("{}.png", id),
            ArtifactKind::Annotated => format!("{}_annotated.png", id),
        }
    }
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| StorageError::Io {
                path: self.root.display().to_string(),
                source,
            })
    }

    pub fn path_for(&self, id: Uuid, kind: ArtifactKind) -> PathBuf {
        self.root.join(kind.file_name(id))
    }

    pub fn url_for(&self, id: Uuid, kind: ArtifactKind) -> String {
        format!(
            "{}{}/{}",
            self.public_base_url,
            ARTIFACT_ROUTE,
            kind.file_name(id)
        )
    }

    /// Writes a new artifact. Existing files are never overwritten.
    pub async fn put_bytes(
        &self,
        id: Uuid,
        kind: ArtifactKind,
        data: &[u8],
    ) -> Result<StoredArtifact, StorageError> {
        let path = self.path_for(id, kind);
        let io_error = |source: std::io::Error| StorageError::Io {
            path: path.display().to_string(),
            source,
        };

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(io_error)?;
        file.write_all(data).await.map_err(io_error)?;
        file.flush().await.map_err(io_error)?;

        log::debug!("Stored {} bytes at {}", data.len(), path.display());
        Ok(StoredArtifact {
            url: self.url_for(id, kind),
            path,
        })
    }

    pub async fn put_png(
        &self,
        id: Uuid,
        kind: ArtifactKind,
        image: DynamicImage,
    ) -> Result<StoredArtifact, StorageError> {
        let encoded = tokio::task::spawn_blocking(move || encode_png(&image))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))??;
        self.put_bytes(id, kind, &encoded).await
    }
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, StorageError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}
