//! Filesystem storage for post images.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use imagesize::ImageType;
use slug::slugify;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

/// Directory (relative to the media root) that holds post images.
pub const POST_IMAGE_DIR: &str = "posts";

const MAX_STEM_CHARS: usize = 64;

#[derive(Debug, Error)]
pub enum MediaStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error("uploaded file is not a supported image")]
    UnsupportedFormat,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Media files rooted at a single directory. Stored paths are relative to
/// that root and never escape it.
#[derive(Debug)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a post image and return its path relative to the media root.
    pub async fn store_post_image(
        &self,
        original_name: &str,
        data: &[u8],
    ) -> Result<String, MediaStorageError> {
        if data.is_empty() {
            return Err(MediaStorageError::EmptyPayload);
        }

        let extension = raster_extension(data).ok_or(MediaStorageError::UnsupportedFormat)?;
        let stored_path = build_stored_path(original_name, extension);
        let absolute = self.resolve(&stored_path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&absolute).await?;
        if let Err(err) = file.write_all(data).await {
            drop(file);
            let _ = fs::remove_file(&absolute).await;
            return Err(err.into());
        }
        file.flush().await?;

        Ok(stored_path)
    }

    pub async fn read(&self, stored_path: &str) -> Result<Bytes, MediaStorageError> {
        let absolute = self.resolve(stored_path)?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    /// Remove a stored file. Missing files are treated as success.
    pub async fn delete(&self, stored_path: &str) -> Result<(), MediaStorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::remove_file(&absolute).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(MediaStorageError::Io(err)),
        }
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, MediaStorageError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(MediaStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

/// File extension for the raster formats accepted as post images, detected
/// from the leading bytes rather than the client's filename.
pub fn raster_extension(data: &[u8]) -> Option<&'static str> {
    match imagesize::image_type(data).ok()? {
        ImageType::Gif => Some("gif"),
        ImageType::Png => Some("png"),
        ImageType::Jpeg => Some("jpg"),
        ImageType::Webp => Some("webp"),
        ImageType::Bmp => Some("bmp"),
        _ => None,
    }
}

fn build_stored_path(original_name: &str, extension: &str) -> String {
    let (year, month, day) = time::OffsetDateTime::now_utc().to_calendar_date();
    let identifier = Uuid::new_v4().simple();
    let filename = sanitize_filename(original_name, extension);
    format!(
        "{POST_IMAGE_DIR}/{year}/{:02}/{day:02}/{identifier}-{filename}",
        month as u8
    )
}

fn sanitize_filename(original: &str, extension: &str) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("image");
    let slugged = slugify(stem);
    let mut base: String = slugged.chars().take(MAX_STEM_CHARS).collect();
    while base.ends_with('-') {
        base.pop();
    }
    if base.is_empty() {
        base = "image".to_string();
    }

    format!("{base}.{extension}")
}
