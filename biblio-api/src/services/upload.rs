//! Image storage for covers and avatars
//!
//! Uploaded bytes are validated by content, never by the declared MIME
//! type or file extension. Files are named so the owning user is
//! recoverable from the filename alone, which is what the delete
//! permission check runs on.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use biblio_common::{Error, Result};
use chrono::Utc;
use uuid::Uuid;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("biblio/", env!("CARGO_PKG_VERSION"));

const ACCEPTED_MIME_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/avif",
];

/// Where an image belongs; covers get their own subdirectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Avatar,
    Cover,
}

impl ImageKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            ImageKind::Avatar => "avatar",
            ImageKind::Cover => "cover",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "avatar" => Some(ImageKind::Avatar),
            "cover" => Some(ImageKind::Cover),
            _ => None,
        }
    }

    fn directory(&self, uploads_dir: &Path) -> PathBuf {
        match self {
            ImageKind::Avatar => uploads_dir.to_path_buf(),
            ImageKind::Cover => uploads_dir.join("covers"),
        }
    }

    fn public_path(&self, filename: &str) -> String {
        match self {
            ImageKind::Avatar => format!("/uploads/{}", filename),
            ImageKind::Cover => format!("/uploads/covers/{}", filename),
        }
    }
}

/// A stored image as reported back to the client.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub filename: String,
    pub public_path: String,
}

/// Check the magic bytes and return the canonical extension, rejecting
/// anything that is not one of the accepted image formats.
pub fn validate_image(bytes: &[u8]) -> Result<&'static str> {
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(Error::InvalidInput(format!(
            "image exceeds the {} MB limit",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }

    let kind = infer::get(bytes)
        .ok_or_else(|| Error::InvalidInput("file content is not a recognized image".to_string()))?;

    if !ACCEPTED_MIME_TYPES.contains(&kind.mime_type()) {
        return Err(Error::InvalidInput(format!(
            "unsupported image type {}",
            kind.mime_type()
        )));
    }

    Ok(kind.extension())
}

/// Validate and persist an upload, returning the public path to serve it
/// from. The owner's guid is embedded in the filename.
pub async fn save_image(
    uploads_dir: &Path,
    kind: ImageKind,
    owner: Uuid,
    bytes: &[u8],
) -> Result<StoredImage> {
    let extension = validate_image(bytes)?;

    let filename = format!(
        "{}-{}-{}-{}.{}",
        kind.prefix(),
        owner,
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple(),
        extension
    );

    let directory = kind.directory(uploads_dir);
    tokio::fs::create_dir_all(&directory).await?;
    tokio::fs::write(directory.join(&filename), bytes).await?;

    tracing::info!(filename = %filename, bytes = bytes.len(), "Stored image");

    Ok(StoredImage {
        public_path: kind.public_path(&filename),
        filename,
    })
}

/// True when the filename embeds this user's guid as the owner segment.
pub fn owns_file(filename: &str, user: Uuid) -> bool {
    filename.contains(&format!("-{}-", user))
}

/// Delete a stored image. Returns false when no such file exists.
/// Filenames containing path separators are rejected outright.
pub async fn delete_image(uploads_dir: &Path, kind: ImageKind, filename: &str) -> Result<bool> {
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Err(Error::InvalidInput("invalid filename".to_string()));
    }

    let path = kind.directory(uploads_dir).join(filename);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// Fetch a remote cover image. Redirects are followed; the result is
/// size-capped before validation.
pub struct ImageFetcher {
    http_client: reqwest::Client,
}

impl ImageFetcher {
    pub fn new() -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { http_client })
    }

    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(Error::InvalidInput("invalid image URL".to_string()));
        }

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::InvalidInput(format!("image download failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::InvalidInput(format!(
                "image download failed with status {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::InvalidInput(format!("image download failed: {}", e)))?;

        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(Error::InvalidInput(format!(
                "image exceeds the {} MB limit",
                MAX_IMAGE_BYTES / (1024 * 1024)
            )));
        }

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D,
    ];
    const JPEG_HEADER: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];

    #[test]
    fn accepts_png_and_jpeg_by_content() {
        assert_eq!(validate_image(PNG_HEADER).unwrap(), "png");
        assert_eq!(validate_image(JPEG_HEADER).unwrap(), "jpg");
    }

    #[test]
    fn rejects_non_image_content() {
        let err = validate_image(b"%PDF-1.4 not an image").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        assert!(validate_image(b"plain text").is_err());
    }

    #[test]
    fn rejects_oversized_payload() {
        let bytes = vec![0u8; MAX_IMAGE_BYTES + 1];
        assert!(matches!(
            validate_image(&bytes),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn ownership_is_read_from_the_filename() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let filename = format!("cover-{}-1712345678-abc123.jpg", owner);

        assert!(owns_file(&filename, owner));
        assert!(!owns_file(&filename, other));
    }

    #[tokio::test]
    async fn save_and_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let owner = Uuid::new_v4();

        let stored = save_image(dir.path(), ImageKind::Cover, owner, PNG_HEADER)
            .await
            .unwrap();

        assert!(stored.filename.starts_with("cover-"));
        assert!(stored.public_path.starts_with("/uploads/covers/"));
        assert!(dir.path().join("covers").join(&stored.filename).exists());

        let deleted = delete_image(dir.path(), ImageKind::Cover, &stored.filename)
            .await
            .unwrap();
        assert!(deleted);

        let deleted_again = delete_image(dir.path(), ImageKind::Cover, &stored.filename)
            .await
            .unwrap();
        assert!(!deleted_again);
    }

    #[tokio::test]
    async fn traversal_filenames_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(
            delete_image(dir.path(), ImageKind::Avatar, "../../etc/passwd")
                .await
                .is_err()
        );
    }
}
