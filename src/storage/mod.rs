//! Storage backend abstraction for evidence files.
//!
//! Files are content-addressed: the key is the hex SHA-256 of the bytes plus
//! the original extension, so identical uploads share one stored object.

pub mod local;

use actix_web::web::Bytes;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// A boxed stream of bytes for streaming file content.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Represents a retrieved storage object with metadata.
pub struct StorageObject {
    /// Streaming body content
    pub body: ByteStream,
    /// Content length in bytes
    pub content_length: Option<i64>,
    /// MIME content type
    pub content_type: Option<String>,
}

impl std::fmt::Debug for StorageObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageObject")
            .field("content_length", &self.content_length)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Storage operation errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(std::io::Error),
    #[error("Upload exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(e.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

/// Trait for storage backends.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store a file under `key`.
    ///
    /// Keys are stored with a prefix structure: `{key[0:2]}/{key[2:4]}/{key}`
    async fn put_object(&self, data: Vec<u8>, key: &str) -> Result<(), StorageError>;

    /// Retrieve a file.
    async fn get_object(&self, key: &str) -> Result<StorageObject, StorageError>;

    /// Check if a file exists.
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;
}

/// Build the content-addressed key for a file.
///
/// The extension is taken from the client file name, lower-cased, and dropped
/// unless it is short and alphanumeric.
pub fn content_key(sha256_hex: &str, file_name: Option<&str>) -> String {
    let ext = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    match ext {
        Some(ext) => format!("{}.{}", sha256_hex, ext),
        None => sha256_hex.to_string(),
    }
}

/// The SHA-256 digest a content-addressed key was built from.
pub fn key_digest(key: &str) -> Option<&str> {
    let stem = key.split_once('.').map_or(key, |(stem, _)| stem);
    (stem.len() == 64 && stem.chars().all(|c| c.is_ascii_hexdigit())).then_some(stem)
}

/// Get MIME type from a key's extension.
pub fn guess_mime_type(key: &str) -> Option<String> {
    let (_, ext) = key.rsplit_once('.')?;
    let mime = match ext.to_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    };
    Some(mime.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_key_keeps_extension() {
        assert_eq!(content_key("abcd", Some("Photo.JPG")), "abcd.jpg");
    }

    #[test]
    fn test_content_key_without_name() {
        assert_eq!(content_key("abcd", None), "abcd");
        assert_eq!(content_key("abcd", Some("README")), "abcd");
    }

    #[test]
    fn test_content_key_drops_odd_extensions() {
        assert_eq!(content_key("abcd", Some("x.tar/../../etc")), "abcd");
        assert_eq!(content_key("abcd", Some("trailing.")), "abcd");
    }

    #[test]
    fn test_key_digest() {
        let digest = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
        assert_eq!(key_digest(&content_key(digest, Some("a.jpg"))), Some(digest));
        assert_eq!(key_digest(digest), Some(digest));
        assert_eq!(key_digest("abcd.jpg"), None);
        assert_eq!(key_digest("legacy/upload.png"), None);
    }

    #[test]
    fn test_guess_mime_type() {
        assert_eq!(guess_mime_type("abcd.png").as_deref(), Some("image/png"));
        assert_eq!(guess_mime_type("abcd.bin").as_deref(), Some("application/octet-stream"));
        assert_eq!(guess_mime_type("abcd"), None);
    }
}
