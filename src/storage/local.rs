//! Local filesystem storage backend.

use super::{guess_mime_type, ByteStream, StorageBackend, StorageError, StorageObject};
use actix_web::web::{self, Bytes};
use async_trait::async_trait;
use futures::stream;
use std::fs;
use std::path::PathBuf;

/// Local filesystem storage backend.
pub struct LocalStorage {
    /// Base path for file storage
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new local storage backend.
    ///
    /// The `base_path` directory will be created if it doesn't exist.
    pub fn new(base_path: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path)?;
        log::info!("LocalStorage initialized at {:?}", base_path);
        Ok(Self { base_path })
    }

    /// Get the full path for a key, including prefix directories.
    fn get_file_path(&self, key: &str) -> PathBuf {
        if key.len() < 4 {
            self.base_path.join(key)
        } else {
            let prefix1 = &key[0..2];
            let prefix2 = &key[2..4];
            self.base_path.join(prefix1).join(prefix2).join(key)
        }
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn put_object(&self, data: Vec<u8>, key: &str) -> Result<(), StorageError> {
        let path = self.get_file_path(key);
        log::info!("LocalStorage: put_object: {:?}", path);

        web::block(move || {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, data)
        })
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(e)))??;

        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<StorageObject, StorageError> {
        let path = self.get_file_path(key);
        log::debug!("LocalStorage: get_object: {:?}", path);

        let buffer = web::block(move || fs::read(&path))
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))??;

        let content_length = buffer.len() as i64;
        let body: ByteStream = Box::pin(stream::once(async move { Ok(Bytes::from(buffer)) }));

        Ok(StorageObject {
            body,
            content_length: Some(content_length),
            content_type: guess_mime_type(key),
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get_file_path(key).exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[actix_rt::test]
    async fn test_put_then_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf()).unwrap();

        storage
            .put_object(b"evidence bytes".to_vec(), "abcdef.txt")
            .await
            .unwrap();
        assert!(storage.exists("abcdef.txt").await.unwrap());
        assert!(dir.path().join("ab").join("cd").join("abcdef.txt").exists());

        let mut object = storage.get_object("abcdef.txt").await.unwrap();
        assert_eq!(object.content_length, Some(14));
        assert_eq!(object.content_type.as_deref(), Some("text/plain"));
        let chunk = object.body.next().await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"evidence bytes");
    }

    #[actix_rt::test]
    async fn test_missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf()).unwrap();

        assert!(!storage.exists("ffff00").await.unwrap());
        assert!(matches!(
            storage.get_object("ffff00").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
