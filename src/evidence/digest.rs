//! Single-pass SHA-256 digest and size of uploaded evidence.

use crate::storage::StorageError;
use sha2::{Digest, Sha256};

/// Hex SHA-256 and exact byte length of a file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileDigest {
    pub sha256: String,
    pub size: u64,
}

impl FileDigest {
    pub fn of(content: &[u8]) -> Self {
        let mut digest = StreamDigest::new();
        digest.update(content);
        digest.finish()
    }
}

/// Incremental digest over chunks as they arrive.
#[derive(Default)]
pub struct StreamDigest {
    hasher: Sha256,
    size: u64,
}

impl StreamDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.size += chunk.len() as u64;
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn finish(self) -> FileDigest {
        FileDigest {
            sha256: hex::encode(self.hasher.finalize()),
            size: self.size,
        }
    }
}

/// An uploaded file with its content and digest.
#[derive(Clone, Debug)]
pub struct EvidenceFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub digest: FileDigest,
}

impl EvidenceFile {
    pub fn from_bytes(
        file_name: Option<String>,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        let digest = FileDigest::of(&bytes);
        Self {
            file_name,
            content_type,
            bytes,
            digest,
        }
    }
}

/// Buffers an upload while hashing it, refusing anything over `limit` bytes.
pub struct UploadBuffer {
    digest: StreamDigest,
    bytes: Vec<u8>,
    limit: u64,
}

impl UploadBuffer {
    pub fn new(limit: u64) -> Self {
        Self {
            digest: StreamDigest::new(),
            bytes: Vec::new(),
            limit,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        if self.digest.size() + chunk.len() as u64 > self.limit {
            return Err(StorageError::TooLarge { limit: self.limit });
        }
        self.digest.update(chunk);
        self.bytes.extend_from_slice(chunk);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn finish(self, file_name: Option<String>, content_type: Option<String>) -> EvidenceFile {
        EvidenceFile {
            file_name,
            content_type,
            bytes: self.bytes,
            digest: self.digest.finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn test_digest_of_known_content() {
        let digest = FileDigest::of(b"hello");
        assert_eq!(digest.sha256, HELLO_SHA256);
        assert_eq!(digest.size, 5);
    }

    #[test]
    fn test_chunked_digest_matches_whole() {
        let mut stream = StreamDigest::new();
        stream.update(b"he");
        stream.update(b"");
        stream.update(b"llo");
        assert_eq!(stream.finish(), FileDigest::of(b"hello"));
    }

    #[test]
    fn test_upload_buffer_enforces_limit() {
        let mut buffer = UploadBuffer::new(4);
        buffer.push(b"abc").unwrap();
        assert!(matches!(
            buffer.push(b"de"),
            Err(StorageError::TooLarge { limit: 4 })
        ));
    }

    #[test]
    fn test_upload_buffer_hashes_what_it_keeps() {
        let mut buffer = UploadBuffer::new(1024);
        buffer.push(b"hel").unwrap();
        buffer.push(b"lo").unwrap();
        let file = buffer.finish(Some("note.txt".to_string()), None);
        assert_eq!(file.bytes, b"hello");
        assert_eq!(file.digest.sha256, HELLO_SHA256);
        assert_eq!(file.digest.size, 5);
    }
}
