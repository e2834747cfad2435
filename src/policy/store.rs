//! Fixed-size policy document buffer.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Response size used when the configuration does not say otherwise.
pub const DEFAULT_CAPACITY: usize = 1500;

/// Error type for policy loading.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy file {path:?} not found")]
    NotFound { path: PathBuf },

    #[error("failed to read policy file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("policy capacity must be non-zero")]
    ZeroCapacity,
}

/// The response sent to every client that asks for the policy.
///
/// Always exactly `capacity` bytes long: the file content followed by zero
/// padding, or the first `capacity` bytes of a larger file. Never mutated after
/// construction; share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDocument {
    buffer: Box<[u8]>,
    content_len: usize,
    truncated: bool,
}

impl PolicyDocument {
    /// Read the policy file into a buffer of `capacity` bytes.
    ///
    /// The content is not inspected; anything the file holds is served.
    pub fn load(path: &Path, capacity: usize) -> Result<Self, PolicyError> {
        if capacity == 0 {
            return Err(PolicyError::ZeroCapacity);
        }

        let file = File::open(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => PolicyError::NotFound {
                path: path.to_path_buf(),
            },
            _ => PolicyError::Read {
                path: path.to_path_buf(),
                source,
            },
        })?;

        // One byte past capacity tells us whether the file was cut short.
        let mut content = Vec::with_capacity(capacity + 1);
        file.take(capacity as u64 + 1)
            .read_to_end(&mut content)
            .map_err(|source| PolicyError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let document = Self::from_bytes(&content, capacity)?;

        tracing::debug!(
            path = %path.display(),
            content_len = document.content_len,
            capacity,
            truncated = document.truncated,
            "Policy stored in memory"
        );

        Ok(document)
    }

    /// Build a document from in-memory content.
    pub fn from_bytes(content: &[u8], capacity: usize) -> Result<Self, PolicyError> {
        if capacity == 0 {
            return Err(PolicyError::ZeroCapacity);
        }

        let content_len = content.len().min(capacity);
        let mut buffer = vec![0u8; capacity].into_boxed_slice();
        buffer[..content_len].copy_from_slice(&content[..content_len]);

        Ok(Self {
            buffer,
            content_len,
            truncated: content.len() > capacity,
        })
    }

    /// The full padded buffer, exactly as written to clients.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Size of the buffer in bytes.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of bytes that came from the file.
    pub fn content_len(&self) -> usize {
        self.content_len
    }

    /// Whether the file was larger than the buffer.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const POLICY: &[u8] =
        br#"<cross-domain-policy><allow-access-from domain="*"/></cross-domain-policy>"#;

    fn policy_file(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn short_file_is_zero_padded() {
        let file = policy_file(POLICY);
        let doc = PolicyDocument::load(file.path(), DEFAULT_CAPACITY).unwrap();

        assert_eq!(doc.capacity(), 1500);
        assert_eq!(doc.content_len(), POLICY.len());
        assert_eq!(&doc.as_bytes()[..POLICY.len()], POLICY);
        assert!(doc.as_bytes()[POLICY.len()..].iter().all(|&b| b == 0));
        assert!(!doc.is_truncated());
    }

    #[test]
    fn long_file_is_truncated() {
        let content: Vec<u8> = (0..2000u32).map(|i| b'a' + (i % 26) as u8).collect();
        let file = policy_file(&content);
        let doc = PolicyDocument::load(file.path(), DEFAULT_CAPACITY).unwrap();

        assert_eq!(doc.as_bytes(), &content[..1500]);
        assert_eq!(doc.content_len(), 1500);
        assert!(doc.is_truncated());
    }

    #[test]
    fn exact_capacity_is_not_truncated() {
        let content = vec![b'x'; 64];
        let doc = PolicyDocument::from_bytes(&content, 64).unwrap();
        assert_eq!(doc.as_bytes(), content.as_slice());
        assert!(!doc.is_truncated());
    }

    #[test]
    fn empty_file_is_all_zeroes() {
        let file = policy_file(b"");
        let doc = PolicyDocument::load(file.path(), 32).unwrap();
        assert_eq!(doc.as_bytes(), &[0u8; 32]);
        assert_eq!(doc.content_len(), 0);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = PolicyDocument::load(Path::new("/no/such/crossdomain.xml"), 1500).unwrap_err();
        assert!(matches!(err, PolicyError::NotFound { .. }));
    }

    #[test]
    fn directory_is_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = PolicyDocument::load(dir.path(), 1500).unwrap_err();
        assert!(matches!(err, PolicyError::Read { .. }));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(
            PolicyDocument::from_bytes(POLICY, 0),
            Err(PolicyError::ZeroCapacity)
        ));
    }
}
