//! SHA256 digest utilities for content-addressed blobs
//!
//! Digests are always `sha256:<64 lowercase hex>`. Blobs staged on disk are named after
//! their digest with `:` replaced so the name is safe on every filesystem.

use crate::error::{RegistryError, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

pub const SHA256_PREFIX: &str = "sha256:";

/// Utilities for working with SHA256 digests
pub struct DigestUtils;

impl DigestUtils {
    /// Compute SHA256 hex from byte data
    pub fn compute_sha256(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    /// Compute full digest (with sha256: prefix) from byte data
    pub fn compute_digest(data: &[u8]) -> String {
        format!("{}{}", SHA256_PREFIX, Self::compute_sha256(data))
    }

    /// Digest of a file, read in chunks
    pub async fn compute_file_digest(path: &Path) -> Result<(String, u64)> {
        let mut file = tokio::fs::File::open(path).await.map_err(|e| {
            RegistryError::Io(format!("cannot open {}: {}", path.display(), e))
        })?;
        let mut hasher = StreamingDigest::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let read = file.read(&mut buf).await?;
            if read == 0 {
                break;
            }
            hasher.update(&buf[..read]);
        }
        Ok(hasher.finish())
    }

    /// Validate SHA256 hex string (64 characters, all hex)
    pub fn is_valid_sha256_hex(digest: &str) -> bool {
        digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// Validate full digest format (sha256:xxxxx)
    pub fn is_valid_digest(digest: &str) -> bool {
        digest
            .strip_prefix(SHA256_PREFIX)
            .is_some_and(Self::is_valid_sha256_hex)
    }

    /// Normalize digest to full format (add sha256: prefix if missing)
    pub fn normalize_digest(digest: &str) -> Result<String> {
        let hex_part = digest.strip_prefix(SHA256_PREFIX).unwrap_or(digest);
        if !Self::is_valid_sha256_hex(hex_part) {
            return Err(RegistryError::Validation(format!(
                "Invalid SHA256 digest: '{}'",
                digest
            )));
        }
        Ok(format!("{}{}", SHA256_PREFIX, hex_part.to_ascii_lowercase()))
    }

    /// Filesystem-safe name for a staged blob
    pub fn blob_file_name(digest: &str) -> String {
        digest.replace(':', "_")
    }

    /// Format digest for display (truncated for readability)
    pub fn format_digest_short(digest: &str) -> String {
        digest.get(..19).unwrap_or(digest).to_string()
    }
}

/// Incremental hasher that also counts bytes, for streamed transfers
pub struct StreamingDigest {
    hasher: Sha256,
    len: u64,
}

impl StreamingDigest {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
            len: 0,
        }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.len += chunk.len() as u64;
    }

    pub fn bytes_hashed(&self) -> u64 {
        self.len
    }

    /// Returns the full digest and the byte count
    pub fn finish(self) -> (String, u64) {
        (
            format!("{}{}", SHA256_PREFIX, hex::encode(self.hasher.finalize())),
            self.len,
        )
    }
}

impl Default for StreamingDigest {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_compute_digest() {
        assert_eq!(DigestUtils::compute_digest(b"hello world"), HELLO);
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let mut hasher = StreamingDigest::new();
        hasher.update(b"hello ");
        hasher.update(b"world");
        assert_eq!(hasher.bytes_hashed(), 11);
        assert_eq!(hasher.finish(), (HELLO.to_string(), 11));
    }

    #[test]
    fn test_validate_digest() {
        assert!(DigestUtils::is_valid_digest(HELLO));
        assert!(!DigestUtils::is_valid_digest("sha256:invalid"));
        assert!(!DigestUtils::is_valid_digest(&HELLO[7..]));
    }

    #[test]
    fn test_normalize_digest() {
        assert_eq!(DigestUtils::normalize_digest(&HELLO[7..]).unwrap(), HELLO);
        assert!(DigestUtils::normalize_digest("sha256:zz").is_err());
    }

    #[test]
    fn test_blob_file_name() {
        assert_eq!(
            DigestUtils::blob_file_name(HELLO),
            HELLO.replace("sha256:", "sha256_")
        );
    }

    #[test]
    fn test_format_digest_short() {
        assert_eq!(DigestUtils::format_digest_short(HELLO), "sha256:b94d27b9934d");
        assert_eq!(DigestUtils::format_digest_short("sha256:ab"), "sha256:ab");
        // byte 19 falls inside a multi-byte character
        let odd = "sha256:aaaaaaaaaaaééé";
        assert_eq!(DigestUtils::format_digest_short(odd), odd);
    }
}
