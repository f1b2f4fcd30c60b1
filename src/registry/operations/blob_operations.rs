//! Blob operations for registry client
//!
//! Implements Docker Registry v2 blob operations:
//! - Blob existence checks (HEAD /v2/{name}/blobs/{digest})
//! - Blob upload with the two-step session pattern (POST /v2/{name}/blobs/uploads/, then PUT)
//! - Streamed blob download (GET /v2/{name}/blobs/{digest}) with size and digest verification

use crate::digest::{DigestUtils, StreamingDigest};
use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::registry::auth::AuthHeaders;
use crate::registry::operations::manifest_operations::DOCKER_CONTENT_DIGEST;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Body, Client, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

/// Bytes to upload
#[derive(Debug, Clone)]
pub enum BlobSource {
    File(PathBuf),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Target already had the blob; no upload calls were made
    Existing,
    Uploaded,
}

#[derive(Clone)]
pub struct BlobOperations {
    client: Client,
    /// `scheme://host[:port]`, for absolute-path `Location` headers
    root: String,
    /// `{root}/v2/{repository}`
    base: String,
    auth: AuthHeaders,
    output: Logger,
    timeout: Duration,
}

impl BlobOperations {
    pub fn new(
        client: Client,
        root: String,
        base: String,
        auth: AuthHeaders,
        output: Logger,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            root,
            base,
            auth,
            output,
            timeout,
        }
    }

    fn blob_url(&self, digest: &str) -> String {
        format!("{}/blobs/{}", self.base, digest)
    }

    /// Check if blob exists using Docker Registry v2 HEAD request
    pub async fn blob_exists(&self, digest: &str) -> Result<bool> {
        let request = self.client.head(self.blob_url(digest)).timeout(self.timeout);
        let response = self
            .auth
            .apply(request)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "blob existence check"))?;

        let short = DigestUtils::format_digest_short(digest);
        match response.status() {
            StatusCode::OK => {
                self.output.detail(&format!("Blob {} exists in registry", short));
                Ok(true)
            }
            StatusCode::NOT_FOUND => {
                self.output.detail(&format!("Blob {} does not exist in registry", short));
                Ok(false)
            }
            status => {
                // Anything but 200 means we upload; the session POST reports real failures
                self.output.warning(&format!(
                    "Unexpected status {} when checking blob {}",
                    status, short
                ));
                Ok(false)
            }
        }
    }

    /// Upload a blob unless the target already has it
    pub async fn upload_blob(
        &self,
        source: BlobSource,
        digest: &str,
        media_type: &str,
    ) -> Result<UploadOutcome> {
        let digest = DigestUtils::normalize_digest(digest)?;
        let short = DigestUtils::format_digest_short(&digest);

        if self.blob_exists(&digest).await? {
            self.output.info(&format!("Blob {} already exists, skipping", short));
            return Ok(UploadOutcome::Existing);
        }

        let location = self.start_upload_session().await?;
        let upload_url = if location.contains('?') {
            format!("{}&digest={}", location, digest)
        } else {
            format!("{}?digest={}", location, digest)
        };
        self.output.detail(&format!("Upload location: {}", upload_url));

        let (body, length) = match source {
            BlobSource::Bytes(data) => {
                let length = data.len() as u64;
                (Body::from(data), length)
            }
            BlobSource::File(path) => {
                let file = tokio::fs::File::open(&path).await.map_err(|e| {
                    RegistryError::Io(format!("cannot open blob {}: {}", path.display(), e))
                })?;
                let length = file.metadata().await?.len();
                (Body::wrap_stream(ReaderStream::new(file)), length)
            }
        };
        self.output.info(&format!(
            "Uploading blob {} ({})",
            short,
            self.output.format_size(length)
        ));

        // No overall timeout: the client's read timeout bounds stalls
        let request = self
            .client
            .put(&upload_url)
            .header(CONTENT_TYPE, media_type)
            .header(CONTENT_LENGTH, length)
            .body(body);
        let response = self
            .auth
            .apply(request)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "blob upload"))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RegistryError::Transport(format!(
                "blob upload {} failed (status {}): {}",
                short,
                status,
                text.trim()
            )));
        }

        if let Some(reported) = response
            .headers()
            .get(DOCKER_CONTENT_DIGEST)
            .and_then(|h| h.to_str().ok())
        {
            if reported != digest {
                return Err(RegistryError::Integrity(format!(
                    "registry stored {} as {}",
                    digest, reported
                )));
            }
        }

        self.output.success(&format!("Blob {} uploaded", short));
        Ok(UploadOutcome::Uploaded)
    }

    /// POST to the uploads endpoint and return the absolute continuation URL
    async fn start_upload_session(&self) -> Result<String> {
        let upload_url = format!("{}/blobs/uploads/", self.base);
        self.output.detail(&format!("Starting blob upload session at: {}", upload_url));

        let request = self.client.post(&upload_url).timeout(self.timeout);
        let response = self
            .auth
            .apply(request)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "upload session"))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RegistryError::Transport(format!(
                "failed to start blob upload session (status {}): {}",
                status,
                text.trim()
            )));
        }

        let location = response
            .headers()
            .get(LOCATION)
            .ok_or_else(|| {
                RegistryError::Transport("missing Location header in upload response".to_string())
            })?
            .to_str()
            .map_err(|e| RegistryError::Transport(format!("invalid Location header: {}", e)))?;

        Ok(self.resolve_location(location))
    }

    fn resolve_location(&self, location: &str) -> String {
        if location.starts_with("http://") || location.starts_with("https://") {
            location.to_string()
        } else if location.starts_with('/') {
            format!("{}{}", self.root, location)
        } else {
            format!("{}/blobs/uploads/{}", self.base, location)
        }
    }

    /// Stream a blob into `dir`, named after its digest
    pub async fn download_blob(
        &self,
        digest: &str,
        expected_size: Option<u64>,
        dir: &Path,
    ) -> Result<PathBuf> {
        if !DigestUtils::is_valid_digest(digest) {
            return Err(RegistryError::Parse(format!("invalid blob digest '{}'", digest)));
        }
        let path = dir.join(DigestUtils::blob_file_name(digest));
        self.download_blob_to(digest, expected_size, &path).await?;
        Ok(path)
    }

    /// Stream a blob to `path`, verifying size and digest; the file is removed on failure
    pub async fn download_blob_to(
        &self,
        digest: &str,
        expected_size: Option<u64>,
        path: &Path,
    ) -> Result<u64> {
        match self.stream_to_file(digest, expected_size, path).await {
            Ok(written) => Ok(written),
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(path).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        self.output.warning(&format!(
                            "Could not remove partial blob {}: {}",
                            path.display(),
                            cleanup
                        ));
                    }
                }
                Err(e)
            }
        }
    }

    async fn stream_to_file(
        &self,
        digest: &str,
        expected_size: Option<u64>,
        path: &Path,
    ) -> Result<u64> {
        let short = DigestUtils::format_digest_short(digest);
        self.output.verbose(&format!("Downloading blob {}", short));

        let request = self.client.get(self.blob_url(digest));
        let response = self
            .auth
            .apply(request)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "blob download"))?;

        if !response.status().is_success() {
            return Err(
                HttpErrorHandler::from_response(response, &format!("blob {}", digest)).await,
            );
        }

        let mut file = tokio::fs::File::create(path).await.map_err(|e| {
            RegistryError::Io(format!("cannot create {}: {}", path.display(), e))
        })?;
        let mut hasher = StreamingDigest::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| NetworkErrorHandler::handle_network_error(&e, "blob download"))?;
            hasher.update(&chunk);
            if let Some(expected) = expected_size.filter(|e| hasher.bytes_hashed() > *e) {
                return Err(RegistryError::Integrity(format!(
                    "blob {} exceeds its declared size of {} bytes",
                    digest, expected
                )));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        let (computed, written) = hasher.finish();
        if let Some(expected) = expected_size {
            if written != expected {
                return Err(RegistryError::Integrity(format!(
                    "blob {} size mismatch: expected {} bytes, got {}",
                    digest, expected, written
                )));
            }
        }
        if computed != digest {
            return Err(RegistryError::Integrity(format!(
                "blob {} digest mismatch: content hashes to {}",
                digest, computed
            )));
        }

        self.output.detail(&format!(
            "Blob {} downloaded ({})",
            short,
            self.output.format_size(written)
        ));
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops() -> BlobOperations {
        BlobOperations::new(
            Client::new(),
            "https://reg.local".to_string(),
            "https://reg.local/v2/team/app".to_string(),
            AuthHeaders::Anonymous,
            Logger::new_quiet(),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn location_resolution() {
        let ops = ops();
        assert_eq!(
            ops.resolve_location("https://storage.local/upload?id=1"),
            "https://storage.local/upload?id=1"
        );
        assert_eq!(
            ops.resolve_location("/v2/team/app/blobs/uploads/abc?_state=x"),
            "https://reg.local/v2/team/app/blobs/uploads/abc?_state=x"
        );
        assert_eq!(
            ops.resolve_location("abc"),
            "https://reg.local/v2/team/app/blobs/uploads/abc"
        );
    }
}
