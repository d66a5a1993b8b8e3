//! Local staging of remote media
//!
//! Media given by URL is downloaded into the staging directory under a
//! unique, timestamp-derived name, uploaded from there and removed again on
//! every exit path. A [`StagedFile`] that is dropped without
//! [`StagedFile::cleanup`], for example because the request future was
//! cancelled, removes its file synchronously.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::UploadConfig;
use crate::error::{PlatformError, Result, TweetcastError};
use crate::media::MediaMimeType;

/// A file in the staging directory owned by one upload
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    removed: bool,
}

impl StagedFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self {
            path,
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file; failures are logged, never returned, so they cannot
    /// mask the upload's own outcome
    pub async fn cleanup(mut self) {
        let result = tokio::fs::remove_file(&self.path).await;
        log_removal(&self.path, result);
        self.removed = true;
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.removed {
            log_removal(&self.path, std::fs::remove_file(&self.path));
        }
    }
}

fn log_removal(path: &Path, result: io::Result<()>) {
    match result {
        Ok(()) => debug!("Removed staged file {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove staged file {}: {}", path.display(), e),
    }
}

pub struct Staging {
    dir: PathBuf,
    client: reqwest::Client,
}

impl Staging {
    /// `timeout` bounds connecting and each read, not the whole transfer,
    /// so a large download that keeps making progress is never cut off
    pub fn new(dir: PathBuf, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .map_err(|e| {
                TweetcastError::Io(std::io::Error::other(format!(
                    "Failed to create download client: {}",
                    e
                )))
            })?;
        Ok(Self { dir, client })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `tweetcast-<unix millis>-<random>.<ext>`
    pub fn unique_path(&self, extension: &str) -> PathBuf {
        let millis = chrono::Utc::now().timestamp_millis();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        self.dir
            .join(format!("tweetcast-{}-{}.{}", millis, &suffix[..8], extension))
    }

    /// Download `url` into the staging directory
    ///
    /// Problems with the URL or what it serves are the caller's input
    /// errors. A stalled or broken transfer is a network error and local
    /// filesystem trouble is reported as IO.
    pub async fn download(
        &self,
        url: &str,
        config: &UploadConfig,
    ) -> Result<(StagedFile, MediaMimeType)> {
        let parsed = reqwest::Url::parse(url.trim())
            .map_err(|_| TweetcastError::InvalidInput(format!("Invalid URL: {}", url)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(TweetcastError::InvalidInput(
                "Only HTTP and HTTPS URLs are allowed".to_string(),
            ));
        }

        info!("Downloading media from {}", parsed);
        let mut response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TweetcastError::from(PlatformError::Network(format!(
                        "Download of {} timed out: {}",
                        parsed, e
                    )))
                } else {
                    TweetcastError::InvalidInput(format!("Failed to download {}: {}", parsed, e))
                }
            })?;

        if !response.status().is_success() {
            return Err(TweetcastError::InvalidInput(format!(
                "URL returned status code: {}",
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let mime = MediaMimeType::resolve(content_type.as_deref(), Some(Path::new(parsed.path())))?;
        let limit = mime.size_limit(config);

        if let Some(length) = response.content_length() {
            if length > limit {
                return Err(TweetcastError::InvalidInput(format!(
                    "Remote {} is {} bytes, larger than the {} byte limit",
                    mime, length, limit
                )));
            }
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let staged = StagedFile::new(self.unique_path(mime.extension()));

        match write_body(&mut response, staged.path(), limit).await {
            Ok(written) => {
                debug!(
                    "Staged {} bytes of {} at {}",
                    written,
                    mime,
                    staged.path().display()
                );
                Ok((staged, mime))
            }
            Err(e) => {
                staged.cleanup().await;
                Err(e)
            }
        }
    }
}

async fn write_body(response: &mut reqwest::Response, path: &Path, limit: u64) -> Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written: u64 = 0;

    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| PlatformError::Network(format!("Failed to read download: {}", e)))?
    {
        written += chunk.len() as u64;
        if written > limit {
            return Err(TweetcastError::InvalidInput(format!(
                "Remote media exceeds the {} byte limit",
                limit
            )));
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(written)
}
