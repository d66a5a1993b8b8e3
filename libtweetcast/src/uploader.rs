//! Upload orchestration
//!
//! Turns one inbound request into one published post: resolve the media to
//! local bytes, run the chunked upload, create the post. Rate limits anywhere
//! in that pipeline restart it from INIT under the shared [`RetryPolicy`];
//! every other failure surfaces immediately. Files staged for the request
//! are removed whatever the outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::credentials::Credentials;
use crate::error::{Result, TweetcastError};
use crate::media::{MediaAsset, MediaMimeType};
use crate::oauth::Signer;
use crate::publish::{PostRequest, Publisher};
use crate::retry::RetryPolicy;
use crate::staging::{StagedFile, Staging};
use crate::transport::{HttpTransport, Transport};
use crate::upload::MediaUploader;

/// Where the media for a post comes from
#[derive(Debug, Clone)]
pub enum MediaSource {
    /// Remote media, downloaded to the staging directory first
    Url(String),
    /// A local file; the type comes from `mime` or the extension
    File {
        path: PathBuf,
        mime: Option<String>,
    },
    /// Bytes already in memory, e.g. a multipart upload
    Bytes {
        data: Bytes,
        file_name: Option<String>,
        mime: Option<String>,
    },
}

impl MediaSource {
    /// Pick the single source an inbound request named
    ///
    /// A blank URL counts as absent. Naming none or both is an input error.
    pub fn select(url: Option<String>, upload: Option<MediaSource>) -> Result<Self> {
        let url = url.filter(|u| !u.trim().is_empty());
        match (url, upload) {
            (Some(url), None) => Ok(MediaSource::Url(url.trim().to_string())),
            (None, Some(upload)) => Ok(upload),
            (Some(_), Some(_)) => Err(TweetcastError::InvalidInput(
                "Provide either a media URL or a file, not both".to_string(),
            )),
            (None, None) => Err(TweetcastError::InvalidInput(
                "No media provided: pass a URL or a file".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub source: MediaSource,
    /// Post text; may be empty for a media-only post
    pub text: String,
    pub reply_to: Option<String>,
}

impl UploadRequest {
    pub fn new(source: MediaSource) -> Self {
        Self {
            source,
            text: String::new(),
            reply_to: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn reply_to(mut self, post_id: Option<String>) -> Self {
        self.reply_to = post_id;
        self
    }
}

/// Outcome handed back to the inbound adapters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedPost {
    pub post_id: String,
    pub media_id: String,
}

pub struct Uploader {
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
    staging: Staging,
    retry: RetryPolicy,
}

impl Uploader {
    /// Build an uploader that talks to the real API
    pub fn new(config: Config, credentials: Credentials) -> Result<Self> {
        let signer = Signer::new(Arc::new(credentials));
        let transport = HttpTransport::new(signer, config.api.timeout())?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build an uploader over any transport
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let staging = Staging::new(config.upload.staging_path()?, config.api.timeout())?;
        let retry = RetryPolicy::from_config(&config.retry);

        Ok(Self {
            config: Arc::new(config),
            transport,
            staging,
            retry,
        })
    }

    pub fn staging_dir(&self) -> &Path {
        self.staging.dir()
    }

    /// Upload the media, create the post and return both ids
    pub async fn upload_and_post(&self, request: UploadRequest) -> Result<PublishedPost> {
        let (asset, staged) = self.resolve(&request.source).await?;

        let (asset_ref, request_ref) = (&asset, &request);
        let result = self
            .retry
            .run(move |attempt| async move {
                if attempt > 1 {
                    info!("Restarting upload from INIT (attempt {})", attempt);
                }
                self.run_once(asset_ref, request_ref).await
            })
            .await;

        if let Some(staged) = staged {
            staged.cleanup().await;
        }

        match &result {
            Ok(post) => info!("Posted {} with media {}", post.post_id, post.media_id),
            Err(e) => warn!("Upload failed: {}", e),
        }
        result
    }

    /// Turn the source into a validated local asset
    ///
    /// Returns the staged file alongside when one was created, so the caller
    /// can remove it once the upload is over.
    async fn resolve(&self, source: &MediaSource) -> Result<(MediaAsset, Option<StagedFile>)> {
        let upload_config = &self.config.upload;

        match source {
            MediaSource::Url(url) => {
                let (staged, mime) = self.staging.download(url, upload_config).await?;
                let asset = match MediaAsset::from_file(staged.path(), mime).await {
                    Ok(asset) => asset,
                    Err(e) => {
                        staged.cleanup().await;
                        return Err(e);
                    }
                };
                if let Err(e) = asset.validate(upload_config) {
                    staged.cleanup().await;
                    return Err(e);
                }
                Ok((asset, Some(staged)))
            }
            MediaSource::File { path, mime } => {
                let mime = MediaMimeType::resolve(mime.as_deref(), Some(path.as_path()))?;
                let asset = MediaAsset::from_file(path.clone(), mime).await?;
                asset.validate(upload_config)?;
                Ok((asset, None))
            }
            MediaSource::Bytes {
                data,
                file_name,
                mime,
            } => {
                let mime =
                    MediaMimeType::resolve(mime.as_deref(), file_name.as_deref().map(Path::new))?;
                let asset = MediaAsset::from_bytes(data.clone(), mime);
                asset.validate(upload_config)?;
                Ok((asset, None))
            }
        }
    }

    async fn run_once(&self, asset: &MediaAsset, request: &UploadRequest) -> Result<PublishedPost> {
        let uploader = MediaUploader::new(
            self.transport.clone(),
            self.config.api.upload_url.clone(),
            &self.config.upload,
        );
        let media_id = uploader.upload(asset).await?;

        let post = PostRequest::new(request.text.clone(), media_id.clone())
            .in_reply_to(request.reply_to.as_deref());
        let publisher = Publisher::new(self.transport.clone(), self.config.api.tweet_url.clone());
        let post_id = publisher.publish(&post).await?;

        Ok(PublishedPost { post_id, media_id })
    }
}
