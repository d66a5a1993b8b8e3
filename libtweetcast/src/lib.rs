//! Tweetcast - publish videos and images as posts
//!
//! This library pushes a media file through the platform's chunked upload
//! protocol (INIT, APPEND, FINALIZE, STATUS), waits for server-side
//! processing and publishes a post that references the uploaded media.
//!
//! ```no_run
//! use libtweetcast::{Config, Credentials, MediaSource, UploadRequest, Uploader};
//!
//! # async fn example() -> libtweetcast::Result<()> {
//! let uploader = Uploader::new(Config::load()?, Credentials::from_env()?)?;
//! let request = UploadRequest::new(MediaSource::Url("https://example.com/clip.mp4".into()))
//!     .with_text("New clip");
//! let post = uploader.upload_and_post(request).await?;
//! println!("{}", post.post_id);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod media;
pub mod oauth;
pub mod publish;
pub mod retry;
pub mod staging;
pub mod transport;
pub mod upload;
pub mod uploader;

// Re-export commonly used types
pub use config::Config;
pub use credentials::Credentials;
pub use error::{ConfigError, PlatformError, Result, TweetcastError};
pub use media::{MediaAsset, MediaCategory, MediaMimeType};
pub use uploader::{MediaSource, PublishedPost, UploadRequest, Uploader};
