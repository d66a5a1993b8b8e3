//! Media types and local byte sources

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

use crate::config::UploadConfig;
use crate::error::{Result, TweetcastError};

/// Upload MIME types accepted by the service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MediaMimeType {
    Mp4,
    QuickTime,
    Jpeg,
    Png,
    Gif,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Image,
    Video,
}

impl MediaMimeType {
    pub const ALL: [MediaMimeType; 5] = [
        Self::Mp4,
        Self::QuickTime,
        Self::Jpeg,
        Self::Png,
        Self::Gif,
    ];

    /// Parse a MIME string such as `"video/mp4"` or `"image/jpeg; q=1"`
    pub fn from_mime_str(s: &str) -> Option<Self> {
        let essence = s.split(';').next().unwrap_or(s).trim().to_lowercase();
        match essence.as_str() {
            "video/mp4" => Some(Self::Mp4),
            "video/quicktime" => Some(Self::QuickTime),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Detect MIME type from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp4" | "m4v" => Some(Self::Mp4),
            "mov" | "qt" => Some(Self::QuickTime),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Get the MIME type string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::QuickTime => "video/quicktime",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
        }
    }

    /// Get the typical file extension for this MIME type
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::QuickTime => "mov",
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
        }
    }

    pub fn category(&self) -> MediaCategory {
        match self {
            Self::Mp4 | Self::QuickTime => MediaCategory::Video,
            Self::Jpeg | Self::Png | Self::Gif => MediaCategory::Image,
        }
    }

    /// Largest accepted file for this type
    pub fn size_limit(&self, config: &UploadConfig) -> u64 {
        match self {
            Self::Gif => config.max_gif_bytes,
            _ if self.category() == MediaCategory::Video => config.max_video_bytes,
            _ => config.max_image_bytes,
        }
    }

    fn allowed_list() -> String {
        Self::ALL
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Resolve the type from a declared MIME string, falling back to the
    /// file name's extension
    pub fn resolve(declared: Option<&str>, file_name: Option<&Path>) -> Result<Self> {
        if let Some(declared) = declared.filter(|d| !d.trim().is_empty()) {
            let essence = declared.split(';').next().unwrap_or(declared).trim();
            // Generic binary uploads carry no type information of their own
            if essence != "application/octet-stream" {
                return Self::from_mime_str(declared).ok_or_else(|| {
                    TweetcastError::InvalidInput(format!(
                        "Unsupported media type '{}'. Allowed types: {}",
                        essence,
                        Self::allowed_list()
                    ))
                });
            }
        }

        file_name.and_then(Self::from_path).ok_or_else(|| {
            TweetcastError::InvalidInput(format!(
                "Cannot determine media type. Allowed types: {}",
                Self::allowed_list()
            ))
        })
    }
}

impl std::fmt::Display for MediaMimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Where the bytes of an asset live
#[derive(Debug, Clone)]
pub enum AssetData {
    File(PathBuf),
    Memory(Bytes),
}

/// A local, fully-sized media object ready for upload
#[derive(Debug, Clone)]
pub struct MediaAsset {
    pub data: AssetData,
    pub mime_type: MediaMimeType,
    pub len: u64,
}

impl MediaAsset {
    pub fn from_bytes(bytes: impl Into<Bytes>, mime_type: MediaMimeType) -> Self {
        let bytes = bytes.into();
        Self {
            len: bytes.len() as u64,
            data: AssetData::Memory(bytes),
            mime_type,
        }
    }

    /// Stat a local file; the size must be known before INIT
    pub async fn from_file(path: impl Into<PathBuf>, mime_type: MediaMimeType) -> Result<Self> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
            TweetcastError::InvalidInput(format!("Cannot read {}: {}", path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(TweetcastError::InvalidInput(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        Ok(Self {
            data: AssetData::File(path),
            mime_type,
            len: metadata.len(),
        })
    }

    pub fn category(&self) -> MediaCategory {
        self.mime_type.category()
    }

    /// Reject empty and oversized media before any network call
    pub fn validate(&self, config: &UploadConfig) -> Result<()> {
        if self.len == 0 {
            return Err(TweetcastError::InvalidInput("Media file is empty".to_string()));
        }

        let limit = self.mime_type.size_limit(config);
        if self.len > limit {
            return Err(TweetcastError::InvalidInput(format!(
                "{} file is {} bytes, larger than the {} byte limit",
                self.mime_type, self.len, limit
            )));
        }

        Ok(())
    }

    /// Sequential reader handing out chunks of at most `chunk_size` bytes
    pub async fn chunks(&self, chunk_size: usize) -> Result<ChunkReader> {
        let source = match &self.data {
            AssetData::File(path) => ChunkSource::File(tokio::fs::File::open(path).await?),
            AssetData::Memory(bytes) => ChunkSource::Memory(bytes.clone()),
        };

        Ok(ChunkReader {
            source,
            chunk_size: chunk_size.max(1),
            remaining: self.len,
        })
    }
}

enum ChunkSource {
    File(tokio::fs::File),
    Memory(Bytes),
}

pub struct ChunkReader {
    source: ChunkSource,
    chunk_size: usize,
    remaining: u64,
}

impl ChunkReader {
    /// Next chunk, or `None` once the declared length has been read
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let want = (self.chunk_size as u64).min(self.remaining) as usize;
        let chunk = match &mut self.source {
            ChunkSource::Memory(bytes) => bytes.split_to(want.min(bytes.len())),
            ChunkSource::File(file) => {
                let mut buf = vec![0u8; want];
                let mut filled = 0;
                while filled < want {
                    let n = file.read(&mut buf[filled..]).await?;
                    if n == 0 {
                        break;
                    }
                    filled += n;
                }
                buf.truncate(filled);
                Bytes::from(buf)
            }
        };

        if chunk.len() < want {
            return Err(TweetcastError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "media ended early: expected {} more bytes, got {}",
                    self.remaining,
                    chunk.len()
                ),
            )));
        }

        self.remaining -= chunk.len() as u64;
        Ok(Some(chunk))
    }
}
