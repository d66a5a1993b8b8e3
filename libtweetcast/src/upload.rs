//! Chunked media upload state machine
//!
//! Drives one media object through the platform's upload protocol:
//!
//! ```text
//! Idle -> Initialized -> Appending -> Finalized -> Processing -> Succeeded
//!                                             \--------------------^
//! ```
//!
//! Any failure moves the session to `Failed` and is returned as an error;
//! no partial result is ever handed back. Images finalize synchronously and
//! never enter `Processing`.
//!
//! Chunks are sent strictly one after the other because the server requires
//! monotonically increasing segment indices. Individual APPENDs are not
//! retried; a rate limit anywhere restarts the whole session from INIT at
//! the orchestrator level.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::UploadConfig;
use crate::error::{PlatformError, Result, TweetcastError};
use crate::media::{MediaAsset, MediaCategory};
use crate::transport::{ApiRequest, Transport};

/// Media category that asks the platform to transcode video asynchronously
const VIDEO_MEDIA_CATEGORY: &str = "tweet_video";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Initialized,
    Appending,
    Finalized,
    Processing,
    Succeeded,
    Failed,
}

impl UploadState {
    /// Transition guard for the upload protocol
    pub fn can_transition_to(self, next: UploadState) -> bool {
        use UploadState::*;
        matches!(
            (self, next),
            (Idle, Initialized)
                | (Initialized, Appending)
                | (Appending, Finalized)
                | (Finalized, Processing)
                | (Finalized, Succeeded)
                | (Processing, Succeeded)
        ) || (next == Failed && !matches!(self, Succeeded | Failed))
    }
}

/// Server-side transcoding status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingState {
    Pending,
    InProgress,
    Succeeded,
    Failed,
}

impl ProcessingState {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingInfo {
    pub state: String,
    /// Negative or non-numeric hints fall back to the default poll interval
    #[serde(default, deserialize_with = "lenient_secs")]
    pub check_after_secs: Option<u64>,
    #[serde(default, deserialize_with = "lenient_percent")]
    pub progress_percent: Option<u32>,
    pub error: Option<ProcessingErrorInfo>,
}

fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite() && *n >= 0.0))
}

/// Fractional seconds round up so the server is never polled early
fn lenient_secs<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?.map(|secs| secs.ceil() as u64))
}

fn lenient_percent<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?.map(|percent| percent.min(100.0) as u32))
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingErrorInfo {
    pub code: Option<i64>,
    pub name: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaResponse {
    media_id_string: Option<String>,
    processing_info: Option<ProcessingInfo>,
}

impl MediaResponse {
    fn parse(body: Value, command: &str) -> Result<Self> {
        if body.is_null() {
            return Ok(Self {
                media_id_string: None,
                processing_info: None,
            });
        }
        serde_json::from_value(body).map_err(|e| {
            PlatformError::InvalidResponse(format!("Malformed {} response: {}", command, e)).into()
        })
    }
}

/// Server-side state of one upload
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub media_id: String,
    pub total_bytes: u64,
    /// Number of APPEND calls issued so far, which is also the next index
    pub segment_index: u32,
    pub bytes_appended: u64,
    pub status: Option<ProcessingState>,
    state: UploadState,
}

impl UploadSession {
    fn transition(&mut self, next: UploadState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(TweetcastError::InvalidState(format!(
                "{:?} -> {:?} for media {}",
                self.state, next, self.media_id
            )));
        }
        debug!("Media {}: {:?} -> {:?}", self.media_id, self.state, next);
        self.state = next;
        Ok(())
    }
}

/// Bounds on STATUS polling; whichever is hit first ends the wait
#[derive(Debug, Clone)]
pub struct PollLimits {
    pub default_interval: Duration,
    pub max_interval: Duration,
    pub max_attempts: u32,
    pub max_wait: Duration,
}

impl PollLimits {
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            default_interval: Duration::from_secs(config.default_poll_interval_secs),
            max_interval: Duration::from_secs(config.max_poll_interval_secs),
            max_attempts: config.max_poll_attempts,
            max_wait: Duration::from_secs(config.max_processing_secs),
        }
    }

    /// Server-suggested interval capped at `max_interval`, else the default
    pub fn interval(&self, check_after_secs: Option<u64>) -> Duration {
        match check_after_secs {
            Some(secs) => Duration::from_secs(secs).min(self.max_interval),
            None => self.default_interval,
        }
    }
}

impl Default for PollLimits {
    fn default() -> Self {
        Self::from_config(&UploadConfig::default())
    }
}

pub struct MediaUploader {
    transport: Arc<dyn Transport>,
    upload_url: String,
    chunk_size: usize,
    limits: PollLimits,
}

impl MediaUploader {
    pub fn new(
        transport: Arc<dyn Transport>,
        upload_url: impl Into<String>,
        config: &UploadConfig,
    ) -> Self {
        Self {
            transport,
            upload_url: upload_url.into(),
            chunk_size: config.chunk_size.max(1),
            limits: PollLimits::from_config(config),
        }
    }

    /// Upload `asset` and return its media id once it is usable in a post
    pub async fn upload(&self, asset: &MediaAsset) -> Result<String> {
        if asset.len == 0 {
            return Err(TweetcastError::InvalidInput(
                "Cannot upload an empty media file".to_string(),
            ));
        }

        let mut session = self.init(asset).await?;
        match self.drive(&mut session, asset).await {
            Ok(()) => {
                info!(
                    "Media {} ready ({} bytes in {} segments)",
                    session.media_id, session.total_bytes, session.segment_index
                );
                Ok(session.media_id)
            }
            Err(e) => {
                warn!(
                    "Upload of media {} failed in state {:?}: {}",
                    session.media_id, session.state, e
                );
                debug_assert!(session.state.can_transition_to(UploadState::Failed));
                session.state = UploadState::Failed;
                Err(e)
            }
        }
    }

    async fn drive(&self, session: &mut UploadSession, asset: &MediaAsset) -> Result<()> {
        self.append_all(session, asset).await?;
        let processing = self.finalize(session).await?;

        match (asset.category(), processing) {
            (MediaCategory::Video, Some(info)) => self.await_processing(session, info).await?,
            (MediaCategory::Video, None) => debug!("Media {} needs no processing", session.media_id),
            (MediaCategory::Image, _) => {}
        }

        session.transition(UploadState::Succeeded)
    }

    /// INIT: declare size and type, receive the media id
    pub async fn init(&self, asset: &MediaAsset) -> Result<UploadSession> {
        let mut params = vec![
            ("command".to_string(), "INIT".to_string()),
            ("total_bytes".to_string(), asset.len.to_string()),
            ("media_type".to_string(), asset.mime_type.as_str().to_string()),
        ];
        if asset.category() == MediaCategory::Video {
            params.push(("media_category".to_string(), VIDEO_MEDIA_CATEGORY.to_string()));
        }

        let body = self
            .transport
            .send(ApiRequest::post_form(&self.upload_url, params))
            .await?;
        let media_id = MediaResponse::parse(body, "INIT")?
            .media_id_string
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                PlatformError::InvalidResponse("INIT response has no media_id_string".to_string())
            })?;

        info!(
            "Initialized upload {} ({}, {} bytes)",
            media_id, asset.mime_type, asset.len
        );

        let mut session = UploadSession {
            media_id,
            total_bytes: asset.len,
            segment_index: 0,
            bytes_appended: 0,
            status: None,
            state: UploadState::Idle,
        };
        session.transition(UploadState::Initialized)?;
        Ok(session)
    }

    /// APPEND every chunk in order; video is split, images go in one piece
    async fn append_all(&self, session: &mut UploadSession, asset: &MediaAsset) -> Result<()> {
        session.transition(UploadState::Appending)?;

        let chunk_size = match asset.category() {
            MediaCategory::Video => self.chunk_size,
            MediaCategory::Image => usize::try_from(asset.len).unwrap_or(usize::MAX),
        };

        let mut reader = asset.chunks(chunk_size).await?;
        while let Some(chunk) = reader.next_chunk().await? {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&chunk);
            let params = vec![
                ("command".to_string(), "APPEND".to_string()),
                ("media_id".to_string(), session.media_id.clone()),
                ("segment_index".to_string(), session.segment_index.to_string()),
                ("media".to_string(), encoded),
            ];

            debug!(
                "Appending segment {} of media {} ({} bytes)",
                session.segment_index,
                session.media_id,
                chunk.len()
            );
            self.transport
                .send(ApiRequest::post_form(&self.upload_url, params))
                .await?;

            session.segment_index += 1;
            session.bytes_appended += chunk.len() as u64;
        }

        Ok(())
    }

    /// FINALIZE; returns processing info when the server still has work to do
    async fn finalize(&self, session: &mut UploadSession) -> Result<Option<ProcessingInfo>> {
        if session.bytes_appended != session.total_bytes {
            return Err(TweetcastError::InvalidState(format!(
                "FINALIZE after {} of {} bytes for media {}",
                session.bytes_appended, session.total_bytes, session.media_id
            )));
        }

        let params = vec![
            ("command".to_string(), "FINALIZE".to_string()),
            ("media_id".to_string(), session.media_id.clone()),
        ];
        let body = self
            .transport
            .send(ApiRequest::post_form(&self.upload_url, params))
            .await?;
        session.transition(UploadState::Finalized)?;

        Ok(MediaResponse::parse(body, "FINALIZE")?.processing_info)
    }

    /// One STATUS call; a response without processing info means done
    async fn status(&self, session: &UploadSession) -> Result<ProcessingInfo> {
        let params = vec![
            ("command".to_string(), "STATUS".to_string()),
            ("media_id".to_string(), session.media_id.clone()),
        ];
        let body = self
            .transport
            .send(ApiRequest::get(&self.upload_url, params))
            .await?;

        Ok(MediaResponse::parse(body, "STATUS")?
            .processing_info
            .unwrap_or(ProcessingInfo {
                state: "succeeded".to_string(),
                check_after_secs: None,
                progress_percent: None,
                error: None,
            }))
    }

    /// Poll STATUS until the server reports a terminal state
    async fn await_processing(
        &self,
        session: &mut UploadSession,
        initial: ProcessingInfo,
    ) -> Result<()> {
        session.transition(UploadState::Processing)?;

        let started = Instant::now();
        let mut attempts: u32 = 0;
        let mut info = initial;

        loop {
            let state = ProcessingState::parse(&info.state).ok_or_else(|| {
                PlatformError::Processing(format!(
                    "Unknown processing state '{}' for media {}",
                    info.state, session.media_id
                ))
            })?;
            session.status = Some(state);

            match state {
                ProcessingState::Succeeded => return Ok(()),
                ProcessingState::Failed => {
                    let reason = info
                        .error
                        .as_ref()
                        .and_then(|e| e.message.clone().or_else(|| e.name.clone()))
                        .unwrap_or_else(|| "no reason given".to_string());
                    return Err(PlatformError::Processing(format!(
                        "Media {} failed processing: {}",
                        session.media_id, reason
                    ))
                    .into());
                }
                ProcessingState::Pending | ProcessingState::InProgress => {}
            }

            let delay = self.limits.interval(info.check_after_secs);
            let elapsed = started.elapsed();
            if attempts >= self.limits.max_attempts || elapsed + delay > self.limits.max_wait {
                return Err(PlatformError::ProcessingTimeout { attempts, elapsed }.into());
            }

            debug!(
                "Media {} is {:?} ({}%), checking again in {:?}",
                session.media_id,
                state,
                info.progress_percent.unwrap_or(0),
                delay
            );
            sleep(delay).await;

            attempts += 1;
            info = self.status(session).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaMimeType;
    use crate::transport::mock::MockTransport;
    use serde_json::json;

    const MIB: usize = 1024 * 1024;

    fn uploader(transport: &MockTransport, config: &UploadConfig) -> MediaUploader {
        MediaUploader::new(
            Arc::new(transport.clone()),
            "https://upload.example.com/1.1/media/upload.json",
            config,
        )
    }

    fn pending_finalize(transport: MockTransport, check_after_secs: u64) -> MockTransport {
        transport.respond(
            "FINALIZE",
            json!({
                "media_id_string": "m1",
                "processing_info": { "state": "pending", "check_after_secs": check_after_secs }
            }),
        )
    }

    #[test]
    fn test_transition_guard() {
        use UploadState::*;
        assert!(Idle.can_transition_to(Initialized));
        assert!(Finalized.can_transition_to(Succeeded));
        assert!(Finalized.can_transition_to(Processing));
        assert!(Appending.can_transition_to(Failed));

        assert!(!Idle.can_transition_to(Appending));
        assert!(!Initialized.can_transition_to(Finalized));
        assert!(!Appending.can_transition_to(Processing));
        assert!(!Succeeded.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Initialized));
    }

    #[test]
    fn test_poll_interval() {
        let limits = PollLimits::default();
        assert_eq!(limits.interval(None), Duration::from_secs(2));
        assert_eq!(limits.interval(Some(5)), Duration::from_secs(5));
        assert_eq!(limits.interval(Some(120)), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_append_count_matches_ceiling() {
        let config = UploadConfig {
            chunk_size: 1000,
            ..UploadConfig::default()
        };

        for size in [1usize, 999, 1000, 1001, 4500] {
            let transport = MockTransport::happy("m1", "p1");
            let asset = MediaAsset::from_bytes(vec![0u8; size], MediaMimeType::Mp4);
            uploader(&transport, &config).upload(&asset).await.unwrap();

            let expected = size.div_ceil(1000);
            assert_eq!(transport.count("APPEND"), expected, "size {}", size);
        }
    }

    #[tokio::test]
    async fn test_segment_indices_are_sequential() {
        let transport = MockTransport::happy("m1", "p1");
        let config = UploadConfig {
            chunk_size: 10,
            ..UploadConfig::default()
        };
        let asset = MediaAsset::from_bytes(vec![1u8; 75], MediaMimeType::QuickTime);

        uploader(&transport, &config).upload(&asset).await.unwrap();

        let indices: Vec<String> = transport
            .requests_for("APPEND")
            .iter()
            .map(|r| r.param("segment_index").unwrap().to_string())
            .collect();
        let expected: Vec<String> = (0..8).map(|i| i.to_string()).collect();
        assert_eq!(indices, expected);
    }

    #[tokio::test]
    async fn test_image_single_append_regardless_of_size() {
        let transport = MockTransport::happy("m1", "p1");
        let config = UploadConfig {
            chunk_size: 16,
            ..UploadConfig::default()
        };
        let asset = MediaAsset::from_bytes(vec![3u8; 4096], MediaMimeType::Png);

        uploader(&transport, &config).upload(&asset).await.unwrap();

        let appends = transport.requests_for("APPEND");
        assert_eq!(appends.len(), 1);
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(appends[0].param("media").unwrap())
            .unwrap();
        assert_eq!(decoded.len(), 4096);
    }

    #[tokio::test]
    async fn test_init_params() {
        let transport = MockTransport::happy("m1", "p1");
        let config = UploadConfig::default();

        let video = MediaAsset::from_bytes(vec![0u8; 10], MediaMimeType::Mp4);
        uploader(&transport, &config).upload(&video).await.unwrap();
        let image = MediaAsset::from_bytes(vec![0u8; 10], MediaMimeType::Gif);
        uploader(&transport, &config).upload(&image).await.unwrap();

        let inits = transport.requests_for("INIT");
        assert_eq!(inits[0].param("total_bytes"), Some("10"));
        assert_eq!(inits[0].param("media_type"), Some("video/mp4"));
        assert_eq!(inits[0].param("media_category"), Some("tweet_video"));
        assert_eq!(inits[1].param("media_type"), Some("image/gif"));
        assert_eq!(inits[1].param("media_category"), None);
    }

    #[tokio::test]
    async fn test_init_without_media_id_fails() {
        let transport = MockTransport::happy("m1", "p1").respond("INIT", json!({}));
        let asset = MediaAsset::from_bytes(vec![0u8; 10], MediaMimeType::Mp4);

        let error = uploader(&transport, &UploadConfig::default())
            .upload(&asset)
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            TweetcastError::Platform(PlatformError::InvalidResponse(_))
        ));
        assert_eq!(transport.count("APPEND"), 0);
    }

    #[tokio::test]
    async fn test_append_failure_stops_before_finalize() {
        let transport = MockTransport::happy("m1", "p1")
            .enqueue("APPEND", Ok(Value::Null))
            .enqueue(
                "APPEND",
                Err(PlatformError::Http {
                    status: 400,
                    message: "Segments do not add up".to_string(),
                }),
            );
        let config = UploadConfig {
            chunk_size: 10,
            ..UploadConfig::default()
        };
        let asset = MediaAsset::from_bytes(vec![0u8; 50], MediaMimeType::Mp4);

        let error = uploader(&transport, &config).upload(&asset).await.unwrap_err();

        assert!(matches!(
            error,
            TweetcastError::Platform(PlatformError::Http { status: 400, .. })
        ));
        assert_eq!(transport.count("APPEND"), 2);
        assert_eq!(transport.count("FINALIZE"), 0);
    }

    #[tokio::test]
    async fn test_image_never_polls() {
        let transport = pending_finalize(MockTransport::happy("m1", "p1"), 1);
        let asset = MediaAsset::from_bytes(vec![0u8; 10], MediaMimeType::Jpeg);

        uploader(&transport, &UploadConfig::default())
            .upload(&asset)
            .await
            .unwrap();
        assert_eq!(transport.count("STATUS"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeded_stops_polling_immediately() {
        let transport = pending_finalize(MockTransport::happy("m1", "p1"), 1)
            .enqueue_status("in_progress", Some(1))
            .enqueue_status("succeeded", None)
            .enqueue_status("in_progress", Some(1));
        let asset = MediaAsset::from_bytes(vec![0u8; 10], MediaMimeType::Mp4);

        let media_id = uploader(&transport, &UploadConfig::default())
            .upload(&asset)
            .await
            .unwrap();

        assert_eq!(media_id, "m1");
        assert_eq!(transport.count("STATUS"), 2);
        assert_eq!(
            transport.call_sequence(),
            vec!["INIT", "APPEND", "FINALIZE", "STATUS", "STATUS"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_attempt_bound() {
        let transport = pending_finalize(MockTransport::happy("m1", "p1"), 1).respond(
            "STATUS",
            json!({ "processing_info": { "state": "in_progress", "check_after_secs": 1 } }),
        );
        let asset = MediaAsset::from_bytes(vec![0u8; 10], MediaMimeType::Mp4);

        let error = uploader(&transport, &UploadConfig::default())
            .upload(&asset)
            .await
            .unwrap_err();

        match error {
            TweetcastError::Platform(PlatformError::ProcessingTimeout { attempts, .. }) => {
                assert_eq!(attempts, 10);
            }
            other => panic!("Expected ProcessingTimeout, got {:?}", other),
        }
        assert_eq!(transport.count("STATUS"), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_wall_clock_bound() {
        let transport = pending_finalize(MockTransport::happy("m1", "p1"), 30).respond(
            "STATUS",
            json!({ "processing_info": { "state": "pending", "check_after_secs": 30 } }),
        );
        let config = UploadConfig {
            max_processing_secs: 60,
            ..UploadConfig::default()
        };
        let asset = MediaAsset::from_bytes(vec![0u8; 10], MediaMimeType::Mp4);

        let start = Instant::now();
        let error = uploader(&transport, &config).upload(&asset).await.unwrap_err();

        assert!(matches!(
            error,
            TweetcastError::Platform(PlatformError::ProcessingTimeout { attempts: 2, .. })
        ));
        assert_eq!(transport.count("STATUS"), 2);
        assert!(start.elapsed() <= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_bounds_never_exceeded() {
        // Server asks for 45s waits; capped at 30s, so both bounds line up at
        // 10 polls and 300s
        let transport = pending_finalize(MockTransport::happy("m1", "p1"), 45).respond(
            "STATUS",
            json!({ "processing_info": { "state": "in_progress", "check_after_secs": 45 } }),
        );
        let asset = MediaAsset::from_bytes(vec![0u8; 10], MediaMimeType::Mp4);

        let start = Instant::now();
        let error = uploader(&transport, &UploadConfig::default())
            .upload(&asset)
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            TweetcastError::Platform(PlatformError::ProcessingTimeout { .. })
        ));
        assert!(transport.count("STATUS") <= 10);
        assert!(start.elapsed() <= Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_processing_failure_reports_reason() {
        let transport = pending_finalize(MockTransport::happy("m1", "p1"), 1).enqueue(
            "STATUS",
            Ok(json!({
                "processing_info": {
                    "state": "failed",
                    "error": { "code": 1, "name": "InvalidMedia", "message": "Unsupported video codec" }
                }
            })),
        );
        let asset = MediaAsset::from_bytes(vec![0u8; 10], MediaMimeType::Mp4);

        let error = uploader(&transport, &UploadConfig::default())
            .upload(&asset)
            .await
            .unwrap_err();

        match error {
            TweetcastError::Platform(PlatformError::Processing(msg)) => {
                assert!(msg.contains("Unsupported video codec"));
            }
            other => panic!("Expected Processing error, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_state_is_failure() {
        let transport = pending_finalize(MockTransport::happy("m1", "p1"), 1)
            .enqueue_status("exploded", None);
        let asset = MediaAsset::from_bytes(vec![0u8; 10], MediaMimeType::Mp4);

        let error = uploader(&transport, &UploadConfig::default())
            .upload(&asset)
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            TweetcastError::Platform(PlatformError::Processing(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_without_processing_info_is_done() {
        let transport = pending_finalize(MockTransport::happy("m1", "p1"), 1)
            .enqueue("STATUS", Ok(json!({ "media_id_string": "m1" })));
        let asset = MediaAsset::from_bytes(vec![0u8; 10], MediaMimeType::Mp4);

        let media_id = uploader(&transport, &UploadConfig::default())
            .upload(&asset)
            .await
            .unwrap();
        assert_eq!(media_id, "m1");
        assert_eq!(transport.count("STATUS"), 1);
    }

    #[tokio::test]
    async fn test_video_already_processed_at_finalize() {
        let transport = MockTransport::happy("m1", "p1").respond(
            "FINALIZE",
            json!({
                "media_id_string": "m1",
                "processing_info": { "state": "succeeded", "progress_percent": 100 }
            }),
        );
        let asset = MediaAsset::from_bytes(vec![0u8; 10], MediaMimeType::Mp4);

        let media_id = uploader(&transport, &UploadConfig::default())
            .upload(&asset)
            .await
            .unwrap();

        assert_eq!(media_id, "m1");
        assert_eq!(transport.count("STATUS"), 0);
        assert_eq!(transport.call_sequence(), vec!["INIT", "APPEND", "FINALIZE"]);
    }

    #[test]
    fn test_processing_info_tolerates_odd_numbers() {
        let info: ProcessingInfo = serde_json::from_value(json!({
            "state": "in_progress",
            "check_after_secs": 1.5,
            "progress_percent": 42.7
        }))
        .unwrap();
        assert_eq!(info.check_after_secs, Some(2));
        assert_eq!(info.progress_percent, Some(42));

        let info: ProcessingInfo = serde_json::from_value(json!({
            "state": "pending",
            "check_after_secs": -3,
            "progress_percent": "soon"
        }))
        .unwrap();
        assert_eq!(info.check_after_secs, None);
        assert_eq!(info.progress_percent, None);

        let info: ProcessingInfo =
            serde_json::from_value(json!({ "state": "pending", "check_after_secs": null }))
                .unwrap();
        assert_eq!(info.check_after_secs, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fractional_check_after_still_polls() {
        let transport = MockTransport::happy("m1", "p1")
            .respond(
                "FINALIZE",
                json!({
                    "media_id_string": "m1",
                    "processing_info": { "state": "pending", "check_after_secs": 1.5 }
                }),
            )
            .enqueue(
                "STATUS",
                Ok(json!({ "processing_info": { "state": "in_progress", "check_after_secs": -1 } })),
            )
            .enqueue_status("succeeded", None);
        let asset = MediaAsset::from_bytes(vec![0u8; 10], MediaMimeType::Mp4);

        let start = Instant::now();
        let media_id = uploader(&transport, &UploadConfig::default())
            .upload(&asset)
            .await
            .unwrap();

        assert_eq!(media_id, "m1");
        assert_eq!(transport.count("STATUS"), 2);
        // 1.5s rounds up to 2s, the negative hint uses the 2s default
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[test]
    fn test_every_live_state_can_fail() {
        use UploadState::*;
        for state in [Idle, Initialized, Appending, Finalized, Processing] {
            assert!(state.can_transition_to(Failed), "{:?}", state);
        }
    }

    #[tokio::test]
    async fn test_empty_asset_rejected_before_network() {
        let transport = MockTransport::happy("m1", "p1");
        let asset = MediaAsset::from_bytes(Vec::new(), MediaMimeType::Mp4);

        let error = uploader(&transport, &UploadConfig::default())
            .upload(&asset)
            .await
            .unwrap_err();
        assert!(matches!(error, TweetcastError::InvalidInput(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_five_mib_chunks() {
        let transport = MockTransport::happy("m1", "p1");
        let asset = MediaAsset::from_bytes(vec![0u8; 11 * MIB], MediaMimeType::Mp4);

        uploader(&transport, &UploadConfig::default())
            .upload(&asset)
            .await
            .unwrap();
        assert_eq!(transport.count("APPEND"), 3);
    }
}
