//! HTTP routes
//!
//! `POST /api/upload` takes a multipart form with the fields `file`, `url`,
//! `text` and `reply_to`. Exactly one of `file` and `url` must be given.
//! Client mistakes answer 400, everything that failed downstream 500, both
//! with `{"success": false, "error": "..."}`.

use std::sync::Arc;

use axum::{
    extract::{multipart::Field, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use libtweetcast::{MediaSource, TweetcastError, UploadRequest, Uploader};
use serde::Serialize;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub uploader: Arc<Uploader>,
}

pub fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/api/upload", post(upload))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub tweet_id: String,
    pub media_id: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// Library error rendered as a JSON response
pub struct ApiError(TweetcastError);

impl From<TweetcastError> for ApiError {
    fn from(error: TweetcastError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            warn!(error = %self.0, "Upload failed");
        }

        let body = ErrorResponse {
            success: false,
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Fields of the upload form
#[derive(Default)]
struct UploadForm {
    file: Option<MediaSource>,
    url: Option<String>,
    text: Option<String>,
    reply_to: Option<String>,
}

fn bad_form(e: impl std::fmt::Display) -> TweetcastError {
    TweetcastError::InvalidInput(format!("Malformed upload form: {}", e))
}

async fn field_text(field: Field<'_>) -> Result<Option<String>, TweetcastError> {
    let text = field.text().await.map_err(bad_form)?;
    Ok(Some(text).filter(|t| !t.trim().is_empty()))
}

async fn read_form(multipart: &mut Multipart) -> Result<UploadForm, TweetcastError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().map(str::to_string);
                let mime = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(bad_form)?;

                // Browsers send an empty, unnamed part when no file was chosen
                let unnamed = file_name.as_deref().map_or(true, str::is_empty);
                if data.is_empty() && unnamed {
                    continue;
                }
                form.file = Some(MediaSource::Bytes {
                    data,
                    file_name,
                    mime,
                });
            }
            Some("url") => form.url = field_text(field).await?,
            Some("text") => form.text = field_text(field).await?,
            Some("reply_to") => form.reply_to = field_text(field).await?,
            _ => continue,
        }
    }

    Ok(form)
}

#[tracing::instrument(skip_all)]
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let form = read_form(&mut multipart).await?;
    let source = MediaSource::select(form.url, form.file)?;

    let request = UploadRequest::new(source)
        .with_text(form.text.unwrap_or_default())
        .reply_to(form.reply_to);

    let post = state.uploader.upload_and_post(request).await?;
    info!(
        tweet_id = %post.post_id,
        media_id = %post.media_id,
        "Upload published"
    );

    Ok(Json(UploadResponse {
        success: true,
        tweet_id: post.post_id,
        media_id: post.media_id,
    }))
}
