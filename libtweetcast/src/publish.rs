//! Post creation

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::error::{PlatformError, Result};
use crate::transport::{ApiRequest, Transport};

/// Body of the post creation call
#[derive(Debug, Clone, Serialize)]
pub struct PostRequest {
    pub text: String,
    pub media: PostMedia,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<PostReply>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostMedia {
    pub media_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostReply {
    pub in_reply_to_tweet_id: String,
}

impl PostRequest {
    pub fn new(text: impl Into<String>, media_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media: PostMedia {
                media_ids: vec![media_id.into()],
            },
            reply: None,
        }
    }

    /// Reply to an existing post; blank ids are ignored
    pub fn in_reply_to(mut self, post_id: Option<impl Into<String>>) -> Self {
        self.reply = post_id
            .map(|id| Into::<String>::into(id).trim().to_string())
            .filter(|id| !id.is_empty())
            .map(|in_reply_to_tweet_id| PostReply {
                in_reply_to_tweet_id,
            });
        self
    }
}

pub struct Publisher {
    transport: Arc<dyn Transport>,
    tweet_url: String,
}

impl Publisher {
    pub fn new(transport: Arc<dyn Transport>, tweet_url: impl Into<String>) -> Self {
        Self {
            transport,
            tweet_url: tweet_url.into(),
        }
    }

    /// Create the post and return its id
    pub async fn publish(&self, request: &PostRequest) -> Result<String> {
        let body = serde_json::to_value(request).map_err(|e| {
            PlatformError::InvalidResponse(format!("Failed to encode post request: {}", e))
        })?;

        let response = self
            .transport
            .send(ApiRequest::post_json(&self.tweet_url, body))
            .await?;

        let post_id = response
            .get("data")
            .and_then(|data| data.get("id"))
            .and_then(|id| id.as_str())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                PlatformError::InvalidResponse("Post response has no data.id".to_string())
            })?
            .to_string();

        info!(
            "Published post {} with media {}",
            post_id,
            request.media.media_ids.join(",")
        );
        Ok(post_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TweetcastError;
    use crate::transport::mock::{MockTransport, TWEET_ROUTE};
    use serde_json::json;

    fn publisher(transport: &MockTransport) -> Publisher {
        Publisher::new(Arc::new(transport.clone()), "https://api.example.com/2/tweets")
    }

    #[test]
    fn test_body_without_reply() {
        let request = PostRequest::new("Hello", "m1").in_reply_to(None::<String>);
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(
            body,
            json!({ "text": "Hello", "media": { "media_ids": ["m1"] } })
        );
        assert!(body.get("reply").is_none());
    }

    #[test]
    fn test_body_with_reply() {
        let request = PostRequest::new("Hello", "m1").in_reply_to(Some("1234"));
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["reply"]["in_reply_to_tweet_id"], "1234");
        assert_eq!(body["media"]["media_ids"][0], "m1");
    }

    #[test]
    fn test_blank_reply_is_dropped() {
        let request = PostRequest::new("Hello", "m1").in_reply_to(Some("  "));
        assert!(request.reply.is_none());
    }

    #[tokio::test]
    async fn test_publish_returns_post_id() {
        let transport = MockTransport::happy("m1", "1500");
        let request = PostRequest::new("Look at this", "m1");

        let post_id = publisher(&transport).publish(&request).await.unwrap();

        assert_eq!(post_id, "1500");
        let sent = transport.requests_for(TWEET_ROUTE);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].json.as_ref().unwrap()["text"], "Look at this");
    }

    #[tokio::test]
    async fn test_publish_missing_id_is_invalid_response() {
        let transport = MockTransport::new().respond(TWEET_ROUTE, json!({ "data": {} }));

        let error = publisher(&transport)
            .publish(&PostRequest::new("x", "m1"))
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            TweetcastError::Platform(PlatformError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_is_not_retried() {
        let transport = MockTransport::new().fail(TWEET_ROUTE, PlatformError::rate_limit("429"));

        let error = publisher(&transport)
            .publish(&PostRequest::new("x", "m1"))
            .await
            .unwrap_err();

        assert!(error.is_rate_limited());
        assert_eq!(transport.count(TWEET_ROUTE), 1);
    }
}
