//! Scripted transport for testing
//!
//! Answers requests from per-route queues so tests can drive the upload
//! protocol through any sequence of responses without network access. Every
//! request is recorded for later verification.
//!
//! Routes are keyed by the `command` parameter (`INIT`, `APPEND`,
//! `FINALIZE`, `STATUS`) or [`TWEET_ROUTE`] for JSON post creation.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::error::{PlatformError, Result};
use crate::transport::{ApiRequest, Transport};

pub const TWEET_ROUTE: &str = "TWEET";

type Reply = std::result::Result<Value, PlatformError>;

#[derive(Default)]
struct Routes {
    /// One-shot replies, consumed in order
    queued: HashMap<String, VecDeque<Reply>>,
    /// Reply used once the queue for a route is empty
    fallback: HashMap<String, Reply>,
}

/// Mock transport for testing
#[derive(Clone, Default)]
pub struct MockTransport {
    routes: Arc<Mutex<Routes>>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A well-behaved API: INIT returns `media_id`, APPEND and FINALIZE
    /// succeed without processing info and post creation returns `post_id`
    pub fn happy(media_id: &str, post_id: &str) -> Self {
        Self::new()
            .respond("INIT", json!({ "media_id_string": media_id, "expires_after_secs": 86400 }))
            .respond("APPEND", Value::Null)
            .respond("FINALIZE", json!({ "media_id_string": media_id }))
            .respond(TWEET_ROUTE, json!({ "data": { "id": post_id, "text": "" } }))
    }

    /// Set the reply used whenever nothing is queued for `route`
    pub fn respond(self, route: &str, body: Value) -> Self {
        self.routes
            .lock()
            .unwrap()
            .fallback
            .insert(route.to_string(), Ok(body));
        self
    }

    /// Make every otherwise unscripted call to `route` fail
    pub fn fail(self, route: &str, error: PlatformError) -> Self {
        self.routes
            .lock()
            .unwrap()
            .fallback
            .insert(route.to_string(), Err(error));
        self
    }

    /// Queue a one-shot reply for `route`
    pub fn enqueue(self, route: &str, reply: Reply) -> Self {
        self.routes
            .lock()
            .unwrap()
            .queued
            .entry(route.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Queue one `processing_info` reply for STATUS
    pub fn enqueue_status(self, state: &str, check_after_secs: Option<u64>) -> Self {
        let mut info = json!({ "state": state });
        if let Some(secs) = check_after_secs {
            info["check_after_secs"] = json!(secs);
        }
        self.enqueue("STATUS", Ok(json!({ "processing_info": info })))
    }

    /// All requests seen so far
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests seen for one route
    pub fn requests_for(&self, route: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| route_of(r) == route)
            .collect()
    }

    pub fn count(&self, route: &str) -> usize {
        self.requests_for(route).len()
    }

    /// Route keys in the order they were called
    pub fn call_sequence(&self) -> Vec<String> {
        self.requests().iter().map(route_of).collect()
    }
}

pub fn route_of(request: &ApiRequest) -> String {
    match request.param("command") {
        Some(command) => command.to_string(),
        None if request.json.is_some() => TWEET_ROUTE.to_string(),
        None => "UNKNOWN".to_string(),
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value> {
        let route = route_of(&request);
        self.requests.lock().unwrap().push(request);

        let reply = {
            let mut routes = self.routes.lock().unwrap();
            let queued = routes.queued.get_mut(&route).and_then(|q| q.pop_front());
            match queued {
                Some(reply) => reply,
                None => routes.fallback.get(&route).cloned().unwrap_or_else(|| {
                    Err(PlatformError::Http {
                        status: 404,
                        message: format!("No scripted response for {}", route),
                    })
                }),
            }
        };

        reply.map_err(Into::into)
    }
}
