//! Scripted transport for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use tokio::sync::Semaphore;

use crate::error::{ClientError, Result};
use crate::transport::{ApiRequest, ApiResponse, Transport};

type Handler = dyn Fn(&ApiRequest) -> Result<ApiResponse> + Send + Sync;

pub(crate) fn reply(status: StatusCode, body: serde_json::Value) -> ApiResponse {
    ApiResponse::json_body(status, &body)
}

/// Records every request and answers through a closure. Requests to the
/// gated path block until [`MockTransport::open_gate`] is called.
pub(crate) struct MockTransport {
    handler: Box<Handler>,
    calls: Mutex<Vec<ApiRequest>>,
    gate: Option<(String, Semaphore)>,
}

impl MockTransport {
    pub(crate) fn new<F>(handler: F) -> Self
    where
        F: Fn(&ApiRequest) -> ApiResponse + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(move |req| Ok(handler(req))),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub(crate) fn failing(message: &'static str) -> Self {
        Self {
            handler: Box::new(move |_| Err(ClientError::Transport(message.to_string()))),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub(crate) fn gated(mut self, path: &str) -> Self {
        self.gate = Some((path.to_string(), Semaphore::new(0)));
        self
    }

    pub(crate) fn open_gate(&self) {
        if let Some((_, semaphore)) = &self.gate {
            semaphore.add_permits(1024);
        }
    }

    pub(crate) fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().clone()
    }

    pub(crate) fn calls_to(&self, path: &str) -> usize {
        self.calls.lock().iter().filter(|r| r.path == path).count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.calls.lock().push(request.clone());

        if let Some((path, semaphore)) = &self.gate {
            if *path == request.path {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| ClientError::Transport(e.to_string()))?;
            }
        }

        (self.handler)(request)
    }
}
