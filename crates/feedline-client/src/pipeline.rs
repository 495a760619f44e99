//! Authorized request pipeline.
//!
//! Every API call goes through [`RequestPipeline::send`]. Outbound, the
//! pipeline attaches the bearer token unless the endpoint is exempt. Inbound,
//! a 401 on a non-exempt request that has not been retried yet is handed to
//! the [`RefreshCoordinator`], and the request is replayed once with the new
//! token.

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::config::is_exempt_path;
use crate::error::{ClientError, Result};
use crate::refresh::RefreshCoordinator;
use crate::session::SessionState;
use crate::store::{CredentialStore, StorageKey};
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// A request on its way through the pipeline.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub request: ApiRequest,
    /// Set once the request has been replayed after a refresh.
    pub retried: bool,
    /// Token obtained by the refresh, used for the replay.
    bearer_override: Option<String>,
}

impl PendingRequest {
    pub fn new(request: ApiRequest) -> Self {
        Self {
            request,
            retried: false,
            bearer_override: None,
        }
    }
}

pub struct RequestPipeline {
    transport: Arc<dyn Transport>,
    store: CredentialStore,
    coordinator: Arc<RefreshCoordinator>,
    session: Arc<SessionState>,
    exempt_paths: Vec<String>,
}

impl RequestPipeline {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: CredentialStore,
        coordinator: Arc<RefreshCoordinator>,
        session: Arc<SessionState>,
        exempt_paths: Vec<String>,
    ) -> Self {
        Self {
            transport,
            store,
            coordinator,
            session,
            exempt_paths,
        }
    }

    /// Whether `path` must never carry credentials.
    pub fn is_exempt(&self, path: &str) -> bool {
        is_exempt_path(&self.exempt_paths, path)
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// Build the request that actually goes on the wire.
    ///
    /// Bearer priority: refreshed token for a replay, then the stored access
    /// token, then the session's in-memory token.
    fn authorize(&self, pending: &PendingRequest) -> Result<ApiRequest> {
        let mut request = pending.request.clone();
        if self.is_exempt(&request.path) {
            request.headers.remove(AUTHORIZATION);
            return Ok(request);
        }

        let token = pending
            .bearer_override
            .clone()
            .or_else(|| self.store.get(StorageKey::Access))
            .or_else(|| self.session.access_token());
        if let Some(token) = token {
            request.set_bearer(&token)?;
        }
        Ok(request)
    }

    /// Send a request and return the final response, whatever its status.
    ///
    /// Errors are transport failures and [`ClientError::SessionExpired`] when
    /// a 401 could not be recovered by a refresh.
    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut pending = PendingRequest::new(request);

        loop {
            let outbound = self.authorize(&pending)?;
            let response = self.transport.send(&outbound).await?;

            if response.status != StatusCode::UNAUTHORIZED
                || pending.retried
                || self.is_exempt(&pending.request.path)
            {
                return Ok(response);
            }

            debug!("Access token rejected, requesting refresh");
            pending.retried = true;
            match self.coordinator.refresh().await {
                Ok(token) => pending.bearer_override = Some(token),
                Err(cause) => {
                    warn!(error = %cause, "Request failed after refresh failure");
                    return Err(ClientError::SessionExpired {
                        path: pending.request.path,
                        cause,
                    });
                }
            }
        }
    }

    /// Like [`RequestPipeline::send`], but non-2xx responses become errors.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let path = request.path.clone();
        let response = self.send(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(response.into_error(&path))
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute(ApiRequest::get(path)).await?.json()
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(ApiRequest::post(path).json(body)?)
            .await?
            .json()
    }
}
