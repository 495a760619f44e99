//! Raw request/response transport.
//!
//! A [`Transport`] sends exactly what it is given. Credential handling lives
//! in [`crate::RequestPipeline`]; the refresh coordinator talks to the
//! transport directly so a refresh can never trigger another refresh.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::models::DetailResponse;

/// A file sent as a `multipart/form-data` field.
///
/// Kept as raw bytes so the request stays cloneable for a replay.
#[derive(Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl std::fmt::Debug for FilePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePart")
            .field("field", &self.field)
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// One outbound API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API root, or an absolute URL.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Multipart upload; takes precedence over `body`.
    pub file: Option<FilePart>,
    pub headers: HeaderMap,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            file: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Attach a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Send `part` as a multipart form instead of a JSON body.
    pub fn file(mut self, part: FilePart) -> Self {
        self.file = Some(part);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set `Authorization: Bearer <token>`, replacing any previous value.
    pub fn set_bearer(&mut self, token: &str) -> Result<()> {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ClientError::config("access token is not a valid header value"))?;
        self.headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    /// Token carried in the Authorization header, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

/// Status and raw body of a completed call.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Build a response carrying a JSON value.
    pub fn json_body(status: StatusCode, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string())
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// `detail` field of an error body, if the body has one.
    pub fn detail(&self) -> Option<String> {
        serde_json::from_slice::<DetailResponse>(&self.body)
            .ok()
            .and_then(|d| d.detail)
    }

    /// Convert a failed response into [`ClientError::Http`].
    pub fn into_error(self, path: &str) -> ClientError {
        ClientError::Http {
            status: self.status,
            path: path.to_string(),
            detail: self.detail(),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and return whatever the server answered.
    ///
    /// Only failures to obtain a response are errors; non-2xx statuses are
    /// returned as responses.
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

/// Install the process-wide rustls crypto provider once.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Safe to ignore: can happen if another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// `reqwest` backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        install_rustls_provider();

        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout);

        if config.timeout > Duration::ZERO {
            builder = builder.timeout(config.timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base: config.api_url.clone(),
        })
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client, base: Url) -> Self {
        Self { client, base }
    }

    fn resolve(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| ClientError::config(format!("invalid request path {path}: {e}")))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = self.resolve(&request.path)?;
        debug!(method = %request.method, %url, "Sending request");

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(request.headers.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(file) = &request.file {
            let part = Part::bytes(file.bytes.to_vec())
                .file_name(file.file_name.clone())
                .mime_str(&file.content_type)?;
            builder = builder.multipart(Form::new().part(file.field.clone(), part));
        } else if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        debug!(path = %request.path, %status, bytes = body.len(), "Received response");
        Ok(ApiResponse { status, body })
    }
}
