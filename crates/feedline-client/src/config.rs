//! Client configuration.

use std::time::Duration;

use url::Url;

use crate::error::{ClientError, Result};

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/";

pub const DEFAULT_USER_AGENT: &str = concat!("feedline-client/", env!("CARGO_PKG_VERSION"));

/// Path substrings of endpoints that must never carry credentials.
pub const DEFAULT_EXEMPT_PATHS: &[&str] = &["accounts/auth/login/", "accounts/auth/register/"];

/// Endpoint paths relative to the API root.
pub mod endpoints {
    pub const LOGIN: &str = "accounts/auth/login/";
    pub const REGISTER: &str = "accounts/auth/register/";
    pub const ME: &str = "accounts/auth/me/";
    pub const PROFILE: &str = "accounts/auth/profile/";
    pub const FOLLOW: &str = "accounts/auth/follow/";
    pub const UNFOLLOW: &str = "accounts/auth/unfollow/";
    pub const FOLLOWING: &str = "accounts/auth/following/";
    pub const USER_FOLLOWERS: &str = "accounts/auth/user-followers/";
    pub const USER_FOLLOWING: &str = "accounts/auth/user-following/";
    pub const UPDATE_USERNAME: &str = "accounts/auth/update-username/";
    pub const UPDATE_EMAIL_PASSWORD: &str = "accounts/auth/update-email-password/";
    pub const UPDATE_PROFILE_PICTURE: &str = "accounts/auth/update-profile-picture/";
    pub const POSTS: &str = "posts/";
    pub const LIKED_POSTS: &str = "posts/liked/";
}

/// Configuration for [`crate::FeedlineClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root; always ends with `/`.
    pub api_url: Url,
    /// Absolute URL of the token refresh endpoint.
    pub token_refresh_url: Url,
    /// Requests whose path contains one of these never get an Authorization header.
    pub exempt_paths: Vec<String>,
    /// Overall request timeout. Zero disables it.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        // DEFAULT_API_URL is a valid literal
        let api_url = Url::parse(DEFAULT_API_URL).expect("default api url");
        let token_refresh_url = derive_refresh_url(&api_url);
        Self {
            api_url,
            token_refresh_url,
            exempt_paths: DEFAULT_EXEMPT_PATHS.iter().map(|p| p.to_string()).collect(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl ClientConfig {
    /// Build a config for an API root, deriving the refresh endpoint from it.
    pub fn new(api_url: &str) -> Result<Self> {
        let api_url = parse_api_url(api_url)?;
        let token_refresh_url = derive_refresh_url(&api_url);
        Ok(Self {
            api_url,
            token_refresh_url,
            ..Self::default()
        })
    }

    /// Override the refresh endpoint.
    pub fn with_token_refresh_url(mut self, url: &str) -> Result<Self> {
        self.token_refresh_url = Url::parse(url)
            .map_err(|e| ClientError::config(format!("invalid token refresh url {url}: {e}")))?;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create ClientConfig from environment variables.
    ///
    /// Environment variables:
    /// - `FEEDLINE_API_URL`: API root (default: `http://localhost:8000/api/`)
    /// - `FEEDLINE_TOKEN_REFRESH_URL`: refresh endpoint (default: derived from the API root)
    /// - `FEEDLINE_TIMEOUT_SECS`: request timeout in seconds (default: 30)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("FEEDLINE_API_URL") {
            Some(url) => Self::new(&url)?,
            None => Self::default(),
        };

        if let Some(url) = lookup("FEEDLINE_TOKEN_REFRESH_URL") {
            config = config.with_token_refresh_url(&url)?;
        }

        if let Some(secs) = lookup("FEEDLINE_TIMEOUT_SECS").and_then(|s| s.trim().parse().ok()) {
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Whether `path` targets an endpoint that must stay unauthenticated.
    pub fn is_exempt(&self, path: &str) -> bool {
        is_exempt_path(&self.exempt_paths, path)
    }
}

pub(crate) fn is_exempt_path(exempt_paths: &[String], path: &str) -> bool {
    exempt_paths.iter().any(|p| path.contains(p.as_str()))
}

fn parse_api_url(raw: &str) -> Result<Url> {
    let mut url =
        Url::parse(raw).map_err(|e| ClientError::config(format!("invalid api url {raw}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(ClientError::config(format!("api url {raw} cannot be a base")));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// `http://host/social/api/` -> `http://host/social/api/token/refresh/`.
///
/// Everything in front of the first `/api/` segment is kept as the mount
/// prefix. A root without an `/api/` segment gets `api/token/refresh/`
/// appended to its full path.
fn derive_refresh_url(api_url: &Url) -> Url {
    let path = api_url.path();
    let prefix = match path.find("/api/") {
        Some(idx) => &path[..idx],
        None => path.trim_end_matches('/'),
    };
    let mut url = api_url.clone();
    url.set_path(&format!("{prefix}/api/token/refresh/"));
    url.set_query(None);
    url.set_fragment(None);
    url
}
