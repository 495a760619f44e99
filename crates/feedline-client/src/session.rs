//! Session state and lifecycle operations.
//!
//! [`SessionState`] is the in-memory half of the session: current user,
//! credential pair, resolved avatar and the initial loading flag. The
//! credential store is its durable mirror. [`SessionContext`] exposes the
//! lifecycle operations (login, register, refresh-from-server, logout) on top
//! of the request pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use reqwest::StatusCode;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::avatar::{DEFAULT_AVATAR, resolve_avatar};
use crate::config::endpoints;
use crate::error::{ClientError, RefreshError, Result};
use crate::models::{AuthResponse, CredentialPair, FieldErrors, LoginRequest, RegisterPayload, User};
use crate::pipeline::RequestPipeline;
use crate::store::{CredentialStore, StorageKey};
use crate::transport::{ApiRequest, ApiResponse};

/// Broadcast channel capacity for session events.
const SESSION_EVENT_CAPACITY: usize = 64;

/// Session lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { username: String },
    /// The access token was replaced by a refresh.
    Refreshed,
    LoggedOut,
    /// The session ended because a refresh was impossible.
    Expired { reason: String },
}

/// Read-only view handed to presentation code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub profile_picture: String,
    pub is_authenticated: bool,
    pub loading: bool,
}

struct SessionInner {
    user: Option<User>,
    credentials: Option<CredentialPair>,
    profile_picture: String,
    loading: bool,
}

/// Shared in-memory session.
///
/// `is_authenticated` is derived from the presence of a user and never stored.
///
/// The epoch advances whenever the session is cleared or replaced by a new
/// login, always under the write lock. A refresh that started in an older
/// epoch must not write its tokens back.
pub struct SessionState {
    inner: RwLock<SessionInner>,
    epoch: AtomicU64,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionState {
    /// `profile_picture` seeds the avatar, typically from the credential store.
    pub fn new(profile_picture: Option<&str>) -> Self {
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        Self {
            inner: RwLock::new(SessionInner {
                user: None,
                credentials: None,
                profile_picture: resolve_avatar(profile_picture),
                loading: true,
            }),
            epoch: AtomicU64::new(0),
            events,
        }
    }

    pub fn user(&self) -> Option<User> {
        self.inner.read().user.clone()
    }

    #[inline]
    pub fn is_authenticated(&self) -> bool {
        self.inner.read().user.is_some()
    }

    pub fn profile_picture(&self) -> String {
        self.inner.read().profile_picture.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.read().loading
    }

    /// In-memory access token, used as the pipeline's default authorization.
    pub fn access_token(&self) -> Option<String> {
        self.inner
            .read()
            .credentials
            .as_ref()
            .map(|c| c.access.clone())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.read();
        SessionSnapshot {
            user: inner.user.clone(),
            profile_picture: inner.profile_picture.clone(),
            is_authenticated: inner.user.is_some(),
            loading: inner.loading,
        }
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // Ignore errors - just means no subscribers currently
        let _ = self.events.send(event);
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub(crate) fn establish(&self, credentials: CredentialPair, user: User, profile_picture: String) {
        let mut inner = self.inner.write();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        inner.credentials = Some(credentials);
        inner.user = Some(user);
        inner.profile_picture = profile_picture;
    }

    pub(crate) fn set_user(&self, user: User, profile_picture: String) {
        let mut inner = self.inner.write();
        inner.user = Some(user);
        inner.profile_picture = profile_picture;
    }

    pub(crate) fn set_credentials(&self, credentials: CredentialPair) {
        self.inner.write().credentials = Some(credentials);
    }

    pub(crate) fn finish_loading(&self) {
        self.inner.write().loading = false;
    }

    /// Drop user, credentials and avatar. Returns whether a user was present.
    pub(crate) fn clear(&self) -> bool {
        let mut inner = self.inner.write();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        Self::reset(&mut inner)
    }

    fn reset(inner: &mut SessionInner) -> bool {
        let was_authenticated = inner.user.is_some();
        inner.user = None;
        inner.credentials = None;
        inner.profile_picture = DEFAULT_AVATAR.to_string();
        was_authenticated
    }

    /// Persist refreshed credentials, unless the session moved past `epoch`.
    pub(crate) fn commit_refresh(
        &self,
        epoch: u64,
        store: &CredentialStore,
        credentials: CredentialPair,
    ) -> bool {
        let mut inner = self.inner.write();
        if self.epoch() != epoch {
            return false;
        }
        store.set(StorageKey::Access, &credentials.access);
        store.set(StorageKey::Refresh, &credentials.refresh);
        inner.credentials = Some(credentials);
        true
    }

    /// End the session after a failed refresh, unless it moved past `epoch`.
    pub(crate) fn expire(&self, epoch: u64, store: &CredentialStore, cause: &RefreshError) -> bool {
        {
            let mut inner = self.inner.write();
            if self.epoch() != epoch {
                return false;
            }
            self.epoch.fetch_add(1, Ordering::AcqRel);
            Self::reset(&mut inner);
            store.clear();
        }
        info!(reason = %cause, "Session expired");
        self.emit(SessionEvent::Expired {
            reason: cause.to_string(),
        });
        true
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Login/register/logout and refresh-from-server.
#[derive(Clone)]
pub struct SessionContext {
    pipeline: Arc<RequestPipeline>,
    store: CredentialStore,
    state: Arc<SessionState>,
}

impl SessionContext {
    pub fn new(
        pipeline: Arc<RequestPipeline>,
        store: CredentialStore,
        state: Arc<SessionState>,
    ) -> Self {
        Self {
            pipeline,
            store,
            state,
        }
    }

    /// Log in. Failures clear the session and return `false`.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> bool {
        let result = async {
            let request =
                ApiRequest::post(endpoints::LOGIN).json(&LoginRequest { username, password })?;
            self.pipeline.execute(request).await?.json::<AuthResponse>()
        }
        .await;

        match result {
            Ok(body) => {
                self.establish(body);
                true
            }
            Err(e) => {
                warn!(error = %e, "Login failed");
                self.logout();
                false
            }
        }
    }

    /// Register a new account and log it in.
    ///
    /// Unlike [`SessionContext::login`], failures are returned: a rejected
    /// form comes back as [`ClientError::Validation`] with the field errors.
    #[instrument(skip_all, fields(username = %payload.username))]
    pub async fn register(&self, payload: &RegisterPayload) -> Result<bool> {
        let result = async {
            let request = ApiRequest::post(endpoints::REGISTER).json(payload)?;
            let response = self.pipeline.send(request).await?;
            if response.is_success() {
                response.json::<AuthResponse>()
            } else {
                Err(registration_error(response))
            }
        }
        .await;

        match result {
            Ok(body) => {
                self.establish(body);
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "Registration failed");
                self.logout();
                Err(e)
            }
        }
    }

    /// Re-fetch the current user with the stored access token.
    ///
    /// Without a stored token the in-memory session is cleared; any failure
    /// (including an unrecoverable 401) logs out.
    #[instrument(skip(self))]
    pub async fn refresh_user(&self) {
        if !self.store.has_access_token() {
            debug!("No stored access token");
            self.state.clear();
            self.state.finish_loading();
            return;
        }

        let result = async {
            self.pipeline
                .execute(ApiRequest::get(endpoints::ME))
                .await?
                .json::<User>()
        }
        .await;

        match result {
            Ok(user) => {
                let picture = resolve_avatar(user.profile_picture());
                self.store.set(StorageKey::ProfilePicture, &picture);
                self.store.set(StorageKey::Username, &user.username);
                if let (Some(access), Some(refresh)) = (
                    self.store.get(StorageKey::Access),
                    self.store.get(StorageKey::Refresh),
                ) {
                    self.state.set_credentials(CredentialPair { access, refresh });
                }
                debug!(username = %user.username, "Session user refreshed");
                self.state.set_user(user, picture);
            }
            Err(e) => {
                warn!(error = %e, "Failed to refresh user; logging out");
                self.logout();
            }
        }
        self.state.finish_loading();
    }

    /// Clear stored credentials and the in-memory session. Idempotent.
    pub fn logout(&self) {
        let was_authenticated = self.state.clear();
        self.store.clear();
        if was_authenticated {
            info!("Logged out");
            self.state.emit(SessionEvent::LoggedOut);
        }
    }

    pub fn user(&self) -> Option<User> {
        self.state.user()
    }

    pub fn profile_picture(&self) -> String {
        self.state.profile_picture()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.state.subscribe()
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    fn establish(&self, body: AuthResponse) {
        let picture = resolve_avatar(body.user.profile_picture());
        let credentials = body.credentials();
        let username = body.user.username.clone();

        // Epoch first: a refresh left over from the previous session must not
        // overwrite these tokens.
        self.state
            .establish(credentials.clone(), body.user, picture.clone());
        self.store.set(StorageKey::Access, &credentials.access);
        self.store.set(StorageKey::Refresh, &credentials.refresh);
        if !username.is_empty() {
            self.store.set(StorageKey::Username, &username);
        }
        self.store.set(StorageKey::ProfilePicture, &picture);

        info!(%username, "Session established");
        self.state.emit(SessionEvent::LoggedIn { username });
    }
}

/// Map a failed registration response to a typed error.
fn registration_error(response: ApiResponse) -> ClientError {
    if response.status == StatusCode::BAD_REQUEST {
        if let Ok(errors) = response.json::<FieldErrors>() {
            if !errors.is_empty() {
                return ClientError::Validation(errors);
            }
        }
    }
    response.into_error(endpoints::REGISTER)
}
