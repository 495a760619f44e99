//! Client facade wiring the store, transport, coordinator and session.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::api::SocialApi;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::models::PictureUpdate;
use crate::pipeline::RequestPipeline;
use crate::refresh::RefreshCoordinator;
use crate::session::{SessionContext, SessionState};
use crate::store::{CredentialStore, StorageBackend, StorageKey};
use crate::transport::{HttpTransport, Transport};

/// One authenticated API client.
///
/// Owns exactly one [`RefreshCoordinator`], shared by every request made
/// through [`FeedlineClient::pipeline`], [`FeedlineClient::session`] and
/// [`FeedlineClient::social`].
#[derive(Clone)]
pub struct FeedlineClient {
    config: Arc<ClientConfig>,
    store: CredentialStore,
    pipeline: Arc<RequestPipeline>,
    session: SessionContext,
    social: SocialApi,
}

impl FeedlineClient {
    /// Build a client talking HTTP to `config.api_url`.
    pub fn new(config: ClientConfig, backend: Arc<dyn StorageBackend>) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::with_transport(config, backend, transport))
    }

    /// Build a client over an arbitrary transport.
    pub fn with_transport(
        config: ClientConfig,
        backend: Arc<dyn StorageBackend>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let store = CredentialStore::new(backend);
        let state = Arc::new(SessionState::new(
            store.get(StorageKey::ProfilePicture).as_deref(),
        ));
        let coordinator = Arc::new(RefreshCoordinator::new(
            transport.clone(),
            store.clone(),
            state.clone(),
            config.token_refresh_url.as_str(),
        ));
        let pipeline = Arc::new(RequestPipeline::new(
            transport,
            store.clone(),
            coordinator,
            state.clone(),
            config.exempt_paths.clone(),
        ));
        let session = SessionContext::new(pipeline.clone(), store.clone(), state);
        let social = SocialApi::new(pipeline.clone());

        debug!(api_url = %config.api_url, "Feedline client created");
        Self {
            config: Arc::new(config),
            store,
            pipeline,
            session,
            social,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn social(&self) -> &SocialApi {
        &self.social
    }

    pub fn pipeline(&self) -> &Arc<RequestPipeline> {
        &self.pipeline
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Upload a new profile picture, then re-fetch the user so the session
    /// avatar and its stored copy follow the new picture.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn update_profile_picture(&self, path: &Path) -> Result<PictureUpdate> {
        let update = self.social.update_profile_picture(path).await?;
        self.session.refresh_user().await;
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::endpoints;
    use crate::store::MemoryBackend;
    use crate::testing::{MockTransport, reply};
    use reqwest::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_restores_cached_avatar_and_session() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set("profile_picture", "/media/ana.png").unwrap();
        backend.set("access", "a1").unwrap();
        backend.set("refresh", "r1").unwrap();
        let transport = Arc::new(MockTransport::new(|_| {
            reply(StatusCode::OK, json!({"username": "ana"}))
        }));

        let client =
            FeedlineClient::with_transport(ClientConfig::default(), backend, transport.clone());
        assert_eq!(client.session().profile_picture(), "/media/ana.png");
        assert!(client.session().is_loading());

        client.session().refresh_user().await;

        assert!(client.session().is_authenticated());
        assert_eq!(transport.calls()[0].bearer_token(), Some("a1"));
    }

    #[tokio::test]
    async fn test_profile_picture_update_refreshes_avatar() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set("access", "a1").unwrap();
        backend.set("refresh", "r1").unwrap();
        let transport = Arc::new(MockTransport::new(|req| match req.path.as_str() {
            endpoints::UPDATE_PROFILE_PICTURE => reply(
                StatusCode::OK,
                json!({"detail": "Profile picture updated successfully", "url": "/media/new.png"}),
            ),
            endpoints::ME => reply(
                StatusCode::OK,
                json!({"username": "ana", "profile": {"profile_picture": "/media/new.png"}}),
            ),
            other => panic!("unexpected path {other}"),
        }));
        let client = FeedlineClient::with_transport(ClientConfig::default(), backend, transport);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.png");
        std::fs::write(&path, b"png").unwrap();

        let update = client.update_profile_picture(&path).await.unwrap();

        assert_eq!(update.detail.as_deref(), Some("Profile picture updated successfully"));
        assert_eq!(client.session().profile_picture(), "/media/new.png");
        assert_eq!(
            client.store().get(StorageKey::ProfilePicture).as_deref(),
            Some("/media/new.png")
        );
    }

    #[tokio::test]
    async fn test_components_share_one_coordinator() {
        let transport = Arc::new(MockTransport::new(|req| {
            if req.path.ends_with("token/refresh/") {
                reply(StatusCode::OK, json!({"access": "a2"}))
            } else if req.bearer_token() == Some("a2") {
                reply(StatusCode::OK, json!([]))
            } else {
                reply(StatusCode::UNAUTHORIZED, json!({}))
            }
        }));
        let client = FeedlineClient::with_transport(
            ClientConfig::default(),
            Arc::new(MemoryBackend::new()),
            transport,
        );
        client.store().set(StorageKey::Access, "a1");
        client.store().set(StorageKey::Refresh, "r1");

        client.social().feed().await.unwrap();
        assert_eq!(client.pipeline().coordinator().refresh_calls(), 1);
        assert_eq!(client.store().get(StorageKey::Access).as_deref(), Some("a2"));
    }
}
