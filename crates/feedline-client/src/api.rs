//! Feed, post and account endpoints.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, instrument};

use crate::config::endpoints;
use crate::error::{ClientError, Result};
use crate::models::{
    Comment, DetailResponse, FollowersList, FollowingList, NewPost, PictureUpdate, Post, User,
};
use crate::pipeline::RequestPipeline;
use crate::transport::{ApiRequest, FilePart};

/// Largest profile picture the server accepts.
pub const MAX_PROFILE_PICTURE_BYTES: usize = 5 * 1024 * 1024;

const PROFILE_PICTURE_FIELD: &str = "profile_picture";

#[derive(Debug, Serialize)]
struct EmailPasswordUpdate<'a> {
    current_password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_password: Option<&'a str>,
}

/// Typed wrappers over the social endpoints. All calls are authorized by the
/// [`RequestPipeline`].
#[derive(Clone)]
pub struct SocialApi {
    pipeline: Arc<RequestPipeline>,
}

impl SocialApi {
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }

    /// Global feed, newest first.
    pub async fn feed(&self) -> Result<Vec<Post>> {
        self.pipeline.get_json(endpoints::POSTS).await
    }

    pub async fn posts_by_user(&self, username: &str) -> Result<Vec<Post>> {
        let path = format!("posts/user/{}/", urlencoding::encode(username));
        self.pipeline.get_json(&path).await
    }

    /// Posts liked by the current user.
    pub async fn liked_posts(&self) -> Result<Vec<Post>> {
        self.pipeline.get_json(endpoints::LIKED_POSTS).await
    }

    #[instrument(skip_all, fields(title = %post.title))]
    pub async fn create_post(&self, post: &NewPost) -> Result<Post> {
        self.pipeline.post_json(endpoints::POSTS, post).await
    }

    pub async fn like(&self, post_id: u64) -> Result<Option<String>> {
        self.post_detail(&format!("posts/{post_id}/like/"), &json!({}))
            .await
    }

    pub async fn unlike(&self, post_id: u64) -> Result<Option<String>> {
        self.post_detail(&format!("posts/{post_id}/unlike/"), &json!({}))
            .await
    }

    pub async fn comments(&self, post_id: u64) -> Result<Vec<Comment>> {
        self.pipeline
            .get_json(&format!("posts/{post_id}/comments/"))
            .await
    }

    pub async fn add_comment(&self, post_id: u64, content: &str) -> Result<Comment> {
        self.pipeline
            .post_json(
                &format!("posts/{post_id}/comments/"),
                &json!({ "content": content }),
            )
            .await
    }

    /// Public profile of `username`.
    pub async fn profile(&self, username: &str) -> Result<User> {
        self.pipeline
            .execute(ApiRequest::get(endpoints::PROFILE).query("username", username))
            .await?
            .json()
    }

    /// The current user's own record, or the public profile of `username`
    /// when the owner call ends in an authorization failure.
    #[instrument(skip(self))]
    pub async fn own_profile_or_public(&self, username: &str) -> Result<User> {
        match self.pipeline.get_json::<User>(endpoints::ME).await {
            Ok(user) => Ok(user),
            Err(e) if e.is_unauthorized() && !username.is_empty() => {
                debug!(error = %e, "Owner profile unavailable, falling back to public profile");
                self.profile(username).await
            }
            Err(e) => Err(e),
        }
    }

    pub async fn follow(&self, username: &str) -> Result<Option<String>> {
        self.post_detail(endpoints::FOLLOW, &json!({ "username": username }))
            .await
    }

    pub async fn unfollow(&self, username: &str) -> Result<Option<String>> {
        self.post_detail(endpoints::UNFOLLOW, &json!({ "username": username }))
            .await
    }

    /// Usernames the current user follows.
    pub async fn following(&self) -> Result<Vec<String>> {
        let list: FollowingList = self.pipeline.get_json(endpoints::FOLLOWING).await?;
        Ok(list.following)
    }

    pub async fn user_followers(&self, username: &str) -> Result<Vec<String>> {
        let list: FollowersList = self
            .pipeline
            .execute(ApiRequest::get(endpoints::USER_FOLLOWERS).query("username", username))
            .await?
            .json()?;
        Ok(list.followers)
    }

    pub async fn user_following(&self, username: &str) -> Result<Vec<String>> {
        let list: FollowingList = self
            .pipeline
            .execute(ApiRequest::get(endpoints::USER_FOLLOWING).query("username", username))
            .await?
            .json()?;
        Ok(list.following)
    }

    pub async fn update_username(&self, username: &str) -> Result<Option<String>> {
        self.post_detail(endpoints::UPDATE_USERNAME, &json!({ "username": username }))
            .await
    }

    /// Change email and/or password. `current_password` is always required.
    pub async fn update_email_password(
        &self,
        current_password: &str,
        email: Option<&str>,
        new_password: Option<&str>,
    ) -> Result<Option<String>> {
        self.post_detail(
            endpoints::UPDATE_EMAIL_PASSWORD,
            &EmailPasswordUpdate {
                current_password,
                email,
                new_password,
            },
        )
        .await
    }

    /// Upload `path` as the current user's profile picture.
    ///
    /// Only jpeg, png, gif and webp files up to
    /// [`MAX_PROFILE_PICTURE_BYTES`] are sent; anything else fails with
    /// [`ClientError::InvalidUpload`] before touching the network.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn update_profile_picture(&self, path: &Path) -> Result<PictureUpdate> {
        let content_type = image_content_type(path).ok_or_else(|| {
            ClientError::InvalidUpload(format!(
                "{} is not a jpeg, png, gif or webp image",
                path.display()
            ))
        })?;
        let bytes = tokio::fs::read(path).await?;
        if bytes.len() > MAX_PROFILE_PICTURE_BYTES {
            return Err(ClientError::InvalidUpload(format!(
                "{} is larger than 5MB",
                path.display()
            )));
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| PROFILE_PICTURE_FIELD.to_string());

        debug!(bytes = bytes.len(), content_type, "Uploading profile picture");
        let request = ApiRequest::post(endpoints::UPDATE_PROFILE_PICTURE).file(FilePart {
            field: PROFILE_PICTURE_FIELD.to_string(),
            file_name,
            content_type: content_type.to_string(),
            bytes: bytes.into(),
        });
        self.pipeline.execute(request).await?.json()
    }

    async fn post_detail<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<String>> {
        let response: DetailResponse = self.pipeline.post_json(path, body).await?;
        Ok(response.detail)
    }
}

fn image_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::refresh::RefreshCoordinator;
    use crate::session::SessionState;
    use crate::store::{CredentialStore, StorageKey};
    use crate::testing::{MockTransport, reply};
    use reqwest::{Method, StatusCode};

    fn api(transport: Arc<MockTransport>, store: CredentialStore) -> SocialApi {
        let config = ClientConfig::default();
        let session = Arc::new(SessionState::new(None));
        let coordinator = Arc::new(RefreshCoordinator::new(
            transport.clone(),
            store.clone(),
            session.clone(),
            config.token_refresh_url.as_str(),
        ));
        SocialApi::new(Arc::new(RequestPipeline::new(
            transport,
            store,
            coordinator,
            session,
            config.exempt_paths,
        )))
    }

    fn post_json(id: u64, author: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": "hello",
            "content": "world",
            "author_username": author,
            "published_at": "2024-05-01T12:00:00Z",
            "like_count": 2,
            "is_liked": false
        })
    }

    #[tokio::test]
    async fn test_feed_and_following_filter() {
        let transport = Arc::new(MockTransport::new(|req| match req.path.as_str() {
            "posts/" => reply(
                StatusCode::OK,
                json!([post_json(1, "ana"), post_json(2, "bruno")]),
            ),
            "accounts/auth/following/" => reply(StatusCode::OK, json!({"following": ["bruno"]})),
            other => panic!("unexpected path {other}"),
        }));
        let api = api(transport, CredentialStore::in_memory());

        let posts = api.feed().await.unwrap();
        let following = api.following().await.unwrap();
        let visible = crate::models::FeedTab::Following.filter(&posts, &following);

        assert_eq!(posts.len(), 2);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].author_username, "bruno");
    }

    #[tokio::test]
    async fn test_posts_by_user_encodes_username() {
        let transport = Arc::new(MockTransport::new(|_| reply(StatusCode::OK, json!([]))));
        let api = api(transport.clone(), CredentialStore::in_memory());

        api.posts_by_user("ana maria").await.unwrap();
        assert_eq!(transport.calls()[0].path, "posts/user/ana%20maria/");
    }

    #[tokio::test]
    async fn test_like_returns_detail_and_sends_bearer() {
        let transport = Arc::new(MockTransport::new(|req| {
            assert_eq!(req.method, Method::POST);
            reply(StatusCode::CREATED, json!({"detail": "You liked this post"}))
        }));
        let store = CredentialStore::in_memory();
        store.set(StorageKey::Access, "a1");
        let api = api(transport.clone(), store);

        let detail = api.like(7).await.unwrap();
        assert_eq!(detail.as_deref(), Some("You liked this post"));
        let call = &transport.calls()[0];
        assert_eq!(call.path, "posts/7/like/");
        assert_eq!(call.bearer_token(), Some("a1"));
    }

    #[tokio::test]
    async fn test_add_comment_body() {
        let transport = Arc::new(MockTransport::new(|req| {
            assert_eq!(req.body.as_ref().unwrap()["content"], "nice");
            reply(
                StatusCode::CREATED,
                json!({"id": 3, "author_username": "ana", "content": "nice"}),
            )
        }));
        let api = api(transport, CredentialStore::in_memory());

        let comment = api.add_comment(1, "nice").await.unwrap();
        assert_eq!(comment.id, 3);
    }

    #[tokio::test]
    async fn test_profile_uses_query_parameter() {
        let transport = Arc::new(MockTransport::new(|req| {
            assert_eq!(req.query, vec![("username".to_string(), "bruno".to_string())]);
            reply(StatusCode::OK, json!({"username": "bruno", "is_following": true}))
        }));
        let api = api(transport, CredentialStore::in_memory());

        let user = api.profile("bruno").await.unwrap();
        assert_eq!(user.is_following, Some(true));
    }

    #[tokio::test]
    async fn test_own_profile_falls_back_to_public_on_401() {
        let transport = Arc::new(MockTransport::new(|req| match req.path.as_str() {
            "accounts/auth/me/" => reply(StatusCode::UNAUTHORIZED, json!({"detail": "expired"})),
            "accounts/auth/profile/" => reply(StatusCode::OK, json!({"username": "ana"})),
            other => panic!("unexpected path {other}"),
        }));
        let api = api(transport.clone(), CredentialStore::in_memory());

        let user = api.own_profile_or_public("ana").await.unwrap();
        assert_eq!(user.username, "ana");
        assert_eq!(transport.calls_to("accounts/auth/profile/"), 1);
    }

    #[tokio::test]
    async fn test_own_profile_other_errors_propagate() {
        let transport = Arc::new(MockTransport::new(|_| {
            reply(StatusCode::INTERNAL_SERVER_ERROR, json!({}))
        }));
        let api = api(transport.clone(), CredentialStore::in_memory());

        let err = api.own_profile_or_public("ana").await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_update_email_password_omits_absent_fields() {
        let transport = Arc::new(MockTransport::new(|req| {
            let body = req.body.as_ref().unwrap();
            assert_eq!(body["current_password"], "old");
            assert_eq!(body["new_password"], "newpass");
            assert!(body.get("email").is_none());
            reply(StatusCode::OK, json!({"detail": "Email and/or password updated successfully"}))
        }));
        let api = api(transport, CredentialStore::in_memory());

        let detail = api
            .update_email_password("old", None, Some("newpass"))
            .await
            .unwrap();
        assert!(detail.is_some());
    }

    #[tokio::test]
    async fn test_user_followers_not_found() {
        let transport = Arc::new(MockTransport::new(|_| {
            reply(StatusCode::NOT_FOUND, json!({"detail": "User not found"}))
        }));
        let api = api(transport, CredentialStore::in_memory());

        let err = api.user_followers("ghost").await.unwrap_err();
        assert_eq!(err.detail(), Some("User not found"));
    }

    #[tokio::test]
    async fn test_profile_picture_upload_is_replayed_after_refresh() {
        let transport = Arc::new(MockTransport::new(|req| {
            if req.path.ends_with("token/refresh/") {
                return reply(StatusCode::OK, json!({"access": "a2"}));
            }
            let file = req.file.as_ref().expect("multipart part");
            assert_eq!(file.field, "profile_picture");
            assert_eq!(file.file_name, "me.PNG");
            assert_eq!(file.content_type, "image/png");
            assert_eq!(&file.bytes[..], b"\x89PNG");
            match req.bearer_token() {
                Some("a2") => reply(
                    StatusCode::OK,
                    json!({"detail": "Profile picture updated successfully", "url": "/media/me.png"}),
                ),
                _ => reply(StatusCode::UNAUTHORIZED, json!({"detail": "expired"})),
            }
        }));
        let store = CredentialStore::in_memory();
        store.set(StorageKey::Access, "a1");
        store.set(StorageKey::Refresh, "r1");
        let api = api(transport.clone(), store);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("me.PNG");
        std::fs::write(&path, b"\x89PNG").unwrap();

        let update = api.update_profile_picture(&path).await.unwrap();

        assert_eq!(update.url.as_deref(), Some("/media/me.png"));
        assert_eq!(transport.calls_to(endpoints::UPDATE_PROFILE_PICTURE), 2);
    }

    #[tokio::test]
    async fn test_profile_picture_rejects_non_images_locally() {
        let transport = Arc::new(MockTransport::new(|_| reply(StatusCode::OK, json!({}))));
        let api = api(transport.clone(), CredentialStore::in_memory());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();

        let err = api.update_profile_picture(&path).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidUpload(_)));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_profile_picture_size_limit() {
        let transport = Arc::new(MockTransport::new(|_| reply(StatusCode::OK, json!({}))));
        let api = api(transport.clone(), CredentialStore::in_memory());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.jpg");
        std::fs::write(&path, vec![0u8; MAX_PROFILE_PICTURE_BYTES + 1]).unwrap();

        let err = api.update_profile_picture(&path).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidUpload(ref m) if m.contains("5MB")));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_profile_picture_missing_file() {
        let transport = Arc::new(MockTransport::new(|_| reply(StatusCode::OK, json!({}))));
        let api = api(transport, CredentialStore::in_memory());

        let err = api
            .update_profile_picture(Path::new("/nonexistent/me.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Io(_)));
    }
}
