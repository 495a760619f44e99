//! Wire models for the Feedline API.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access/refresh token pair.
///
/// Both tokens are opaque and passed verbatim.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access: String,
    pub refresh: String,
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A user record as returned by `me/`, `profile/`, login and register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub following_count: Option<u64>,
    /// Only meaningful when viewing another user's profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_following: Option<bool>,
}

impl User {
    /// Raw avatar reference, if the server sent one.
    pub fn profile_picture(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .and_then(|p| p.profile_picture.as_deref())
    }
}

/// Body of a successful login or registration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access: String,
    pub refresh: String,
    pub user: User,
}

impl AuthResponse {
    pub fn credentials(&self) -> CredentialPair {
        CredentialPair {
            access: self.access.clone(),
            refresh: self.refresh.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Registration form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterPayload {
    pub username: String,
    pub email: String,
    /// National id (CPF) in the format the server validates.
    #[serde(rename = "cpf")]
    pub national_id: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Body of the token refresh endpoint. `refresh` is only present when the
/// server rotates refresh tokens.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Field-level validation errors returned by registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrors {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub username: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub email: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cpf: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub password: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub non_field_errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl FieldErrors {
    /// Iterate over `(field, message)` pairs in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        let fields: [(&'static str, &Vec<String>); 5] = [
            ("username", &self.username),
            ("email", &self.email),
            ("cpf", &self.cpf),
            ("password", &self.password),
            ("non_field_errors", &self.non_field_errors),
        ];
        fields
            .into_iter()
            .flat_map(|(name, msgs)| msgs.iter().map(move |m| (name, m.as_str())))
            .chain(self.detail.as_deref().map(|d| ("detail", d)))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", field, message)?;
            first = false;
        }
        if first {
            f.write_str("no details")?;
        }
        Ok(())
    }
}

/// Answer to a profile picture upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PictureUpdate {
    #[serde(default)]
    pub detail: Option<String>,
    /// Server path of the stored picture.
    #[serde(default)]
    pub url: Option<String>,
}

/// Generic `{"detail": "..."}` error or acknowledgement body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailResponse {
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub author_username: String,
    #[serde(default)]
    pub author_profile_picture: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub is_liked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub author_username: String,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct FollowingList {
    #[serde(default)]
    pub following: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct FollowersList {
    #[serde(default)]
    pub followers: Vec<String>,
}

/// Which slice of the feed to show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedTab {
    #[default]
    ForYou,
    Following,
}

impl FeedTab {
    /// Filter a feed down to this tab. `following` holds the usernames the
    /// current user follows.
    pub fn filter<'a>(&self, posts: &'a [Post], following: &[String]) -> Vec<&'a Post> {
        match self {
            Self::ForYou => posts.iter().collect(),
            Self::Following => posts
                .iter()
                .filter(|p| following.iter().any(|u| *u == p.author_username))
                .collect(),
        }
    }
}
