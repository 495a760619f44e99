//! Feedline client: session-aware SDK for the Feedline social API.
//!
//! Every API call is authorized with the current access token. An expired
//! token is refreshed transparently, concurrent authorization failures share
//! a single refresh call, and an unrecoverable refresh logs the session out.
//!
//! ## Core Types
//!
//! - [`FeedlineClient`] - Facade wiring everything below together
//! - [`SessionContext`] - Login, registration, logout and current user
//! - [`SocialApi`] - Feed, posts, comments and follow graph
//! - [`RequestPipeline`] - Bearer attachment and 401 recovery
//! - [`RefreshCoordinator`] - At most one refresh in flight, FIFO waiters
//! - [`CredentialStore`] - Durable mirror of the session
//!
//! ## Storage
//!
//! - [`MemoryBackend`] - Process-local storage
//! - [`FileBackend`] - JSON file storage that survives restarts

pub mod api;
pub mod avatar;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod refresh;
pub mod session;
pub mod store;
pub mod transport;

#[cfg(test)]
mod testing;

pub use api::{MAX_PROFILE_PICTURE_BYTES, SocialApi};
pub use avatar::{DEFAULT_AVATAR, resolve_avatar};
pub use client::FeedlineClient;
pub use config::{ClientConfig, endpoints};
pub use error::{ClientError, RefreshError, Result};
pub use models::{
    AuthResponse, Comment, CredentialPair, FeedTab, FieldErrors, NewPost, PictureUpdate, Post,
    Profile, RegisterPayload, User,
};
pub use pipeline::{PendingRequest, RequestPipeline};
pub use refresh::{RefreshCoordinator, RefreshOutcome};
pub use session::{SessionContext, SessionEvent, SessionSnapshot, SessionState};
pub use store::{
    CredentialStore, FileBackend, MemoryBackend, StorageBackend, StorageKey, StoreError,
};
pub use transport::{
    ApiRequest, ApiResponse, FilePart, HttpTransport, Transport, install_rustls_provider,
};
