//! Access token refresh coordination.
//!
//! The coordinator is a two-state machine, `Idle` and `Refreshing`. The first
//! caller that hits an authorization failure while `Idle` becomes the leader
//! and performs the single refresh call; every caller arriving while
//! `Refreshing` gets a oneshot waiter appended to a FIFO queue. When the
//! refresh settles the outcome is persisted, then handed to each waiter in
//! enqueue order, and the state returns to `Idle`.
//!
//! The state lock is never held across an `.await`, so each transition is
//! atomic with respect to the other callers.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use crate::error::RefreshError;
use crate::models::{CredentialPair, RefreshRequest, RefreshResponse};
use crate::session::{SessionEvent, SessionState};
use crate::store::{CredentialStore, StorageKey};
use crate::transport::{ApiRequest, Transport};

/// New access token, or why none could be obtained.
pub type RefreshOutcome = Result<String, RefreshError>;

enum RefreshState {
    Idle,
    Refreshing {
        waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
    },
}

/// `epoch` is the session epoch observed when the role was assigned.
enum Role {
    Leader { refresh_token: String, epoch: u64 },
    Follower(oneshot::Receiver<RefreshOutcome>),
    NoRefreshToken { epoch: u64 },
}

/// Serializes token refreshes so that concurrent 401s cost one round-trip.
pub struct RefreshCoordinator {
    transport: Arc<dyn Transport>,
    store: CredentialStore,
    session: Arc<SessionState>,
    refresh_url: String,
    state: Mutex<RefreshState>,
    refresh_calls: AtomicU64,
}

impl RefreshCoordinator {
    /// `transport` must be the raw transport, not the request pipeline.
    pub fn new(
        transport: Arc<dyn Transport>,
        store: CredentialStore,
        session: Arc<SessionState>,
        refresh_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            store,
            session,
            refresh_url: refresh_url.into(),
            state: Mutex::new(RefreshState::Idle),
            refresh_calls: AtomicU64::new(0),
        }
    }

    /// Obtain a new access token, joining the in-flight refresh if there is one.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> RefreshOutcome {
        let role = {
            let mut state = self.state.lock();
            match &mut *state {
                RefreshState::Refreshing { waiters } => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push_back(tx);
                    debug!(queued = waiters.len(), "Refresh in flight, queueing caller");
                    Role::Follower(rx)
                }
                RefreshState::Idle => {
                    let epoch = self.session.epoch();
                    match self.store.get(StorageKey::Refresh) {
                        Some(refresh_token) => {
                            *state = RefreshState::Refreshing {
                                waiters: VecDeque::new(),
                            };
                            Role::Leader {
                                refresh_token,
                                epoch,
                            }
                        }
                        None => Role::NoRefreshToken { epoch },
                    }
                }
            }
        };

        match role {
            Role::NoRefreshToken { epoch } => {
                warn!("Missing refresh token - cannot refresh, clearing session");
                let err = RefreshError::MissingRefreshToken;
                self.expire(epoch, &err);
                Err(err)
            }
            Role::Follower(rx) => rx.await.unwrap_or(Err(RefreshError::Abandoned)),
            Role::Leader {
                refresh_token,
                epoch,
            } => {
                let in_flight = InFlight {
                    coordinator: self,
                    settled: false,
                };
                let outcome = match self.exchange(&refresh_token).await {
                    Ok(body) => self.persist(body, refresh_token, epoch),
                    Err(e) => {
                        warn!(error = %e, relogin = e.requires_relogin(), "Token refresh failed");
                        self.expire(epoch, &e);
                        Err(e)
                    }
                };
                in_flight.settle(outcome.clone());
                outcome
            }
        }
    }

    /// Whether a refresh call is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.state.lock(), RefreshState::Refreshing { .. })
    }

    /// Number of callers waiting on the in-flight refresh.
    pub fn queued(&self) -> usize {
        match &*self.state.lock() {
            RefreshState::Refreshing { waiters } => waiters.len(),
            RefreshState::Idle => 0,
        }
    }

    /// Total refresh calls sent since construction.
    pub fn refresh_calls(&self) -> u64 {
        self.refresh_calls.load(Ordering::Relaxed)
    }

    async fn exchange(&self, refresh_token: &str) -> Result<RefreshResponse, RefreshError> {
        let request = ApiRequest::post(self.refresh_url.as_str())
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .map_err(|e| RefreshError::Decode(e.to_string()))?;

        self.refresh_calls.fetch_add(1, Ordering::Relaxed);
        info!("Refreshing access token");

        let response = self
            .transport
            .send(&request)
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        if !response.is_success() {
            return Err(RefreshError::Rejected {
                status: response.status,
                detail: response.detail(),
            });
        }

        response
            .json::<RefreshResponse>()
            .map_err(|e| RefreshError::Decode(e.to_string()))
    }

    /// Store the new pair, carrying over the old refresh token when the
    /// server did not rotate it.
    ///
    /// Nothing is written if the session was logged out or replaced while the
    /// exchange was in flight.
    fn persist(
        &self,
        body: RefreshResponse,
        previous_refresh: String,
        epoch: u64,
    ) -> RefreshOutcome {
        let pair = CredentialPair {
            access: body.access,
            refresh: body.refresh.unwrap_or(previous_refresh),
        };
        let access = pair.access.clone();

        if !self.session.commit_refresh(epoch, &self.store, pair) {
            info!("Session ended during refresh, discarding new tokens");
            return Err(RefreshError::SessionEnded);
        }
        self.session.emit(SessionEvent::Refreshed);
        info!("Access token refreshed");
        Ok(access)
    }

    fn expire(&self, epoch: u64, cause: &RefreshError) {
        if !self.session.expire(epoch, &self.store, cause) {
            debug!("Session already replaced, leaving it intact");
        }
    }

    /// Return to `Idle` and hand `outcome` to every waiter, oldest first.
    fn settle(&self, outcome: RefreshOutcome) {
        let waiters = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing { waiters } => waiters,
                RefreshState::Idle => VecDeque::new(),
            }
        };

        if !waiters.is_empty() {
            debug!(waiters = waiters.len(), ok = outcome.is_ok(), "Releasing queued callers");
        }
        for waiter in waiters {
            // A dropped receiver just means that caller went away.
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Settles the refresh even if the leader's future is dropped mid-flight.
struct InFlight<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(mut self, outcome: RefreshOutcome) {
        self.settled = true;
        self.coordinator.settle(outcome);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Refresh dropped before completion; releasing queued callers");
            self.coordinator.settle(Err(RefreshError::Abandoned));
        }
    }
}
