//! Token refresh coordination.
//!
//! A 401 on a first-attempt request opens a refresh episode: the refresh
//! token is exchanged for a new access token and the original request is
//! replayed once. Episodes are serialized through a mutex-guarded generation
//! counter so that N requests failing concurrently produce exactly one
//! refresh call; late entrants observe the bumped generation and retry with
//! the token that episode stored.
//!
//! Refresh failure is terminal for the session: the store is cleared and a
//! `SessionEvent::Invalidated` is broadcast. Navigation (or any other
//! reaction) is left to the subscriber.

use std::future::Future;
use std::sync::Arc;

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::auth::store::{CredentialStore, TokenPair};

/// Capacity of the session event channel. Events are tiny and consumers are
/// expected to react immediately; a small buffer is enough.
const EVENT_CHANNEL_CAPACITY: usize = 8;

/// Whether a request has already been replayed after a refresh.
///
/// Carried alongside the request descriptor instead of mutating a flag on
/// the request itself; a request is retried at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    Retried,
}

/// Session lifecycle notifications for the consuming UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The refresh token was rejected or missing; both tokens have been
    /// cleared and the user must authenticate again.
    Invalidated,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

/// Serializes refresh episodes and owns the session-invalidation channel.
pub struct RefreshCoordinator {
    http: Client,
    refresh_url: String,
    store: Arc<dyn CredentialStore>,
    /// Episode generation. Held across the whole refresh call so concurrent
    /// 401s queue here instead of issuing their own refresh.
    episode: Mutex<u64>,
    events: broadcast::Sender<SessionEvent>,
}

impl RefreshCoordinator {
    pub fn new(http: Client, base_url: &str, store: Arc<dyn CredentialStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            http,
            refresh_url: format!("{}/token/refresh/", base_url.trim_end_matches('/')),
            store,
            episode: Mutex::new(0),
            events,
        }
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// The current episode generation. Callers snapshot this before
    /// dispatching a request; on a 401 the snapshot tells the coordinator
    /// whether a refresh already completed in the meantime.
    pub async fn generation(&self) -> u64 {
        *self.episode.lock().await
    }

    /// Handle a 401 observed on a first-attempt request.
    ///
    /// Returns `Ok(())` when the caller should retry with the token now in
    /// the store, either because this call performed a refresh or because
    /// another episode completed one since `seen` was snapshotted.
    pub async fn refresh(&self, seen: u64) -> Result<(), ApiError> {
        let http = self.http.clone();
        let url = self.refresh_url.clone();
        self.refresh_with(seen, move |refresh| Self::exchange(http, url, refresh))
            .await
    }

    /// Exchange the refresh token for a new access token.
    async fn exchange(http: Client, url: String, refresh: String) -> Result<String, ApiError> {
        let response = http
            .post(&url)
            .json(&serde_json::json!({ "refresh": refresh }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Refresh endpoint rejected the refresh token");
            return Err(ApiError::upstream(status, &body));
        }

        let parsed: RefreshResponse = response.json().await?;
        Ok(parsed.access)
    }

    /// Run one request through the refresh-and-retry pipeline: dispatch,
    /// and on an unauthorized first attempt run one refresh episode and
    /// replay the request exactly once. An unauthorized response on the
    /// replayed attempt is returned as-is.
    pub(crate) async fn run<R, D, DFut>(
        &self,
        dispatch: D,
        unauthorized: impl Fn(&R) -> bool,
    ) -> Result<R, ApiError>
    where
        D: FnMut(Attempt) -> DFut,
        DFut: Future<Output = Result<R, ApiError>>,
    {
        let http = self.http.clone();
        let url = self.refresh_url.clone();
        self.run_with(
            dispatch,
            move |refresh| Self::exchange(http, url, refresh),
            unauthorized,
        )
        .await
    }

    /// Pipeline core, generic over the dispatch and refresh calls the same
    /// way `refresh_with` is, so the attempt ordering can be tested without
    /// a server. The straight-line shape is the retry invariant: a request
    /// is dispatched as `First`, replayed at most once as `Retried`.
    pub(crate) async fn run_with<R, D, DFut, F, FFut>(
        &self,
        mut dispatch: D,
        refresh_call: F,
        unauthorized: impl Fn(&R) -> bool,
    ) -> Result<R, ApiError>
    where
        D: FnMut(Attempt) -> DFut,
        DFut: Future<Output = Result<R, ApiError>>,
        F: FnOnce(String) -> FFut,
        FFut: Future<Output = Result<String, ApiError>>,
    {
        // Snapshot before dispatch: if a refresh completes while this
        // request is in flight, the episode sees the stale snapshot and
        // skips a second refresh.
        let seen = self.generation().await;
        let response = dispatch(Attempt::First).await?;
        if !unauthorized(&response) {
            return Ok(response);
        }

        debug!("Unauthorized on first attempt, entering refresh episode");
        self.refresh_with(seen, refresh_call).await?;
        dispatch(Attempt::Retried).await
    }

    /// Episode core, generic over the actual refresh call so tests can count
    /// invocations without a server.
    pub(crate) async fn refresh_with<F, Fut>(&self, seen: u64, call: F) -> Result<(), ApiError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<String, ApiError>>,
    {
        let mut generation = self.episode.lock().await;

        if *generation != seen {
            // Another episode completed while this request was in flight or
            // waiting on the lock; its token is already in the store.
            debug!(seen, current = *generation, "Attaching to completed refresh episode");
            return Ok(());
        }

        let Some(pair) = self.store.get() else {
            warn!("401 received with no refresh token stored");
            self.invalidate();
            return Err(ApiError::RefreshFailure);
        };

        match call(pair.refresh.clone()).await {
            Ok(access) => {
                self.store.set(TokenPair {
                    access,
                    refresh: pair.refresh,
                });
                *generation += 1;
                info!(generation = *generation, "Access token refreshed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, invalidating session");
                self.invalidate();
                Err(ApiError::RefreshFailure)
            }
        }
    }

    fn invalidate(&self) {
        self.store.clear();
        // No subscriber is fine; the CLI reacts to the returned error.
        let _ = self.events.send(SessionEvent::Invalidated);
    }
}
