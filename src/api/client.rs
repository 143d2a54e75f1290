//! API client for the GNSS archive service.
//!
//! `ApiClient` is the request dispatcher: it attaches the current access
//! token as a bearer header and sends each business call through the
//! refresh-and-retry pipeline. Endpoint methods return domain types from
//! [`crate::models`].

use std::sync::Arc;

use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::auth::{Attempt, CredentialStore, RefreshCoordinator, SessionEvent, TokenPair};
use crate::models::{ArchiveDescriptor, RegistrationForm, StationQueryResult, UserProfile};

use super::ApiError;

/// HTTP request timeout in seconds.
/// Generous enough for archive creation, which copies files server-side
/// before responding.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Date format expected by the query and download endpoints
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access: String,
    refresh: String,
}

/// Replayable description of one outbound call. Captured once so that a
/// request failing with a 401 can be re-dispatched after the refresh
/// episode completes.
#[derive(Debug, Clone)]
struct RequestSpec {
    method: Method,
    url: String,
    body: Option<serde_json::Value>,
}

/// Clone is cheap - reqwest::Client uses Arc internally for connection
/// pooling, and the store and coordinator are shared.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    /// Create a client against `base_url` with the given credential store.
    /// The store is injected (never read ambiently) so tests can substitute
    /// an in-memory fake.
    pub fn new(base_url: &str, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        let base_url = base_url.trim_end_matches('/').to_string();
        let coordinator = Arc::new(RefreshCoordinator::new(
            http.clone(),
            &base_url,
            store.clone(),
        ));

        Ok(Self {
            http,
            base_url,
            store,
            coordinator,
        })
    }

    /// Subscribe to session lifecycle events (terminal refresh failures).
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.coordinator.subscribe()
    }

    /// Whether a token pair is currently stored. Does not verify the tokens.
    pub fn is_authenticated(&self) -> bool {
        self.store.get().is_some()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Issue one request with the current access token attached when
    /// present. Unauthenticated requests are still permitted; public
    /// endpoints accept them.
    async fn dispatch(&self, spec: &RequestSpec) -> Result<Response, ApiError> {
        let mut request = self.http.request(spec.method.clone(), &spec.url);
        if let Some(pair) = self.store.get() {
            request = request.bearer_auth(&pair.access);
        }
        if let Some(ref body) = spec.body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// The authenticated request pipeline: dispatch, and on a 401 run one
    /// refresh episode and replay the request exactly once. A 401 on the
    /// replayed attempt is surfaced unchanged by `check_response`.
    async fn send(&self, spec: RequestSpec) -> Result<Response, ApiError> {
        self.coordinator
            .run(
                |attempt| {
                    if attempt == Attempt::Retried {
                        debug!(url = %spec.url, "Replaying request after refresh");
                    }
                    self.dispatch(&spec)
                },
                |response| response.status() == StatusCode::UNAUTHORIZED,
            )
            .await
    }

    /// Map a non-success response to an error with the server's message.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else if status == StatusCode::UNAUTHORIZED {
            Err(ApiError::Unauthorized)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::upstream(status, &body))
        }
    }

    // ===== Authentication endpoints =====

    /// Exchange email/password for a token pair and store it.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.endpoint("/token/"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::upstream(status, &body));
        }

        let tokens: TokenResponse = response.json().await?;
        self.store.set(TokenPair {
            access: tokens.access,
            refresh: tokens.refresh,
        });
        info!(email, "Logged in");
        Ok(())
    }

    /// Register a new account. The password match is checked locally first;
    /// server-side field errors come back as `ApiError::Validation`.
    pub async fn register(&self, form: &RegistrationForm) -> Result<(), ApiError> {
        if !form.passwords_match() {
            return Err(ApiError::Validation("Passwords don't match".to_string()));
        }

        let response = self
            .http
            .post(self.endpoint("/users/register/"))
            .json(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::registration(status, &body));
        }

        info!(email = %form.email, "Account registered");
        Ok(())
    }

    /// Fetch the current user's profile.
    ///
    /// Deliberately bypasses the refresh pipeline: a 401 here clears the
    /// session immediately, matching the service's session-probe semantics
    /// (the profile call doubles as "am I still logged in?").
    pub async fn me(&self) -> Result<UserProfile, ApiError> {
        let spec = RequestSpec {
            method: Method::GET,
            url: self.endpoint("/users/me/"),
            body: None,
        };
        let response = self.dispatch(&spec).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!("Profile fetch unauthorized, clearing session");
            self.store.clear();
            return Err(ApiError::Unauthorized);
        }

        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }

    /// Drop the stored token pair. Client-side only; the server keeps no
    /// session state.
    pub fn logout(&self) {
        self.store.clear();
        info!("Logged out");
    }

    // ===== Archive endpoints =====

    /// List available files per station for a date range.
    pub async fn query_stations(
        &self,
        stations: &[String],
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    ) -> Result<StationQueryResult, ApiError> {
        let spec = RequestSpec {
            method: Method::POST,
            url: self.endpoint("/stations/"),
            body: Some(json!({
                "stations": stations,
                "startDate": start.format(DATE_FORMAT).to_string(),
                "endDate": end.format(DATE_FORMAT).to_string(),
            })),
        };
        let response = Self::check_response(self.send(spec).await?).await?;
        Ok(response.json().await?)
    }

    /// Request server-side creation of an archive bundle.
    pub async fn create_archive(
        &self,
        stations: &[String],
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    ) -> Result<ArchiveDescriptor, ApiError> {
        let spec = RequestSpec {
            method: Method::POST,
            url: self.endpoint("/download/"),
            body: Some(json!({
                "stations": stations,
                "startDate": start.format(DATE_FORMAT).to_string(),
                "endDate": end.format(DATE_FORMAT).to_string(),
            })),
        };
        let response = Self::check_response(self.send(spec).await?).await?;
        let descriptor: ArchiveDescriptor = response.json().await?;
        info!(
            archive = %descriptor.archive_name,
            files = descriptor.file_count,
            "Archive created"
        );
        Ok(descriptor)
    }

    /// Fetch the archive binary from the descriptor's download URL.
    /// Non-success here is a `Download` error: archive creation already
    /// succeeded and the descriptor stays valid.
    pub async fn fetch_archive_binary(&self, download_url: &str) -> Result<Vec<u8>, ApiError> {
        let spec = RequestSpec {
            method: Method::GET,
            url: download_url.to_string(),
            body: None,
        };
        let response = self.send(spec).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Download {
                status: status.as_u16(),
            });
        }

        let payload = response.bytes().await?;
        debug!(bytes = payload.len(), "Archive binary fetched");
        Ok(payload.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryCredentialStore;

    fn client() -> ApiClient {
        ApiClient::new(
            "https://archive.test/api/",
            Arc::new(MemoryCredentialStore::new()),
        )
        .expect("client")
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let client = client();
        assert_eq!(client.endpoint("/token/"), "https://archive.test/api/token/");
    }

    #[test]
    fn is_authenticated_tracks_store() {
        let store = Arc::new(MemoryCredentialStore::new());
        let client = ApiClient::new("https://archive.test/api", store.clone()).expect("client");
        assert!(!client.is_authenticated());

        store.set(TokenPair {
            access: "a".to_string(),
            refresh: "r".to_string(),
        });
        assert!(client.is_authenticated());
    }

    #[tokio::test]
    async fn check_response_maps_401_to_unauthorized() {
        let response: Response = http::Response::builder()
            .status(401)
            .body(r#"{"detail": "Token is invalid or expired"}"#)
            .expect("response")
            .into();

        let result = ApiClient::check_response(response).await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn check_response_surfaces_upstream_message() {
        let response: Response = http::Response::builder()
            .status(404)
            .body(r#"{"error": "Files not found"}"#)
            .expect("response")
            .into();

        match ApiClient::check_response(response).await {
            Err(ApiError::Upstream { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "Files not found");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
