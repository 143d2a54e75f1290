//! Client library for the GNSS observation data archive.
//!
//! The archive service exposes JWT-authenticated endpoints for querying
//! station file listings and downloading generated archive bundles. This
//! crate wraps them behind an authenticated request pipeline that refreshes
//! an expired access token at most once per failure episode and retries the
//! original request transparently.
//!
//! Layering, bottom up:
//! - [`auth::CredentialStore`]: owns the access/refresh token pair
//! - [`api::ApiClient`]: dispatches requests with the bearer token attached
//! - [`auth::RefreshCoordinator`]: serializes refresh episodes across
//!   concurrent failures
//! - [`flow::ArchiveFlow`]: the two-phase create-then-fetch download workflow
//! - [`download::Materializer`]: stages binary payloads into user-facing
//!   files with guaranteed cleanup

pub mod api;
pub mod auth;
pub mod config;
pub mod download;
pub mod flow;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{CredentialStore, FileCredentialStore, MemoryCredentialStore, SessionEvent, TokenPair};
pub use config::Config;
pub use download::Materializer;
pub use flow::{ArchiveFlow, DownloadOutcome};
