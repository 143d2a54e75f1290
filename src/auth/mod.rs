//! Authentication module for managing the session token pair.
//!
//! This module provides:
//! - `CredentialStore`: ownership of the access/refresh token pair, with
//!   file-backed and in-memory implementations
//! - `RefreshCoordinator`: serialized token refresh with at most one refresh
//!   call per failure episode
//!
//! Tokens are opaque strings issued by the archive's `/token/` endpoints.

pub mod refresh;
pub mod store;

pub use refresh::{Attempt, RefreshCoordinator, SessionEvent};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore, TokenPair};
