//! REST API client module for the GNSS archive service.
//!
//! The service uses JWT bearer authentication: `POST /token/` issues an
//! access/refresh pair and every business endpoint expects the access token.
//! `ApiClient` wraps each call in the refresh-and-retry pipeline from
//! [`crate::auth::refresh`].

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
