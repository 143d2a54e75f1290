use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Maximum length for error response bodies carried in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Locally detectable problem (empty station set, password mismatch,
    /// not logged in). No network call is needed to produce this.
    #[error("{0}")]
    Validation(String),

    /// 401 on a path that is not eligible for refresh. The session has
    /// been cleared.
    #[error("Unauthorized - please log in again")]
    Unauthorized,

    /// The refresh token itself was rejected or missing. Terminal: both
    /// tokens have been cleared and the user must authenticate again.
    #[error("Session expired - please log in again")]
    RefreshFailure,

    /// Server-reported failure on a business endpoint, surfaced verbatim.
    #[error("Server error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// The archive binary fetch failed after archive creation succeeded.
    /// The archive descriptor remains valid; only the download step failed.
    #[error("Archive download failed with status {status}")]
    Download { status: u16 },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error body shape used by the archive endpoints: `{"error": "..."}`.
/// The token endpoints use DRF's `{"detail": "..."}` instead.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "detail")]
    error: String,
}

impl ApiError {
    /// Truncate a response body to avoid carrying excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..MAX_ERROR_BODY_LENGTH],
                body.len()
            )
        }
    }

    /// Build an `Upstream` error from a non-success response, preferring the
    /// server's `{"error": ...}` message over the raw body.
    pub fn upstream(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .map(|b| b.error)
            .unwrap_or_else(|_| Self::truncate_body(body));
        ApiError::Upstream {
            status: status.as_u16(),
            message,
        }
    }

    /// Map a non-success registration response. The registration endpoint
    /// returns field-keyed validation errors (`{"email": ["..."], ...}`) for
    /// 400s and `{"message": ...}` otherwise.
    pub fn registration(status: StatusCode, body: &str) -> Self {
        #[derive(Deserialize)]
        struct RegistrationErrors {
            message: Option<String>,
            #[serde(default)]
            email: Vec<String>,
            #[serde(default)]
            user_name: Vec<String>,
            #[serde(default)]
            password: Vec<String>,
        }

        if let Ok(errors) = serde_json::from_str::<RegistrationErrors>(body) {
            let field_message = errors
                .email
                .first()
                .or_else(|| errors.user_name.first())
                .or_else(|| errors.password.first())
                .cloned()
                .or(errors.message);
            if let Some(message) = field_message {
                return ApiError::Validation(message);
            }
        }
        Self::upstream(status, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_prefers_server_error_message() {
        let err = ApiError::upstream(
            StatusCode::BAD_REQUEST,
            r#"{"error": "No stations selected"}"#,
        );
        match err {
            ApiError::Upstream { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "No stations selected");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn upstream_falls_back_to_raw_body() {
        let err = ApiError::upstream(StatusCode::INTERNAL_SERVER_ERROR, "<html>boom</html>");
        match err {
            ApiError::Upstream { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "<html>boom</html>");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn upstream_truncates_long_bodies() {
        let body = "x".repeat(2000);
        let err = ApiError::upstream(StatusCode::INTERNAL_SERVER_ERROR, &body);
        match err {
            ApiError::Upstream { message, .. } => {
                assert!(message.len() < body.len());
                assert!(message.contains("truncated"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn registration_surfaces_first_field_error() {
        let err = ApiError::registration(
            StatusCode::BAD_REQUEST,
            r#"{"email": ["user with this email already exists."], "user_name": ["taken"]}"#,
        );
        match err {
            ApiError::Validation(message) => {
                assert_eq!(message, "user with this email already exists.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
