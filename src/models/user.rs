use serde::{Deserialize, Serialize};

/// User record returned by `GET /users/me/`.
///
/// `is_active` gates archive downloads: accounts stay inactive until the
/// email confirmation link is followed.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub email: String,
    pub user_name: String,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub is_staff: bool,
    pub is_active: bool,
}

/// Body of `POST /users/register/`. The server re-checks the password
/// match; the client checks it first to avoid a pointless round trip.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationForm {
    pub email: String,
    pub user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    pub password: String,
    pub password2: String,
}

impl RegistrationForm {
    pub fn passwords_match(&self) -> bool {
        self.password == self.password2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_profile() {
        let json = r#"{
            "email": "user@example.org",
            "user_name": "observer",
            "organization": "IAC",
            "start_date": "2024-03-01T00:00:00Z",
            "is_staff": false,
            "is_active": true
        }"#;
        let profile: UserProfile = serde_json::from_str(json).expect("parse profile");
        assert_eq!(profile.user_name, "observer");
        assert!(profile.is_active);
    }

    #[test]
    fn parse_profile_without_optional_fields() {
        let json = r#"{"email": "u@e.org", "user_name": "u", "is_active": false}"#;
        let profile: UserProfile = serde_json::from_str(json).expect("parse profile");
        assert!(profile.organization.is_none());
        assert!(!profile.is_active);
    }
}
