use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use reelmark_core::models::{Profile, ProfilePatch, Session};

use super::error::BackendError;

// ── Auth responses ──────────────────────────────────────────────

/// Token grant response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Absolute expiry, unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub user: Option<User>,
}

impl TokenResponse {
    pub fn into_session(self, now: DateTime<Utc>) -> Result<Session, BackendError> {
        let user = self
            .user
            .ok_or_else(|| BackendError::Parse("token response without user".into()))?;
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| self.expires_in.map(|secs| now + Duration::seconds(secs)));
        Ok(Session {
            user_id: user.id,
            email: user.email,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn into_profile(self) -> Profile {
        Profile {
            user_id: self.id,
            email: self.email,
            username: self.user_metadata.username,
            full_name: self.user_metadata.full_name,
            avatar_url: self.user_metadata.avatar_url,
            updated_at: self.updated_at,
        }
    }
}

/// Profile fields kept in the user's metadata blob.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Sign-up returns a token grant when the project auto-confirms, a bare
/// user otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SignUpResponse {
    Session(TokenResponse),
    User(User),
}

// ── Request bodies ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct Credentials<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateUserRequest<'a> {
    pub data: &'a ProfilePatch,
}

// ── Errors ──────────────────────────────────────────────────────

/// Error body shapes of the auth, rest and storage services.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl ErrorBody {
    /// Most specific human-readable message, or the raw body.
    pub fn message_from(body: String) -> String {
        let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
        let message = parsed
            .error_description
            .or(parsed.msg)
            .or(parsed.message)
            .or(parsed.error);
        match (message, parsed.hint) {
            (Some(m), Some(hint)) => format!("{m} ({hint})"),
            (Some(m), None) => m,
            (None, _) => body,
        }
    }
}

/// Parse the project URL so relative joins keep its path.
pub(crate) fn base_url(raw: &str) -> Result<Url, BackendError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(BackendError::Auth("backend URL is not configured".into()));
    }
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&with_slash).map_err(|e| BackendError::Parse(format!("backend URL: {e}")))
}
