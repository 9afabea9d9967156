use chrono::Utc;
use reqwest::{Client, RequestBuilder};
use url::Url;

use reelmark_core::models::{Profile, ProfilePatch, Session};

use super::error::BackendError;
use super::types::{
    base_url, Credentials, ErrorBody, RefreshRequest, SignUpResponse, TokenResponse,
    UpdateUserRequest, User,
};
use crate::traits::{AuthService, SignUpOutcome};

/// Email/password client for the backend's auth service (`/auth/v1`).
#[derive(Debug, Clone)]
pub struct AuthClient {
    http: Client,
    base: Url,
    anon_key: String,
}

impl AuthClient {
    pub fn new(backend_url: &str, anon_key: impl Into<String>) -> Result<Self, BackendError> {
        Ok(Self {
            http: Client::new(),
            base: base_url(backend_url)?,
            anon_key: anon_key.into(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, BackendError> {
        self.base
            .join("auth/v1/")
            .and_then(|u| u.join(path))
            .map_err(|e| BackendError::Parse(e.to_string()))
    }

    fn request(&self, builder: RequestBuilder, access_token: Option<&str>) -> RequestBuilder {
        let builder = builder.header("apikey", &self.anon_key);
        match access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder.bearer_auth(&self.anon_key),
        }
    }

    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = ErrorBody::message_from(resp.text().await.unwrap_or_default());
        tracing::warn!(status = status.as_u16(), %message, "Auth API error");
        match status.as_u16() {
            400 | 401 | 403 | 422 => Err(BackendError::Auth(message)),
            status => Err(BackendError::Api { status, message }),
        }
    }

    async fn token_grant<B: serde::Serialize + ?Sized>(
        &self,
        grant_type: &str,
        body: &B,
    ) -> Result<Session, BackendError> {
        let resp = self
            .request(self.http.post(self.url("token")?), None)
            .query(&[("grant_type", grant_type)])
            .json(body)
            .send()
            .await?;
        let resp = Self::check_response(resp).await?;
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;
        token.into_session(Utc::now())
    }
}

impl AuthService for AuthClient {
    type Error = BackendError;

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, BackendError> {
        let resp = self
            .request(self.http.post(self.url("signup")?), None)
            .json(&Credentials { email, password })
            .send()
            .await?;
        let resp = Self::check_response(resp).await?;
        let body: SignUpResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;
        match body {
            SignUpResponse::Session(token) => {
                Ok(SignUpOutcome::SignedIn(token.into_session(Utc::now())?))
            }
            SignUpResponse::User(user) => {
                tracing::info!(user_id = %user.id, "Sign-up pending email confirmation");
                Ok(SignUpOutcome::ConfirmationRequired {
                    user_id: user.id,
                    email: user.email,
                })
            }
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        self.token_grant("password", &Credentials { email, password })
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, BackendError> {
        self.token_grant("refresh_token", &RefreshRequest { refresh_token })
            .await
    }

    async fn user(&self, access_token: &str) -> Result<Profile, BackendError> {
        let resp = self
            .request(self.http.get(self.url("user")?), Some(access_token))
            .send()
            .await?;
        let resp = Self::check_response(resp).await?;
        let user: User = resp
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;
        Ok(user.into_profile())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let resp = self
            .request(self.http.post(self.url("logout")?), Some(access_token))
            .send()
            .await?;
        Self::check_response(resp).await?;
        Ok(())
    }

    async fn update_profile(
        &self,
        access_token: &str,
        patch: &ProfilePatch,
    ) -> Result<Profile, BackendError> {
        let resp = self
            .request(self.http.put(self.url("user")?), Some(access_token))
            .json(&UpdateUserRequest { data: patch })
            .send()
            .await?;
        let resp = Self::check_response(resp).await?;
        let user: User = resp
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;
        Ok(user.into_profile())
    }
}
