use reqwest::{Client, RequestBuilder};
use url::Url;

use reelmark_core::config::BackendConfig;
use reelmark_core::models::{EntryPatch, MediaRef, MediaType, NewWatchlistEntry, WatchlistEntry};

use super::error::BackendError;
use super::types::{base_url, ErrorBody};
use crate::traits::WatchlistBackend;

/// Row client for the watchlist table, acting as one signed-in user.
///
/// Row-level security on the backend scopes every query to the owner of
/// `access_token`; the explicit `user_id` filters mirror that.
#[derive(Debug, Clone)]
pub struct BackendClient {
    pub(crate) http: Client,
    pub(crate) base: Url,
    pub(crate) anon_key: String,
    pub(crate) access_token: String,
    table: String,
    pub(crate) avatar_bucket: String,
}

impl BackendClient {
    pub fn new(config: &BackendConfig, access_token: impl Into<String>) -> Result<Self, BackendError> {
        Ok(Self {
            http: Client::new(),
            base: base_url(&config.url)?,
            anon_key: config.anon_key.clone(),
            access_token: access_token.into(),
            table: config.watchlist_table.clone(),
            avatar_bucket: config.avatar_bucket.clone(),
        })
    }

    fn table_url(&self) -> Result<Url, BackendError> {
        self.base
            .join(&format!("rest/v1/{}", self.table))
            .map_err(|e| BackendError::Parse(e.to_string()))
    }

    pub(crate) fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.access_token)
    }

    pub(crate) async fn check_response(
        resp: reqwest::Response,
    ) -> Result<reqwest::Response, BackendError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = ErrorBody::message_from(resp.text().await.unwrap_or_default());
        tracing::warn!(status = status.as_u16(), %message, "Backend API error");
        match status.as_u16() {
            401 | 403 => Err(BackendError::Auth(message)),
            status => Err(BackendError::Api { status, message }),
        }
    }

    async fn select(&self, filters: &[(&str, String)]) -> Result<Vec<WatchlistEntry>, BackendError> {
        let resp = self
            .authorized(self.http.get(self.table_url()?))
            .query(&[("select", "*")])
            .query(filters)
            .send()
            .await?;
        let resp = Self::check_response(resp).await?;
        resp.json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))
    }
}

impl WatchlistBackend for BackendClient {
    type Error = BackendError;

    async fn insert(&self, entry: &NewWatchlistEntry) -> Result<WatchlistEntry, BackendError> {
        let resp = self
            .authorized(self.http.post(self.table_url()?))
            .header("Prefer", "return=representation")
            .json(entry)
            .send()
            .await?;
        let resp = Self::check_response(resp).await?;
        let mut rows: Vec<WatchlistEntry> = resp
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;
        if rows.is_empty() {
            return Err(BackendError::Parse("insert returned no row".into()));
        }
        Ok(rows.swap_remove(0))
    }

    async fn select_all(
        &self,
        user_id: &str,
        media_type: Option<MediaType>,
    ) -> Result<Vec<WatchlistEntry>, BackendError> {
        let mut filters = vec![("user_id", format!("eq.{user_id}"))];
        if let Some(media_type) = media_type {
            filters.push(("media_type", format!("eq.{}", media_type.as_db_str())));
        }
        filters.push(("order", "created_at.desc".into()));
        let rows = self.select(&filters).await?;
        tracing::debug!(count = rows.len(), "Loaded watchlist rows");
        Ok(rows)
    }

    async fn find(
        &self,
        user_id: &str,
        media: MediaRef,
    ) -> Result<Option<WatchlistEntry>, BackendError> {
        let filters = [
            ("user_id", format!("eq.{user_id}")),
            ("tmdb_id", format!("eq.{}", media.tmdb_id)),
            ("media_type", format!("eq.{}", media.media_type.as_db_str())),
            ("limit", "1".into()),
        ];
        Ok(self.select(&filters).await?.into_iter().next())
    }

    async fn update(&self, id: &str, patch: &EntryPatch) -> Result<(), BackendError> {
        let resp = self
            .authorized(self.http.patch(self.table_url()?))
            .header("Prefer", "return=minimal")
            .query(&[("id", format!("eq.{id}"))])
            .json(patch)
            .send()
            .await?;
        Self::check_response(resp).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), BackendError> {
        let resp = self
            .authorized(self.http.delete(self.table_url()?))
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await?;
        Self::check_response(resp).await?;
        Ok(())
    }

    async fn delete_many(&self, ids: &[String]) -> Result<(), BackendError> {
        if ids.is_empty() {
            return Ok(());
        }
        let resp = self
            .authorized(self.http.delete(self.table_url()?))
            .query(&[("id", format!("in.({})", ids.join(",")))])
            .send()
            .await?;
        Self::check_response(resp).await?;
        Ok(())
    }
}
