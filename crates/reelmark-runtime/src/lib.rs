mod db;
pub mod notice;
pub mod session;
pub mod watchlist;

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use reelmark_api::backend::{AuthClient, BackendClient};
use reelmark_api::tmdb::types::{Credits, MovieDetails, TvDetails, Video};
use reelmark_api::tmdb::TmdbClient;
use reelmark_api::traits::{AuthService, AvatarStorage, CatalogService, SignUpOutcome};
use reelmark_core::config::AppConfig;
use reelmark_core::error::ReelmarkError;
use reelmark_core::library::ListQuery;
use reelmark_core::models::{MediaRef, MediaType, Profile, ProfilePatch, Session, WatchlistEntry};
use reelmark_core::progress;

pub use db::DbHandle;
pub use notice::{Notice, NoticeKind, Notices};
pub use session::SessionCheck;
pub use watchlist::{ListView, Watchlist};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("config error: {0}")]
    Config(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("api error: {0}")]
    Api(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("not signed in")]
    NotAuthenticated,
    #[error("a save for this item is already in progress")]
    Busy,
    #[error(transparent)]
    Progress(ReelmarkError),
}

fn api_err(e: impl std::fmt::Display) -> RuntimeError {
    RuntimeError::Api(e.to_string())
}

fn db_err(e: ReelmarkError) -> RuntimeError {
    RuntimeError::Database(e.to_string())
}

/// Movie detail view: details, cast and trailers, plus the user's entry.
#[derive(Debug, Clone)]
pub struct MovieDetail {
    pub details: MovieDetails,
    pub credits: Credits,
    pub videos: Vec<Video>,
    pub entry: Option<WatchlistEntry>,
}

/// TV detail view. `entry` already carries the season list fetched for
/// this render, even if persisting it failed.
#[derive(Debug, Clone)]
pub struct TvDetail {
    pub details: TvDetails,
    pub credits: Credits,
    pub videos: Vec<Video>,
    pub entry: Option<WatchlistEntry>,
}

/// Application context: configuration, local store, session and the
/// notice queue. Cheap to clone.
#[derive(Clone)]
pub struct Runtime {
    db: DbHandle,
    config: Arc<RwLock<AppConfig>>,
    notices: Notices,
}

impl Runtime {
    /// Load the user config and open the on-disk store.
    pub fn new() -> Result<Self, RuntimeError> {
        let config = AppConfig::load().map_err(|e| RuntimeError::Config(e.to_string()))?;
        let db_path =
            AppConfig::ensure_db_path().map_err(|e| RuntimeError::Config(e.to_string()))?;
        let db = DbHandle::open(&db_path).map_err(db_err)?;
        Ok(Self::with_config(config, db))
    }

    pub fn with_config(config: AppConfig, db: DbHandle) -> Self {
        Self {
            db,
            config: Arc::new(RwLock::new(config)),
            notices: Notices::new(),
        }
    }

    pub fn db_handle(&self) -> DbHandle {
        self.db.clone()
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    pub async fn config(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    // ── Clients ─────────────────────────────────────────────────

    pub async fn catalog(&self) -> Result<TmdbClient, RuntimeError> {
        let config = self.config.read().await;
        TmdbClient::from_config(&config.catalog).map_err(|e| {
            RuntimeError::Config(format!("catalog: {e} (set catalog.api_token)"))
        })
    }

    pub async fn auth(&self) -> Result<AuthClient, RuntimeError> {
        let config = self.config.read().await;
        if !config.backend.is_configured() {
            return Err(RuntimeError::Config(
                "backend.url and backend.anon_key must be set".into(),
            ));
        }
        AuthClient::new(&config.backend.url, config.backend.anon_key.clone())
            .map_err(|e| RuntimeError::Config(e.to_string()))
    }

    /// Table client acting as the signed-in user, or as the anonymous role
    /// when signed out.
    async fn backend(&self, session: Option<&Session>) -> Result<BackendClient, RuntimeError> {
        let config = self.config.read().await;
        if !config.backend.is_configured() {
            return Err(RuntimeError::Config(
                "backend.url and backend.anon_key must be set".into(),
            ));
        }
        let token = session
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| config.backend.anon_key.clone());
        BackendClient::new(&config.backend, token).map_err(|e| RuntimeError::Config(e.to_string()))
    }

    // ── Session ─────────────────────────────────────────────────

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, RuntimeError> {
        let outcome = self.auth().await?.sign_up(email, password).await.map_err(|e| {
            self.notices.error(format!("Sign up failed: {e}"));
            api_err(e)
        })?;
        match outcome {
            SignUpOutcome::SignedIn(ref session) => {
                self.db.save_session(session.clone()).await.map_err(db_err)?;
                tracing::info!(user_id = %session.user_id, "Signed up");
                self.notices.success("Account created");
            }
            SignUpOutcome::ConfirmationRequired { ref user_id, .. } => {
                tracing::info!(%user_id, "Sign up awaiting email confirmation");
                self.notices
                    .info("Check your inbox to confirm your email, then sign in");
            }
        }
        Ok(outcome)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, RuntimeError> {
        let session = self
            .auth()
            .await?
            .sign_in(email, password)
            .await
            .map_err(|e| {
                self.notices.error(format!("Sign in failed: {e}"));
                api_err(e)
            })?;
        self.db.save_session(session.clone()).await.map_err(db_err)?;
        tracing::info!(user_id = %session.user_id, "Signed in");
        self.notices.success(format!(
            "Signed in as {}",
            session.email.as_deref().unwrap_or(&session.user_id)
        ));
        Ok(session)
    }

    /// Drop the local session. Revoking the token remotely is best effort.
    pub async fn sign_out(&self) -> Result<(), RuntimeError> {
        let Some(session) = self.db.load_session().await.map_err(db_err)? else {
            self.notices.info("Not signed in");
            return Ok(());
        };
        match self.auth().await {
            Ok(auth) => {
                if let Err(e) = auth.sign_out(&session.access_token).await {
                    tracing::warn!(error = %e, "Remote sign out failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Skipping remote sign out"),
        }
        self.db.clear_session().await.map_err(db_err)?;
        tracing::info!(user_id = %session.user_id, "Signed out");
        self.notices.success("Signed out");
        Ok(())
    }

    /// Stored session, refreshed if it is about to expire.
    pub async fn current_session(&self) -> Result<Option<Session>, RuntimeError> {
        let Some(session) = self.db.load_session().await.map_err(db_err)? else {
            return Ok(None);
        };
        let auth = match self.auth().await {
            Ok(auth) => auth,
            Err(e) => {
                tracing::debug!(error = %e, "Backend not configured; using stored session");
                return Ok(Some(session));
            }
        };
        match session::ensure_fresh(&auth, session, Utc::now()).await {
            SessionCheck::Valid(session) => Ok(Some(session)),
            SessionCheck::Refreshed(session) => {
                self.db.save_session(session.clone()).await.map_err(db_err)?;
                Ok(Some(session))
            }
            SessionCheck::Expired => {
                self.db.clear_session().await.map_err(db_err)?;
                self.notices.info("Your session expired; sign in again");
                Ok(None)
            }
        }
    }

    pub async fn current_user_id(&self) -> Result<Option<String>, RuntimeError> {
        Ok(self.current_session().await?.map(|s| s.user_id))
    }

    pub async fn require_session(&self) -> Result<Session, RuntimeError> {
        self.current_session()
            .await?
            .ok_or(RuntimeError::NotAuthenticated)
    }

    // ── Watchlist ───────────────────────────────────────────────

    /// Watchlist for the current user, loaded from the backend. When signed
    /// out it is empty and refuses every write.
    pub async fn watchlist(&self) -> Result<Watchlist<BackendClient>, RuntimeError> {
        let session = self.current_session().await?;
        let backend = self.backend(session.as_ref()).await?;
        let watchlist = Watchlist::new(
            backend,
            session.map(|s| s.user_id),
            self.notices.clone(),
        );
        if watchlist.user_id().is_some() {
            watchlist.load().await?;
        }
        Ok(watchlist)
    }

    /// Fetch a catalog snapshot and add it to the watchlist.
    pub async fn add_to_watchlist(
        &self,
        watchlist: &Watchlist<BackendClient>,
        media: MediaRef,
    ) -> Result<WatchlistEntry, RuntimeError> {
        if watchlist.user_id().is_none() {
            return Err(RuntimeError::NotAuthenticated);
        }
        let catalog = self.catalog().await?;
        let snapshot = match media.media_type {
            MediaType::Movie => catalog
                .movie_details(media.tmdb_id)
                .await
                .map(|d| d.to_snapshot()),
            MediaType::Tv => catalog
                .tv_details(media.tmdb_id)
                .await
                .map(|d| d.to_snapshot()),
        };
        let snapshot = match snapshot {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_not_found() => {
                return Err(RuntimeError::NotFound(format!(
                    "{} {}",
                    media.media_type.as_str(),
                    media.tmdb_id
                )));
            }
            Err(e) => {
                self.notices.error(format!("Couldn't load details: {e}"));
                return Err(api_err(e));
            }
        };
        watchlist.add(media, snapshot).await
    }

    /// Movie detail view. `watchlist` is `None` when no backend is
    /// configured; the view then carries no entry.
    pub async fn movie_detail(
        &self,
        watchlist: Option<&Watchlist<BackendClient>>,
        id: u64,
    ) -> Result<MovieDetail, RuntimeError> {
        let catalog = self.catalog().await?;
        let media = MediaRef::movie(id);
        let (details, credits, videos) = futures::try_join!(
            catalog.movie_details(id),
            catalog.credits(media),
            catalog.videos(media),
        )
        .map_err(api_err)?;
        Ok(MovieDetail {
            details,
            credits,
            videos,
            entry: find_entry(watchlist, media).await,
        })
    }

    /// TV detail view. A watchlist entry without season data gets it from
    /// the fetched details; only `tmdb_data` is written back.
    pub async fn tv_detail(
        &self,
        watchlist: Option<&Watchlist<BackendClient>>,
        id: u64,
    ) -> Result<TvDetail, RuntimeError> {
        let catalog = self.catalog().await?;
        let media = MediaRef::tv(id);
        let (details, credits, videos) = futures::try_join!(
            catalog.tv_details(id),
            catalog.credits(media),
            catalog.videos(media),
        )
        .map_err(api_err)?;

        let mut entry = find_entry(watchlist, media).await;
        let stale = watchlist.zip(entry.as_ref().filter(|e| progress::needs_season_backfill(e)));
        if let Some((watchlist, current)) = stale {
            let backfilled = match watchlist
                .backfill_seasons(&current.id, details.number_of_seasons, details.seasons.clone())
                .await
            {
                Ok(saved) => saved,
                Err(e) => {
                    tracing::warn!(entry_id = %current.id, error = %e, "Season backfill not saved");
                    progress::backfill_seasons(
                        current,
                        details.number_of_seasons,
                        details.seasons.clone(),
                    )
                    .map_err(RuntimeError::Progress)?
                }
            };
            entry = Some(backfilled);
        }

        Ok(TvDetail {
            details,
            credits,
            videos,
            entry,
        })
    }

    // ── List view state ─────────────────────────────────────────

    /// Last list view, or the configured defaults.
    pub async fn load_list_query(&self) -> Result<ListQuery, RuntimeError> {
        if let Some(query) = self.db.load_list_query().await.map_err(db_err)? {
            return Ok(query);
        }
        let config = self.config.read().await;
        let mut query = ListQuery::default();
        query.set_bucket(config.library.default_filter);
        query.set_sort(config.library.default_sort);
        Ok(query)
    }

    pub async fn save_list_query(&self, query: &ListQuery) -> Result<(), RuntimeError> {
        self.db.save_list_query(query.clone()).await.map_err(db_err)
    }

    // ── Profile ─────────────────────────────────────────────────

    pub async fn profile(&self) -> Result<Profile, RuntimeError> {
        let session = self.require_session().await?;
        self.auth()
            .await?
            .user(&session.access_token)
            .await
            .map_err(api_err)
    }

    pub async fn update_profile(&self, patch: &ProfilePatch) -> Result<Profile, RuntimeError> {
        let session = self.require_session().await?;
        if patch.is_empty() {
            return self.profile().await;
        }
        let profile = self
            .auth()
            .await?
            .update_profile(&session.access_token, patch)
            .await
            .map_err(|e| {
                self.notices.error(format!("Couldn't update profile: {e}"));
                api_err(e)
            })?;
        self.notices.success("Profile updated");
        Ok(profile)
    }

    /// Upload an image and make it the profile picture.
    pub async fn upload_avatar(&self, path: &Path) -> Result<Profile, RuntimeError> {
        let session = self.require_session().await?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let content_type = image_content_type(&ext).ok_or_else(|| {
            RuntimeError::Config(format!("unsupported image type: {}", path.display()))
        })?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| RuntimeError::NotFound(format!("{}: {e}", path.display())))?;

        let backend = self.backend(Some(&session)).await?;
        let file_name = format!("avatar.{ext}");
        let url = backend
            .upload_avatar(&session.user_id, &file_name, bytes, content_type)
            .await
            .map_err(|e| {
                self.notices.error(format!("Couldn't upload avatar: {e}"));
                api_err(e)
            })?;

        self.update_profile(&ProfilePatch {
            avatar_url: Some(url),
            ..Default::default()
        })
        .await
    }
}

async fn find_entry(
    watchlist: Option<&Watchlist<BackendClient>>,
    media: MediaRef,
) -> Option<WatchlistEntry> {
    match watchlist {
        Some(watchlist) => watchlist.find(media).await,
        None => None,
    }
}

fn image_content_type(ext: &str) -> Option<&'static str> {
    match ext {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use reelmark_core::library::{Bucket, SortKey};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn runtime(server: &MockServer) -> Runtime {
        let mut config = AppConfig::default();
        config.backend.url = server.uri();
        config.backend.anon_key = "anon".into();
        config.catalog.base_url = format!("{}/3/", server.uri());
        config.catalog.api_token = Some("tmdb-token".into());
        Runtime::with_config(config, DbHandle::open_memory().unwrap())
    }

    fn token_body() -> serde_json::Value {
        serde_json::json!({
            "access_token": "jwt-1",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-1",
            "user": {"id": "u-1", "email": "viewer@example.com"}
        })
    }

    #[tokio::test]
    async fn test_sign_in_persists_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
            .mount(&server)
            .await;

        let rt = runtime(&server);
        assert_eq!(rt.current_user_id().await.unwrap(), None);

        rt.sign_in("viewer@example.com", "hunter22").await.unwrap();
        assert_eq!(rt.current_user_id().await.unwrap().as_deref(), Some("u-1"));
        assert_eq!(rt.notices().count(NoticeKind::Success), 1);
    }

    #[tokio::test]
    async fn test_expired_session_is_refreshed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
            .expect(1)
            .mount(&server)
            .await;

        let rt = runtime(&server);
        rt.db_handle()
            .save_session(Session {
                user_id: "u-1".into(),
                email: None,
                access_token: "stale".into(),
                refresh_token: Some("refresh-0".into()),
                expires_at: Some(Utc::now() - chrono::Duration::minutes(5)),
            })
            .await
            .unwrap();

        let session = rt.require_session().await.unwrap();
        assert_eq!(session.access_token, "jwt-1");
        let stored = rt.db_handle().load_session().await.unwrap().unwrap();
        assert_eq!(stored.access_token, "jwt-1");
    }

    #[tokio::test]
    async fn test_signed_out_watchlist_refuses_add() {
        let server = MockServer::start().await;
        let rt = runtime(&server);

        let watchlist = rt.watchlist().await.unwrap();
        assert!(watchlist.entries().await.is_empty());
        let err = rt
            .add_to_watchlist(&watchlist, MediaRef::movie(949))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::NotAuthenticated));
        // Nothing was requested from the catalog or the table.
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_tv_detail_backfills_seasons() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/watchlist"))
            .and(header("authorization", "Bearer jwt-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "id": 7,
                "user_id": "u-1",
                "tmdb_id": 1399,
                "media_type": "tv",
                "tmdb_data": {"name": "Game of Thrones"},
                "poster_path": null,
                "is_seen": false,
                "seen_episodes": {},
                "completed_seasons": [],
                "created_at": "2024-01-01T00:00:00+00:00",
                "last_updated": "2024-01-01T00:00:00+00:00"
            }])))
            .mount(&server)
            .await;
        // The save fails; the render still gets the fetched seasons.
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/watchlist"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/3/tv/1399"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 1399,
                "name": "Game of Thrones",
                "number_of_seasons": 1,
                "seasons": [
                    {"season_number": 0, "episode_count": 3},
                    {"season_number": 1, "episode_count": 10}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/3/tv/1399/credits"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"cast": [], "crew": []})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/3/tv/1399/videos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": []})))
            .mount(&server)
            .await;

        let rt = runtime(&server);
        rt.sign_in("viewer@example.com", "hunter22").await.unwrap();
        rt.notices().drain();

        let watchlist = rt.watchlist().await.unwrap();
        let detail = rt.tv_detail(Some(&watchlist), 1399).await.unwrap();
        let entry = detail.entry.unwrap();
        assert_eq!(entry.snapshot.seasons.len(), 2);
        assert_eq!(entry.snapshot.number_of_seasons, Some(1));
        // Rolled back in the store, reported once.
        let stored = watchlist.get("7").await.unwrap();
        assert!(stored.snapshot.seasons.is_empty());
        assert_eq!(rt.notices().count(NoticeKind::Error), 1);
    }

    #[tokio::test]
    async fn test_list_query_defaults_from_config() {
        let mut config = AppConfig::default();
        config.library.default_filter = Bucket::Tv;
        config.library.default_sort = SortKey::Title;
        let rt = Runtime::with_config(config, DbHandle::open_memory().unwrap());

        let query = rt.load_list_query().await.unwrap();
        assert_eq!(query.bucket, Bucket::Tv);
        assert_eq!(query.sort, SortKey::Title);

        let mut changed = query.clone();
        changed.set_search("thrones");
        rt.save_list_query(&changed).await.unwrap();
        assert_eq!(rt.load_list_query().await.unwrap(), changed);
    }

    #[test]
    fn test_avatar_content_types() {
        assert_eq!(image_content_type("png"), Some("image/png"));
        assert_eq!(image_content_type("jpeg"), Some("image/jpeg"));
        assert_eq!(image_content_type("bmp"), None);
    }
}
