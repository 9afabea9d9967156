//! Service interfaces the runtime is generic over.
//!
//! The catalog, identity, row store and object store each get one trait so
//! tests can swap in in-memory fakes.

use std::future::Future;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use reelmark_core::models::{
    EntryPatch, Genre, MediaRef, MediaType, NewWatchlistEntry, Profile, ProfilePatch, Session,
    WatchlistEntry,
};

use crate::tmdb::types::{
    CatalogItem, Credits, MovieDetails, PersonDetails, Review, SeasonDetails, TvDetails, Video,
};

/// Read-only media catalog.
pub trait CatalogService: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn trending(
        &self,
        scope: TrendingScope,
        window: TimeWindow,
        page: u32,
    ) -> impl Future<Output = Result<Page<CatalogItem>, Self::Error>> + Send;

    fn discover(
        &self,
        params: &DiscoverParams,
    ) -> impl Future<Output = Result<Page<CatalogItem>, Self::Error>> + Send;

    /// Movies with an upcoming theatrical release.
    fn upcoming(&self, page: u32)
        -> impl Future<Output = Result<Page<CatalogItem>, Self::Error>> + Send;

    /// Multi search across movies, shows and people.
    fn search(
        &self,
        query: &str,
        page: u32,
    ) -> impl Future<Output = Result<Page<CatalogItem>, Self::Error>> + Send;

    fn movie_details(&self, id: u64)
        -> impl Future<Output = Result<MovieDetails, Self::Error>> + Send;

    fn tv_details(&self, id: u64) -> impl Future<Output = Result<TvDetails, Self::Error>> + Send;

    fn tv_season(
        &self,
        id: u64,
        season: u32,
    ) -> impl Future<Output = Result<SeasonDetails, Self::Error>> + Send;

    /// Person with combined movie and TV credits.
    fn person(&self, id: u64) -> impl Future<Output = Result<PersonDetails, Self::Error>> + Send;

    fn credits(&self, media: MediaRef)
        -> impl Future<Output = Result<Credits, Self::Error>> + Send;

    fn videos(&self, media: MediaRef)
        -> impl Future<Output = Result<Vec<Video>, Self::Error>> + Send;

    fn reviews(
        &self,
        media: MediaRef,
        page: u32,
    ) -> impl Future<Output = Result<Page<Review>, Self::Error>> + Send;

    fn genres(
        &self,
        media_type: MediaType,
    ) -> impl Future<Output = Result<Vec<Genre>, Self::Error>> + Send;
}

/// Email/password identity provider.
pub trait AuthService: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<SignUpOutcome, Self::Error>> + Send;

    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, Self::Error>> + Send;

    fn refresh(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<Session, Self::Error>> + Send;

    /// Profile of the user owning `access_token`.
    fn user(&self, access_token: &str) -> impl Future<Output = Result<Profile, Self::Error>> + Send;

    fn sign_out(&self, access_token: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn update_profile(
        &self,
        access_token: &str,
        patch: &ProfilePatch,
    ) -> impl Future<Output = Result<Profile, Self::Error>> + Send;
}

/// Row store holding watchlist entries.
pub trait WatchlistBackend: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Insert a row and return it with its assigned id.
    fn insert(
        &self,
        entry: &NewWatchlistEntry,
    ) -> impl Future<Output = Result<WatchlistEntry, Self::Error>> + Send;

    /// All rows of a user, newest first.
    fn select_all(
        &self,
        user_id: &str,
        media_type: Option<MediaType>,
    ) -> impl Future<Output = Result<Vec<WatchlistEntry>, Self::Error>> + Send;

    fn find(
        &self,
        user_id: &str,
        media: MediaRef,
    ) -> impl Future<Output = Result<Option<WatchlistEntry>, Self::Error>> + Send;

    /// Write only the fields present in `patch`.
    fn update(
        &self,
        id: &str,
        patch: &EntryPatch,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn delete(&self, id: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn delete_many(&self, ids: &[String]) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Object store for profile pictures.
pub trait AvatarStorage: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Upload (or replace) an avatar and return its public URL.
    fn upload_avatar(
        &self,
        user_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send;
}

/// Result of a sign-up. Projects that require email confirmation return no
/// session until the address is confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(Session),
    ConfirmationRequired { user_id: String, email: Option<String> },
}

/// One page of a paged catalog listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u32,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

fn first_page() -> u32 {
    1
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrendingScope {
    #[default]
    All,
    Movie,
    Tv,
}

impl TrendingScope {
    pub const ALL: &[TrendingScope] = &[Self::All, Self::Movie, Self::Tv];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Movie => "movie",
            Self::Tv => "tv",
        }
    }
}

impl From<MediaType> for TrendingScope {
    fn from(media_type: MediaType) -> Self {
        match media_type {
            MediaType::Movie => Self::Movie,
            MediaType::Tv => Self::Tv,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeWindow {
    Day,
    #[default]
    Week,
}

impl TimeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
        }
    }
}

/// Filters for the discover listing.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoverParams {
    pub media_type: MediaType,
    pub page: u32,
    /// e.g. `popularity.desc`, `vote_average.desc`.
    pub sort_by: Option<String>,
    pub genres: Vec<u64>,
    /// Release date (movies) or first air date (TV) lower bound.
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl DiscoverParams {
    pub fn new(media_type: MediaType) -> Self {
        Self {
            media_type,
            page: 1,
            sort_by: None,
            genres: Vec::new(),
            date_from: None,
            date_to: None,
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn sort_by(mut self, sort_by: impl Into<String>) -> Self {
        self.sort_by = Some(sort_by.into());
        self
    }

    pub fn genres(mut self, genres: impl IntoIterator<Item = u64>) -> Self {
        self.genres = genres.into_iter().collect();
        self
    }

    pub fn dates(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    /// Query pairs, without language and paging defaults.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let (gte, lte) = match self.media_type {
            MediaType::Movie => ("primary_release_date.gte", "primary_release_date.lte"),
            MediaType::Tv => ("first_air_date.gte", "first_air_date.lte"),
        };
        let mut query = vec![("page", self.page.to_string())];
        if let Some(ref sort_by) = self.sort_by {
            query.push(("sort_by", sort_by.clone()));
        }
        if !self.genres.is_empty() {
            let joined = self
                .genres
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(",");
            query.push(("with_genres", joined));
        }
        if let Some(from) = self.date_from {
            query.push((gte, from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.date_to {
            query.push((lte, to.format("%Y-%m-%d").to_string()));
        }
        query
    }
}
