use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use reelmark_core::config::CatalogConfig;
use reelmark_core::models::{Genre, MediaRef, MediaType};

use super::error::TmdbError;
use super::types::{
    CatalogItem, CatalogKind, Credits, ErrorBody, GenreList, MovieDetails, PersonDetails, Review,
    SeasonDetails, TvDetails, Video, VideoList,
};
use crate::traits::{CatalogService, DiscoverParams, Page, TimeWindow, TrendingScope};

const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// TMDB v3 client authenticated with a static bearer token.
#[derive(Debug, Clone)]
pub struct TmdbClient {
    http: Client,
    base_url: Url,
    api_token: String,
    language: String,
    include_adult: bool,
}

#[derive(Debug, Default)]
pub struct TmdbClientBuilder {
    base_url: Option<Url>,
    api_token: Option<String>,
    language: Option<String>,
    include_adult: bool,
    timeout: Option<Duration>,
}

impl TmdbClientBuilder {
    /// Overrides the base URL (for wiremock in tests).
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn include_adult(mut self, include: bool) -> Self {
        self.include_adult = include;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<TmdbClient, TmdbError> {
        let api_token = self
            .api_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| TmdbError::Auth("no TMDB API token configured".into()))?;

        let base_url = match self.base_url {
            Some(url) => url,
            None => Url::parse(DEFAULT_BASE_URL).map_err(|e| TmdbError::Parse(e.to_string()))?,
        };

        let http = Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;

        Ok(TmdbClient {
            http,
            base_url,
            api_token,
            language: self.language.unwrap_or_else(|| "en-US".into()),
            include_adult: self.include_adult,
        })
    }
}

impl TmdbClient {
    pub fn builder() -> TmdbClientBuilder {
        TmdbClientBuilder::default()
    }

    pub fn from_config(config: &CatalogConfig) -> Result<Self, TmdbError> {
        let base_url =
            Url::parse(&config.base_url).map_err(|e| TmdbError::Parse(e.to_string()))?;
        let mut builder = Self::builder()
            .base_url(base_url)
            .language(config.language.clone())
            .include_adult(config.include_adult)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)));
        if let Some(ref token) = config.api_token {
            builder = builder.api_token(token.clone());
        }
        builder.build()
    }

    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, TmdbError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|e| {
                e.status_message
                    .map(|m| format!("{m} (code {})", e.status_code.unwrap_or_default()))
            })
            .unwrap_or(body);
        tracing::warn!(status = status.as_u16(), %message, "TMDB API error");
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(TmdbError::Auth(message));
        }
        Err(TmdbError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// GET `path` relative to the base URL with bearer auth and the
    /// configured language.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, TmdbError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| TmdbError::Parse(format!("bad path {path}: {e}")))?;

        tracing::debug!(%url, "TMDB API request");

        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.api_token)
            .query(&[("language", self.language.as_str())])
            .query(query)
            .send()
            .await?;

        let resp = Self::check_response(resp).await?;
        resp.json::<T>()
            .await
            .map_err(|e| TmdbError::Parse(format!("{path}: {e}")))
    }

    /// Fetch a single-type listing and tag every row with its kind.
    async fn get_listing(
        &self,
        path: &str,
        query: &[(&str, String)],
        kind: Option<CatalogKind>,
    ) -> Result<Page<CatalogItem>, TmdbError> {
        let mut page: Page<CatalogItem> = self.get_json(path, query).await?;
        if let Some(kind) = kind {
            for item in &mut page.results {
                item.media_type.get_or_insert(kind);
            }
        }
        Ok(page)
    }

    fn media_path(media: MediaRef) -> String {
        format!("{}/{}", media.media_type.as_db_str(), media.tmdb_id)
    }
}

impl CatalogService for TmdbClient {
    type Error = TmdbError;

    async fn trending(
        &self,
        scope: TrendingScope,
        window: TimeWindow,
        page: u32,
    ) -> Result<Page<CatalogItem>, TmdbError> {
        let path = format!("trending/{}/{}", scope.as_str(), window.as_str());
        let kind = match scope {
            TrendingScope::All => None,
            TrendingScope::Movie => Some(CatalogKind::Movie),
            TrendingScope::Tv => Some(CatalogKind::Tv),
        };
        self.get_listing(&path, &[("page", page.max(1).to_string())], kind)
            .await
    }

    async fn discover(&self, params: &DiscoverParams) -> Result<Page<CatalogItem>, TmdbError> {
        let path = format!("discover/{}", params.media_type.as_db_str());
        let mut query = params.to_query();
        query.push(("include_adult", self.include_adult.to_string()));
        self.get_listing(&path, &query, Some(params.media_type.into()))
            .await
    }

    async fn upcoming(&self, page: u32) -> Result<Page<CatalogItem>, TmdbError> {
        self.get_listing(
            "movie/upcoming",
            &[("page", page.max(1).to_string())],
            Some(CatalogKind::Movie),
        )
        .await
    }

    async fn search(&self, query: &str, page: u32) -> Result<Page<CatalogItem>, TmdbError> {
        let params = [
            ("query", query.to_string()),
            ("page", page.max(1).to_string()),
            ("include_adult", self.include_adult.to_string()),
        ];
        self.get_listing("search/multi", &params, None).await
    }

    async fn movie_details(&self, id: u64) -> Result<MovieDetails, TmdbError> {
        self.get_json(&format!("movie/{id}"), &[]).await
    }

    async fn tv_details(&self, id: u64) -> Result<TvDetails, TmdbError> {
        self.get_json(&format!("tv/{id}"), &[]).await
    }

    async fn tv_season(&self, id: u64, season: u32) -> Result<SeasonDetails, TmdbError> {
        self.get_json(&format!("tv/{id}/season/{season}"), &[]).await
    }

    async fn person(&self, id: u64) -> Result<PersonDetails, TmdbError> {
        self.get_json(
            &format!("person/{id}"),
            &[("append_to_response", "combined_credits".to_string())],
        )
        .await
    }

    async fn credits(&self, media: MediaRef) -> Result<Credits, TmdbError> {
        self.get_json(&format!("{}/credits", Self::media_path(media)), &[])
            .await
    }

    async fn videos(&self, media: MediaRef) -> Result<Vec<Video>, TmdbError> {
        let list: VideoList = self
            .get_json(&format!("{}/videos", Self::media_path(media)), &[])
            .await?;
        Ok(list.results)
    }

    async fn reviews(&self, media: MediaRef, page: u32) -> Result<Page<Review>, TmdbError> {
        self.get_json(
            &format!("{}/reviews", Self::media_path(media)),
            &[("page", page.max(1).to_string())],
        )
        .await
    }

    async fn genres(&self, media_type: MediaType) -> Result<Vec<Genre>, TmdbError> {
        let list: GenreList = self
            .get_json(&format!("genre/{}/list", media_type.as_db_str()), &[])
            .await?;
        Ok(list.genres)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn client(server: &MockServer) -> TmdbClient {
        TmdbClient::builder()
            .base_url(format!("{}/3/", server.uri()).parse().unwrap())
            .api_token("test-token")
            .language("en-US")
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_requires_token() {
        assert!(matches!(
            TmdbClient::builder().build(),
            Err(TmdbError::Auth(_))
        ));
        assert!(TmdbClient::from_config(&CatalogConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_trending_tags_kind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3/trending/movie/week"))
            .and(header("authorization", "Bearer test-token"))
            .and(query_param("language", "en-US"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "page": 2,
                "total_pages": 10,
                "total_results": 200,
                "results": [{"id": 550, "title": "Fight Club", "release_date": "1999-10-15"}]
            })))
            .mount(&server)
            .await;

        let page = client(&server)
            .await
            .trending(TrendingScope::Movie, TimeWindow::Week, 2)
            .await
            .unwrap();
        assert_eq!(page.page, 2);
        assert!(page.has_next());
        assert_eq!(page.results[0].media_ref(), Some(MediaRef::movie(550)));
    }

    #[tokio::test]
    async fn test_discover_tv_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3/discover/tv"))
            .and(query_param("with_genres", "18,80"))
            .and(query_param("sort_by", "popularity.desc"))
            .and(query_param("include_adult", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "page": 1,
                "total_pages": 1,
                "total_results": 1,
                "results": [{"id": 1396, "name": "Breaking Bad"}]
            })))
            .mount(&server)
            .await;

        let params = DiscoverParams::new(MediaType::Tv)
            .sort_by("popularity.desc")
            .genres([18, 80]);
        let page = client(&server).await.discover(&params).await.unwrap();
        assert_eq!(page.results[0].media_type, Some(CatalogKind::Tv));
    }

    #[tokio::test]
    async fn test_search_multi_keeps_person_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3/search/multi"))
            .and(query_param("query", "breaking"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "page": 1,
                "total_pages": 1,
                "total_results": 2,
                "results": [
                    {"id": 1396, "media_type": "tv", "name": "Breaking Bad"},
                    {"id": 17419, "media_type": "person", "name": "Bryan Cranston"}
                ]
            })))
            .mount(&server)
            .await;

        let page = client(&server).await.search("breaking", 1).await.unwrap();
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.results[1].media_type, Some(CatalogKind::Person));
    }

    #[tokio::test]
    async fn test_tv_details_and_season() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3/tv/1396"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 1396,
                "name": "Breaking Bad",
                "number_of_seasons": 5,
                "seasons": [{"season_number": 1, "episode_count": 7}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/3/tv/1396/season/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "season_number": 1,
                "episodes": [
                    {"episode_number": 1, "season_number": 1, "name": "Pilot"},
                    {"episode_number": 2, "season_number": 1, "name": "Cat's in the Bag..."}
                ]
            })))
            .mount(&server)
            .await;

        let client = client(&server).await;
        let details = client.tv_details(1396).await.unwrap();
        assert_eq!(details.number_of_seasons, Some(5));
        assert_eq!(details.episode_count(1), Some(7));

        let season = client.tv_season(1396, 1).await.unwrap();
        assert_eq!(season.episodes.len(), 2);
        assert_eq!(season.episodes[0].name.as_deref(), Some("Pilot"));
    }

    #[tokio::test]
    async fn test_person_with_combined_credits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3/person/17419"))
            .and(query_param("append_to_response", "combined_credits"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 17419,
                "name": "Bryan Cranston",
                "combined_credits": {
                    "cast": [{"id": 1396, "media_type": "tv", "name": "Breaking Bad", "character": "Walter White"}],
                    "crew": []
                }
            })))
            .mount(&server)
            .await;

        let person = client(&server).await.person(17419).await.unwrap();
        assert_eq!(person.combined_credits.cast.len(), 1);
        assert_eq!(
            person.combined_credits.cast[0].character.as_deref(),
            Some("Walter White")
        );
    }

    #[tokio::test]
    async fn test_videos_and_genres() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3/movie/550/videos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 550,
                "results": [{"key": "SUXWAEX2jlg", "site": "YouTube", "type": "Trailer", "official": true}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/3/genre/movie/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "genres": [{"id": 28, "name": "Action"}]
            })))
            .mount(&server)
            .await;

        let client = client(&server).await;
        let videos = client.videos(MediaRef::movie(550)).await.unwrap();
        assert!(videos[0].is_trailer());
        let genres = client.genres(MediaType::Movie).await.unwrap();
        assert_eq!(genres[0].name, "Action");
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3/movie/1"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "success": false,
                "status_code": 34,
                "status_message": "The resource you requested could not be found."
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/3/movie/2"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "status_code": 7,
                "status_message": "Invalid API key: You must be granted a valid key."
            })))
            .mount(&server)
            .await;

        let client = client(&server).await;
        let err = client.movie_details(1).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("could not be found"));

        let err = client.movie_details(2).await.unwrap_err();
        assert!(matches!(err, TmdbError::Auth(_)));
    }
}
