//! List-view semantics: filter buckets, search, sort and pagination over a
//! user's watchlist entries.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::models::{MediaType, WatchlistEntry};
use crate::normalize;
use crate::progress::{watch_state, WatchState};

/// Filter tab of the list view. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    #[default]
    All,
    Movies,
    Tv,
    Watching,
    Watched,
    Planned,
}

impl Bucket {
    pub const ALL: &[Bucket] = &[
        Self::All,
        Self::Movies,
        Self::Tv,
        Self::Watching,
        Self::Watched,
        Self::Planned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Movies => "Movies",
            Self::Tv => "TV",
            Self::Watching => "Watching",
            Self::Watched => "Watched",
            Self::Planned => "Planned",
        }
    }

    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Movies => "movies",
            Self::Tv => "tv",
            Self::Watching => "watching",
            Self::Watched => "watched",
            Self::Planned => "planned",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Self::All),
            "movies" => Some(Self::Movies),
            "tv" => Some(Self::Tv),
            "watching" => Some(Self::Watching),
            "watched" => Some(Self::Watched),
            "planned" => Some(Self::Planned),
            _ => None,
        }
    }

    pub fn matches(&self, entry: &WatchlistEntry) -> bool {
        match self {
            Self::All => true,
            Self::Movies => entry.media_type == MediaType::Movie,
            Self::Tv => entry.media_type == MediaType::Tv,
            Self::Watching => watch_state(entry) == WatchState::Watching,
            Self::Watched => watch_state(entry) == WatchState::Watched,
            Self::Planned => watch_state(entry) == WatchState::Planned,
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Independent counts for every filter tab.
///
/// `movies`/`tv` partition `all`; `watching`/`watched`/`planned` partition
/// it again by progress. The two partitions overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BucketCounts {
    pub all: usize,
    pub movies: usize,
    pub tv: usize,
    pub watching: usize,
    pub watched: usize,
    pub planned: usize,
}

impl BucketCounts {
    pub fn get(&self, bucket: Bucket) -> usize {
        match bucket {
            Bucket::All => self.all,
            Bucket::Movies => self.movies,
            Bucket::Tv => self.tv,
            Bucket::Watching => self.watching,
            Bucket::Watched => self.watched,
            Bucket::Planned => self.planned,
        }
    }
}

pub fn bucket_counts<'a, I>(entries: I) -> BucketCounts
where
    I: IntoIterator<Item = &'a WatchlistEntry>,
{
    let mut counts = BucketCounts::default();
    for entry in entries {
        counts.all += 1;
        match entry.media_type {
            MediaType::Movie => counts.movies += 1,
            MediaType::Tv => counts.tv += 1,
        }
        match watch_state(entry) {
            WatchState::Watching => counts.watching += 1,
            WatchState::Watched => counts.watched += 1,
            WatchState::Planned => counts.planned += 1,
        }
    }
    counts
}

/// Sort order of the list view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Newest additions first.
    #[default]
    AddedDate,
    /// Display title, A to Z.
    Title,
    /// Newest release first; undated entries last.
    ReleaseDate,
    /// Highest vote average first; unrated counts as 0.
    Rating,
}

impl SortKey {
    pub const ALL: &[SortKey] = &[Self::AddedDate, Self::Title, Self::ReleaseDate, Self::Rating];

    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::AddedDate => "added_date",
            Self::Title => "title",
            Self::ReleaseDate => "release_date",
            Self::Rating => "rating",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "added_date" => Some(Self::AddedDate),
            "title" => Some(Self::Title),
            "release_date" => Some(Self::ReleaseDate),
            "rating" => Some(Self::Rating),
            _ => None,
        }
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddedDate => write!(f, "Date added"),
            Self::Title => write!(f, "Title"),
            Self::ReleaseDate => write!(f, "Release date"),
            Self::Rating => write!(f, "Rating"),
        }
    }
}

/// Case-insensitive substring match on the display title. Untitled entries
/// only match an empty query.
pub fn matches_search(entry: &WatchlistEntry, query: &str) -> bool {
    if query.trim().is_empty() {
        return true;
    }
    entry
        .display_title()
        .is_some_and(|title| normalize::contains_folded(title, query))
}

/// Stable in-place sort.
pub fn sort_entries(entries: &mut [&WatchlistEntry], key: SortKey) {
    match key {
        SortKey::AddedDate => entries.sort_by_key(|e| Reverse(e.created_at)),
        SortKey::Title => entries.sort_by_cached_key(|e| match e.display_title() {
            Some(title) => (false, normalize::fold(title)),
            None => (true, String::new()),
        }),
        SortKey::ReleaseDate => {
            entries.sort_by_key(|e| Reverse(e.snapshot.release_date(e.media_type)))
        }
        SortKey::Rating => entries.sort_by(|a, b| rating(b).total_cmp(&rating(a))),
    }
}

fn rating(entry: &WatchlistEntry) -> f32 {
    entry.snapshot.vote_average.unwrap_or(0.0)
}

/// Active filter, search, sort and page of the list view.
///
/// Changing the filter, the search text or the sort key resets the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    pub bucket: Bucket,
    pub search: String,
    pub sort: SortKey,
    pub page: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            bucket: Bucket::default(),
            search: String::new(),
            sort: SortKey::default(),
            page: 1,
        }
    }
}

impl ListQuery {
    pub fn set_bucket(&mut self, bucket: Bucket) {
        self.bucket = bucket;
        self.page = 1;
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
        self.page = 1;
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.sort = sort;
        self.page = 1;
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }
}

/// One page of the filtered, searched and sorted list.
#[derive(Debug, Clone)]
pub struct ListPage<'a> {
    pub items: Vec<&'a WatchlistEntry>,
    /// 1-based, clamped to `1..=total_pages`.
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

/// filter → search → sort → paginate.
pub fn apply<'a>(entries: &'a [WatchlistEntry], query: &ListQuery, page_size: usize) -> ListPage<'a> {
    let mut matched: Vec<&WatchlistEntry> = entries
        .iter()
        .filter(|e| query.bucket.matches(e))
        .filter(|e| matches_search(e, &query.search))
        .collect();
    sort_entries(&mut matched, query.sort);

    let page_size = page_size.max(1);
    let total_items = matched.len();
    let total_pages = total_items.div_ceil(page_size).max(1);
    let page = query.page.clamp(1, total_pages);
    let items = matched
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();

    ListPage {
        items,
        page,
        total_pages,
        total_items,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::models::{MediaSnapshot, SeasonSummary, SeenEpisodes};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    fn entry(id: &str, media_type: MediaType, title: Option<&str>, created: u32) -> WatchlistEntry {
        let snapshot = match media_type {
            MediaType::Movie => MediaSnapshot {
                title: title.map(Into::into),
                ..Default::default()
            },
            MediaType::Tv => MediaSnapshot {
                name: title.map(Into::into),
                seasons: vec![SeasonSummary {
                    season_number: 1,
                    episode_count: 2,
                    name: None,
                    air_date: None,
                    poster_path: None,
                }],
                ..Default::default()
            },
        };
        WatchlistEntry {
            id: id.into(),
            user_id: "u-1".into(),
            tmdb_id: 1,
            media_type,
            snapshot,
            poster_path: None,
            is_seen: false,
            seen_episodes: SeenEpisodes::new(),
            completed_seasons: BTreeSet::new(),
            created_at: day(created),
            last_updated: day(created),
        }
    }

    fn ids(page: &ListPage<'_>) -> Vec<String> {
        page.items.iter().map(|e| e.id.clone()).collect()
    }

    fn mixed() -> Vec<WatchlistEntry> {
        let mut seen_movie = entry("m-seen", MediaType::Movie, Some("Heat"), 1);
        seen_movie.is_seen = true;
        let planned_movie = entry("m-planned", MediaType::Movie, Some("Ran"), 2);
        let planned_tv = entry("tv-planned", MediaType::Tv, Some("Dark"), 3);
        let mut watching_tv = entry("tv-watching", MediaType::Tv, Some("Lost"), 4);
        watching_tv.seen_episodes.toggle(1, 1);
        let mut watched_tv = entry("tv-watched", MediaType::Tv, Some("Fargo"), 5);
        watched_tv.seen_episodes.toggle(1, 1);
        watched_tv.seen_episodes.toggle(1, 2);
        vec![seen_movie, planned_movie, planned_tv, watching_tv, watched_tv]
    }

    #[test]
    fn test_bucket_counts_overlay() {
        let counts = bucket_counts(&mixed());
        assert_eq!(
            counts,
            BucketCounts {
                all: 5,
                movies: 2,
                tv: 3,
                watching: 1,
                watched: 2,
                planned: 2,
            }
        );
    }

    #[test]
    fn test_bucket_partition_law() {
        let entries = mixed();
        let counts = bucket_counts(&entries);
        assert_eq!(counts.movies + counts.tv, counts.all);

        let tv: Vec<_> = entries.iter().filter(|e| e.is_tv()).collect();
        let tv_counts = bucket_counts(tv.iter().copied());
        assert_eq!(tv_counts.watching + tv_counts.watched + tv_counts.planned, tv_counts.tv);

        let movies: Vec<_> = entries.iter().filter(|e| e.is_movie()).collect();
        let movie_counts = bucket_counts(movies.iter().copied());
        assert_eq!(movie_counts.watching, 0);
        assert_eq!(movie_counts.watched + movie_counts.planned, movie_counts.movies);
    }

    #[test]
    fn test_bucket_matches_agree_with_counts() {
        let entries = mixed();
        let counts = bucket_counts(&entries);
        for &bucket in Bucket::ALL {
            let n = entries.iter().filter(|e| bucket.matches(e)).count();
            assert_eq!(n, counts.get(bucket), "{bucket}");
        }
    }

    #[test]
    fn test_sort_by_added_date_descending() {
        let entries = vec![
            entry("a", MediaType::Movie, Some("A"), 1),
            entry("c", MediaType::Movie, Some("C"), 3),
            entry("b", MediaType::Movie, Some("B"), 2),
        ];
        let page = apply(&entries, &ListQuery::default(), 20);
        assert_eq!(ids(&page), ["c", "b", "a"]);
    }

    #[test]
    fn test_sort_by_title_puts_untitled_last() {
        let entries = vec![
            entry("none", MediaType::Movie, None, 1),
            entry("zulu", MediaType::Movie, Some("zulu"), 2),
            entry("alpha", MediaType::Tv, Some("Alpha"), 3),
        ];
        let mut query = ListQuery::default();
        query.set_sort(SortKey::Title);
        assert_eq!(ids(&apply(&entries, &query, 20)), ["alpha", "zulu", "none"]);
    }

    #[test]
    fn test_sort_by_release_date_missing_last() {
        let mut old = entry("old", MediaType::Movie, Some("Old"), 1);
        old.snapshot.release_date = Some("1995-12-15".into());
        let mut new = entry("new", MediaType::Tv, Some("New"), 2);
        new.snapshot.first_air_date = Some("2023-05-01".into());
        let undated = entry("undated", MediaType::Movie, Some("Undated"), 3);

        let entries = vec![undated, old, new];
        let mut query = ListQuery::default();
        query.set_sort(SortKey::ReleaseDate);
        assert_eq!(ids(&apply(&entries, &query, 20)), ["new", "old", "undated"]);
    }

    #[test]
    fn test_sort_by_rating_missing_is_zero() {
        let mut good = entry("good", MediaType::Movie, Some("Good"), 1);
        good.snapshot.vote_average = Some(8.1);
        let mut meh = entry("meh", MediaType::Movie, Some("Meh"), 2);
        meh.snapshot.vote_average = Some(5.0);
        let unrated = entry("unrated", MediaType::Movie, Some("Unrated"), 3);

        let entries = vec![unrated, meh, good];
        let mut query = ListQuery::default();
        query.set_sort(SortKey::Rating);
        assert_eq!(ids(&apply(&entries, &query, 20)), ["good", "meh", "unrated"]);
    }

    #[test]
    fn test_filter_search_sort_composition() {
        let mut alpha = entry("alpha", MediaType::Movie, Some("Alpha"), 1);
        alpha.is_seen = true;
        let beta = entry("beta", MediaType::Tv, Some("Beta"), 2);
        let entries = vec![alpha, beta];

        let mut query = ListQuery::default();
        query.set_bucket(Bucket::Watched);
        assert_eq!(ids(&apply(&entries, &query, 20)), ["alpha"]);

        query.set_bucket(Bucket::Planned);
        assert_eq!(ids(&apply(&entries, &query, 20)), ["beta"]);

        query.set_bucket(Bucket::All);
        query.set_search("ALP");
        assert_eq!(ids(&apply(&entries, &query, 20)), ["alpha"]);
    }

    #[test]
    fn test_search_skips_untitled() {
        let untitled = entry("x", MediaType::Tv, None, 1);
        assert!(matches_search(&untitled, ""));
        assert!(!matches_search(&untitled, "a"));
    }

    #[test]
    fn test_pagination_and_reset() {
        let entries: Vec<_> = (1..=5)
            .map(|d| entry(&format!("e{d}"), MediaType::Movie, Some("X"), d))
            .collect();

        let mut query = ListQuery::default();
        query.set_page(2);
        let page = apply(&entries, &query, 2);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_items, 5);
        assert_eq!(ids(&page), ["e3", "e2"]);

        query.set_page(9);
        let last = apply(&entries, &query, 2);
        assert_eq!(last.page, 3);
        assert_eq!(ids(&last), ["e1"]);

        query.set_sort(SortKey::Title);
        assert_eq!(query.page, 1);
        query.set_page(2);
        query.set_search("x");
        assert_eq!(query.page, 1);
        query.set_page(2);
        query.set_bucket(Bucket::Movies);
        assert_eq!(query.page, 1);
    }

    #[test]
    fn test_empty_list_has_one_page() {
        let page = apply(&[], &ListQuery::default(), 20);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.page, 1);
        assert!(page.items.is_empty());
    }
}
