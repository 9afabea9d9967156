use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Kind of catalog item a watchlist entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "Movie",
            Self::Tv => "TV",
        }
    }

    /// Wire representation (`"movie"` / `"tv"`).
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "movie" => Some(Self::Movie),
            "tv" => Some(Self::Tv),
            _ => None,
        }
    }

    pub const ALL: &[MediaType] = &[Self::Movie, Self::Tv];
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

/// Identifies a catalog item. Immutable once an entry is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaRef {
    pub tmdb_id: u64,
    pub media_type: MediaType,
}

impl MediaRef {
    pub fn movie(tmdb_id: u64) -> Self {
        Self {
            tmdb_id,
            media_type: MediaType::Movie,
        }
    }

    pub fn tv(tmdb_id: u64) -> Self {
        Self {
            tmdb_id,
            media_type: MediaType::Tv,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: u64,
    pub name: String,
}

/// Per-season summary as listed on a TV show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonSummary {
    pub season_number: u32,
    #[serde(default)]
    pub episode_count: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub air_date: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
}

impl SeasonSummary {
    /// Season 0 holds specials and never counts towards completion.
    pub fn is_specials(&self) -> bool {
        self.season_number == 0
    }
}

/// Denormalized copy of catalog fields taken when the entry was added.
///
/// Field names follow the catalog JSON so the blob can be stored and read
/// back without translation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f32>,
    #[serde(default)]
    pub vote_count: Option<u32>,
    #[serde(default)]
    pub popularity: Option<f32>,
    #[serde(default)]
    pub original_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_seasons: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_episodes: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seasons: Vec<SeasonSummary>,
}

impl MediaSnapshot {
    /// Display title: `title` for movies, `name` for TV.
    pub fn display_title(&self, media_type: MediaType) -> Option<&str> {
        let title = match media_type {
            MediaType::Movie => self.title.as_deref(),
            MediaType::Tv => self.name.as_deref(),
        };
        title.filter(|t| !t.trim().is_empty())
    }

    /// Release date for movies, first air date for TV.
    pub fn release_date(&self, media_type: MediaType) -> Option<NaiveDate> {
        let raw = match media_type {
            MediaType::Movie => self.release_date.as_deref(),
            MediaType::Tv => self.first_air_date.as_deref(),
        }?;
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
    }

    /// Known episode count for a regular season. `None` when unknown or zero.
    pub fn episode_count(&self, season_number: u32) -> Option<u32> {
        self.seasons
            .iter()
            .find(|s| s.season_number == season_number && !s.is_specials())
            .map(|s| s.episode_count)
            .filter(|&n| n > 0)
    }

    /// Total number of regular (non-special) episodes, when known.
    ///
    /// Prefers the per-season list; falls back to `number_of_episodes`.
    pub fn total_episode_count(&self) -> Option<u32> {
        let from_seasons: u32 = self
            .seasons
            .iter()
            .filter(|s| !s.is_specials())
            .map(|s| s.episode_count)
            .sum();
        if from_seasons > 0 {
            return Some(from_seasons);
        }
        self.number_of_episodes.filter(|&n| n > 0)
    }

    /// Regular seasons in ascending order.
    pub fn regular_seasons(&self) -> impl Iterator<Item = &SeasonSummary> {
        self.seasons.iter().filter(|s| !s.is_specials())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn show() -> MediaSnapshot {
        MediaSnapshot {
            name: Some("Severance".into()),
            first_air_date: Some("2022-02-17".into()),
            number_of_episodes: Some(19),
            seasons: vec![
                SeasonSummary {
                    season_number: 0,
                    episode_count: 4,
                    name: Some("Specials".into()),
                    air_date: None,
                    poster_path: None,
                },
                SeasonSummary {
                    season_number: 1,
                    episode_count: 9,
                    name: Some("Season 1".into()),
                    air_date: None,
                    poster_path: None,
                },
                SeasonSummary {
                    season_number: 2,
                    episode_count: 10,
                    name: Some("Season 2".into()),
                    air_date: None,
                    poster_path: None,
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_specials_excluded_from_totals() {
        let snap = show();
        assert_eq!(snap.total_episode_count(), Some(19));
        assert_eq!(snap.episode_count(0), None);
        assert_eq!(snap.episode_count(2), Some(10));
        assert_eq!(snap.regular_seasons().count(), 2);
    }

    #[test]
    fn test_total_falls_back_to_number_of_episodes() {
        let snap = MediaSnapshot {
            number_of_episodes: Some(12),
            ..Default::default()
        };
        assert_eq!(snap.total_episode_count(), Some(12));
        assert_eq!(MediaSnapshot::default().total_episode_count(), None);
    }

    #[test]
    fn test_display_title_per_media_type() {
        let snap = show();
        assert_eq!(snap.display_title(MediaType::Tv), Some("Severance"));
        assert_eq!(snap.display_title(MediaType::Movie), None);
        assert_eq!(
            snap.release_date(MediaType::Tv),
            NaiveDate::from_ymd_opt(2022, 2, 17)
        );
    }

    #[test]
    fn test_media_type_wire_format() {
        assert_eq!(serde_json::to_string(&MediaType::Tv).unwrap(), "\"tv\"");
        assert_eq!(MediaType::from_db_str("movie"), Some(MediaType::Movie));
        assert_eq!(MediaType::from_db_str("person"), None);
    }
}
