use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::media::{MediaRef, MediaSnapshot, MediaType};

const SEASON_PREFIX: &str = "season_";

/// Key of a season's episode set, e.g. `season_2`.
pub fn season_key(season: u32) -> String {
    format!("{SEASON_PREFIX}{season}")
}

pub fn parse_season_key(key: &str) -> Option<u32> {
    key.strip_prefix(SEASON_PREFIX)?.parse().ok()
}

/// Episode code, zero-padded to two digits: `S01E05`.
pub fn episode_code(season: u32, episode: u32) -> String {
    format!("S{season:02}E{episode:02}")
}

/// Parse `S<NN>E<NN>` back into `(season, episode)`.
pub fn parse_episode_code(code: &str) -> Option<(u32, u32)> {
    let rest = code.strip_prefix('S')?;
    let (season, episode) = rest.split_once('E')?;
    Some((season.parse().ok()?, episode.parse().ok()?))
}

/// Seen episodes of a show, grouped by season key.
///
/// Serializes as `{"season_1": ["S01E01", ...]}`. Empty seasons are never
/// stored, so toggling an episode twice restores the original map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeenEpisodes(BTreeMap<String, BTreeSet<String>>);

impl SeenEpisodes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeSet::is_empty)
    }

    pub fn season(&self, season: u32) -> Option<&BTreeSet<String>> {
        self.0.get(&season_key(season))
    }

    pub fn seen_in_season(&self, season: u32) -> usize {
        self.season(season).map_or(0, BTreeSet::len)
    }

    pub fn contains(&self, season: u32, episode: u32) -> bool {
        self.season(season)
            .is_some_and(|set| set.contains(&episode_code(season, episode)))
    }

    /// Flip membership of one episode. Returns `true` if it is now seen.
    pub fn toggle(&mut self, season: u32, episode: u32) -> bool {
        let key = season_key(season);
        let code = episode_code(season, episode);
        let set = self.0.entry(key.clone()).or_default();
        let now_seen = if set.remove(&code) {
            false
        } else {
            set.insert(code);
            true
        };
        if set.is_empty() {
            self.0.remove(&key);
        }
        now_seen
    }

    /// Replace a season's set wholesale. An empty set removes the season.
    pub fn set_season(&mut self, season: u32, codes: BTreeSet<String>) {
        let key = season_key(season);
        if codes.is_empty() {
            self.0.remove(&key);
        } else {
            self.0.insert(key, codes);
        }
    }

    /// Seen count across regular seasons. `season_0` and malformed keys are
    /// ignored.
    pub fn total_regular(&self) -> usize {
        self.regular_seasons().map(|(_, set)| set.len()).sum()
    }

    /// Regular seasons with at least one seen episode, ascending.
    pub fn regular_seasons(&self) -> impl Iterator<Item = (u32, &BTreeSet<String>)> {
        self.0.iter().filter_map(|(key, set)| {
            parse_season_key(key)
                .filter(|&n| n > 0)
                .map(|n| (n, set))
        })
    }
}

/// A user's watchlist record for one catalog item.
///
/// The serde shape is the stored record shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    #[serde(deserialize_with = "de_entry_id")]
    pub id: String,
    pub user_id: String,
    pub tmdb_id: u64,
    pub media_type: MediaType,
    #[serde(rename = "tmdb_data", default, deserialize_with = "null_as_default")]
    pub snapshot: MediaSnapshot,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_seen: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub seen_episodes: SeenEpisodes,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed_seasons: BTreeSet<u32>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl WatchlistEntry {
    pub fn media_ref(&self) -> MediaRef {
        MediaRef {
            tmdb_id: self.tmdb_id,
            media_type: self.media_type,
        }
    }

    pub fn is_movie(&self) -> bool {
        self.media_type == MediaType::Movie
    }

    pub fn is_tv(&self) -> bool {
        self.media_type == MediaType::Tv
    }

    pub fn display_title(&self) -> Option<&str> {
        self.snapshot.display_title(self.media_type)
    }
}

/// Insert payload: an entry before the backend assigns its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWatchlistEntry {
    pub user_id: String,
    pub tmdb_id: u64,
    pub media_type: MediaType,
    #[serde(rename = "tmdb_data")]
    pub snapshot: MediaSnapshot,
    pub poster_path: Option<String>,
    pub is_seen: bool,
    pub seen_episodes: SeenEpisodes,
    pub completed_seasons: BTreeSet<u32>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl NewWatchlistEntry {
    pub fn new(user_id: impl Into<String>, media: MediaRef, snapshot: MediaSnapshot) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            tmdb_id: media.tmdb_id,
            media_type: media.media_type,
            poster_path: snapshot.poster_path.clone(),
            snapshot,
            is_seen: false,
            seen_episodes: SeenEpisodes::new(),
            completed_seasons: BTreeSet::new(),
            created_at: now,
            last_updated: now,
        }
    }

    pub fn media_ref(&self) -> MediaRef {
        MediaRef {
            tmdb_id: self.tmdb_id,
            media_type: self.media_type,
        }
    }

    /// Attach a backend-assigned id.
    pub fn with_id(self, id: impl Into<String>) -> WatchlistEntry {
        WatchlistEntry {
            id: id.into(),
            user_id: self.user_id,
            tmdb_id: self.tmdb_id,
            media_type: self.media_type,
            snapshot: self.snapshot,
            poster_path: self.poster_path,
            is_seen: self.is_seen,
            seen_episodes: self.seen_episodes,
            completed_seasons: self.completed_seasons,
            created_at: self.created_at,
            last_updated: self.last_updated,
        }
    }
}

/// Partial update body. Absent fields are left untouched by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_seen: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seen_episodes: Option<SeenEpisodes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_seasons: Option<BTreeSet<u32>>,
    #[serde(rename = "tmdb_data", skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<MediaSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl EntryPatch {
    /// `is_seen` + `last_updated`.
    pub fn seen_state(entry: &WatchlistEntry) -> Self {
        Self {
            is_seen: Some(entry.is_seen),
            last_updated: Some(entry.last_updated),
            ..Default::default()
        }
    }

    /// `seen_episodes` + `completed_seasons` + `last_updated`.
    pub fn episode_progress(entry: &WatchlistEntry) -> Self {
        Self {
            seen_episodes: Some(entry.seen_episodes.clone()),
            completed_seasons: Some(entry.completed_seasons.clone()),
            last_updated: Some(entry.last_updated),
            ..Default::default()
        }
    }

    /// `tmdb_data` only.
    pub fn snapshot(entry: &WatchlistEntry) -> Self {
        Self {
            snapshot: Some(entry.snapshot.clone()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Write the present fields onto `entry`.
    pub fn apply_to(&self, entry: &mut WatchlistEntry) {
        if let Some(seen) = self.is_seen {
            entry.is_seen = seen;
        }
        if let Some(ref episodes) = self.seen_episodes {
            entry.seen_episodes = episodes.clone();
        }
        if let Some(ref seasons) = self.completed_seasons {
            entry.completed_seasons = seasons.clone();
        }
        if let Some(ref snapshot) = self.snapshot {
            entry.snapshot = snapshot.clone();
        }
        if let Some(ts) = self.last_updated {
            entry.last_updated = ts;
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

/// Ids are opaque; numeric ids from the backend are carried as strings.
fn de_entry_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
