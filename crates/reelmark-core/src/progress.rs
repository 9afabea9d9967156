//! Watch-progress derivation.
//!
//! Every function here is pure: it takes an entry by reference and returns a
//! new value, leaving the input untouched so callers can keep the previous
//! state around for rollback.

use std::collections::BTreeSet;

use chrono::Utc;

use crate::error::ReelmarkError;
use crate::models::{episode_code, MediaType, SeasonSummary, SeenEpisodes, WatchlistEntry};

/// Where an entry sits in the planned → watching → watched progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchState {
    Planned,
    Watching,
    Watched,
}

impl WatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "Planned",
            Self::Watching => "Watching",
            Self::Watched => "Watched",
        }
    }
}

impl std::fmt::Display for WatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Seen vs. total, for list rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub seen: u32,
    pub total: Option<u32>,
}

impl Progress {
    /// Completion ratio in `0.0..=1.0`, or `None` if the total is unknown.
    pub fn fraction(&self) -> Option<f32> {
        let total = self.total.filter(|&t| t > 0)?;
        Some((self.seen as f32 / total as f32).min(1.0))
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.total {
            Some(total) => write!(f, "{}/{}", self.seen, total),
            None => write!(f, "{}/?", self.seen),
        }
    }
}

fn require(entry: &WatchlistEntry, expected: MediaType) -> Result<(), ReelmarkError> {
    if entry.media_type == expected {
        Ok(())
    } else {
        Err(ReelmarkError::InvalidMediaType {
            expected,
            found: entry.media_type,
        })
    }
}

fn require_regular_episode(season: u32, episode: u32) -> Result<(), ReelmarkError> {
    if season == 0 || episode == 0 {
        return Err(ReelmarkError::InvalidEpisode { season, episode });
    }
    Ok(())
}

/// Recompute whether `season` is complete.
///
/// The single place where `completed_seasons` is derived from
/// `seen_episodes`. An unknown (or zero) episode count never completes a
/// season.
pub fn sync_season_completion(
    seen: &SeenEpisodes,
    completed: &mut BTreeSet<u32>,
    season: u32,
    known_episode_count: Option<u32>,
) {
    let is_complete = known_episode_count
        .filter(|&count| count > 0)
        .is_some_and(|count| seen.seen_in_season(season) == count as usize);
    if is_complete {
        completed.insert(season);
    } else {
        completed.remove(&season);
    }
}

/// Flip one episode between seen and unseen.
///
/// `known_episode_count` comes from the caller's catalog data, since the
/// entry's own snapshot may be stale. Only `season`'s completion is
/// recomputed; other seasons are left alone. An episode past a known
/// count is rejected.
pub fn toggle_episode(
    entry: &WatchlistEntry,
    season: u32,
    episode: u32,
    known_episode_count: Option<u32>,
) -> Result<WatchlistEntry, ReelmarkError> {
    require(entry, MediaType::Tv)?;
    require_regular_episode(season, episode)?;
    if known_episode_count.is_some_and(|count| count > 0 && episode > count) {
        return Err(ReelmarkError::InvalidEpisode { season, episode });
    }

    let mut next = entry.clone();
    next.seen_episodes.toggle(season, episode);
    sync_season_completion(
        &next.seen_episodes,
        &mut next.completed_seasons,
        season,
        known_episode_count,
    );
    next.last_updated = Utc::now();
    Ok(next)
}

/// Mark every episode of a season seen, or clear the season.
pub fn set_season_seen(
    entry: &WatchlistEntry,
    season: u32,
    episode_count: u32,
    seen: bool,
) -> Result<WatchlistEntry, ReelmarkError> {
    require(entry, MediaType::Tv)?;
    require_regular_episode(season, episode_count.max(1))?;

    let mut next = entry.clone();
    let codes = if seen {
        (1..=episode_count)
            .map(|ep| episode_code(season, ep))
            .collect()
    } else {
        BTreeSet::new()
    };
    next.seen_episodes.set_season(season, codes);
    sync_season_completion(
        &next.seen_episodes,
        &mut next.completed_seasons,
        season,
        Some(episode_count),
    );
    next.last_updated = Utc::now();
    Ok(next)
}

/// Flip a movie's seen flag. Calling this on a TV entry is an error.
pub fn toggle_movie_seen(entry: &WatchlistEntry) -> Result<WatchlistEntry, ReelmarkError> {
    require(entry, MediaType::Movie)?;

    let mut next = entry.clone();
    next.is_seen = !next.is_seen;
    next.last_updated = Utc::now();
    Ok(next)
}

/// Seen regular episodes of a show (0 for movies).
pub fn seen_episode_count(entry: &WatchlistEntry) -> usize {
    match entry.media_type {
        MediaType::Movie => 0,
        MediaType::Tv => entry.seen_episodes.total_regular(),
    }
}

/// Movies: the seen flag. TV: every known episode seen; an unknown total is
/// never treated as complete.
pub fn is_fully_watched(entry: &WatchlistEntry) -> bool {
    match entry.media_type {
        MediaType::Movie => entry.is_seen,
        MediaType::Tv => entry
            .snapshot
            .total_episode_count()
            .is_some_and(|total| seen_episode_count(entry) == total as usize),
    }
}

pub fn watch_state(entry: &WatchlistEntry) -> WatchState {
    if is_fully_watched(entry) {
        return WatchState::Watched;
    }
    match entry.media_type {
        MediaType::Tv if seen_episode_count(entry) > 0 => WatchState::Watching,
        _ => WatchState::Planned,
    }
}

pub fn progress(entry: &WatchlistEntry) -> Progress {
    match entry.media_type {
        MediaType::Movie => Progress {
            seen: u32::from(entry.is_seen),
            total: Some(1),
        },
        MediaType::Tv => Progress {
            seen: u32::try_from(seen_episode_count(entry)).unwrap_or(u32::MAX),
            total: entry.snapshot.total_episode_count(),
        },
    }
}

/// A TV entry whose snapshot carries no season list.
pub fn needs_season_backfill(entry: &WatchlistEntry) -> bool {
    entry.is_tv() && entry.snapshot.seasons.is_empty()
}

/// Replace the snapshot's season data with freshly fetched values.
pub fn backfill_seasons(
    entry: &WatchlistEntry,
    number_of_seasons: Option<u32>,
    seasons: Vec<SeasonSummary>,
) -> Result<WatchlistEntry, ReelmarkError> {
    require(entry, MediaType::Tv)?;

    let mut next = entry.clone();
    next.snapshot.number_of_seasons = number_of_seasons;
    next.snapshot.seasons = seasons;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::models::{MediaSnapshot, MediaType, SeasonSummary};

    fn season(n: u32, count: u32) -> SeasonSummary {
        SeasonSummary {
            season_number: n,
            episode_count: count,
            name: None,
            air_date: None,
            poster_path: None,
        }
    }

    fn tv(seasons: Vec<SeasonSummary>) -> WatchlistEntry {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        WatchlistEntry {
            id: "e-1".into(),
            user_id: "u-1".into(),
            tmdb_id: 1399,
            media_type: MediaType::Tv,
            snapshot: MediaSnapshot {
                name: Some("Test Show".into()),
                seasons,
                ..Default::default()
            },
            poster_path: None,
            is_seen: false,
            seen_episodes: SeenEpisodes::new(),
            completed_seasons: BTreeSet::new(),
            created_at: ts,
            last_updated: ts,
        }
    }

    fn movie() -> WatchlistEntry {
        WatchlistEntry {
            media_type: MediaType::Movie,
            snapshot: MediaSnapshot {
                title: Some("Test Movie".into()),
                ..Default::default()
            },
            ..tv(vec![])
        }
    }

    fn without_timestamp(mut entry: WatchlistEntry) -> WatchlistEntry {
        entry.last_updated = entry.created_at;
        entry
    }

    #[test]
    fn test_double_toggle_is_identity() {
        let original = tv(vec![season(1, 2), season(2, 3)]);
        let mut start = toggle_episode(&original, 2, 1, Some(3)).unwrap();
        start.last_updated = original.last_updated;

        for (s, e, c) in [(1, 1, Some(2)), (1, 2, Some(2)), (2, 3, Some(3)), (3, 1, None)] {
            let once = toggle_episode(&start, s, e, c).unwrap();
            let twice = toggle_episode(&once, s, e, c).unwrap();
            assert_eq!(without_timestamp(twice), without_timestamp(start.clone()));
        }
    }

    #[test]
    fn test_completion_tracks_episode_set() {
        let mut entry = tv(vec![season(1, 3), season(2, 2)]);
        let steps = [(1, 1), (2, 1), (1, 2), (2, 2), (1, 3), (2, 1), (1, 2), (1, 2)];
        for (s, e) in steps {
            let count = entry.snapshot.episode_count(s);
            entry = toggle_episode(&entry, s, e, count).unwrap();
            for (n, set) in entry.seen_episodes.regular_seasons() {
                let expected = entry.snapshot.episode_count(n) == Some(set.len() as u32);
                assert_eq!(entry.completed_seasons.contains(&n), expected, "season {n}");
            }
        }
        assert_eq!(entry.completed_seasons, BTreeSet::from([1]));
    }

    #[test]
    fn test_toggle_only_touches_target_season_completion() {
        let mut entry = tv(vec![season(1, 1), season(2, 2)]);
        entry = toggle_episode(&entry, 1, 1, Some(1)).unwrap();
        assert!(entry.completed_seasons.contains(&1));

        entry = toggle_episode(&entry, 2, 1, Some(2)).unwrap();
        assert_eq!(entry.completed_seasons, BTreeSet::from([1]));
    }

    #[test]
    fn test_unknown_count_never_completes() {
        let entry = tv(vec![]);
        let next = toggle_episode(&entry, 1, 1, None).unwrap();
        assert!(next.completed_seasons.is_empty());
        let next = toggle_episode(&entry, 1, 1, Some(0)).unwrap();
        assert!(next.completed_seasons.is_empty());
    }

    #[test]
    fn test_episode_past_known_count_rejected() {
        let mut entry = tv(vec![season(1, 3)]);
        entry = toggle_episode(&entry, 1, 1, Some(3)).unwrap();
        entry = toggle_episode(&entry, 1, 2, Some(3)).unwrap();
        assert!(matches!(
            toggle_episode(&entry, 1, 9, Some(3)),
            Err(ReelmarkError::InvalidEpisode {
                season: 1,
                episode: 9
            })
        ));
        assert!(entry.completed_seasons.is_empty());
        assert!(!is_fully_watched(&entry));

        // Without a known count the episode is taken as given.
        let next = toggle_episode(&entry, 1, 9, None).unwrap();
        assert!(next.seen_episodes.contains(1, 9));
        assert!(next.completed_seasons.is_empty());
    }

    #[test]
    fn test_toggle_bumps_last_updated() {
        let entry = tv(vec![season(1, 3)]);
        let next = toggle_episode(&entry, 1, 1, Some(3)).unwrap();
        assert!(next.last_updated > entry.last_updated);
    }

    #[test]
    fn test_field_isolation() {
        let mut m = movie();
        m.seen_episodes.toggle(1, 1);
        m.completed_seasons.insert(1);
        let next = toggle_movie_seen(&m).unwrap();
        assert!(next.is_seen);
        assert_eq!(next.seen_episodes, m.seen_episodes);
        assert_eq!(next.completed_seasons, m.completed_seasons);

        let mut show = tv(vec![season(1, 2)]);
        show.is_seen = true;
        let next = toggle_episode(&show, 1, 1, Some(2)).unwrap();
        assert!(next.is_seen);
    }

    #[test]
    fn test_media_type_contract() {
        assert!(matches!(
            toggle_movie_seen(&tv(vec![])),
            Err(ReelmarkError::InvalidMediaType {
                expected: MediaType::Movie,
                found: MediaType::Tv
            })
        ));
        assert!(toggle_episode(&movie(), 1, 1, Some(1)).is_err());
    }

    #[test]
    fn test_specials_rejected() {
        let entry = tv(vec![season(0, 3), season(1, 3)]);
        assert!(matches!(
            toggle_episode(&entry, 0, 1, Some(3)),
            Err(ReelmarkError::InvalidEpisode { season: 0, .. })
        ));
        assert!(toggle_episode(&entry, 1, 0, Some(3)).is_err());
    }

    #[test]
    fn test_three_episode_scenario() {
        let mut entry = tv(vec![season(1, 3)]);
        for ep in 1..=3 {
            entry = toggle_episode(&entry, 1, ep, Some(3)).unwrap();
        }
        assert_eq!(entry.completed_seasons, BTreeSet::from([1]));
        assert!(is_fully_watched(&entry));
        assert_eq!(watch_state(&entry), WatchState::Watched);

        entry = toggle_episode(&entry, 1, 2, Some(3)).unwrap();
        assert!(entry.completed_seasons.is_empty());
        assert!(!is_fully_watched(&entry));
        assert_eq!(watch_state(&entry), WatchState::Watching);
        assert_eq!(progress(&entry).to_string(), "2/3");
    }

    #[test]
    fn test_fully_watched_requires_known_total() {
        let mut entry = tv(vec![]);
        entry = toggle_episode(&entry, 1, 1, None).unwrap();
        assert!(!is_fully_watched(&entry));
        assert_eq!(watch_state(&entry), WatchState::Watching);
        assert_eq!(progress(&entry).fraction(), None);
    }

    #[test]
    fn test_set_season_seen() {
        let entry = tv(vec![season(1, 4), season(2, 2)]);
        let next = set_season_seen(&entry, 1, 4, true).unwrap();
        assert_eq!(next.seen_episodes.seen_in_season(1), 4);
        assert!(next.completed_seasons.contains(&1));

        let cleared = set_season_seen(&next, 1, 4, false).unwrap();
        assert!(cleared.seen_episodes.is_empty());
        assert!(cleared.completed_seasons.is_empty());
    }

    #[test]
    fn test_movie_states() {
        let m = movie();
        assert_eq!(watch_state(&m), WatchState::Planned);
        let seen = toggle_movie_seen(&m).unwrap();
        assert_eq!(watch_state(&seen), WatchState::Watched);
        assert_eq!(progress(&seen).fraction(), Some(1.0));
    }

    #[test]
    fn test_backfill() {
        let entry = tv(vec![]);
        assert!(needs_season_backfill(&entry));
        let next = backfill_seasons(&entry, Some(2), vec![season(1, 8), season(2, 8)]).unwrap();
        assert!(!needs_season_backfill(&next));
        assert_eq!(next.snapshot.number_of_seasons, Some(2));
        assert_eq!(next.snapshot.total_episode_count(), Some(16));
        assert!(!needs_season_backfill(&movie()));
    }
}
