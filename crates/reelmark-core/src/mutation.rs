//! Progress changes as commands.
//!
//! A [`Command`] turns an entry into a [`Mutation`]: the value before, the
//! value after, and the minimal patch to persist. The runtime applies
//! `after` locally, writes `patch`, and on failure uses [`Command::revert`]
//! to undo only what this command touched.

use crate::error::ReelmarkError;
use crate::models::{episode_code, EntryPatch, SeasonSummary, WatchlistEntry};
use crate::progress;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ToggleEpisode {
        season: u32,
        episode: u32,
        /// Episode count of `season` from fresh catalog data, if known.
        episode_count: Option<u32>,
    },
    SetSeasonSeen {
        season: u32,
        episode_count: u32,
        seen: bool,
    },
    ToggleMovieSeen,
    BackfillSeasons {
        number_of_seasons: Option<u32>,
        seasons: Vec<SeasonSummary>,
    },
}

/// The part of an entry a command writes. Two in-flight commands with the
/// same entry id and target would race on the same field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Episode { season: u32, episode: u32 },
    Season(u32),
    Seen,
    Seasons,
}

/// Result of applying a command to one entry.
#[derive(Debug, Clone)]
pub struct Mutation {
    pub entry_id: String,
    pub before: WatchlistEntry,
    pub after: WatchlistEntry,
    pub patch: EntryPatch,
}

impl Command {
    pub fn target(&self) -> Target {
        match *self {
            Self::ToggleEpisode {
                season, episode, ..
            } => Target::Episode { season, episode },
            Self::SetSeasonSeen { season, .. } => Target::Season(season),
            Self::ToggleMovieSeen => Target::Seen,
            Self::BackfillSeasons { .. } => Target::Seasons,
        }
    }

    pub fn apply(&self, entry: &WatchlistEntry) -> Result<Mutation, ReelmarkError> {
        let (after, patch) = match self {
            Self::ToggleEpisode {
                season,
                episode,
                episode_count,
            } => {
                let after = progress::toggle_episode(entry, *season, *episode, *episode_count)?;
                let patch = EntryPatch::episode_progress(&after);
                (after, patch)
            }
            Self::SetSeasonSeen {
                season,
                episode_count,
                seen,
            } => {
                let after = progress::set_season_seen(entry, *season, *episode_count, *seen)?;
                let patch = EntryPatch::episode_progress(&after);
                (after, patch)
            }
            Self::ToggleMovieSeen => {
                let after = progress::toggle_movie_seen(entry)?;
                let patch = EntryPatch::seen_state(&after);
                (after, patch)
            }
            Self::BackfillSeasons {
                number_of_seasons,
                seasons,
            } => {
                let after = progress::backfill_seasons(entry, *number_of_seasons, seasons.clone())?;
                let patch = EntryPatch::snapshot(&after);
                (after, patch)
            }
        };

        Ok(Mutation {
            entry_id: entry.id.clone(),
            before: entry.clone(),
            after,
            patch,
        })
    }

    /// Undo this command on `current`, restoring only the fields it touched
    /// from `before`. Changes made to other seasons or episodes in the
    /// meantime survive, and the touched season's completion is recomputed
    /// from the restored episode set.
    pub fn revert(&self, current: &WatchlistEntry, before: &WatchlistEntry) -> WatchlistEntry {
        let mut restored = current.clone();
        match *self {
            Self::ToggleEpisode {
                season,
                episode,
                episode_count,
            } => {
                if current.seen_episodes.contains(season, episode)
                    != before.seen_episodes.contains(season, episode)
                {
                    restored.seen_episodes.toggle(season, episode);
                }
                progress::sync_season_completion(
                    &restored.seen_episodes,
                    &mut restored.completed_seasons,
                    season,
                    episode_count,
                );
                restored.last_updated = before.last_updated;
            }
            Self::SetSeasonSeen {
                season,
                episode_count,
                ..
            } => {
                let codes = before.seen_episodes.season(season).cloned().unwrap_or_default();
                restored.seen_episodes.set_season(season, codes);
                progress::sync_season_completion(
                    &restored.seen_episodes,
                    &mut restored.completed_seasons,
                    season,
                    Some(episode_count),
                );
                restored.last_updated = before.last_updated;
            }
            Self::ToggleMovieSeen => {
                restored.is_seen = before.is_seen;
                restored.last_updated = before.last_updated;
            }
            Self::BackfillSeasons { .. } => {
                restored.snapshot.number_of_seasons = before.snapshot.number_of_seasons;
                restored.snapshot.seasons = before.snapshot.seasons.clone();
            }
        }
        restored
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ToggleEpisode {
                season, episode, ..
            } => write!(f, "toggle {}", episode_code(*season, *episode)),
            Self::SetSeasonSeen { season, seen, .. } => {
                let verb = if *seen { "mark" } else { "clear" };
                write!(f, "{verb} season {season}")
            }
            Self::ToggleMovieSeen => write!(f, "toggle seen"),
            Self::BackfillSeasons { .. } => write!(f, "update season list"),
        }
    }
}
