mod account;
mod media;
mod watchlist;

pub use account::{Profile, ProfilePatch, Session};
pub use media::{Genre, MediaRef, MediaSnapshot, MediaType, SeasonSummary};
pub use watchlist::{
    episode_code, parse_episode_code, parse_season_key, season_key, EntryPatch,
    NewWatchlistEntry, SeenEpisodes, WatchlistEntry,
};
