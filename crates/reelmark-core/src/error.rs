use thiserror::Error;

use crate::models::MediaType;

#[derive(Debug, Error)]
pub enum ReelmarkError {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("expected a {expected} entry, got {found}")]
    InvalidMediaType {
        expected: MediaType,
        found: MediaType,
    },

    #[error("invalid episode S{season:02}E{episode:02}")]
    InvalidEpisode { season: u32, episode: u32 },

    #[error("not found: {0}")]
    NotFound(String),
}
