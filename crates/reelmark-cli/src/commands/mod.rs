pub mod auth;
pub mod browse;
pub mod config;
pub mod library;
pub mod profile;
pub mod progress;

use clap::ValueEnum;

use reelmark_core::library::{Bucket, SortKey};
use reelmark_core::models::{MediaRef, MediaType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Movie,
    Tv,
}

impl KindArg {
    pub fn media_ref(self, id: u64) -> MediaRef {
        match self {
            Self::Movie => MediaRef::movie(id),
            Self::Tv => MediaRef::tv(id),
        }
    }
}

impl From<KindArg> for MediaType {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Movie => MediaType::Movie,
            KindArg::Tv => MediaType::Tv,
        }
    }
}

pub fn parse_bucket(raw: &str) -> Result<Bucket, String> {
    Bucket::from_db_str(&raw.to_ascii_lowercase()).ok_or_else(|| {
        let names: Vec<_> = Bucket::ALL.iter().map(|b| b.as_db_str()).collect();
        format!("unknown filter '{raw}' (expected one of: {})", names.join(", "))
    })
}

pub fn parse_sort(raw: &str) -> Result<SortKey, String> {
    let normalized = raw.to_ascii_lowercase().replace('-', "_");
    SortKey::from_db_str(&normalized).ok_or_else(|| {
        let names: Vec<_> = SortKey::ALL.iter().map(|s| s.as_db_str()).collect();
        format!("unknown sort '{raw}' (expected one of: {})", names.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_options() {
        assert_eq!(parse_bucket("Watching"), Ok(Bucket::Watching));
        assert_eq!(parse_bucket("tv"), Ok(Bucket::Tv));
        assert!(parse_bucket("anime").unwrap_err().contains("planned"));

        assert_eq!(parse_sort("release-date"), Ok(SortKey::ReleaseDate));
        assert_eq!(parse_sort("added_date"), Ok(SortKey::AddedDate));
        assert!(parse_sort("popularity").is_err());
    }
}
