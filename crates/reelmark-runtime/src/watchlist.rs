//! The watchlist store: local state mirrored to the backend with
//! optimistic updates and rollback.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;

use reelmark_api::traits::WatchlistBackend;
use reelmark_core::library::{self, BucketCounts, ListQuery};
use reelmark_core::models::{MediaRef, MediaSnapshot, NewWatchlistEntry, SeasonSummary, WatchlistEntry};
use reelmark_core::mutation::{Command, Target};

use crate::notice::Notices;
use crate::RuntimeError;

/// An in-flight write. A second write with the same key is refused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum BusyKey {
    Entry { entry_id: String, target: Target },
    Add(MediaRef),
    Remove(String),
}

#[derive(Debug, Default)]
struct State {
    /// Newest first, matching the backend's `created_at.desc` order.
    entries: Vec<WatchlistEntry>,
    busy: HashSet<BusyKey>,
}

impl State {
    fn position(&self, entry_id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.id == entry_id)
    }

    fn entry_mut(&mut self, entry_id: &str) -> Option<&mut WatchlistEntry> {
        self.entries.iter_mut().find(|e| e.id == entry_id)
    }

    fn claim(&mut self, key: &BusyKey) -> Result<(), RuntimeError> {
        if self.busy.insert(key.clone()) {
            Ok(())
        } else {
            Err(RuntimeError::Busy)
        }
    }
}

/// One page of the list view, detached from the store.
#[derive(Debug, Clone)]
pub struct ListView {
    pub items: Vec<WatchlistEntry>,
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub counts: BucketCounts,
}

/// Watchlist state for one user.
///
/// Locks are never held across a backend call; concurrent writes to
/// different entries or episodes proceed independently.
pub struct Watchlist<B: WatchlistBackend> {
    backend: Arc<B>,
    user_id: Option<String>,
    state: Arc<RwLock<State>>,
    notices: Notices,
}

impl<B: WatchlistBackend> Clone for Watchlist<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            user_id: self.user_id.clone(),
            state: Arc::clone(&self.state),
            notices: self.notices.clone(),
        }
    }
}

impl<B: WatchlistBackend> Watchlist<B> {
    /// `user_id` is `None` when signed out; every write then fails with
    /// `NotAuthenticated`.
    pub fn new(backend: B, user_id: Option<String>, notices: Notices) -> Self {
        Self {
            backend: Arc::new(backend),
            user_id,
            state: Arc::new(RwLock::new(State::default())),
            notices,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    fn require_user(&self) -> Result<&str, RuntimeError> {
        self.user_id.as_deref().ok_or(RuntimeError::NotAuthenticated)
    }

    /// Replace local state with the user's rows from the backend.
    pub async fn load(&self) -> Result<usize, RuntimeError> {
        let user_id = self.require_user()?;
        let rows = match self.backend.select_all(user_id, None).await {
            Ok(rows) => rows,
            Err(e) => {
                self.notices.error(format!("Couldn't load your watchlist: {e}"));
                return Err(RuntimeError::Api(e.to_string()));
            }
        };
        let count = rows.len();
        self.state.write().await.entries = rows;
        tracing::info!(count, "Watchlist loaded");
        Ok(count)
    }

    // ── Reads ───────────────────────────────────────────────────

    pub async fn entries(&self) -> Vec<WatchlistEntry> {
        self.state.read().await.entries.clone()
    }

    pub async fn get(&self, entry_id: &str) -> Option<WatchlistEntry> {
        let state = self.state.read().await;
        state.entries.iter().find(|e| e.id == entry_id).cloned()
    }

    pub async fn find(&self, media: MediaRef) -> Option<WatchlistEntry> {
        let state = self.state.read().await;
        state
            .entries
            .iter()
            .find(|e| e.media_ref() == media)
            .cloned()
    }

    pub async fn counts(&self) -> BucketCounts {
        library::bucket_counts(&self.state.read().await.entries)
    }

    pub async fn list(&self, query: &ListQuery, page_size: usize) -> ListView {
        let state = self.state.read().await;
        let page = library::apply(&state.entries, query, page_size);
        ListView {
            items: page.items.into_iter().cloned().collect(),
            page: page.page,
            total_pages: page.total_pages,
            total_items: page.total_items,
            counts: library::bucket_counts(&state.entries),
        }
    }

    // ── Add / remove ────────────────────────────────────────────

    /// Add a catalog item. If the user already has it, the existing entry
    /// is returned and nothing is inserted.
    pub async fn add(
        &self,
        media: MediaRef,
        snapshot: MediaSnapshot,
    ) -> Result<WatchlistEntry, RuntimeError> {
        let user_id = self.require_user()?.to_string();
        let key = BusyKey::Add(media);
        {
            let mut state = self.state.write().await;
            if let Some(existing) = state.entries.iter().find(|e| e.media_ref() == media) {
                self.notices.info("Already on your watchlist");
                return Ok(existing.clone());
            }
            state.claim(&key)?;
        }

        let result = self.insert_unless_present(&user_id, media, snapshot).await;

        let mut state = self.state.write().await;
        state.busy.remove(&key);
        match result {
            Ok((entry, inserted)) => {
                if state.position(&entry.id).is_none() {
                    state.entries.insert(0, entry.clone());
                }
                drop(state);
                if inserted {
                    tracing::info!(entry_id = %entry.id, tmdb_id = media.tmdb_id, "Added to watchlist");
                    let title = entry.display_title().unwrap_or("Title");
                    self.notices.success(format!("{title} added to your watchlist"));
                } else {
                    self.notices.info("Already on your watchlist");
                }
                Ok(entry)
            }
            Err(e) => {
                drop(state);
                self.notices.error(format!("Couldn't add to watchlist: {e}"));
                Err(e)
            }
        }
    }

    /// Backend lookup first, then insert. Returns the entry and whether it
    /// was newly created.
    async fn insert_unless_present(
        &self,
        user_id: &str,
        media: MediaRef,
        snapshot: MediaSnapshot,
    ) -> Result<(WatchlistEntry, bool), RuntimeError> {
        let existing = self
            .backend
            .find(user_id, media)
            .await
            .map_err(|e| RuntimeError::Api(e.to_string()))?;
        if let Some(entry) = existing {
            return Ok((entry, false));
        }
        let new = NewWatchlistEntry::new(user_id, media, snapshot);
        let created = self
            .backend
            .insert(&new)
            .await
            .map_err(|e| RuntimeError::Api(e.to_string()))?;
        Ok((created, true))
    }

    /// Remove one entry. On failure it is put back where it was.
    pub async fn remove(&self, entry_id: &str) -> Result<(), RuntimeError> {
        self.require_user()?;
        let key = BusyKey::Remove(entry_id.to_string());
        let (index, removed) = {
            let mut state = self.state.write().await;
            let index = state
                .position(entry_id)
                .ok_or_else(|| RuntimeError::NotFound(format!("watchlist entry {entry_id}")))?;
            state.claim(&key)?;
            (index, state.entries.remove(index))
        };

        let result = self.backend.delete(entry_id).await;

        let mut state = self.state.write().await;
        state.busy.remove(&key);
        match result {
            Ok(()) => {
                drop(state);
                tracing::info!(entry_id, "Removed from watchlist");
                self.notices.success("Removed from your watchlist");
                Ok(())
            }
            Err(e) => {
                let index = index.min(state.entries.len());
                state.entries.insert(index, removed);
                drop(state);
                self.notices.error(format!("Couldn't remove from watchlist: {e}"));
                Err(RuntimeError::Api(e.to_string()))
            }
        }
    }

    /// Remove several entries in one backend call. Unknown ids are skipped.
    /// On failure every removed entry is restored.
    pub async fn remove_many(&self, entry_ids: &[String]) -> Result<usize, RuntimeError> {
        self.require_user()?;
        let (keys, removed) = {
            let mut state = self.state.write().await;
            let keys: Vec<BusyKey> = entry_ids
                .iter()
                .filter(|id| state.position(id).is_some())
                .map(|id| BusyKey::Remove(id.clone()))
                .collect();
            if keys.iter().any(|k| state.busy.contains(k)) {
                return Err(RuntimeError::Busy);
            }
            state.busy.extend(keys.iter().cloned());

            let mut removed = Vec::new();
            let mut index = 0;
            while index < state.entries.len() {
                if entry_ids.contains(&state.entries[index].id) {
                    removed.push((index + removed.len(), state.entries.remove(index)));
                } else {
                    index += 1;
                }
            }
            (keys, removed)
        };

        if removed.is_empty() {
            return Ok(0);
        }
        let ids: Vec<String> = removed.iter().map(|(_, e)| e.id.clone()).collect();
        let result = self.backend.delete_many(&ids).await;

        let mut state = self.state.write().await;
        for key in &keys {
            state.busy.remove(key);
        }
        match result {
            Ok(()) => {
                drop(state);
                tracing::info!(count = ids.len(), "Removed entries from watchlist");
                self.notices
                    .success(format!("Removed {} entries from your watchlist", ids.len()));
                Ok(ids.len())
            }
            Err(e) => {
                for (index, entry) in removed {
                    let index = index.min(state.entries.len());
                    state.entries.insert(index, entry);
                }
                drop(state);
                self.notices.error(format!("Couldn't remove entries: {e}"));
                Err(RuntimeError::Api(e.to_string()))
            }
        }
    }

    // ── Progress ────────────────────────────────────────────────

    /// Apply a progress command locally, persist its patch, and roll back
    /// on failure with exactly one error notice.
    pub async fn apply(
        &self,
        entry_id: &str,
        command: Command,
    ) -> Result<WatchlistEntry, RuntimeError> {
        self.require_user()?;
        let key = BusyKey::Entry {
            entry_id: entry_id.to_string(),
            target: command.target(),
        };

        let mutation = {
            let mut state = self.state.write().await;
            let entry = state
                .entries
                .iter()
                .find(|e| e.id == entry_id)
                .ok_or_else(|| RuntimeError::NotFound(format!("watchlist entry {entry_id}")))?;
            let mutation = command.apply(entry).map_err(RuntimeError::Progress)?;
            state.claim(&key)?;
            if let Some(entry) = state.entry_mut(entry_id) {
                *entry = mutation.after.clone();
            }
            mutation
        };

        let result = self
            .backend
            .update(&mutation.entry_id, &mutation.patch)
            .await;

        let mut state = self.state.write().await;
        state.busy.remove(&key);
        match result {
            Ok(()) => {
                drop(state);
                tracing::info!(entry_id, %command, "Progress saved");
                Ok(mutation.after)
            }
            Err(e) => {
                if let Some(entry) = state.entry_mut(entry_id) {
                    *entry = command.revert(entry, &mutation.before);
                }
                drop(state);
                self.notices.error(format!("Couldn't save ({command}): {e}"));
                Err(RuntimeError::Api(e.to_string()))
            }
        }
    }

    pub async fn toggle_episode(
        &self,
        entry_id: &str,
        season: u32,
        episode: u32,
        episode_count: Option<u32>,
    ) -> Result<WatchlistEntry, RuntimeError> {
        self.apply(
            entry_id,
            Command::ToggleEpisode {
                season,
                episode,
                episode_count,
            },
        )
        .await
    }

    pub async fn set_season_seen(
        &self,
        entry_id: &str,
        season: u32,
        episode_count: u32,
        seen: bool,
    ) -> Result<WatchlistEntry, RuntimeError> {
        self.apply(
            entry_id,
            Command::SetSeasonSeen {
                season,
                episode_count,
                seen,
            },
        )
        .await
    }

    pub async fn toggle_movie_seen(&self, entry_id: &str) -> Result<WatchlistEntry, RuntimeError> {
        self.apply(entry_id, Command::ToggleMovieSeen).await
    }

    /// Store freshly fetched season data on an entry. Only `tmdb_data` is
    /// written.
    pub async fn backfill_seasons(
        &self,
        entry_id: &str,
        number_of_seasons: Option<u32>,
        seasons: Vec<SeasonSummary>,
    ) -> Result<WatchlistEntry, RuntimeError> {
        self.apply(
            entry_id,
            Command::BackfillSeasons {
                number_of_seasons,
                seasons,
            },
        )
        .await
    }
}
