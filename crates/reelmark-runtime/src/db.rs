use std::path::Path;

use tokio::sync::{mpsc, oneshot};

use reelmark_core::error::ReelmarkError;
use reelmark_core::library::ListQuery;
use reelmark_core::models::Session;
use reelmark_core::storage::Storage;

/// Async handle to the local SQLite store. The connection lives on its own
/// thread; requests are sent over a channel.
#[derive(Clone)]
pub struct DbHandle {
    tx: mpsc::UnboundedSender<DbCommand>,
}

enum DbCommand {
    SaveSession {
        session: Box<Session>,
        reply: oneshot::Sender<Result<(), ReelmarkError>>,
    },
    LoadSession {
        reply: oneshot::Sender<Result<Option<Session>, ReelmarkError>>,
    },
    ClearSession {
        reply: oneshot::Sender<Result<(), ReelmarkError>>,
    },
    SaveListQuery {
        query: ListQuery,
        reply: oneshot::Sender<Result<(), ReelmarkError>>,
    },
    LoadListQuery {
        reply: oneshot::Sender<Result<Option<ListQuery>, ReelmarkError>>,
    },
}

impl DbHandle {
    pub fn open(path: &Path) -> Result<Self, ReelmarkError> {
        let storage = Storage::open(path)?;
        Self::spawn(storage)
    }

    /// In-memory store (for tests).
    pub fn open_memory() -> Result<Self, ReelmarkError> {
        Self::spawn(Storage::open_memory()?)
    }

    fn spawn(storage: Storage) -> Result<Self, ReelmarkError> {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::Builder::new()
            .name("db-actor".into())
            .spawn(move || actor_loop(storage, rx))?;
        Ok(Self { tx })
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, ReelmarkError>>) -> DbCommand,
    ) -> Result<T, ReelmarkError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(make(reply));
        rx.await
            .unwrap_or_else(|_| Err(ReelmarkError::Config("DB actor closed".into())))
    }

    pub async fn save_session(&self, session: Session) -> Result<(), ReelmarkError> {
        self.request(|reply| DbCommand::SaveSession {
            session: Box::new(session),
            reply,
        })
        .await
    }

    pub async fn load_session(&self) -> Result<Option<Session>, ReelmarkError> {
        self.request(|reply| DbCommand::LoadSession { reply }).await
    }

    pub async fn clear_session(&self) -> Result<(), ReelmarkError> {
        self.request(|reply| DbCommand::ClearSession { reply }).await
    }

    pub async fn save_list_query(&self, query: ListQuery) -> Result<(), ReelmarkError> {
        self.request(|reply| DbCommand::SaveListQuery { query, reply })
            .await
    }

    pub async fn load_list_query(&self) -> Result<Option<ListQuery>, ReelmarkError> {
        self.request(|reply| DbCommand::LoadListQuery { reply }).await
    }
}

fn actor_loop(storage: Storage, mut rx: mpsc::UnboundedReceiver<DbCommand>) {
    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            DbCommand::SaveSession { session, reply } => {
                let _ = reply.send(storage.save_session(&session));
            }
            DbCommand::LoadSession { reply } => {
                let _ = reply.send(storage.load_session());
            }
            DbCommand::ClearSession { reply } => {
                let _ = reply.send(storage.clear_session());
            }
            DbCommand::SaveListQuery { query, reply } => {
                let _ = reply.send(storage.save_list_query(&query));
            }
            DbCommand::LoadListQuery { reply } => {
                let _ = reply.send(storage.load_list_query());
            }
        }
    }
    tracing::debug!("DB actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_through_actor() {
        let db = DbHandle::open_memory().unwrap();
        assert!(db.load_session().await.unwrap().is_none());

        let session = Session {
            user_id: "u-1".into(),
            email: None,
            access_token: "jwt".into(),
            refresh_token: None,
            expires_at: None,
        };
        db.save_session(session.clone()).await.unwrap();
        assert_eq!(db.load_session().await.unwrap(), Some(session));

        db.clear_session().await.unwrap();
        assert!(db.load_session().await.unwrap().is_none());
    }
}
