//! Durable storage of games.
//!
//! The store is the collaborator that outlives the in-memory cache. It is
//! addressed by game id and behaves like a table: a lookup returns every
//! matching row, so integrity problems surface to the caller instead of
//! being resolved here.

mod file;

pub use file::JsonFileStore;

use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};

use crate::error::StoreError;
use crate::game::Stone;
use crate::models::{SessionId, SessionRecord};

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// All rows stored under `id`.
    async fn load_session(&self, id: SessionId) -> Result<Vec<SessionRecord>, StoreError>;

    /// Overwrite the row stored under `id`.
    async fn save_session(&self, id: SessionId, record: &SessionRecord) -> Result<(), StoreError>;

    /// Every stored row, in no particular order.
    async fn list_sessions(&self) -> Result<Vec<SessionRecord>, StoreError>;

    /// Insert a new game created by `creator` and return its id.
    async fn create_session(&self, creator: &str, first: Stone) -> Result<SessionId, StoreError>;
}

/// Store that keeps rows in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<SessionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row as-is, duplicates included.
    pub fn insert_row(&self, record: SessionRecord) {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    /// Current rows stored under `id`.
    pub fn rows(&self, id: SessionId) -> Vec<SessionRecord> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.id == id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load_session(&self, id: SessionId) -> Result<Vec<SessionRecord>, StoreError> {
        Ok(self.rows(id))
    }

    async fn save_session(&self, id: SessionId, record: &SessionRecord) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let mut found = false;
        for row in rows.iter_mut().filter(|r| r.id == id) {
            *row = record.clone();
            found = true;
        }
        if found {
            Ok(())
        } else {
            Err(StoreError::NotFound(id))
        }
    }

    async fn list_sessions(&self) -> Result<Vec<SessionRecord>, StoreError> {
        Ok(self.rows.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    async fn create_session(&self, creator: &str, first: Stone) -> Result<SessionId, StoreError> {
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let id = rows.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        rows.push(SessionRecord::new_game(id, creator.to_string(), first)?);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Status;

    #[actix_rt::test]
    async fn test_memory_store_create_load_save() {
        let store = MemoryStore::new();
        let id = store.create_session("alice", Stone::White).await.unwrap();
        assert_eq!(id, 1);

        let rows = store.load_session(id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, Status::New);
        assert_eq!(rows[0].player1.as_deref(), Some("alice"));

        let mut record = rows[0].clone();
        record.player2 = Some("bob".to_string());
        record.status = Status::InProgress;
        store.save_session(id, &record).await.unwrap();
        assert_eq!(store.load_session(id).await.unwrap(), vec![record]);

        assert_eq!(store.create_session("carol", Stone::Black).await.unwrap(), 2);
        assert_eq!(store.list_sessions().await.unwrap().len(), 2);
    }

    #[actix_rt::test]
    async fn test_memory_store_missing_rows() {
        let store = MemoryStore::new();
        assert!(store.load_session(9).await.unwrap().is_empty());

        let record = SessionRecord::new_game(9, "x".to_string(), Stone::Black).unwrap();
        assert!(matches!(
            store.save_session(9, &record).await,
            Err(StoreError::NotFound(9))
        ));
    }

    #[actix_rt::test]
    async fn test_memory_store_keeps_duplicates() {
        let store = MemoryStore::new();
        let record = SessionRecord::new_game(4, "x".to_string(), Stone::Black).unwrap();
        store.insert_row(record.clone());
        store.insert_row(record);
        assert_eq!(store.load_session(4).await.unwrap().len(), 2);
    }
}
