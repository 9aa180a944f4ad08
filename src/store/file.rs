use async_trait::async_trait;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::SessionStore;
use crate::error::StoreError;
use crate::game::Stone;
use crate::models::{SessionId, SessionRecord};

/// Store that keeps one JSON file per game in a directory.
///
/// Files are named `<id>.json`. Writes go through a temporary file and a
/// rename so a crash never leaves a half-written game behind.
pub struct JsonFileStore {
    dir: PathBuf,
    next_id: Mutex<SessionId>,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn id_of(path: &Path) -> Option<SessionId> {
    if path.extension()? != "json" {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

impl JsonFileStore {
    /// Open (creating if needed) the store rooted at `dir`.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir).map_err(io_error(dir))?;

        let mut max_id = 0;
        for entry in fs::read_dir(dir).map_err(io_error(dir))? {
            let entry = entry.map_err(io_error(dir))?;
            if let Some(id) = id_of(&entry.path()) {
                max_id = max_id.max(id);
            }
        }

        info!("Opened game store at {}, next id {}", dir.display(), max_id + 1);
        Ok(JsonFileStore {
            dir: dir.to_path_buf(),
            next_id: Mutex::new(max_id + 1),
        })
    }

    fn path_for(&self, id: SessionId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    async fn write(&self, id: SessionId, record: &SessionRecord) -> Result<(), StoreError> {
        let path = self.path_for(id);
        // Unique per write: saves of the same game may overlap.
        let tmp = self.dir.join(format!("{}.{}.tmp", id, Uuid::new_v4().simple()));
        let contents = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(io_error(&tmp))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(io_error(&path))?;
        debug!("Wrote game {} to {}", id, path.display());
        Ok(())
    }
}

#[async_trait]
impl SessionStore for JsonFileStore {
    async fn load_session(&self, id: SessionId) -> Result<Vec<SessionRecord>, StoreError> {
        let path = self.path_for(id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(vec![serde_json::from_slice(&bytes)?]),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    async fn save_session(&self, id: SessionId, record: &SessionRecord) -> Result<(), StoreError> {
        if !tokio::fs::try_exists(self.path_for(id))
            .await
            .map_err(io_error(&self.dir))?
        {
            return Err(StoreError::NotFound(id));
        }
        self.write(id, record).await
    }

    async fn list_sessions(&self) -> Result<Vec<SessionRecord>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(io_error(&self.dir))?;
        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error(&self.dir))? {
            let path = entry.path();
            if id_of(&path).is_none() {
                continue;
            }
            let bytes = tokio::fs::read(&path).await.map_err(io_error(&path))?;
            records.push(serde_json::from_slice(&bytes)?);
        }
        Ok(records)
    }

    async fn create_session(&self, creator: &str, first: Stone) -> Result<SessionId, StoreError> {
        let mut next_id = self.next_id.lock().await;
        let id = *next_id;
        let record = SessionRecord::new_game(id, creator.to_string(), first)?;
        self.write(id, &record).await?;
        *next_id += 1;
        info!("Created game {} for {}", id, creator);
        Ok(id)
    }
}
