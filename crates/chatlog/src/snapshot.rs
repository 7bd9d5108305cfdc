//! Durable chat-log snapshots.

use std::{path::PathBuf, sync::Mutex};

use {async_trait::async_trait, tokio::fs, tracing::debug};

use crate::{
    Result,
    error::Context,
    log::ChatLogSnapshot,
};

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// `None` when nothing has been saved yet.
    async fn load(&self) -> Result<Option<ChatLogSnapshot>>;
    async fn save(&self, snapshot: &ChatLogSnapshot) -> Result<()>;
}

/// JSON file with atomic replace; the previous file is kept as `.bak`.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<Option<ChatLogSnapshot>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(None);
        }
        let data = fs::read_to_string(&self.path).await?;
        let snapshot: ChatLogSnapshot = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &ChatLogSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &json).await?;

        if fs::try_exists(&self.path).await.unwrap_or(false) {
            let bak = self.path.with_extension("json.bak");
            let _ = fs::rename(&self.path, &bak).await;
        }

        fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), bytes = json.len(), seqnum = snapshot.seqnum, "chat log snapshot written");
        Ok(())
    }
}

/// In-memory snapshot store. No persistence — for tests only.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    snapshot: Mutex<Option<ChatLogSnapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Option<ChatLogSnapshot> {
        self.snapshot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn load(&self) -> Result<Option<ChatLogSnapshot>> {
        Ok(self.saved())
    }

    async fn save(&self, snapshot: &ChatLogSnapshot) -> Result<()> {
        *self.snapshot.lock().unwrap_or_else(|e| e.into_inner()) = Some(snapshot.clone());
        Ok(())
    }
}
