//! Session history
//!
//! Each workflow session appends its interactions (request, plan snapshot,
//! assembled code, inspection feedback) to a [`HistoryStore`].
//! [`JsonFileHistory`] keeps one JSON document per session:
//!
//! ```text
//! history/
//! ├── session_01JB3Q8Z4N6XK2V0C9T7R5M1PA.json
//! └── ...
//! ```

use crate::error::HistoryError;
use async_trait::async_trait;
use cadloop_graph::GraphSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use ulid::Ulid;

const DEFAULT_TITLE: &str = "New Session";
const PREVIEW_CHARS: usize = 50;

/// Identifier of one workflow session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Fresh, time-ordered id
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("session_{}", Ulid::new()))
    }

    /// Wrap an existing id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name used by [`JsonFileHistory`]
    #[must_use]
    pub fn filename(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who produced an interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Planner,
    Generator,
    Inspector,
}

/// One recorded interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<GraphSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
}

impl HistoryEntry {
    /// Entry stamped now
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            role,
            content: content.into(),
            code: None,
            plan: None,
            iteration: None,
        }
    }

    /// With code
    #[inline]
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// With plan snapshot
    #[inline]
    #[must_use]
    pub fn with_plan(mut self, plan: GraphSnapshot) -> Self {
        self.plan = Some(plan);
        self
    }

    /// With iteration number
    #[inline]
    #[must_use]
    pub fn with_iteration(mut self, iteration: u32) -> Self {
        self.iteration = Some(iteration);
        self
    }
}

/// Stored form of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl SessionDocument {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            created_at: now,
            updated_at: now,
            metadata: BTreeMap::new(),
            history: Vec::new(),
        }
    }

    /// First user request, shortened
    #[must_use]
    pub fn preview(&self) -> String {
        self.history
            .iter()
            .find(|e| e.role == Role::User)
            .map(|e| e.content.chars().take(PREVIEW_CHARS).collect())
            .unwrap_or_default()
    }
}

/// Listing entry for one stored session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub filename: String,
    pub title: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub preview: String,
}

/// Session persistence
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one interaction to a session, creating it if needed
    async fn append(&self, session: &SessionId, entry: HistoryEntry) -> Result<(), HistoryError>;

    /// All stored sessions, most recently updated first
    async fn list(&self) -> Result<Vec<SessionSummary>, HistoryError>;

    /// Load a session by file name
    async fn load(&self, filename: &str) -> Result<SessionDocument, HistoryError>;

    /// Delete a session by file name
    async fn delete(&self, filename: &str) -> Result<(), HistoryError>;
}

/// One JSON document per session under a directory
#[derive(Debug)]
pub struct JsonFileHistory {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileHistory {
    /// Store rooted at `dir`, created if missing
    ///
    /// # Errors
    /// Returns [`HistoryError::Io`] if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Base directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, filename: &str) -> Result<PathBuf, HistoryError> {
        let plain = !filename.is_empty()
            && !filename.starts_with('.')
            && !filename.contains(['/', '\\'])
            && filename.ends_with(".json");
        if plain {
            Ok(self.dir.join(filename))
        } else {
            Err(HistoryError::InvalidName(filename.to_string()))
        }
    }

    async fn read(&self, path: &Path) -> Result<SessionDocument, HistoryError> {
        let json = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[async_trait]
impl HistoryStore for JsonFileHistory {
    async fn append(&self, session: &SessionId, entry: HistoryEntry) -> Result<(), HistoryError> {
        let filename = session.filename();
        let path = self.path_for(&filename)?;
        let _guard = self.write_lock.lock().await;

        let mut doc = if fs::try_exists(&path).await? {
            self.read(&path).await?
        } else {
            SessionDocument::new(entry.timestamp)
        };

        if doc.title == DEFAULT_TITLE && entry.role == Role::User {
            doc.title = entry.content.chars().take(PREVIEW_CHARS).collect();
        }
        doc.updated_at = Utc::now();
        doc.history.push(entry);

        // write-then-rename so readers never see a partial document
        let temp = self.dir.join(format!(".{filename}.tmp"));
        fs::write(&temp, serde_json::to_string_pretty(&doc)?).await?;
        fs::rename(&temp, &path).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, HistoryError> {
        let mut sessions = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let Some(filename) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if filename.starts_with('.') || !filename.ends_with(".json") {
                continue;
            }

            let summary = match self.read(&entry.path()).await {
                Ok(doc) => SessionSummary {
                    preview: doc.preview(),
                    title: doc.title,
                    updated_at: Some(doc.updated_at),
                    filename,
                },
                Err(e) => {
                    tracing::warn!(file = %filename, error = %e, "unreadable session file");
                    SessionSummary {
                        title: filename.clone(),
                        updated_at: None,
                        preview: String::new(),
                        filename,
                    }
                }
            };
            sessions.push(summary);
        }

        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    async fn load(&self, filename: &str) -> Result<SessionDocument, HistoryError> {
        let path = self.path_for(filename)?;
        if !fs::try_exists(&path).await? {
            return Err(HistoryError::NotFound(filename.to_string()));
        }
        self.read(&path).await
    }

    async fn delete(&self, filename: &str) -> Result<(), HistoryError> {
        let path = self.path_for(filename)?;
        if !fs::try_exists(&path).await? {
            return Err(HistoryError::NotFound(filename.to_string()));
        }
        fs::remove_file(&path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store() -> (JsonFileHistory, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = JsonFileHistory::open(dir.path().join("history")).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn append_list_load_delete() {
        let (store, _dir) = store().await;
        let session = SessionId::new("session_a");

        store
            .append(&session, HistoryEntry::new(Role::User, "a chair with four legs"))
            .await
            .unwrap();
        store
            .append(
                &session,
                HistoryEntry::new(Role::Generator, "assembled")
                    .with_code("compound = 1")
                    .with_iteration(1),
            )
            .await
            .unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].filename, "session_a.json");
        assert_eq!(listed[0].title, "a chair with four legs");
        assert_eq!(listed[0].preview, "a chair with four legs");

        let doc = store.load("session_a.json").await.unwrap();
        assert_eq!(doc.history.len(), 2);
        assert_eq!(doc.history[1].code.as_deref(), Some("compound = 1"));
        assert!(doc.updated_at >= doc.created_at);

        store.delete("session_a.json").await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
        assert!(matches!(
            store.load("session_a.json").await,
            Err(HistoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn rejects_paths_outside_directory() {
        let (store, _dir) = store().await;
        assert!(matches!(
            store.load("../secrets.json").await,
            Err(HistoryError::InvalidName(_))
        ));
        assert!(matches!(
            store.delete(".hidden.json").await,
            Err(HistoryError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn unreadable_files_are_listed_by_name() {
        let (store, _dir) = store().await;
        fs::write(store.dir().join("broken.json"), "not json").await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "broken.json");
        assert!(listed[0].updated_at.is_none());
    }

    #[test]
    fn generated_ids_are_distinct() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("session_"));
        assert!(a.filename().ends_with(".json"));
    }
}
