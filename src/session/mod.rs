//! Session and conversation state management.
//!
//! `SessionStore` owns the on-disk layout documented in the external
//! interfaces: one directory per session id under the chats root, holding
//! `session.json` plus a lazily-created `attachments/` subdirectory. All
//! mutation goes through a single in-process store so writes to a given
//! `session.json` are serialized, matching the "single mutator task"
//! ordering guarantee.

pub mod history;
pub mod types;

pub use history::HistoryManager;
pub use types::{
    Attachment, BoundaryKind, ChatMessage, ContentPart, FunctionCall, FunctionResult, Role,
    Session, UsageMetrics,
};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AgentError, Result};

#[derive(Debug, Clone)]
pub struct SessionHeader {
    pub id: Uuid,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_modified_at: chrono::DateTime<chrono::Utc>,
    pub initial_prompt: String,
}

pub struct SessionStore {
    chats_root: PathBuf,
    /// Guards whichever session is currently active in the CLI/TUI process.
    /// Sessions not currently open are read fresh from disk on each lookup;
    /// this lock only needs to serialize writes to the one session a single
    /// interactive process has open at a time.
    active: RwLock<Option<Session>>,
}

impl SessionStore {
    pub fn new(chats_root: impl Into<PathBuf>) -> Self {
        Self {
            chats_root: chats_root.into(),
            active: RwLock::new(None),
        }
    }

    fn session_dir(&self, id: &Uuid) -> PathBuf {
        self.chats_root.join(id.to_string())
    }

    fn session_json_path(&self, id: &Uuid) -> PathBuf {
        self.session_dir(id).join("session.json")
    }

    /// Load an existing session from disk, or create and persist a fresh
    /// one if `id` is `None`.
    pub async fn get_or_create(&self, id: Option<Uuid>) -> Result<Session> {
        let session = match id {
            Some(id) => self.load(&id).await?,
            None => {
                let session = Session::new();
                self.save(&session).await?;
                session
            }
        };
        *self.active.write().await = Some(session.clone());
        Ok(session)
    }

    /// Load a session by id, recovering from a corrupted JSON file per
    /// §4.3: rename to `.corrupted` and return a fresh empty session
    /// rather than ever crashing.
    pub async fn load(&self, id: &Uuid) -> Result<Session> {
        let path = self.session_json_path(id);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AgentError::NotFound(format!("session {id}")));
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Session>(&text) {
            Ok(session) => Ok(session),
            Err(e) => {
                warn!(session = %id, error = %e, "session.json malformed, recovering");
                let corrupted = self.session_dir(id).join("session.json.corrupted");
                tokio::fs::rename(&path, &corrupted).await?;
                let mut fresh = Session::new();
                fresh.id = Uuid::now_v7();
                self.save(&fresh).await?;
                Ok(fresh)
            }
        }
    }

    /// Atomic write: serialize, write `session.json.new`, rename over
    /// `session.json`. The temp file lives in the same directory so the
    /// rename stays on one volume and is genuinely atomic.
    pub async fn save(&self, session: &Session) -> Result<()> {
        let dir = self.session_dir(&session.id);
        tokio::fs::create_dir_all(&dir).await?;
        let final_path = dir.join("session.json");
        let tmp_path = dir.join("session.json.new");
        let text = serde_json::to_string_pretty(session)?;
        tokio::fs::write(&tmp_path, text).await?;
        tokio::fs::rename(&tmp_path, &final_path).await?;
        info!(session = %session.id, messages = session.history.len(), "session persisted");
        Ok(())
    }

    /// Append a completed message, persisting immediately. Pending
    /// (in-progress) content never reaches this method.
    pub async fn append_and_save(&self, session: &mut Session, message: ChatMessage) -> Result<()> {
        session.append(message);
        self.save(session).await?;
        *self.active.write().await = Some(session.clone());
        Ok(())
    }

    /// Enumerate chats-root subdirectories, read each `session.json`
    /// header, and sort by `lastModifiedAt` descending, capped to `limit`.
    pub async fn list(&self, limit: usize) -> Result<Vec<SessionHeader>> {
        let mut headers = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.chats_root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let json_path = entry.path().join("session.json");
            let Ok(text) = tokio::fs::read_to_string(&json_path).await else {
                continue;
            };
            let Ok(session) = serde_json::from_str::<Session>(&text) else {
                continue;
            };
            headers.push(SessionHeader {
                id: session.id,
                name: session.name,
                created_at: session.created_at,
                last_modified_at: session.last_modified_at,
                initial_prompt: session.initial_prompt,
            });
        }

        headers.sort_by(|a, b| b.last_modified_at.cmp(&a.last_modified_at));
        headers.truncate(limit);
        Ok(headers)
    }

    /// Resolve a user-supplied identifier: exact UUID, UUID suffix (length
    /// >= 8), or case-insensitive name. Name collisions resolve to the most
    /// recently modified session.
    pub async fn resolve(&self, query: &str) -> Result<Uuid> {
        if let Ok(id) = Uuid::parse_str(query) {
            return Ok(id);
        }

        let headers = self.list(usize::MAX).await?;

        if query.len() >= 8 {
            let lower = query.to_lowercase();
            let suffix_matches: Vec<_> = headers
                .iter()
                .filter(|h| h.id.to_string().to_lowercase().ends_with(&lower))
                .collect();
            if suffix_matches.len() == 1 {
                return Ok(suffix_matches[0].id);
            }
            if suffix_matches.len() > 1 {
                return Err(AgentError::NameAmbiguous(format!(
                    "{} sessions match suffix {query}",
                    suffix_matches.len()
                )));
            }
        }

        let lower = query.to_lowercase();
        let mut name_matches: Vec<_> = headers
            .iter()
            .filter(|h| h.name.to_lowercase() == lower)
            .collect();
        name_matches.sort_by(|a, b| b.last_modified_at.cmp(&a.last_modified_at));
        name_matches
            .first()
            .map(|h| h.id)
            .ok_or_else(|| AgentError::NotFound(format!("no session matches {query}")))
    }

    /// Store attachment bytes under the session's `attachments/` directory,
    /// content-addressed by the first 16 hex chars of SHA-256. Identical
    /// bytes at the same `(message_index, content_index)` reuse the same
    /// stored filename; identical bytes at different positions still share
    /// the hash segment but differ by position in the filename.
    pub async fn store_attachment(
        &self,
        session_id: &Uuid,
        original_file_name: &str,
        media_type: &str,
        message_index: usize,
        content_index: usize,
        bytes: &[u8],
    ) -> Result<Attachment> {
        let dir = self.session_dir(session_id).join("attachments");
        tokio::fs::create_dir_all(&dir).await?;

        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let full_hash = hex::encode(hasher.finalize());
        let hash16 = &full_hash[..16];

        let ext = Path::new(original_file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let stored_file_name = format!("{message_index}-{content_index}-{hash16}.{ext}");
        let stored_path = dir.join(&stored_file_name);

        if !stored_path.exists() {
            tokio::fs::write(&stored_path, bytes).await?;
        }

        Ok(Attachment {
            original_file_name: original_file_name.to_string(),
            media_type: media_type.to_string(),
            message_index,
            content_index,
            stored_file_name,
            content_hash: hash16.to_string(),
            size_bytes: bytes.len() as u64,
        })
    }
}

pub type SharedSessionStore = Arc<SessionStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let mut session = Session::new();
        session.append(ChatMessage::user("hi"));
        store.save(&session).await.unwrap();

        let loaded = store.load(&session.id).await.unwrap();
        assert_eq!(loaded.history.len(), 1);
        assert_eq!(loaded.id, session.id);
    }

    #[tokio::test]
    async fn corrupted_json_recovers_to_fresh_session() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let id = Uuid::now_v7();
        let session_dir = dir.path().join(id.to_string());
        tokio::fs::create_dir_all(&session_dir).await.unwrap();
        tokio::fs::write(session_dir.join("session.json"), "{not json")
            .await
            .unwrap();

        let recovered = store.load(&id).await.unwrap();
        assert_ne!(recovered.id, id);
        assert!(session_dir.join("session.json.corrupted").exists());
    }

    #[tokio::test]
    async fn list_sorts_by_last_modified_descending() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());

        let mut older = Session::new();
        older.name = "older".into();
        older.last_modified_at = chrono::Utc::now() - chrono::Duration::hours(1);
        store.save(&older).await.unwrap();

        let mut newer = Session::new();
        newer.name = "newer".into();
        store.save(&newer).await.unwrap();

        let headers = store.list(10).await.unwrap();
        assert_eq!(headers[0].name, "newer");
        assert_eq!(headers[1].name, "older");
    }

    #[tokio::test]
    async fn resolve_matches_uuid_suffix() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let session = Session::new();
        store.save(&session).await.unwrap();

        let suffix = &session.id.to_string()[28..];
        let resolved = store.resolve(suffix).await.unwrap();
        assert_eq!(resolved, session.id);
    }

    #[tokio::test]
    async fn resolve_matches_case_insensitive_name() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let mut session = Session::new();
        session.name = "My Session".into();
        store.save(&session).await.unwrap();

        let resolved = store.resolve("my session").await.unwrap();
        assert_eq!(resolved, session.id);
    }

    #[tokio::test]
    async fn attachment_dedup_same_position_reuses_filename() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let id = Uuid::now_v7();
        let bytes = b"same bytes";

        let a1 = store
            .store_attachment(&id, "pic.png", "image/png", 2, 0, bytes)
            .await
            .unwrap();
        let a2 = store
            .store_attachment(&id, "pic.png", "image/png", 2, 0, bytes)
            .await
            .unwrap();
        assert_eq!(a1.stored_file_name, a2.stored_file_name);
    }

    #[tokio::test]
    async fn attachment_dedup_different_position_shares_hash_segment() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let id = Uuid::now_v7();
        let bytes = b"same bytes";

        let a1 = store
            .store_attachment(&id, "pic.png", "image/png", 0, 0, bytes)
            .await
            .unwrap();
        let a2 = store
            .store_attachment(&id, "pic.png", "image/png", 3, 1, bytes)
            .await
            .unwrap();
        assert_eq!(a1.content_hash, a2.content_hash);
        assert_ne!(a1.stored_file_name, a2.stored_file_name);
    }
}
