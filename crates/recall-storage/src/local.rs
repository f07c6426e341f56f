//! File-per-conversation snapshot storage

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use recall_core::{ConversationSnapshot, Result, SnapshotStorage, StorageTier};

/// Stores each conversation as `<base>/<encoded id>.json`.
///
/// Writes go to a temporary sibling file first and are renamed into place, so
/// a reader never observes a half-written snapshot.
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn snapshot_path(&self, conversation_id: &str) -> PathBuf {
        self.base_path
            .join(format!("{}.json", file_stem(conversation_id)))
    }

    fn temp_path(&self, conversation_id: &str) -> PathBuf {
        self.base_path
            .join(format!(".{}.json.tmp", file_stem(conversation_id)))
    }
}

/// Reversible file name for a conversation id.
///
/// `[A-Za-z0-9-]` is kept; every other byte becomes `_XX` (uppercase hex), so
/// distinct ids never share a file and no id can escape the base directory.
/// The empty id is stored as a bare `_`.
pub(crate) fn file_stem(conversation_id: &str) -> String {
    if conversation_id.is_empty() {
        return "_".to_string();
    }
    let mut stem = String::with_capacity(conversation_id.len());
    for byte in conversation_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("_{:02X}", byte));
        }
    }
    stem
}

/// Inverse of [`file_stem`]. `None` for names this storage did not write.
pub(crate) fn conversation_id_from_stem(stem: &str) -> Option<String> {
    if stem == "_" {
        return Some(String::new());
    }
    let mut bytes = Vec::with_capacity(stem.len());
    let mut rest = stem.as_bytes();
    while let Some((&first, tail)) = rest.split_first() {
        if first == b'_' {
            let hex = tail.get(..2).filter(|h| h.iter().all(u8::is_ascii_hexdigit))?;
            let hex = std::str::from_utf8(hex).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
            rest = &tail[2..];
        } else if first.is_ascii_alphanumeric() || first == b'-' {
            bytes.push(first);
            rest = tail;
        } else {
            return None;
        }
    }
    String::from_utf8(bytes).ok()
}

#[async_trait]
impl SnapshotStorage for LocalStorage {
    async fn save(
        &self,
        conversation_id: &str,
        snapshot: &ConversationSnapshot,
    ) -> Result<StorageTier> {
        tokio::fs::create_dir_all(&self.base_path).await?;
        let path = self.snapshot_path(conversation_id);
        let temp = self.temp_path(conversation_id);
        let json = serde_json::to_string_pretty(snapshot)?;

        tokio::fs::write(&temp, json).await?;
        tokio::fs::rename(&temp, &path).await?;

        debug!(conversation_id, path = %path.display(), "Snapshot written to local storage");
        Ok(StorageTier::Local)
    }

    async fn load(&self, conversation_id: &str) -> Result<Option<ConversationSnapshot>> {
        let path = self.snapshot_path(conversation_id);
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot = serde_json::from_str(&json)?;
        Ok(Some(snapshot))
    }

    async fn delete(&self, conversation_id: &str) -> Result<()> {
        let path = self.snapshot_path(conversation_id);
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_sessions(&self) -> Result<Vec<String>> {
        let mut sessions = Vec::new();
        if !self.base_path.exists() {
            return Ok(sessions);
        }

        let mut entries = tokio::fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                let id = path
                    .file_stem()
                    .and_then(|name| name.to_str())
                    .and_then(conversation_id_from_stem);
                match id {
                    Some(id) => sessions.push(id),
                    None => debug!(path = %path.display(), "Skipping unrecognised file"),
                }
            }
        }
        sessions.sort();
        Ok(sessions)
    }

    fn tier(&self) -> StorageTier {
        StorageTier::Local
    }
}
