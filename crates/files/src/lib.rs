//! File Store (C1) — a content-addressed blob store keyed by sha256,
//! paired with a [`FileEntry`] index keyed by id.
//!
//! Grounded on the teacher's `SessionStore` file-backed persistence shape
//! (`store.rs`: `RwLock<HashMap<...>>` + a single JSON index flushed to
//! disk) generalized from one `sessions.json` to one index file here, and
//! on §6's write-temp-then-rename atomicity pattern shared with the
//! Vector Index's `save()`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use orc_domain::error::{Error, Result};
use orc_domain::model::{FileCategory, FileEntry, FileSource};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub struct FileStore {
    blob_dir: PathBuf,
    index_path: PathBuf,
    index: Mutex<HashMap<Uuid, FileEntry>>,
}

impl FileStore {
    /// Load (or initialize) the index at `data_dir/files.json`, storing
    /// blobs under `blob_dir`.
    pub fn new(data_dir: &Path, blob_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        std::fs::create_dir_all(blob_dir)?;

        let index_path = data_dir.join("files.json");
        let index = if index_path.exists() {
            let raw = std::fs::read_to_string(&index_path)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };

        tracing::info!(
            entries = index.len(),
            path = %index_path.display(),
            "file store index loaded"
        );

        Ok(Self {
            blob_dir: blob_dir.to_path_buf(),
            index_path,
            index: Mutex::new(index),
        })
    }

    fn blob_path(&self, sha256: &str) -> PathBuf {
        self.blob_dir.join(sha256)
    }

    /// Create (or dedupe onto) a `FileEntry` for `buf`.
    ///
    /// If an entry already exists for `(userId, sha256, category)` and
    /// `source` is `Uploaded`, the existing entry is returned with
    /// `linkedTo` merged rather than writing a second copy.
    pub fn create(
        &self,
        buf: &[u8],
        original_filename: &str,
        mime_type: &str,
        source: FileSource,
        category: FileCategory,
        user_id: Uuid,
        linked_to: Vec<Uuid>,
    ) -> Result<FileEntry> {
        let sha256 = hex_sha256(buf);

        let mut index = self.index.lock();

        if source == FileSource::Uploaded {
            if let Some(existing) = index.values_mut().find(|e| {
                e.user_id == user_id && e.sha256 == sha256 && e.category == category
            }) {
                for id in linked_to {
                    if !existing.linked_to.contains(&id) {
                        existing.linked_to.push(id);
                    }
                }
                let entry = existing.clone();
                drop(index);
                self.flush_locked()?;
                return Ok(entry);
            }
        }

        let blob_path = self.blob_path(&sha256);
        if !blob_path.exists() {
            write_atomic_bytes(&blob_path, buf)?;
        }

        let entry = FileEntry {
            id: Uuid::new_v4(),
            user_id,
            sha256,
            original_filename: original_filename.to_owned(),
            mime_type: mime_type.to_owned(),
            size: buf.len() as u64,
            width: None,
            height: None,
            category,
            source,
            storage_key: entry_storage_key(&blob_path),
            linked_to,
        };
        index.insert(entry.id, entry.clone());
        drop(index);
        self.flush_locked()?;
        Ok(entry)
    }

    /// Read back the blob bytes for `id`.
    pub fn read(&self, id: Uuid) -> Result<Vec<u8>> {
        let entry = self
            .index
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("file {id}")))?;
        let bytes = std::fs::read(self.blob_path(&entry.sha256))?;
        Ok(bytes)
    }

    pub fn get(&self, id: Uuid) -> Option<FileEntry> {
        self.index.lock().get(&id).cloned()
    }

    /// Delete a file. Rejected (returns `false`, no side effects) if
    /// `linkedTo` is nonempty.
    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let mut index = self.index.lock();
        let Some(entry) = index.get(&id) else {
            return Err(Error::not_found(format!("file {id}")));
        };
        if !entry.linked_to.is_empty() {
            return Ok(false);
        }
        let sha256 = entry.sha256.clone();
        index.remove(&id);

        // Only remove the blob if no other entry still references it.
        let still_referenced = index.values().any(|e| e.sha256 == sha256);
        drop(index);
        if !still_referenced {
            let _ = std::fs::remove_file(self.blob_path(&sha256));
        }
        self.flush_locked()?;
        Ok(true)
    }

    /// Idempotent: adding a link that's already present is a no-op.
    pub fn add_link(&self, id: Uuid, entity_id: Uuid) -> Result<()> {
        let mut index = self.index.lock();
        let entry = index
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("file {id}")))?;
        if !entry.linked_to.contains(&entity_id) {
            entry.linked_to.push(entity_id);
        }
        drop(index);
        self.flush_locked()
    }

    /// Idempotent. Does **not** auto-delete when `linkedTo` becomes empty —
    /// an explicit [`FileStore::delete`] call is required, to avoid losing
    /// a file during a transient unlink/relink race.
    pub fn remove_link(&self, id: Uuid, entity_id: Uuid) -> Result<()> {
        let mut index = self.index.lock();
        let entry = index
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("file {id}")))?;
        entry.linked_to.retain(|e| *e != entity_id);
        drop(index);
        self.flush_locked()
    }

    /// Remove any blob under `blob_dir` with no corresponding index entry.
    /// Intended to run once at start-up to reclaim orphans left by an
    /// index-write failure that followed a successful blob write.
    pub fn gc_orphaned_blobs(&self) -> Result<usize> {
        let index = self.index.lock();
        let known: std::collections::HashSet<&str> =
            index.values().map(|e| e.sha256.as_str()).collect();
        let mut removed = 0;
        if self.blob_dir.exists() {
            for entry in std::fs::read_dir(&self.blob_dir)? {
                let entry = entry?;
                let name = entry.file_name();
                let Some(name) = name.to_str() else { continue };
                if name.ends_with(".tmp") || known.contains(name) {
                    continue;
                }
                if std::fs::remove_file(entry.path()).is_ok() {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    fn flush_locked(&self) -> Result<()> {
        let index = self.index.lock();
        let json = serde_json::to_vec_pretty(&*index)?;
        drop(index);
        write_atomic_bytes(&self.index_path, &json)
    }
}

fn entry_storage_key(blob_path: &Path) -> String {
    blob_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_owned()
}

fn hex_sha256(buf: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(buf);
    hex::encode(hasher.finalize())
}

fn write_atomic_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let blob_dir = dir.path().join("blobs");
        let store = FileStore::new(&data_dir, &blob_dir).unwrap();
        (dir, store)
    }

    #[test]
    fn create_then_read_round_trips_bytes() {
        let (_dir, store) = store();
        let user = Uuid::new_v4();
        let entry = store
            .create(b"hello", "a.txt", "text/plain", FileSource::Uploaded, FileCategory::Attachment, user, vec![])
            .unwrap();
        let bytes = store.read(entry.id).unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn duplicate_upload_dedupes_by_sha256() {
        let (_dir, store) = store();
        let user = Uuid::new_v4();
        let link_a = Uuid::new_v4();
        let link_b = Uuid::new_v4();
        let first = store
            .create(b"same bytes", "a.txt", "text/plain", FileSource::Uploaded, FileCategory::Attachment, user, vec![link_a])
            .unwrap();
        let second = store
            .create(b"same bytes", "b.txt", "text/plain", FileSource::Uploaded, FileCategory::Attachment, user, vec![link_b])
            .unwrap();
        assert_eq!(first.id, second.id);
        assert!(second.linked_to.contains(&link_a));
        assert!(second.linked_to.contains(&link_b));
    }

    #[test]
    fn delete_rejected_while_linked() {
        let (_dir, store) = store();
        let user = Uuid::new_v4();
        let link = Uuid::new_v4();
        let entry = store
            .create(b"data", "a.bin", "application/octet-stream", FileSource::Uploaded, FileCategory::Attachment, user, vec![link])
            .unwrap();
        assert_eq!(store.delete(entry.id).unwrap(), false);
        store.remove_link(entry.id, link).unwrap();
        assert_eq!(store.delete(entry.id).unwrap(), true);
        assert!(store.get(entry.id).is_none());
    }

    #[test]
    fn remove_link_does_not_auto_delete() {
        let (_dir, store) = store();
        let user = Uuid::new_v4();
        let link = Uuid::new_v4();
        let entry = store
            .create(b"data", "a.bin", "application/octet-stream", FileSource::Uploaded, FileCategory::Attachment, user, vec![link])
            .unwrap();
        store.remove_link(entry.id, link).unwrap();
        assert!(store.get(entry.id).is_some());
    }

    #[test]
    fn gc_removes_orphaned_blobs() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("blobs").join("deadbeef"), b"orphan").unwrap();
        let removed = store.gc_orphaned_blobs().unwrap();
        assert_eq!(removed, 1);
    }
}
