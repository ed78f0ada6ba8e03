//! Per-character memory persistence: a flat JSON array of [`Memory`]
//! records, one file per character.
//!
//! Grounded on the same file-backed `RwLock<HashMap<...>>` + flush-on-write
//! shape used throughout this workspace's storage layer (`orc_store`'s
//! entity repositories, the teacher's `SessionStore`).

use std::collections::HashMap;
use std::path::PathBuf;

use orc_domain::error::Result;
use orc_domain::model::Memory;
use parking_lot::RwLock;
use uuid::Uuid;

pub struct MemoryStore {
    base_dir: PathBuf,
    cache: RwLock<HashMap<Uuid, Vec<Memory>>>,
}

impl MemoryStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn path(&self, character_id: Uuid) -> PathBuf {
        self.base_dir.join(format!("{character_id}.json"))
    }

    pub fn load(&self, character_id: Uuid) -> Result<Vec<Memory>> {
        if let Some(cached) = self.cache.read().get(&character_id) {
            return Ok(cached.clone());
        }
        let path = self.path(character_id);
        let memories: Vec<Memory> = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            Vec::new()
        };
        self.cache.write().insert(character_id, memories.clone());
        Ok(memories)
    }

    pub fn save(&self, character_id: Uuid, memories: &[Memory]) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        let tmp_path = self.path(character_id).with_extension("tmp");
        let bytes = serde_json::to_vec_pretty(memories)?;
        std::fs::write(&tmp_path, bytes)?;
        std::fs::rename(&tmp_path, self.path(character_id))?;
        self.cache.write().insert(character_id, memories.to_vec());
        Ok(())
    }

    pub fn touch_last_accessed(&self, character_id: Uuid, ids: &[Uuid]) -> Result<()> {
        let mut memories = self.load(character_id)?;
        let now = chrono::Utc::now();
        let target: std::collections::HashSet<Uuid> = ids.iter().copied().collect();
        for m in memories.iter_mut() {
            if target.contains(&m.id) {
                m.last_accessed_at = now;
            }
        }
        self.save(character_id, &memories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(character_id: Uuid) -> Memory {
        Memory {
            id: Uuid::new_v4(),
            character_id,
            content: "likes tea".into(),
            summary: "likes tea".into(),
            keywords: vec![],
            tags: vec![],
            importance: 0.5,
            persona_id: None,
            chat_id: None,
            last_accessed_at: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path());
        let character_id = Uuid::new_v4();
        let mem = sample(character_id);
        store.save(character_id, &[mem.clone()]).unwrap();

        let reloaded = MemoryStore::new(dir.path());
        let loaded = reloaded.load(character_id).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, mem.id);
    }

    #[test]
    fn touch_last_accessed_updates_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path());
        let character_id = Uuid::new_v4();
        let mut mem = sample(character_id);
        mem.last_accessed_at = Utc::now() - chrono::Duration::days(30);
        let old = mem.last_accessed_at;
        store.save(character_id, &[mem.clone()]).unwrap();

        store.touch_last_accessed(character_id, &[mem.id]).unwrap();
        let reloaded = store.load(character_id).unwrap();
        assert!(reloaded[0].last_accessed_at > old);
    }
}
