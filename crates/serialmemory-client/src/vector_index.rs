//! Vector Index (C6) — per-character flat cosine index with a durable
//! snapshot.
//!
//! Not an ANN index: expected cardinality per character is at most a few
//! thousand memories, so a linear scan is both correct and fast enough.
//! Guarded by a `parking_lot::RwLock` per §5's concurrency model (readers
//! and writers serialize; search is read-locked and may overlap with other
//! searches). Persistence reuses the write-temp-then-rename atomicity
//! pattern the teacher applies to its runs/sessions snapshots.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use orc_domain::error::{Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::embedding::cosine;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: Uuid,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct Snapshot {
    dimensions: Option<usize>,
    entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub id: Uuid,
    pub score: f32,
    pub metadata: serde_json::Value,
}

struct Inner {
    dimensions: Option<usize>,
    entries: HashMap<Uuid, IndexEntry>,
}

/// A single character's vector index, backed by one snapshot file.
pub struct VectorIndex {
    path: PathBuf,
    inner: RwLock<Inner>,
}

impl VectorIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            inner: RwLock::new(Inner {
                dimensions: None,
                entries: HashMap::new(),
            }),
        }
    }

    /// Insert or replace an entry. Sets `dimensions` on the first insert;
    /// rejects any later vector whose length doesn't match.
    pub fn add(&self, id: Uuid, vector: Vec<f32>, metadata: serde_json::Value) -> Result<()> {
        let mut inner = self.inner.write();
        match inner.dimensions {
            None => inner.dimensions = Some(vector.len()),
            Some(d) if d != vector.len() => {
                return Err(Error::ValidationError {
                    fields: vec![format!(
                        "vector dimensions mismatch: index is {d}, got {}",
                        vector.len()
                    )],
                });
            }
            Some(_) => {}
        }
        inner.entries.insert(id, IndexEntry { id, vector, metadata });
        Ok(())
    }

    pub fn remove(&self, id: Uuid) -> bool {
        self.inner.write().entries.remove(&id).is_some()
    }

    pub fn update(&self, id: Uuid, vector: Vec<f32>) -> Result<()> {
        let mut inner = self.inner.write();
        if let Some(d) = inner.dimensions {
            if d != vector.len() {
                return Err(Error::ValidationError {
                    fields: vec![format!(
                        "vector dimensions mismatch: index is {d}, got {}",
                        vector.len()
                    )],
                });
            }
        }
        if let Some(entry) = inner.entries.get_mut(&id) {
            entry.vector = vector;
            Ok(())
        } else {
            Err(Error::not_found(format!("vector index entry {id}")))
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.dimensions = None;
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cosine-rank every entry against `query`, apply `filter` to metadata,
    /// and return the top `k` by descending score.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&dyn Fn(&serde_json::Value) -> bool>,
    ) -> Vec<ScoredEntry> {
        let inner = self.inner.read();
        let mut scored: Vec<ScoredEntry> = inner
            .entries
            .values()
            .filter(|e| filter.map(|f| f(&e.metadata)).unwrap_or(true))
            .map(|e| ScoredEntry {
                id: e.id,
                score: cosine(query, &e.vector),
                metadata: e.metadata.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    pub fn save(&self) -> Result<()> {
        let inner = self.inner.read();
        let snapshot = Snapshot {
            dimensions: inner.dimensions,
            entries: inner.entries.values().cloned().collect(),
        };
        write_atomic(&self.path, &snapshot)
    }

    pub fn load(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let bytes = std::fs::read(&self.path)?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        let mut inner = self.inner.write();
        inner.dimensions = snapshot.dimensions;
        inner.entries = snapshot
            .entries
            .into_iter()
            .map(|e| (e.id, e))
            .collect();
        Ok(())
    }
}

fn write_atomic(path: &Path, snapshot: &Snapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    let bytes = serde_json::to_vec_pretty(snapshot)?;
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_sets_dimensions_on_first_insert() {
        let idx = VectorIndex::new("/tmp/does-not-matter.json");
        let id = Uuid::new_v4();
        idx.add(id, vec![1.0, 0.0, 0.0], serde_json::json!({})).unwrap();
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn add_rejects_mismatched_dimensions() {
        let idx = VectorIndex::new("/tmp/does-not-matter.json");
        idx.add(Uuid::new_v4(), vec![1.0, 0.0], serde_json::json!({})).unwrap();
        let err = idx.add(Uuid::new_v4(), vec![1.0, 0.0, 0.0], serde_json::json!({})).unwrap_err();
        assert!(matches!(err, Error::ValidationError { .. }));
    }

    #[test]
    fn search_returns_top_k_descending() {
        let idx = VectorIndex::new("/tmp/does-not-matter.json");
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        idx.add(a, vec![1.0, 0.0], serde_json::json!({})).unwrap();
        idx.add(b, vec![0.0, 1.0], serde_json::json!({})).unwrap();
        idx.add(c, vec![0.9, 0.1], serde_json::json!({})).unwrap();
        let results = idx.search(&[1.0, 0.0], 2, None);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, a);
        assert_eq!(results[1].id, c);
    }

    #[test]
    fn remove_drops_entry() {
        let idx = VectorIndex::new("/tmp/does-not-matter.json");
        let id = Uuid::new_v4();
        idx.add(id, vec![1.0], serde_json::json!({})).unwrap();
        assert!(idx.remove(id));
        assert!(idx.is_empty());
    }

    #[test]
    fn save_then_load_round_trips_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let idx = VectorIndex::new(&path);
        let id = Uuid::new_v4();
        idx.add(id, vec![1.0, 2.0, 3.0], serde_json::json!({"tag": "x"})).unwrap();
        idx.save().unwrap();

        let reloaded = VectorIndex::new(&path);
        reloaded.load().unwrap();
        assert_eq!(reloaded.len(), 1);
        let results = reloaded.search(&[1.0, 2.0, 3.0], 1, None);
        assert_eq!(results[0].id, id);
    }
}
