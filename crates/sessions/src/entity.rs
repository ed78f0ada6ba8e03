//! Entity Repositories (C2): uniform `findById/findByUserId/findAll/create/
//! update/delete` shape over a file-backed JSON map, one file per entity
//! kind.
//!
//! Grounded on the teacher's `SessionStore` (`RwLock<HashMap<K,V>>` loaded
//! once at startup, flushed to a single JSON file on every write) — this
//! module generalizes that exact pattern from one session map to any
//! entity kind with an id and an owning user.
//!
//! Repositories are polymorphic over storage backend in principle
//! ([`RepositoryBackend`] names the seam); only the file-backed variant is
//! implemented here, since no document-store client (S3/MongoDB) is
//! available to this core.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use orc_domain::error::{Error, Result};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// Implemented by every entity kind persisted through a file-backed
/// repository.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync {
    fn id(&self) -> Uuid;
    fn user_id(&self) -> Uuid;
}

/// Storage backend seam. Only [`FileBackedRepository`] exists in this
/// core; a document-store backend (S3/MongoDB) is an external
/// collaborator and is named here, not implemented.
pub trait RepositoryBackend<T: Entity> {
    fn find_by_id(&self, id: Uuid) -> Option<T>;
    fn find_by_user_id(&self, user_id: Uuid) -> Vec<T>;
    fn find_all(&self) -> Vec<T>;
    fn create(&self, entity: T) -> Result<T>;
    fn update(&self, id: Uuid, patch: impl FnOnce(&mut T)) -> Result<T>;
    fn delete(&self, id: Uuid) -> Result<bool>;
}

/// A file-backed repository for one entity kind, persisted as a single
/// JSON object (`id` -> entity) at `path`.
pub struct FileBackedRepository<T: Entity> {
    path: PathBuf,
    entities: RwLock<HashMap<Uuid, T>>,
    _marker: PhantomData<T>,
}

impl<T: Entity> FileBackedRepository<T> {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let entities: HashMap<Uuid, T> = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            entities: RwLock::new(entities),
            _marker: PhantomData,
        })
    }

    fn flush(&self) -> Result<()> {
        let entities = self.entities.read();
        let bytes = serde_json::to_vec_pretty(&*entities)?;
        drop(entities);
        write_atomic(&self.path, &bytes)
    }
}

impl<T: Entity> RepositoryBackend<T> for FileBackedRepository<T> {
    fn find_by_id(&self, id: Uuid) -> Option<T> {
        self.entities.read().get(&id).cloned()
    }

    fn find_by_user_id(&self, user_id: Uuid) -> Vec<T> {
        self.entities
            .read()
            .values()
            .filter(|e| e.user_id() == user_id)
            .cloned()
            .collect()
    }

    fn find_all(&self) -> Vec<T> {
        self.entities.read().values().cloned().collect()
    }

    fn create(&self, entity: T) -> Result<T> {
        let id = entity.id();
        self.entities.write().insert(id, entity.clone());
        self.flush()?;
        Ok(entity)
    }

    fn update(&self, id: Uuid, patch: impl FnOnce(&mut T)) -> Result<T> {
        let updated = {
            let mut entities = self.entities.write();
            let entity = entities
                .get_mut(&id)
                .ok_or_else(|| Error::not_found(format!("entity {id}")))?;
            patch(entity);
            entity.clone()
        };
        self.flush()?;
        Ok(updated)
    }

    fn delete(&self, id: Uuid) -> Result<bool> {
        let removed = self.entities.write().remove(&id).is_some();
        if removed {
            self.flush()?;
        }
        Ok(removed)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

// ── Entity impls ─────────────────────────────────────────────────────

macro_rules! impl_entity {
    ($ty:ty) => {
        impl Entity for $ty {
            fn id(&self) -> Uuid {
                self.id
            }
            fn user_id(&self) -> Uuid {
                self.user_id
            }
        }
    };
}

impl_entity!(orc_domain::model::User);
impl_entity!(orc_domain::model::ApiCredential);
impl_entity!(orc_domain::model::ConnectionProfile);
impl_entity!(orc_domain::model::Character);
impl_entity!(orc_domain::model::Persona);
impl_entity!(orc_domain::model::Tag);
impl_entity!(orc_domain::model::Chat);
impl_entity!(orc_domain::model::EmbeddingProfile);
impl_entity!(orc_domain::model::ImageGenerationProfile);

#[cfg(test)]
mod tests {
    use super::*;
    use orc_domain::model::Tag;

    fn sample_tag(user_id: Uuid) -> Tag {
        Tag {
            id: Uuid::new_v4(),
            user_id,
            name: "spooky".into(),
            name_lower: "spooky".into(),
            quick_hide: false,
        }
    }

    #[test]
    fn create_then_find_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let repo: FileBackedRepository<Tag> = FileBackedRepository::new(dir.path().join("tags.json")).unwrap();
        let user = Uuid::new_v4();
        let tag = repo.create(sample_tag(user)).unwrap();
        assert_eq!(repo.find_by_id(tag.id).unwrap().name, "spooky");
    }

    #[test]
    fn find_by_user_id_filters_ownership() {
        let dir = tempfile::tempdir().unwrap();
        let repo: FileBackedRepository<Tag> = FileBackedRepository::new(dir.path().join("tags.json")).unwrap();
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();
        repo.create(sample_tag(user_a)).unwrap();
        repo.create(sample_tag(user_b)).unwrap();
        assert_eq!(repo.find_by_user_id(user_a).len(), 1);
    }

    #[test]
    fn update_applies_patch_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tags.json");
        let repo: FileBackedRepository<Tag> = FileBackedRepository::new(&path).unwrap();
        let user = Uuid::new_v4();
        let tag = repo.create(sample_tag(user)).unwrap();
        repo.update(tag.id, |t| t.quick_hide = true).unwrap();

        let reloaded: FileBackedRepository<Tag> = FileBackedRepository::new(&path).unwrap();
        assert!(reloaded.find_by_id(tag.id).unwrap().quick_hide);
    }

    #[test]
    fn delete_removes_entity() {
        let dir = tempfile::tempdir().unwrap();
        let repo: FileBackedRepository<Tag> = FileBackedRepository::new(dir.path().join("tags.json")).unwrap();
        let user = Uuid::new_v4();
        let tag = repo.create(sample_tag(user)).unwrap();
        assert!(repo.delete(tag.id).unwrap());
        assert!(repo.find_by_id(tag.id).is_none());
    }

    #[test]
    fn update_missing_entity_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let repo: FileBackedRepository<Tag> = FileBackedRepository::new(dir.path().join("tags.json")).unwrap();
        let err = repo.update(Uuid::new_v4(), |_| {}).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
