//! The `Runtime` value: everything `submit_turn`/`swipe`/post-turn jobs
//! need, constructed once at startup and threaded through every
//! operation (§9 design note — replaces the source's global singletons).
//!
//! Grounded on the teacher's `state::AppState`: one `Arc`-wrapped struct
//! grouping config, storage, and concurrency primitives by concern,
//! narrowed here to what this core's file-backed repositories need.

use std::path::PathBuf;
use std::sync::Arc;

use orc_domain::config::Config;
use orc_domain::error::Result;
use orc_domain::model::{
    ApiCredential, Character, Chat, ConnectionProfile, EmbeddingProfile, ImageGenerationProfile,
    Persona, Tag, User,
};
use orc_files::FileStore;
use orc_memory::{EmbeddingClient, MemoryStore};
use orc_store::{ChatEventLog, FileBackedRepository, RepositoryBackend};
use orc_tools::{ToolRuntime, WebSearchConfig};

use crate::cancel::CancelMap;
use crate::session_lock::SessionLockMap;

/// Repositories for every entity kind this core owns (§4.2), plus the
/// services layered on top of them. One `Runtime` per process; cheap to
/// clone (everything inside is already `Arc`-wrapped or a plain path).
#[derive(Clone)]
pub struct Runtime {
    pub config: Arc<Config>,

    pub users: Arc<FileBackedRepository<User>>,
    pub api_credentials: Arc<FileBackedRepository<ApiCredential>>,
    pub connection_profiles: Arc<FileBackedRepository<ConnectionProfile>>,
    pub characters: Arc<FileBackedRepository<Character>>,
    pub personas: Arc<FileBackedRepository<Persona>>,
    pub tags: Arc<FileBackedRepository<Tag>>,
    pub chats: Arc<FileBackedRepository<Chat>>,
    pub embedding_profiles: Arc<FileBackedRepository<EmbeddingProfile>>,
    pub image_profiles: Arc<FileBackedRepository<ImageGenerationProfile>>,

    pub chat_log: Arc<ChatEventLog>,
    pub file_store: Arc<FileStore>,
    pub memory_store: Arc<MemoryStore>,
    pub embedding_client: Arc<EmbeddingClient>,
    pub vector_index_dir: PathBuf,
    pub tools: Arc<ToolRuntime>,

    pub cancel_map: Arc<CancelMap>,
    pub session_locks: Arc<SessionLockMap>,
}

impl Runtime {
    pub fn new(config: Config) -> Result<Self> {
        let data_dir = PathBuf::from(&config.storage.data_dir);
        let blob_dir = PathBuf::from(&config.storage.blob_dir);
        let chats_dir = data_dir.join("chats");
        let memories_dir = data_dir.join("memories");
        let vector_index_dir = PathBuf::from(&config.memory.vector_index_dir);

        let file_store = FileStore::new(&data_dir, &blob_dir)?;

        let web_search = if config.tools.search_web.enabled {
            config.tools.search_web.base_url.clone().map(|base_url| WebSearchConfig {
                base_url,
                api_key: config
                    .tools
                    .search_web
                    .api_key_env
                    .as_deref()
                    .and_then(|env| std::env::var(env).ok()),
            })
        } else {
            None
        };

        let file_store = Arc::new(file_store);
        let tools = ToolRuntime::new(file_store.clone(), vector_index_dir.clone(), web_search);

        Ok(Self {
            config: Arc::new(config),

            users: Arc::new(FileBackedRepository::new(data_dir.join("users.json"))?),
            api_credentials: Arc::new(FileBackedRepository::new(
                data_dir.join("api_credentials.json"),
            )?),
            connection_profiles: Arc::new(FileBackedRepository::new(
                data_dir.join("connection_profiles.json"),
            )?),
            characters: Arc::new(FileBackedRepository::new(data_dir.join("characters.json"))?),
            personas: Arc::new(FileBackedRepository::new(data_dir.join("personas.json"))?),
            tags: Arc::new(FileBackedRepository::new(data_dir.join("tags.json"))?),
            chats: Arc::new(FileBackedRepository::new(data_dir.join("chats.json"))?),
            embedding_profiles: Arc::new(FileBackedRepository::new(
                data_dir.join("embedding_profiles.json"),
            )?),
            image_profiles: Arc::new(FileBackedRepository::new(
                data_dir.join("image_profiles.json"),
            )?),

            chat_log: Arc::new(ChatEventLog::new(chats_dir)),
            file_store,
            memory_store: Arc::new(MemoryStore::new(memories_dir)),
            embedding_client: Arc::new(EmbeddingClient::new()),
            vector_index_dir,
            tools: Arc::new(tools),

            cancel_map: Arc::new(CancelMap::new()),
            session_locks: Arc::new(SessionLockMap::new()),
        })
    }

    pub fn vector_index_path(&self, character_id: uuid::Uuid) -> PathBuf {
        self.vector_index_dir.join(format!("{character_id}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.storage.data_dir = dir.join("data").to_string_lossy().to_string();
        config.storage.blob_dir = dir.join("blobs").to_string_lossy().to_string();
        config.memory.vector_index_dir = dir.join("vectors").to_string_lossy().to_string();
        config
    }

    #[test]
    fn constructs_with_fresh_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Runtime::new(test_config(dir.path())).unwrap();
        assert_eq!(runtime.users.find_all().len(), 0);
    }
}
