//! Shared dependencies handed to every tool handler, the way the teacher's
//! `dispatch_tool(state, ...)` threads its `AppState` through each handler —
//! scoped down here to just what C9's three tools need.

use std::path::PathBuf;
use std::sync::Arc;

use orc_files::FileStore;
use orc_memory::{EmbeddingClient, VectorIndex};

pub struct WebSearchConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

pub struct ToolRuntime {
    pub file_store: Arc<FileStore>,
    pub embedding_client: EmbeddingClient,
    /// Directory holding one `<characterId>.json` vector index snapshot per
    /// character; loaded on demand rather than kept resident, since tool
    /// calls are infrequent relative to chat turns.
    pub vector_index_dir: PathBuf,
    pub http: reqwest::Client,
    pub web_search: Option<WebSearchConfig>,
}

impl ToolRuntime {
    pub fn new(
        file_store: Arc<FileStore>,
        vector_index_dir: impl Into<PathBuf>,
        web_search: Option<WebSearchConfig>,
    ) -> Self {
        Self {
            file_store,
            embedding_client: EmbeddingClient::new(),
            vector_index_dir: vector_index_dir.into(),
            http: reqwest::Client::new(),
            web_search,
        }
    }

    pub(crate) fn vector_index_path(&self, character_id: uuid::Uuid) -> PathBuf {
        self.vector_index_dir.join(format!("{character_id}.json"))
    }
}
