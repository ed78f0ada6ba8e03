use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Embedding profile (C5)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for the embedding client used to vectorize memories and
/// search queries. Unlike chat providers this is a single active profile,
/// not a registry — switching embedding models invalidates the vector
/// index's dimension invariant (§4.6), so it isn't something a chat can
/// pick per-turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub shape: EmbeddingShape,
    pub base_url: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    pub model: String,
    /// Expected output dimensionality; checked against the vector index
    /// on load and against every embedding response.
    pub dimensions: usize,
    #[serde(default = "d_8000")]
    pub timeout_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            shape: EmbeddingShape::OpenAi,
            base_url: "https://api.openai.com/v1".into(),
            api_key_env: Some("OPENAI_API_KEY".into()),
            model: "text-embedding-3-small".into(),
            dimensions: 1536,
            timeout_ms: 8_000,
        }
    }
}

/// The two embedding wire shapes named in §4.5 — OpenAI's `/embeddings`
/// endpoint and Ollama's `/api/embeddings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingShape {
    #[default]
    OpenAi,
    Ollama,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Vector index (C6) & memory engine (C7)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Directory holding one vector-index snapshot file per character.
    #[serde(default = "d_vector_dir")]
    pub vector_index_dir: String,
    /// Default number of memories returned by a `search_memories` call.
    #[serde(default = "d_top_k")]
    pub default_top_k: usize,
    /// Weight of cosine similarity vs. recency in the hybrid retrieval
    /// ranking formula (§4.7): `score = w * similarity + (1 - w) * recency`.
    #[serde(default = "d_similarity_weight")]
    pub similarity_weight: f32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            vector_index_dir: d_vector_dir(),
            default_top_k: 5,
            similarity_weight: 0.7,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_8000() -> u64 {
    8_000
}
fn d_vector_dir() -> String {
    "./data/vectors".into()
}
fn d_top_k() -> usize {
    5
}
fn d_similarity_weight() -> f32 {
    0.7
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_default_dimensions_match_model() {
        let cfg = EmbeddingConfig::default();
        assert_eq!(cfg.dimensions, 1536);
        assert_eq!(cfg.shape, EmbeddingShape::OpenAi);
    }

    #[test]
    fn similarity_weight_defaults_within_unit_interval() {
        let cfg = MemoryConfig::default();
        assert!(cfg.similarity_weight >= 0.0 && cfg.similarity_weight <= 1.0);
    }

    #[test]
    fn ollama_shape_deserializes() {
        let cfg: EmbeddingConfig = serde_json::from_str(
            r#"{"shape":"ollama","base_url":"http://localhost:11434","model":"nomic-embed-text","dimensions":768}"#,
        )
        .unwrap();
        assert_eq!(cfg.shape, EmbeddingShape::Ollama);
        assert_eq!(cfg.dimensions, 768);
    }
}
