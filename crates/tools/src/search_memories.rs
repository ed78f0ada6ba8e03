//! `search_memories` — maps onto the teacher's `memory.search` handler,
//! backed by the local Memory Engine (C7) instead of a remote REST call.

use orc_memory::{EmbeddingCredential, SearchOptions, VectorIndex};

use crate::context::ToolContext;
use crate::result::ToolResult;
use crate::runtime::ToolRuntime;

pub async fn execute(runtime: &ToolRuntime, ctx: &ToolContext, arguments: &serde_json::Value) -> ToolResult {
    let Some(character_id) = ctx.character_id else {
        return ToolResult::err("search_memories requires a character in context");
    };
    let query = match arguments.get("query").and_then(|v| v.as_str()) {
        Some(q) if !q.trim().is_empty() => q,
        _ => return ToolResult::err("missing required argument: query"),
    };
    let limit = arguments
        .get("limit")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize);

    let index = VectorIndex::new(runtime.vector_index_path(character_id));
    if let Err(e) = index.load() {
        tracing::warn!(character_id = %character_id, error = %e, "failed to load vector index, falling back to keyword search");
    }

    let credential = ctx.embedding_credential.clone().unwrap_or_else(EmbeddingCredential::default);
    let options = SearchOptions { top_k: limit };

    let ranked = orc_memory::search(
        &runtime.embedding_client,
        &index,
        ctx.embedding_profile.as_ref(),
        &credential,
        &ctx.memories,
        query,
        &options,
    )
    .await;

    let results: Vec<serde_json::Value> = ranked
        .iter()
        .map(|r| {
            serde_json::json!({
                "id": r.memory.id,
                "content": r.memory.content,
                "importance": r.memory.importance,
                "score": r.score,
            })
        })
        .collect();

    ToolResult::ok(serde_json::json!({ "results": results, "count": results.len() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_domain::model::Memory;
    use uuid::Uuid;

    fn sample_memory(character_id: uuid::Uuid, content: &str) -> Memory {
        Memory {
            id: Uuid::new_v4(),
            character_id,
            content: content.into(),
            summary: content.into(),
            keywords: vec![],
            tags: vec![],
            importance: 0.5,
            persona_id: None,
            chat_id: None,
            last_accessed_at: chrono::Utc::now(),
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn requires_a_character_in_context() {
        let dir = tempfile::tempdir().unwrap();
        let file_store = std::sync::Arc::new(
            orc_files::FileStore::new(&dir.path().join("data"), &dir.path().join("blobs")).unwrap(),
        );
        let runtime = ToolRuntime::new(file_store, dir.path().join("vectors"), None);
        let ctx = ToolContext::default();
        let result = execute(&runtime, &ctx, &serde_json::json!({"query": "tea"})).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn falls_back_to_keyword_search_without_an_embedding_profile() {
        let dir = tempfile::tempdir().unwrap();
        let file_store = std::sync::Arc::new(
            orc_files::FileStore::new(&dir.path().join("data"), &dir.path().join("blobs")).unwrap(),
        );
        let runtime = ToolRuntime::new(file_store, dir.path().join("vectors"), None);
        let character_id = Uuid::new_v4();
        let mut ctx = ToolContext::default();
        ctx.character_id = Some(character_id);
        ctx.memories = vec![sample_memory(character_id, "the user likes chamomile tea")];

        let result = execute(&runtime, &ctx, &serde_json::json!({"query": "tea"})).await;
        assert!(result.success);
        let count = result.payload.unwrap()["count"].as_u64().unwrap();
        assert_eq!(count, 1);
    }
}
