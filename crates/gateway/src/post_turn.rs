//! Post-turn Jobs (C12, §4.12) — memory extraction, title refresh, and
//! context summarization, all scheduled off the critical path once a turn
//! reaches `Finalizing`. Every job here is best-effort: a failure is
//! logged and swallowed, never surfaced to the user and never blocks the
//! next `submitTurn`.
//!
//! Grounded on the teacher's `runtime/mod.rs::fire_auto_capture`
//! (fire-and-forget `tokio::spawn` around a memory ingest call) and
//! `runtime/compact.rs` (trigger/keep-window compaction), generalized from
//! a remote memory-server ingest call to this core's own C5/C6/C7 stack
//! and from a fixed turn-count threshold to the configured interchange
//! trigger (`CompactionConfig`).

use std::sync::Arc;

use chrono::Utc;
use orc_domain::model::{ChatEvent, MessageRole, Memory};
use orc_domain::trace::TraceEvent;
use orc_providers::{ChatRequest, LlmProvider};
use orc_store::RepositoryBackend;
use uuid::Uuid;

use crate::crypto;
use crate::provider_resolve;
use crate::runtime::Runtime;

/// Spawn every post-turn job for one completed exchange. `rt` is a cheap
/// clone of the shared runtime (everything in it is `Arc`-wrapped), owned
/// by the spawned task so it outlives the caller's turn.
pub fn spawn(rt: Runtime, chat_id: Uuid, user_id: Uuid, character_id: Uuid, user_text: String, assistant_text: String) {
    tokio::spawn(async move {
        if rt.config.memory_policy.auto_extract {
            if let Err(e) = extract_memories(&rt, chat_id, user_id, character_id, &user_text, &assistant_text).await {
                tracing::warn!(chat_id = %chat_id, error = %e, "memory extraction failed");
                TraceEvent::PostTurnJobFailed { chat_id: chat_id.to_string(), job: "memory_extraction".into(), error: e.to_string() }.emit();
            }
        }
        if let Err(e) = refresh_title(&rt, chat_id, user_id).await {
            tracing::warn!(chat_id = %chat_id, error = %e, "title refresh failed");
            TraceEvent::PostTurnJobFailed { chat_id: chat_id.to_string(), job: "title_refresh".into(), error: e.to_string() }.emit();
        }
        if let Err(e) = summarize_context(&rt, chat_id, user_id).await {
            tracing::warn!(chat_id = %chat_id, error = %e, "context summarization failed");
            TraceEvent::PostTurnJobFailed { chat_id: chat_id.to_string(), job: "context_summary".into(), error: e.to_string() }.emit();
        }
    });
}

/// Find the cheapest connection profile the user has configured,
/// preferring one flagged `is_cheap`, falling back to the default.
fn cheap_profile(rt: &Runtime, user_id: Uuid) -> Option<orc_domain::model::ConnectionProfile> {
    let profiles = rt.connection_profiles.find_by_user_id(user_id);
    profiles
        .iter()
        .find(|p| p.is_cheap)
        .or_else(|| profiles.iter().find(|p| p.is_default))
        .cloned()
}

async fn resolve_cheap_provider(
    rt: &Runtime,
    user_id: Uuid,
) -> orc_domain::error::Result<(orc_domain::model::ConnectionProfile, Arc<dyn LlmProvider>)> {
    let profile = cheap_profile(rt, user_id).ok_or_else(|| {
        orc_domain::error::Error::ConfigurationError { missing: vec!["connectionProfile (cheap or default)".into()] }
    })?;
    let api_key = match profile.api_credential_id {
        Some(credential_id) => {
            let credential = rt
                .api_credentials
                .find_by_id(credential_id)
                .ok_or_else(|| orc_domain::error::Error::not_found(format!("api credential {credential_id}")))?;
            let key = crypto::derive_key(&rt.config.encryption.key_env, user_id)?;
            Some(crypto::decrypt_to_string(&credential.blob, &key)?)
        }
        None => None,
    };
    let provider = provider_resolve::resolve(&profile, api_key)?;
    Ok((profile, provider))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Memory extraction (§4.7, §4.12)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, serde::Deserialize)]
struct MemoryCandidate {
    content: String,
    summary: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default = "default_importance")]
    importance: f32,
}

fn default_importance() -> f32 {
    0.5
}

async fn extract_memories(
    rt: &Runtime,
    chat_id: Uuid,
    user_id: Uuid,
    character_id: Uuid,
    user_text: &str,
    assistant_text: &str,
) -> orc_domain::error::Result<()> {
    let (_, provider) = resolve_cheap_provider(rt, user_id).await?;

    let prompt = format!(
        "Extract zero or more durable facts worth remembering from this exchange. \
         Respond with a JSON array only, each item shaped as \
         {{\"content\": string, \"summary\": string, \"keywords\": string[], \"importance\": 0.0-1.0}}. \
         Return `[]` if nothing is worth remembering.\n\n\
         User: {user_text}\nAssistant: {assistant_text}"
    );
    let req = ChatRequest {
        messages: vec![orc_domain::tool::Message::user(prompt.clone())],
        tools: vec![],
        temperature: Some(0.2),
        max_tokens: Some(800),
        json_mode: true,
        model: None,
    };
    let resp = provider.chat(&req).await?;
    let candidates: Vec<MemoryCandidate> = serde_json::from_str(resp.content.trim()).unwrap_or_default();
    if candidates.is_empty() {
        return Ok(());
    }

    let mut memories = rt.memory_store.load(character_id)?;
    let now = Utc::now();
    let index_path = rt.vector_index_path(character_id);
    let index = orc_memory::VectorIndex::new(index_path);
    let _ = index.load();

    let embedding_profile = rt
        .embedding_profiles
        .find_by_user_id(user_id)
        .into_iter()
        .find(|p| p.is_default);

    for candidate in &candidates {
        let memory = Memory {
            id: Uuid::new_v4(),
            character_id,
            content: candidate.content.clone(),
            summary: candidate.summary.clone(),
            keywords: candidate.keywords.clone(),
            tags: vec![],
            importance: candidate.importance.clamp(0.0, 1.0),
            persona_id: None,
            chat_id: Some(chat_id),
            last_accessed_at: now,
            created_at: now,
        };

        if let Some(profile) = &embedding_profile {
            let credential = match profile.api_credential_id {
                Some(credential_id) => rt.api_credentials.find_by_id(credential_id).and_then(|c| {
                    let key = crypto::derive_key(&rt.config.encryption.key_env, user_id).ok()?;
                    crypto::decrypt_to_string(&c.blob, &key).ok()
                }),
                None => None,
            };
            let embedding_credential = orc_memory::EmbeddingCredential { api_key: credential };
            if let Ok(result) = rt.embedding_client.embed(&memory.summary, profile, &embedding_credential).await {
                let _ = index.add(memory.id, result.vector, serde_json::json!({}));
            }
        }

        memories.push(memory);
    }

    let policy = orc_memory::HousekeepingPolicy {
        max_memories: Some(rt.config.memory_policy.max_memories_per_character),
        max_age_months: None,
        max_inactive_months: None,
        min_importance: None,
        merge_similar: true,
        merge_threshold: Some(rt.config.memory_policy.merge_threshold),
    };
    let options = orc_memory::HousekeepingOptions { preview: rt.config.memory_policy.preview_only };
    let (surviving, report) = orc_memory::memory::run(&memories, &policy, &options);

    if !options.preview {
        for id in report.deleted_ids.iter().chain(report.merged_ids.iter()) {
            index.remove(*id);
        }
        index.save()?;
        rt.memory_store.save(character_id, &surviving)?;
    }

    TraceEvent::MemoryExtracted {
        character_id: character_id.to_string(),
        chat_id: chat_id.to_string(),
        candidates: candidates.len(),
    }
    .emit();
    TraceEvent::MemoryHousekeepingRun {
        character_id: character_id.to_string(),
        deleted: report.deleted_ids.len(),
        merged: report.merged_ids.len(),
        kept: report.kept,
        preview: options.preview,
    }
    .emit();

    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Title refresh (§4.12)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Interchange counts at which a title refresh is attempted: 2, 3, 5, 7,
/// 10, then every 10 thereafter.
fn is_title_checkpoint(interchange: usize) -> bool {
    matches!(interchange, 2 | 3 | 5 | 7 | 10) || (interchange > 10 && interchange % 10 == 0)
}

fn count_interchanges(resolved: &orc_store::ResolvedChat) -> usize {
    resolved.messages.iter().filter(|m| m.role == MessageRole::Assistant).count()
}

async fn refresh_title(rt: &Runtime, chat_id: Uuid, user_id: Uuid) -> orc_domain::error::Result<()> {
    let chat = rt.chats.find_by_id(chat_id).ok_or_else(|| orc_domain::error::Error::not_found(format!("chat {chat_id}")))?;
    if chat.user_id != user_id {
        return Ok(());
    }

    let events = rt.chat_log.read_raw(chat_id)?;
    let resolved = orc_store::resolve(&events);
    let interchange = count_interchanges(&resolved);
    if !is_title_checkpoint(interchange) {
        return Ok(());
    }
    if chat.title_last_checked_at_interchange == Some(interchange) {
        return Ok(());
    }

    let (_, provider) = resolve_cheap_provider(rt, user_id).await?;
    let transcript: String = resolved
        .messages
        .iter()
        .rev()
        .take(10)
        .rev()
        .map(|m| format!("{:?}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = format!(
        "Write a short (max 6 words) title for this chat based on the conversation so far. \
         Respond with the title text only, no quotes or punctuation.\n\n{transcript}"
    );
    let req = ChatRequest {
        messages: vec![orc_domain::tool::Message::user(prompt.clone())],
        tools: vec![],
        temperature: Some(0.3),
        max_tokens: Some(20),
        json_mode: false,
        model: None,
    };
    let resp = provider.chat(&req).await?;
    let title = resp.content.trim().trim_matches('"').to_string();
    if title.is_empty() {
        return Ok(());
    }

    rt.chats.update(chat_id, |c| {
        c.title = title.clone();
        c.title_last_checked_at_interchange = Some(interchange);
    })?;

    TraceEvent::TitleRefreshed { chat_id: chat_id.to_string(), interchange }.emit();
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Context summarization (§4.10, §4.12)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn summarize_context(rt: &Runtime, chat_id: Uuid, user_id: Uuid) -> orc_domain::error::Result<()> {
    if !rt.config.compaction.auto {
        return Ok(());
    }

    let events = rt.chat_log.read_raw(chat_id)?;
    let resolved = orc_store::resolve(&events);
    let interchange = count_interchanges(&resolved);
    if interchange < rt.config.compaction.trigger_interchanges {
        return Ok(());
    }

    let keep_messages = rt.config.compaction.keep_last_interchanges * 2;
    if resolved.messages.len() <= keep_messages {
        return Ok(());
    }
    let split_at = resolved.messages.len() - keep_messages;
    let (to_summarize, _to_keep) = resolved.messages.split_at(split_at);
    let summarizes_up_to_event_id = to_summarize.last().map(|m| m.id).unwrap_or_else(Uuid::new_v4);

    let (_, provider) = resolve_cheap_provider(rt, user_id).await?;
    let transcript: String = to_summarize
        .iter()
        .map(|m| format!("{:?}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = format!(
        "Summarize the following conversation history concisely, preserving the \
         current scene, relationships, and any established facts. Write in present \
         tense, omit greetings.\n\nCONVERSATION:\n{transcript}"
    );
    let req = ChatRequest {
        messages: vec![orc_domain::tool::Message::user(prompt.clone())],
        tools: vec![],
        temperature: Some(0.2),
        max_tokens: Some(1000),
        json_mode: false,
        model: None,
    };
    let resp = provider.chat(&req).await?;
    let summary = resp.content.trim().to_string();
    if summary.is_empty() {
        return Ok(());
    }

    let token_count = orc_context::token::estimate_message("system", &summary);
    let event = ChatEvent::ContextSummary {
        id: Uuid::new_v4(),
        summarizes_up_to_event_id,
        content: summary,
        token_count,
        created_at: Utc::now(),
    };
    rt.chat_log.append(chat_id, &[event])?;

    TraceEvent::ContextSummaryCreated {
        chat_id: chat_id.to_string(),
        up_to_event_id: summarizes_up_to_event_id.to_string(),
        summary_tokens: token_count,
    }
    .emit();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_checkpoints_match_spec_sequence() {
        for n in [2, 3, 5, 7, 10, 20, 30, 40] {
            assert!(is_title_checkpoint(n), "{n} should be a checkpoint");
        }
        for n in [1, 4, 6, 8, 9, 11, 15, 25] {
            assert!(!is_title_checkpoint(n), "{n} should not be a checkpoint");
        }
    }

    #[test]
    fn count_interchanges_counts_assistant_messages() {
        let mut resolved = orc_store::ResolvedChat::default();
        resolved.messages.push(orc_store::ResolvedMessage {
            id: Uuid::new_v4(),
            role: MessageRole::User,
            content: "hi".into(),
            attachments: vec![],
        });
        resolved.messages.push(orc_store::ResolvedMessage {
            id: Uuid::new_v4(),
            role: MessageRole::Assistant,
            content: "hello".into(),
            attachments: vec![],
        });
        assert_eq!(count_interchanges(&resolved), 1);
    }
}
