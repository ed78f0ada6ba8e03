//! Chat Orchestrator (C11) — the turn state machine (§4.11).
//!
//! States: `Idle → Assembling → Streaming → ToolPending → ToolExecuting →
//! Streaming(resumed) → Finalizing → Idle`. Grounded directly on the
//! teacher's `runtime/turn.rs` `run_turn`/`run_turn_inner` (streaming
//! fan-out to a caller channel, a bounded tool-call loop, cancellation
//! checks at every suspension point, success/cancellation finalization)
//! and `session_lock.rs`/`cancel.rs` for per-chat serialization — unlike
//! the teacher, tool dispatch here is sequential (§4.11 explicit policy
//! deviation), and the tool-loop bound is the spec's default of 5, not
//! the teacher's 25.

use std::sync::Arc;

use chrono::Utc;
use futures_util::StreamExt;
use orc_domain::error::{Error, Result};
use orc_domain::model::{
    ChatEvent, ConnectionProfile, MessageRole, ParticipantKind,
};
use orc_domain::stream::{StreamEvent, Usage};
use orc_domain::tool::{Message, ToolCall};
use orc_domain::trace::TraceEvent;
use orc_providers::LlmProvider;
use orc_store::RepositoryBackend;
use orc_tools::{ToolContext, ToolResult};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::assembly::build_assembly_input;
use crate::cancel::CancelToken;
use crate::chunk::PublicChunk;
use crate::crypto;
use crate::provider_resolve;
use crate::runtime::Runtime;

#[derive(Debug, Clone, Default)]
pub struct TurnInput {
    pub text: String,
    pub attachments: Vec<Uuid>,
    pub connection_profile_override: Option<Uuid>,
    pub client_request_id: Option<String>,
}

/// Submit one user turn to `chat_id`, returning a stream of public chunks.
/// Serializes against any other turn on the same chat (§5); a second call
/// for the same chat blocks until the first reaches `Idle`.
pub async fn submit_turn(
    rt: Arc<Runtime>,
    chat_id: Uuid,
    user_id: Uuid,
    input: TurnInput,
) -> Result<mpsc::Receiver<PublicChunk>> {
    let lock_key = chat_id.to_string();
    let permit = rt
        .session_locks
        .acquire(&lock_key)
        .await
        .map_err(|e| Error::InvalidRequestError(e.to_string()))?;

    // ── Idempotence: a retried client_request_id is a no-op (§4.11) ────
    if let Some(client_id) = input.client_request_id.as_deref() {
        let events = rt.chat_log.read_raw(chat_id)?;
        if let Some(ChatEvent::Message { id, content, .. }) = events.iter().rev().find(|e| {
            matches!(e, ChatEvent::Message { client_request_id: Some(cid), .. } if cid == client_id)
        }) {
            let (tx, rx) = mpsc::channel(1);
            let _ = tx
                .send(PublicChunk::Final {
                    event_id: *id,
                    content: content.clone(),
                    finish_reason: "duplicate_request".into(),
                })
                .await;
            return Ok(rx);
        }
    }

    let chat = rt
        .chats
        .find_by_id(chat_id)
        .ok_or_else(|| Error::not_found(format!("chat {chat_id}")))?;
    if chat.user_id != user_id {
        return Err(Error::Forbidden);
    }

    let character_participant = chat
        .participants
        .iter()
        .find(|p| p.kind == ParticipantKind::Character && p.is_active)
        .ok_or_else(|| Error::ValidationError { fields: vec!["participants".into()] })?;
    let character_id = character_participant
        .ref_id
        .ok_or_else(|| Error::ValidationError { fields: vec!["participants[].refId".into()] })?;
    let character = rt
        .characters
        .find_by_id(character_id)
        .ok_or_else(|| Error::not_found(format!("character {character_id}")))?;

    let persona = chat
        .participants
        .iter()
        .find(|p| p.kind == ParticipantKind::Persona && p.is_active)
        .and_then(|p| p.ref_id)
        .and_then(|id| rt.personas.find_by_id(id));

    let user_display_name = rt
        .users
        .find_by_id(user_id)
        .map(|u| u.display_name)
        .unwrap_or_else(|| "User".into());

    // ── Append the user turn (§4.11: atomic, always happens even if the
    // rest of the turn later fails) ─────────────────────────────────────
    let user_event_id = Uuid::new_v4();
    let user_event = ChatEvent::Message {
        id: user_event_id,
        role: MessageRole::User,
        content: input.text.clone(),
        attachments: input.attachments.clone(),
        swipe_group_id: None,
        swipe_index: None,
        token_count: None,
        raw_response_ref: None,
        client_request_id: input.client_request_id.clone(),
        created_at: Utc::now(),
    };
    rt.chat_log.append(chat_id, &[user_event])?;
    TraceEvent::ChatEventAppended { chat_id: chat_id.to_string(), event_kind: "message".into() }.emit();

    let connection_profile = resolve_connection_profile(
        &rt,
        user_id,
        input.connection_profile_override.or(character_participant.connection_profile_id),
    )?;

    let (tx, rx) = mpsc::channel(64);
    let cancel = rt.cancel_map.register(&lock_key);

    tokio::spawn(run_turn_loop(
        rt,
        chat_id,
        user_id,
        character,
        persona,
        user_display_name,
        connection_profile,
        input.text,
        None,
        tx,
        cancel,
        lock_key,
        permit,
    ));

    Ok(rx)
}

/// Create a new swipe for `message_id`: a fresh assistant response sharing
/// the message's `swipeGroupId` (creating one on first swipe), using the
/// same assembly inputs as the original turn — history up to but
/// excluding the message being swiped.
pub async fn swipe(rt: Arc<Runtime>, chat_id: Uuid, user_id: Uuid, message_id: Uuid) -> Result<mpsc::Receiver<PublicChunk>> {
    let lock_key = chat_id.to_string();
    let permit = rt
        .session_locks
        .acquire(&lock_key)
        .await
        .map_err(|e| Error::InvalidRequestError(e.to_string()))?;

    let chat = rt
        .chats
        .find_by_id(chat_id)
        .ok_or_else(|| Error::not_found(format!("chat {chat_id}")))?;
    if chat.user_id != user_id {
        return Err(Error::Forbidden);
    }

    let events = rt.chat_log.read_raw(chat_id)?;
    let (target_idx, group_id, max_index, original_created_at) = {
        let mut target_idx = None;
        let mut group_id = None;
        let mut max_index = 0u32;
        let mut original_created_at = None;
        for (idx, e) in events.iter().enumerate() {
            if let ChatEvent::Message { id, swipe_group_id, swipe_index, role, created_at, .. } = e {
                if *id == message_id {
                    target_idx = Some(idx);
                    group_id = swipe_group_id.or(Some(Uuid::new_v4()));
                    // All swipes in a group share one original `createdAt`
                    // (§4.11, §8 swipe-group-closure) — the message being
                    // swiped already carries it, whether this is the first
                    // swipe off it or a later one.
                    original_created_at = Some(*created_at);
                    if !matches!(role, MessageRole::Assistant) {
                        return Err(Error::ValidationError { fields: vec!["messageId".into()] });
                    }
                }
                if let Some(g) = swipe_group_id {
                    if Some(*g) == group_id {
                        max_index = max_index.max(swipe_index.unwrap_or(0));
                    }
                }
            }
        }
        (target_idx, group_id, max_index, original_created_at)
    };
    let target_idx = target_idx.ok_or_else(|| Error::not_found(format!("message {message_id}")))?;
    let group_id = group_id.unwrap();
    let original_created_at = original_created_at.unwrap();

    let character_participant = chat
        .participants
        .iter()
        .find(|p| p.kind == ParticipantKind::Character && p.is_active)
        .ok_or_else(|| Error::ValidationError { fields: vec!["participants".into()] })?;
    let character_id = character_participant
        .ref_id
        .ok_or_else(|| Error::ValidationError { fields: vec!["participants[].refId".into()] })?;
    let character = rt
        .characters
        .find_by_id(character_id)
        .ok_or_else(|| Error::not_found(format!("character {character_id}")))?;
    let persona = chat
        .participants
        .iter()
        .find(|p| p.kind == ParticipantKind::Persona && p.is_active)
        .and_then(|p| p.ref_id)
        .and_then(|id| rt.personas.find_by_id(id));
    let user_display_name = rt
        .users
        .find_by_id(user_id)
        .map(|u| u.display_name)
        .unwrap_or_else(|| "User".into());

    let connection_profile = resolve_connection_profile(
        &rt,
        user_id,
        character_participant.connection_profile_id,
    )?;

    // Reassemble `history_upto` from the resolved, pre-swipe view by
    // counting resolved messages that precede `target_idx` in the raw log.
    let history_upto = orc_store::resolve(&events[..target_idx]).messages.len();

    let (tx, rx) = mpsc::channel(64);
    let cancel = rt.cancel_map.register(&lock_key);

    tokio::spawn(run_turn_loop(
        rt,
        chat_id,
        user_id,
        character,
        persona,
        user_display_name,
        connection_profile,
        String::new(),
        Some((group_id, max_index + 1, history_upto, original_created_at)),
        tx,
        cancel,
        lock_key,
        permit,
    ));

    Ok(rx)
}

/// Set the selected variant for a swipe group — pure metadata, no
/// provider call.
pub fn select_swipe(rt: &Runtime, chat_id: Uuid, swipe_group_id: Uuid, selected_index: u32) -> Result<()> {
    let event = ChatEvent::SelectSwipe {
        id: Uuid::new_v4(),
        swipe_group_id,
        selected_index,
        created_at: Utc::now(),
    };
    rt.chat_log.append(chat_id, &[event])
}

/// Record an edit to a prior message; assembly uses `new_content` from
/// this point on. The prior content is preserved in the event itself.
pub fn edit_message(rt: &Runtime, chat_id: Uuid, message_id: Uuid, new_content: String) -> Result<()> {
    let events = rt.chat_log.read_raw(chat_id)?;
    let prior_content = events
        .iter()
        .find_map(|e| match e {
            ChatEvent::Message { id, content, .. } if *id == message_id => Some(content.clone()),
            _ => None,
        })
        .ok_or_else(|| Error::not_found(format!("message {message_id}")))?;

    let event = ChatEvent::Edit {
        id: Uuid::new_v4(),
        target_event_id: message_id,
        prior_content,
        new_content,
        created_at: Utc::now(),
    };
    rt.chat_log.append(chat_id, &[event])
}

/// Tombstone a message: it remains on disk for history but is excluded
/// from subsequent context assembly. Idempotent — deleting an
/// already-deleted message appends a second tombstone but the resolved
/// view is unaffected.
pub fn delete_message(rt: &Runtime, chat_id: Uuid, message_id: Uuid) -> Result<()> {
    let event = ChatEvent::Delete {
        id: Uuid::new_v4(),
        target_event_id: message_id,
        created_at: Utc::now(),
    };
    rt.chat_log.append(chat_id, &[event])
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Internal: provider resolution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn resolve_connection_profile(
    rt: &Runtime,
    user_id: Uuid,
    preferred: Option<Uuid>,
) -> Result<ConnectionProfile> {
    if let Some(id) = preferred {
        if let Some(p) = rt.connection_profiles.find_by_id(id) {
            return Ok(p);
        }
    }
    rt.connection_profiles
        .find_by_user_id(user_id)
        .into_iter()
        .find(|p| p.is_default)
        .ok_or_else(|| Error::ConfigurationError { missing: vec!["connectionProfile".into()] })
}

/// Decrypt the plaintext key behind an `ApiCredential`, given just its id —
/// shared by connection, embedding, and image-generation profiles, which
/// all reference a credential the same way.
fn decrypt_credential_key(rt: &Runtime, user_id: Uuid, credential_id: Option<Uuid>) -> Result<Option<String>> {
    let Some(credential_id) = credential_id else { return Ok(None) };
    let credential = rt
        .api_credentials
        .find_by_id(credential_id)
        .ok_or_else(|| Error::not_found(format!("api credential {credential_id}")))?;
    let key = crypto::derive_key(&rt.config.encryption.key_env, user_id)?;
    let plaintext = crypto::decrypt_to_string(&credential.blob, &key)?;
    Ok(Some(plaintext))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// The tool loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `swipe_plan`, when `Some`, carries `(swipe_group_id, swipe_index,
/// history_upto, original_created_at)` for a `swipe()` call; `None` means
/// a fresh `submitTurn` (a brand new swipe group starting at index 0).
#[allow(clippy::too_many_arguments)]
async fn run_turn_loop(
    rt: Arc<Runtime>,
    chat_id: Uuid,
    user_id: Uuid,
    character: orc_domain::model::Character,
    persona: Option<orc_domain::model::Persona>,
    user_display_name: String,
    connection_profile: ConnectionProfile,
    pending_user_text: String,
    swipe_plan: Option<(Uuid, u32, usize, chrono::DateTime<Utc>)>,
    tx: mpsc::Sender<PublicChunk>,
    cancel: CancelToken,
    lock_key: String,
    _permit: tokio::sync::OwnedSemaphorePermit,
) {
    let result = run_turn_inner(
        &rt,
        chat_id,
        user_id,
        &character,
        persona.as_ref(),
        &user_display_name,
        &connection_profile,
        &pending_user_text,
        swipe_plan,
        &tx,
        &cancel,
    )
    .await;

    rt.cancel_map.remove(&lock_key);

    if let Err(e) = result {
        TraceEvent::PostTurnJobFailed {
            chat_id: chat_id.to_string(),
            job: "submit_turn".into(),
            error: e.to_string(),
        }
        .emit();
        let _ = tx.send(PublicChunk::Error { message: e.to_string(), tag: e.tag() }).await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_turn_inner(
    rt: &Runtime,
    chat_id: Uuid,
    user_id: Uuid,
    character: &orc_domain::model::Character,
    persona: Option<&orc_domain::model::Persona>,
    user_display_name: &str,
    connection_profile: &ConnectionProfile,
    pending_user_text: &str,
    swipe_plan: Option<(Uuid, u32, usize, chrono::DateTime<Utc>)>,
    tx: &mpsc::Sender<PublicChunk>,
    cancel: &CancelToken,
) -> Result<()> {
    let api_key = decrypt_credential_key(rt, user_id, connection_profile.api_credential_id)?;
    let provider = provider_resolve::resolve(connection_profile, api_key)?;

    let embedding_profile = rt
        .embedding_profiles
        .find_by_user_id(user_id)
        .into_iter()
        .find(|p| p.is_default);
    let embedding_credential = match &embedding_profile {
        Some(p) => orc_memory::EmbeddingCredential {
            api_key: decrypt_credential_key(rt, user_id, p.api_credential_id)?,
        },
        None => orc_memory::EmbeddingCredential::default(),
    };

    let image_profile = rt
        .image_profiles
        .find_by_user_id(user_id)
        .into_iter()
        .find(|p| p.is_default);
    let image_api_key = match &image_profile {
        Some(p) => decrypt_credential_key(rt, user_id, p.api_credential_id)?,
        None => None,
    };

    let ranked_memories = {
        let memories = rt.memory_store.load(character.id)?;
        if memories.is_empty() || !rt.config.tools.search_memories_enabled {
            Vec::new()
        } else {
            let index_path = rt.vector_index_path(character.id);
            let index = orc_memory::VectorIndex::new(index_path);
            let _ = index.load();
            orc_memory::search(
                &rt.embedding_client,
                &index,
                embedding_profile.as_ref(),
                &embedding_credential,
                &memories,
                pending_user_text,
                &orc_memory::SearchOptions { top_k: Some(rt.config.memory.default_top_k) },
            )
            .await
        }
    };

    let history_upto = swipe_plan.map(|(_, _, upto, _)| upto);
    let events = rt.chat_log.read_raw(chat_id)?;
    let resolved = orc_store::resolve(&events);

    let assembly_input = build_assembly_input(
        character,
        persona,
        user_display_name,
        &resolved,
        history_upto,
        &ranked_memories,
        pending_user_text,
    );

    let assembler = orc_context::ContextAssembler::new(
        rt.config.context.total_budget_tokens,
        rt.config.context.reserved_for_response_tokens,
    );
    let assembled = match assembler.assemble(&assembly_input) {
        Ok(a) => a,
        Err(Error::ContextOverflow { required, available }) => {
            TraceEvent::ContextOverflow { chat_id: chat_id.to_string(), required, available }.emit();
            let _ = tx
                .send(PublicChunk::Error {
                    message: format!("context overflow: required {required}, available {available}"),
                    tag: "context_overflow",
                })
                .await;
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    TraceEvent::ContextAssembled {
        chat_id: chat_id.to_string(),
        total_tokens: assembled.report.total_estimated_tokens,
        history_messages_included: assembled.report.history_included,
        memories_included: assembled.report.memories_included,
        summary_included: assembled.report.summary_included,
    }
    .emit();

    let event_id = Uuid::new_v4();
    let _ = tx.send(PublicChunk::MessageStarted { event_id }).await;

    let mut messages = assembled.messages;
    let tool_defs = orc_tools::build_tool_definitions();
    let max_loops = rt.config.tools.max_tool_loops;
    let mut total_usage = Usage { prompt_tokens: 0, completion_tokens: 0, total_tokens: 0 };
    let mut text_buf = String::new();
    let mut finish_reason = "stop".to_string();
    let mut generated_attachments: Vec<Uuid> = Vec::new();

    for _ in 0..max_loops {
        if cancel.is_cancelled() {
            return finalize_cancelled(rt, chat_id, swipe_plan, event_id, &text_buf, generated_attachments, tx).await;
        }

        let req = orc_providers::ChatRequest {
            messages: messages.clone(),
            tools: tool_defs.clone(),
            temperature: connection_profile.parameters.temperature,
            max_tokens: connection_profile.parameters.max_tokens,
            json_mode: false,
            model: Some(connection_profile.model_name.clone()),
        };

        let call_start = std::time::Instant::now();
        let mut stream = provider.chat_stream(&req).await?;
        let mut pending_tool_calls: Vec<ToolCall> = Vec::new();
        let mut turn_usage: Option<Usage> = None;
        let mut was_cancelled = false;
        let mut tc_bufs: std::collections::HashMap<String, (String, String)> = Default::default();

        while let Some(event_result) = stream.next().await {
            if cancel.is_cancelled() {
                was_cancelled = true;
                break;
            }
            match event_result? {
                StreamEvent::Token { text } => {
                    text_buf.push_str(&text);
                    let _ = tx.send(PublicChunk::Delta { text }).await;
                }
                StreamEvent::Thinking { .. } => {}
                StreamEvent::ToolCallStarted { call_id, tool_name } => {
                    tc_bufs.insert(call_id, (tool_name, String::new()));
                }
                StreamEvent::ToolCallDelta { call_id, delta } => {
                    if let Some((_, args)) = tc_bufs.get_mut(&call_id) {
                        args.push_str(&delta);
                    }
                }
                StreamEvent::ToolCallFinished { call_id, tool_name, arguments } => {
                    pending_tool_calls.push(ToolCall { call_id: call_id.clone(), tool_name, arguments });
                    tc_bufs.remove(&call_id);
                }
                StreamEvent::Done { usage, finish_reason: fr, cancelled } => {
                    turn_usage = usage;
                    if let Some(fr) = fr {
                        finish_reason = fr;
                    }
                    if cancelled {
                        was_cancelled = true;
                    }
                }
                StreamEvent::Error { message } => {
                    return Err(Error::ProviderError {
                        provider: connection_profile.id.to_string(),
                        status: 0,
                        detail: message,
                    });
                }
            }
        }

        TraceEvent::ProviderRequest {
            provider: connection_profile.id.to_string(),
            model: connection_profile.model_name.clone(),
            streaming: true,
            duration_ms: call_start.elapsed().as_millis() as u64,
            prompt_tokens: turn_usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: turn_usage.as_ref().map(|u| u.completion_tokens),
        }
        .emit();

        if was_cancelled {
            return finalize_cancelled(rt, chat_id, swipe_plan, event_id, &text_buf, generated_attachments, tx).await;
        }

        for (call_id, (tool_name, args_str)) in tc_bufs {
            let arguments = serde_json::from_str(&args_str).unwrap_or(serde_json::json!({}));
            pending_tool_calls.push(ToolCall { call_id, tool_name, arguments });
        }

        if let Some(u) = &turn_usage {
            total_usage.prompt_tokens += u.prompt_tokens;
            total_usage.completion_tokens += u.completion_tokens;
            total_usage.total_tokens += u.total_tokens;
        }

        if pending_tool_calls.is_empty() {
            return finalize_success(
                rt,
                chat_id,
                user_id,
                character.id,
                pending_user_text,
                swipe_plan,
                event_id,
                &text_buf,
                generated_attachments,
                &finish_reason,
                tx,
            )
            .await;
        }

        messages.push(Message::assistant(text_buf.clone()));

        // Sequential tool dispatch (§4.11: deliberate deviation from the
        // teacher's parallelizable dispatch, to preserve deterministic
        // re-injection order).
        let ctx = ToolContext {
            chat_id,
            user_id,
            character_id: Some(character.id),
            calling_participant_id: None,
            calling_participant_name: Some(character.name.clone()),
            calling_participant_appearance: Some(character.description.clone()),
            embedding_profile: embedding_profile.clone(),
            embedding_credential: Some(embedding_credential.clone()),
            image_profile: image_profile.clone(),
            image_api_key: image_api_key.clone(),
            memories: rt.memory_store.load(character.id).unwrap_or_default(),
        };

        for call in &pending_tool_calls {
            if cancel.is_cancelled() {
                return finalize_cancelled(rt, chat_id, swipe_plan, event_id, &text_buf, generated_attachments, tx).await;
            }
            TraceEvent::ToolDispatched {
                chat_id: chat_id.to_string(),
                tool_name: call.tool_name.clone(),
                call_id: call.call_id.clone(),
            }
            .emit();
            let tool_start = std::time::Instant::now();
            let _ = tx
                .send(PublicChunk::ToolStarted {
                    call_id: call.call_id.clone(),
                    tool_name: call.tool_name.clone(),
                    arguments: call.arguments.clone(),
                })
                .await;

            let result: ToolResult = orc_tools::execute(&rt.tools, call, &ctx).await;

            let invocation_event = ChatEvent::ToolInvocation {
                id: Uuid::new_v4(),
                tool_name: call.tool_name.clone(),
                arguments: call.arguments.clone(),
                status: if result.success {
                    orc_domain::model::ToolInvocationStatus::Succeeded
                } else {
                    orc_domain::model::ToolInvocationStatus::Failed
                },
                result_ref: None,
                error_text: result.error.clone(),
                created_at: Utc::now(),
            };
            rt.chat_log.append(chat_id, &[invocation_event])?;
            TraceEvent::ToolCompleted {
                chat_id: chat_id.to_string(),
                tool_name: call.tool_name.clone(),
                call_id: call.call_id.clone(),
                success: result.success,
                duration_ms: tool_start.elapsed().as_millis() as u64,
            }
            .emit();

            let _ = tx
                .send(PublicChunk::ToolFinished {
                    call_id: call.call_id.clone(),
                    tool_name: call.tool_name.clone(),
                    success: result.success,
                })
                .await;

            if call.tool_name == "generate_image" && result.success {
                if let Some(file_id) = result
                    .payload
                    .as_ref()
                    .and_then(|p| p.get("fileId"))
                    .and_then(|v| v.as_str())
                    .and_then(|s| Uuid::parse_str(s).ok())
                {
                    generated_attachments.push(file_id);
                }
            }

            let rendered = orc_tools::format_tool_result(&call.tool_name, &result);
            messages.push(Message::user(rendered));
        }

        text_buf.clear();
    }

    TraceEvent::ToolLoopExceeded { chat_id: chat_id.to_string(), limit: max_loops }.emit();
    finalize_success(
        rt,
        chat_id,
        user_id,
        character.id,
        pending_user_text,
        swipe_plan,
        event_id,
        &text_buf,
        generated_attachments,
        "tool_loop_exceeded",
        tx,
    )
    .await
}

/// Returns `(swipeGroupId, swipeIndex, createdAt)` for the event about to
/// be persisted. A fresh turn starts a new group at index 0 stamped with
/// the current time; a swipe reuses the group's shared `createdAt` (§4.11,
/// §8 swipe-group-closure) so every variant in the group ties out.
fn next_swipe_fields(
    swipe_plan: Option<(Uuid, u32, usize, chrono::DateTime<Utc>)>,
) -> (Option<Uuid>, Option<u32>, chrono::DateTime<Utc>) {
    match swipe_plan {
        Some((group, index, _, original_created_at)) => (Some(group), Some(index), original_created_at),
        None => (Some(Uuid::new_v4()), Some(0), Utc::now()),
    }
}

#[allow(clippy::too_many_arguments)]
async fn finalize_success(
    rt: &Runtime,
    chat_id: Uuid,
    user_id: Uuid,
    character_id: Uuid,
    user_text: &str,
    swipe_plan: Option<(Uuid, u32, usize, chrono::DateTime<Utc>)>,
    event_id: Uuid,
    content: &str,
    attachments: Vec<Uuid>,
    finish_reason: &str,
    tx: &mpsc::Sender<PublicChunk>,
) -> Result<()> {
    let (swipe_group_id, swipe_index, created_at) = next_swipe_fields(swipe_plan);
    let event = ChatEvent::Message {
        id: event_id,
        role: MessageRole::Assistant,
        content: content.to_string(),
        attachments,
        swipe_group_id,
        swipe_index,
        token_count: None,
        raw_response_ref: None,
        client_request_id: None,
        created_at,
    };
    rt.chat_log.append(chat_id, &[event])?;
    TraceEvent::ChatEventAppended { chat_id: chat_id.to_string(), event_kind: "message".into() }.emit();
    let _ = tx
        .send(PublicChunk::Final {
            event_id,
            content: content.to_string(),
            finish_reason: finish_reason.to_string(),
        })
        .await;

    // Post-turn jobs (C12) run off this critical path — a completed
    // exchange, not a cancelled one, is what feeds memory/title/summary.
    crate::post_turn::spawn(rt.clone(), chat_id, user_id, character_id, user_text.to_string(), content.to_string());

    Ok(())
}

async fn finalize_cancelled(
    rt: &Runtime,
    chat_id: Uuid,
    swipe_plan: Option<(Uuid, u32, usize, chrono::DateTime<Utc>)>,
    event_id: Uuid,
    content: &str,
    attachments: Vec<Uuid>,
    tx: &mpsc::Sender<PublicChunk>,
) -> Result<()> {
    let (swipe_group_id, swipe_index, created_at) = next_swipe_fields(swipe_plan);
    let event = ChatEvent::Message {
        id: event_id,
        role: MessageRole::Assistant,
        content: content.to_string(),
        attachments,
        swipe_group_id,
        swipe_index,
        token_count: None,
        raw_response_ref: None,
        client_request_id: None,
        created_at,
    };
    rt.chat_log.append(chat_id, &[event])?;
    TraceEvent::TurnCancelled { chat_id: chat_id.to_string(), partial_chars: content.len() }.emit();
    let _ = tx.send(PublicChunk::Stopped { event_id, content: content.to_string() }).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_domain::config::Config;
    use orc_domain::model::SamplingParameters;

    fn test_runtime(dir: &std::path::Path) -> Runtime {
        let mut config = Config::default();
        config.storage.data_dir = dir.join("data").to_string_lossy().to_string();
        config.storage.blob_dir = dir.join("blobs").to_string_lossy().to_string();
        config.memory.vector_index_dir = dir.join("vectors").to_string_lossy().to_string();
        Runtime::new(config).unwrap()
    }

    fn profile(rt: &Runtime, user_id: Uuid, is_default: bool, is_cheap: bool) -> ConnectionProfile {
        rt.connection_profiles
            .create(ConnectionProfile {
                id: Uuid::new_v4(),
                user_id,
                provider: orc_domain::capability::ProviderShape::Ollama,
                model_name: "llama3".into(),
                api_credential_id: None,
                base_url: None,
                parameters: SamplingParameters::default(),
                is_default,
                is_cheap,
                tags: vec![],
            })
            .unwrap()
    }

    #[test]
    fn next_swipe_fields_fresh_turn_starts_at_zero() {
        let (group, index, _created_at) = next_swipe_fields(None);
        assert!(group.is_some());
        assert_eq!(index, Some(0));
    }

    #[test]
    fn next_swipe_fields_swipe_carries_plan_through() {
        let existing_group = Uuid::new_v4();
        let original_created_at = Utc::now();
        let (group, index, created_at) =
            next_swipe_fields(Some((existing_group, 3, 7, original_created_at)));
        assert_eq!(group, Some(existing_group));
        assert_eq!(index, Some(3));
        assert_eq!(created_at, original_created_at);
    }

    #[test]
    fn resolve_connection_profile_prefers_explicit_override() {
        let dir = tempfile::tempdir().unwrap();
        let rt = test_runtime(dir.path());
        let user_id = Uuid::new_v4();
        let default_profile = profile(&rt, user_id, true, false);
        let override_profile = profile(&rt, user_id, false, false);

        let resolved = resolve_connection_profile(&rt, user_id, Some(override_profile.id)).unwrap();
        assert_eq!(resolved.id, override_profile.id);
        assert_ne!(resolved.id, default_profile.id);
    }

    #[test]
    fn resolve_connection_profile_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let rt = test_runtime(dir.path());
        let user_id = Uuid::new_v4();
        let default_profile = profile(&rt, user_id, true, false);

        // The preferred id doesn't exist — falls back to the user's default.
        let resolved = resolve_connection_profile(&rt, user_id, Some(Uuid::new_v4())).unwrap();
        assert_eq!(resolved.id, default_profile.id);
    }

    #[test]
    fn resolve_connection_profile_errors_without_a_default() {
        let dir = tempfile::tempdir().unwrap();
        let rt = test_runtime(dir.path());
        let user_id = Uuid::new_v4();

        let err = resolve_connection_profile(&rt, user_id, None).unwrap_err();
        assert_eq!(err.tag(), "configuration_error");
    }

    #[test]
    fn select_swipe_edit_delete_append_expected_events() {
        let dir = tempfile::tempdir().unwrap();
        let rt = test_runtime(dir.path());
        let chat_id = Uuid::new_v4();
        let message_id = Uuid::new_v4();

        rt.chat_log
            .append(
                chat_id,
                &[ChatEvent::Message {
                    id: message_id,
                    role: MessageRole::Assistant,
                    content: "original".into(),
                    attachments: vec![],
                    swipe_group_id: None,
                    swipe_index: None,
                    token_count: None,
                    raw_response_ref: None,
                    client_request_id: None,
                    created_at: Utc::now(),
                }],
            )
            .unwrap();

        let swipe_group_id = Uuid::new_v4();
        select_swipe(&rt, chat_id, swipe_group_id, 2).unwrap();
        edit_message(&rt, chat_id, message_id, "edited".into()).unwrap();
        delete_message(&rt, chat_id, message_id).unwrap();

        let events = rt.chat_log.read_raw(chat_id).unwrap();
        assert!(matches!(events[1], ChatEvent::SelectSwipe { selected_index: 2, .. }));
        assert!(matches!(&events[2], ChatEvent::Edit { new_content, .. } if new_content == "edited"));
        assert!(matches!(events[3], ChatEvent::Delete { .. }));

        let resolved = orc_store::resolve(&events);
        assert!(resolved.messages.is_empty(), "deleted message must not appear in the resolved view");
    }

    #[test]
    fn edit_message_unknown_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let rt = test_runtime(dir.path());
        let err = edit_message(&rt, Uuid::new_v4(), Uuid::new_v4(), "x".into()).unwrap_err();
        assert_eq!(err.tag(), "not_found");
    }

    #[tokio::test]
    async fn submit_turn_short_circuits_on_duplicate_client_request_id() {
        let dir = tempfile::tempdir().unwrap();
        let rt = Arc::new(test_runtime(dir.path()));
        let chat_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let event_id = Uuid::new_v4();

        rt.chat_log
            .append(
                chat_id,
                &[ChatEvent::Message {
                    id: event_id,
                    role: MessageRole::Assistant,
                    content: "already answered".into(),
                    attachments: vec![],
                    swipe_group_id: None,
                    swipe_index: None,
                    token_count: None,
                    raw_response_ref: None,
                    client_request_id: Some("retry-1".into()),
                    created_at: Utc::now(),
                }],
            )
            .unwrap();

        let input = TurnInput {
            text: "hello again".into(),
            client_request_id: Some("retry-1".into()),
            ..Default::default()
        };
        let mut rx = submit_turn(rt, chat_id, user_id, input).await.unwrap();
        let chunk = rx.recv().await.unwrap();
        match chunk {
            PublicChunk::Final { event_id: got_id, content, finish_reason } => {
                assert_eq!(got_id, event_id);
                assert_eq!(content, "already answered");
                assert_eq!(finish_reason, "duplicate_request");
            }
            other => panic!("expected Final, got {other:?}"),
        }
        assert!(rx.recv().await.is_none(), "no further chunks after the duplicate short-circuit");
    }

    #[tokio::test]
    async fn submit_turn_rejects_chat_owned_by_a_different_user() {
        let dir = tempfile::tempdir().unwrap();
        let rt = Arc::new(test_runtime(dir.path()));
        let owner_id = Uuid::new_v4();
        let other_user_id = Uuid::new_v4();

        let chat = rt
            .chats
            .create(orc_domain::model::Chat {
                id: Uuid::new_v4(),
                user_id: owner_id,
                title: "chat".into(),
                participants: vec![],
                created_at: Utc::now(),
                updated_at: Utc::now(),
                title_last_checked_at_interchange: None,
            })
            .unwrap();

        let input = TurnInput { text: "hi".into(), ..Default::default() };
        let err = submit_turn(rt, chat.id, other_user_id, input).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden));
    }

    #[tokio::test]
    async fn submit_turn_requires_an_active_character_participant() {
        let dir = tempfile::tempdir().unwrap();
        let rt = Arc::new(test_runtime(dir.path()));
        let user_id = Uuid::new_v4();

        let chat = rt
            .chats
            .create(orc_domain::model::Chat {
                id: Uuid::new_v4(),
                user_id,
                title: "chat".into(),
                participants: vec![],
                created_at: Utc::now(),
                updated_at: Utc::now(),
                title_last_checked_at_interchange: None,
            })
            .unwrap();

        let input = TurnInput { text: "hi".into(), ..Default::default() };
        let err = submit_turn(rt, chat.id, user_id, input).await.unwrap_err();
        assert!(matches!(err, Error::ValidationError { .. }));
    }
}
