//! Chat event append-log: one `<chatId>.jsonl` file per chat, appended to
//! only — never rewritten in place.
//!
//! Grounded directly on the teacher's `TranscriptWriter` (`append`/`read`
//! over `OpenOptions::new().append(true)`), generalized from a flat
//! `TranscriptLine` to the discriminated [`ChatEvent`] union and extended
//! with the resolution pass C10 needs: swipe-group selection, edits, and
//! deletes are recorded as new events, never as in-place mutations (§3
//! invariant), so reading a chat's *current* state means folding the raw
//! log rather than reading it verbatim.

use std::io::Write;
use std::path::{Path, PathBuf};

use orc_domain::error::Result;
use orc_domain::model::{ChatEvent, MessageRole};
use uuid::Uuid;

pub struct ChatEventLog {
    base_dir: PathBuf,
}

impl ChatEventLog {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn path(&self, chat_id: Uuid) -> PathBuf {
        self.base_dir.join(format!("{chat_id}.jsonl"))
    }

    /// Append one or more events. Never fails partway through a batch:
    /// the whole batch is serialized before any bytes are written.
    pub fn append(&self, chat_id: Uuid, events: &[ChatEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.base_dir)?;

        let mut buf = String::new();
        for event in events {
            buf.push_str(&serde_json::to_string(event)?);
            buf.push('\n');
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(chat_id))?;
        file.write_all(buf.as_bytes())?;
        Ok(())
    }

    /// Read back the raw event log in insertion order, skipping any line
    /// that fails to parse (logged, not fatal — matches the teacher's
    /// `TranscriptWriter::read` tolerance for malformed lines).
    pub fn read_raw(&self, chat_id: Uuid) -> Result<Vec<ChatEvent>> {
        let path = self.path(chat_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&path)?;
        let mut events = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ChatEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!(chat_id = %chat_id, error = %e, "skipping malformed chat event");
                }
            }
        }
        Ok(events)
    }
}

/// One message as it should be presented after folding edits, deletes,
/// and swipe selection over the raw log (§3 invariants).
#[derive(Debug, Clone)]
pub struct ResolvedMessage {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub attachments: Vec<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedChat {
    pub context_summary: Option<(String, Uuid)>,
    pub messages: Vec<ResolvedMessage>,
}

/// Fold a chat's raw event log into the state C10 needs: the latest
/// context summary (if any) plus the message history since it, with
/// edits/deletes/swipe-selection applied.
pub fn resolve(events: &[ChatEvent]) -> ResolvedChat {
    use std::collections::HashMap;

    let mut latest_summary: Option<(String, Uuid, usize)> = None;
    for (idx, event) in events.iter().enumerate() {
        if let ChatEvent::ContextSummary {
            summarizes_up_to_event_id,
            content,
            ..
        } = event
        {
            latest_summary = Some((content.clone(), *summarizes_up_to_event_id, idx));
        }
    }

    let start_idx = latest_summary.as_ref().map(|(_, _, idx)| idx + 1).unwrap_or(0);

    let mut edits: HashMap<Uuid, String> = HashMap::new();
    let mut deleted: std::collections::HashSet<Uuid> = std::collections::HashSet::new();
    let mut selected_swipe: HashMap<Uuid, u32> = HashMap::new();

    for event in &events[start_idx..] {
        match event {
            ChatEvent::Edit {
                target_event_id,
                new_content,
                ..
            } => {
                edits.insert(*target_event_id, new_content.clone());
            }
            ChatEvent::Delete { target_event_id, .. } => {
                deleted.insert(*target_event_id);
            }
            ChatEvent::SelectSwipe {
                swipe_group_id,
                selected_index,
                ..
            } => {
                selected_swipe.insert(*swipe_group_id, *selected_index);
            }
            _ => {}
        }
    }

    // Among a swipe group, keep only the selected index (explicit
    // SelectSwipe, or else the highest swipe_index seen).
    let mut highest_in_group: HashMap<Uuid, u32> = HashMap::new();
    for event in &events[start_idx..] {
        if let ChatEvent::Message {
            swipe_group_id: Some(group),
            swipe_index: Some(idx),
            ..
        } = event
        {
            highest_in_group
                .entry(*group)
                .and_modify(|v| *v = (*v).max(*idx))
                .or_insert(*idx);
        }
    }

    let mut messages = Vec::new();
    for event in &events[start_idx..] {
        if let ChatEvent::Message {
            id,
            role,
            content,
            attachments,
            swipe_group_id,
            swipe_index,
            ..
        } = event
        {
            if deleted.contains(id) {
                continue;
            }
            if let (Some(group), Some(idx)) = (swipe_group_id, swipe_index) {
                let target = selected_swipe
                    .get(group)
                    .copied()
                    .or_else(|| highest_in_group.get(group).copied());
                if target != Some(*idx) {
                    continue;
                }
            }
            let content = edits.get(id).cloned().unwrap_or_else(|| content.clone());
            messages.push(ResolvedMessage {
                id: *id,
                role: *role,
                content,
                attachments: attachments.clone(),
            });
        }
    }

    ResolvedChat {
        context_summary: latest_summary.map(|(content, up_to, _)| (content, up_to)),
        messages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn msg(role: MessageRole, content: &str) -> ChatEvent {
        ChatEvent::Message {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            attachments: vec![],
            swipe_group_id: None,
            swipe_index: None,
            token_count: None,
            raw_response_ref: None,
            client_request_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn append_then_read_raw_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let log = ChatEventLog::new(dir.path());
        let chat_id = Uuid::new_v4();
        let event = msg(MessageRole::User, "hello");
        log.append(chat_id, &[event.clone()]).unwrap();
        let events = log.read_raw(chat_id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id(), event.id());
    }

    #[test]
    fn resolve_applies_edit() {
        let original = msg(MessageRole::User, "original");
        let id = original.id();
        let edit = ChatEvent::Edit {
            id: Uuid::new_v4(),
            target_event_id: id,
            prior_content: "original".into(),
            new_content: "edited".into(),
            created_at: Utc::now(),
        };
        let resolved = resolve(&[original, edit]);
        assert_eq!(resolved.messages.len(), 1);
        assert_eq!(resolved.messages[0].content, "edited");
    }

    #[test]
    fn resolve_hides_deleted_messages() {
        let original = msg(MessageRole::User, "gone");
        let id = original.id();
        let delete = ChatEvent::Delete {
            id: Uuid::new_v4(),
            target_event_id: id,
            created_at: Utc::now(),
        };
        let resolved = resolve(&[original, delete]);
        assert!(resolved.messages.is_empty());
    }

    #[test]
    fn resolve_picks_highest_swipe_index_by_default() {
        let group = Uuid::new_v4();
        let swipe_a = ChatEvent::Message {
            id: Uuid::new_v4(),
            role: MessageRole::Assistant,
            content: "first try".into(),
            attachments: vec![],
            swipe_group_id: Some(group),
            swipe_index: Some(0),
            token_count: None,
            raw_response_ref: None,
            client_request_id: None,
            created_at: Utc::now(),
        };
        let swipe_b = ChatEvent::Message {
            id: Uuid::new_v4(),
            role: MessageRole::Assistant,
            content: "second try".into(),
            attachments: vec![],
            swipe_group_id: Some(group),
            swipe_index: Some(1),
            token_count: None,
            raw_response_ref: None,
            client_request_id: None,
            created_at: Utc::now(),
        };
        let resolved = resolve(&[swipe_a, swipe_b]);
        assert_eq!(resolved.messages.len(), 1);
        assert_eq!(resolved.messages[0].content, "second try");
    }

    #[test]
    fn resolve_respects_explicit_select_swipe() {
        let group = Uuid::new_v4();
        let swipe_a_id = Uuid::new_v4();
        let swipe_a = ChatEvent::Message {
            id: swipe_a_id,
            role: MessageRole::Assistant,
            content: "first try".into(),
            attachments: vec![],
            swipe_group_id: Some(group),
            swipe_index: Some(0),
            token_count: None,
            raw_response_ref: None,
            client_request_id: None,
            created_at: Utc::now(),
        };
        let swipe_b = ChatEvent::Message {
            id: Uuid::new_v4(),
            role: MessageRole::Assistant,
            content: "second try".into(),
            attachments: vec![],
            swipe_group_id: Some(group),
            swipe_index: Some(1),
            token_count: None,
            raw_response_ref: None,
            client_request_id: None,
            created_at: Utc::now(),
        };
        let select = ChatEvent::SelectSwipe {
            id: Uuid::new_v4(),
            swipe_group_id: group,
            selected_index: 0,
            created_at: Utc::now(),
        };
        let resolved = resolve(&[swipe_a, swipe_b, select]);
        assert_eq!(resolved.messages.len(), 1);
        assert_eq!(resolved.messages[0].id, swipe_a_id);
    }

    #[test]
    fn resolve_starts_after_latest_context_summary() {
        let old = msg(MessageRole::User, "old turn");
        let old_id = old.id();
        let summary = ChatEvent::ContextSummary {
            id: Uuid::new_v4(),
            summarizes_up_to_event_id: old_id,
            content: "summary text".into(),
            token_count: 10,
            created_at: Utc::now(),
        };
        let new = msg(MessageRole::User, "new turn");
        let resolved = resolve(&[old, summary, new]);
        assert_eq!(resolved.messages.len(), 1);
        assert_eq!(resolved.messages[0].content, "new turn");
        assert!(resolved.context_summary.is_some());
    }
}
