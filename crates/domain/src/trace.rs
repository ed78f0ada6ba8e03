use serde::Serialize;

/// Structured trace events emitted across the orchestration core.
///
/// Each variant serializes to JSON and rides along a `tracing::info!` event
/// under a single `trace_event` field, so one `tracing-subscriber` JSON
/// layer captures both the free-text log line and the structured payload.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    ContextAssembled {
        chat_id: String,
        total_tokens: usize,
        history_messages_included: usize,
        memories_included: usize,
        summary_included: bool,
    },
    ContextOverflow {
        chat_id: String,
        required: usize,
        available: usize,
    },
    TurnStateChanged {
        chat_id: String,
        from: String,
        to: String,
    },
    ToolDispatched {
        chat_id: String,
        tool_name: String,
        call_id: String,
    },
    ToolCompleted {
        chat_id: String,
        tool_name: String,
        call_id: String,
        success: bool,
        duration_ms: u64,
    },
    ToolLoopExceeded {
        chat_id: String,
        limit: usize,
    },
    ChatEventAppended {
        chat_id: String,
        event_kind: String,
    },
    TurnCancelled {
        chat_id: String,
        partial_chars: usize,
    },
    ProviderRequest {
        provider: String,
        model: String,
        streaming: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    MemoryExtracted {
        character_id: String,
        chat_id: String,
        candidates: usize,
    },
    MemoryHousekeepingRun {
        character_id: String,
        deleted: usize,
        merged: usize,
        kept: usize,
        preview: bool,
    },
    TitleRefreshed {
        chat_id: String,
        interchange: usize,
    },
    ContextSummaryCreated {
        chat_id: String,
        up_to_event_id: String,
        summary_tokens: usize,
    },
    PostTurnJobFailed {
        chat_id: String,
        job: String,
        error: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "orc_event");
    }
}
