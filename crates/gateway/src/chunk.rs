//! The public streaming contract for `submitTurn`/`swipe` (§4.11).
//!
//! Distinct from `orc_domain::stream::StreamEvent`, which is the
//! provider-facing wire shape the adapters emit — `PublicChunk` is what
//! the orchestrator re-emits to its own caller after tool fan-out,
//! cancellation, and persistence decisions have been applied on top.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PublicChunk {
    /// A new assistant message event has been appended for this turn;
    /// carries the event id so the caller can correlate subsequent
    /// deltas with the eventual persisted record.
    MessageStarted { event_id: Uuid },

    /// Incremental assistant text.
    Delta { text: String },

    /// A tool call has been detected and dispatch is starting.
    ToolStarted { call_id: String, tool_name: String, arguments: Value },

    /// A tool call has finished (success or error).
    ToolFinished { call_id: String, tool_name: String, success: bool },

    /// The turn reached a terminal state with accumulated content.
    Final {
        event_id: Uuid,
        content: String,
        finish_reason: String,
    },

    /// The turn was cancelled mid-stream; `content` is whatever was
    /// accumulated before the cancellation took effect.
    Stopped { event_id: Uuid, content: String },

    /// The turn failed before any assistant content was persisted.
    Error { message: String, tag: &'static str },
}
