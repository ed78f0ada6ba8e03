//! `orc-tools` — the Tool Runtime (C9): a closed three-tool set
//! (`generate_image`, `search_memories`, `search_web`) dispatched through a
//! single `execute(toolCall, ctx) -> ToolResult` entry point.
//!
//! Grounded on the teacher's `gateway/src/runtime/tools.rs`
//! `build_tool_definitions`/`dispatch_tool` pair — the same
//! definitions-list-plus-match-dispatch shape, narrowed to three tools and
//! generalized from `(String, bool)` to [`ToolResult`].

pub mod context;
pub mod definitions;
pub mod dispatch;
pub mod generate_image;
pub mod result;
pub mod runtime;
pub mod search_memories;
pub mod search_web;
pub mod template;

pub use context::ToolContext;
pub use definitions::build_tool_definitions;
pub use dispatch::execute;
pub use result::{format_tool_result, ToolResult};
pub use runtime::{ToolRuntime, WebSearchConfig};
