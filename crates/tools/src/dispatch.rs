//! Tool dispatch (§4.9): `execute(toolCall, ctx) → ToolResult`.
//!
//! Grounded on the teacher's `dispatch_tool(state, tool_name, arguments,
//! session_key) -> (String, bool)` match table, generalized to the
//! richer [`ToolResult`] shape and a closed three-tool set.

use orc_domain::tool::ToolCall;

use crate::context::ToolContext;
use crate::result::ToolResult;
use crate::runtime::ToolRuntime;
use crate::{generate_image, search_memories, search_web};

pub async fn execute(runtime: &ToolRuntime, tool_call: &ToolCall, ctx: &ToolContext) -> ToolResult {
    match tool_call.tool_name.as_str() {
        "generate_image" => generate_image::execute(runtime, ctx, &tool_call.arguments).await,
        "search_memories" => search_memories::execute(runtime, ctx, &tool_call.arguments).await,
        "search_web" => search_web::execute(runtime, ctx, &tool_call.arguments).await,
        other => ToolResult::err(format!("unknown tool: '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_tool_name_is_an_error_result() {
        let dir = tempfile::tempdir().unwrap();
        let file_store = std::sync::Arc::new(
            orc_files::FileStore::new(&dir.path().join("data"), &dir.path().join("blobs")).unwrap(),
        );
        let runtime = ToolRuntime::new(file_store, dir.path().join("vectors"), None);
        let ctx = ToolContext::default();
        let call = ToolCall {
            call_id: "c1".into(),
            tool_name: "exec".into(),
            arguments: serde_json::json!({}),
        };
        let result = execute(&runtime, &call, &ctx).await;
        assert!(!result.success);
    }
}
