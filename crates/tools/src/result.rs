//! The tool dispatch contract (§4.9): every handler returns a [`ToolResult`],
//! and every result is rendered to a stable re-injection string the same
//! way regardless of which tool produced it.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(payload: serde_json::Value) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: None,
            error: Some(message.into()),
        }
    }
}

/// Render a [`ToolResult`] as the synthetic user-role message content that
/// gets re-injected into the conversation: `"Tool Result: <name>\n\n<JSON or
/// error text>"`. Deterministic — same result, same string.
pub fn format_tool_result(tool_name: &str, result: &ToolResult) -> String {
    let body = if result.success {
        serde_json::to_string_pretty(&result.payload).unwrap_or_default()
    } else {
        result.error.clone().unwrap_or_default()
    };
    format!("Tool Result: {tool_name}\n\n{body}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_is_stable_for_the_same_input() {
        let result = ToolResult::ok(serde_json::json!({"a": 1}));
        let a = format_tool_result("search_web", &result);
        let b = format_tool_result("search_web", &result);
        assert_eq!(a, b);
        assert!(a.starts_with("Tool Result: search_web\n\n"));
    }

    #[test]
    fn error_result_renders_error_text() {
        let result = ToolResult::err("not configured");
        let rendered = format_tool_result("search_web", &result);
        assert_eq!(rendered, "Tool Result: search_web\n\nnot configured");
    }
}
