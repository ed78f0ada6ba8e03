//! `search_web` — no teacher handler to ground on (the teacher only stubs
//! `web.search`, per `gateway/src/runtime/tools.rs::stub_tool`); this
//! degrades the same way when unconfigured, and otherwise performs a real
//! GET against a configured SERP-style JSON endpoint.

use crate::context::ToolContext;
use crate::result::ToolResult;
use crate::runtime::ToolRuntime;

pub async fn execute(runtime: &ToolRuntime, _ctx: &ToolContext, arguments: &serde_json::Value) -> ToolResult {
    let query = match arguments.get("query").and_then(|v| v.as_str()) {
        Some(q) if !q.trim().is_empty() => q,
        _ => return ToolResult::err("missing required argument: query"),
    };

    let Some(config) = runtime.web_search.as_ref() else {
        return ToolResult::err("web search is not configured for this deployment");
    };

    let mut request = runtime.http.get(&config.base_url).query(&[("q", query)]);
    if let Some(api_key) = &config.api_key {
        request = request.bearer_auth(api_key);
    }

    let response = match request.send().await {
        Ok(r) => r,
        Err(e) => return ToolResult::err(format!("web search request failed: {e}")),
    };

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return ToolResult::err(format!("web search returned {status}: {}", preview(&text)));
    }

    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => ToolResult::ok(json),
        Err(_) => ToolResult::ok(serde_json::json!({ "raw": text })),
    }
}

fn preview(body: &str) -> String {
    body.chars().take(300).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fails_gracefully_when_unconfigured() {
        let dir = tempfile::tempdir().unwrap();
        let file_store = std::sync::Arc::new(
            orc_files::FileStore::new(&dir.path().join("data"), &dir.path().join("blobs")).unwrap(),
        );
        let runtime = ToolRuntime::new(file_store, dir.path().join("vectors"), None);
        let ctx = ToolContext::default();
        let result = execute(&runtime, &ctx, &serde_json::json!({"query": "rust async runtimes"})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn requires_a_query_argument() {
        let dir = tempfile::tempdir().unwrap();
        let file_store = std::sync::Arc::new(
            orc_files::FileStore::new(&dir.path().join("data"), &dir.path().join("blobs")).unwrap(),
        );
        let runtime = ToolRuntime::new(file_store, dir.path().join("vectors"), None);
        let ctx = ToolContext::default();
        let result = execute(&runtime, &ctx, &serde_json::json!({})).await;
        assert!(!result.success);
    }
}
