//! Tool definitions exposed to the LLM (§4.9): a closed, fixed set of
//! three. Grounded directly on the teacher's `build_tool_definitions` — one
//! `serde_json::json!` schema pushed per tool, no policy filter (the
//! teacher's agent-scoped `ToolPolicy` filter has no counterpart here,
//! since this core has no sub-agent delegation).

use orc_domain::tool::ToolDefinition;

pub fn build_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "generate_image".into(),
            description: "Generate an image from a text prompt. Use {{me}} in the prompt to refer to the calling participant's appearance.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "prompt": { "type": "string", "description": "Image generation prompt" }
                },
                "required": ["prompt"]
            }),
        },
        ToolDefinition {
            name: "search_memories".into(),
            description: "Search this character's long-term memories for relevant facts.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Search query" },
                    "limit": { "type": "integer", "description": "Max results (default 8)" }
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: "search_web".into(),
            description: "Search the web for current information.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Search query" }
                },
                "required": ["query"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_exactly_the_closed_tool_set() {
        let defs = build_tool_definitions();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["generate_image", "search_memories", "search_web"]);
    }
}
