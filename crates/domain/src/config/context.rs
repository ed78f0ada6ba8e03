use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Context assembly (token budget)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Token budget for context assembly (§4.10). The fixed eight-section
/// order — system prompt, persona, character card, memories, summary,
/// history, current message, tool definitions — is not configurable;
/// these knobs only size the admission pools within that order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Total token budget for an assembled context pack, before the
    /// response reservation is subtracted.
    #[serde(default = "d_total_budget")]
    pub total_budget_tokens: usize,
    /// Tokens reserved for the model's response; subtracted from
    /// `total_budget_tokens` before history/memory admission runs.
    #[serde(default = "d_reserved")]
    pub reserved_for_response_tokens: usize,
    /// Minimum number of most-recent chat history messages kept even
    /// when the budget is otherwise exhausted (the "memory floor").
    #[serde(default = "d_2")]
    pub min_history_messages: usize,
    /// Maximum number of retrieved memories admitted into a single pack.
    #[serde(default = "d_8")]
    pub max_memories: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            total_budget_tokens: d_total_budget(),
            reserved_for_response_tokens: d_reserved(),
            min_history_messages: 2,
            max_memories: 8,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_total_budget() -> usize {
    8_000
}
fn d_reserved() -> usize {
    1_000
}
fn d_2() -> usize {
    2
}
fn d_8() -> usize {
    8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reserves_less_than_total() {
        let cfg = ContextConfig::default();
        assert!(cfg.reserved_for_response_tokens < cfg.total_budget_tokens);
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let cfg: ContextConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.min_history_messages, 2);
    }
}
