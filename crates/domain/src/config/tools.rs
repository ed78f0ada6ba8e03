use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool runtime (C9)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for the closed three-tool set: `generate_image`,
/// `search_memories`, `search_web`. No other tools are dispatchable —
/// there is no plugin mechanism here, the set is fixed (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "d_true")]
    pub search_memories_enabled: bool,
    #[serde(default)]
    pub search_web: SearchWebConfig,
    #[serde(default)]
    pub image_generation: ImageGenerationConfig,
    /// Hard bound on tool-call round trips within a single turn before
    /// the turn aborts with `ToolLoopExceeded` (§4.11).
    #[serde(default = "d_max_tool_loops")]
    pub max_tool_loops: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            search_memories_enabled: true,
            search_web: SearchWebConfig::default(),
            image_generation: ImageGenerationConfig::default(),
            max_tool_loops: d_max_tool_loops(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchWebConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "d_max_results")]
    pub max_results: usize,
}

impl Default for SearchWebConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            api_key_env: None,
            max_results: 5,
        }
    }
}

/// Default Image Generation Profile used by `generate_image` when a
/// chat's character doesn't carry one of its own (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for ImageGenerationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            api_key_env: None,
            model: None,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_true() -> bool {
    true
}
fn d_max_results() -> usize {
    5
}
fn d_max_tool_loops() -> usize {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_web_defaults_to_disabled_without_credentials() {
        let cfg = SearchWebConfig::default();
        assert!(!cfg.enabled);
        assert!(cfg.base_url.is_none());
    }

    #[test]
    fn max_tool_loops_has_a_sane_default() {
        assert_eq!(ToolsConfig::default().max_tool_loops, 5);
    }
}
