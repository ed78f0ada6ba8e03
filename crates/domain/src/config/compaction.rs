use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Compaction (C12 context summarization)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compaction collapses old chat history into a `ContextSummary` event
/// so context assembly doesn't have to re-walk the entire transcript
/// once it grows past a few dozen turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    /// Run compaction automatically once `trigger_interchanges` is crossed.
    #[serde(default = "d_true")]
    pub auto: bool,
    /// Number of user/assistant interchanges before compaction triggers.
    #[serde(default = "d_40")]
    pub trigger_interchanges: usize,
    /// Number of most-recent interchanges kept verbatim after compaction.
    #[serde(default = "d_12")]
    pub keep_last_interchanges: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            auto: true,
            trigger_interchanges: 40,
            keep_last_interchanges: 12,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Memory housekeeping policy (C7)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Controls the post-turn memory extraction and housekeeping jobs that
/// make a character "remember" things across chats (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryPolicyConfig {
    /// Extract candidate memories after every assistant turn.
    #[serde(default = "d_true")]
    pub auto_extract: bool,
    /// Cosine-similarity threshold above which two memories are merged
    /// instead of kept as separate entries during housekeeping.
    #[serde(default = "d_merge_threshold")]
    pub merge_threshold: f32,
    /// Maximum memories retained per character before the oldest
    /// low-relevance entries are deleted during housekeeping.
    #[serde(default = "d_200")]
    pub max_memories_per_character: usize,
    /// Run housekeeping as a dry-run (log what would change, apply nothing).
    #[serde(default)]
    pub preview_only: bool,
}

impl Default for MemoryPolicyConfig {
    fn default() -> Self {
        Self {
            auto_extract: true,
            merge_threshold: d_merge_threshold(),
            max_memories_per_character: 200,
            preview_only: false,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_true() -> bool {
    true
}
fn d_40() -> usize {
    40
}
fn d_12() -> usize {
    12
}
fn d_merge_threshold() -> f32 {
    0.95
}
fn d_200() -> usize {
    200
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_merge_threshold_is_high_precision() {
        let cfg = MemoryPolicyConfig::default();
        assert!((cfg.merge_threshold - 0.95).abs() < f32::EPSILON);
    }

    #[test]
    fn compaction_defaults_keep_fewer_than_trigger() {
        let cfg = CompactionConfig::default();
        assert!(cfg.keep_last_interchanges < cfg.trigger_interchanges);
    }
}
