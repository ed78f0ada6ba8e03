use serde::{Deserialize, Serialize};

/// Machine-readable report of one context assembly (§4.10), returned
/// alongside the assembled provider messages for diagnostics/telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyReport {
    pub fixed_block_tokens: usize,
    pub reserved_response_tokens: usize,
    pub budget_remaining_after_fixed: usize,
    pub memories_offered: usize,
    pub memories_included: usize,
    pub history_offered: usize,
    pub history_included: usize,
    pub summary_included: bool,
    pub total_estimated_tokens: usize,
}
