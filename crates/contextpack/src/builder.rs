use crate::injection::{format_memories_block, format_persona_block};
use crate::report::AssemblyReport;
use crate::token;
use orc_domain::error::{Error, Result};
use orc_domain::tool::{Message, Role};

/// One retrieved memory, already ranked best-first by the Memory Engine
/// (§4.7); the assembler only decides how many of the front of this list
/// fit the remaining budget.
#[derive(Debug, Clone)]
pub struct MemoryBlock {
    pub content: String,
}

/// One example dialogue pair (§4.10 step 4).
#[derive(Debug, Clone)]
pub struct ExamplePair {
    pub user: String,
    pub assistant: String,
}

/// One history turn, in chronological order (oldest first). Swipe
/// selection has already been resolved by the caller.
#[derive(Debug, Clone)]
pub struct HistoryTurn {
    pub role: Role,
    pub content: String,
}

/// Everything the assembler needs to build one turn's provider messages.
/// Attachments are resolved to inline payloads by the caller (via C1)
/// before this point; they contribute to transport, not token estimates.
#[derive(Debug, Clone, Default)]
pub struct AssemblyInput {
    pub system_prompt: String,
    pub persona: Option<(String, String)>, // (user_name, persona_text)
    pub character_block: String,
    pub examples: Vec<ExamplePair>,
    pub memories: Vec<MemoryBlock>,
    pub context_summary: Option<String>,
    pub history: Vec<HistoryTurn>,
    pub pending_user_text: String,
}

pub struct AssembledContext {
    pub messages: Vec<Message>,
    pub report: AssemblyReport,
}

/// Minimum number of memories the admission algorithm tries to preserve
/// before it starts sacrificing history (§4.10).
const MEMORY_FLOOR: usize = 2;

/// Builds provider messages from an [`AssemblyInput`] within a token
/// budget, following the fixed 8-section order and reverse-chronological
/// admission described in §4.10.
pub struct ContextAssembler {
    pub total_budget_tokens: usize,
    pub reserved_for_response_tokens: usize,
}

impl ContextAssembler {
    pub fn new(total_budget_tokens: usize, reserved_for_response_tokens: usize) -> Self {
        Self {
            total_budget_tokens,
            reserved_for_response_tokens,
        }
    }

    pub fn assemble(&self, input: &AssemblyInput) -> Result<AssembledContext> {
        let persona_block = input
            .persona
            .as_ref()
            .map(|(user, text)| format_persona_block(user, text));

        // Blocks 1-4 and the pending turn (block 8) are non-negotiable.
        let mut fixed_tokens = token::estimate_message("system", &input.system_prompt);
        if let Some(p) = &persona_block {
            fixed_tokens += token::estimate_message("system", p);
        }
        fixed_tokens += token::estimate_message("system", &input.character_block);
        for ex in &input.examples {
            fixed_tokens += token::estimate_message("user", &ex.user);
            fixed_tokens += token::estimate_message("assistant", &ex.assistant);
        }
        let pending_tokens = token::estimate_message("user", &input.pending_user_text);
        fixed_tokens += pending_tokens;
        fixed_tokens += token::conversation_overhead();

        if fixed_tokens + self.reserved_for_response_tokens > self.total_budget_tokens {
            return Err(Error::ContextOverflow {
                required: fixed_tokens + self.reserved_for_response_tokens,
                available: self.total_budget_tokens,
            });
        }

        let budget_remaining_after_fixed =
            self.total_budget_tokens - fixed_tokens - self.reserved_for_response_tokens;

        // Greedily take everything, then trim: memories first (down to the
        // floor), then oldest history, until it fits.
        let mut memories: Vec<&MemoryBlock> = input.memories.iter().collect();
        let mut history: Vec<&HistoryTurn> = input.history.iter().collect();
        let summary_tokens = input
            .context_summary
            .as_ref()
            .map(|s| token::estimate_message("system", s))
            .unwrap_or(0);

        let variable_tokens = |memories: &[&MemoryBlock], history: &[&HistoryTurn]| -> usize {
            let mem_tokens = if memories.is_empty() {
                0
            } else {
                let joined: Vec<&str> = memories.iter().map(|m| m.content.as_str()).collect();
                token::estimate_message("system", &format_memories_block(&joined))
            };
            let hist_tokens: usize = history
                .iter()
                .map(|h| token::estimate_message(role_label(h.role), &h.content))
                .sum();
            mem_tokens + summary_tokens + hist_tokens
        };

        while variable_tokens(&memories, &history) > budget_remaining_after_fixed {
            if memories.len() > MEMORY_FLOOR {
                memories.pop(); // drop the lowest-ranked (tail) memory first
            } else if !history.is_empty() {
                history.remove(0); // drop the oldest history message
            } else if !memories.is_empty() {
                memories.pop(); // no history left; sacrifice below the floor
            } else {
                break; // nothing left to drop; accept overflow into summary-only
            }
        }

        let memories_included = memories.len();
        let history_included = history.len();

        let mut messages = Vec::new();
        messages.push(Message::system(&input.system_prompt));
        if let Some(p) = &persona_block {
            messages.push(Message::system(p));
        }
        messages.push(Message::system(&input.character_block));
        for ex in &input.examples {
            messages.push(Message::user(&ex.user));
            messages.push(Message::assistant(&ex.assistant));
        }
        if !memories.is_empty() {
            let joined: Vec<&str> = memories.iter().map(|m| m.content.as_str()).collect();
            messages.push(Message::system(format_memories_block(&joined)));
        }
        if let Some(summary) = &input.context_summary {
            messages.push(Message::system(format!(
                "Summary of earlier conversation:\n{summary}"
            )));
        }
        for turn in &history {
            messages.push(Message {
                role: turn.role,
                content: orc_domain::tool::MessageContent::Text(turn.content.clone()),
            });
        }
        messages.push(Message::user(&input.pending_user_text));

        let total_estimated_tokens = fixed_tokens + variable_tokens(&memories, &history);

        let report = AssemblyReport {
            fixed_block_tokens: fixed_tokens,
            reserved_response_tokens: self.reserved_for_response_tokens,
            budget_remaining_after_fixed,
            memories_offered: input.memories.len(),
            memories_included,
            history_offered: input.history.len(),
            history_included,
            summary_included: input.context_summary.is_some(),
            total_estimated_tokens,
        };

        Ok(AssembledContext { messages, report })
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input() -> AssemblyInput {
        AssemblyInput {
            system_prompt: "You are a helpful assistant.".into(),
            persona: None,
            character_block: "Aria is warm and curious.".into(),
            examples: Vec::new(),
            memories: Vec::new(),
            context_summary: None,
            history: Vec::new(),
            pending_user_text: "Hello!".into(),
        }
    }

    #[test]
    fn assembles_minimal_turn_with_pending_message_last() {
        let assembler = ContextAssembler::new(8000, 1000);
        let assembled = assembler.assemble(&base_input()).unwrap();
        let last = assembled.messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content.extract_all_text(), "Hello!");
    }

    #[test]
    fn persona_block_appears_when_present() {
        let mut input = base_input();
        input.persona = Some(("Sam".into(), "A curious traveler.".into()));
        let assembler = ContextAssembler::new(8000, 1000);
        let assembled = assembler.assemble(&input).unwrap();
        assert!(assembled
            .messages
            .iter()
            .any(|m| m.content.extract_all_text().contains("You are talking to Sam")));
    }

    #[test]
    fn overflow_when_fixed_blocks_exceed_budget() {
        let mut input = base_input();
        input.character_block = "x".repeat(100_000);
        let assembler = ContextAssembler::new(8000, 1000);
        let err = assembler.assemble(&input).unwrap_err();
        assert!(matches!(err, Error::ContextOverflow { .. }));
    }

    #[test]
    fn drops_oldest_memories_before_recent_history_under_pressure() {
        let mut input = base_input();
        for i in 0..20 {
            input.memories.push(MemoryBlock {
                content: format!("memory-{i} {}", "x".repeat(200)),
            });
        }
        for i in 0..20 {
            input.history.push(HistoryTurn {
                role: if i % 2 == 0 { Role::User } else { Role::Assistant },
                content: format!("turn-{i}"),
            });
        }
        let assembler = ContextAssembler::new(600, 100);
        let assembled = assembler.assemble(&input).unwrap();
        assert!(assembled.report.memories_included <= assembled.report.memories_offered);
        assert!(assembled.report.history_included > 0);
    }

    #[test]
    fn memory_floor_is_respected_when_budget_allows() {
        let mut input = base_input();
        for i in 0..5 {
            input.memories.push(MemoryBlock {
                content: format!("memory-{i}"),
            });
        }
        let assembler = ContextAssembler::new(8000, 1000);
        let assembled = assembler.assemble(&input).unwrap();
        assert_eq!(assembled.report.memories_included, 5);
    }
}
