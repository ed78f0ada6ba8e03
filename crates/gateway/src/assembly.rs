//! Builds an `orc_context::AssemblyInput` from a chat's resolved state
//! (§4.10), shared by both `submitTurn` and `swipe` since the spec
//! requires both to use identical context-assembly inputs.

use orc_context::template::{render, TemplateContext};
use orc_context::{AssemblyInput, ExamplePair, HistoryTurn, MemoryBlock};
use orc_domain::model::{Character, MessageRole, Persona};
use orc_domain::tool::Role;
use orc_memory::RankedMemory;
use orc_store::ResolvedChat;

/// Build the assembly input for the next turn. `history_upto` excludes
/// trailing messages at/after that index — used by `swipe`, which must
/// assemble exactly as of just before the message being swiped.
pub fn build_assembly_input(
    character: &Character,
    persona: Option<&Persona>,
    user_display_name: &str,
    resolved: &ResolvedChat,
    history_upto: Option<usize>,
    ranked_memories: &[RankedMemory],
    pending_user_text: &str,
) -> AssemblyInput {
    let persona_desc = persona.map(|p| p.description.as_str());
    let ctx = TemplateContext {
        char: Some(character.name.as_str()),
        description: Some(character.description.as_str()),
        personality: Some(character.personality.as_str()),
        scenario: Some(character.scenario.as_str()),
        user: Some(user_display_name),
        persona: persona_desc,
        system: character.system_prompt.as_deref(),
        mes_examples: Some(character.example_dialogues.as_str()),
        mes_examples_raw: Some(character.example_dialogues.as_str()),
        ..Default::default()
    };

    let system_prompt = character
        .system_prompt
        .as_deref()
        .map(|tpl| render(tpl, &ctx))
        .unwrap_or_default();

    let character_block = render(
        "{{description}}\n{{personality}}\n{{scenario}}",
        &ctx,
    );

    let examples = parse_example_dialogues(&character.example_dialogues);

    let memories: Vec<MemoryBlock> = ranked_memories
        .iter()
        .map(|rm| MemoryBlock { content: rm.memory.content.clone() })
        .collect();

    let history_slice = match history_upto {
        Some(limit) => &resolved.messages[..limit.min(resolved.messages.len())],
        None => &resolved.messages[..],
    };
    let history: Vec<HistoryTurn> = history_slice
        .iter()
        .map(|m| HistoryTurn {
            role: match m.role {
                MessageRole::User => Role::User,
                MessageRole::Assistant => Role::Assistant,
                MessageRole::System => Role::System,
            },
            content: m.content.clone(),
        })
        .collect();

    AssemblyInput {
        system_prompt,
        persona: persona_desc.map(|text| (user_display_name.to_string(), text.to_string())),
        character_block,
        examples,
        memories,
        context_summary: resolved.context_summary.as_ref().map(|(text, _)| text.clone()),
        history,
        pending_user_text: pending_user_text.to_string(),
    }
}

/// Split a character's `example_dialogues` blob on `<START>` markers into
/// alternating user/assistant pairs, the SillyTavern-derived convention
/// the teacher's character import pipeline also assumes.
fn parse_example_dialogues(raw: &str) -> Vec<ExamplePair> {
    let mut pairs = Vec::new();
    let mut user_line: Option<String> = None;
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line == "<START>" {
            continue;
        }
        if let Some(rest) = line.strip_prefix("{{user}}:") {
            user_line = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("{{char}}:") {
            if let Some(user) = user_line.take() {
                pairs.push(ExamplePair { user, assistant: rest.trim().to_string() });
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_store::ResolvedMessage;
    use uuid::Uuid;

    fn character() -> Character {
        Character {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Aria".into(),
            description: "A wandering bard.".into(),
            personality: "Curious and kind.".into(),
            scenario: "A tavern at dusk.".into(),
            first_message: "Hi, I'm Aria.".into(),
            example_dialogues: "<START>\n{{user}}: Hello\n{{char}}: Well met!".into(),
            system_prompt: Some("You are {{char}}, speaking to {{user}}.".into()),
            default_image_id: None,
            is_favorite: false,
            avatar_overrides: vec![],
            tags: vec![],
        }
    }

    #[test]
    fn renders_system_prompt_with_char_and_user() {
        let character = character();
        let resolved = ResolvedChat::default();
        let input = build_assembly_input(&character, None, "Sam", &resolved, None, &[], "hi");
        assert_eq!(input.system_prompt, "You are Aria, speaking to Sam.");
    }

    #[test]
    fn parses_one_example_pair() {
        let character = character();
        let resolved = ResolvedChat::default();
        let input = build_assembly_input(&character, None, "Sam", &resolved, None, &[], "hi");
        assert_eq!(input.examples.len(), 1);
        assert_eq!(input.examples[0].user, "Hello");
        assert_eq!(input.examples[0].assistant, "Well met!");
    }

    #[test]
    fn history_upto_excludes_trailing_messages() {
        let character = character();
        let mut resolved = ResolvedChat::default();
        resolved.messages.push(ResolvedMessage {
            id: Uuid::new_v4(),
            role: MessageRole::User,
            content: "first".into(),
            attachments: vec![],
        });
        resolved.messages.push(ResolvedMessage {
            id: Uuid::new_v4(),
            role: MessageRole::Assistant,
            content: "to be swiped".into(),
            attachments: vec![],
        });
        let input = build_assembly_input(&character, None, "Sam", &resolved, Some(1), &[], "next");
        assert_eq!(input.history.len(), 1);
        assert_eq!(input.history[0].content, "first");
    }
}
