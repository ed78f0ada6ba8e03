use serde::{Deserialize, Serialize};

/// Capability flags a provider adapter declares about itself (§4.8).
///
/// Callers query these explicitly instead of relying on virtual dispatch —
/// a tagged variant carrying data, not a class hierarchy (§9 design note).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmCapabilities {
    pub supports_tools: ToolSupport,
    pub supports_streaming: bool,
    pub supports_attachments: bool,
    pub supported_mime_types: Vec<String>,
    pub supports_image_generation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window_tokens: Option<u32>,
}

impl Default for LlmCapabilities {
    fn default() -> Self {
        Self {
            supports_tools: ToolSupport::None,
            supports_streaming: false,
            supports_attachments: false,
            supported_mime_types: Vec::new(),
            supports_image_generation: false,
            context_window_tokens: None,
        }
    }
}

/// Tool support level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSupport {
    /// No tool calling support.
    None,
    /// Basic tool calling (function calling).
    Basic,
    /// Strict JSON schema-validated tool calling.
    StrictJson,
}

/// The seven wire-protocol shapes named in §4.8. Distinct from the Anthropic
/// *Provider* enum in `config::ProviderKind` — that names who issues the
/// credential (OpenAI, Anthropic, Grok, ...); this names which adapter the
/// provider is driven through, since several providers share one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderShape {
    OpenAi,
    Anthropic,
    Ollama,
    OpenRouter,
    OpenAiCompatible,
    Grok,
    GabAi,
}

impl ProviderShape {
    /// Every shape except Anthropic and Ollama is driven through the
    /// OpenAI-compatible chat-completions adapter (§4.8).
    pub fn is_openai_family(self) -> bool {
        !matches!(self, ProviderShape::Anthropic | ProviderShape::Ollama)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_family_excludes_anthropic_and_ollama() {
        assert!(!ProviderShape::Anthropic.is_openai_family());
        assert!(!ProviderShape::Ollama.is_openai_family());
        assert!(ProviderShape::OpenAi.is_openai_family());
        assert!(ProviderShape::Grok.is_openai_family());
        assert!(ProviderShape::OpenRouter.is_openai_family());
        assert!(ProviderShape::OpenAiCompatible.is_openai_family());
        assert!(ProviderShape::GabAi.is_openai_family());
    }
}
