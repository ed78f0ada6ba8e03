//! `ConnectionProfile` → `LlmProvider` synthesis (§3, §4.8, §4.11).
//!
//! There is no static config-time provider registry here — each chat turn
//! resolves its own provider from the `ConnectionProfile` the participant
//! carries plus the just-in-time-decrypted `ApiCredential` it points at,
//! then builds a transient `ProviderEntry` and hands it to the matching
//! wire adapter's existing `from_config` constructor (`orc_providers`'s
//! adapters are otherwise unmodified).

use std::sync::Arc;

use orc_domain::capability::ProviderShape;
use orc_domain::config::llm::{AuthConfig, AuthMode, ProviderEntry};
use orc_domain::error::{Error, Result};
use orc_domain::model::ConnectionProfile;
use orc_providers::anthropic::AnthropicProvider;
use orc_providers::ollama::OllamaProvider;
use orc_providers::openai_compat::OpenAiCompatProvider;
use orc_providers::LlmProvider;

/// Default base url per shape, used when a `ConnectionProfile` doesn't
/// carry its own override. `OpenAiCompatible` has no sensible default —
/// a profile of that shape without an explicit `base_url` is a
/// configuration error, since there's nothing to resolve to.
fn default_base_url(shape: ProviderShape) -> Result<&'static str> {
    Ok(match shape {
        ProviderShape::OpenAi => "https://api.openai.com/v1",
        ProviderShape::Anthropic => "https://api.anthropic.com",
        ProviderShape::Ollama => "http://localhost:11434",
        ProviderShape::OpenRouter => "https://openrouter.ai/api/v1",
        ProviderShape::Grok => "https://api.x.ai/v1",
        ProviderShape::GabAi => "https://gab.ai/api/v1",
        ProviderShape::OpenAiCompatible => {
            return Err(Error::ConfigurationError {
                missing: vec!["connection_profile.base_url".into()],
            })
        }
    })
}

/// Resolve `profile` into a live `LlmProvider`, given the already-decrypted
/// plaintext API key (or `None` for credential-less providers like a local
/// Ollama). Never logs `api_key`.
pub fn resolve(
    profile: &ConnectionProfile,
    api_key: Option<String>,
) -> Result<Arc<dyn LlmProvider>> {
    let base_url = match profile.base_url.clone() {
        Some(url) if !url.is_empty() => url,
        _ => default_base_url(profile.provider)?.to_string(),
    };

    let auth = AuthConfig {
        mode: if api_key.is_some() { AuthMode::ApiKey } else { AuthMode::None },
        env: None,
        key: api_key,
    };

    let entry = ProviderEntry {
        id: profile.id.to_string(),
        shape: profile.provider,
        base_url,
        auth,
        default_model: Some(profile.model_name.clone()),
    };

    let provider: Arc<dyn LlmProvider> = match profile.provider {
        ProviderShape::Anthropic => Arc::new(AnthropicProvider::from_config(&entry)?),
        ProviderShape::Ollama => Arc::new(OllamaProvider::from_config(&entry)?),
        _ => Arc::new(OpenAiCompatProvider::from_config(&entry)?),
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_domain::model::SamplingParameters;
    use uuid::Uuid;

    fn profile(provider: ProviderShape, base_url: Option<&str>) -> ConnectionProfile {
        ConnectionProfile {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            provider,
            model_name: "some-model".into(),
            api_credential_id: None,
            base_url: base_url.map(str::to_string),
            parameters: SamplingParameters::default(),
            is_default: true,
            is_cheap: false,
            tags: vec![],
        }
    }

    #[test]
    fn anthropic_profile_resolves_without_error() {
        let p = profile(ProviderShape::Anthropic, None);
        let resolved = resolve(&p, Some("sk-ant-test".into()));
        assert!(resolved.is_ok());
    }

    #[test]
    fn ollama_profile_needs_no_api_key() {
        let p = profile(ProviderShape::Ollama, None);
        let resolved = resolve(&p, None);
        assert!(resolved.is_ok());
    }

    #[test]
    fn openai_compatible_without_base_url_is_configuration_error() {
        let p = profile(ProviderShape::OpenAiCompatible, None);
        let err = resolve(&p, Some("key".into())).unwrap_err();
        assert_eq!(err.tag(), "configuration_error");
    }

    #[test]
    fn openai_compatible_with_explicit_base_url_resolves() {
        let p = profile(ProviderShape::OpenAiCompatible, Some("https://my-llm.example/v1"));
        let resolved = resolve(&p, Some("key".into()));
        assert!(resolved.is_ok());
    }
}
