//! Provider registry.
//!
//! Constructs and holds all configured LLM provider instances. At startup the
//! registry reads [`ProvidersConfig`], resolves authentication (env vars,
//! inline keys), and instantiates the adapter matching each entry's shape.

use crate::anthropic::AnthropicProvider;
use crate::ollama::OllamaProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;
use orc_domain::config::llm::{LlmStartupPolicy, ProvidersConfig};
use orc_domain::capability::ProviderShape;
use orc_domain::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProviderRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Holds all instantiated LLM providers, keyed by their config id (the same
/// id a Connection Profile's `provider_id` refers to, §3). Role-based model
/// assignment from the teacher is gone — this spec selects a model through
/// a Connection Profile, not a named role.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    /// Provider ids that failed to initialize, with their error messages.
    init_errors: Vec<ProviderInitError>,
}

/// Records a provider that failed to initialize.
#[derive(Debug, Clone)]
pub struct ProviderInitError {
    pub provider_id: String,
    pub shape: ProviderShape,
    /// Error message with any potential secrets masked.
    pub error: String,
}

/// Mask substrings that look like API keys or bearer tokens in an error
/// message, so raw secrets never leak into logs or readiness endpoints.
fn mask_secrets(msg: &str) -> String {
    let mut result = msg.to_string();
    for word in msg.split(|c: char| c.is_whitespace() || c == '\'' || c == '"' || c == ',') {
        let trimmed = word.trim();
        if trimmed.len() >= 20
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            let masked = if trimmed.len() > 8 {
                format!("{}...{}", &trimmed[..4], &trimmed[trimmed.len() - 4..])
            } else {
                "***masked***".to_string()
            };
            result = result.replace(trimmed, &masked);
        }
    }
    result
}

impl ProviderRegistry {
    /// Build the registry from [`ProvidersConfig`]. Providers that fail to
    /// initialize (missing credentials, bad base url) are logged and
    /// skipped rather than aborting startup, unless `startup_policy` is
    /// `RequireOne` and every entry failed.
    pub fn from_config(config: &ProvidersConfig) -> Result<Self> {
        let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
        let mut init_errors: Vec<ProviderInitError> = Vec::new();

        for entry in &config.entries {
            let result: Result<Arc<dyn LlmProvider>> = match entry.shape {
                ProviderShape::Anthropic => AnthropicProvider::from_config(entry)
                    .map(|p| Arc::new(p) as Arc<dyn LlmProvider>),
                ProviderShape::Ollama => OllamaProvider::from_config(entry)
                    .map(|p| Arc::new(p) as Arc<dyn LlmProvider>),
                _ => OpenAiCompatProvider::from_config(entry)
                    .map(|p| Arc::new(p) as Arc<dyn LlmProvider>),
            };

            match result {
                Ok(provider) => {
                    tracing::info!(
                        provider_id = %entry.id,
                        shape = ?entry.shape,
                        "registered LLM provider"
                    );
                    providers.insert(entry.id.clone(), provider);
                }
                Err(e) => {
                    let safe_error = mask_secrets(&e.to_string());
                    tracing::warn!(
                        provider_id = %entry.id,
                        shape = ?entry.shape,
                        error = %safe_error,
                        "failed to initialize LLM provider, skipping"
                    );
                    init_errors.push(ProviderInitError {
                        provider_id: entry.id.clone(),
                        shape: entry.shape,
                        error: safe_error,
                    });
                }
            }
        }

        if providers.is_empty() && !config.entries.is_empty() {
            match config.startup_policy {
                LlmStartupPolicy::RequireOne => {
                    return Err(Error::ConfigurationError {
                        missing: vec!["providers.entries (all failed to initialize)".into()],
                    });
                }
                LlmStartupPolicy::AllowNone => {
                    tracing::warn!(
                        failed_providers = init_errors.len(),
                        "no LLM providers initialized (startup_policy = allow_none); \
                         chat turns will fail with a configuration error until \
                         credentials are fixed"
                    );
                }
            }
        }

        Ok(Self {
            providers,
            init_errors,
        })
    }

    /// Look up a provider by its config id.
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(provider_id).cloned()
    }

    /// Iterate over all registered providers.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<dyn LlmProvider>)> {
        self.providers.iter()
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// List all registered provider ids (sorted).
    pub fn list_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Provider initialization errors (empty if all succeeded).
    pub fn init_errors(&self) -> &[ProviderInitError] {
        &self.init_errors
    }
}
