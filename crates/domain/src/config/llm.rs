use crate::capability::ProviderShape;
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Providers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Top-level LLM provider configuration.
///
/// `providers` is the data-driven registry of credential issuers (one
/// entry per connection profile family); adding a provider means adding
/// a config entry, not writing new match arms (besides the wire adapter
/// itself, which is keyed by `ProviderShape`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "d_20000u")]
    pub default_timeout_ms: u64,
    #[serde(default = "d_2")]
    pub max_retries: u32,
    /// Startup policy when zero providers successfully initialize.
    #[serde(default)]
    pub startup_policy: LlmStartupPolicy,
    #[serde(default)]
    pub entries: Vec<ProviderEntry>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 20_000,
            max_retries: 2,
            startup_policy: LlmStartupPolicy::AllowNone,
            entries: Vec::new(),
        }
    }
}

/// Controls how the core handles LLM provider initialization at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmStartupPolicy {
    /// Core boots even if no LLM providers initialize; chat turns fail
    /// with `ConfigurationError` until credentials are configured.
    #[default]
    AllowNone,
    /// Abort startup if no LLM providers successfully initialize.
    RequireOne,
}

/// One configured provider entry — the config-side counterpart of an
/// API Credential / Connection Profile pairing (§3). The orchestrator
/// synthesizes one of these per `ConnectionProfile` at call time (shape,
/// base url, and model name from the profile; `auth.key` from the
/// just-in-time decrypted credential) rather than looking one up by id —
/// profiles are per-user and credentials are encrypted at rest, so there
/// is no static startup-time mapping from profile to entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub id: String,
    pub shape: ProviderShape,
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    /// Env var containing the provider API key (resolved at startup,
    /// never persisted in plaintext alongside the config itself — the
    /// encrypted form lives in the API Credential record, §3).
    #[serde(default)]
    pub env: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    ApiKey,
    QueryParam,
    None,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_20000u() -> u64 {
    20_000
}
fn d_2() -> u32 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_config_default_has_no_entries() {
        let cfg = ProvidersConfig::default();
        assert!(cfg.entries.is_empty());
        assert_eq!(cfg.startup_policy, LlmStartupPolicy::AllowNone);
    }

    #[test]
    fn provider_entry_deserializes_with_shape() {
        let json = r#"{
            "id": "openai-main",
            "shape": "open_ai",
            "base_url": "https://api.openai.com/v1",
            "auth": { "mode": "api_key", "env": "OPENAI_API_KEY" }
        }"#;
        let entry: ProviderEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.shape, ProviderShape::OpenAi);
        assert_eq!(entry.auth.env.as_deref(), Some("OPENAI_API_KEY"));
    }
}
