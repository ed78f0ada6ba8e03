use orc_domain::config::llm::{AuthConfig, AuthMode};
use orc_domain::error::{Error, Result};

/// Map a transport-level `reqwest` failure onto the shared error taxonomy.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    Error::NetworkError(e.to_string())
}

/// Resolve the credential for a provider entry: env var first, then an
/// inline key, honoring `AuthMode::None` for providers that take no auth
/// (local Ollama, mostly). Never logs or echoes the resolved value.
pub fn resolve_api_key(auth: &AuthConfig) -> Result<Option<String>> {
    if auth.mode == AuthMode::None {
        return Ok(None);
    }
    if let Some(env) = auth.env.as_ref().filter(|v| !v.is_empty()) {
        return std::env::var(env)
            .map(Some)
            .map_err(|_| Error::ConfigurationError {
                missing: vec![env.clone()],
            });
    }
    if let Some(key) = auth.key.as_ref().filter(|v| !v.is_empty()) {
        return Ok(Some(key.clone()));
    }
    Err(Error::ConfigurationError {
        missing: vec!["providers.entries[].auth".into()],
    })
}
