//! The closed error taxonomy shared across every crate in this workspace.
//!
//! Every subsystem returns `orc_domain::error::Result<T>`; no crate defines
//! its own error type. Variants carry a user-safe message — none of them
//! ever interpolate credential plaintext (see `ProviderError`/`APIKeyError`
//! call sites, which pass only provider id + status + a truncated body).

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {fields:?}")]
    ValidationError { fields: Vec<String> },

    #[error("configuration error, missing: {missing:?}")]
    ConfigurationError { missing: Vec<String> },

    #[error("provider {provider} returned {status}: {detail}")]
    ProviderError {
        provider: String,
        status: u16,
        detail: String,
    },

    #[error("provider {0}: invalid or rejected API key")]
    ApiKeyError(String),

    #[error("provider {provider}: rate limited{}", retry_after.map(|s| format!(", retry after {s}s")).unwrap_or_default())]
    RateLimitError {
        provider: String,
        retry_after: Option<u64>,
    },

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("model not found: {model}")]
    ModelNotFoundError { model: String },

    #[error("invalid request: {0}")]
    InvalidRequestError(String),

    #[error("context overflow: required {required} tokens, {available} available")]
    ContextOverflow { required: usize, available: usize },

    #[error("tool loop bound exceeded (limit={limit})")]
    ToolLoopExceeded { limit: usize },

    #[error("storage error ({kind}): {message}")]
    StorageError { kind: String, message: String },

    #[error("encryption error: {0}")]
    EncryptionError(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn storage(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Error::StorageError {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    /// Machine-readable tag for the variant, stable across refactors (e.g.
    /// for logging or surfacing a `PublicChunk{kind:error}` code).
    pub fn tag(&self) -> &'static str {
        match self {
            Error::Unauthorized => "unauthorized",
            Error::Forbidden => "forbidden",
            Error::NotFound(_) => "not_found",
            Error::ValidationError { .. } => "validation_error",
            Error::ConfigurationError { .. } => "configuration_error",
            Error::ProviderError { .. } => "provider_error",
            Error::ApiKeyError(_) => "api_key_error",
            Error::RateLimitError { .. } => "rate_limit_error",
            Error::NetworkError(_) => "network_error",
            Error::ModelNotFoundError { .. } => "model_not_found_error",
            Error::InvalidRequestError(_) => "invalid_request_error",
            Error::ContextOverflow { .. } => "context_overflow",
            Error::ToolLoopExceeded { .. } => "tool_loop_exceeded",
            Error::StorageError { .. } => "storage_error",
            Error::EncryptionError(_) => "encryption_error",
            Error::Io(_) => "storage_error",
            Error::Json(_) => "storage_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_is_stable_for_provider_error() {
        let e = Error::ProviderError {
            provider: "openai".into(),
            status: 500,
            detail: "boom".into(),
        };
        assert_eq!(e.tag(), "provider_error");
    }

    #[test]
    fn display_never_echoes_missing_field_order() {
        let e = Error::ConfigurationError {
            missing: vec!["apiCredentialId".into()],
        };
        assert!(e.to_string().contains("apiCredentialId"));
    }

    #[test]
    fn rate_limit_without_retry_after_omits_suffix() {
        let e = Error::RateLimitError {
            provider: "anthropic".into(),
            retry_after: None,
        };
        assert_eq!(e.to_string(), "provider anthropic: rate limited");
    }
}
