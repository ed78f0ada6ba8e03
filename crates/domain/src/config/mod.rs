mod compaction;
mod context;
mod encryption;
mod llm;
mod memory;
mod observability;
mod server;
mod storage;
mod tools;

pub use compaction::*;
pub use context::*;
pub use encryption::*;
pub use llm::*;
pub use memory::*;
pub use observability::*;
pub use server::*;
pub use storage::*;
pub use tools::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub compaction: CompactionConfig,
    #[serde(default)]
    pub memory_policy: MemoryPolicyConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub encryption: EncryptionConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }
        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.providers.entries.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "providers.entries".into(),
                message: "no LLM providers configured".into(),
            });
        }

        let mut seen_ids: HashSet<&str> = HashSet::new();
        for (i, entry) in self.providers.entries.iter().enumerate() {
            if entry.id.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("providers.entries[{i}].id"),
                    message: "provider id must not be empty".into(),
                });
            }
            if !entry.base_url.starts_with("http://") && !entry.base_url.starts_with("https://") {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("providers.entries[{i}].base_url"),
                    message: format!(
                        "base_url must start with http:// or https:// (got \"{}\")",
                        entry.base_url
                    ),
                });
            }
            if !entry.id.is_empty() && !seen_ids.insert(&entry.id) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("providers.entries[{i}].id"),
                    message: format!(
                        "duplicate provider id \"{}\" — later entry will shadow earlier one",
                        entry.id
                    ),
                });
            }
            let needs_credentials = matches!(entry.auth.mode, AuthMode::ApiKey | AuthMode::QueryParam);
            let has_env = entry.auth.env.as_ref().is_some_and(|v| !v.is_empty());
            let has_key = entry.auth.key.as_ref().is_some_and(|v| !v.is_empty());
            if needs_credentials && !has_env && !has_key {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("providers.entries[{i}].auth"),
                    message: format!(
                        "provider \"{}\" uses {:?} auth mode but has no auth.env or auth.key configured",
                        entry.id, entry.auth.mode
                    ),
                });
            }
        }

        if self.memory.embedding.dimensions == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "memory.embedding.dimensions".into(),
                message: "embedding dimensions must be greater than 0".into(),
            });
        }
        if !self.memory.embedding.base_url.starts_with("http://")
            && !self.memory.embedding.base_url.starts_with("https://")
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "memory.embedding.base_url".into(),
                message: "base_url must start with http:// or https://".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.memory.similarity_weight) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "memory.similarity_weight".into(),
                message: "similarity_weight must be between 0.0 and 1.0".into(),
            });
        }

        if !(0.0..=1.0).contains(&self.memory_policy.merge_threshold) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "memory_policy.merge_threshold".into(),
                message: "merge_threshold must be between 0.0 and 1.0".into(),
            });
        }

        if self.context.reserved_for_response_tokens >= self.context.total_budget_tokens {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "context.reserved_for_response_tokens".into(),
                message: "must be smaller than context.total_budget_tokens".into(),
            });
        }

        if self.tools.max_tool_loops == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "tools.max_tool_loops".into(),
                message: "max_tool_loops must be greater than 0".into(),
            });
        }
        if self.tools.search_web.enabled && self.tools.search_web.base_url.is_none() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "tools.search_web.base_url".into(),
                message: "search_web is enabled but base_url is not set".into(),
            });
        }
        if self.tools.image_generation.enabled && self.tools.image_generation.base_url.is_none() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "tools.image_generation.base_url".into(),
                message: "image_generation is enabled but base_url is not set".into(),
            });
        }

        if self.encryption.key_env.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "encryption.key_env".into(),
                message: "key_env must not be empty".into(),
            });
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::ProviderShape;

    fn valid_config() -> Config {
        Config {
            providers: ProvidersConfig {
                entries: vec![ProviderEntry {
                    id: "openai".into(),
                    shape: ProviderShape::OpenAi,
                    base_url: "https://api.openai.com/v1".into(),
                    auth: AuthConfig {
                        mode: AuthMode::ApiKey,
                        env: Some("OPENAI_API_KEY".into()),
                        key: None,
                    },
                    default_model: None,
                }],
                ..ProvidersConfig::default()
            },
            ..Config::default()
        }
    }

    fn find_issue<'a>(issues: &'a [ConfigError], field_prefix: &str) -> Option<&'a ConfigError> {
        issues.iter().find(|e| e.field.starts_with(field_prefix))
    }

    #[test]
    fn valid_config_passes() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues.iter().filter(|e| e.severity == ConfigSeverity::Error).collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn server_port_zero_is_error() {
        let mut cfg = valid_config();
        cfg.server.port = 0;
        let issues = cfg.validate();
        assert_eq!(find_issue(&issues, "server.port").unwrap().severity, ConfigSeverity::Error);
    }

    #[test]
    fn no_providers_is_warning() {
        let mut cfg = valid_config();
        cfg.providers.entries.clear();
        let issues = cfg.validate();
        assert_eq!(
            find_issue(&issues, "providers.entries").unwrap().severity,
            ConfigSeverity::Warning
        );
    }

    #[test]
    fn duplicate_provider_ids_is_warning() {
        let mut cfg = valid_config();
        let mut second = cfg.providers.entries[0].clone();
        second.auth.env = Some("OPENAI_API_KEY_2".into());
        cfg.providers.entries.push(second);
        let issues = cfg.validate();
        let dup = issues.iter().filter(|e| e.message.contains("duplicate")).count();
        assert_eq!(dup, 1);
    }

    #[test]
    fn provider_missing_credentials_is_error() {
        let mut cfg = valid_config();
        cfg.providers.entries[0].auth.env = None;
        let issues = cfg.validate();
        assert_eq!(
            find_issue(&issues, "providers.entries[0].auth").unwrap().severity,
            ConfigSeverity::Error
        );
    }

    #[test]
    fn provider_auth_none_does_not_require_credentials() {
        let mut cfg = valid_config();
        cfg.providers.entries[0].auth = AuthConfig {
            mode: AuthMode::None,
            env: None,
            key: None,
        };
        let issues = cfg.validate();
        assert!(find_issue(&issues, "providers.entries[0].auth").is_none());
    }

    #[test]
    fn embedding_zero_dimensions_is_error() {
        let mut cfg = valid_config();
        cfg.memory.embedding.dimensions = 0;
        let issues = cfg.validate();
        assert_eq!(
            find_issue(&issues, "memory.embedding.dimensions").unwrap().severity,
            ConfigSeverity::Error
        );
    }

    #[test]
    fn embedding_bad_scheme_is_error() {
        let mut cfg = valid_config();
        cfg.memory.embedding.base_url = "ftp://localhost".into();
        let issues = cfg.validate();
        assert!(find_issue(&issues, "memory.embedding.base_url").is_some());
    }

    #[test]
    fn context_reserved_must_be_smaller_than_total() {
        let mut cfg = valid_config();
        cfg.context.reserved_for_response_tokens = cfg.context.total_budget_tokens;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "context.reserved_for_response_tokens").is_some());
    }

    #[test]
    fn max_tool_loops_zero_is_error() {
        let mut cfg = valid_config();
        cfg.tools.max_tool_loops = 0;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "tools.max_tool_loops").is_some());
    }

    #[test]
    fn search_web_enabled_without_base_url_is_error() {
        let mut cfg = valid_config();
        cfg.tools.search_web.enabled = true;
        cfg.tools.search_web.base_url = None;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "tools.search_web.base_url").is_some());
    }

    #[test]
    fn merge_threshold_out_of_range_is_error() {
        let mut cfg = valid_config();
        cfg.memory_policy.merge_threshold = 1.5;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "memory_policy.merge_threshold").is_some());
    }

    #[test]
    fn config_error_display_format() {
        let err = ConfigError {
            severity: ConfigSeverity::Error,
            field: "server.port".into(),
            message: "port must be greater than 0".into(),
        };
        assert_eq!(format!("{err}"), "[ERROR] server.port: port must be greater than 0");
    }

    #[test]
    fn deserialize_empty_uses_all_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        let issues = cfg.validate();
        // empty config: only the "no providers" warning, nothing else.
        assert!(issues.iter().all(|e| e.severity == ConfigSeverity::Warning));
    }
}
