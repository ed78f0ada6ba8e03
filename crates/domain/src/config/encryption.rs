use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Credential encryption
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Controls the AES-256-GCM key used to seal API Credential plaintext
/// before it is written to storage (§3: `(ciphertext, iv, authTag)`).
///
/// The key itself is never stored in config — only the name of the
/// environment variable that holds it, following the same env-indirection
/// pattern as provider auth (`llm.entries[].auth.env`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// Env var holding a 32-byte key, base64-encoded.
    #[serde(default = "d_key_env")]
    pub key_env: String,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            key_env: d_key_env(),
        }
    }
}

fn d_key_env() -> String {
    "ORC_CREDENTIAL_KEY".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_key_env_name() {
        assert_eq!(EncryptionConfig::default().key_env, "ORC_CREDENTIAL_KEY");
    }
}
