//! API Credential / TOTP secret sealing (§3, §9).
//!
//! Every `ApiCredential` and `User::totp_secret_ciphertext` is AES-256-GCM
//! ciphertext of the plaintext secret under a key derived from a
//! process-wide pepper (read once from the env var named by
//! `EncryptionConfig::key_env`) and the owning user's id. Nothing in this
//! module logs plaintext; callers must not either.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hmac::{Hmac, Mac};
use orc_domain::error::{Error, Result};
use orc_domain::model::EncryptedBlob;
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Reads the pepper from `key_env` and derives a per-user 256-bit key via
/// HMAC-SHA256(pepper, user_id). The pepper itself is never the key —
/// every user's ciphertext is sealed under a distinct derived key even
/// though all credentials share one pepper.
pub fn derive_key(key_env: &str, user_id: Uuid) -> Result<[u8; 32]> {
    let pepper = std::env::var(key_env)
        .map_err(|_| Error::ConfigurationError { missing: vec![key_env.to_string()] })?;
    let mut mac = HmacSha256::new_from_slice(pepper.as_bytes())
        .map_err(|e| Error::EncryptionError(e.to_string()))?;
    mac.update(user_id.as_bytes());
    let out = mac.finalize().into_bytes();
    let mut key = [0u8; 32];
    key.copy_from_slice(&out);
    Ok(key)
}

pub fn encrypt(plaintext: &[u8], key: &[u8; 32]) -> Result<EncryptedBlob> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut iv = [0u8; 12];
    getrandom(&mut iv)?;
    let nonce = Nonce::from_slice(&iv);
    let mut sealed = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| Error::EncryptionError(e.to_string()))?;
    if sealed.len() < 16 {
        return Err(Error::EncryptionError("ciphertext shorter than auth tag".into()));
    }
    let tag_at = sealed.len() - 16;
    let auth_tag_vec = sealed.split_off(tag_at);
    let mut auth_tag = [0u8; 16];
    auth_tag.copy_from_slice(&auth_tag_vec);
    Ok(EncryptedBlob { ciphertext: sealed, iv, auth_tag })
}

pub fn decrypt(blob: &EncryptedBlob, key: &[u8; 32]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(&blob.iv);
    let mut combined = blob.ciphertext.clone();
    combined.extend_from_slice(&blob.auth_tag);
    cipher
        .decrypt(nonce, combined.as_slice())
        .map_err(|_| Error::EncryptionError("decryption failed, wrong key or tampered blob".into()))
}

/// Encrypt a UTF-8 string (the common case: API keys, TOTP secrets).
pub fn encrypt_str(plaintext: &str, key: &[u8; 32]) -> Result<EncryptedBlob> {
    encrypt(plaintext.as_bytes(), key)
}

pub fn decrypt_to_string(blob: &EncryptedBlob, key: &[u8; 32]) -> Result<String> {
    let bytes = decrypt(blob, key)?;
    String::from_utf8(bytes).map_err(|e| Error::EncryptionError(e.to_string()))
}

fn getrandom(buf: &mut [u8]) -> Result<()> {
    use aes_gcm::aead::rand_core::RngCore;
    aes_gcm::aead::OsRng.fill_bytes(buf);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_pepper() -> &'static str {
        std::env::set_var("ORC_TEST_PEPPER", "test-pepper-value");
        "ORC_TEST_PEPPER"
    }

    #[test]
    fn roundtrips_plaintext() {
        let env = set_pepper();
        let user_id = Uuid::new_v4();
        let key = derive_key(env, user_id).unwrap();
        let blob = encrypt_str("sk-super-secret", &key).unwrap();
        let plain = decrypt_to_string(&blob, &key).unwrap();
        assert_eq!(plain, "sk-super-secret");
    }

    #[test]
    fn different_users_get_different_keys() {
        let env = set_pepper();
        let a = derive_key(env, Uuid::new_v4()).unwrap();
        let b = derive_key(env, Uuid::new_v4()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn decrypt_fails_with_wrong_key() {
        let env = set_pepper();
        let key = derive_key(env, Uuid::new_v4()).unwrap();
        let other_key = derive_key(env, Uuid::new_v4()).unwrap();
        let blob = encrypt_str("sk-super-secret", &key).unwrap();
        assert!(decrypt_to_string(&blob, &other_key).is_err());
    }

    #[test]
    fn missing_pepper_env_is_configuration_error() {
        let err = derive_key("ORC_DEFINITELY_UNSET_VAR", Uuid::new_v4()).unwrap_err();
        assert_eq!(err.tag(), "configuration_error");
    }
}
