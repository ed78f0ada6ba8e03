//! Embedding Client (C5) — turns text into vectors for the Memory Engine
//! and Vector Index, and supplies the keyword-matching fallback used when
//! no embedding is available.
//!
//! Grounded on `orc-providers::openai_compat`'s unary-POST request shape
//! (embeddings are non-streaming, so none of its SSE machinery is needed)
//! and on this crate's former REST client construction (`reqwest::Client`
//! built once, reused for the process lifetime). Dispatch is keyed by
//! [`EmbeddingProvider`], not by chat provider shape — Anthropic has no
//! embeddings endpoint at all, so it is absent from this dispatch.

use std::collections::HashSet;

use orc_domain::error::{Error, Result};
use orc_domain::model::{EmbeddingProfile, EmbeddingProvider};

/// Result of an [`EmbeddingClient::embed`] call.
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub vector: Vec<f32>,
    pub provider: EmbeddingProvider,
    pub model: String,
    pub dimensions: usize,
}

/// Resolved credential plaintext for an embedding request. The caller
/// decrypts the profile's `api_credential_id` (if any) before calling
/// [`EmbeddingClient::embed`]; this client never touches ciphertext.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingCredential {
    pub api_key: Option<String>,
}

pub struct EmbeddingClient {
    http: reqwest::Client,
}

impl Default for EmbeddingClient {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Embed `text` using the given profile. `base_url` defaults per
    /// provider shape when the profile doesn't override it.
    pub async fn embed(
        &self,
        text: &str,
        profile: &EmbeddingProfile,
        credential: &EmbeddingCredential,
    ) -> Result<EmbeddingResult> {
        match profile.provider {
            EmbeddingProvider::OpenAi => self.embed_openai(text, profile, credential).await,
            EmbeddingProvider::Ollama => self.embed_ollama(text, profile).await,
        }
    }

    async fn embed_openai(
        &self,
        text: &str,
        profile: &EmbeddingProfile,
        credential: &EmbeddingCredential,
    ) -> Result<EmbeddingResult> {
        let Some(api_key) = credential.api_key.as_ref().filter(|k| !k.is_empty()) else {
            return Err(Error::ConfigurationError {
                missing: vec!["embedding_profile.api_credential_id".into()],
            });
        };
        let base_url = profile
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com/v1")
            .trim_end_matches('/');
        let url = format!("{base_url}/embeddings");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&serde_json::json!({ "input": text, "model": profile.model_name }))
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let body = resp.text().await.map_err(from_reqwest)?;
        if !status.is_success() {
            return Err(Error::ProviderError {
                provider: "openai".into(),
                status: status.as_u16(),
                detail: preview(&body),
            });
        }

        let parsed: serde_json::Value = serde_json::from_str(&body)?;
        let vector = parsed
            .pointer("/data/0/embedding")
            .and_then(|v| v.as_array())
            .ok_or_else(|| Error::ProviderError {
                provider: "openai".into(),
                status: status.as_u16(),
                detail: "missing data[0].embedding in response".into(),
            })?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect::<Vec<f32>>();

        Ok(EmbeddingResult {
            dimensions: vector.len(),
            vector,
            provider: EmbeddingProvider::OpenAi,
            model: profile.model_name.clone(),
        })
    }

    async fn embed_ollama(&self, text: &str, profile: &EmbeddingProfile) -> Result<EmbeddingResult> {
        let base_url = profile
            .base_url
            .as_deref()
            .unwrap_or("http://localhost:11434")
            .trim_end_matches('/');
        let url = format!("{base_url}/api/embeddings");

        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "prompt": text, "model": profile.model_name }))
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let body = resp.text().await.map_err(from_reqwest)?;
        if !status.is_success() {
            return Err(Error::ProviderError {
                provider: "ollama".into(),
                status: status.as_u16(),
                detail: preview(&body),
            });
        }

        let parsed: serde_json::Value = serde_json::from_str(&body)?;
        let vector = parsed
            .get("embedding")
            .and_then(|v| v.as_array())
            .ok_or_else(|| Error::ProviderError {
                provider: "ollama".into(),
                status: status.as_u16(),
                detail: "missing embedding field in response".into(),
            })?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect::<Vec<f32>>();

        Ok(EmbeddingResult {
            dimensions: vector.len(),
            vector,
            provider: EmbeddingProvider::Ollama,
            model: profile.model_name.clone(),
        })
    }
}

fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::NetworkError(format!("timeout: {e}"))
    } else {
        Error::NetworkError(e.to_string())
    }
}

fn preview(body: &str) -> String {
    body.chars().take(300).collect()
}

/// Cosine similarity between two equal-length vectors. Returns 0.0 for
/// mismatched lengths or zero-magnitude vectors rather than panicking —
/// callers treat those as "no signal", not an error.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "is", "are", "was", "were", "be", "been", "to", "of",
    "in", "on", "at", "for", "with", "about", "as", "by", "that", "this", "it", "i", "you", "he",
    "she", "they", "we",
];

#[derive(Debug, Clone, Default)]
pub struct SearchTerms {
    pub keywords: Vec<String>,
    pub exact_phrases: Vec<String>,
    pub used_embedding: bool,
}

/// Splits on whitespace, strips stopwords, preserves double-quoted phrases.
pub fn extract_search_terms(query: &str) -> SearchTerms {
    let mut keywords = Vec::new();
    let mut exact_phrases = Vec::new();

    let mut chars = query.chars().peekable();
    let mut buf = String::new();
    let mut in_quotes = false;

    let flush = |buf: &mut String, keywords: &mut Vec<String>| {
        if !buf.is_empty() {
            let lower = buf.to_lowercase();
            if !STOPWORDS.contains(&lower.as_str()) {
                keywords.push(lower);
            }
            buf.clear();
        }
    };

    while let Some(c) = chars.next() {
        match c {
            '"' if !in_quotes => {
                flush(&mut buf, &mut keywords);
                in_quotes = true;
            }
            '"' if in_quotes => {
                if !buf.is_empty() {
                    exact_phrases.push(buf.to_lowercase());
                    buf.clear();
                }
                in_quotes = false;
            }
            c if c.is_whitespace() && !in_quotes => {
                flush(&mut buf, &mut keywords);
            }
            c => buf.push(c),
        }
    }
    if in_quotes {
        // Unterminated quote: treat the remainder as an exact phrase.
        if !buf.is_empty() {
            exact_phrases.push(buf.to_lowercase());
        }
    } else {
        flush(&mut buf, &mut keywords);
    }

    SearchTerms {
        keywords,
        exact_phrases,
        used_embedding: false,
    }
}

/// Jaccard-like keyword overlap plus a bonus for exact-phrase hits, used
/// as the fallback ranking signal when embeddings are unavailable.
pub fn text_similarity(query: &str, candidate: &str) -> f32 {
    let terms = extract_search_terms(query);
    let candidate_lower = candidate.to_lowercase();
    let candidate_words: HashSet<&str> = candidate_lower.split_whitespace().collect();

    if terms.keywords.is_empty() && terms.exact_phrases.is_empty() {
        return 0.0;
    }

    let keyword_hits = terms
        .keywords
        .iter()
        .filter(|k| candidate_words.contains(k.as_str()))
        .count();
    let keyword_score = if terms.keywords.is_empty() {
        0.0
    } else {
        keyword_hits as f32 / terms.keywords.len() as f32
    };

    let phrase_hits = terms
        .exact_phrases
        .iter()
        .filter(|p| candidate_lower.contains(p.as_str()))
        .count();
    let phrase_score = if terms.exact_phrases.is_empty() {
        0.0
    } else {
        phrase_hits as f32 / terms.exact_phrases.len() as f32
    };

    (keyword_score * 0.6 + phrase_score * 0.4).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert!((cosine(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }

    #[test]
    fn cosine_rejects_mismatched_lengths() {
        assert_eq!(cosine(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn extract_search_terms_strips_stopwords() {
        let terms = extract_search_terms("what is the best way to learn rust");
        assert!(terms.keywords.contains(&"best".to_string()));
        assert!(terms.keywords.contains(&"learn".to_string()));
        assert!(!terms.keywords.contains(&"the".to_string()));
        assert!(!terms.used_embedding);
    }

    #[test]
    fn extract_search_terms_preserves_quoted_phrases() {
        let terms = extract_search_terms(r#"find "favorite language" fast"#);
        assert_eq!(terms.exact_phrases, vec!["favorite language".to_string()]);
        assert!(terms.keywords.contains(&"find".to_string()));
        assert!(terms.keywords.contains(&"fast".to_string()));
    }

    #[test]
    fn text_similarity_rewards_keyword_overlap() {
        let score = text_similarity("favorite language", "my favorite language is rust");
        assert!(score > 0.0);
    }

    #[test]
    fn text_similarity_is_zero_for_empty_query() {
        assert_eq!(text_similarity("", "anything"), 0.0);
    }
}
