//! `generate_image` — no teacher handler to ground on (the teacher never
//! generated media); built fresh in the same dispatch-table idiom as the
//! rest of this crate, with its HTTP shape following
//! `orc_providers::openai_compat`'s authenticated-POST pattern.
//!
//! A generated image is written through the File Store (C1) with
//! `source=GENERATED, category=IMAGE`, linked to the chat, per §4.9.

use orc_domain::error::Error;
use orc_domain::model::{FileCategory, FileSource, ImageProvider};

use crate::context::ToolContext;
use crate::result::ToolResult;
use crate::runtime::ToolRuntime;
use crate::template::resolve_me;

pub async fn execute(runtime: &ToolRuntime, ctx: &ToolContext, arguments: &serde_json::Value) -> ToolResult {
    let Some(profile) = ctx.image_profile.as_ref() else {
        return ToolResult::err("no image generation profile configured for this character");
    };
    let raw_prompt = match arguments.get("prompt").and_then(|v| v.as_str()) {
        Some(p) if !p.trim().is_empty() => p,
        _ => return ToolResult::err("missing required argument: prompt"),
    };
    let prompt = resolve_me(
        raw_prompt,
        ctx.calling_participant_name.as_deref(),
        ctx.calling_participant_appearance.as_deref(),
    );

    let image_bytes = match profile.provider {
        ImageProvider::OpenAi => generate_openai(runtime, profile, ctx.image_api_key.as_deref(), &prompt).await,
        ImageProvider::Grok => generate_openai_shaped(runtime, profile, ctx.image_api_key.as_deref(), &prompt, "https://api.x.ai/v1").await,
        ImageProvider::GoogleImagen => generate_google_imagen(runtime, profile, ctx.image_api_key.as_deref(), &prompt).await,
    };

    let bytes = match image_bytes {
        Ok(b) => b,
        Err(e) => return ToolResult::err(e.to_string()),
    };

    let entry = match runtime.file_store.create(
        &bytes,
        "generated.png",
        "image/png",
        FileSource::Generated,
        FileCategory::Image,
        ctx.user_id,
        vec![ctx.chat_id],
    ) {
        Ok(e) => e,
        Err(e) => return ToolResult::err(e.to_string()),
    };

    ToolResult::ok(serde_json::json!({
        "fileId": entry.id,
        "mimeType": entry.mime_type,
        "size": entry.size,
    }))
}

async fn generate_openai(
    runtime: &ToolRuntime,
    profile: &orc_domain::model::ImageGenerationProfile,
    api_key: Option<&str>,
    prompt: &str,
) -> orc_domain::error::Result<Vec<u8>> {
    generate_openai_shaped(runtime, profile, api_key, prompt, "https://api.openai.com/v1").await
}

/// OpenAI and Grok both serve `POST {base}/images/generations` returning a
/// base64 payload under `data[0].b64_json` — the same shape the adapter
/// layer uses for `/chat/completions` across OpenAI-compatible providers.
async fn generate_openai_shaped(
    runtime: &ToolRuntime,
    profile: &orc_domain::model::ImageGenerationProfile,
    api_key: Option<&str>,
    prompt: &str,
    default_base: &str,
) -> orc_domain::error::Result<Vec<u8>> {
    let Some(api_key) = api_key else {
        return Err(Error::ConfigurationError {
            missing: vec!["imageGenerationProfile.apiCredentialId".into()],
        });
    };

    let url = format!("{default_base}/images/generations");
    let body = serde_json::json!({
        "model": profile.model_name,
        "prompt": prompt,
        "response_format": "b64_json",
    });

    let response = runtime
        .http
        .post(&url)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| Error::NetworkError(e.to_string()))?;

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(Error::ProviderError {
            provider: "image".into(),
            status: status.as_u16(),
            detail: preview(&text),
        });
    }

    let parsed: serde_json::Value = serde_json::from_str(&text)?;
    let b64 = parsed
        .pointer("/data/0/b64_json")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::ProviderError {
            provider: "image".into(),
            status: status.as_u16(),
            detail: "response had no data[0].b64_json".into(),
        })?;

    decode_base64(b64)
}

/// Google Imagen speaks a different wire shape:
/// `POST {base}:predict` with `instances`/`parameters`, returning base64
/// under `predictions[0].bytesBase64Encoded`.
async fn generate_google_imagen(
    runtime: &ToolRuntime,
    profile: &orc_domain::model::ImageGenerationProfile,
    api_key: Option<&str>,
    prompt: &str,
) -> orc_domain::error::Result<Vec<u8>> {
    let Some(api_key) = api_key else {
        return Err(Error::ConfigurationError {
            missing: vec!["imageGenerationProfile.apiCredentialId".into()],
        });
    };

    let url = format!(
        "https://generativelanguage.googleapis.com/v1beta/models/{}:predict?key={}",
        profile.model_name, api_key
    );
    let body = serde_json::json!({
        "instances": [{ "prompt": prompt }],
        "parameters": { "sampleCount": 1 },
    });

    let response = runtime
        .http
        .post(&url)
        .json(&body)
        .send()
        .await
        .map_err(|e| Error::NetworkError(e.to_string()))?;

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(Error::ProviderError {
            provider: "image".into(),
            status: status.as_u16(),
            detail: preview(&text),
        });
    }

    let parsed: serde_json::Value = serde_json::from_str(&text)?;
    let b64 = parsed
        .pointer("/predictions/0/bytesBase64Encoded")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::ProviderError {
            provider: "image".into(),
            status: status.as_u16(),
            detail: "response had no predictions[0].bytesBase64Encoded".into(),
        })?;

    decode_base64(b64)
}

fn decode_base64(s: &str) -> orc_domain::error::Result<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|e| Error::ProviderError {
            provider: "image".into(),
            status: 0,
            detail: format!("invalid base64 image payload: {e}"),
        })
}

fn preview(body: &str) -> String {
    body.chars().take(300).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_resolution_applies_before_any_network_call() {
        let resolved = resolve_me("{{me}} in a garden", Some("Ari"), Some("short red hair"));
        assert_eq!(resolved, "Ari, short red hair in a garden");
    }
}
