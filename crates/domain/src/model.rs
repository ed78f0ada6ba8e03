//! Data model entities (§3). Identifiers are opaque UUIDv4; timestamps are
//! millisecond-resolution instants serialized as RFC 3339 via `chrono`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capability::ProviderShape;

/// The fixed all-zero UUID denoting the implicit anonymous user when auth
/// is disabled (§3 invariant).
pub const ANONYMOUS_USER_ID: Uuid = Uuid::nil();

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub password_hash: Option<String>,
    /// AES-GCM ciphertext of a TOTP secret, encrypted the same way as
    /// API Credential plaintext (§3).
    #[serde(default)]
    pub totp_secret_ciphertext: Option<EncryptedBlob>,
    pub created_at: DateTime<Utc>,
}

/// AES-256-GCM ciphertext shape shared by API Credentials and TOTP secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedBlob {
    pub ciphertext: Vec<u8>,
    pub iv: [u8; 12],
    pub auth_tag: [u8; 16],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCredential {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: ProviderShape,
    pub label: String,
    #[serde(flatten)]
    pub blob: EncryptedBlob,
    pub is_active: bool,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: ProviderShape,
    pub model_name: String,
    #[serde(default)]
    pub api_credential_id: Option<Uuid>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub parameters: SamplingParameters,
    pub is_default: bool,
    /// Marks this as the profile post-turn jobs should use for memory
    /// extraction / title refresh (§4.12) rather than the chat's main profile.
    pub is_cheap: bool,
    #[serde(default)]
    pub tags: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SamplingParameters {
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub top_p: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    pub personality: String,
    pub scenario: String,
    pub first_message: String,
    #[serde(default)]
    pub example_dialogues: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub default_image_id: Option<Uuid>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub avatar_overrides: Vec<AvatarOverride>,
    #[serde(default)]
    pub tags: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarOverride {
    pub image_id: Uuid,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    pub personality: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub default_image_id: Option<Uuid>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub avatar_overrides: Vec<AvatarOverride>,
    #[serde(default)]
    pub tags: Vec<Uuid>,
    /// Characters this persona is explicitly preferred for.
    #[serde(default)]
    pub character_links: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub name_lower: String,
    #[serde(default)]
    pub quick_hide: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantKind {
    User,
    Character,
    Persona,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub kind: ParticipantKind,
    #[serde(default)]
    pub ref_id: Option<Uuid>,
    #[serde(default = "d_true")]
    pub is_active: bool,
    #[serde(default)]
    pub connection_profile_id: Option<Uuid>,
    #[serde(default)]
    pub image_profile_id: Option<Uuid>,
}

fn d_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub participants: Vec<Participant>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Interchange count at which the title was last (re-)evaluated (§4.12).
    #[serde(default)]
    pub title_last_checked_at_interchange: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// One entry in a chat's append-only event log (§3). Events are never
/// mutated in place — superseded by a higher `swipe_index` in the same
/// `swipe_group_id`, or by an `Edit`/`Delete` tombstone referencing the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ChatEvent {
    Message {
        id: Uuid,
        role: MessageRole,
        content: String,
        #[serde(default)]
        attachments: Vec<Uuid>,
        #[serde(default)]
        swipe_group_id: Option<Uuid>,
        #[serde(default)]
        swipe_index: Option<u32>,
        #[serde(default)]
        token_count: Option<usize>,
        #[serde(default)]
        raw_response_ref: Option<String>,
        /// Client-supplied idempotency key for `submitTurn` retries (§4.11).
        #[serde(default)]
        client_request_id: Option<String>,
        created_at: DateTime<Utc>,
    },
    ToolInvocation {
        id: Uuid,
        tool_name: String,
        arguments: serde_json::Value,
        status: ToolInvocationStatus,
        #[serde(default)]
        result_ref: Option<String>,
        #[serde(default)]
        error_text: Option<String>,
        created_at: DateTime<Utc>,
    },
    ContextSummary {
        id: Uuid,
        summarizes_up_to_event_id: Uuid,
        content: String,
        token_count: usize,
        created_at: DateTime<Utc>,
    },
    /// Records an edit to a prior message event; assembly (C10) uses
    /// `new_content` in place of the original from this point on.
    Edit {
        id: Uuid,
        target_event_id: Uuid,
        prior_content: String,
        new_content: String,
        created_at: DateTime<Utc>,
    },
    /// Tombstone: the target event remains on disk for history but is
    /// excluded from context assembly.
    Delete {
        id: Uuid,
        target_event_id: Uuid,
        created_at: DateTime<Utc>,
    },
    /// Records the selected swipe index for a swipe group (§4.11
    /// `selectSwipe`) — a pure metadata update, not a content change.
    SelectSwipe {
        id: Uuid,
        swipe_group_id: Uuid,
        selected_index: u32,
        created_at: DateTime<Utc>,
    },
}

impl ChatEvent {
    pub fn id(&self) -> Uuid {
        match self {
            ChatEvent::Message { id, .. }
            | ChatEvent::ToolInvocation { id, .. }
            | ChatEvent::ContextSummary { id, .. }
            | ChatEvent::Edit { id, .. }
            | ChatEvent::Delete { id, .. }
            | ChatEvent::SelectSwipe { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolInvocationStatus {
    Pending,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    Image,
    Avatar,
    Attachment,
    Generated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSource {
    Uploaded,
    Imported,
    Generated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub sha256: String,
    pub original_filename: String,
    pub mime_type: String,
    pub size: u64,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    pub category: FileCategory,
    pub source: FileSource,
    pub storage_key: String,
    #[serde(default)]
    pub linked_to: Vec<Uuid>,
}

impl FileEntry {
    /// A file with no remaining links may be garbage-collected (§4.1).
    pub fn is_orphaned(&self) -> bool {
        self.linked_to.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub character_id: Uuid,
    pub content: String,
    pub summary: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub tags: Vec<Uuid>,
    pub importance: f32,
    #[serde(default)]
    pub persona_id: Option<Uuid>,
    #[serde(default)]
    pub chat_id: Option<Uuid>,
    pub last_accessed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    OpenAi,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: EmbeddingProvider,
    pub model_name: String,
    pub dimensions: usize,
    #[serde(default)]
    pub api_credential_id: Option<Uuid>,
    #[serde(default)]
    pub base_url: Option<String>,
    pub is_default: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageProvider {
    OpenAi,
    Grok,
    GoogleImagen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: ImageProvider,
    pub model_name: String,
    #[serde(default)]
    pub api_credential_id: Option<Uuid>,
    #[serde(default)]
    pub parameters: serde_json::Value,
    pub is_default: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_user_id_is_nil() {
        assert_eq!(ANONYMOUS_USER_ID, Uuid::nil());
    }

    #[test]
    fn file_entry_with_empty_links_is_orphaned() {
        let entry = FileEntry {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            sha256: "x".into(),
            original_filename: "a.png".into(),
            mime_type: "image/png".into(),
            size: 10,
            width: None,
            height: None,
            category: FileCategory::Image,
            source: FileSource::Uploaded,
            storage_key: "x".into(),
            linked_to: vec![],
        };
        assert!(entry.is_orphaned());
    }

    #[test]
    fn chat_event_id_extracts_across_variants() {
        let id = Uuid::new_v4();
        let ev = ChatEvent::Delete {
            id,
            target_event_id: Uuid::new_v4(),
            created_at: Utc::now(),
        };
        assert_eq!(ev.id(), id);
    }

    #[test]
    fn chat_event_message_serde_roundtrip() {
        let ev = ChatEvent::Message {
            id: Uuid::new_v4(),
            role: MessageRole::Assistant,
            content: "hi".into(),
            attachments: vec![],
            swipe_group_id: None,
            swipe_index: None,
            token_count: Some(2),
            raw_response_ref: None,
            client_request_id: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"kind\":\"message\""));
        let back: ChatEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id(), ev.id());
    }
}
