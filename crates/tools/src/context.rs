//! Per-call dispatch context (§4.9's `ctx`).
//!
//! The spec names `ctx` as ids (`imageProfileId?`, `embeddingProfileId?`,
//! ...); this crate has no repository access of its own, so the
//! orchestrator (C11) resolves those ids to records before calling
//! [`crate::dispatch::execute`] and hands the resolved records across
//! instead. Ids are still carried for linking generated files back to their
//! owning chat/user.

use orc_domain::model::{EmbeddingProfile, ImageGenerationProfile, Memory};
use uuid::Uuid;

use orc_memory::EmbeddingCredential;

#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub chat_id: Uuid,
    pub user_id: Uuid,
    pub character_id: Option<Uuid>,
    pub calling_participant_id: Option<Uuid>,
    /// The calling participant's name, used for `{{me}}` template resolution.
    pub calling_participant_name: Option<String>,
    /// A short appearance fragment, used alongside the name for `{{me}}`.
    pub calling_participant_appearance: Option<String>,
    pub embedding_profile: Option<EmbeddingProfile>,
    pub embedding_credential: Option<EmbeddingCredential>,
    pub image_profile: Option<ImageGenerationProfile>,
    /// Plaintext API key for `image_profile`'s credential, already
    /// decrypted by the caller. Never logged.
    pub image_api_key: Option<String>,
    /// Candidate memory pool for `character_id`, loaded by the caller so
    /// this crate doesn't need its own persistence access for the search.
    pub memories: Vec<Memory>,
}
