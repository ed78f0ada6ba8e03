//! `orc-memory` — local embedding, vector search, and memory lifecycle
//! management for a single character's long-term memories.
//!
//! Three components, layered bottom-up:
//! - [`embedding`] (C5): turns text into vectors, with a keyword-overlap
//!   fallback for when no embedding profile is configured or reachable.
//! - [`vector_index`] (C6): a per-character flat cosine index with a
//!   durable snapshot.
//! - [`memory`] (C7): hybrid retrieval ranking and policy-driven
//!   housekeeping built on the two above.
//!
//! [`store`] persists each character's memory list as a flat JSON file,
//! the entity-repository shape generalized from `orc_store::entity` but
//! kept local to this crate since `Memory` is owned by character, not by
//! user.

pub mod embedding;
pub mod memory;
pub mod store;
pub mod vector_index;

pub use embedding::{
    cosine, extract_search_terms, text_similarity, EmbeddingClient, EmbeddingCredential,
    EmbeddingResult, SearchTerms,
};
pub use memory::{
    search, HousekeepingOptions, HousekeepingPolicy, HousekeepingReport, MemoryRationale,
    RankedMemory, SearchOptions,
};
pub use store::MemoryStore;
pub use vector_index::{IndexEntry, ScoredEntry, VectorIndex};
