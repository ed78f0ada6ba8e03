//! `orc-core` — the Chat Orchestration Core library.
//!
//! This crate has no network surface of its own (§6): it exposes the
//! entity repositories, the turn state machine, and the post-turn jobs
//! as a library, and leaves binding a socket to whatever embeds it.
//! `orc-cli` is the thin reference embedder used for local development.

pub mod assembly;
pub mod cancel;
pub mod chunk;
pub mod crypto;
pub mod post_turn;
pub mod provider_resolve;
pub mod runtime;
pub mod session_lock;
pub mod turn;

pub use chunk::PublicChunk;
pub use runtime::Runtime;
pub use turn::TurnInput;
