//! `orc-store` — file-backed Entity Repositories (C2) and the chat event
//! append-log that backs the Chat Orchestrator (C11).

pub mod chat_log;
pub mod entity;

pub use chat_log::{resolve, ChatEventLog, ResolvedChat, ResolvedMessage};
pub use entity::{Entity, FileBackedRepository, RepositoryBackend};
