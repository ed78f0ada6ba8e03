//! Memory Engine (C7) — hybrid retrieval and housekeeping over a
//! character's memories, built from the Embedding Client (C5) and Vector
//! Index (C6).
//!
//! This component has no direct teacher analog: the teacher's crate was a
//! *remote* SerialMemoryServer REST client. This engine is local compute,
//! following the style of `orc_context::builder` (pure functions over
//! owned structs, no network I/O on the hot path) rather than the
//! REST-client style the teacher used here.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use orc_domain::model::{EmbeddingProfile, Memory};
use uuid::Uuid;

use crate::embedding::{cosine, text_similarity, EmbeddingClient, EmbeddingCredential};
use crate::vector_index::VectorIndex;

/// A memory annotated with its retrieval score (§4.7 step 4).
#[derive(Debug, Clone)]
pub struct RankedMemory {
    pub memory: Memory,
    pub score: f32,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub top_k: Option<usize>,
}

/// Retrieval over one character's memories (§4.7).
///
/// `all_memories` is the character's full memory set as currently held by
/// the entity repository; the caller is responsible for loading it. This
/// function does not mutate storage — `last_accessed_at` refresh is the
/// caller's job (fire-and-forget, per the spec note).
pub async fn search(
    embedding_client: &EmbeddingClient,
    index: &VectorIndex,
    profile: Option<&EmbeddingProfile>,
    credential: &EmbeddingCredential,
    all_memories: &[Memory],
    query: &str,
    options: &SearchOptions,
) -> Vec<RankedMemory> {
    let k = options.top_k.unwrap_or(8);
    let by_id: std::collections::HashMap<Uuid, &Memory> =
        all_memories.iter().map(|m| (m.id, m)).collect();

    let mut similarities: Vec<(Uuid, f32)> = Vec::new();

    if let Some(profile) = profile {
        if let Ok(result) = embedding_client.embed(query, profile, credential).await {
            let hits = index.search(&result.vector, k, None);
            if !hits.is_empty() {
                similarities = hits.into_iter().map(|h| (h.id, h.score)).collect();
            }
        }
    }

    if similarities.is_empty() {
        similarities = all_memories
            .iter()
            .map(|m| (m.id, text_similarity(query, &m.summary)))
            .filter(|(_, score)| *score > 0.0)
            .collect();
    }

    let now = Utc::now();
    let mut ranked: Vec<RankedMemory> = similarities
        .into_iter()
        .filter_map(|(id, similarity)| {
            let memory = *by_id.get(&id)?;
            let recency = recency_weight(memory.last_accessed_at, now);
            let score = 0.7 * similarity + 0.3 * recency + memory.importance;
            Some(RankedMemory {
                memory: memory.clone(),
                score,
            })
        })
        .collect();

    let mut seen = HashSet::new();
    ranked.retain(|r| seen.insert(r.memory.id));

    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(k);
    ranked
}

/// Recency weight: 1.0 for "just accessed", decaying linearly to 0.0 at
/// 90 days, matching the housekeeping policy's month-scale horizons.
fn recency_weight(last_accessed_at: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
    let age_days = (now - last_accessed_at).num_seconds().max(0) as f32 / 86_400.0;
    (1.0 - age_days / 90.0).clamp(0.0, 1.0)
}

// ─────────────────────────────────────────────────────────────────────
// Housekeeping (§4.7)
// ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct HousekeepingPolicy {
    pub max_memories: Option<usize>,
    pub max_age_months: Option<u32>,
    pub max_inactive_months: Option<u32>,
    pub min_importance: Option<f32>,
    pub merge_similar: bool,
    pub merge_threshold: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct HousekeepingOptions {
    pub preview: bool,
}

#[derive(Debug, Clone)]
pub struct MemoryRationale {
    pub memory_id: Uuid,
    pub action: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct HousekeepingReport {
    pub deleted_ids: Vec<Uuid>,
    /// Loser ids from merges (the memory whose content was absorbed).
    pub merged_ids: Vec<Uuid>,
    pub kept: usize,
    pub total_before: usize,
    pub total_after: usize,
    pub rationale: Vec<MemoryRationale>,
}

/// Apply (or preview) a housekeeping policy to a character's memories.
/// Ordering is merge, then delete, per §4.7.
///
/// Returns the surviving set (unchanged from input when `options.preview`
/// is set) plus a report describing every action taken or, in preview
/// mode, every action that *would* be taken.
pub fn run(
    memories: &[Memory],
    policy: &HousekeepingPolicy,
    options: &HousekeepingOptions,
) -> (Vec<Memory>, HousekeepingReport) {
    let total_before = memories.len();
    let mut rationale = Vec::new();
    let mut merged_ids = Vec::new();

    let mut surviving: Vec<Memory> = memories.to_vec();

    if policy.merge_similar {
        let threshold = policy.merge_threshold.unwrap_or(0.92).clamp(0.8, 1.0);
        surviving = merge_similar(surviving, threshold, &mut merged_ids, &mut rationale);
    }

    let merged_set: HashSet<Uuid> = merged_ids.iter().copied().collect();
    let now = Utc::now();
    let mut deleted_ids = Vec::new();

    surviving.retain(|m| {
        if let Some(min) = policy.min_importance {
            if m.importance < min {
                deleted_ids.push(m.id);
                rationale.push(MemoryRationale {
                    memory_id: m.id,
                    action: "delete".into(),
                    reason: format!("importance {} below minImportance {min}", m.importance),
                });
                return false;
            }
        }
        if m.importance < 0.7 {
            if let Some(max_age) = policy.max_age_months {
                let age_months = months_between(m.created_at, now);
                if age_months >= max_age {
                    deleted_ids.push(m.id);
                    rationale.push(MemoryRationale {
                        memory_id: m.id,
                        action: "delete".into(),
                        reason: format!("age {age_months}mo exceeds maxAgeMonths {max_age}"),
                    });
                    return false;
                }
            }
            if let Some(max_inactive) = policy.max_inactive_months {
                let inactive_months = months_between(m.last_accessed_at, now);
                if inactive_months >= max_inactive {
                    deleted_ids.push(m.id);
                    rationale.push(MemoryRationale {
                        memory_id: m.id,
                        action: "delete".into(),
                        reason: format!(
                            "inactive {inactive_months}mo exceeds maxInactiveMonths {max_inactive}"
                        ),
                    });
                    return false;
                }
            }
        }
        true
    });

    if let Some(max) = policy.max_memories {
        if surviving.len() > max {
            // Oldest, least-recently-accessed, lowest-importance overflow first.
            surviving.sort_by(|a, b| {
                a.importance
                    .partial_cmp(&b.importance)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.last_accessed_at.cmp(&b.last_accessed_at))
                    .then(a.created_at.cmp(&b.created_at))
            });
            let overflow = surviving.len() - max;
            for m in surviving.drain(0..overflow) {
                deleted_ids.push(m.id);
                rationale.push(MemoryRationale {
                    memory_id: m.id,
                    action: "delete".into(),
                    reason: format!("overflow beyond maxMemories {max}"),
                });
            }
        }
    }

    let total_after = surviving.len();
    let report = HousekeepingReport {
        deleted_ids,
        merged_ids,
        kept: total_after,
        total_before,
        total_after,
        rationale,
    };

    let result = if options.preview {
        memories.to_vec()
    } else {
        surviving
    };
    let _ = merged_set;
    (result, report)
}

/// Pairwise similarity over memory content. Housekeeping runs without
/// network access, so it scores pairs with the same keyword-overlap
/// fallback the retrieval path uses when embeddings are unavailable,
/// rather than re-embedding every memory on every sweep.
fn merge_similar(
    memories: Vec<Memory>,
    threshold: f32,
    merged_ids: &mut Vec<Uuid>,
    rationale: &mut Vec<MemoryRationale>,
) -> Vec<Memory> {
    let mut result: Vec<Memory> = Vec::with_capacity(memories.len());
    let mut absorbed: HashSet<Uuid> = HashSet::new();

    for (i, candidate) in memories.iter().enumerate() {
        if absorbed.contains(&candidate.id) {
            continue;
        }
        let mut winner = candidate.clone();
        for other in memories.iter().skip(i + 1) {
            if absorbed.contains(&other.id) {
                continue;
            }
            let sim = text_similarity(&winner.content, &other.content);
            if sim >= threshold {
                let (keep, lose) = if winner.content.len() >= other.content.len() {
                    (&winner, other)
                } else {
                    (other, &winner)
                };
                let merged_keywords: Vec<String> = keep
                    .keywords
                    .iter()
                    .cloned()
                    .chain(lose.keywords.iter().cloned())
                    .collect::<HashSet<_>>()
                    .into_iter()
                    .collect();
                let merged_created_at = keep.created_at.min(lose.created_at);
                let merged_importance = keep.importance.max(lose.importance);

                let mut merged = keep.clone();
                merged.keywords = merged_keywords;
                merged.created_at = merged_created_at;
                merged.importance = merged_importance;

                merged_ids.push(lose.id);
                rationale.push(MemoryRationale {
                    memory_id: lose.id,
                    action: "merge".into(),
                    reason: format!("similarity {sim:.2} >= threshold {threshold:.2}"),
                });

                absorbed.insert(lose.id);
                winner = merged;
            }
        }
        result.push(winner);
    }
    result
}

fn months_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u32 {
    let days = (to - from).num_days().max(0);
    (days / 30) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_memory(content: &str, importance: f32, age_days: i64) -> Memory {
        let now = Utc::now();
        Memory {
            id: Uuid::new_v4(),
            character_id: Uuid::new_v4(),
            content: content.into(),
            summary: content.into(),
            keywords: vec![],
            tags: vec![],
            importance,
            persona_id: None,
            chat_id: None,
            last_accessed_at: now - Duration::days(age_days),
            created_at: now - Duration::days(age_days),
        }
    }

    #[test]
    fn recency_weight_decays_toward_zero() {
        let now = Utc::now();
        let fresh = recency_weight(now, now);
        let stale = recency_weight(now - Duration::days(200), now);
        assert!(fresh > stale);
        assert_eq!(stale, 0.0);
    }

    #[test]
    fn housekeeping_deletes_low_importance_below_min() {
        let memories = vec![
            sample_memory("low value note", 0.1, 5),
            sample_memory("high value note", 0.9, 5),
        ];
        let policy = HousekeepingPolicy {
            min_importance: Some(0.5),
            ..Default::default()
        };
        let (kept, report) = run(&memories, &policy, &HousekeepingOptions::default());
        assert_eq!(kept.len(), 1);
        assert_eq!(report.deleted_ids.len(), 1);
        assert_eq!(report.total_before, 2);
        assert_eq!(report.total_after, 1);
    }

    #[test]
    fn housekeeping_preview_mode_does_not_mutate() {
        let memories = vec![sample_memory("low value note", 0.1, 5)];
        let policy = HousekeepingPolicy {
            min_importance: Some(0.5),
            ..Default::default()
        };
        let (kept, report) = run(
            &memories,
            &policy,
            &HousekeepingOptions { preview: true },
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(report.deleted_ids.len(), 1);
    }

    #[test]
    fn housekeeping_respects_max_memories_overflow() {
        let memories: Vec<Memory> = (0..5)
            .map(|i| sample_memory(&format!("note {i}"), 0.5, i as i64))
            .collect();
        let policy = HousekeepingPolicy {
            max_memories: Some(3),
            ..Default::default()
        };
        let (kept, report) = run(&memories, &policy, &HousekeepingOptions::default());
        assert_eq!(kept.len(), 3);
        assert_eq!(report.deleted_ids.len(), 2);
    }

    #[test]
    fn housekeeping_merges_similar_memories() {
        let memories = vec![
            sample_memory("The user loves hiking in the mountains", 0.5, 1),
            sample_memory("The user loves hiking in the mountains very much", 0.5, 2),
        ];
        let policy = HousekeepingPolicy {
            merge_similar: true,
            merge_threshold: Some(0.8),
            ..Default::default()
        };
        let (kept, report) = run(&memories, &policy, &HousekeepingOptions::default());
        assert_eq!(kept.len(), 1);
        assert_eq!(report.merged_ids.len(), 1);
    }

    #[test]
    fn cosine_still_reexported_for_callers() {
        assert!((cosine(&[1.0], &[1.0]) - 1.0).abs() < 1e-6);
    }
}
