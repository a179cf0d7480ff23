use super::vector::{cosine_similarity, VectorizedLog};
use crate::router::RouteIndex;
use crate::table::RouteMethod;
use std::collections::HashSet;
use tracing::debug;

/// Thresholds applied by [`select_candidates`].
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorConfig {
    /// Scores at or below this are dropped.
    pub min_confidence: f64,
    pub max_batch: usize,
    /// Drop a candidate whose embedding is at least this similar to one already kept.
    pub dedupe_similarity: Option<f64>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.88,
            max_batch: 5,
            dedupe_similarity: None,
        }
    }
}

/// Turn scored logs into the accepted candidate list.
///
/// 1. drop `score <= min_confidence`
/// 2. drop paths any existing declaration already serves (exact or templated, any method)
/// 3. order by score descending (stable), keep one entry per `(method, path)`
///    and, if configured, drop near-duplicate embeddings
/// 4. truncate to `max_batch`
///
/// Pure and deterministic: identical inputs give the identical ordered output.
#[must_use]
pub fn select_candidates(
    scored: &[VectorizedLog],
    existing: &RouteIndex,
    config: &SelectorConfig,
) -> Vec<VectorizedLog> {
    let mut confident: Vec<&VectorizedLog> = scored
        .iter()
        .filter(|v| v.score > config.min_confidence)
        .filter(|v| {
            let covered = existing.covers_path(&v.entry.path);
            if covered {
                debug!(path = %v.entry.path, "Candidate already served by an existing route");
            }
            !covered
        })
        .collect();
    confident.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut seen: HashSet<(RouteMethod, &str)> = HashSet::new();
    let mut accepted: Vec<VectorizedLog> = Vec::new();
    for candidate in confident {
        if accepted.len() >= config.max_batch {
            break;
        }
        if !seen.insert((candidate.entry.method, candidate.entry.path.as_str())) {
            continue;
        }
        if let Some(threshold) = config.dedupe_similarity {
            let near = accepted
                .iter()
                .any(|kept| cosine_similarity(&kept.embedding, &candidate.embedding) >= threshold);
            if near {
                debug!(path = %candidate.entry.path, threshold, "Near-duplicate candidate dropped");
                continue;
            }
        }
        accepted.push(candidate.clone());
    }
    accepted
}
