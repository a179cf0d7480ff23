//! Log-entry embeddings and novelty scores.
//!
//! Embeddings are signed feature hashes of the method and path tokens,
//! L2-normalised, always [`EMBEDDING_DIM`] wide. The score rewards path
//! shapes that look like real API resources and adds a small random jitter
//! so equally-shaped paths do not tie.

use crate::table::RouteMethod;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Width of every embedding.
pub const EMBEDDING_DIM: usize = 384;

pub const BASELINE_SCORE: f64 = 0.80;
/// `/api/vN/...`
pub const VERSIONED_PREFIX_BONUS: f64 = 0.08;
/// A plural resource noun such as `users`.
pub const PLURAL_RESOURCE_BONUS: f64 = 0.04;
/// Last segment looks like a record id (numeric or UUID).
pub const IDENTIFIER_TAIL_PENALTY: f64 = 0.10;
/// Jitter is drawn from `[0, MAX_JITTER)`.
pub const MAX_JITTER: f64 = 0.02;

/// One historical request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogEntry {
    pub method: RouteMethod,
    pub path: String,
    pub status: u16,
}

impl LogEntry {
    pub fn new(method: RouteMethod, path: impl Into<String>, status: u16) -> Self {
        Self {
            method,
            path: path.into(),
            status,
        }
    }
}

/// A log entry with its embedding and novelty score in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorizedLog {
    pub entry: LogEntry,
    #[serde(skip_serializing)]
    pub embedding: Vec<f32>,
    pub score: f64,
}

/// Embed and score an entry.
pub fn vectorize(entry: &LogEntry, rng: &mut impl Rng) -> VectorizedLog {
    let jitter = rng.gen_range(0.0..MAX_JITTER);
    VectorizedLog {
        embedding: embed(entry),
        score: (shape_score(&entry.path) + jitter).clamp(0.0, 1.0),
        entry: entry.clone(),
    }
}

/// Deterministic part of the score.
#[must_use]
pub fn shape_score(path: &str) -> f64 {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut score = BASELINE_SCORE;
    if has_versioned_prefix(&segments) {
        score += VERSIONED_PREFIX_BONUS;
    }
    if segments.iter().any(|s| is_plural_noun(s)) {
        score += PLURAL_RESOURCE_BONUS;
    }
    if segments.last().is_some_and(|s| is_identifier(s)) {
        score -= IDENTIFIER_TAIL_PENALTY;
    }
    score
}

fn has_versioned_prefix(segments: &[&str]) -> bool {
    match segments {
        [api, version, ..] => {
            api.eq_ignore_ascii_case("api")
                && version
                    .strip_prefix(['v', 'V'])
                    .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        }
        _ => false,
    }
}

fn is_plural_noun(segment: &str) -> bool {
    segment.len() > 3
        && segment.bytes().all(|b| b.is_ascii_alphabetic())
        && segment.ends_with('s')
        && !segment.ends_with("ss")
}

fn is_identifier(segment: &str) -> bool {
    segment.bytes().all(|b| b.is_ascii_digit()) || is_uuid(segment)
}

fn is_uuid(segment: &str) -> bool {
    segment.len() == 36
        && segment.bytes().enumerate().all(|(i, b)| match i {
            8 | 13 | 18 | 23 => b == b'-',
            _ => b.is_ascii_hexdigit(),
        })
}

fn tokens(entry: &LogEntry) -> Vec<String> {
    let segments: Vec<&str> = entry.path.split('/').filter(|s| !s.is_empty()).collect();
    let mut out = Vec::with_capacity(segments.len() * 2 + 2);
    out.push(format!("method:{}", entry.method));
    out.push(format!("depth:{}", segments.len()));
    for (i, seg) in segments.iter().enumerate() {
        let seg = if is_identifier(seg) { "<id>" } else { seg };
        out.push(format!("seg:{}", seg.to_ascii_lowercase()));
        out.push(format!("pos{i}:{}", seg.to_ascii_lowercase()));
    }
    for pair in segments.windows(2) {
        out.push(format!("bi:{}/{}", pair[0], pair[1]));
    }
    out
}

/// Signed feature hashing into [`EMBEDDING_DIM`] buckets, then L2-normalised.
#[must_use]
pub fn embed(entry: &LogEntry) -> Vec<f32> {
    let mut v = vec![0f32; EMBEDDING_DIM];
    for token in tokens(entry) {
        let digest = Sha256::digest(token.as_bytes());
        let mut idx_bytes = [0u8; 8];
        idx_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(idx_bytes) % EMBEDDING_DIM as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

/// Cosine similarity; `0.0` when either vector has zero magnitude.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let (mut dot, mut na, mut nb) = (0f64, 0f64, 0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}
