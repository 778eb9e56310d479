//! Brute-force vector ranking over chunk embeddings.

use std::cmp::Ordering;

const EPSILON: f32 = 1e-6;

/// Cosine similarity of two vectors. `None` when the lengths differ; zero
/// when either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }

    let mut dot = 0.0f32;
    let mut mag_a = 0.0f32;
    let mut mag_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }

    let denominator = (mag_a * mag_b).sqrt();
    if denominator < EPSILON {
        return Some(0.0);
    }
    Some(dot / denominator)
}

/// Scores every candidate against `query` and keeps the best `top_k`,
/// highest score first. Equal scores keep candidate order. Candidates with
/// a different dimension are skipped.
pub fn rank_top_k<'a, T>(
    query: &[f32],
    candidates: impl IntoIterator<Item = (T, &'a [f32])>,
    top_k: usize,
) -> Vec<(T, f32)> {
    let mut scored: Vec<(T, f32)> = candidates
        .into_iter()
        .filter_map(|(item, vector)| cosine_similarity(query, vector).map(|score| (item, score)))
        .collect();

    // Stable sort keeps insertion order for ties.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);
    scored
}

pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}
