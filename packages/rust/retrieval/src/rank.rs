//! Cosine similarity ranking.

use std::cmp::Ordering;

use grounder_shared::{Chunk, ScoredChunk};

/// Guards the division for degenerate all-zero vectors.
const EPSILON: f32 = 1e-9;

/// Cosine similarity: `dot(a,b) / (||a||·||b|| + ε)`.
///
/// Inputs are index-aligned vectors of equal dimension; the result is in
/// roughly [-1, 1], 0 for a zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt() + EPSILON)
}

/// Score every chunk against the query vector and return the top `k`.
///
/// `chunk_vecs` is index-aligned with `chunks`. The sort is stable and
/// descending by score, so tied chunks keep their insertion (document)
/// order and the result is deterministic. Pure function, no I/O.
pub fn rank_chunks(
    query_vec: &[f32],
    chunk_vecs: &[Vec<f32>],
    chunks: Vec<Chunk>,
    k: usize,
) -> Vec<ScoredChunk> {
    let mut scored: Vec<ScoredChunk> = chunks
        .into_iter()
        .zip(chunk_vecs)
        .map(|(chunk, vec)| ScoredChunk {
            score: cosine_similarity(query_vec, vec),
            chunk,
        })
        .collect();

    // Stable sort: ties preserve insertion order.
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn chunk(text: &str) -> Chunk {
        Chunk {
            source_url: Url::parse("https://www.example.com/").unwrap(),
            title: "Page".into(),
            text: text.into(),
        }
    }

    #[test]
    fn cosine_is_symmetric() {
        let a = [1.0, 2.0, 3.0];
        let b = [-0.5, 0.25, 4.0];
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
    }

    #[test]
    fn cosine_of_self_is_one() {
        let a = [0.3, -1.2, 2.5, 0.0];
        let sim = cosine_similarity(&a, &a);
        assert!((sim - 1.0).abs() < 1e-5, "cosine(a,a) = {sim}");
    }

    #[test]
    fn cosine_of_orthogonal_is_zero() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_opposite_is_minus_one() {
        let a = [1.0, 2.0];
        let b = [-1.0, -2.0];
        let sim = cosine_similarity(&a, &b);
        assert!((sim + 1.0).abs() < 1e-5);
    }

    #[test]
    fn zero_vector_scores_zero_not_nan() {
        let a = [0.0, 0.0, 0.0];
        let b = [1.0, 2.0, 3.0];
        let sim = cosine_similarity(&a, &b);
        assert_eq!(sim, 0.0);
        assert!(!sim.is_nan());
    }

    #[test]
    fn ranked_scores_are_non_increasing() {
        let query = vec![1.0, 0.0];
        let vecs = vec![
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![-1.0, 0.0],
        ];
        let chunks = vec![chunk("a"), chunk("b"), chunk("c"), chunk("d")];

        let ranked = rank_chunks(&query, &vecs, chunks, 10);
        for pair in ranked.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(ranked[0].chunk.text, "b");
    }

    #[test]
    fn ties_keep_insertion_order() {
        let query = vec![1.0, 0.0];
        // Identical vectors, so all scores tie.
        let vecs = vec![vec![2.0, 0.0], vec![2.0, 0.0], vec![2.0, 0.0]];
        let chunks = vec![chunk("first"), chunk("second"), chunk("third")];

        let ranked = rank_chunks(&query, &vecs, chunks, 10);
        let order: Vec<&str> = ranked.iter().map(|s| s.chunk.text.as_str()).collect();
        assert_eq!(order, ["first", "second", "third"]);
    }

    #[test]
    fn truncates_to_k() {
        let query = vec![1.0];
        let vecs: Vec<Vec<f32>> = (0..8).map(|i| vec![i as f32]).collect();
        let chunks: Vec<Chunk> = (0..8).map(|i| chunk(&format!("c{i}"))).collect();

        let ranked = rank_chunks(&query, &vecs, chunks, 3);
        assert_eq!(ranked.len(), 3);
    }

    #[test]
    fn fewer_chunks_than_k_returns_all() {
        let query = vec![1.0];
        let vecs = vec![vec![1.0], vec![2.0]];
        let chunks = vec![chunk("a"), chunk("b")];

        let ranked = rank_chunks(&query, &vecs, chunks, 5);
        assert_eq!(ranked.len(), 2);
    }
}
