//! Similarity computation for embeddings.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::{EmbeddingError, Result};

/// Cosine similarity of two embeddings, in `[-1.0, 1.0]`.
///
/// A zero vector on either side scores 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// A scored candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// ID of the matched item.
    pub id: String,

    /// Cosine similarity to the query.
    pub score: f32,
}

/// Find the `k` candidates most similar to `query`, best first.
///
/// Candidates scoring below `min_score` are dropped. Ties keep the order in
/// which the candidates were supplied.
pub fn find_top_k<'a, I>(
    query: &[f32],
    candidates: I,
    k: usize,
    min_score: f32,
) -> Result<Vec<SimilarityResult>>
where
    I: IntoIterator<Item = (&'a str, &'a [f32])>,
{
    let mut ranked: Vec<(&'a str, OrderedFloat<f32>)> = Vec::new();
    for (id, embedding) in candidates {
        let score = cosine_similarity(query, embedding)?;
        if score >= min_score {
            ranked.push((id, OrderedFloat(score)));
        }
    }

    // Stable, so equal scores keep candidate order.
    ranked.sort_by_key(|(_, score)| std::cmp::Reverse(*score));
    ranked.truncate(k);

    Ok(ranked
        .into_iter()
        .map(|(id, score)| SimilarityResult {
            id: id.to_string(),
            score: score.into_inner(),
        })
        .collect())
}

/// Scale an embedding to unit length in place. Zero vectors are left as is.
pub fn normalize(embedding: &mut [f32]) {
    let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        embedding.iter_mut().for_each(|x| *x /= norm);
    }
}
