//! Vector similarity and brute-force ranking.

use std::cmp::Ordering;
use syllabus_core::error::IndexError;
use syllabus_core::{IndexRecord, MetadataFilter, SearchHit};

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length or empty.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank records by distance (`1 - cosine`) to `query`.
///
/// Only records passing `filter` are considered. The result is ascending by
/// distance, ties broken by record id, truncated to `top_k`.
pub fn rank<'a>(
    records: impl IntoIterator<Item = &'a IndexRecord>,
    query: &[f32],
    top_k: usize,
    filter: Option<&MetadataFilter>,
) -> Result<Vec<SearchHit>, IndexError> {
    if let Some(filter) = filter {
        filter.validate()?;
    }

    let mut hits = Vec::new();
    for record in records {
        if filter.is_some_and(|f| !f.matches(&record.metadata)) {
            continue;
        }
        if record.embedding.len() != query.len() {
            return Err(IndexError::DimensionMismatch {
                expected: record.embedding.len(),
                actual: query.len(),
            });
        }
        hits.push(SearchHit {
            id: record.id.clone(),
            document: record.document.clone(),
            metadata: record.metadata.clone(),
            distance: 1.0 - cosine_similarity(&record.embedding, query),
        });
    }

    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    hits.truncate(top_k);
    Ok(hits)
}
