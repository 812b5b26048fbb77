//! Vector similarity helpers used by deduplication.

use thiserror::Error;

/// Errors raised when comparing vectors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimilarityError {
    #[error("Vector dimension mismatch: {left} != {right}")]
    DimensionMismatch { left: usize, right: usize },
}

fn check_dimensions(a: &[f32], b: &[f32]) -> Result<(), SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(())
}

/// Cosine similarity in [-1, 1].
///
/// Returns 0 when either vector has zero norm. Accumulates in f64 so long
/// embeddings don't lose precision.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, SimilarityError> {
    check_dimensions(a, b)?;

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0))
}

/// Euclidean (L2) distance
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Result<f64, SimilarityError> {
    check_dimensions(a, b)?;

    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = f64::from(*x) - f64::from(*y);
            diff * diff
        })
        .sum();

    Ok(sum.sqrt())
}

/// Map a non-negative distance onto (0, 1]
pub fn distance_to_similarity(distance: f64) -> f64 {
    1.0 / (1.0 + distance)
}
