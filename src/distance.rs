use simsimd::SpatialSimilarity;

/// Computes the squared Euclidean distance between two vectors.
///
/// Falls back to a plain pairwise sum when SIMD intrinsics are
/// unavailable for the target, matching `simsimd`'s own fallback shape.
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    match f32::sqeuclidean(a, b) {
        Some(dist) => dist as f32,
        None => a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum(),
    }
}
