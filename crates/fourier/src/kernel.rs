#![forbid(unsafe_code)]

use crate::RffError;

/// Exact Gaussian kernel `exp(-||x - y||² / (2 sigma²))`.
pub fn gaussian_kernel(x: &[f32], y: &[f32], sigma: f32) -> Result<f32, RffError> {
    if !(sigma > 0.0) {
        return Err(RffError::InvalidBandwidth(sigma));
    }
    if x.len() != y.len() {
        return Err(RffError::DimensionMismatch {
            expected: x.len(),
            actual: y.len(),
        });
    }
    let sq = x
        .iter()
        .zip(y.iter())
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f32>();
    Ok((-sq / (2.0 * sigma * sigma)).exp())
}
