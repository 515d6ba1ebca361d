#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::RffError;

/// Dense affine layer: out = W * in + b
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Affine {
    in_dim: usize,
    out_dim: usize,
    /// weights in row-major order: out_dim x in_dim
    weights: Vec<f32>,
    /// bias vector of length out_dim
    bias: Vec<f32>,
}

impl Affine {
    /// Build a layer from a row-major weight buffer and a bias vector.
    ///
    /// Both buffers must match the declared shape exactly.
    pub fn from_parts(
        in_dim: usize,
        out_dim: usize,
        weights: Vec<f32>,
        bias: Vec<f32>,
    ) -> Result<Self, RffError> {
        if in_dim == 0 {
            return Err(RffError::InvalidDimension {
                name: "input_dims",
                value: in_dim,
            });
        }
        if out_dim == 0 {
            return Err(RffError::InvalidDimension {
                name: "output_dims",
                value: out_dim,
            });
        }
        let expected = out_dim
            .checked_mul(in_dim)
            .ok_or(RffError::InvalidDimension {
                name: "output_dims",
                value: out_dim,
            })?;
        if weights.len() != expected {
            return Err(RffError::ShapeMismatch {
                what: "weights",
                expected,
                actual: weights.len(),
            });
        }
        if bias.len() != out_dim {
            return Err(RffError::ShapeMismatch {
                what: "bias",
                expected: out_dim,
                actual: bias.len(),
            });
        }
        Ok(Self {
            in_dim,
            out_dim,
            weights,
            bias,
        })
    }

    /// Forward pass for a single input vector
    pub fn forward(&self, input: &[f32]) -> Result<Vec<f32>, RffError> {
        let mut out = vec![0.0_f32; self.out_dim];
        self.forward_into(input, &mut out)?;
        Ok(out)
    }

    /// Forward pass writing into a caller-provided buffer of length `out_dim`.
    pub fn forward_into(&self, input: &[f32], out: &mut [f32]) -> Result<(), RffError> {
        if input.len() != self.in_dim {
            return Err(RffError::DimensionMismatch {
                expected: self.in_dim,
                actual: input.len(),
            });
        }
        if out.len() != self.out_dim {
            return Err(RffError::ShapeMismatch {
                what: "output",
                expected: self.out_dim,
                actual: out.len(),
            });
        }
        let rows = self.weights.chunks_exact(self.in_dim).zip(self.bias.iter());
        for (slot, (row, &b)) in out.iter_mut().zip(rows) {
            let dot = row
                .iter()
                .zip(input.iter())
                .map(|(w, x)| w * x)
                .sum::<f32>();
            *slot = dot + b;
        }
        Ok(())
    }

    /// input dimension
    pub fn input_dims(&self) -> usize {
        self.in_dim
    }

    /// output dimension
    pub fn output_dims(&self) -> usize {
        self.out_dim
    }

    /// Row-major weights, `output_dims * input_dims` values.
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Bias vector, `output_dims` values.
    pub fn bias(&self) -> &[f32] {
        &self.bias
    }

    /// Weight row `i`, or `None` past the last row.
    pub fn row(&self, i: usize) -> Option<&[f32]> {
        self.weights.chunks_exact(self.in_dim).nth(i)
    }

    /// Give back the owned weight and bias buffers.
    pub fn into_parts(self) -> (Vec<f32>, Vec<f32>) {
        (self.weights, self.bias)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn forward_matches_hand_computation() {
        // W = [[1, 2], [3, 4], [0, -1]], b = [0.5, -1, 2]
        let weights = vec![1.0, 2.0, 3.0, 4.0, 0.0, -1.0];
        let layer = Affine::from_parts(2, 3, weights, vec![0.5, -1.0, 2.0]).unwrap();
        let out = layer.forward(&[1.0, -1.0]).unwrap();
        assert_eq!(out, vec![-0.5, -2.0, 3.0]);
    }

    #[test]
    fn rejects_wrong_buffers() {
        assert!(matches!(
            Affine::from_parts(2, 2, vec![0.0; 3], vec![0.0; 2]),
            Err(RffError::ShapeMismatch { what: "weights", expected: 4, actual: 3 })
        ));
        assert!(matches!(
            Affine::from_parts(2, 2, vec![0.0; 4], vec![0.0; 1]),
            Err(RffError::ShapeMismatch { what: "bias", expected: 2, actual: 1 })
        ));
        assert!(matches!(
            Affine::from_parts(0, 2, vec![], vec![0.0; 2]),
            Err(RffError::InvalidDimension { name: "input_dims", value: 0 })
        ));
    }

    #[test]
    fn forward_checks_input_length() {
        let layer = Affine::from_parts(3, 1, vec![1.0; 3], vec![0.0]).unwrap();
        assert!(matches!(
            layer.forward(&[1.0, 2.0]),
            Err(RffError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn rows_are_row_major() {
        let layer = Affine::from_parts(2, 2, vec![1.0, 2.0, 3.0, 4.0], vec![0.0, 0.0]).unwrap();
        assert_eq!(layer.row(1), Some(&[3.0, 4.0][..]));
        assert_eq!(layer.row(2), None);
    }
}
