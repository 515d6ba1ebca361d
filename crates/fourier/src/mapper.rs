#![forbid(unsafe_code)]

use std::f32::consts::PI;

use rand::Rng;
use rayon::prelude::*;
use sampling::{entropy_rng, make_rng, DistributionSpec};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{MapperConfig, DEFAULT_NAME};
use crate::linear::Affine;
use crate::RffError;

/// Random Fourier feature map `z(x) = sqrt(2 / D) * cos(W x + b)`.
///
/// `W` (`output_dims x input_dims`) and `b` (`output_dims`) are fixed at
/// construction. Every method takes `&self`, so a built mapper can be shared
/// across threads and called concurrently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomFourierFeatures {
    name: String,
    /// bandwidth the weights were drawn with; `None` for injected parameters
    sigma: Option<f32>,
    affine: Affine,
}

/// Default weight initializer for bandwidth `sigma`: Gaussian(0, 1/sigma).
pub fn default_weight_init(sigma: f32) -> DistributionSpec {
    DistributionSpec::gaussian(0.0, 1.0 / sigma)
}

/// Reject a bandwidth that is not strictly positive or whose reciprocal is
/// not a finite f32. The smallest accepted value is roughly `1 / f32::MAX`
/// (about `2.9e-39`).
pub(crate) fn check_bandwidth(sigma: f32) -> Result<(), RffError> {
    if !(sigma > 0.0) || !(1.0 / sigma).is_finite() {
        return Err(RffError::InvalidBandwidth(sigma));
    }
    Ok(())
}

/// Default bias initializer: Uniform[0, 2π).
pub fn default_bias_init() -> DistributionSpec {
    DistributionSpec::uniform(0.0, 2.0 * PI)
}

impl RandomFourierFeatures {
    /// Validate the shape and bandwidth, then draw `W` and `b` from `rng`.
    ///
    /// `W` is filled row-major first, then `b`, both from the same generator.
    /// Missing initializers fall back to `default_weight_init(sigma)` and
    /// `default_bias_init()`. Override specs are checked before any sampling.
    pub fn new<R: Rng + ?Sized>(
        input_dims: usize,
        output_dims: usize,
        sigma: f32,
        weight_init: Option<DistributionSpec>,
        bias_init: Option<DistributionSpec>,
        rng: &mut R,
    ) -> Result<Self, RffError> {
        Self::generate(
            DEFAULT_NAME,
            input_dims,
            output_dims,
            sigma,
            weight_init,
            bias_init,
            rng,
        )
    }

    fn generate<R: Rng + ?Sized>(
        name: &str,
        input_dims: usize,
        output_dims: usize,
        sigma: f32,
        weight_init: Option<DistributionSpec>,
        bias_init: Option<DistributionSpec>,
        rng: &mut R,
    ) -> Result<Self, RffError> {
        if input_dims == 0 {
            return Err(RffError::InvalidDimension {
                name: "input_dims",
                value: input_dims,
            });
        }
        if output_dims == 0 {
            return Err(RffError::InvalidDimension {
                name: "output_dims",
                value: output_dims,
            });
        }
        check_bandwidth(sigma)?;
        let weight_init = weight_init.unwrap_or_else(|| default_weight_init(sigma));
        let bias_init = bias_init.unwrap_or_else(default_bias_init);
        weight_init.validate()?;
        bias_init.validate()?;

        let len = output_dims
            .checked_mul(input_dims)
            .ok_or(RffError::InvalidDimension {
                name: "output_dims",
                value: output_dims,
            })?;
        debug!(
            param = %format!("{name}_w"),
            op = weight_init.op_name(),
            rows = output_dims,
            cols = input_dims,
            "initializing weights"
        );
        let weights = weight_init.fill(len, rng)?;
        debug!(
            param = %format!("{name}_b"),
            op = bias_init.op_name(),
            len = output_dims,
            "initializing bias"
        );
        let bias = bias_init.fill(output_dims, rng)?;

        let affine = Affine::from_parts(input_dims, output_dims, weights, bias)?;
        Ok(Self {
            name: name.to_string(),
            sigma: Some(sigma),
            affine,
        })
    }

    /// Default initializers drawn from a ChaCha8 generator seeded with `seed`.
    pub fn with_seed(
        input_dims: usize,
        output_dims: usize,
        sigma: f32,
        seed: u64,
    ) -> Result<Self, RffError> {
        Self::new(input_dims, output_dims, sigma, None, None, &mut make_rng(seed))
    }

    /// Build from a config; an absent seed means an entropy-seeded generator.
    pub fn from_config(cfg: &MapperConfig) -> Result<Self, RffError> {
        let mut rng = match cfg.seed {
            Some(seed) => make_rng(seed),
            None => entropy_rng(),
        };
        Self::generate(
            &cfg.name,
            cfg.input_dims,
            cfg.output_dims,
            cfg.sigma,
            cfg.weight_init,
            cfg.bias_init,
            &mut rng,
        )
    }

    /// Use pre-supplied parameters instead of sampling them.
    ///
    /// `weights` is row-major with `bias.len()` rows of `input_dims` values.
    pub fn from_params(
        input_dims: usize,
        weights: Vec<f32>,
        bias: Vec<f32>,
    ) -> Result<Self, RffError> {
        let output_dims = bias.len();
        let affine = Affine::from_parts(input_dims, output_dims, weights, bias)?;
        Ok(Self {
            name: DEFAULT_NAME.to_string(),
            sigma: None,
            affine,
        })
    }

    /// Rename the mapper; the name only shows up in logs and parameter names.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Map one input vector to its features.
    pub fn forward(&self, x: &[f32]) -> Result<Vec<f32>, RffError> {
        let mut out = vec![0.0_f32; self.affine.output_dims()];
        self.forward_into(x, &mut out)?;
        Ok(out)
    }

    fn forward_into(&self, x: &[f32], out: &mut [f32]) -> Result<(), RffError> {
        self.affine.forward_into(x, out)?;
        let scale = self.scale();
        for v in out.iter_mut() {
            *v = scale * v.cos();
        }
        Ok(())
    }

    /// Map each row independently, in parallel. Output order follows input order.
    ///
    /// Row lengths are checked up front; on failure the error names the first
    /// bad row's length and nothing is computed.
    pub fn forward_batch<V>(&self, rows: &[V]) -> Result<Vec<Vec<f32>>, RffError>
    where
        V: AsRef<[f32]> + Sync,
    {
        let expected = self.input_dims();
        let mut lens = rows.iter().map(|r| r.as_ref().len());
        if let Some(bad) = lens.find(|&n| n != expected) {
            return Err(RffError::DimensionMismatch { expected, actual: bad });
        }
        rows.par_iter().map(|r| self.forward(r.as_ref())).collect()
    }

    /// Map a row-major `n x input_dims` buffer to a row-major `n x output_dims` one.
    pub fn forward_flat(&self, data: &[f32]) -> Result<Vec<f32>, RffError> {
        let (d_in, d_out) = (self.input_dims(), self.output_dims());
        if data.len() % d_in != 0 {
            return Err(RffError::RaggedBatch {
                len: data.len(),
                row_len: d_in,
            });
        }
        let mut out = vec![0.0_f32; data.len() / d_in * d_out];
        out.par_chunks_mut(d_out)
            .zip(data.par_chunks(d_in))
            .try_for_each(|(dst, row)| self.forward_into(row, dst))?;
        Ok(out)
    }

    /// Random-feature estimate of the Gaussian kernel: `z(x) · z(y)`.
    pub fn approximate_kernel(&self, x: &[f32], y: &[f32]) -> Result<f32, RffError> {
        let zx = self.forward(x)?;
        let zy = self.forward(y)?;
        Ok(zx.iter().zip(zy.iter()).map(|(a, b)| a * b).sum())
    }

    /// Output scale `sqrt(2 / output_dims)`.
    pub fn scale(&self) -> f32 {
        (2.0 / self.affine.output_dims() as f32).sqrt()
    }

    /// input dimension `d`
    pub fn input_dims(&self) -> usize {
        self.affine.input_dims()
    }

    /// output dimension `D`
    pub fn output_dims(&self) -> usize {
        self.affine.output_dims()
    }

    /// Bandwidth used to draw the weights, if they were drawn here.
    pub fn sigma(&self) -> Option<f32> {
        self.sigma
    }

    /// Layer name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Row-major weight matrix `W`.
    pub fn weights(&self) -> &[f32] {
        self.affine.weights()
    }

    /// Phase vector `b`.
    pub fn bias(&self) -> &[f32] {
        self.affine.bias()
    }

    /// The underlying affine layer.
    pub fn affine(&self) -> &Affine {
        &self.affine
    }

    pub(crate) fn into_affine(self) -> (String, Option<f32>, Affine) {
        (self.name, self.sigma, self.affine)
    }

    pub(crate) fn from_affine(name: String, sigma: Option<f32>, affine: Affine) -> Self {
        Self {
            name,
            sigma,
            affine,
        }
    }
}
