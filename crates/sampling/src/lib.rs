#![forbid(unsafe_code)]
#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
#![deny(missing_docs, unused_must_use)]

//! Distribution specs for filling fixed random parameters.
//!
//! A `DistributionSpec` names one of the two initializers a random feature map
//! needs (Gaussian and Uniform) together with its parameters. Filling is
//! deterministic: the same spec, length and generator state always produce the
//! same buffer.

use rand::distributions::{Distribution, Uniform};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

/// Error type for distribution parameters
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum SamplingError {
    /// Gaussian standard deviation is negative or not finite
    #[error("invalid standard deviation {0}, expected a finite value >= 0")]
    InvalidStd(f32),
    /// Uniform bounds are not finite, `min >= max`, or `max - min` overflows
    #[error("invalid uniform range [{min}, {max}), expected finite min < max with finite width")]
    InvalidRange {
        /// lower bound (inclusive)
        min: f32,
        /// upper bound (exclusive)
        max: f32,
    },
    /// A location parameter is NaN or infinite
    #[error("non-finite distribution parameter {0}")]
    NonFiniteParameter(f32),
}

/// Description of a random distribution used to fill a parameter tensor once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DistributionSpec {
    /// Normal distribution with the given mean and standard deviation.
    Gaussian {
        /// mean of the distribution
        mean: f32,
        /// standard deviation (>= 0)
        std: f32,
    },
    /// Uniform distribution over the half-open interval `[min, max)`.
    Uniform {
        /// inclusive lower bound
        min: f32,
        /// exclusive upper bound
        max: f32,
    },
}

impl DistributionSpec {
    /// Gaussian spec. Not validated until `validate` or `fill`.
    pub fn gaussian(mean: f32, std: f32) -> Self {
        DistributionSpec::Gaussian { mean, std }
    }

    /// Uniform spec over `[min, max)`. Not validated until `validate` or `fill`.
    pub fn uniform(min: f32, max: f32) -> Self {
        DistributionSpec::Uniform { min, max }
    }

    /// Name of the fill operator this spec stands for, used in log output.
    pub fn op_name(&self) -> &'static str {
        match self {
            DistributionSpec::Gaussian { .. } => "GaussianFill",
            DistributionSpec::Uniform { .. } => "UniformFill",
        }
    }

    /// Check the parameters without drawing any samples.
    pub fn validate(&self) -> Result<(), SamplingError> {
        match *self {
            DistributionSpec::Gaussian { mean, std } => {
                if !mean.is_finite() {
                    return Err(SamplingError::NonFiniteParameter(mean));
                }
                // NaN fails the comparison as well
                if !std.is_finite() || !(std >= 0.0) {
                    return Err(SamplingError::InvalidStd(std));
                }
                Ok(())
            }
            DistributionSpec::Uniform { min, max } => {
                if !min.is_finite() || !max.is_finite() || !(min < max) {
                    return Err(SamplingError::InvalidRange { min, max });
                }
                // the sampler scales by the width, which must itself be representable
                if !(max - min).is_finite() {
                    return Err(SamplingError::InvalidRange { min, max });
                }
                Ok(())
            }
        }
    }

    /// Draw `len` independent samples, in order, from `rng`.
    ///
    /// Parameters are validated first, so an invalid spec consumes no randomness.
    pub fn fill<R: Rng + ?Sized>(
        &self,
        len: usize,
        rng: &mut R,
    ) -> Result<Vec<f32>, SamplingError> {
        self.validate()?;
        let mut out = Vec::with_capacity(len);
        match *self {
            DistributionSpec::Gaussian { mean, std } => {
                let normal =
                    Normal::new(mean, std).map_err(|_| SamplingError::InvalidStd(std))?;
                for _ in 0..len {
                    out.push(normal.sample(rng));
                }
            }
            DistributionSpec::Uniform { min, max } => {
                let uniform = Uniform::new(min, max);
                for _ in 0..len {
                    out.push(uniform.sample(rng));
                }
            }
        }
        Ok(out)
    }
}

/// Seeded ChaCha8 generator; identical seeds give identical streams.
pub fn make_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// ChaCha8 generator seeded from the operating system.
pub fn entropy_rng() -> ChaCha8Rng {
    ChaCha8Rng::from_entropy()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn gaussian_fill_is_deterministic_per_seed() {
        let spec = DistributionSpec::gaussian(0.0, 1.0);
        let a = spec.fill(64, &mut make_rng(7));
        let b = spec.fill(64, &mut make_rng(7));
        assert_eq!(a, b);
        assert_eq!(a.map(|v| v.len()), Ok(64));
    }

    #[test]
    fn different_seeds_differ() {
        let spec = DistributionSpec::uniform(0.0, 1.0);
        let a = spec.fill(16, &mut make_rng(1));
        let b = spec.fill(16, &mut make_rng(2));
        assert_ne!(a, b);
    }

    #[test]
    fn zero_std_gives_the_mean() {
        let spec = DistributionSpec::gaussian(1.5, 0.0);
        let out = spec.fill(8, &mut make_rng(3));
        assert_eq!(out, Ok(vec![1.5; 8]));
    }

    #[test]
    fn rejects_bad_parameters() {
        assert_eq!(
            DistributionSpec::gaussian(0.0, -1.0).validate(),
            Err(SamplingError::InvalidStd(-1.0))
        );
        assert!(matches!(
            DistributionSpec::gaussian(0.0, f32::NAN).validate(),
            Err(SamplingError::InvalidStd(_))
        ));
        assert!(matches!(
            DistributionSpec::gaussian(f32::INFINITY, 1.0).validate(),
            Err(SamplingError::NonFiniteParameter(_))
        ));
        assert_eq!(
            DistributionSpec::uniform(1.0, 1.0).validate(),
            Err(SamplingError::InvalidRange {
                min: 1.0,
                max: 1.0
            })
        );
        assert!(DistributionSpec::uniform(0.0, f32::INFINITY)
            .fill(4, &mut make_rng(0))
            .is_err());
    }

    #[test]
    fn uniform_width_overflow_is_an_error() {
        let spec = DistributionSpec::uniform(-3.0e38, 3.0e38);
        assert_eq!(
            spec.validate(),
            Err(SamplingError::InvalidRange {
                min: -3.0e38,
                max: 3.0e38
            })
        );
        assert!(spec.fill(4, &mut make_rng(0)).is_err());
        // the widest representable range is still accepted
        assert!(DistributionSpec::uniform(-1.0e38, 1.0e38).validate().is_ok());
    }

    #[test]
    fn gaussian_moments_are_close() {
        let out = DistributionSpec::gaussian(2.0, 0.5)
            .fill(20_000, &mut make_rng(11))
            .unwrap();
        let n = out.len() as f64;
        let mean = out.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = out.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
        assert!((mean - 2.0).abs() < 0.02, "mean {mean}");
        assert!((var.sqrt() - 0.5).abs() < 0.02, "std {}", var.sqrt());
    }

    #[test]
    fn serde_uses_kind_tag() {
        let spec: DistributionSpec =
            serde_json::from_str(r#"{"kind":"uniform","min":0.0,"max":2.0}"#).unwrap();
        assert_eq!(spec, DistributionSpec::uniform(0.0, 2.0));
        assert_eq!(spec.op_name(), "UniformFill");
        let json = serde_json::to_string(&DistributionSpec::gaussian(0.0, 1.0)).unwrap();
        assert!(json.contains(r#""kind":"gaussian""#), "{json}");
    }

    quickcheck::quickcheck! {
        fn uniform_samples_stay_in_range(seed: u64) -> bool {
            let spec = DistributionSpec::uniform(-0.5, 3.0);
            match spec.fill(256, &mut make_rng(seed)) {
                Ok(v) => v.iter().all(|x| (-0.5..3.0).contains(x)),
                Err(_) => false,
            }
        }
    }

    proptest! {
        #[test]
        fn fill_length_matches_request(len in 0usize..512, seed in any::<u64>()) {
            let out = DistributionSpec::gaussian(0.0, 1.0).fill(len, &mut make_rng(seed));
            prop_assert_eq!(out.map(|v| v.len()), Ok(len));
        }
    }
}
