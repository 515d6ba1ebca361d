#![forbid(unsafe_code)]

use std::path::Path;

use sampling::DistributionSpec;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::mapper::check_bandwidth;
use crate::RffError;

/// Layer name used when none is configured.
pub const DEFAULT_NAME: &str = "random_fourier_features";

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

/// Mapper configuration, usually read from JSON:
///
/// ```json
/// { "input_dims": 4, "output_dims": 64, "sigma": 1.0, "seed": 42 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapperConfig {
    /// layer name; parameters are called `<name>_w` and `<name>_b`
    #[serde(default = "default_name")]
    pub name: String,
    /// input vector length (>= 1)
    pub input_dims: usize,
    /// number of random features (>= 1)
    pub output_dims: usize,
    /// Gaussian kernel bandwidth (> 0)
    pub sigma: f32,
    /// generator seed; `None` draws a seed from the OS
    #[serde(default)]
    pub seed: Option<u64>,
    /// weight initializer override
    #[serde(default)]
    pub weight_init: Option<DistributionSpec>,
    /// bias initializer override
    #[serde(default)]
    pub bias_init: Option<DistributionSpec>,
}

impl MapperConfig {
    /// Config with default name, initializers and an unset seed.
    pub fn new(input_dims: usize, output_dims: usize, sigma: f32) -> Self {
        Self {
            name: default_name(),
            input_dims,
            output_dims,
            sigma,
            seed: None,
            weight_init: None,
            bias_init: None,
        }
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(s: &str) -> Result<Self, RffError> {
        let cfg: MapperConfig = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RffError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let cfg = Self::from_json_str(&text)?;
        info!(path = %path.as_ref().display(), name = %cfg.name, "loaded mapper config");
        Ok(cfg)
    }

    /// Same checks construction performs, without drawing any samples.
    pub fn validate(&self) -> Result<(), RffError> {
        if self.input_dims == 0 {
            return Err(RffError::InvalidDimension {
                name: "input_dims",
                value: self.input_dims,
            });
        }
        if self.output_dims == 0 {
            return Err(RffError::InvalidDimension {
                name: "output_dims",
                value: self.output_dims,
            });
        }
        check_bandwidth(self.sigma)?;
        if let Some(spec) = &self.weight_init {
            spec.validate()?;
        }
        if let Some(spec) = &self.bias_init {
            spec.validate()?;
        }
        Ok(())
    }
}
