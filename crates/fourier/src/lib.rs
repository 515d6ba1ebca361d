#![forbid(unsafe_code)]
#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
#![deny(missing_docs, unused_must_use)]

//! Random Fourier Features.
//!
//! Approximates a Gaussian kernel with a fixed random cosine feature map:
//! `z(x) = sqrt(2 / D) * cos(W x + b)` where `W` is drawn from
//! `Gaussian(0, 1/sigma)` and `b` from `Uniform[0, 2π)`. Parameters are drawn
//! once at construction and never change afterwards.
//!
//! Layout:
//! - `linear.rs` — dense affine layer (`W x + b`), row-major weights
//! - `mapper.rs` — `RandomFourierFeatures`: construction, forward, batches
//! - `kernel.rs` — exact Gaussian kernel and the feature-space estimate
//! - `config.rs` — JSON mapper configuration
//! - `params.rs` — raw f32 parameter files and bincode snapshots
//! - `bin/rff.rs` — CLI mapping stdin vectors to features

use sampling::SamplingError;

/// Error type for feature maps
#[derive(Debug, thiserror::Error)]
pub enum RffError {
    /// A dimension is zero
    #[error("expected {name} >= 1, got {value}")]
    InvalidDimension {
        /// which dimension was rejected
        name: &'static str,
        /// the offending value
        value: usize,
    },
    /// Bandwidth is not strictly positive
    #[error("expected bandwidth > 0, got {0}")]
    InvalidBandwidth(f32),
    /// Input vector length differs from the mapper's input dimension
    #[error("expected input of length {expected}, got {actual}")]
    DimensionMismatch {
        /// required length
        expected: usize,
        /// length supplied
        actual: usize,
    },
    /// Flat batch length is not a multiple of the row length
    #[error("batch of {len} values is not a multiple of row length {row_len}")]
    RaggedBatch {
        /// total number of values supplied
        len: usize,
        /// expected row length
        row_len: usize,
    },
    /// Weight or bias initializer has invalid parameters
    #[error("invalid initializer: {0}")]
    InvalidDistribution(#[from] SamplingError),
    /// A supplied parameter buffer has the wrong number of elements
    #[error("{what} has {actual} elements, expected {expected}")]
    ShapeMismatch {
        /// which buffer
        what: &'static str,
        /// required element count
        expected: usize,
        /// element count supplied
        actual: usize,
    },
    /// Parameter file could not be decoded
    #[error("malformed parameter data: {0}")]
    Format(String),
    /// Configuration could not be parsed
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
    /// Snapshot could not be encoded or decoded
    #[error("snapshot codec error: {0}")]
    Codec(#[from] bincode::Error),
    /// Filesystem failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON configuration for building a mapper.
pub mod config;
/// Exact Gaussian kernel and its random-feature estimate.
pub mod kernel;
/// Dense affine layer.
pub mod linear;
/// The random Fourier feature mapper.
pub mod mapper;
/// Parameter persistence.
pub mod params;

pub use config::MapperConfig;
pub use kernel::gaussian_kernel;
pub use linear::Affine;
pub use mapper::RandomFourierFeatures;
pub use sampling::DistributionSpec;
