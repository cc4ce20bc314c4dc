//! # xmeans
//!
//! K-means clustering that picks k for you.
//!
//! - [`Kmeans`]: Lloyd relaxation with deterministic empty-cluster repair,
//!   scored by BIC, AIC or MSE
//! - [`KmeansOptimizer`]: sweep k with random restarts, choose by elbow or
//!   best score
//! - [`XMeans`]: grow k by per-cluster split tests
//!
//! All randomness comes from a caller-controllable [`rand::Rng`], so seeded
//! runs are reproducible.

pub mod cluster;
pub mod criterion;
mod dataset;
/// Error types used across `xmeans`.
pub mod error;
pub mod vector;


pub use cluster::{
    Clustering, ClusteringResult, Kmeans, KmeansOptimizer, ModelSearch, OptimizerState, Selector,
    XMeans, XMeansState,
};
pub use criterion::{aic, bic, log_likelihood, mse_score, pooled_variance, Loss};
pub use dataset::Dataset;
pub use error::{Error, Result};
