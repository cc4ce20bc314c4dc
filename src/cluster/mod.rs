//! Clustering with an automatically chosen number of clusters.
//!
//! ## Algorithms
//!
//! ### K-means ([`Kmeans`])
//!
//! The classic algorithm: assign each point to the nearest centroid, then
//! update centroids to the mean of their points. Repeat.
//!
//! ```text
//! J = Σ_k Σ_{x ∈ C_k} ||x - μ_k||²
//! ```
//!
//! Every run also reports a model score (BIC, AIC or MSE, see
//! [`crate::criterion`]) so runs with different k can be compared.
//!
//! ### K sweep ([`KmeansOptimizer`])
//!
//! Try every k in `2..=max_k` with several random restarts, then pick k by
//! the elbow of the score curve or by the best score.
//!
//! **When to use**: small `max_k`, and you want to see the whole score curve.
//!
//! ### X-means ([`XMeans`])
//!
//! Grow k from `min_k` by asking each cluster whether two children explain
//! its points better than one. Only clusters that benefit are split, so the
//! cost tracks the structure actually present.
//!
//! **When to use**: k is unknown and possibly large, clusters are roughly
//! spherical.
//!
//! ## Stepwise Searches
//!
//! Both searches implement [`ModelSearch`]: each `step()` does a bounded
//! amount of work, so a host can report `progress()` or stop early.
//!
//! ## Usage
//!
//! ```rust
//! use xmeans::cluster::{ModelSearch, XMeans};
//! use xmeans::Dataset;
//!
//! let mut rows = Vec::new();
//! for (cx, cy) in [(0.0, 0.0), (10.0, 10.0)] {
//!     for i in 0..5 {
//!         for j in 0..5 {
//!             rows.push(vec![cx + i as f64 * 0.2, cy + j as f64 * 0.2]);
//!         }
//!     }
//! }
//! let data = Dataset::from_rows(&rows).unwrap();
//!
//! let mut search = XMeans::new(1, 8).with_split_tries(4).with_seed(42).start(&data).unwrap();
//! while !search.is_done() {
//!     search.step().unwrap();
//! }
//! let best = search.result().unwrap();
//! assert_eq!(best.labels().len(), rows.len());
//! ```

mod kmeans;
mod optimizer;
mod traits;
mod xmeans;

pub use kmeans::{ClusteringResult, Kmeans};
pub use optimizer::{KmeansOptimizer, OptimizerState, Selector};
pub use traits::{Clustering, ModelSearch};
pub use xmeans::{XMeans, XMeansState};
