//! Clustering traits.

use super::kmeans::ClusteringResult;
use crate::error::{Error, Result};

/// Trait for clustering algorithms with a fixed number of clusters.
pub trait Clustering {
    /// Fit the model to data and return cluster assignments.
    ///
    /// Returns a vector of cluster labels, one per input point.
    fn fit_predict(&self, data: &[Vec<f64>]) -> Result<Vec<usize>>;

    /// Get the number of clusters.
    fn n_clusters(&self) -> usize;
}

/// A model search that runs one bounded unit of work per [`step`](Self::step).
///
/// Hosts can interleave steps with other work, report [`progress`](Self::progress)
/// between them, or stop early by simply not stepping again.
pub trait ModelSearch {
    /// Advance the search by one unit of work. A no-op once done.
    fn step(&mut self) -> Result<()>;

    /// True once further steps cannot change the outcome.
    fn is_done(&self) -> bool;

    /// Rough completion percentage. Not guaranteed to end at exactly 100.
    fn progress(&self) -> f64;

    /// The model the search currently selects, if any.
    fn result(&self) -> Option<&ClusteringResult>;

    /// Step until done and return the selected model.
    fn run(&mut self) -> Result<&ClusteringResult> {
        while !self.is_done() {
            self.step()?;
        }
        self.result().ok_or(Error::NoViableModel)
    }
}
