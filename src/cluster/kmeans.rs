//! K-means relaxation engine.
//!
//! Partitions data into k clusters by alternating assignment and mean
//! updates (Lloyd's algorithm), then scores the partition with a
//! [`Loss`] so runs with different k can be compared.
//!
//! # Lloyd's Algorithm
//!
//! 1. Seed k centroids (random dataset points, or caller-supplied)
//! 2. **Assign**: each point → nearest centroid (first on ties)
//! 3. Stop if no label changed and no cluster is empty. Only k = 1 can stop
//!    on the first pass, keeping its seed as the centroid
//! 4. **Repair**: refill empty clusters from clusters with spare points
//! 5. **Update**: each centroid → mean of its points
//! 6. Repeat, at most `max_iter` times
//!
//! # Empty-Cluster Repair
//!
//! An empty cluster `i` takes one point from the first cluster (by index)
//! that has more than one member; the point moved is the first one in
//! dataset order. The tally is updated after every move, so later empty
//! clusters see earlier repairs. The rule is deterministic for a fixed input
//! order, which keeps seeded runs reproducible.
//!
//! With `k <= R` a donor always exists (pigeonhole), so every returned
//! result has `k` non-empty clusters.
//!
//! # Failure Modes
//!
//! - **Local optima**: random seeding can put two seeds in one true cluster;
//!   the searches in this crate compensate with restarts and split trials
//! - **No convergence**: the loop is bounded by `max_iter`; hitting the bound
//!   is reported as [`Error::ConvergenceFailure`], never as a partial result

use super::traits::Clustering;
use crate::criterion::Loss;
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::vector;
use log::{debug, trace};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::prelude::*;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// How the engine picks its initial centroids.
#[derive(Debug, Clone)]
enum Seeding {
    /// k dataset points drawn uniformly with replacement.
    Random(usize),
    /// Caller-supplied centroids, one per row.
    Centroids(Array2<f64>),
}

/// K-means clustering engine.
#[derive(Debug, Clone)]
pub struct Kmeans {
    seeding: Seeding,
    /// Score reported for the final partition.
    loss: Loss,
    /// Iteration guard.
    max_iter: usize,
    /// Random seed.
    seed: Option<u64>,
}

/// Outcome of a converged k-means run.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringResult {
    labels: Vec<usize>,
    centroids: Array2<f64>,
    score: f64,
    representatives: Vec<usize>,
    iterations: usize,
}

impl ClusteringResult {
    /// Number of clusters.
    pub fn k(&self) -> usize {
        self.centroids.nrows()
    }

    /// Cluster index of every point, in dataset order.
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Final centroids, one per row.
    pub fn centroids(&self) -> ArrayView2<'_, f64> {
        self.centroids.view()
    }

    /// Model score under the engine's loss; higher is better.
    pub fn score(&self) -> f64 {
        self.score
    }

    /// For each centroid, the index of the dataset point closest to it.
    pub fn representatives(&self) -> &[usize] {
        &self.representatives
    }

    /// Number of update steps performed before convergence.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Number of points in every cluster.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.k()];
        for &c in &self.labels {
            sizes[c] += 1;
        }
        sizes
    }

    /// Index of the centroid closest to `point`.
    pub fn predict(&self, point: ArrayView1<'_, f64>) -> usize {
        vector::closest(point, self.centroids.view())
    }

    /// Same partition, different score. Used when a search must demote a
    /// result it keeps around.
    pub(crate) fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }
}

impl Kmeans {
    /// Create an engine that seeds `k` centroids from random dataset points.
    pub fn new(k: usize) -> Self {
        Self {
            seeding: Seeding::Random(k),
            loss: Loss::default(),
            max_iter: 100,
            seed: None,
        }
    }

    /// Create an engine that starts from the given centroids (one per row).
    pub fn from_centroids(centroids: Array2<f64>) -> Self {
        Self {
            seeding: Seeding::Centroids(centroids),
            ..Self::new(0)
        }
    }

    /// Set the score reported for the final partition.
    pub fn with_loss(mut self, loss: Loss) -> Self {
        self.loss = loss;
        self
    }

    /// Set the iteration guard.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Number of clusters this engine will produce.
    pub fn k(&self) -> usize {
        match &self.seeding {
            Seeding::Random(k) => *k,
            Seeding::Centroids(c) => c.nrows(),
        }
    }

    /// Run to convergence, drawing random seeds from the configured seed (or
    /// the thread RNG when none is set).
    pub fn start(&self, data: &Dataset) -> Result<ClusteringResult> {
        match self.seed {
            Some(s) => self.start_with_rng(data, &mut StdRng::seed_from_u64(s)),
            None => self.start_with_rng(data, &mut rand::rng()),
        }
    }

    /// Run to convergence with a caller-supplied random source.
    pub fn start_with_rng<R: Rng>(&self, data: &Dataset, rng: &mut R) -> Result<ClusteringResult> {
        self.validate(data)?;

        let centroids = match &self.seeding {
            Seeding::Random(k) => {
                let picks: Vec<usize> = (0..*k).map(|_| rng.random_range(0..data.len())).collect();
                data.view().select(Axis(0), &picks)
            }
            Seeding::Centroids(c) => c.clone(),
        };

        let mut state = Relaxation::new(data, centroids);
        let iterations = state.run(self.max_iter)?;
        let Relaxation {
            labels, centroids, ..
        } = state;

        let score = self.loss.score(data, &labels, centroids.view())?;
        let representatives = centroids
            .outer_iter()
            .map(|c| vector::closest(c, data.view()))
            .collect();

        trace!(
            "k-means converged: k={} iterations={} {}={:.4}",
            centroids.nrows(),
            iterations,
            self.loss,
            score
        );

        Ok(ClusteringResult {
            labels,
            centroids,
            score,
            representatives,
            iterations,
        })
    }

    fn validate(&self, data: &Dataset) -> Result<()> {
        if self.max_iter == 0 {
            return Err(Error::InvalidParameter {
                name: "max_iter",
                message: "must be > 0",
            });
        }

        let k = self.k();
        if k == 0 {
            return Err(Error::InvalidParameter {
                name: "k",
                message: "must be > 0",
            });
        }

        if let Seeding::Centroids(c) = &self.seeding {
            if c.ncols() != data.dim() {
                return Err(Error::DimensionMismatch {
                    expected: data.dim(),
                    found: c.ncols(),
                });
            }
        }

        if data.len() < self.loss.min_points(k) {
            return Err(Error::InvalidClusterCount {
                requested: k,
                n_items: data.len(),
            });
        }
        Ok(())
    }
}

impl Clustering for Kmeans {
    fn fit_predict(&self, data: &[Vec<f64>]) -> Result<Vec<usize>> {
        let data = Dataset::from_rows(data)?;
        Ok(self.start(&data)?.labels)
    }

    fn n_clusters(&self) -> usize {
        self.k()
    }
}

/// Working buffers of one k-means run. Owned by the run, dropped or turned
/// into a [`ClusteringResult`] when it ends.
struct Relaxation<'a> {
    data: &'a Dataset,
    centroids: Array2<f64>,
    labels: Vec<usize>,
    counts: Vec<usize>,
}

impl<'a> Relaxation<'a> {
    fn new(data: &'a Dataset, centroids: Array2<f64>) -> Self {
        let k = centroids.nrows();
        let mut counts = vec![0usize; k];
        counts[0] = data.len();
        Self {
            data,
            centroids,
            labels: vec![0usize; data.len()],
            counts,
        }
    }

    /// Returns the number of update steps taken.
    fn run(&mut self, max_iter: usize) -> Result<usize> {
        for iter in 0..max_iter {
            if self.assign() {
                return Ok(iter);
            }
            self.repair()?;
            self.update();
        }

        debug!(
            "k-means with k={} over {} points did not converge in {} iterations",
            self.centroids.nrows(),
            self.data.len(),
            max_iter
        );
        Err(Error::ConvergenceFailure {
            iterations: max_iter,
        })
    }

    /// Move every point to its closest centroid.
    ///
    /// Returns true when no label changed and no cluster is empty.
    fn assign(&mut self) -> bool {
        let data = self.data;
        let centroids = self.centroids.view();

        #[cfg(feature = "parallel")]
        let unchanged = self
            .labels
            .par_iter_mut()
            .enumerate()
            .map(|(i, label)| {
                let nearest = vector::closest(data.point(i), centroids);
                let same = *label == nearest;
                *label = nearest;
                same
            })
            .reduce(|| true, |a, b| a && b);

        #[cfg(not(feature = "parallel"))]
        let unchanged = {
            let mut unchanged = true;
            for (i, label) in self.labels.iter_mut().enumerate() {
                let nearest = vector::closest(data.point(i), centroids);
                unchanged &= *label == nearest;
                *label = nearest;
            }
            unchanged
        };

        self.recount();
        unchanged && self.counts.iter().all(|&n| n > 0)
    }

    fn recount(&mut self) {
        self.counts.iter_mut().for_each(|n| *n = 0);
        for &c in &self.labels {
            self.counts[c] += 1;
        }
    }

    /// Give every empty cluster one point from the first cluster that can
    /// spare one.
    fn repair(&mut self) -> Result<()> {
        for empty in 0..self.counts.len() {
            if self.counts[empty] != 0 {
                continue;
            }

            let donor = self.counts.iter().position(|&n| n > 1);
            let moved = donor.and_then(|d| self.labels.iter().position(|&c| c == d));
            let (Some(donor), Some(moved)) = (donor, moved) else {
                return Err(Error::InvalidClusterCount {
                    requested: self.counts.len(),
                    n_items: self.labels.len(),
                });
            };

            trace!("refilling empty cluster {empty} with point {moved} from cluster {donor}");
            self.labels[moved] = empty;
            self.counts[donor] -= 1;
            self.counts[empty] += 1;
        }
        Ok(())
    }

    /// Recompute every centroid as the mean of its points.
    fn update(&mut self) {
        self.centroids.fill(0.0);
        for (i, &c) in self.labels.iter().enumerate() {
            vector::add(self.centroids.row_mut(c), self.data.point(i));
        }
        for (c, &n) in self.counts.iter().enumerate() {
            vector::div(self.centroids.row_mut(c), n as f64);
        }
    }
}
