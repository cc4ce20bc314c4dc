//! X-means: growing k by local split tests.
//!
//! Starts from k-means with `min_k` clusters and repeatedly asks every
//! cluster whether two children describe its points better than one parent
//! (Pelleg & Moore, 2000).
//!
//! # One Pass
//!
//! For every current centroid c with member points P:
//!
//! 1. **Parent**: score k-means with the single centroid c on P
//! 2. **Children**: `split_tries` times, seed two centroids at `c ± u` for a
//!    random unit vector u and run 2-means on P; keep the best converged run
//! 3. Keep c if `parent >= children`, otherwise replace it by the children
//!
//! Then k-means runs once more on the whole dataset, seeded with the new
//! centroid list. The search stops when a pass changes nothing.
//!
//! The score is local (P only), so each test is cheap and independent of
//! how the rest of the data is clustered.
//!
//! # Budget
//!
//! Before each split test the centroids accepted so far in the pass are
//! counted; once that count exceeds `max_k`, testing stops and the untested
//! centroids are carried over unchanged. A pass never drops a centroid, so k
//! never shrinks, and a split needs at least `loss.min_points(2)` members,
//! so k stays scorable on the full dataset.
//!
//! # Failure Modes
//!
//! - **Tiny clusters**: clusters with fewer points than the loss needs to
//!   score two children are never split
//! - **Unlucky directions**: a split direction that cuts across the real
//!   structure converges to a poor 2-means; more `split_tries` help
//! - **Non-convergence**: failed split trials are discarded (and counted),
//!   a failed full re-run ends the search with the previous partition

use super::kmeans::{ClusteringResult, Kmeans};
use super::traits::ModelSearch;
use crate::criterion::Loss;
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::vector;
use log::{debug, trace};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::prelude::*;

/// X-means configuration.
#[derive(Debug, Clone)]
pub struct XMeans {
    /// Clusters of the initial k-means run.
    min_k: usize,
    /// Centroid budget.
    max_k: usize,
    loss: Loss,
    /// Split trials per cluster; `None` means `ceil(dim / 2)`.
    split_tries: Option<usize>,
    /// Iteration guard of every k-means run.
    max_iter: usize,
    /// Random seed.
    seed: Option<u64>,
}

impl XMeans {
    /// Search k upward from `min_k`; `max_k` stops split testing within a pass.
    pub fn new(min_k: usize, max_k: usize) -> Self {
        Self {
            min_k,
            max_k,
            loss: Loss::Aic,
            split_tries: None,
            max_iter: 100,
            seed: None,
        }
    }

    /// Set the score used for split decisions and for picking the best pass.
    pub fn with_loss(mut self, loss: Loss) -> Self {
        self.loss = loss;
        self
    }

    /// Set the number of random split directions tried per cluster.
    pub fn with_split_tries(mut self, tries: usize) -> Self {
        self.split_tries = Some(tries);
        self
    }

    /// Set the iteration guard of every k-means run.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate, run the initial k-means and return the stepwise search.
    pub fn start<'a>(&self, data: &'a Dataset) -> Result<XMeansState<'a, StdRng>> {
        let rng = match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        self.start_with_rng(data, rng)
    }

    /// Like [`start`](Self::start), drawing all randomness from `rng`.
    pub fn start_with_rng<'a, R: Rng>(
        &self,
        data: &'a Dataset,
        mut rng: R,
    ) -> Result<XMeansState<'a, R>> {
        if self.min_k == 0 {
            return Err(Error::InvalidParameter {
                name: "min_k",
                message: "must be > 0",
            });
        }
        if self.max_k < self.min_k {
            return Err(Error::InvalidParameter {
                name: "max_k",
                message: "must be >= min_k",
            });
        }
        if self.split_tries == Some(0) {
            return Err(Error::InvalidParameter {
                name: "split_tries",
                message: "must be > 0",
            });
        }

        let initial = Kmeans::new(self.min_k)
            .with_loss(self.loss)
            .with_max_iter(self.max_iter)
            .start_with_rng(data, &mut rng)?;
        debug!(
            "x-means start: k={} {}={:.4}",
            initial.k(),
            self.loss,
            initial.score()
        );

        Ok(XMeansState {
            split_tries: self.split_tries.unwrap_or_else(|| data.dim().div_ceil(2)),
            config: self.clone(),
            data,
            rng,
            best: initial.clone(),
            prev: initial,
            done: false,
            passes: 0,
            failed_split_trials: 0,
        })
    }
}

/// An X-means search in progress. Produced by [`XMeans::start`].
#[derive(Debug)]
pub struct XMeansState<'a, R> {
    config: XMeans,
    split_tries: usize,
    data: &'a Dataset,
    rng: R,
    /// Highest-scoring result of any pass.
    best: ClusteringResult,
    /// Result of the last pass; its centroids are the current frontier.
    prev: ClusteringResult,
    done: bool,
    passes: usize,
    failed_split_trials: usize,
}

impl<R: Rng> XMeansState<'_, R> {
    /// Current centroids, one per row.
    pub fn centroids(&self) -> ArrayView2<'_, f64> {
        self.prev.centroids()
    }

    /// Result of the most recent pass (the initial run before any step).
    pub fn previous(&self) -> &ClusteringResult {
        &self.prev
    }

    /// Number of completed passes.
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Split trials discarded because they did not converge.
    pub fn failed_split_trials(&self) -> usize {
        self.failed_split_trials
    }

    /// Split trials run per cluster.
    pub fn split_tries(&self) -> usize {
        self.split_tries
    }

    fn engine(&self, centroids: Array2<f64>) -> Kmeans {
        Kmeans::from_centroids(centroids)
            .with_loss(self.config.loss)
            .with_max_iter(self.config.max_iter)
    }

    /// Split test for one cluster. Returns the two child centroids when
    /// splitting scores strictly better than the parent.
    fn split_test(
        &mut self,
        cid: usize,
        parent: ArrayView1<'_, f64>,
        members: &[usize],
    ) -> Result<Option<Array2<f64>>> {
        if members.len() < self.config.loss.min_points(2) {
            trace!("cluster {cid}: {} points, too few to split", members.len());
            return Ok(None);
        }

        let subset = self.data.subset(members)?;
        let parent_score = self
            .engine(parent.to_owned().insert_axis(Axis(0)))
            .start_with_rng(&subset, &mut self.rng)?
            .score();

        let dim = subset.dim();
        let mut best: Option<ClusteringResult> = None;
        for _ in 0..self.split_tries {
            let offset = vector::random_unit(dim, &mut self.rng);
            let mut children = Array2::zeros((2, dim));
            children.row_mut(0).assign(&parent);
            vector::add(children.row_mut(0), offset.view());
            children.row_mut(1).assign(&parent);
            vector::sub(children.row_mut(1), offset.view());

            match self.engine(children).start_with_rng(&subset, &mut self.rng) {
                Ok(res) => {
                    if best.as_ref().map_or(true, |b| res.score() > b.score()) {
                        best = Some(res);
                    }
                }
                Err(e) if e.is_convergence_failure() => self.failed_split_trials += 1,
                Err(e) => return Err(e),
            }
        }

        let split_score = best.as_ref().map_or(f64::NEG_INFINITY, |b| b.score());
        match best {
            Some(children) if parent_score < split_score => {
                debug!(
                    "cluster {cid} ({} points): split, {parent_score:.4} < {split_score:.4}",
                    members.len()
                );
                Ok(Some(children.centroids().to_owned()))
            }
            _ => {
                debug!(
                    "cluster {cid} ({} points): no split, {parent_score:.4} >= {split_score:.4}",
                    members.len()
                );
                Ok(None)
            }
        }
    }
}

impl<R: Rng> ModelSearch for XMeansState<'_, R> {
    fn step(&mut self) -> Result<()> {
        if self.done {
            return Ok(());
        }

        let current = self.prev.centroids().to_owned();
        let k = current.nrows();
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); k];
        for (i, &c) in self.prev.labels().iter().enumerate() {
            members[c].push(i);
        }

        let mut next: Vec<f64> = Vec::with_capacity(2 * current.len());
        let mut next_k = 0;
        for (cid, parent) in current.outer_iter().enumerate() {
            if next_k > self.config.max_k {
                debug!(
                    "centroid budget {} exceeded, {} left untested",
                    self.config.max_k,
                    k - cid
                );
                for c in current.outer_iter().skip(cid) {
                    next.extend(c.iter());
                    next_k += 1;
                }
                break;
            }
            if members[cid].is_empty() {
                continue;
            }

            let chosen = match self.split_test(cid, parent, &members[cid])? {
                Some(children) => children,
                None => parent.to_owned().insert_axis(Axis(0)),
            };
            next.extend(chosen.iter());
            next_k += chosen.nrows();
        }

        self.passes += 1;
        if next_k == 0 {
            self.done = true;
            return Ok(());
        }

        let centroids = Array2::from_shape_vec((next_k, self.data.dim()), next).map_err(|_| {
            Error::InvalidParameter {
                name: "centroids",
                message: "centroid rows do not form a matrix",
            }
        })?;

        let res = match self.engine(centroids).start_with_rng(self.data, &mut self.rng) {
            Ok(res) => res,
            Err(e) if e.is_convergence_failure() => {
                debug!("pass {}: re-run with k={next_k} failed: {e}", self.passes);
                self.prev.clone().with_score(f64::NEG_INFINITY)
            }
            Err(e) => return Err(e),
        };

        debug!(
            "pass {}: k {} -> {} {}={:.4}",
            self.passes,
            k,
            res.k(),
            self.config.loss,
            res.score()
        );

        if res.score() > self.best.score() {
            self.best = res.clone();
        }
        self.done = res.k() == k;
        self.prev = res;
        Ok(())
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn progress(&self) -> f64 {
        self.prev.k() as f64 / self.config.max_k as f64 * 100.0
    }

    fn result(&self) -> Option<&ClusteringResult> {
        Some(&self.best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_pairs() -> Dataset {
        Dataset::new(array![[0.0, 0.0], [0.0, 1.0], [10.0, 0.0], [10.0, 1.0]]).unwrap()
    }

    /// Square grid of `side * side` points with spacing 0.25.
    fn grid(cx: f64, cy: f64, side: usize) -> Vec<Vec<f64>> {
        let mut rows = Vec::new();
        for i in 0..side {
            for j in 0..side {
                rows.push(vec![cx + i as f64 * 0.25, cy + j as f64 * 0.25]);
            }
        }
        rows
    }

    #[test]
    fn test_initial_state() -> Result<()> {
        let data = two_pairs();
        let xm = XMeans::new(2, 4).with_seed(7).start(&data)?;

        assert_eq!(xm.centroids().nrows(), 2);
        assert_eq!(xm.result(), Some(xm.previous()));
        assert!(!xm.is_done());
        assert_eq!(xm.passes(), 0);
        assert_eq!(xm.split_tries(), 1);
        assert!((xm.progress() - 50.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_small_clusters_are_not_split() -> Result<()> {
        // Every converged 2-means of the two pairs has clusters of two
        // points, too few to score two children under AIC.
        let data = two_pairs();
        let mut xm = XMeans::new(2, 4).with_seed(11).start(&data)?;
        let before = xm.previous().clone();

        xm.step()?;

        assert!(xm.is_done());
        assert_eq!(xm.passes(), 1);
        assert_eq!(xm.failed_split_trials(), 0);
        assert_eq!(xm.centroids(), before.centroids());

        // Further steps are no-ops.
        xm.step()?;
        assert_eq!(xm.passes(), 1);
        Ok(())
    }

    /// Two pairs of blobs: the blobs of a pair are 4 apart, the pairs 100.
    fn two_pairs_of_blobs() -> Dataset {
        let mut rows = Vec::new();
        for (cx, cy) in [(0.0, 0.0), (4.0, 0.0), (100.0, 0.0), (104.0, 0.0)] {
            rows.extend(grid(cx, cy, 4));
        }
        Dataset::from_rows(&rows).unwrap()
    }

    #[test]
    fn test_budget_counts_accepted_centroids_only() -> Result<()> {
        // With max_k = 2 both pairs are still tested: the accepted count is
        // 0 and then 2 before the tests, neither of which exceeds 2.
        let data = two_pairs_of_blobs();
        for seed in 0..5 {
            let mut xm = XMeans::new(2, 2)
                .with_split_tries(4)
                .with_seed(seed)
                .start(&data)?;
            assert_eq!(xm.centroids().nrows(), 2);

            xm.step()?;
            assert_eq!(xm.centroids().nrows(), 4, "seed {seed}");
            assert!(!xm.is_done());

            // Now the budget is exceeded after the third centroid; the last
            // one is carried over and nothing splits.
            xm.step()?;
            assert!(xm.is_done());
            assert_eq!(xm.centroids().nrows(), 4);
            assert_eq!(xm.result().map(|r| r.cluster_sizes()), Some(vec![16; 4]));
        }
        Ok(())
    }

    #[test]
    fn test_k_never_shrinks() -> Result<()> {
        let data = two_pairs_of_blobs();
        let mut xm = XMeans::new(1, 3)
            .with_split_tries(3)
            .with_seed(3)
            .start(&data)?;
        let mut last_k = xm.centroids().nrows();
        while !xm.is_done() {
            xm.step()?;
            let k = xm.centroids().nrows();
            assert!(k >= last_k);
            assert!(k < data.len());
            last_k = k;
        }
        Ok(())
    }

    #[test]
    fn test_failed_split_trials_keep_the_parent() -> Result<()> {
        // A single centroid converges without an update, any 2-means needs
        // at least two passes: every split trial fails.
        let mut rows = grid(0.0, 0.0, 5);
        rows.extend(grid(10.0, 10.0, 5));
        let data = Dataset::from_rows(&rows)?;

        let mut xm = XMeans::new(1, 4)
            .with_split_tries(4)
            .with_max_iter(1)
            .with_seed(9)
            .start(&data)?;
        let initial = xm.previous().clone();

        xm.step()?;

        assert_eq!(xm.failed_split_trials(), 4);
        assert!(xm.is_done());
        assert_eq!(xm.centroids(), initial.centroids());
        assert_eq!(xm.result(), Some(&initial));
        Ok(())
    }

    #[test]
    fn test_failed_rerun_ends_search_with_previous_partition() -> Result<()> {
        let mut rows = grid(0.0, 0.0, 5);
        rows.extend(grid(10.0, 10.0, 5));
        let data = Dataset::from_rows(&rows)?;

        let mut xm = XMeans::new(2, 4)
            .with_split_tries(2)
            .with_seed(4)
            .start(&data)?;
        let initial = xm.previous().clone();

        // From here on no 2-means can converge, including the full re-run.
        xm.config.max_iter = 1;
        xm.step()?;

        assert!(xm.is_done());
        assert_eq!(xm.passes(), 1);
        assert_eq!(xm.failed_split_trials(), 4);
        assert_eq!(xm.previous().score(), f64::NEG_INFINITY);
        assert_eq!(xm.previous().labels(), initial.labels());
        assert_eq!(xm.centroids(), initial.centroids());
        assert_eq!(xm.result(), Some(&initial));
        Ok(())
    }

    #[test]
    fn test_best_tracks_highest_score() -> Result<()> {
        let mut rows = grid(0.0, 0.0, 5);
        rows.extend(grid(15.0, 15.0, 5));
        let data = Dataset::from_rows(&rows)?;

        let mut xm = XMeans::new(1, 6)
            .with_split_tries(5)
            .with_seed(21)
            .start(&data)?;
        let mut top = xm.previous().score();
        while !xm.is_done() {
            xm.step()?;
            top = top.max(xm.previous().score());
            assert_eq!(xm.result().map(|r| r.score()), Some(top));
        }
        Ok(())
    }

    #[test]
    fn test_default_split_tries_is_half_dim_rounded_up() -> Result<()> {
        let rows: Vec<Vec<f64>> = (0..6)
            .map(|i| vec![i as f64, (i * i) as f64, 1.0, -(i as f64), 0.5 * i as f64])
            .collect();
        let data = Dataset::from_rows(&rows)?;
        let xm = XMeans::new(1, 3).with_seed(0).start(&data)?;
        assert_eq!(xm.split_tries(), 3);
        Ok(())
    }

    #[test]
    fn test_validation() {
        let data = two_pairs();
        assert!(XMeans::new(0, 3).start(&data).is_err());
        assert!(XMeans::new(3, 2).start(&data).is_err());
        assert!(XMeans::new(1, 3).with_split_tries(0).start(&data).is_err());
        // AIC needs more points than clusters.
        assert!(matches!(
            XMeans::new(4, 5).start(&data),
            Err(Error::InvalidClusterCount { .. })
        ));
    }
}
