//! Choosing k by sweeping it.
//!
//! Runs k-means for every k in `2..=max_k`, `tries` random restarts per k,
//! keeps the best restart of each k and then picks one k.
//!
//! # Selection
//!
//! | Selector | Picks |
//! |----------|-------|
//! | [`Selector::Best`] | the k with the highest score |
//! | [`Selector::Elbow`] | the k where the score curve bends the most |
//!
//! The elbow is the largest discrete second difference
//!
//! ```text
//! d2(k) = s(k-1) + s(k+1) - 2 s(k),    3 <= k < max_k
//! ```
//!
//! k = 2 has no left neighbour in the sweep and `max_k` no right one, so
//! neither can be an elbow. When no elbow is defined (for example
//! `max_k <= 3`) the best-scoring k is returned instead.
//!
//! Restarts that fail to converge score `-inf` and are counted in
//! [`OptimizerState::failed_restarts`].

use super::kmeans::{ClusteringResult, Kmeans};
use super::traits::ModelSearch;
use crate::criterion::Loss;
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use core::fmt;
use core::str::FromStr;
use log::debug;
use rand::prelude::*;
use std::collections::BTreeMap;

/// Rule for picking k once the sweep is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selector {
    /// Largest absolute second difference of the score curve.
    #[default]
    Elbow,
    /// Highest score.
    Best,
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Elbow => write!(f, "elbow"),
            Selector::Best => write!(f, "best"),
        }
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "elbow" => Ok(Selector::Elbow),
            "best" => Ok(Selector::Best),
            _ => Err(Error::InvalidParameter {
                name: "selector",
                message: "expected one of: elbow, best",
            }),
        }
    }
}

/// Configuration of a k sweep.
#[derive(Debug, Clone)]
pub struct KmeansOptimizer {
    /// Largest k tried.
    max_k: usize,
    /// Restarts per k.
    tries: usize,
    loss: Loss,
    selector: Selector,
    /// Iteration guard of every k-means run.
    max_iter: usize,
    /// Random seed.
    seed: Option<u64>,
}

impl KmeansOptimizer {
    /// Sweep k over `2..=max_k` with `tries` restarts each.
    pub fn new(max_k: usize, tries: usize) -> Self {
        Self {
            max_k,
            tries,
            loss: Loss::Bic,
            selector: Selector::Elbow,
            max_iter: 100,
            seed: None,
        }
    }

    /// Set the score used to compare restarts and k values.
    pub fn with_loss(mut self, loss: Loss) -> Self {
        self.loss = loss;
        self
    }

    /// Set the rule for picking k.
    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = selector;
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

    /// Validate against `data` and return the stepwise sweep.
    pub fn start<'a>(&self, data: &'a Dataset) -> Result<OptimizerState<'a, StdRng>> {
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
        rng: R,
    ) -> Result<OptimizerState<'a, R>> {
        if self.max_k < 2 {
            return Err(Error::InvalidParameter {
                name: "max_k",
                message: "must be >= 2",
            });
        }
        if self.tries == 0 {
            return Err(Error::InvalidParameter {
                name: "tries",
                message: "must be > 0",
            });
        }
        if self.max_iter == 0 {
            return Err(Error::InvalidParameter {
                name: "max_iter",
                message: "must be > 0",
            });
        }
        if data.len() < self.loss.min_points(self.max_k) {
            return Err(Error::InvalidClusterCount {
                requested: self.max_k,
                n_items: data.len(),
            });
        }

        Ok(OptimizerState {
            config: self.clone(),
            data,
            rng,
            k: 2,
            tries_done: 0,
            best_try: None,
            results: BTreeMap::new(),
            failed_restarts: 0,
        })
    }
}

/// A k sweep in progress. Produced by [`KmeansOptimizer::start`].
#[derive(Debug)]
pub struct OptimizerState<'a, R> {
    config: KmeansOptimizer,
    data: &'a Dataset,
    rng: R,
    /// k of the restart that ran last (or runs next).
    k: usize,
    /// Restarts done for `k`.
    tries_done: usize,
    /// Best restart so far for `k`; `None` if all of them failed.
    best_try: Option<ClusteringResult>,
    /// Best restart of every finished k.
    results: BTreeMap<usize, Option<ClusteringResult>>,
    failed_restarts: usize,
}

fn score_of(res: Option<&ClusteringResult>) -> f64 {
    res.map_or(f64::NEG_INFINITY, ClusteringResult::score)
}

impl<R: Rng> OptimizerState<'_, R> {
    /// k of the current (or last) restart.
    pub fn current_k(&self) -> usize {
        self.k
    }

    /// Restarts finished for the current k.
    pub fn current_try(&self) -> usize {
        self.tries_done
    }

    /// Restarts that hit the iteration guard so far.
    pub fn failed_restarts(&self) -> usize {
        self.failed_restarts
    }

    /// Best score of every finished k, in increasing k. Failed k score `-inf`.
    pub fn scores(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.results.iter().map(|(&k, r)| (k, score_of(r.as_ref())))
    }

    /// Best stored result of k, if k finished and any restart converged.
    pub fn result_for(&self, k: usize) -> Option<&ClusteringResult> {
        self.results.get(&k).and_then(Option::as_ref)
    }

    fn step_try(&mut self) -> Result<()> {
        let engine = Kmeans::new(self.k)
            .with_loss(self.config.loss)
            .with_max_iter(self.config.max_iter);

        let attempt = match engine.start_with_rng(self.data, &mut self.rng) {
            Ok(res) => Some(res),
            Err(e) if e.is_convergence_failure() => {
                debug!("restart {} of k={} failed: {}", self.tries_done, self.k, e);
                self.failed_restarts += 1;
                None
            }
            Err(e) => return Err(e),
        };

        if self.tries_done == 0 || score_of(attempt.as_ref()) > score_of(self.best_try.as_ref()) {
            self.best_try = attempt;
        }
        self.tries_done += 1;
        Ok(())
    }

    fn best(&self) -> Option<&ClusteringResult> {
        self.results
            .values()
            .flatten()
            .fold(None, |best: Option<&ClusteringResult>, res| match best {
                Some(b) if b.score() >= res.score() => Some(b),
                _ => Some(res),
            })
    }

    fn elbow(&self) -> Option<&ClusteringResult> {
        let score = |k: usize| self.results.get(&k).map(|r| score_of(r.as_ref()));

        let mut best_k = None;
        let mut best_d2 = 0.0;
        for k in 3..self.config.max_k {
            let (Some(prev), Some(cur), Some(next)) = (score(k - 1), score(k), score(k + 1))
            else {
                continue;
            };
            let d2 = (prev + next - 2.0 * cur).abs();
            if d2.is_finite() && d2 > best_d2 {
                best_k = Some(k);
                best_d2 = d2;
            }
        }

        match best_k {
            Some(k) => self.result_for(k),
            None => self.best(),
        }
    }
}

impl<R: Rng> ModelSearch for OptimizerState<'_, R> {
    fn step(&mut self) -> Result<()> {
        if self.is_done() {
            return Ok(());
        }
        if self.tries_done == self.config.tries {
            self.k += 1;
            self.tries_done = 0;
        }

        self.step_try()?;

        if self.tries_done == self.config.tries {
            let best = self.best_try.take();
            debug!("k={} best {}={}", self.k, self.config.loss, score_of(best.as_ref()));
            self.results.insert(self.k, best);
        }
        Ok(())
    }

    fn is_done(&self) -> bool {
        self.k == self.config.max_k && self.tries_done == self.config.tries
    }

    fn progress(&self) -> f64 {
        let tries = self.config.tries as f64;
        (self.k as f64 * tries + self.tries_done as f64) / ((self.config.max_k + 1) as f64 * tries)
            * 100.0
    }

    fn result(&self) -> Option<&ClusteringResult> {
        match self.config.selector {
            Selector::Best => self.best(),
            Selector::Elbow => self.elbow(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two tight 3x3 grids far apart, plus a few stragglers.
    fn sample() -> Dataset {
        let mut rows = Vec::new();
        for (cx, cy) in [(0.0, 0.0), (30.0, 5.0)] {
            for i in 0..3 {
                for j in 0..3 {
                    rows.push(vec![cx + i as f64 * 0.5, cy + j as f64 * 0.5]);
                }
            }
        }
        rows.push(vec![15.0, 40.0]);
        rows.push(vec![-10.0, 20.0]);
        Dataset::from_rows(&rows).unwrap()
    }

    #[test]
    fn test_step_walks_k_and_tries() -> Result<()> {
        let data = sample();
        let mut opt = KmeansOptimizer::new(4, 3).with_seed(1).start(&data)?;

        let mut visited = Vec::new();
        let mut last_progress = opt.progress();
        while !opt.is_done() {
            opt.step()?;
            visited.push((opt.current_k(), opt.current_try()));
            assert!(opt.progress() > last_progress);
            last_progress = opt.progress();
        }

        assert_eq!(
            visited,
            vec![
                (2, 1),
                (2, 2),
                (2, 3),
                (3, 1),
                (3, 2),
                (3, 3),
                (4, 1),
                (4, 2),
                (4, 3)
            ]
        );
        assert!((opt.progress() - 100.0).abs() < 1e-9);
        assert_eq!(opt.scores().map(|(k, _)| k).collect::<Vec<_>>(), vec![2, 3, 4]);

        // Stepping a finished sweep changes nothing.
        opt.step()?;
        assert_eq!((opt.current_k(), opt.current_try()), (4, 3));
        Ok(())
    }

    #[test]
    fn test_best_try_dominates_every_restart() -> Result<()> {
        let data = sample();
        let (max_k, tries, seed) = (4, 5, 99);
        let mut opt = KmeansOptimizer::new(max_k, tries)
            .with_selector(Selector::Best)
            .start_with_rng(&data, StdRng::seed_from_u64(seed))?;
        opt.run()?;

        // Replay the same restarts from the same random stream.
        let mut rng = StdRng::seed_from_u64(seed);
        for k in 2..=max_k {
            let best = score_of(opt.result_for(k));
            for _ in 0..tries {
                if let Ok(trial) = Kmeans::new(k).start_with_rng(&data, &mut rng) {
                    assert!(best >= trial.score(), "k={k}: {best} < {}", trial.score());
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_best_selector_returns_top_score() -> Result<()> {
        let data = sample();
        let mut opt = KmeansOptimizer::new(5, 4)
            .with_selector(Selector::Best)
            .with_seed(3)
            .start(&data)?;
        let chosen = opt.run()?.score();

        let top = opt.scores().map(|(_, s)| s).fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(chosen, top);
        Ok(())
    }

    #[test]
    fn test_elbow_without_interior_k_falls_back_to_best() -> Result<()> {
        let data = sample();
        let mut elbow = KmeansOptimizer::new(3, 2).with_seed(5).start(&data)?;
        let mut best = KmeansOptimizer::new(3, 2)
            .with_selector(Selector::Best)
            .with_seed(5)
            .start(&data)?;
        assert_eq!(elbow.run()?.clone(), best.run()?.clone());
        Ok(())
    }

    #[test]
    fn test_failed_restarts_are_counted() {
        let data = sample();
        // One iteration never converges for k >= 2: either a label leaves
        // cluster 0 or another cluster stays empty.
        let mut opt = KmeansOptimizer::new(3, 2)
            .with_max_iter(1)
            .with_seed(0)
            .start(&data)
            .unwrap();

        assert_eq!(opt.run().unwrap_err(), Error::NoViableModel);
        assert_eq!(opt.failed_restarts(), 4);
        assert!(opt.scores().all(|(_, s)| s == f64::NEG_INFINITY));
    }

    #[test]
    fn test_validation() {
        let data = sample();
        assert!(KmeansOptimizer::new(1, 3).start(&data).is_err());
        assert!(KmeansOptimizer::new(3, 0).start(&data).is_err());
        assert!(KmeansOptimizer::new(3, 1).with_max_iter(0).start(&data).is_err());
        assert!(matches!(
            KmeansOptimizer::new(data.len(), 1).start(&data),
            Err(Error::InvalidClusterCount { .. })
        ));
        assert!(KmeansOptimizer::new(data.len(), 1)
            .with_loss(Loss::Mse)
            .start(&data)
            .is_ok());
    }

    #[test]
    fn test_selector_parse() {
        assert_eq!("elbow".parse::<Selector>().unwrap(), Selector::Elbow);
        assert_eq!("Best".parse::<Selector>().unwrap(), Selector::Best);
        assert!("knee".parse::<Selector>().is_err());
        assert_eq!(Selector::default().to_string(), "elbow");
    }
}
