//! Model scores for comparing clusterings with different k.
//!
//! All scores follow one convention: **larger is better**.
//!
//! # Spherical Gaussian Likelihood
//!
//! A hard clustering is read as a mixture of K spherical Gaussians that
//! share one variance, estimated from the pooled residuals:
//!
//! ```text
//! σ² = Σᵢ ||xᵢ - μ(xᵢ)||² / (M (R - K))
//! ```
//!
//! with R points, K clusters and M dimensions. The log-likelihood of the
//! data under that model is
//!
//! ```text
//! l = Σₖ Rₖ ln Rₖ - R ln R - (R M / 2) ln(2π σ²) - M (R - K) / 2
//! ```
//!
//! (Pelleg & Moore, "X-means", 2000). The first two terms are the mixing
//! weights, the last two the Gaussian densities.
//!
//! # Penalties
//!
//! | Score | Formula | Free parameters p |
//! |-------|---------|-------------------|
//! | BIC | l - (p / 2) ln R | K (M + 1) |
//! | AIC | -(2p - 2l) | K M |
//!
//! AIC counts only the centroid coordinates. BIC adds one to each
//! centroid's M coordinates for the shared variance, giving K (M + 1).
//!
//! # MSE
//!
//! Without a likelihood, [`mse_score`] returns minus the sum over clusters of
//! the mean squared distance to the centroid. It carries no complexity
//! penalty and always improves with more clusters.

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::vector;
use core::fmt;
use core::str::FromStr;
use ndarray::ArrayView2;

/// Which score the k-means engine reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Loss {
    /// Bayesian information criterion.
    #[default]
    Bic,
    /// Akaike information criterion.
    Aic,
    /// Negative summed per-cluster mean squared error.
    Mse,
}

impl Loss {
    /// Score a clustering under this loss.
    pub fn score(
        self,
        data: &Dataset,
        labels: &[usize],
        centroids: ArrayView2<'_, f64>,
    ) -> Result<f64> {
        match self {
            Loss::Bic => bic(data, labels, centroids),
            Loss::Aic => aic(data, labels, centroids),
            Loss::Mse => mse_score(data, labels, centroids),
        }
    }

    /// Smallest number of points this loss can score with `k` clusters.
    ///
    /// The likelihood-based scores need `R > K` for the pooled variance.
    pub fn min_points(self, k: usize) -> usize {
        match self {
            Loss::Bic | Loss::Aic => k + 1,
            Loss::Mse => k,
        }
    }
}

impl fmt::Display for Loss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Loss::Bic => write!(f, "bic"),
            Loss::Aic => write!(f, "aic"),
            Loss::Mse => write!(f, "mse"),
        }
    }
}

impl FromStr for Loss {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bic" => Ok(Loss::Bic),
            "aic" => Ok(Loss::Aic),
            "mse" => Ok(Loss::Mse),
            _ => Err(Error::InvalidParameter {
                name: "loss",
                message: "expected one of: bic, aic, mse",
            }),
        }
    }
}

/// Free parameters counted by [`bic`]: a mean vector per cluster plus the
/// shared variance, counted once per cluster.
pub fn bic_free_params(k: usize, dim: usize) -> usize {
    k * (dim + 1)
}

/// Free parameters counted by [`aic`]: one mean per cluster.
pub fn aic_free_params(k: usize, dim: usize) -> usize {
    k * dim
}

fn check_shapes(data: &Dataset, labels: &[usize], centroids: ArrayView2<'_, f64>) -> Result<()> {
    if labels.len() != data.len() {
        return Err(Error::DimensionMismatch {
            expected: data.len(),
            found: labels.len(),
        });
    }
    if centroids.ncols() != data.dim() {
        return Err(Error::DimensionMismatch {
            expected: data.dim(),
            found: centroids.ncols(),
        });
    }
    if centroids.nrows() == 0 {
        return Err(Error::InvalidClusterCount {
            requested: 0,
            n_items: data.len(),
        });
    }
    if labels.iter().any(|&c| c >= centroids.nrows()) {
        return Err(Error::InvalidParameter {
            name: "labels",
            message: "label refers to a missing centroid",
        });
    }
    Ok(())
}

fn cluster_sizes(labels: &[usize], k: usize) -> Vec<usize> {
    let mut sizes = vec![0usize; k];
    for &c in labels {
        sizes[c] += 1;
    }
    sizes
}

/// Pooled within-cluster variance `Σ ||x - μ||² / (M (R - K))`.
///
/// Fails with `InvalidClusterCount` when `R <= K`.
pub fn pooled_variance(
    data: &Dataset,
    labels: &[usize],
    centroids: ArrayView2<'_, f64>,
) -> Result<f64> {
    check_shapes(data, labels, centroids)?;
    let r = data.len();
    let k = centroids.nrows();
    if r <= k {
        return Err(Error::InvalidClusterCount {
            requested: k,
            n_items: r,
        });
    }

    let residual: f64 = labels
        .iter()
        .enumerate()
        .map(|(i, &c)| vector::squared_distance(data.point(i), centroids.row(c)))
        .sum();
    Ok(residual / (data.dim() * (r - k)) as f64)
}

/// Log-likelihood of the data under the shared-variance spherical model.
pub fn log_likelihood(
    data: &Dataset,
    labels: &[usize],
    centroids: ArrayView2<'_, f64>,
) -> Result<f64> {
    let variance = pooled_variance(data, labels, centroids)?;
    let r = data.len() as f64;
    let k = centroids.nrows() as f64;
    let m = data.dim() as f64;

    // 0 ln 0 = 0
    let t1: f64 = cluster_sizes(labels, centroids.nrows())
        .into_iter()
        .filter(|&n| n > 0)
        .map(|n| {
            let n = n as f64;
            n * n.ln()
        })
        .sum();
    let t2 = r * r.ln();
    let t3 = (r * m) / 2.0 * (2.0 * std::f64::consts::PI * variance).ln();
    let t4 = m * (r - k) / 2.0;

    Ok(t1 - t2 - t3 - t4)
}

/// Bayesian information criterion, `l - (K (M + 1) / 2) ln R`.
pub fn bic(data: &Dataset, labels: &[usize], centroids: ArrayView2<'_, f64>) -> Result<f64> {
    let ll = log_likelihood(data, labels, centroids)?;
    let p = bic_free_params(centroids.nrows(), data.dim()) as f64;
    Ok(ll - p / 2.0 * (data.len() as f64).ln())
}

/// Akaike information criterion in "higher is better" form, `-(2p - 2l)`.
pub fn aic(data: &Dataset, labels: &[usize], centroids: ArrayView2<'_, f64>) -> Result<f64> {
    let ll = log_likelihood(data, labels, centroids)?;
    let p = aic_free_params(centroids.nrows(), data.dim()) as f64;
    Ok(-(2.0 * p - 2.0 * ll))
}

/// Minus the sum over clusters of the mean squared distance to the centroid.
///
/// Empty clusters contribute nothing.
pub fn mse_score(
    data: &Dataset,
    labels: &[usize],
    centroids: ArrayView2<'_, f64>,
) -> Result<f64> {
    check_shapes(data, labels, centroids)?;
    let k = centroids.nrows();
    let mut errors = vector::zero(k);
    let sizes = cluster_sizes(labels, k);
    for (i, &c) in labels.iter().enumerate() {
        errors[c] += vector::squared_distance(data.point(i), centroids.row(c));
    }
    for (e, &n) in errors.iter_mut().zip(&sizes) {
        if n > 0 {
            *e /= n as f64;
        }
    }
    Ok(-vector::sum(errors.view()))
}
