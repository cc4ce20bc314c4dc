//! Vector primitives used by the clustering engine.
//!
//! Everything here works on `ndarray` rows of `f64`. Distances are
//! Euclidean; nearest-candidate lookups break ties by first occurrence so
//! that assignments are stable for a fixed input order.

use ndarray::{Array1, ArrayView1, ArrayView2, ArrayViewMut1};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// All-zero vector of length `dim`.
pub fn zero(dim: usize) -> Array1<f64> {
    Array1::zeros(dim)
}

/// `dst += src`, element-wise.
pub fn add(mut dst: ArrayViewMut1<'_, f64>, src: ArrayView1<'_, f64>) {
    dst.zip_mut_with(&src, |d, &s| *d += s);
}

/// `dst -= src`, element-wise.
pub fn sub(mut dst: ArrayViewMut1<'_, f64>, src: ArrayView1<'_, f64>) {
    dst.zip_mut_with(&src, |d, &s| *d -= s);
}

/// `dst /= scalar`, element-wise.
pub fn div(mut dst: ArrayViewMut1<'_, f64>, scalar: f64) {
    dst.mapv_inplace(|d| d / scalar);
}

/// Squared Euclidean distance.
pub fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Euclidean distance.
pub fn distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    squared_distance(a, b).sqrt()
}

/// Index of the row of `candidates` closest to `point`.
///
/// Ties go to the lowest index. Returns 0 when `candidates` has no rows.
pub fn closest(point: ArrayView1<'_, f64>, candidates: ArrayView2<'_, f64>) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, candidate) in candidates.outer_iter().enumerate() {
        let dist = squared_distance(point, candidate);
        if dist < best_dist {
            best_dist = dist;
            best = i;
        }
    }
    best
}

/// Unit vector with a uniformly distributed direction.
///
/// Draws each coordinate from a standard normal and normalizes, which is
/// rotation invariant. Degenerate draws (all zeros) are resampled.
pub fn random_unit<R: Rng + ?Sized>(dim: usize, rng: &mut R) -> Array1<f64> {
    loop {
        let mut v: Array1<f64> = Array1::from_shape_fn(dim, |_| StandardNormal.sample(rng));
        let norm = v.dot(&v).sqrt();
        if norm > 0.0 && norm.is_finite() {
            div(v.view_mut(), norm);
            return v;
        }
    }
}

/// Sum of all elements.
pub fn sum(v: ArrayView1<'_, f64>) -> f64 {
    v.sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_add_sub_div() {
        let mut v = zero(3);
        add(v.view_mut(), array![1.0, 2.0, 3.0].view());
        add(v.view_mut(), array![1.0, 2.0, 3.0].view());
        sub(v.view_mut(), array![0.0, 2.0, 0.0].view());
        div(v.view_mut(), 2.0);
        assert_eq!(v, array![1.0, 1.0, 3.0]);
    }

    #[test]
    fn test_distances() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];
        assert_eq!(squared_distance(a.view(), b.view()), 25.0);
        assert_eq!(distance(a.view(), b.view()), 5.0);
        assert_eq!(sum(b.view()), 7.0);
    }

    #[test]
    fn test_closest_prefers_first_on_ties() {
        let candidates = array![[1.0, 0.0], [-1.0, 0.0], [0.0, 5.0]];
        let origin = array![0.0, 0.0];
        assert_eq!(closest(origin.view(), candidates.view()), 0);

        let p = array![-0.9, 0.0];
        assert_eq!(closest(p.view(), candidates.view()), 1);
    }

    #[test]
    fn test_random_unit_has_unit_norm() {
        let mut rng = StdRng::seed_from_u64(7);
        for dim in 1..8 {
            let u = random_unit(dim, &mut rng);
            assert_eq!(u.len(), dim);
            assert!((u.dot(&u) - 1.0).abs() < 1e-12);
        }
    }
}
