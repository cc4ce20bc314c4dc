//! Validated point sets.

use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

/// An immutable, non-empty set of points sharing one dimensionality.
///
/// Rows are points, columns are dimensions. Every coordinate is finite.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    points: Array2<f64>,
}

impl Dataset {
    /// Wrap a matrix of points (one per row).
    pub fn new(points: Array2<f64>) -> Result<Self> {
        if points.nrows() == 0 {
            return Err(Error::EmptyInput);
        }
        if points.ncols() == 0 {
            return Err(Error::InvalidParameter {
                name: "points",
                message: "points must have at least one dimension",
            });
        }
        if let Some(((row, col), _)) = points.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::NonFiniteValue { row, col });
        }
        Ok(Self { points })
    }

    /// Build from row vectors, checking that all rows have the same length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::EmptyInput);
        }

        let n = rows.len();
        let d = rows[0].len();
        let mut flat: Vec<f64> = Vec::with_capacity(n * d);
        for row in rows {
            if row.len() != d {
                return Err(Error::DimensionMismatch {
                    expected: d,
                    found: row.len(),
                });
            }
            flat.extend(row);
        }
        let points = Array2::from_shape_vec((n, d), flat).map_err(|_| Error::InvalidParameter {
            name: "rows",
            message: "rows do not form a matrix",
        })?;
        Self::new(points)
    }

    /// Number of points (R).
    pub fn len(&self) -> usize {
        self.points.nrows()
    }

    /// Always false for a constructed dataset.
    pub fn is_empty(&self) -> bool {
        self.points.nrows() == 0
    }

    /// Dimensionality of every point (M).
    pub fn dim(&self) -> usize {
        self.points.ncols()
    }

    /// The i-th point.
    pub fn point(&self, i: usize) -> ArrayView1<'_, f64> {
        self.points.row(i)
    }

    /// All points as a matrix view.
    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.points.view()
    }

    /// New dataset made of the given rows, in the given order.
    ///
    /// Returns `EmptyInput` when `indices` is empty.
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        if indices.is_empty() {
            return Err(Error::EmptyInput);
        }
        if indices.iter().any(|&i| i >= self.len()) {
            return Err(Error::InvalidParameter {
                name: "indices",
                message: "index out of bounds",
            });
        }
        Ok(Self {
            points: self.points.select(Axis(0), indices),
        })
    }
}

impl TryFrom<Vec<Vec<f64>>> for Dataset {
    type Error = Error;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self> {
        Self::from_rows(&rows)
    }
}

impl TryFrom<Array2<f64>> for Dataset {
    type Error = Error;

    fn try_from(points: Array2<f64>) -> Result<Self> {
        Self::new(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_from_rows() {
        let data = Dataset::from_rows(&[vec![0.0, 1.0], vec![2.0, 3.0], vec![4.0, 5.0]]).unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data.dim(), 2);
        assert_eq!(data.point(1), array![2.0, 3.0]);
    }

    #[test]
    fn test_empty_input_error() {
        let rows: Vec<Vec<f64>> = vec![];
        assert_eq!(Dataset::from_rows(&rows), Err(Error::EmptyInput));
    }

    #[test]
    fn test_zero_dimension_error() {
        let result = Dataset::from_rows(&[vec![], vec![]]);
        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
    }

    #[test]
    fn test_ragged_rows_error() {
        let result = Dataset::from_rows(&[vec![0.0, 0.0], vec![1.0]]);
        assert_eq!(
            result,
            Err(Error::DimensionMismatch {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn test_non_finite_error() {
        let result = Dataset::new(array![[0.0, 1.0], [f64::NAN, 2.0]]);
        assert_eq!(result, Err(Error::NonFiniteValue { row: 1, col: 0 }));
    }

    #[test]
    fn test_subset_keeps_order() {
        let data = Dataset::new(array![[0.0], [1.0], [2.0], [3.0]]).unwrap();
        let sub = data.subset(&[3, 1]).unwrap();
        assert_eq!(sub.view(), array![[3.0], [1.0]]);
        assert!(data.subset(&[]).is_err());
        assert!(data.subset(&[4]).is_err());
    }
}
