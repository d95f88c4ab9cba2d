//! # Dissimilarities
//!
//! Pairwise dissimilarity structure of a dataset. A [`PointSet`] is a read-only view over
//! `N` observations that knows how different two of them are; a [`DissimilarityMatrix`]
//! materialises that knowledge once per analysis pass as a symmetric `N × N` array.
//!
//! The matrix never trusts a metric to be symmetric: only the strict lower triangle
//! (`i > j`) is evaluated and mirrored, and the diagonal is fixed at zero.

use crate::error::{check_index, DimredError, Result};
use log::debug;
use ndarray::{Array2, ArrayView1, ArrayView2};

/// Read-only view over `N` observations addressed by 0-based index.
pub trait PointSet {
    /// Number of observations. Fixed for the lifetime of one analysis pass.
    fn size(&self) -> usize;

    /// Raw dissimilarity between observations `i` and `j`.
    ///
    /// Only ever called with `0 <= j < i < size()`.
    fn raw_dissimilarity(&self, i: usize, j: usize) -> f64;

    /// Whether the underlying dataset has a dissimilarity measure to offer yet.
    fn dissimilarities_available(&self) -> bool {
        true
    }
}

/// Symmetric `N × N` matrix of non-negative dissimilarities with a zero diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct DissimilarityMatrix {
    values: Array2<f64>,
}

impl DissimilarityMatrix {
    /// Builds the matrix from the raw dissimilarities of a point set.
    ///
    /// Performs exactly `N·(N-1)/2` metric evaluations.
    pub fn build<P>(point_set: &P) -> Result<Self>
    where
        P: PointSet + ?Sized,
    {
        if !point_set.dissimilarities_available() {
            return Err(DimredError::invalid_configuration(
                "dissimilarity matrix",
                "dissimilarities have not been calculated for the input data",
            ));
        }
        Self::build_with(point_set.size(), |i, j| {
            Ok(point_set.raw_dissimilarity(i, j))
        })
    }

    /// Builds an `n × n` matrix by evaluating `metric(i, j)` for every `i > j`.
    ///
    /// The mirrored entry `(j, i)` is copied and the diagonal is left at zero,
    /// so `metric` is never asked for `i <= j`.
    pub fn build_with<F>(n: usize, mut metric: F) -> Result<Self>
    where
        F: FnMut(usize, usize) -> Result<f64>,
    {
        if n < 2 {
            return Err(DimredError::invalid_configuration(
                "dissimilarity matrix",
                format!("at least two points are required, got {}", n),
            ));
        }

        let mut values = Array2::<f64>::zeros((n, n));
        for i in 1..n {
            for j in 0..i {
                let d = metric(i, j)?;
                if !d.is_finite() || d < 0.0 {
                    return Err(DimredError::invalid_configuration(
                        "dissimilarity matrix",
                        format!(
                            "dissimilarity between points {} and {} must be finite and non-negative, got {}",
                            i, j, d
                        ),
                    ));
                }
                values[[i, j]] = d;
                values[[j, i]] = d;
            }
        }

        debug!(
            "Built {}x{} dissimilarity matrix from {} metric evaluations",
            n,
            n,
            n * (n - 1) / 2
        );
        Ok(DissimilarityMatrix { values })
    }

    /// Wraps a precomputed array, checking shape, symmetry and the zero diagonal.
    pub fn from_array(values: Array2<f64>) -> Result<Self> {
        let (rows, cols) = values.dim();
        if rows != cols {
            return Err(DimredError::invalid_configuration(
                "dissimilarity matrix",
                format!("matrix must be square, got {}x{}", rows, cols),
            ));
        }
        if rows < 2 {
            return Err(DimredError::invalid_configuration(
                "dissimilarity matrix",
                format!("at least two points are required, got {}", rows),
            ));
        }

        for i in 0..rows {
            if values[[i, i]] != 0.0 {
                return Err(DimredError::invalid_configuration(
                    "dissimilarity matrix",
                    format!("diagonal entry {} is {}, expected 0", i, values[[i, i]]),
                ));
            }
            for j in 0..i {
                let d = values[[i, j]];
                if d != values[[j, i]] {
                    return Err(DimredError::invalid_configuration(
                        "dissimilarity matrix",
                        format!("entries ({}, {}) and ({}, {}) differ", i, j, j, i),
                    ));
                }
                if !d.is_finite() || d < 0.0 {
                    return Err(DimredError::invalid_configuration(
                        "dissimilarity matrix",
                        format!("entry ({}, {}) must be finite and non-negative, got {}", i, j, d),
                    ));
                }
            }
        }

        Ok(DissimilarityMatrix { values })
    }

    pub fn size(&self) -> usize {
        self.values.nrows()
    }

    pub fn get(&self, i: usize, j: usize) -> Result<f64> {
        check_index("dissimilarity matrix", i, self.size())?;
        check_index("dissimilarity matrix", j, self.size())?;
        Ok(self.values[[i, j]])
    }

    pub fn row(&self, i: usize) -> Result<ArrayView1<'_, f64>> {
        check_index("dissimilarity matrix", i, self.size())?;
        Ok(self.values.row(i))
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn into_inner(self) -> Array2<f64> {
        self.values
    }
}

impl PointSet for DissimilarityMatrix {
    fn size(&self) -> usize {
        self.values.nrows()
    }

    fn raw_dissimilarity(&self, i: usize, j: usize) -> f64 {
        self.values[[i, j]]
    }
}

/// Pairwise dissimilarity between two feature rows.
///
/// Must be non-negative. Plain functions over two rows implement it.
pub trait DissimilarityMeasure {
    fn calculate(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64;
}

impl<F> DissimilarityMeasure for F
where
    F: Fn(ArrayView1<f64>, ArrayView1<f64>) -> f64,
{
    fn calculate(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        self(a, b)
    }
}

/// Point set over the rows of a feature matrix with a caller-supplied measure.
///
/// The crate ships no measure of its own.
pub struct FeaturePointSet<'a, M> {
    data: ArrayView2<'a, f64>,
    measure: M,
}

impl<'a, M: DissimilarityMeasure> FeaturePointSet<'a, M> {
    pub fn new(data: ArrayView2<'a, f64>, measure: M) -> Self {
        FeaturePointSet { data, measure }
    }

    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }

    pub fn measure(&self) -> &M {
        &self.measure
    }
}

impl<M: DissimilarityMeasure> PointSet for FeaturePointSet<'_, M> {
    fn size(&self) -> usize {
        self.data.nrows()
    }

    fn raw_dissimilarity(&self, i: usize, j: usize) -> f64 {
        self.measure.calculate(self.data.row(i), self.data.row(j))
    }
}
