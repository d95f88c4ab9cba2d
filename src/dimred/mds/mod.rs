//! # Classical Multidimensional Scaling
//!
//! Torgerson scaling: double-centre the matrix of squared dissimilarities and project onto
//! the leading eigenvectors of the result.

use crate::dimred::EmbeddingAlgorithm;
use crate::dissimilarity::DissimilarityMatrix;
use anyhow::bail;
use log::debug;
use nalgebra::SymmetricEigen;
use ndarray::{Array2, Axis};
use nshare::IntoNalgebra;
use std::cmp::Ordering;

/// Classical (metric) MDS embedding algorithm.
///
/// By default the target matrix is taken to hold **squared** distances, which is what the
/// output dissimilarity of an upstream stage provides. Enable
/// [`square_input`](Self::square_input) when the targets are plain distances.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClassicalMds {
    square_input: bool,
}

impl ClassicalMds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Square every target before double centring.
    pub fn square_input(mut self, square_input: bool) -> Self {
        self.square_input = square_input;
        self
    }

    fn gram_matrix(&self, targets: &DissimilarityMatrix) -> anyhow::Result<Array2<f64>> {
        let mut d2 = targets.view().to_owned();
        if self.square_input {
            d2.mapv_inplace(|d| d * d);
        }

        let means = d2
            .mean_axis(Axis(1))
            .ok_or_else(|| anyhow::anyhow!("Cannot centre an empty matrix"))?;
        let grand_mean = means.mean().unwrap_or(0.0);

        let n = d2.nrows();
        Ok(Array2::from_shape_fn((n, n), |(i, j)| {
            -0.5 * (d2[[i, j]] - means[i] - means[j] + grand_mean)
        }))
    }
}

impl EmbeddingAlgorithm for ClassicalMds {
    fn embed(&self, targets: &DissimilarityMatrix, n_low: usize) -> anyhow::Result<Array2<f64>> {
        let n = targets.size();
        if n_low > n {
            bail!(
                "Cannot embed {} points in {} dimensions with classical MDS",
                n,
                n_low
            );
        }

        let gram = self.gram_matrix(targets)?;
        let eigen = SymmetricEigen::new(gram.view().into_nalgebra().clone_owned());

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            eigen.eigenvalues[b]
                .partial_cmp(&eigen.eigenvalues[a])
                .unwrap_or(Ordering::Equal)
        });

        let mut coordinates = Array2::<f64>::zeros((n, n_low));
        for (k, &idx) in order.iter().take(n_low).enumerate() {
            let scale = eigen.eigenvalues[idx].max(0.0).sqrt();
            let vector = eigen.eigenvectors.column(idx);

            // Eigenvector signs are arbitrary; pin the largest component to be positive.
            let pivot = vector
                .iter()
                .fold(0.0_f64, |acc, &v| if v.abs() > acc.abs() { v } else { acc });
            let sign = if pivot < 0.0 { -1.0 } else { 1.0 };

            for i in 0..n {
                coordinates[[i, k]] = sign * scale * vector[i];
            }
        }

        debug!(
            "Classical MDS kept eigenvalues {:?} of {} points",
            order
                .iter()
                .take(n_low)
                .map(|&idx| eigen.eigenvalues[idx])
                .collect::<Vec<_>>(),
            n
        );
        Ok(coordinates)
    }
}
