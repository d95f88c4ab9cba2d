//! # Dimensionality Reduction
//!
//! This module turns a symmetric dissimilarity matrix into a low-dimensional embedding and
//! lets reduction stages be chained, so that a later stage consumes either the original
//! dissimilarities or the ones induced by an earlier stage's embedding.
//!
//! ## Building blocks
//! - [`EmbeddingAlgorithm`]: the pluggable `embed(matrix) -> coordinates` contract
//! - [`ReductionStage`]: configures a target dimensionality, resolves its input
//!   dissimilarities and owns the resulting [`Embedding`]
//! - [`StageChain`]: runs registered stages upstream-to-downstream
//! - [`ClassicalMds`]: reference algorithm (Torgerson scaling)
//!
//! ## Induced dissimilarities
//! The output dissimilarity of a stage is the **squared** Euclidean distance between two
//! embedding rows. Downstream algorithms that need true distances have to take the square
//! root themselves.

use crate::dissimilarity::DissimilarityMatrix;
use crate::error::{check_index, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};

mod chain;
mod mds;
mod stage;

pub use chain::StageChain;
pub use mds::ClassicalMds;
pub use stage::{InputSource, ReductionStage, ReductionStageBuilder, StageConfig, StageInput};

/// Contract every embedding algorithm has to satisfy.
///
/// Receives the `N × N` symmetric, non-negative target matrix and returns an `N × n_low`
/// coordinate matrix. Must be deterministic for a fixed matrix and `n_low`.
pub trait EmbeddingAlgorithm: Send + Sync {
    fn embed(&self, targets: &DissimilarityMatrix, n_low: usize) -> anyhow::Result<Array2<f64>>;
}

impl<F> EmbeddingAlgorithm for F
where
    F: Fn(&DissimilarityMatrix, usize) -> anyhow::Result<Array2<f64>> + Send + Sync,
{
    fn embed(&self, targets: &DissimilarityMatrix, n_low: usize) -> anyhow::Result<Array2<f64>> {
        self(targets, n_low)
    }
}

/// A reduction step that produces a projection a downstream stage can read from.
pub trait Projection {
    fn label(&self) -> &str;

    /// Number of data points projected.
    fn n_points(&self) -> usize;

    /// Dimensionality of the projection.
    fn n_low(&self) -> usize;

    fn is_embedded(&self) -> bool;

    /// The projection this one reads its dissimilarities from, if any.
    fn upstream(&self) -> Option<&dyn Projection>;

    /// Whether this step reads the upstream's projection rather than its input.
    fn reads_projection(&self) -> bool;

    /// Dissimilarity between `i` and `j` as seen by this step's input.
    fn input_dissimilarity(&self, i: usize, j: usize) -> Result<f64>;

    /// Squared Euclidean distance between the projections of `i` and `j`.
    fn output_dissimilarity(&self, i: usize, j: usize) -> Result<f64>;

    /// Writes the projection of point `i` into `point`, resized to exactly `n_low` values.
    fn output_for_point(&self, i: usize, point: &mut Vec<f64>) -> Result<()>;

    /// Computes the projection from scratch.
    fn perform_analysis(&self) -> Result<()>;
}

/// `N × K` coordinates produced by an embedding algorithm, frozen after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    coordinates: Array2<f64>,
}

impl Embedding {
    /// Checks the algorithm's output against the expected shape.
    pub(crate) fn new(
        coordinates: Array2<f64>,
        n_points: usize,
        n_low: usize,
    ) -> anyhow::Result<Self> {
        if coordinates.dim() != (n_points, n_low) {
            anyhow::bail!(
                "expected {}x{} coordinates, got {}x{}",
                n_points,
                n_low,
                coordinates.nrows(),
                coordinates.ncols()
            );
        }
        if let Some(bad) = coordinates.iter().find(|v| !v.is_finite()) {
            anyhow::bail!("embedding contains a non-finite coordinate ({})", bad);
        }
        Ok(Embedding { coordinates })
    }

    pub fn n_points(&self) -> usize {
        self.coordinates.nrows()
    }

    pub fn n_low(&self) -> usize {
        self.coordinates.ncols()
    }

    pub fn point(&self, i: usize) -> Result<ArrayView1<'_, f64>> {
        check_index("embedding", i, self.n_points())?;
        Ok(self.coordinates.row(i))
    }

    /// `Σ_k (E[i,k] - E[j,k])²`, no square root taken.
    pub fn squared_distance(&self, i: usize, j: usize) -> Result<f64> {
        check_index("embedding", i, self.n_points())?;
        check_index("embedding", j, self.n_points())?;
        let mut dissim = 0.0;
        for k in 0..self.n_low() {
            let tmp = self.coordinates[[i, k]] - self.coordinates[[j, k]];
            dissim += tmp * tmp;
        }
        Ok(dissim)
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.coordinates.view()
    }

    pub fn into_inner(self) -> Array2<f64> {
        self.coordinates
    }
}
