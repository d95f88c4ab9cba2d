//! # Reduction stages
//!
//! A [`ReductionStage`] owns one embedding of the data. Its input dissimilarities come from
//! exactly one place, resolved once at construction into an [`InputSource`]:
//! the raw point set, an upstream stage's input (passed through unchanged), or an upstream
//! stage's projection.
//!
//! A stage is either unembedded or embedded. [`ReductionStage::perform_analysis`] moves it
//! from the first state to the second; queries that need the embedding fail with
//! [`DimredError::InvalidState`] before that.

use crate::dimred::{Embedding, EmbeddingAlgorithm, Projection};
use crate::dissimilarity::{DissimilarityMatrix, PointSet};
use crate::error::{check_index, DimredError, Result};
use crate::utils::ZeroVec;
use log::{debug, info};
use ndarray::Array1;
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Already-parsed stage settings as handed over by a host framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub label: String,
    /// Number of low-dimensional coordinates. Compulsory.
    pub n_low: Option<usize>,
    /// Run on the projection generated by the upstream stage instead of its input.
    pub run_on_projection: bool,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            label: "dimred".to_string(),
            n_low: None,
            run_on_projection: false,
        }
    }
}

/// What a stage was configured to read from, before validation.
#[derive(Clone, Copy)]
pub enum StageInput<'a> {
    Data(&'a dyn PointSet),
    Stage(&'a dyn Projection),
}

/// Where a validated stage reads its input dissimilarities from.
#[derive(Clone, Copy)]
pub enum InputSource<'a> {
    /// Raw dissimilarities of the point set.
    Raw(&'a dyn PointSet),
    /// The upstream stage's own input dissimilarities.
    PassThrough(&'a dyn Projection),
    /// Squared distances between the upstream stage's projections.
    Projection(&'a dyn Projection),
}

impl<'a> InputSource<'a> {
    pub fn upstream(&self) -> Option<&'a dyn Projection> {
        match *self {
            InputSource::Raw(_) => None,
            InputSource::PassThrough(stage) | InputSource::Projection(stage) => Some(stage),
        }
    }

    fn n_points(&self) -> usize {
        match *self {
            InputSource::Raw(points) => points.size(),
            InputSource::PassThrough(stage) | InputSource::Projection(stage) => stage.n_points(),
        }
    }
}

impl fmt::Debug for InputSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Raw(points) => write!(f, "Raw({} points)", points.size()),
            InputSource::PassThrough(stage) => write!(f, "PassThrough({})", stage.label()),
            InputSource::Projection(stage) => write!(f, "Projection({})", stage.label()),
        }
    }
}

enum StageState {
    Unembedded,
    Embedded {
        targets: DissimilarityMatrix,
        embedding: Embedding,
    },
}

/// Builder for configuring and validating [`ReductionStage`] instances.
///
/// # Example Usage
/// ```ignore
/// let stage = ReductionStageBuilder::new(ClassicalMds::new())
///     .label("mds")
///     .n_low(2)
///     .data(&points)
///     .build()?;
/// stage.perform_analysis()?;
/// ```
pub struct ReductionStageBuilder<'a, A: EmbeddingAlgorithm> {
    label: String,
    n_low: Option<usize>,
    run_on_projection: bool,
    input: Option<StageInput<'a>>,
    algorithm: Arc<A>,
}

impl<'a, A: EmbeddingAlgorithm> ReductionStageBuilder<'a, A> {
    pub fn new(algorithm: A) -> Self {
        Self::with_shared_algorithm(Arc::new(algorithm))
    }

    /// Starts from an algorithm instance shared with other stages.
    pub fn with_shared_algorithm(algorithm: Arc<A>) -> Self {
        let defaults = StageConfig::default();
        ReductionStageBuilder {
            label: defaults.label,
            n_low: defaults.n_low,
            run_on_projection: defaults.run_on_projection,
            input: None,
            algorithm,
        }
    }

    /// Applies every setting of a host-provided configuration.
    pub fn config(mut self, config: StageConfig) -> Self {
        self.label = config.label;
        self.n_low = config.n_low;
        self.run_on_projection = config.run_on_projection;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn n_low(mut self, n_low: usize) -> Self {
        self.n_low = Some(n_low);
        self
    }

    pub fn run_on_projection(mut self, run_on_projection: bool) -> Self {
        self.run_on_projection = run_on_projection;
        self
    }

    pub fn input(mut self, input: StageInput<'a>) -> Self {
        self.input = Some(input);
        self
    }

    /// Reads raw dissimilarities from a point set.
    pub fn data(self, points: &'a dyn PointSet) -> Self {
        self.input(StageInput::Data(points))
    }

    /// Reads from an upstream stage; see [`run_on_projection`](Self::run_on_projection).
    pub fn upstream(self, stage: &'a dyn Projection) -> Self {
        self.input(StageInput::Stage(stage))
    }

    /// Validates the configuration and resolves the input source.
    pub fn build(self) -> Result<ReductionStage<'a, A>> {
        let context = format!("stage {}", self.label);

        let n_low = match self.n_low {
            Some(n) if n >= 1 => n,
            Some(_) => {
                return Err(DimredError::invalid_configuration(
                    context,
                    "dimensionality of low dimensional space must be at least one",
                ))
            }
            None => {
                return Err(DimredError::invalid_configuration(
                    context,
                    "number of low-dimensional coordinates is compulsory",
                ))
            }
        };
        info!("Stage {}: projecting in {} dimensional space", self.label, n_low);

        let source = match (self.input, self.run_on_projection) {
            (Some(StageInput::Stage(stage)), true) => InputSource::Projection(stage),
            (_, true) => {
                return Err(DimredError::invalid_configuration(
                    context,
                    "expected a projection-producing upstream but input is not a projection",
                ))
            }
            (Some(StageInput::Stage(stage)), false) => InputSource::PassThrough(stage),
            (Some(StageInput::Data(points)), false) if points.dissimilarities_available() => {
                InputSource::Raw(points)
            }
            (Some(StageInput::Data(_)), false) | (None, false) => {
                return Err(DimredError::invalid_configuration(
                    context,
                    "dissimilarities have not been calculated in input",
                ))
            }
        };

        let n_points = source.n_points();
        if n_points < 2 {
            return Err(DimredError::invalid_configuration(
                context,
                format!("at least two points are required, got {}", n_points),
            ));
        }
        debug!("Stage {}: reading {:?} over {} points", self.label, source, n_points);

        Ok(ReductionStage {
            label: self.label,
            n_low,
            n_points,
            source,
            algorithm: self.algorithm,
            state: RwLock::new(StageState::Unembedded),
        })
    }
}

/// Dimensionality reduction stage over a symmetric dissimilarity matrix.
///
/// # Type Parameters
/// - `A`: The embedding algorithm turning the target matrix into coordinates
pub struct ReductionStage<'a, A: EmbeddingAlgorithm> {
    label: String,
    n_low: usize,
    n_points: usize,
    source: InputSource<'a>,
    algorithm: Arc<A>,
    state: RwLock<StageState>,
}

impl<'a, A: EmbeddingAlgorithm> ReductionStage<'a, A> {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn n_low(&self) -> usize {
        self.n_low
    }

    pub fn n_points(&self) -> usize {
        self.n_points
    }

    pub fn input_source(&self) -> InputSource<'a> {
        self.source
    }

    pub fn is_embedded(&self) -> bool {
        matches!(*self.state.read(), StageState::Embedded { .. })
    }

    /// Names of the output coordinates: `label.1` to `label.K`.
    pub fn coordinate_names(&self) -> Vec<String> {
        (1..=self.n_low)
            .map(|k| format!("{}.{}", self.label, k))
            .collect()
    }

    /// Resolves the input dissimilarity of `i` and `j` through the chain.
    pub fn input_dissimilarity(&self, i: usize, j: usize) -> Result<f64> {
        check_index(&self.label, i, self.n_points)?;
        check_index(&self.label, j, self.n_points)?;
        match self.source {
            InputSource::Projection(stage) => stage.output_dissimilarity(i, j),
            InputSource::PassThrough(stage) => stage.input_dissimilarity(i, j),
            InputSource::Raw(points) => Ok(match i.cmp(&j) {
                std::cmp::Ordering::Equal => 0.0,
                std::cmp::Ordering::Greater => points.raw_dissimilarity(i, j),
                std::cmp::Ordering::Less => points.raw_dissimilarity(j, i),
            }),
        }
    }

    /// Squared Euclidean distance between embedding rows `i` and `j`.
    pub fn output_dissimilarity(&self, i: usize, j: usize) -> Result<f64> {
        self.embedding()?.squared_distance(i, j)
    }

    /// Copies embedding row `i` into `point`, resizing it to exactly `n_low` values first.
    pub fn output_for_point(&self, i: usize, point: &mut Vec<f64>) -> Result<()> {
        let embedding = self.embedding()?;
        let row = embedding.point(i)?;
        point.zero_len(self.n_low);
        for (dst, &src) in point.iter_mut().zip(row.iter()) {
            *dst = src;
        }
        Ok(())
    }

    pub fn point(&self, i: usize) -> Result<Array1<f64>> {
        Ok(self.embedding()?.point(i)?.to_owned())
    }

    /// Read access to the frozen embedding.
    pub fn embedding(&self) -> Result<MappedRwLockReadGuard<'_, Embedding>> {
        RwLockReadGuard::try_map(self.state.read(), |state| match state {
            StageState::Embedded { embedding, .. } => Some(embedding),
            StageState::Unembedded => None,
        })
        .map_err(|_| self.not_embedded())
    }

    /// The `N × N` matrix the last pass embedded.
    pub fn target_matrix(&self) -> Result<MappedRwLockReadGuard<'_, DissimilarityMatrix>> {
        RwLockReadGuard::try_map(self.state.read(), |state| match state {
            StageState::Embedded { targets, .. } => Some(targets),
            StageState::Unembedded => None,
        })
        .map_err(|_| self.not_embedded())
    }

    /// Builds the target matrix from the input dissimilarities and embeds it.
    ///
    /// Every call recomputes from scratch. A failed pass leaves the stage unembedded.
    pub fn perform_analysis(&self) -> Result<()> {
        *self.state_mut()? = StageState::Unembedded;
        info!(
            "Stage {}: embedding {} points from {:?}",
            self.label, self.n_points, self.source
        );

        let targets =
            DissimilarityMatrix::build_with(self.n_points, |i, j| self.input_dissimilarity(i, j))?;

        let coordinates = self
            .algorithm
            .embed(&targets, self.n_low)
            .map_err(|source| self.embedding_failed(source))?;
        let embedding = Embedding::new(coordinates, self.n_points, self.n_low)
            .map_err(|source| self.embedding_failed(source))?;

        *self.state_mut()? = StageState::Embedded { targets, embedding };
        info!("Stage {}: embedding complete", self.label);
        Ok(())
    }

    /// Fails instead of blocking while a guard from [`Self::embedding`] or
    /// [`Self::target_matrix`] is alive.
    fn state_mut(&self) -> Result<RwLockWriteGuard<'_, StageState>> {
        self.state.try_write().ok_or_else(|| {
            DimredError::invalid_state(
                format!("stage {}", self.label),
                "stage is being read while a new pass was requested",
            )
        })
    }

    fn not_embedded(&self) -> DimredError {
        DimredError::invalid_state(
            format!("stage {}", self.label),
            "projection requested before the embedding was computed",
        )
    }

    fn embedding_failed(&self, source: anyhow::Error) -> DimredError {
        DimredError::Embedding {
            stage: self.label.clone(),
            source,
        }
    }
}

impl<A: EmbeddingAlgorithm> Projection for ReductionStage<'_, A> {
    fn label(&self) -> &str {
        ReductionStage::label(self)
    }

    fn n_points(&self) -> usize {
        ReductionStage::n_points(self)
    }

    fn n_low(&self) -> usize {
        ReductionStage::n_low(self)
    }

    fn is_embedded(&self) -> bool {
        ReductionStage::is_embedded(self)
    }

    fn upstream(&self) -> Option<&dyn Projection> {
        self.source.upstream()
    }

    fn reads_projection(&self) -> bool {
        matches!(self.source, InputSource::Projection(_))
    }

    fn input_dissimilarity(&self, i: usize, j: usize) -> Result<f64> {
        ReductionStage::input_dissimilarity(self, i, j)
    }

    fn output_dissimilarity(&self, i: usize, j: usize) -> Result<f64> {
        ReductionStage::output_dissimilarity(self, i, j)
    }

    fn output_for_point(&self, i: usize, point: &mut Vec<f64>) -> Result<()> {
        ReductionStage::output_for_point(self, i, point)
    }

    fn perform_analysis(&self) -> Result<()> {
        ReductionStage::perform_analysis(self)
    }
}
