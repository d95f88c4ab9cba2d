pub mod dimred;
pub mod dissimilarity;
pub mod error;
pub mod export;
mod utils;

pub use dimred::{
    ClassicalMds, Embedding, EmbeddingAlgorithm, InputSource, Projection, ReductionStage,
    ReductionStageBuilder, StageChain, StageConfig, StageInput,
};
pub use dissimilarity::{DissimilarityMatrix, DissimilarityMeasure, FeaturePointSet, PointSet};
pub use error::{DimredError, Result};
pub use export::{
    DissimilaritySource, ExportConfig, InputDissimilarities, MatrixExporter, MatrixExporterBuilder,
    NumberFormat, OutputDissimilarities,
};
