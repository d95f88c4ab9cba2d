//! # Matrix export
//!
//! Writes any `N × N` dissimilarity source to a text file, row-major, one line per row.
//! Every value is preceded by a single space and rendered with a caller-supplied
//! printf-style format (see [`NumberFormat`]).

use crate::dimred::Projection;
use crate::dissimilarity::DissimilarityMatrix;
use crate::error::{DimredError, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

mod format;

pub use format::NumberFormat;

/// Anything with `N` data points and a pairwise dissimilarity.
pub trait DissimilaritySource {
    fn n_points(&self) -> usize;

    fn dissimilarity(&self, i: usize, j: usize) -> Result<f64>;
}

impl DissimilaritySource for DissimilarityMatrix {
    fn n_points(&self) -> usize {
        self.size()
    }

    fn dissimilarity(&self, i: usize, j: usize) -> Result<f64> {
        self.get(i, j)
    }
}

/// The dissimilarities a stage reads as its input.
pub struct InputDissimilarities<'s>(pub &'s dyn Projection);

impl DissimilaritySource for InputDissimilarities<'_> {
    fn n_points(&self) -> usize {
        self.0.n_points()
    }

    fn dissimilarity(&self, i: usize, j: usize) -> Result<f64> {
        self.0.input_dissimilarity(i, j)
    }
}

/// The dissimilarities induced by a stage's embedding.
pub struct OutputDissimilarities<'s>(pub &'s dyn Projection);

impl DissimilaritySource for OutputDissimilarities<'_> {
    fn n_points(&self) -> usize {
        self.0.n_points()
    }

    fn dissimilarity(&self, i: usize, j: usize) -> Result<f64> {
        self.0.output_dissimilarity(i, j)
    }
}

/// Already-parsed exporter settings as handed over by a host framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Destination file. Compulsory.
    pub file: Option<PathBuf>,
    pub fmt: String,
    /// Move an existing destination aside instead of overwriting it.
    pub backup: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file: None,
            fmt: "%f".to_string(),
            backup: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MatrixExporterBuilder {
    config: ExportConfig,
}

impl MatrixExporterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ExportConfig) -> Self {
        self.config = config;
        self
    }

    pub fn file(mut self, file: impl Into<PathBuf>) -> Self {
        self.config.file = Some(file.into());
        self
    }

    pub fn fmt(mut self, fmt: impl Into<String>) -> Self {
        self.config.fmt = fmt.into();
        self
    }

    pub fn backup(mut self, backup: bool) -> Self {
        self.config.backup = backup;
        self
    }

    pub fn build(self) -> Result<MatrixExporter> {
        let path = match self.config.file {
            Some(path) if !path.as_os_str().is_empty() => path,
            _ => {
                return Err(DimredError::invalid_configuration(
                    "matrix exporter",
                    "name of file on which to output the data is compulsory",
                ))
            }
        };
        let format = NumberFormat::parse(&self.config.fmt)?;
        info!(
            "Printing to file named {} with format {}",
            path.display(),
            format
        );

        Ok(MatrixExporter {
            path,
            format,
            backup: self.config.backup,
        })
    }
}

/// Row-major text dump of a dissimilarity source.
#[derive(Debug, Clone)]
pub struct MatrixExporter {
    path: PathBuf,
    format: NumberFormat,
    backup: bool,
}

impl MatrixExporter {
    pub fn builder() -> MatrixExporterBuilder {
        MatrixExporterBuilder::new()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> &NumberFormat {
        &self.format
    }

    /// Renders the whole matrix. Fails without partial output if any query fails.
    pub fn render(&self, source: &dyn DissimilaritySource) -> Result<String> {
        let n = source.n_points();
        let mut out = String::new();
        for i in 0..n {
            for j in 0..n {
                out.push(' ');
                out.push_str(&self.format.format(source.dissimilarity(i, j)?));
            }
            out.push('\n');
        }
        Ok(out)
    }

    /// Renders `source` and writes it to the configured file.
    pub fn write(&self, source: &dyn DissimilaritySource) -> Result<()> {
        let text = self.render(source)?;
        if self.backup {
            self.backup_existing()?;
        }

        let file = fs::File::create(&self.path).map_err(|e| DimredError::io(&self.path, e))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(text.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|e| DimredError::io(&self.path, e))?;

        debug!(
            "Wrote {}x{} matrix to {}",
            source.n_points(),
            source.n_points(),
            self.path.display()
        );
        Ok(())
    }

    /// Moves an existing destination to `analysis.<k>.<name>` with the smallest free `k`.
    fn backup_existing(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let name = self
            .path
            .file_name()
            .ok_or_else(|| {
                DimredError::invalid_configuration(
                    "matrix exporter",
                    format!("{} does not name a file", self.path.display()),
                )
            })?
            .to_string_lossy()
            .into_owned();

        let backup = (0..)
            .map(|k| self.path.with_file_name(format!("analysis.{}.{}", k, name)))
            .find(|candidate| !candidate.exists())
            .ok_or_else(|| {
                DimredError::invalid_configuration("matrix exporter", "no free backup name")
            })?;

        warn!(
            "Backing up existing {} to {}",
            self.path.display(),
            backup.display()
        );
        fs::rename(&self.path, &backup).map_err(|e| DimredError::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimred::{ClassicalMds, ReductionStageBuilder};
    use ndarray::{array, Array2};

    fn triangle() -> DissimilarityMatrix {
        DissimilarityMatrix::from_array(array![[0.0, 3.0, 4.0], [3.0, 0.0, 5.0], [4.0, 5.0, 0.0]])
            .unwrap()
    }

    fn leading_column(targets: &DissimilarityMatrix, n_low: usize) -> anyhow::Result<Array2<f64>> {
        Ok(Array2::from_shape_fn((targets.size(), n_low), |(i, _)| {
            targets.view()[[i, 0]]
        }))
    }

    #[test]
    fn test_triangle_rows() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = MatrixExporter::builder()
            .file(dir.path().join("dissims.dat"))
            .fmt("%6.2f")
            .build()
            .unwrap();
        exporter.write(&triangle()).unwrap();

        let text = fs::read_to_string(exporter.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "   0.00   3.00   4.00",
                "   3.00   0.00   5.00",
                "   4.00   5.00   0.00"
            ]
        );
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_existing_file_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dissims.dat");
        fs::write(&path, "old\n").unwrap();
        fs::write(dir.path().join("analysis.0.dissims.dat"), "older\n").unwrap();

        let exporter = MatrixExporter::builder()
            .file(&path)
            .fmt("%.1f")
            .build()
            .unwrap();
        exporter.write(&triangle()).unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("analysis.1.dissims.dat")).unwrap(),
            "old\n"
        );
        assert!(fs::read_to_string(&path).unwrap().starts_with(" 0.0 3.0 4.0\n"));
    }

    #[test]
    fn test_overwrite_without_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dissims.dat");
        fs::write(&path, "old\n").unwrap();

        let exporter = MatrixExporter::builder()
            .file(&path)
            .backup(false)
            .build()
            .unwrap();
        exporter.write(&triangle()).unwrap();

        assert!(!dir.path().join("analysis.0.dissims.dat").exists());
        assert!(fs::read_to_string(&path)
            .unwrap()
            .starts_with(" 0.000000 3.000000 4.000000\n"));
    }

    #[test]
    fn test_unwritable_destination() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = MatrixExporter::builder()
            .file(dir.path().join("missing").join("dissims.dat"))
            .build()
            .unwrap();
        assert!(matches!(
            exporter.write(&triangle()),
            Err(DimredError::Io { .. })
        ));
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(
            MatrixExporter::builder().fmt("%6.2f").build(),
            Err(DimredError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            MatrixExporter::builder().file("out.dat").fmt("%d").build(),
            Err(DimredError::InvalidConfiguration { .. })
        ));

        let config: ExportConfig =
            serde_json::from_str(r#"{"file": "out.dat", "fmt": "%8.4f"}"#).unwrap();
        assert!(config.backup);
        let exporter = MatrixExporter::builder().config(config).build().unwrap();
        assert_eq!(exporter.format().as_str(), "%8.4f");
        assert_eq!(exporter.path(), Path::new("out.dat"));
    }

    #[test]
    fn test_stage_sources() {
        let data = triangle();
        let stage = ReductionStageBuilder::new(leading_column)
            .n_low(1)
            .data(&data)
            .build()
            .unwrap();
        let exporter = MatrixExporter::builder()
            .file("unused.dat")
            .fmt("%g")
            .build()
            .unwrap();

        assert!(matches!(
            exporter.render(&OutputDissimilarities(&stage)),
            Err(DimredError::InvalidState { .. })
        ));
        assert_eq!(
            exporter.render(&InputDissimilarities(&stage)).unwrap(),
            exporter.render(&data).unwrap()
        );

        stage.perform_analysis().unwrap();
        assert_eq!(
            exporter.render(&OutputDissimilarities(&stage)).unwrap(),
            " 0 9 16\n 9 0 1\n 16 1 0\n"
        );
    }

    #[test]
    fn test_mds_projection_export() {
        let data = triangle();
        let stage = ReductionStageBuilder::new(ClassicalMds::new().square_input(true))
            .n_low(2)
            .data(&data)
            .build()
            .unwrap();
        stage.perform_analysis().unwrap();

        let exporter = MatrixExporter::builder()
            .file("unused.dat")
            .fmt("%6.2f")
            .build()
            .unwrap();
        // a 3-4-5 triangle embeds exactly in the plane
        assert_eq!(
            exporter.render(&OutputDissimilarities(&stage)).unwrap(),
            "   0.00   9.00  16.00\n   9.00   0.00  25.00\n  16.00  25.00   0.00\n"
        );
    }
}
