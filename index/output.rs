// ========================================================================================
//
//                          Result files of an MPI analysis
//
// ========================================================================================
//
// An analysis of `households.csv` produces, next to the input by default:
//
//   households_scored.csv          the input table plus score and poverty flag
//   households_deprivation.csv     uncensored deprivation rate per indicator
//   households_contributions.csv   indicator contributions to the index
//   households_weights.csv         the resolved indicator weights
//   households_summary.toml        headline statistics, weights, domain breakdown
//
// Existing files are never silently replaced.

use crate::analysis::{DeprivationProportion, DomainContribution, IndicatorContribution};
use crate::compute::{MpiStats, ScoredObservations};
use crate::types::{ResolvedWeights, WeightEntry};
use log::info;
use polars::prelude::{CsvWriter, DataFrame, NamedFrom, PolarsError, SerWriter, Series};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SCORE_COLUMN: &str = "Deprivation_Score";
pub const POOR_COLUMN: &str = "Is_Poor";

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Failed to write CSV table: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Failed to parse TOML summary file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize summary to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error(
        "Output file '{0}' already exists. mpindex will not overwrite it. Remove it, rename it, or pass --force."
    )]
    AlreadyExists(PathBuf),
    #[error(
        "Output file '{0}' would be written twice in one run. Choose a scored table path that does not collide with the other result files."
    )]
    DuplicatePath(PathBuf),
    #[error("Scores cover {scores} observations but the table has {rows} rows.")]
    RowCountMismatch { scores: usize, rows: usize },
}

/// Where each result file goes.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub scored: PathBuf,
    pub deprivation: PathBuf,
    pub contributions: PathBuf,
    pub weights: PathBuf,
    pub summary: PathBuf,
}

impl OutputPaths {
    /// Derives every path from the input file. An explicit `scored` path moves the
    /// scored table; the other files follow it into the same directory.
    pub fn derive(data_path: &Path, scored: Option<&Path>) -> Self {
        let stem = data_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "mpi".to_string());

        let default_dir = match data_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => Path::new(".").to_path_buf(),
        };

        let (scored, dir) = match scored {
            Some(path) => {
                let dir = match path.parent() {
                    Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                    _ => Path::new(".").to_path_buf(),
                };
                (path.to_path_buf(), dir)
            }
            None => (
                default_dir.join(format!("{stem}_scored.csv")),
                default_dir,
            ),
        };

        Self {
            scored,
            deprivation: dir.join(format!("{stem}_deprivation.csv")),
            contributions: dir.join(format!("{stem}_contributions.csv")),
            weights: dir.join(format!("{stem}_weights.csv")),
            summary: dir.join(format!("{stem}_summary.toml")),
        }
    }

    pub fn all(&self) -> [&Path; 5] {
        [
            &self.scored,
            &self.deprivation,
            &self.contributions,
            &self.weights,
            &self.summary,
        ]
    }

    /// Fails when two result files resolve to the same path.
    pub fn ensure_distinct(&self) -> Result<(), OutputError> {
        let paths = self.all();
        for (i, path) in paths.iter().enumerate() {
            if paths[..i].contains(path) {
                return Err(OutputError::DuplicatePath(path.to_path_buf()));
            }
        }
        Ok(())
    }

    /// Fails on the first path that already exists.
    pub fn ensure_absent(&self) -> Result<(), OutputError> {
        for path in self.all() {
            if path.exists() {
                return Err(OutputError::AlreadyExists(path.to_path_buf()));
            }
        }
        Ok(())
    }
}

/// Appends the score and poverty columns to a copy of the input frame.
pub fn scored_frame(frame: &DataFrame, scored: &ScoredObservations) -> Result<DataFrame, OutputError> {
    if frame.height() != scored.scores.len() {
        return Err(OutputError::RowCountMismatch {
            scores: scored.scores.len(),
            rows: frame.height(),
        });
    }
    let mut out = frame.clone();
    out.with_column(Series::new(SCORE_COLUMN.into(), scored.scores.to_vec()))?;
    out.with_column(Series::new(POOR_COLUMN.into(), scored.is_poor.clone()))?;
    Ok(out)
}

/// Writes the scored table comma-separated, like every other result table.
pub fn write_scored_table(frame: &mut DataFrame, path: &Path) -> Result<(), OutputError> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(frame)?;
    info!("Scored table written to {}", path.display());
    Ok(())
}

/// Writes serializable rows as a CSV table with a header.
pub fn write_rows<T: Serialize>(rows: &[T], path: &Path) -> Result<(), OutputError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct WeightRow<'a> {
    #[serde(rename = "Indicator")]
    indicator: &'a str,
    #[serde(rename = "Weight")]
    weight: f64,
}

pub fn write_weights(weights: &[WeightEntry], path: &Path) -> Result<(), OutputError> {
    let rows: Vec<WeightRow> = weights
        .iter()
        .map(|e| WeightRow {
            indicator: &e.name,
            weight: e.weight,
        })
        .collect();
    write_rows(&rows, path)
}

/// The self-contained record of one analysis, saved as TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpiSummary {
    pub source: String,
    pub poverty_threshold: f64,
    pub mpi_stats: MpiStats,
    pub indicator_weights: Vec<WeightEntry>,
    pub domain_weights: Vec<WeightEntry>,
    pub domain_contributions: Vec<DomainContribution>,
}

impl MpiSummary {
    pub fn new(
        source: &Path,
        poverty_threshold: f64,
        stats: MpiStats,
        weights: &ResolvedWeights,
        domain_contributions: &[DomainContribution],
    ) -> Self {
        Self {
            source: source.display().to_string(),
            poverty_threshold,
            mpi_stats: stats,
            indicator_weights: weights.indicator.clone(),
            domain_weights: weights.domain.clone(),
            domain_contributions: domain_contributions.to_vec(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), OutputError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, OutputError> {
        let toml_string = fs::read_to_string(path)?;
        let summary = toml::from_str(&toml_string)?;
        Ok(summary)
    }
}

/// Everything an analysis writes, bundled for `write_all`.
pub struct AnalysisOutputs<'a> {
    pub scored_frame: &'a mut DataFrame,
    pub deprivation: &'a [DeprivationProportion],
    pub contributions: &'a [IndicatorContribution],
    pub summary: &'a MpiSummary,
}

pub fn write_all(outputs: AnalysisOutputs<'_>, paths: &OutputPaths) -> Result<(), OutputError> {
    paths.ensure_distinct()?;
    if let Some(dir) = paths.scored.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    write_scored_table(outputs.scored_frame, &paths.scored)?;
    write_rows(outputs.deprivation, &paths.deprivation)?;
    write_rows(outputs.contributions, &paths.contributions)?;
    write_weights(&outputs.summary.indicator_weights, &paths.weights)?;
    outputs.summary.save(&paths.summary)?;
    info!(
        "Analysis tables written next to {} (deprivation, contributions, weights, summary).",
        paths.scored.display()
    );
    Ok(())
}
