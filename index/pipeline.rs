// ========================================================================================
//
//                         The orchestrator: one MPI analysis
//
// ========================================================================================
//
// Load -> resolve weights -> score -> classify -> aggregate -> analyse -> write.
// `compute_report` runs the in-memory part so that library users can feed a table
// they already hold; `calculate_mpi` wraps it with file input and output.

use crate::analysis::{
    self, AnalysisError, DeprivationProportion, DomainContribution, IndicatorContribution,
};
use crate::compute::{self, ComputeError, MpiStats};
use crate::config::{AnalysisConfig, ConfigError};
use crate::data::{self, DataError, DeprivationTable, ReadOptions};
use crate::output::{self, AnalysisOutputs, MpiSummary, OutputError, OutputPaths};
use crate::types::ResolvedWeights;
use log::info;
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MpiError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Compute(#[from] ComputeError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// How and where results are written.
#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    /// Location of the scored table; the other files follow it.
    pub scored_path: Option<PathBuf>,
    /// Replace existing result files instead of refusing to run.
    pub overwrite: bool,
    pub read: ReadOptions,
}

/// Everything one analysis produces.
#[derive(Debug, Clone)]
pub struct MpiReport {
    /// The input table with `Deprivation_Score` and `Is_Poor` appended.
    pub scored_frame: DataFrame,
    pub stats: MpiStats,
    pub deprivation: Vec<DeprivationProportion>,
    pub contributions: Vec<IndicatorContribution>,
    pub domain_contributions: Vec<DomainContribution>,
    pub weights: ResolvedWeights,
    pub poverty_threshold: f64,
}

/// Runs the analysis on a table that is already in memory.
pub fn compute_report(
    table: &DeprivationTable,
    config: &AnalysisConfig,
) -> Result<MpiReport, MpiError> {
    config.validate()?;
    let weights = config.resolve_weights()?;

    let scored = compute::score_table(table, &weights, config.poverty_threshold)?;
    let stats = compute::aggregate(&scored);
    info!(
        "{} of {} observations are poor (k = {:.4}).",
        stats.num_poor, stats.num_observations, config.poverty_threshold
    );

    let deprivation = analysis::deprivation_proportions(table);
    let contributions = analysis::contribution_analysis(table, &scored, &weights, &stats)?;
    let domain_contributions = analysis::domain_contributions(&contributions, &config.dimensions);
    let scored_frame = output::scored_frame(&table.frame, &scored)?;

    Ok(MpiReport {
        scored_frame,
        stats,
        deprivation,
        contributions,
        domain_contributions,
        weights,
        poverty_threshold: config.poverty_threshold,
    })
}

/// Computes the MPI for the table at `data_path` and writes every result file.
pub fn calculate_mpi(
    data_path: &Path,
    config: &AnalysisConfig,
    options: &OutputOptions,
) -> Result<MpiReport, MpiError> {
    let start = Instant::now();

    config.validate()?;
    let paths = OutputPaths::derive(data_path, options.scored_path.as_deref());
    paths.ensure_distinct()?;
    if !options.overwrite {
        paths.ensure_absent()?;
    }

    let table = data::load_deprivation_table(data_path, &config.dimensions, options.read)?;
    let mut report = compute_report(&table, config)?;

    let summary = MpiSummary::new(
        data_path,
        report.poverty_threshold,
        report.stats,
        &report.weights,
        &report.domain_contributions,
    );
    output::write_all(
        AnalysisOutputs {
            scored_frame: &mut report.scored_frame,
            deprivation: &report.deprivation,
            contributions: &report.contributions,
            summary: &summary,
        },
        &paths,
    )?;

    info!(
        "H = {:.4}, A = {:.4}, MPI = {:.4} ({:.2?})",
        report.stats.h,
        report.stats.a,
        report.stats.mpi,
        start.elapsed()
    );
    Ok(report)
}
