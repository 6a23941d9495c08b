// ========================================================================================
//
//                    The scoring core: deprivation scores and MPI
//
// ========================================================================================
//
// Every observation's deprivation score is the weighted sum of its binary indicators.
// An observation is poor when its score reaches the poverty cutoff `k`. From that
// classification the three headline statistics follow:
//
//   H   = (number of poor) / (number of observations)
//   A   = mean score among the poor
//   MPI = H * A, the product of the two

use crate::data::DeprivationTable;
use crate::types::ResolvedWeights;
use log::debug;
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The conventional cutoff: deprived in at least a third of the weighted indicators.
pub const DEFAULT_POVERTY_THRESHOLD: f64 = 1.0 / 3.0;

#[derive(Error, Debug, PartialEq)]
pub enum ComputeError {
    #[error("Poverty threshold must lie in (0, 1], got {0}")]
    InvalidThreshold(f64),
    #[error("No weight was resolved for indicator '{0}'")]
    UnweightedIndicator(String),
}

/// Per-observation results, aligned with the rows of the input table.
#[derive(Debug, Clone)]
pub struct ScoredObservations {
    pub scores: Array1<f64>,
    pub is_poor: Vec<bool>,
}

impl ScoredObservations {
    pub fn num_poor(&self) -> usize {
        self.is_poor.iter().filter(|&&p| p).count()
    }
}

/// The headline statistics of one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MpiStats {
    /// Headcount ratio.
    pub h: f64,
    /// Intensity among the poor.
    pub a: f64,
    pub mpi: f64,
    pub num_observations: usize,
    pub num_poor: usize,
}

pub fn validate_threshold(threshold: f64) -> Result<(), ComputeError> {
    if !threshold.is_finite() || threshold <= 0.0 || threshold > 1.0 {
        return Err(ComputeError::InvalidThreshold(threshold));
    }
    Ok(())
}

/// Lays the resolved indicator weights out in the column order of the table.
pub fn weight_vector(
    indicators: &[String],
    weights: &ResolvedWeights,
) -> Result<Array1<f64>, ComputeError> {
    indicators
        .iter()
        .map(|ind| {
            weights
                .indicator_weight(ind)
                .ok_or_else(|| ComputeError::UnweightedIndicator(ind.clone()))
        })
        .collect::<Result<Vec<f64>, _>>()
        .map(Array1::from_vec)
}

pub fn deprivation_scores(matrix: ArrayView2<f64>, weights: ArrayView1<f64>) -> Array1<f64> {
    matrix.dot(&weights)
}

/// Classifies each score against the cutoff. The comparison is inclusive and exact.
pub fn classify(scores: ArrayView1<f64>, threshold: f64) -> Vec<bool> {
    scores.iter().map(|&s| s >= threshold).collect()
}

/// Aggregates H, A and MPI. An empty table, or one without any poor observation,
/// yields zeros rather than undefined means.
pub fn aggregate(scored: &ScoredObservations) -> MpiStats {
    let num_observations = scored.scores.len();
    let num_poor = scored.num_poor();

    let h = if num_observations == 0 {
        0.0
    } else {
        num_poor as f64 / num_observations as f64
    };

    let a = if num_poor == 0 {
        0.0
    } else {
        let poor_total: f64 = scored
            .scores
            .iter()
            .zip(&scored.is_poor)
            .filter(|&(_, &p)| p)
            .map(|(&s, _)| s)
            .sum();
        poor_total / num_poor as f64
    };

    MpiStats {
        h,
        a,
        mpi: h * a,
        num_observations,
        num_poor,
    }
}

/// Scores and classifies every observation of `table`.
pub fn score_table(
    table: &DeprivationTable,
    weights: &ResolvedWeights,
    threshold: f64,
) -> Result<ScoredObservations, ComputeError> {
    validate_threshold(threshold)?;
    let w = weight_vector(&table.indicators, weights)?;
    let scores = deprivation_scores(table.matrix.view(), w.view());
    let is_poor = classify(scores.view(), threshold);
    debug!(
        "Scored {} observations against cutoff {:.4}.",
        scores.len(),
        threshold
    );
    Ok(ScoredObservations { scores, is_poor })
}
