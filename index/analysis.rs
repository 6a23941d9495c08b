//! Breakdowns of a finished MPI run: how often each indicator is deprived overall,
//! and how much each indicator (and each domain) contributes to the index.

use crate::compute::{MpiStats, ScoredObservations};
use crate::data::DeprivationTable;
use crate::types::{Dimensions, ResolvedWeights};
use log::debug;
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

const CONSISTENCY_RTOL: f64 = 1e-5;
const CONSISTENCY_ATOL: f64 = 1e-8;

#[derive(Error, Debug, PartialEq)]
pub enum AnalysisError {
    #[error("Contribution calculation error: contributions sum to {total} but MPI is {mpi}")]
    ContributionMismatch { total: f64, mpi: f64 },
}

/// Share of all observations deprived in one indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeprivationProportion {
    #[serde(rename = "Indicator")]
    pub indicator: String,
    #[serde(rename = "Proportion_Deprived")]
    pub proportion_deprived: f64,
}

/// One indicator's part in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorContribution {
    #[serde(rename = "Indicator")]
    pub indicator: String,
    #[serde(rename = "Weight")]
    pub weight: f64,
    #[serde(rename = "Contribution")]
    pub contribution: f64,
    #[serde(rename = "Prevalence_Among_Poor")]
    pub prevalence_among_poor: f64,
    /// Share of all observations that are both poor and deprived in the indicator.
    #[serde(rename = "Censored_Headcount")]
    pub censored_headcount: f64,
    #[serde(rename = "Contribution_Pct")]
    pub contribution_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainContribution {
    pub domain: String,
    pub contribution: f64,
    pub contribution_pct: f64,
}

// Descending by value; `sort_by` is stable so ties keep canonical order.
fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Uncensored deprivation rates, highest first.
pub fn deprivation_proportions(table: &DeprivationTable) -> Vec<DeprivationProportion> {
    let means = table.matrix.mean_axis(Axis(0));
    let mut rows: Vec<DeprivationProportion> = table
        .indicators
        .iter()
        .enumerate()
        .map(|(j, ind)| DeprivationProportion {
            indicator: ind.clone(),
            proportion_deprived: means.as_ref().map_or(0.0, |m| m[j]),
        })
        .collect();
    rows.sort_by(|a, b| descending(a.proportion_deprived, b.proportion_deprived));
    rows
}

/// Per-indicator contributions, largest first.
///
/// The contribution of indicator `j` is `H * w_j * p_j`, where `p_j` is the share of
/// poor observations deprived in `j`. Summed over all indicators this reproduces the
/// MPI, which is checked before returning.
pub fn contribution_analysis(
    table: &DeprivationTable,
    scored: &ScoredObservations,
    weights: &ResolvedWeights,
    stats: &MpiStats,
) -> Result<Vec<IndicatorContribution>, AnalysisError> {
    let poor_rows: Vec<usize> = scored
        .is_poor
        .iter()
        .enumerate()
        .filter(|&(_, &p)| p)
        .map(|(i, _)| i)
        .collect();

    let mut rows = Vec::with_capacity(table.indicators.len());
    for (j, ind) in table.indicators.iter().enumerate() {
        let weight = weights.indicator_weight(ind).unwrap_or(0.0);
        let prevalence = if poor_rows.is_empty() {
            0.0
        } else {
            let column = table.matrix.column(j);
            poor_rows.iter().map(|&i| column[i]).sum::<f64>() / poor_rows.len() as f64
        };
        let contribution = stats.h * weight * prevalence;
        let contribution_pct = if stats.mpi > 0.0 {
            contribution / stats.mpi * 100.0
        } else {
            0.0
        };
        rows.push(IndicatorContribution {
            indicator: ind.clone(),
            weight,
            contribution,
            prevalence_among_poor: prevalence,
            censored_headcount: stats.h * prevalence,
            contribution_pct,
        });
    }

    if stats.h > 0.0 {
        let total: f64 = rows.iter().map(|r| r.contribution).sum();
        if (total - stats.mpi).abs() > CONSISTENCY_ATOL + CONSISTENCY_RTOL * stats.mpi.abs() {
            return Err(AnalysisError::ContributionMismatch {
                total,
                mpi: stats.mpi,
            });
        }
        debug!("Indicator contributions sum to {total:.6} (MPI {:.6}).", stats.mpi);
    }

    rows.sort_by(|a, b| descending(a.contribution, b.contribution));
    Ok(rows)
}

/// Rolls indicator contributions up into their domains, in declaration order.
pub fn domain_contributions(
    contributions: &[IndicatorContribution],
    dimensions: &Dimensions,
) -> Vec<DomainContribution> {
    dimensions
        .domains()
        .iter()
        .map(|domain| {
            let (contribution, contribution_pct) = contributions
                .iter()
                .filter(|c| domain.indicators.contains(&c.indicator))
                .fold((0.0, 0.0), |(c, p), row| {
                    (c + row.contribution, p + row.contribution_pct)
                });
            DomainContribution {
                domain: domain.name.clone(),
                contribution,
                contribution_pct,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{aggregate, score_table};
    use crate::weights::resolve_weights;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;
    use polars::prelude::DataFrame;

    fn dims() -> Dimensions {
        Dimensions::new(vec![("health", vec!["a", "b"]), ("living", vec!["c", "d"])]).unwrap()
    }

    // Equal weights of 0.25, cutoff 1/3:
    //   row 0: a b c d -> 1.00 poor
    //   row 1: a b     -> 0.50 poor
    //   row 2: a       -> 0.25
    //   row 3:         -> 0.00
    fn table() -> DeprivationTable {
        DeprivationTable {
            frame: DataFrame::empty(),
            indicators: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            matrix: Array2::from_shape_vec(
                (4, 4),
                vec![
                    1.0, 1.0, 1.0, 1.0, //
                    1.0, 1.0, 0.0, 0.0, //
                    1.0, 0.0, 0.0, 0.0, //
                    0.0, 0.0, 0.0, 0.0,
                ],
            )
            .unwrap(),
        }
    }

    fn run() -> (DeprivationTable, ScoredObservations, ResolvedWeights, MpiStats) {
        let table = table();
        let weights = resolve_weights(&dims(), None, None).unwrap();
        let scored = score_table(&table, &weights, 1.0 / 3.0).unwrap();
        let stats = aggregate(&scored);
        (table, scored, weights, stats)
    }

    #[test]
    fn proportions_are_sorted_descending() {
        let props = deprivation_proportions(&table());
        let names: Vec<&str> = props.iter().map(|p| p.indicator.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert_abs_diff_eq!(props[0].proportion_deprived, 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(props[1].proportion_deprived, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(props[2].proportion_deprived, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn contributions_sum_to_mpi() {
        let (table, scored, weights, stats) = run();
        assert_abs_diff_eq!(stats.h, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.a, 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.mpi, 0.375, epsilon = 1e-12);

        let rows = contribution_analysis(&table, &scored, &weights, &stats).unwrap();
        let total: f64 = rows.iter().map(|r| r.contribution).sum();
        assert_abs_diff_eq!(total, stats.mpi, epsilon = 1e-12);
        let pct: f64 = rows.iter().map(|r| r.contribution_pct).sum();
        assert_abs_diff_eq!(pct, 100.0, epsilon = 1e-9);

        // a and b are deprived for both poor rows, c and d for one.
        assert_eq!(rows[0].indicator, "a");
        assert_eq!(rows[1].indicator, "b");
        assert_abs_diff_eq!(rows[0].prevalence_among_poor, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(rows[0].contribution, 0.125, epsilon = 1e-12);
        assert_abs_diff_eq!(rows[0].censored_headcount, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(rows[2].prevalence_among_poor, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(rows[2].contribution, 0.0625, epsilon = 1e-12);
    }

    #[test]
    fn no_poor_means_zero_contributions() {
        let table = table();
        let weights = resolve_weights(&dims(), None, None).unwrap();
        let scored = score_table(&table, &weights, 1.0).unwrap();
        let none = ScoredObservations {
            scores: scored.scores,
            is_poor: vec![false; 4],
        };
        let stats = aggregate(&none);
        assert_abs_diff_eq!(stats.h, 0.0);

        let rows = contribution_analysis(&table, &none, &weights, &stats).unwrap();
        for row in rows {
            assert_abs_diff_eq!(row.contribution, 0.0);
            assert_abs_diff_eq!(row.contribution_pct, 0.0);
            assert_abs_diff_eq!(row.prevalence_among_poor, 0.0);
        }
    }

    #[test]
    fn inconsistent_stats_are_caught() {
        let (table, scored, weights, mut stats) = run();
        stats.mpi += 0.01;
        match contribution_analysis(&table, &scored, &weights, &stats).unwrap_err() {
            AnalysisError::ContributionMismatch { total, .. } => {
                assert_abs_diff_eq!(total, 0.375, epsilon = 1e-12)
            }
        }
    }

    #[test]
    fn domain_contributions_follow_declaration_order() {
        let (table, scored, weights, stats) = run();
        let rows = contribution_analysis(&table, &scored, &weights, &stats).unwrap();
        let domains = domain_contributions(&rows, &dims());
        assert_eq!(domains.len(), 2);
        assert_eq!(domains[0].domain, "health");
        assert_abs_diff_eq!(domains[0].contribution, 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(domains[1].contribution, 0.125, epsilon = 1e-12);
        assert_abs_diff_eq!(
            domains[0].contribution_pct + domains[1].contribution_pct,
            100.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn empty_table_has_zero_proportions() {
        let empty = DeprivationTable {
            frame: DataFrame::empty(),
            indicators: vec!["a".into()],
            matrix: Array2::zeros((0, 1)),
        };
        let props = deprivation_proportions(&empty);
        assert_abs_diff_eq!(props[0].proportion_deprived, 0.0);
    }
}
