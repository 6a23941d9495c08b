//! # Weight Resolution
//!
//! Turns whatever weighting information the user supplied into a complete,
//! validated pair of indicator and domain weights. Four situations are handled:
//!
//! 1. Domain and indicator weights both supplied: each domain's weight must match
//!    the sum of its indicators' weights.
//! 2. Only domain weights: a domain's weight is split evenly over its indicators.
//! 3. Only indicator weights: domain weights are the sums of their indicators.
//! 4. Nothing supplied: every indicator receives an equal share of 1.
//!
//! Whatever the route, the domain weights must sum to one and every declared
//! indicator must end up with a weight.

use crate::types::{Dimensions, ResolvedWeights, WeightEntry};
use itertools::Itertools;
use log::{debug, warn};
use std::collections::BTreeMap;
use thiserror::Error;

/// Absolute tolerance used for every weight-sum comparison.
pub const WEIGHT_TOLERANCE: f64 = 0.001;

#[derive(Error, Debug, PartialEq)]
pub enum WeightError {
    #[error("Domain '{domain}' weight mismatch: {domain_total} vs {indicator_total}")]
    DomainMismatch {
        domain: String,
        domain_total: f64,
        indicator_total: f64,
    },
    #[error("Domain '{0}' has no indicators to apply weights to")]
    EmptyDomain(String),
    #[error("No indicators defined in dimensions")]
    NoIndicators,
    #[error("Domain weights sum to {0:.3} (should be 1)")]
    DomainSumNotOne(f64),
    #[error("Missing weights for: {}", .0.join(", "))]
    MissingIndicatorWeights(Vec<String>),
    #[error("Weight for '{name}' must be a finite, non-negative number (found {weight})")]
    InvalidWeight { name: String, weight: f64 },
}

fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= WEIGHT_TOLERANCE
}

fn check_finite_non_negative(weights: &BTreeMap<String, f64>) -> Result<(), WeightError> {
    for (name, &weight) in weights {
        if !weight.is_finite() || weight < 0.0 {
            return Err(WeightError::InvalidWeight {
                name: name.clone(),
                weight,
            });
        }
    }
    Ok(())
}

/// Resolves the weights for `dimensions`.
///
/// Empty maps are treated the same as absent ones. Domain weights naming a domain
/// that is not declared still count toward the sum-to-one check; indicator weights
/// naming an undeclared indicator are ignored with a warning.
pub fn resolve_weights(
    dimensions: &Dimensions,
    domain_weights: Option<&BTreeMap<String, f64>>,
    indicator_weights: Option<&BTreeMap<String, f64>>,
) -> Result<ResolvedWeights, WeightError> {
    let domain_weights = domain_weights.filter(|m| !m.is_empty());
    let indicator_weights = indicator_weights.filter(|m| !m.is_empty());

    if let Some(dw) = domain_weights {
        check_finite_non_negative(dw)?;
    }
    if let Some(iw) = indicator_weights {
        check_finite_non_negative(iw)?;
        let unknown: Vec<&String> = iw
            .keys()
            .filter(|k| !dimensions.contains_indicator(k))
            .collect();
        if !unknown.is_empty() {
            warn!(
                "Ignoring weights for indicators not assigned to any domain: {}",
                unknown.iter().join(", ")
            );
        }
    }

    // Indicator weights as a sparse map (missing means "no weight given") and the
    // domain totals that the final sum-to-one check runs on.
    let (indicator_map, domain_total): (BTreeMap<&str, f64>, f64) =
        match (domain_weights, indicator_weights) {
            (Some(dw), Some(iw)) => {
                debug!("Both domain and indicator weights supplied; checking consistency.");
                for domain in dimensions.domains() {
                    let declared = dw.get(&domain.name).copied().unwrap_or(0.0);
                    let summed: f64 = domain
                        .indicators
                        .iter()
                        .map(|ind| iw.get(ind).copied().unwrap_or(0.0))
                        .sum();
                    if !is_close(declared, summed) {
                        return Err(WeightError::DomainMismatch {
                            domain: domain.name.clone(),
                            domain_total: declared,
                            indicator_total: summed,
                        });
                    }
                }
                (declared_indicators(dimensions, iw), dw.values().sum())
            }
            (Some(dw), None) => {
                debug!("Only domain weights supplied; splitting evenly within each domain.");
                let mut map = BTreeMap::new();
                for domain in dimensions.domains() {
                    if domain.indicators.is_empty() {
                        return Err(WeightError::EmptyDomain(domain.name.clone()));
                    }
                    let weight = dw.get(&domain.name).copied().unwrap_or(0.0);
                    let per_indicator = weight / domain.indicators.len() as f64;
                    for ind in &domain.indicators {
                        map.insert(ind.as_str(), per_indicator);
                    }
                }
                (map, dw.values().sum())
            }
            (None, Some(iw)) => {
                debug!("Only indicator weights supplied; deriving domain weights.");
                let map = declared_indicators(dimensions, iw);
                let total = dimensions
                    .domains()
                    .iter()
                    .flat_map(|d| d.indicators.iter())
                    .map(|ind| iw.get(ind).copied().unwrap_or(0.0))
                    .sum();
                (map, total)
            }
            (None, None) => {
                debug!("No weights supplied; using equal indicator weights.");
                let total_indicators = dimensions.num_indicators();
                if total_indicators == 0 {
                    return Err(WeightError::NoIndicators);
                }
                let share = 1.0 / total_indicators as f64;
                let map: BTreeMap<&str, f64> = dimensions
                    .all_indicators()
                    .into_iter()
                    .map(|ind| (ind, share))
                    .collect();
                let total = share * total_indicators as f64;
                (map, total)
            }
        };

    if !is_close(domain_total, 1.0) {
        return Err(WeightError::DomainSumNotOne(domain_total));
    }

    let missing: Vec<String> = dimensions
        .all_indicators()
        .into_iter()
        .filter(|ind| !indicator_map.contains_key(ind))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(WeightError::MissingIndicatorWeights(missing));
    }

    let indicators: Vec<WeightEntry> = dimensions
        .all_indicators()
        .into_iter()
        .map(|ind| WeightEntry {
            name: ind.to_string(),
            weight: indicator_map[ind],
        })
        .collect();

    // Domain weights are reported as the sums of the resolved indicator weights. In
    // the "both supplied" route they agree with the declared values within tolerance.
    let domains: Vec<WeightEntry> = dimensions
        .domains()
        .iter()
        .map(|d| WeightEntry {
            name: d.name.clone(),
            weight: d.indicators.iter().map(|i| indicator_map[i.as_str()]).sum(),
        })
        .collect();

    Ok(ResolvedWeights {
        indicator: indicators,
        domain: domains,
    })
}

/// Keeps only the supplied indicator weights whose indicator is declared.
fn declared_indicators<'a>(
    dimensions: &'a Dimensions,
    weights: &BTreeMap<String, f64>,
) -> BTreeMap<&'a str, f64> {
    dimensions
        .all_indicators()
        .into_iter()
        .filter_map(|ind| weights.get(ind).map(|&w| (ind, w)))
        .collect()
}
