// ========================================================================================
//
//                      Shared domain types for the poverty index
//
// ========================================================================================

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Errors raised while assembling a `Dimensions` structure.
#[derive(Error, Debug, PartialEq)]
pub enum DimensionsError {
    #[error("Indicator '{indicator}' is listed more than once (second occurrence in domain '{domain}').")]
    DuplicateIndicator { domain: String, indicator: String },
    #[error("Domain '{0}' is declared more than once.")]
    DuplicateDomain(String),
}

/// A single poverty domain (e.g. "health") and the indicator columns it groups.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    pub name: String,
    pub indicators: Vec<String>,
}

/// The ordered mapping from domains to their indicators.
///
/// Declaration order is significant: it defines the canonical indicator order used
/// for the weight vector, the indicator columns of the deprivation matrix, and every
/// per-indicator table the crate produces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dimensions {
    domains: Vec<Domain>,
}

impl Dimensions {
    /// Builds the mapping, rejecting repeated domain or indicator names.
    pub fn new<D, I, S>(domains: D) -> Result<Self, DimensionsError>
    where
        D: IntoIterator<Item = (S, I)>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen_domains = HashSet::new();
        let mut seen_indicators = HashSet::new();
        let mut out = Vec::new();

        for (name, indicators) in domains {
            let name: String = name.into();
            if !seen_domains.insert(name.clone()) {
                return Err(DimensionsError::DuplicateDomain(name));
            }
            let mut list = Vec::new();
            for indicator in indicators {
                let indicator: String = indicator.into();
                if !seen_indicators.insert(indicator.clone()) {
                    return Err(DimensionsError::DuplicateIndicator {
                        domain: name,
                        indicator,
                    });
                }
                list.push(indicator);
            }
            out.push(Domain {
                name,
                indicators: list,
            });
        }

        Ok(Self { domains: out })
    }

    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// All indicators, concatenated across domains in declaration order.
    pub fn all_indicators(&self) -> Vec<&str> {
        self.domains
            .iter()
            .flat_map(|d| d.indicators.iter().map(String::as_str))
            .collect()
    }

    pub fn num_indicators(&self) -> usize {
        self.domains.iter().map(|d| d.indicators.len()).sum()
    }

    pub fn contains_indicator(&self, indicator: &str) -> bool {
        self.domains
            .iter()
            .any(|d| d.indicators.iter().any(|i| i == indicator))
    }
}

impl Serialize for Dimensions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.domains.len()))?;
        for domain in &self.domains {
            map.serialize_entry(&domain.name, &domain.indicators)?;
        }
        map.end()
    }
}

// Deserialized through a visitor so that the document order of the TOML table is
// kept instead of being re-sorted by a map type.
impl<'de> Deserialize<'de> for Dimensions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DimensionsVisitor;

        impl<'de> Visitor<'de> for DimensionsVisitor {
            type Value = Dimensions;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a table mapping domain names to lists of indicator columns")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries: Vec<(String, Vec<String>)> = Vec::new();
                while let Some((name, indicators)) = access.next_entry::<String, Vec<String>>()? {
                    entries.push((name, indicators));
                }
                Dimensions::new(entries).map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_map(DimensionsVisitor)
    }
}

/// A named weight, used both for indicators and for domains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub name: String,
    pub weight: f64,
}

/// Indicator weights in canonical indicator order.
pub type IndicatorWeights = Vec<WeightEntry>;

/// Domain weights in declaration order.
pub type DomainWeights = Vec<WeightEntry>;

/// The final, validated weights for one analysis.
///
/// Both lists follow the canonical order of the `Dimensions` they were resolved
/// against, and only contain names declared there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedWeights {
    pub indicator: IndicatorWeights,
    pub domain: DomainWeights,
}

impl ResolvedWeights {
    pub fn indicator_weight(&self, indicator: &str) -> Option<f64> {
        self.indicator
            .iter()
            .find(|e| e.name == indicator)
            .map(|e| e.weight)
    }

    pub fn domain_weight(&self, domain: &str) -> Option<f64> {
        self.domain
            .iter()
            .find(|e| e.name == domain)
            .map(|e| e.weight)
    }
}
