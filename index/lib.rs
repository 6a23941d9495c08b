#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod analysis;
pub mod compute;
pub mod config;
pub mod data;
pub mod output;
pub mod pipeline;
pub mod types;
pub mod weights;

pub use config::AnalysisConfig;
pub use pipeline::{MpiError, MpiReport, OutputOptions, calculate_mpi, compute_report};
pub use types::{Dimensions, ResolvedWeights};
