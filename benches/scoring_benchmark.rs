// ========================================================================================
//
//                         Mpindex scoring throughput benchmark
//
// ========================================================================================
//
// Measures the full in-memory analysis (scoring, classification, aggregation and the
// contribution breakdown) over synthetic survey tables of increasing size.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use mpindex::analysis;
use mpindex::compute;
use mpindex::data::DeprivationTable;
use mpindex::types::Dimensions;
use mpindex::weights::resolve_weights;
use ndarray::Array2;
use polars::prelude::DataFrame;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Observation counts to test.
const OBSERVATION_COUNTS: [usize; 3] = [1_000, 100_000, 1_000_000];
/// Probability that any single indicator is deprived.
const DEPRIVATION_RATE: f64 = 0.3;

fn global_mpi_dimensions() -> Dimensions {
    Dimensions::new(vec![
        ("health", vec!["nutrition", "child_mortality"]),
        ("education", vec!["years_schooling", "attendance"]),
        (
            "living",
            vec!["cooking_fuel", "sanitation", "water", "electricity", "housing", "assets"],
        ),
    ])
    .expect("valid dimensions")
}

fn synthetic_table(rows: usize, indicators: &[&str], rng: &mut StdRng) -> DeprivationTable {
    let matrix = Array2::from_shape_fn((rows, indicators.len()), |_| {
        if rng.gen_bool(DEPRIVATION_RATE) { 1.0 } else { 0.0 }
    });
    DeprivationTable {
        frame: DataFrame::empty(),
        indicators: indicators.iter().map(|s| s.to_string()).collect(),
        matrix,
    }
}

fn benchmark_scoring(c: &mut Criterion) {
    let dimensions = global_mpi_dimensions();
    let mut domain_weights = std::collections::BTreeMap::new();
    for domain in ["health", "education", "living"] {
        domain_weights.insert(domain.to_string(), 1.0 / 3.0);
    }
    let weights = resolve_weights(&dimensions, Some(&domain_weights), None).expect("weights");
    let indicators = dimensions.all_indicators();
    let mut rng = StdRng::seed_from_u64(42);

    let mut group = c.benchmark_group("mpi_analysis");
    for &rows in &OBSERVATION_COUNTS {
        let table = synthetic_table(rows, &indicators, &mut rng);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &table, |b, table| {
            b.iter(|| {
                let scored = compute::score_table(black_box(table), &weights, 1.0 / 3.0)
                    .expect("score");
                let stats = compute::aggregate(&scored);
                let contributions =
                    analysis::contribution_analysis(table, &scored, &weights, &stats)
                        .expect("contributions");
                black_box((stats, contributions))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_scoring);
criterion_main!(benches);
