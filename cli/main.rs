#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use log::{debug, info};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

use mpindex::config::AnalysisConfig;
use mpindex::data::ReadOptions;
use mpindex::pipeline::{MpiReport, OutputOptions, calculate_mpi};
use mpindex::types::ResolvedWeights;

/// Number of indicators listed in the console contribution table.
const TOP_CONTRIBUTIONS: usize = 10;

#[derive(Parser)]
#[command(
    name = "mpindex",
    version,
    about = "A Multidimensional Poverty Index engine for tabular deprivation data."
)]
struct Cli {
    /// Log debug detail (overridden by RUST_LOG when set)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
pub struct ComputeArgs {
    /// Path to the deprivation table (one row per observation, 0/1 indicator columns)
    #[arg(value_name = "DATA_PATH")]
    pub data: PathBuf,

    /// Path to the analysis config (.toml) declaring domains, weights and cutoff
    #[arg(long)]
    pub config: PathBuf,

    /// Poverty cutoff k; overrides the config value
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Where to write the scored table (default: <DATA>_scored.csv next to the input)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Field separator of the input table: a single character or "tab". Result tables are always comma-separated
    #[arg(long, default_value = ",", value_parser = parse_separator)]
    pub separator: u8,

    /// Replace result files from a previous run
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct WeightsArgs {
    /// Path to the analysis config (.toml)
    #[arg(long)]
    pub config: PathBuf,
}

#[derive(Args)]
pub struct InitConfigArgs {
    /// Deprivation table whose header is used to draft the config
    #[arg(value_name = "DATA_PATH")]
    pub data: PathBuf,

    /// Where to write the drafted config
    #[arg(value_name = "CONFIG_PATH")]
    pub out: PathBuf,

    /// Column that identifies observations and is not an indicator (repeatable)
    #[arg(long = "id-column", value_name = "NAME")]
    pub id_columns: Vec<String>,

    /// Field separator of the table: a single character or "tab"
    #[arg(long, default_value = ",", value_parser = parse_separator)]
    pub separator: u8,

    /// Replace an existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Score observations and compute H, A and the MPI
    #[command(
        about = "Compute the MPI (outputs: scored table, deprivation, contribution and weight tables, summary.toml)"
    )]
    Compute(ComputeArgs),

    /// Resolve and print the weights implied by a config
    #[command(about = "Resolve and print indicator and domain weights")]
    Weights(WeightsArgs),

    /// Draft an equal-weight config from a table header
    #[command(about = "Draft an analysis config from a data header (outputs: CONFIG_PATH)")]
    InitConfig(InitConfigArgs),

    /// Display version and build information
    #[command(about = "Display version and build information")]
    Version,
}

fn main() {
    let cli = Cli::parse();
    let Cli { verbose, command } = cli;
    init_logging(verbose);

    let result = match command {
        Some(Commands::Compute(args)) => run_compute(args),
        Some(Commands::Weights(args)) => run_weights(args),
        Some(Commands::InitConfig(args)) => run_init_config(args),
        Some(Commands::Version) => {
            print_version_info();
            Ok(())
        }
        None => {
            Cli::command().print_help().expect("print help");
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn parse_separator(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        other => {
            let bytes = other.as_bytes();
            if bytes.len() == 1 && bytes[0].is_ascii() {
                Ok(bytes[0])
            } else {
                Err(format!(
                    "separator must be a single ASCII character or 'tab', got '{other}'"
                ))
            }
        }
    }
}

fn run_compute(args: ComputeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AnalysisConfig::load(&args.config)?;
    if let Some(k) = args.threshold {
        debug!(
            "Overriding config cutoff {} with --threshold {}",
            config.poverty_threshold, k
        );
        config.poverty_threshold = k;
    }

    let options = OutputOptions {
        scored_path: args.output,
        overwrite: args.force,
        read: ReadOptions {
            separator: args.separator,
        },
    };

    let report = calculate_mpi(&args.data, &config, &options)?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &MpiReport) {
    let stats = &report.stats;
    println!("Observations:      {}", stats.num_observations);
    println!(
        "Poor:              {} (cutoff k = {:.4})",
        stats.num_poor, report.poverty_threshold
    );
    println!("Headcount (H):     {:.4}", stats.h);
    println!("Intensity (A):     {:.4}", stats.a);
    println!("MPI (H x A):       {:.4}", stats.mpi);

    if report.contributions.is_empty() {
        return;
    }
    println!();
    println!(
        "{:<24} {:>8} {:>12} {:>10}",
        "Indicator", "Weight", "Contribution", "Share (%)"
    );
    for row in report.contributions.iter().take(TOP_CONTRIBUTIONS) {
        println!(
            "{:<24} {:>8.4} {:>12.4} {:>10.2}",
            row.indicator, row.weight, row.contribution, row.contribution_pct
        );
    }
    if report.contributions.len() > TOP_CONTRIBUTIONS {
        println!(
            "... {} more in the contributions table",
            report.contributions.len() - TOP_CONTRIBUTIONS
        );
    }

    println!();
    println!("{:<24} {:>12} {:>10}", "Domain", "Contribution", "Share (%)");
    for row in &report.domain_contributions {
        println!(
            "{:<24} {:>12.4} {:>10.2}",
            row.domain, row.contribution, row.contribution_pct
        );
    }
}

fn run_weights(args: WeightsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AnalysisConfig::load(&args.config)?;
    config.validate()?;
    let weights = config.resolve_weights()?;
    print_weights(&config, &weights);
    Ok(())
}

fn print_weights(config: &AnalysisConfig, weights: &ResolvedWeights) {
    for domain in config.dimensions.domains() {
        println!(
            "{:<24} {:.4}",
            domain.name,
            weights.domain_weight(&domain.name).unwrap_or(0.0)
        );
        for indicator in &domain.indicators {
            println!(
                "  {:<22} {:.4}",
                indicator,
                weights.indicator_weight(indicator).unwrap_or(0.0)
            );
        }
    }
}

fn run_init_config(args: InitConfigArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.out.exists() && !args.force {
        return Err(Box::new(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!(
                "Config file '{}' already exists. Pass --force to replace it.",
                args.out.display()
            ),
        )));
    }

    let columns = read_header(&args.data, args.separator)?;
    let config = AnalysisConfig::template_from_columns(&columns, &args.id_columns)?;
    let body = toml::to_string_pretty(&config)?;

    let mut file = fs::File::create(&args.out)?;
    writeln!(
        file,
        "# Drafted from the header of {}.\n\
         # Each indicator starts as its own equally weighted domain. Group indicators\n\
         # into domains and add [domain_weights] or [indicator_weights] as needed.\n",
        args.data.display()
    )?;
    file.write_all(body.as_bytes())?;

    info!(
        "Drafted config with {} indicators",
        config.dimensions.num_indicators()
    );
    println!("Config written to {}", args.out.display());
    Ok(())
}

fn read_header(path: &Path, separator: u8) -> Result<Vec<String>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator)
        .has_headers(true)
        .from_path(path)?;
    let headers = reader.headers()?;
    Ok(headers.iter().map(str::to_string).collect())
}

/// Format seconds into a human-readable duration like "2.4 hours ago"
fn format_duration_ago(seconds: u64) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;

    if seconds < MINUTE {
        format!("{} seconds ago", seconds)
    } else if seconds < HOUR {
        format!("{:.1} minutes ago", seconds as f64 / MINUTE as f64)
    } else if seconds < DAY {
        format!("{:.1} hours ago", seconds as f64 / HOUR as f64)
    } else {
        format!("{:.1} days ago", seconds as f64 / DAY as f64)
    }
}

fn print_version_info() {
    let version = env!("CARGO_PKG_VERSION");
    let build_timestamp: u64 = env!("MPINDEX_BUILD_TIMESTAMP").parse().unwrap_or(0);

    println!("mpindex {}", version);

    if build_timestamp > 0 {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        if now > build_timestamp {
            println!("Built: {}", format_duration_ago(now - build_timestamp));
        } else {
            println!("Built: just now");
        }
    }
}
