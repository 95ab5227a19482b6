//! census-rs: marker QA, census and association testing for GWAS.
//!
//! CLI entry point using clap for argument parsing.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "census",
    version,
    about = "Marker QA, census, Hardy-Weinberg and association tests",
    long_about = "Runs genotype QA, a case/control marker census over the markers and samples\n\
                  that pass QA, Hardy-Weinberg tests and allelic / genotypic / trend tests.\n\
                  Every step writes a dataset to a store directory, keyed for later steps."
)]
struct Cli {
    /// Number of threads to use
    #[arg(long, default_value = "1", global = true)]
    threads: usize,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Per-marker QA: missing ratio, alleles, mismatch
    QaMarkers(commands::qa::QaArgs),

    /// Per-sample QA: missing and heterozygosity ratios
    QaSamples(commands::qa::QaArgs),

    /// Census of case / control genotypes over QA-filtered data
    Census(commands::census::CensusArgs),

    /// Hardy-Weinberg tests on a census
    HardyWeinberg(commands::hardy_weinberg::HardyWeinbergArgs),

    /// Allelic, genotypic or trend association test
    Assoc(commands::assoc_test::AssocTestArgs),

    /// QA, census, Hardy-Weinberg and association in one go
    Run(commands::run::RunArgs),

    /// List the datasets in a store
    List(commands::list::ListArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    // Set up thread pool
    rayon::ThreadPoolBuilder::new()
        .num_threads(cli.threads)
        .build_global()
        .ok();

    tracing::info!("census-rs v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Using {} threads", cli.threads);

    match cli.command {
        Commands::QaMarkers(args) => commands::qa::run_markers(args),
        Commands::QaSamples(args) => commands::qa::run_samples(args),
        Commands::Census(args) => commands::census::run(args),
        Commands::HardyWeinberg(args) => commands::hardy_weinberg::run(args),
        Commands::Assoc(args) => commands::assoc_test::run(args),
        Commands::Run(args) => commands::run::run(args),
        Commands::List(args) => commands::list::run(args),
    }
}
