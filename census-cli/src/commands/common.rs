//! Arguments and plumbing shared by the subcommands.

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use census_core::census::CensusThresholds;
use census_core::progress::ProgressSink;
use census_core::{OperationStore, PipelineConfig, PipelineOutcome, StudySource};

#[derive(Args)]
pub struct StudyArgs {
    /// PLINK file prefix (bed/bim/fam)
    #[arg(long)]
    pub plink_file: String,

    /// Sample info file overriding sex / affection from the .fam
    #[arg(long)]
    pub phenotype_file: Option<String>,
}

impl StudyArgs {
    pub fn open(&self) -> Result<StudySource> {
        let source = StudySource::from_plink(&self.plink_file)?;
        match &self.phenotype_file {
            Some(path) => source.with_override_file(path),
            None => Ok(source),
        }
    }
}

#[derive(Args)]
pub struct StoreArgs {
    /// Directory holding operation datasets
    #[arg(long)]
    pub store_dir: String,

    /// Maximum markers held in memory per chunk / write batch
    #[arg(long, default_value = "100000")]
    pub max_markers_in_memory: usize,

    /// Count marker chunks on the thread pool
    #[arg(long, default_value = "false")]
    pub parallel: bool,

    /// Hide the progress bar
    #[arg(long, default_value = "false")]
    pub quiet: bool,
}

impl StoreArgs {
    pub fn open(&self) -> Result<OperationStore> {
        let config = self.config();
        let store = OperationStore::directory(&self.store_dir)
            .with_context(|| format!("Failed to open store {}", self.store_dir))?
            .with_batch_size(config.batch_size());
        info!("Store: {}", self.store_dir);
        Ok(store)
    }

    pub fn config(&self) -> PipelineConfig {
        PipelineConfig {
            max_markers_in_memory: self.max_markers_in_memory,
            parallel: self.parallel,
        }
    }

    pub fn progress(&self, label: &str) -> Result<BarProgress> {
        if self.quiet {
            Ok(BarProgress(ProgressBar::hidden()))
        } else {
            BarProgress::new(label)
        }
    }
}

#[derive(Args)]
pub struct ThresholdArgs {
    /// Drop markers whose missing ratio is above this
    #[arg(long, default_value = "0.05")]
    pub marker_missing_ratio: f64,

    /// Drop samples whose missing ratio is above this
    #[arg(long, default_value = "0.05")]
    pub sample_missing_ratio: f64,

    /// Drop samples whose heterozygosity ratio is above this
    #[arg(long, default_value = "0.5")]
    pub sample_het_ratio: f64,

    /// Keep markers with more than two alleles
    #[arg(long, default_value = "false")]
    pub keep_mismatches: bool,
}

impl ThresholdArgs {
    pub fn thresholds(&self) -> CensusThresholds {
        CensusThresholds {
            marker_missing_ratio_max: self.marker_missing_ratio,
            sample_missing_ratio_max: self.sample_missing_ratio,
            sample_heterozygosity_ratio_max: self.sample_het_ratio,
            discard_mismatches: !self.keep_mismatches,
        }
    }
}

/// Progress reported on a terminal bar, in permille.
pub struct BarProgress(ProgressBar);

impl BarProgress {
    pub fn new(label: &str) -> Result<Self> {
        let bar = ProgressBar::new(1000);
        bar.set_style(
            ProgressStyle::with_template(
                "[{elapsed_precise}] {bar:40.cyan/blue} {percent:>3}% {msg}",
            )?
            .progress_chars("##-"),
        );
        bar.set_message(label.to_string());
        Ok(Self(bar))
    }

    pub fn finish(&self) {
        self.0.finish_and_clear();
    }
}

impl ProgressSink for BarProgress {
    fn report(&self, fraction: f64, _index: usize) {
        self.0.set_position((fraction.clamp(0.0, 1.0) * 1000.0) as u64);
    }
}

/// Print the key of a completed run, or bail on anything else.
pub fn expect_key(step: &str, outcome: PipelineOutcome) -> Result<String> {
    match outcome {
        PipelineOutcome::Completed { key, n_entries } => {
            println!("{}: {} ({} entries)", step, key, n_entries);
            Ok(key)
        }
        PipelineOutcome::NoDataRemaining => {
            anyhow::bail!("{}: no markers or samples remain after filtering", step)
        }
        PipelineOutcome::Cancelled => anyhow::bail!("{}: cancelled", step),
    }
}
