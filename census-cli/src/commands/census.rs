//! Marker census over QA-filtered markers and samples.
//!
//! census census --plink-file ... --store-dir ... --qa-markers ... --qa-samples ...

use anyhow::Result;
use clap::Args;
use tracing::info;

use census_core::census::{run_census, CensusRequest};
use census_core::PipelineContext;

use super::common::{expect_key, StoreArgs, StudyArgs, ThresholdArgs};

#[derive(Args)]
pub struct CensusArgs {
    #[command(flatten)]
    study: StudyArgs,

    #[command(flatten)]
    store: StoreArgs,

    /// Key of the marker QA dataset
    #[arg(long)]
    qa_markers: String,

    /// Key of the sample QA dataset
    #[arg(long)]
    qa_samples: String,

    #[command(flatten)]
    thresholds: ThresholdArgs,
}

pub fn run(args: CensusArgs) -> Result<()> {
    info!("=== Marker census ===");
    let request = CensusRequest::new(&args.qa_markers, &args.qa_samples)
        .with_thresholds(args.thresholds.thresholds());
    info!("Thresholds: {:?}", request.thresholds);

    let mut source = args.study.open()?;
    let store = args.store.open()?;
    let progress = args.store.progress("Census")?;
    let ctx = PipelineContext::new(&store)
        .with_config(args.store.config())
        .with_progress(&progress);

    let outcome = run_census(&mut source, &request, &ctx)?;
    progress.finish();
    expect_key("Census", outcome)?;
    Ok(())
}
