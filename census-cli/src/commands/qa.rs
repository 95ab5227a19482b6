//! Marker and sample QA.
//!
//! census qa-markers --plink-file ... --store-dir ...
//! census qa-samples --plink-file ... --store-dir ...

use anyhow::Result;
use clap::Args;
use tracing::info;

use census_core::qa::{run_qa_markers, run_qa_samples};
use census_core::PipelineContext;

use super::common::{expect_key, StoreArgs, StudyArgs};

#[derive(Args)]
pub struct QaArgs {
    #[command(flatten)]
    study: StudyArgs,

    #[command(flatten)]
    store: StoreArgs,
}

pub fn run_markers(args: QaArgs) -> Result<()> {
    info!("=== QA markers ===");
    let mut source = args.study.open()?;
    let store = args.store.open()?;
    let progress = args.store.progress("QA markers")?;
    let ctx = PipelineContext::new(&store)
        .with_config(args.store.config())
        .with_progress(&progress);

    let outcome = run_qa_markers(&mut source, &ctx)?;
    progress.finish();
    expect_key("QA markers", outcome)?;
    Ok(())
}

pub fn run_samples(args: QaArgs) -> Result<()> {
    info!("=== QA samples ===");
    let mut source = args.study.open()?;
    let store = args.store.open()?;
    let progress = args.store.progress("QA samples")?;
    let ctx = PipelineContext::new(&store)
        .with_config(args.store.config())
        .with_progress(&progress);

    let outcome = run_qa_samples(&mut source, &ctx)?;
    progress.finish();
    expect_key("QA samples", outcome)?;
    Ok(())
}
