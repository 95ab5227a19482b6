//! Hardy-Weinberg test over a census.
//!
//! census hardy-weinberg --store-dir ... --census ...

use anyhow::Result;
use clap::Args;

use census_core::hardy_weinberg::run_hardy_weinberg;
use census_core::PipelineContext;

use super::common::{expect_key, StoreArgs};

#[derive(Args)]
pub struct HardyWeinbergArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Key of the census dataset
    #[arg(long)]
    census: String,
}

pub fn run(args: HardyWeinbergArgs) -> Result<()> {
    let store = args.store.open()?;
    let progress = args.store.progress("Hardy-Weinberg")?;
    let ctx = PipelineContext::new(&store)
        .with_config(args.store.config())
        .with_progress(&progress);

    let outcome = run_hardy_weinberg(&args.census, &ctx)?;
    progress.finish();
    expect_key("Hardy-Weinberg", outcome)?;
    Ok(())
}
