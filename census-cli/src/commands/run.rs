//! Full chain: QA, census, Hardy-Weinberg and association tests.
//!
//! census run --plink-file ... --store-dir ... --test allelic --test trend --output-prefix ...

use anyhow::Result;
use clap::Args;
use tracing::info;

use census_core::association::{run_association, AssociationRequest};
use census_core::census::{run_census, CensusRequest};
use census_core::hardy_weinberg::run_hardy_weinberg;
use census_core::qa::{run_qa_markers, run_qa_samples};
use census_core::{OperationStore, PipelineContext};

use super::assoc_test::{write_results, TestKind};
use super::common::{expect_key, BarProgress, StoreArgs, StudyArgs, ThresholdArgs};

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    study: StudyArgs,

    #[command(flatten)]
    store: StoreArgs,

    #[command(flatten)]
    thresholds: ThresholdArgs,

    /// Tests to run (repeatable)
    #[arg(long = "test", value_enum, default_values_t = [TestKind::Allelic])]
    tests: Vec<TestKind>,

    /// Skip markers whose Hardy-Weinberg p-value among fully counted
    /// controls is below this (default: 0.05 / number of markers)
    #[arg(long)]
    hw_threshold: Option<f64>,

    /// Write `<prefix>.<key>.txt` for every test run
    #[arg(long)]
    output_prefix: Option<String>,
}

pub fn run(args: RunArgs) -> Result<()> {
    info!("=== Full run ===");
    let mut source = args.study.open()?;
    let store = args.store.open()?;

    let progress = args.store.progress("QA markers")?;
    let outcome = run_qa_markers(&mut source, &context(&store, &args.store, &progress))?;
    progress.finish();
    let qa_markers = expect_key("QA markers", outcome)?;

    let progress = args.store.progress("QA samples")?;
    let outcome = run_qa_samples(&mut source, &context(&store, &args.store, &progress))?;
    progress.finish();
    let qa_samples = expect_key("QA samples", outcome)?;

    let request =
        CensusRequest::new(&qa_markers, &qa_samples).with_thresholds(args.thresholds.thresholds());
    let progress = args.store.progress("Census")?;
    let outcome = run_census(&mut source, &request, &context(&store, &args.store, &progress))?;
    progress.finish();
    let census = expect_key("Census", outcome)?;

    let progress = args.store.progress("Hardy-Weinberg")?;
    let outcome = run_hardy_weinberg(&census, &context(&store, &args.store, &progress))?;
    progress.finish();
    let hw = expect_key("Hardy-Weinberg", outcome)?;

    for &test in &args.tests {
        let mut request = AssociationRequest::new(&census, &hw, test.into());
        if let Some(threshold) = args.hw_threshold {
            request = request.with_hw_threshold(threshold);
        }
        let progress = args.store.progress(&format!("{:?} test", test))?;
        let outcome = run_association(&request, &context(&store, &args.store, &progress))?;
        progress.finish();
        let key = expect_key("Association", outcome)?;

        if let Some(prefix) = &args.output_prefix {
            let path = format!("{}.{}.txt", prefix, key);
            write_results(&store, &key, &path, args.store.config().batch_size())?;
        }
    }
    Ok(())
}

fn context<'a>(
    store: &'a OperationStore,
    args: &StoreArgs,
    progress: &'a BarProgress,
) -> PipelineContext<'a> {
    PipelineContext::new(store)
        .with_config(args.config())
        .with_progress(progress)
}
