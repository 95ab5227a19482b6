//! List the datasets of a store.
//!
//! census list --store-dir ...

use anyhow::{Context, Result};
use clap::Args;

use census_core::OperationStore;

#[derive(Args)]
pub struct ListArgs {
    /// Directory holding operation datasets
    #[arg(long)]
    store_dir: String,

    /// Print full metadata as JSON
    #[arg(long, default_value = "false")]
    json: bool,
}

pub fn run(args: ListArgs) -> Result<()> {
    let store = OperationStore::directory(&args.store_dir)
        .with_context(|| format!("Failed to open store {}", args.store_dir))?;
    let mut datasets = store.list()?;
    datasets.sort_by(|a, b| a.key.cmp(&b.key));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&datasets)?);
        return Ok(());
    }
    println!("KEY KIND PARENT ENTRIES");
    for meta in &datasets {
        println!(
            "{} {} {} {}",
            meta.key,
            meta.kind.slug(),
            meta.parent,
            meta.n_entries
        );
    }
    Ok(())
}
