//! census-core: Marker statistics pipelines for census-rs
//!
//! Implements marker and sample QA, the four-way marker census with
//! threshold-based picking, Hardy-Weinberg testing, and the allelic,
//! genotypic and trend association tests. Every pipeline writes its
//! result as a sealed dataset in an [`store::OperationStore`].

pub mod association;
pub mod census;
pub mod decision;
pub mod hardy_weinberg;
pub mod pipeline;
pub mod progress;
pub mod qa;
pub mod source;
pub mod stats;
pub mod store;
pub mod util;

pub use pipeline::{CancelFlag, PipelineConfig, PipelineContext, PipelineOutcome};
pub use source::StudySource;
pub use store::{OperationDataSet, OperationKind, OperationStore};
