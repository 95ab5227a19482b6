//! Marker and sample quality assurance.

pub mod markers;
pub mod samples;

pub use markers::{qa_entry_from_raw, run_qa_markers, QaMarkersEntry, QaMarkersReader};
pub use samples::{run_qa_samples, QaSamplesEntry, QaSamplesReader};
