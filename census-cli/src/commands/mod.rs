pub mod census;
pub mod common;
pub mod hardy_weinberg;
pub mod list;
pub mod qa;
pub mod run;
