//! Output module for run summaries and store reports

pub mod stats;

pub use stats::{print_statistics, print_summary, RunSummary};
