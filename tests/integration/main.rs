//! Integration tests for Jeolloga-Sync
//!
//! Every test runs the pipeline against a wiremock server standing in for the
//! catalog site.

mod common;
mod fetch_tests;
mod pipeline_tests;
mod reconcile_tests;
