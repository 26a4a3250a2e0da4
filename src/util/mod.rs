//! Utility functions shared across the pipeline.

mod text;

pub use text::{derive_summary, normalize_body, SUMMARY_MAX_CHARS};
