//! Conditional feed fetching and parsing.
//!
//! Two small, side-effect-isolated stages of the pipeline:
//!
//! - [`fetcher`] - HTTP GET honoring `If-None-Match`/`If-Modified-Since`
//!   cache validators, returning raw bytes or a not-modified signal
//! - [`parser`] - adapter over `feed-rs` turning fetched bytes into a
//!   [`ParsedFeed`] (feed metadata + candidate articles)

mod fetcher;
mod parser;

pub use fetcher::{fetch, FetchError, FetchOutcome};
pub use parser::{parse_outcome, ParseError, ParsedFeed};
