//! Job descriptor model and wire-format parsing.
//!
//! A worker invocation receives a batch of raw records; each record describes
//! one job: where its artifacts live in object storage, the command to run,
//! and the stream to acknowledge on.

mod parse;
mod types;

pub use parse::{parse_batch, parse_record};
pub use types::*;

use thiserror::Error;

/// Errors that can occur while decoding a job record.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("Malformed job record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Job record field `{0}` is empty")]
    EmptyField(&'static str),
}
