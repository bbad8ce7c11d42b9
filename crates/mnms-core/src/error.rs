//! Decoding errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload did not split into the expected number of sections
    #[error("Malformed envelope: expected {expected} sections, found {found}")]
    MalformedEnvelope { expected: usize, found: usize },
    /// A link rate without any numeric prefix
    #[error("Unparsable link rate: {0:?}")]
    UnparsableRate(String),
}
