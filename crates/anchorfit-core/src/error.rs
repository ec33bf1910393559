use std::time::Duration;

use thiserror::Error;

/// A failed generation attempt. Always recoverable: the controller falls
/// back to the deterministic generator and then to the original text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationFailure {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("generation process failed: {0}")]
    Process(String),

    #[error("no usable structured reply: {0}")]
    Parse(String),

    #[error("anchor is empty")]
    EmptyAnchor,
}

/// Failure inside a similarity capability. The scorer resolves it to `0.0`.
#[derive(Debug, Clone, Error)]
pub enum ScoringError {
    #[error("similarity model failed: {0}")]
    Model(String),
}

/// A normalized candidate that breaks a structural invariant for its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("candidate is empty after normalization")]
    Empty,

    #[error("heading ends with forbidden punctuation")]
    HeadingTerminal,

    #[error("fragment does not end with terminal punctuation")]
    MissingTerminal,

    #[error("list item has {words} words, limit is {limit}")]
    ListItemTooLong { words: usize, limit: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(std::path::PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
