//! Narrow interfaces to the external generation and similarity models.
//!
//! The engine never sees how these are transported. Implementations are
//! owned by the caller, loaded once, and shared read-only across workers,
//! so both traits require `Send + Sync`.

use crate::error::{GenerationFailure, ScoringError};
use crate::model::StructuralTag;

/// Everything the generation capability is told about one attempt.
#[derive(Debug, Clone, Copy)]
pub struct GenerationInput<'a> {
    pub anchor: &'a str,
    pub current_text: &'a str,
    pub tag: StructuralTag,
    pub baseline_score: f64,
    /// Best text seen so far in this refinement; equals `current_text` on
    /// the first attempt.
    pub prior_best: &'a str,
}

/// External text generation. Returns the raw reply, which is expected to
/// embed one JSON object somewhere in free-form text.
pub trait TextGeneration: Send + Sync {
    fn complete(&self, input: &GenerationInput<'_>) -> Result<String, GenerationFailure>;

    /// Model name for logging.
    fn model_name(&self) -> &str {
        "unknown"
    }
}

/// External semantic similarity. Must be deterministic for identical inputs.
/// Conventionally returns values in `[0, 1]`; `[-1, 1]` is tolerated.
pub trait Similarity: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> Result<f64, ScoringError>;
}

/// Similarity backed by a closure.
pub struct FnSimilarity<F>(pub F);

impl<F> Similarity for FnSimilarity<F>
where
    F: Fn(&str, &str) -> f64 + Send + Sync,
{
    fn similarity(&self, a: &str, b: &str) -> Result<f64, ScoringError> {
        Ok((self.0)(a, b))
    }
}

/// Text generation backed by a closure.
pub struct FnGeneration<F>(pub F);

impl<F> TextGeneration for FnGeneration<F>
where
    F: Fn(&GenerationInput<'_>) -> Result<String, GenerationFailure> + Send + Sync,
{
    fn complete(&self, input: &GenerationInput<'_>) -> Result<String, GenerationFailure> {
        (self.0)(input)
    }

    fn model_name(&self) -> &str {
        "closure"
    }
}
