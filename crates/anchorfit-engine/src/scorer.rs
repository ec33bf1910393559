use std::sync::Arc;

use anchorfit_core::Similarity;
use tracing::warn;

/// Similarity scoring with a neutral value for unusable input.
///
/// Blank input scores `0.0` without reaching the capability. Capability
/// errors and non-finite values also resolve to `0.0`, so the controller
/// always has a comparable number.
#[derive(Clone)]
pub struct Scorer {
    capability: Arc<dyn Similarity>,
}

impl Scorer {
    pub fn new(capability: Arc<dyn Similarity>) -> Self {
        Self { capability }
    }

    pub fn score(&self, anchor: &str, text: &str) -> f64 {
        if anchor.trim().is_empty() || text.trim().is_empty() {
            return 0.0;
        }
        match self.capability.similarity(anchor, text) {
            Ok(score) if score.is_finite() => score,
            Ok(score) => {
                warn!(score, "similarity returned a non-finite value");
                0.0
            }
            Err(e) => {
                warn!(error = %e, "similarity failed, scoring 0.0");
                0.0
            }
        }
    }
}
