//! Refinement data model shared by the engine, the batch store and the CLI.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Structural role of a fragment on the page. Drives every length and
/// punctuation rule in the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StructuralTag {
    /// Any heading level; `h1`..`h6` collapse to one behaviour.
    Heading,
    ListItem,
    Paragraph,
    Other,
}

impl StructuralTag {
    /// Map an HTML-ish section label (`h2`, `li`, `p`, `div`, ...) to a tag.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_ascii_lowercase();
        match label.as_str() {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "heading" | "title" => Self::Heading,
            "li" | "listitem" | "list-item" | "list_item" => Self::ListItem,
            "p" | "paragraph" => Self::Paragraph,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heading => "heading",
            Self::ListItem => "listItem",
            Self::Paragraph => "paragraph",
            Self::Other => "other",
        }
    }

    /// Maximum number of sentences a fragment with this tag may keep.
    pub fn sentence_limit(&self) -> usize {
        match self {
            Self::Heading | Self::ListItem => 1,
            Self::Paragraph | Self::Other => 2,
        }
    }
}

/// One fragment to refine, built once by the upstream caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementRequest {
    /// Query or inferred intent phrase the fragment is optimized against.
    pub anchor: String,
    pub current_text: String,
    pub tag: StructuralTag,
    /// Similarity between anchor and current text; `0.0` when unknown.
    pub baseline_score: f64,
    pub max_attempts: u32,
}

impl RefinementRequest {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    pub fn new(
        anchor: impl Into<String>,
        current_text: impl Into<String>,
        tag: StructuralTag,
        baseline_score: f64,
    ) -> Self {
        Self {
            anchor: anchor.into(),
            current_text: current_text.into(),
            tag,
            baseline_score,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Set the attempt budget. Values below 1 are raised to 1.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

/// Where a candidate's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Origin {
    /// Pattern-table rewrite.
    Deterministic,
    /// Parsed from the external generation capability.
    Generated,
    /// Deterministic rewrite used because the configured generator failed.
    Fallback,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deterministic => "deterministic",
            Self::Generated => "generated",
            Self::Fallback => "fallback",
        }
    }
}

/// Normalized candidate text produced for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub text: String,
    pub origin: Origin,
}

/// A candidate with its similarity score and generation order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: f64,
    /// Zero-based generation order within one refinement.
    pub seq: u32,
}

impl ScoredCandidate {
    /// Rank two candidates: higher score first, earlier generation on ties.
    pub fn rank(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Outcome of a refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Decision {
    Improved,
    Unchanged,
    RolledBack,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Improved => "improved",
            Self::Unchanged => "unchanged",
            Self::RolledBack => "rolledBack",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "improved" => Some(Self::Improved),
            "unchanged" => Some(Self::Unchanged),
            "rolledBack" | "rolled_back" => Some(Self::RolledBack),
            _ => None,
        }
    }
}

/// Immutable record of one finished refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementResult {
    pub anchor: String,
    pub original_text: String,
    pub tag: StructuralTag,
    pub final_text: String,
    pub final_score: f64,
    pub baseline_score: f64,
    pub decision: Decision,
    /// `None` when the baseline is zero (or negative) and a ratio is meaningless.
    pub percent_change: Option<f64>,
    /// Attempts consumed, including failed ones.
    pub attempts: u32,
    /// Origin of the accepted candidate; `None` after a rollback.
    pub origin: Option<Origin>,
}

impl RefinementResult {
    /// Revert to the original text and baseline score.
    pub fn rolled_back(request: &RefinementRequest, attempts: u32) -> Self {
        Self {
            anchor: request.anchor.clone(),
            original_text: request.current_text.clone(),
            tag: request.tag,
            final_text: request.current_text.clone(),
            final_score: request.baseline_score,
            baseline_score: request.baseline_score,
            decision: Decision::RolledBack,
            percent_change: percent_change(request.baseline_score, request.baseline_score),
            attempts,
            origin: None,
        }
    }

    /// Accept a scored candidate. The decision is `improved` only when the
    /// candidate strictly beats the baseline.
    pub fn accepted(request: &RefinementRequest, best: ScoredCandidate, attempts: u32) -> Self {
        let decision = if best.score > request.baseline_score {
            Decision::Improved
        } else {
            Decision::Unchanged
        };
        Self {
            anchor: request.anchor.clone(),
            original_text: request.current_text.clone(),
            tag: request.tag,
            final_text: best.candidate.text,
            final_score: best.score,
            baseline_score: request.baseline_score,
            decision,
            percent_change: percent_change(request.baseline_score, best.score),
            attempts,
            origin: Some(best.candidate.origin),
        }
    }

    pub fn score_delta(&self) -> f64 {
        self.final_score - self.baseline_score
    }
}

/// Relative change from `baseline` to `new` in percent.
pub fn percent_change(baseline: f64, new: f64) -> Option<f64> {
    if baseline <= 0.0 {
        return None;
    }
    Some((new - baseline) / baseline * 100.0)
}
