//! Word and term helpers shared by the normalizer, the generators and the
//! coverage check.
//!
//! A *token* is a maximal run of alphanumeric characters, lowercased, so
//! "How-to" yields `how` and `to`. A *word* is a whitespace-separated chunk
//! and is what length caps count.

use std::collections::BTreeSet;

/// Collapse all whitespace runs to single spaces and trim both ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Number of whitespace-separated words.
pub fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

/// Lowercased alphanumeric tokens in order of appearance.
pub fn tokens(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// Whether `s` contains `token` as a whole token.
pub fn has_token(s: &str, token: &str) -> bool {
    tokens(s).any(|t| t == token)
}

/// Normalized token set of an anchor, used for coverage checks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TermSet {
    terms: BTreeSet<String>,
}

impl TermSet {
    pub fn from_anchor(anchor: &str) -> Self {
        Self {
            terms: tokens(anchor).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Number of distinct anchor terms literally present in `text`.
    pub fn overlap(&self, text: &str) -> usize {
        let present: BTreeSet<String> = tokens(text).collect();
        self.terms.intersection(&present).count()
    }

    /// Minimum overlap a candidate needs: half the terms, at least one.
    pub fn required_overlap(&self) -> usize {
        (self.terms.len() / 2).max(1)
    }

    /// Coverage check: `|terms ∩ tokens(text)| ≥ max(1, |terms| / 2)`.
    /// An empty term set is never covered.
    pub fn is_covered_by(&self, text: &str) -> bool {
        self.overlap(text) >= self.required_overlap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_and_count() {
        assert_eq!(collapse_whitespace("  a \t b\n\nc  "), "a b c");
        assert_eq!(word_count("  a \t b\n\nc  "), 3);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn tokens_split_on_punctuation() {
        let t: Vec<String> = tokens("Ad submission: How-to?").collect();
        assert_eq!(t, vec!["ad", "submission", "how", "to"]);
    }

    #[test]
    fn tokens_keep_non_ascii_letters() {
        let t: Vec<String> = tokens("Café façade").collect();
        assert_eq!(t, vec!["café", "façade"]);
    }

    #[test]
    fn coverage_needs_half_the_terms() {
        let terms = TermSet::from_anchor("ad submission how-to");
        assert_eq!(terms.len(), 4);
        assert_eq!(terms.required_overlap(), 2);
        assert!(terms.is_covered_by("Ad Submission: How Is It Done?"));
        assert!(!terms.is_covered_by("Submission rules."));
    }

    #[test]
    fn coverage_single_term_anchor() {
        let terms = TermSet::from_anchor("creation");
        assert_eq!(terms.required_overlap(), 1);
        assert!(terms.is_covered_by("Creation is explained."));
        assert!(!terms.is_covered_by("Something else."));
    }

    #[test]
    fn empty_anchor_never_covered() {
        let terms = TermSet::from_anchor("");
        assert!(terms.is_empty());
        assert!(!terms.is_covered_by("anything at all"));
    }

    #[test]
    fn duplicate_terms_count_once() {
        let terms = TermSet::from_anchor("ads ads ads");
        assert_eq!(terms.len(), 1);
        assert_eq!(terms.overlap("ads and more ads"), 1);
    }
}
