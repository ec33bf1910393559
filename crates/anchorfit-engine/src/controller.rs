//! Bounded refinement loop.
//!
//! One refinement moves through generate → normalize → validate → score →
//! decide, retrying up to the request's attempt budget. A refinement never
//! fails: every error degrades to a fallback candidate or a rollback.

use std::cmp::Ordering;
use std::sync::Arc;

use anchorfit_core::text::word_count;
use anchorfit_core::{
    Candidate, DecisionStrategy, GenerationFailure, Origin, RefinementRequest, RefinementResult,
    ScoredCandidate, StructuralTag, TermSet, ValidationFailure,
};
use tracing::{debug, warn};

use crate::generator::{CandidateGenerator, DeterministicGenerator};
use crate::normalize::{is_interrogative_anchor, normalize};
use crate::scorer::Scorer;

/// Drives candidate generation and applies the configured decision strategy.
pub struct Controller {
    scorer: Scorer,
    strategy: DecisionStrategy,
    primary: Arc<dyn CandidateGenerator>,
    fallback: DeterministicGenerator,
    contenders: Vec<Arc<dyn CandidateGenerator>>,
}

impl Controller {
    /// Retry `primary` up to the attempt budget and roll back unless a
    /// covered candidate reaches the baseline.
    pub fn coverage_rollback(primary: Arc<dyn CandidateGenerator>, scorer: Scorer) -> Self {
        Self {
            scorer,
            strategy: DecisionStrategy::CoverageRollback,
            primary,
            fallback: DeterministicGenerator::rule_based(),
            contenders: default_contenders(),
        }
    }

    /// Run each contender once and keep the highest-scoring candidate, even
    /// below baseline. Contenders default to the rule-based and short-answer
    /// deterministic generators.
    pub fn best_of_n(scorer: Scorer) -> Self {
        Self {
            scorer,
            strategy: DecisionStrategy::BestOfN,
            primary: Arc::new(DeterministicGenerator::rule_based()),
            fallback: DeterministicGenerator::rule_based(),
            contenders: default_contenders(),
        }
    }

    /// Replace the best-of-N contenders, in generation order.
    pub fn with_contenders(mut self, contenders: Vec<Arc<dyn CandidateGenerator>>) -> Self {
        self.contenders = contenders;
        self
    }

    pub fn strategy(&self) -> DecisionStrategy {
        self.strategy
    }

    pub fn refine(&self, request: &RefinementRequest) -> RefinementResult {
        let result = match self.strategy {
            DecisionStrategy::CoverageRollback => self.refine_with_rollback(request),
            DecisionStrategy::BestOfN => self.refine_best_of_n(request),
        };
        debug!(
            tag = request.tag.as_str(),
            decision = result.decision.as_str(),
            attempts = result.attempts,
            baseline = result.baseline_score,
            score = result.final_score,
            "refinement finished"
        );
        result
    }

    fn refine_with_rollback(&self, request: &RefinementRequest) -> RefinementResult {
        let terms = TermSet::from_anchor(&request.anchor);
        // `None` stands for the current text, which never counts as covered.
        let mut best: Option<ScoredCandidate> = None;
        let mut best_score = request.baseline_score;
        let mut best_covered = false;
        let mut attempts = 0u32;

        while attempts < request.max_attempts {
            let seq = attempts;
            attempts += 1;

            let prior_best = best
                .as_ref()
                .map_or(request.current_text.as_str(), |b| b.candidate.text.as_str());
            let Some(candidate) = self.attempt(request, prior_best) else {
                continue;
            };

            let score = self.scorer.score(&request.anchor, &candidate.text);
            let covered = terms.is_covered_by(&candidate.text);
            debug!(
                attempt = attempts,
                score,
                covered,
                origin = candidate.origin.as_str(),
                "scored candidate"
            );
            let scored = ScoredCandidate {
                candidate,
                score,
                seq,
            };

            if score >= request.baseline_score && covered {
                return RefinementResult::accepted(request, scored, attempts);
            }
            if score > best_score {
                best_score = score;
                best_covered = covered;
                best = Some(scored);
            }
        }

        match best {
            Some(best) if best_covered && best.score >= request.baseline_score => {
                RefinementResult::accepted(request, best, attempts)
            }
            _ => RefinementResult::rolled_back(request, attempts),
        }
    }

    fn refine_best_of_n(&self, request: &RefinementRequest) -> RefinementResult {
        let mut best: Option<ScoredCandidate> = None;
        let mut attempts = 0u32;

        for (seq, generator) in self.contenders.iter().enumerate() {
            attempts += 1;
            let raw = match generator.generate(request, &request.current_text) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(generator = generator.name(), error = %e, "contender failed");
                    continue;
                }
            };
            let candidate = match shape(request, &raw, generator.origin()) {
                Ok(candidate) => candidate,
                Err(e) => {
                    debug!(generator = generator.name(), error = %e, "contender rejected");
                    continue;
                }
            };
            let score = self.scorer.score(&request.anchor, &candidate.text);
            let scored = ScoredCandidate {
                candidate,
                score,
                seq: seq as u32,
            };
            best = match best {
                Some(current) if current.rank(&scored) != Ordering::Less => Some(current),
                _ => Some(scored),
            };
        }

        match best {
            Some(best) => RefinementResult::accepted(request, best, attempts),
            None => RefinementResult::rolled_back(request, attempts),
        }
    }

    /// One attempt of the retry loop. The deterministic fallback stands in
    /// when the primary generator fails or its text normalizes to nothing.
    fn attempt(&self, request: &RefinementRequest, prior_best: &str) -> Option<Candidate> {
        let primary = self
            .primary
            .generate(request, prior_best)
            .map_err(AttemptError::Generation)
            .and_then(|raw| {
                shape(request, &raw, self.primary.origin()).map_err(AttemptError::Validation)
            });

        match primary {
            Ok(candidate) => return Some(candidate),
            Err(AttemptError::Validation(e)) if e != ValidationFailure::Empty => {
                debug!(generator = self.primary.name(), error = %e, "candidate rejected");
                return None;
            }
            Err(e) => warn!(
                generator = self.primary.name(),
                error = %e,
                "generation failed, using deterministic fallback"
            ),
        }

        let raw = match self.fallback.generate(request, prior_best) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "deterministic fallback failed");
                return None;
            }
        };
        match shape(request, &raw, Origin::Fallback) {
            Ok(candidate) => Some(candidate),
            Err(e) => {
                debug!(error = %e, "fallback candidate rejected");
                None
            }
        }
    }
}

fn default_contenders() -> Vec<Arc<dyn CandidateGenerator>> {
    vec![
        Arc::new(DeterministicGenerator::rule_based()),
        Arc::new(DeterministicGenerator::short_answer()),
    ]
}

#[derive(Debug, thiserror::Error)]
enum AttemptError {
    #[error(transparent)]
    Generation(GenerationFailure),
    #[error(transparent)]
    Validation(ValidationFailure),
}

/// Normalize raw generator output and check it against the tag's invariants.
fn shape(
    request: &RefinementRequest,
    raw: &str,
    origin: Origin,
) -> Result<Candidate, ValidationFailure> {
    let text = normalize(raw, request.tag, &request.anchor, &request.current_text);
    validate(&text, request)?;
    Ok(Candidate { text, origin })
}

/// Structural invariants every accepted text must satisfy for its tag.
pub fn validate(text: &str, request: &RefinementRequest) -> Result<(), ValidationFailure> {
    if text.trim().is_empty() {
        return Err(ValidationFailure::Empty);
    }
    let terminal = text.ends_with(['.', '!', '?']);
    match request.tag {
        StructuralTag::Heading => {
            if text.ends_with(['.', '!'])
                || (text.ends_with('?') && !is_interrogative_anchor(&request.anchor))
            {
                return Err(ValidationFailure::HeadingTerminal);
            }
        }
        StructuralTag::ListItem => {
            if !terminal {
                return Err(ValidationFailure::MissingTerminal);
            }
            let original = word_count(&request.current_text);
            let words = word_count(text);
            if original > 0 && words > original + 1 {
                return Err(ValidationFailure::ListItemTooLong {
                    words,
                    limit: original + 1,
                });
            }
        }
        StructuralTag::Paragraph | StructuralTag::Other => {
            if !terminal {
                return Err(ValidationFailure::MissingTerminal);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use anchorfit_core::{Decision, FnSimilarity, ScoringError, Similarity};

    use super::*;

    /// Generator replaying a fixed script and recording `prior_best`.
    struct Scripted {
        replies: Mutex<VecDeque<Result<String, GenerationFailure>>>,
        seen: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, GenerationFailure>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn repeat(text: &str, n: usize) -> Arc<Self> {
            Self::new((0..n).map(|_| Ok(text.to_string())).collect())
        }
    }

    impl CandidateGenerator for Scripted {
        fn generate(
            &self,
            _request: &RefinementRequest,
            prior_best: &str,
        ) -> Result<String, GenerationFailure> {
            self.seen.lock().unwrap().push(prior_best.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(GenerationFailure::Process("script exhausted".into())))
        }

        fn origin(&self) -> Origin {
            Origin::Generated
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// Similarity replaying a fixed list of scores.
    struct ScriptedScores(Mutex<VecDeque<f64>>);

    impl ScriptedScores {
        fn new(scores: &[f64]) -> Arc<Self> {
            Arc::new(Self(Mutex::new(scores.iter().copied().collect())))
        }
    }

    impl Similarity for ScriptedScores {
        fn similarity(&self, a: &str, b: &str) -> Result<f64, ScoringError> {
            assert!(!a.trim().is_empty() && !b.trim().is_empty());
            Ok(self.0.lock().unwrap().pop_front().unwrap_or(0.0))
        }
    }

    fn strict_similarity(score: f64) -> Scorer {
        Scorer::new(Arc::new(FnSimilarity(move |a: &str, b: &str| {
            assert!(!a.trim().is_empty(), "similarity called with empty anchor");
            assert!(!b.trim().is_empty(), "similarity called with empty text");
            score
        })))
    }

    fn paragraph(anchor: &str, current: &str, baseline: f64) -> RefinementRequest {
        RefinementRequest::new(anchor, current, StructuralTag::Paragraph, baseline)
    }

    #[test]
    fn exhausted_attempts_below_baseline_roll_back() {
        let generator = Scripted::repeat("Ad setup made easy.", 3);
        let controller = Controller::coverage_rollback(
            generator.clone(),
            Scorer::new(ScriptedScores::new(&[0.60, 0.62, 0.61])),
        );
        let req = paragraph("ad setup", "Our ads help.", 0.70).with_max_attempts(3);

        let res = controller.refine(&req);
        assert_eq!(res.decision, Decision::RolledBack);
        assert_eq!(res.final_text, "Our ads help.");
        assert_eq!(res.final_score, 0.70);
        assert_eq!(res.attempts, 3);
        assert!(res.origin.is_none());
    }

    #[test]
    fn covered_candidate_at_baseline_accepts_early() {
        let generator = Scripted::repeat("Ad setup made easy.", 3);
        let controller = Controller::coverage_rollback(
            generator.clone(),
            Scorer::new(ScriptedScores::new(&[0.65, 0.75, 0.99])),
        );
        let req = paragraph("ad setup", "Our ads help.", 0.70);

        let res = controller.refine(&req);
        assert_eq!(res.decision, Decision::Improved);
        assert_eq!(res.final_text, "Ad setup made easy.");
        assert_eq!(res.final_score, 0.75);
        assert_eq!(res.attempts, 2);
        assert_eq!(res.origin, Some(Origin::Generated));
    }

    #[test]
    fn equal_score_with_coverage_is_unchanged() {
        let generator = Scripted::repeat("Ad setup made easy.", 1);
        let controller = Controller::coverage_rollback(generator, strict_similarity(0.70));
        let res = controller.refine(&paragraph("ad setup", "Our ads help.", 0.70));
        assert_eq!(res.decision, Decision::Unchanged);
        assert_eq!(res.final_text, "Ad setup made easy.");
    }

    #[test]
    fn uncovered_candidates_never_accepted() {
        let generator = Scripted::repeat("Something unrelated entirely.", 3);
        let controller = Controller::coverage_rollback(generator, strict_similarity(0.95));
        let res = controller.refine(&paragraph("ad setup", "Our ads help.", 0.70));
        assert_eq!(res.decision, Decision::RolledBack);
        assert_eq!(res.final_text, "Our ads help.");
        assert_eq!(res.attempts, 3);
    }

    #[test]
    fn retries_see_best_so_far() {
        let generator = Scripted::new(vec![
            Ok("Unrelated words first.".into()),
            Ok("Ad setup made easy.".into()),
        ]);
        let controller = Controller::coverage_rollback(
            generator.clone(),
            Scorer::new(ScriptedScores::new(&[0.80, 0.90])),
        );
        let res = controller.refine(&paragraph("ad setup", "Our ads help.", 0.70));
        assert_eq!(res.decision, Decision::Improved);
        let seen = generator.seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["Our ads help.", "Unrelated words first."]);
    }

    #[test]
    fn failed_generation_uses_deterministic_fallback() {
        let generator = Scripted::new(vec![Err(GenerationFailure::Timeout(
            std::time::Duration::from_secs(120),
        ))]);
        let controller = Controller::coverage_rollback(generator, strict_similarity(0.9));
        let req = RefinementRequest::new("ad creation", "Ad creation.", StructuralTag::ListItem, 0.7);

        let res = controller.refine(&req);
        assert_eq!(res.decision, Decision::Improved);
        assert_eq!(res.final_text, "Creation is explained.");
        assert_eq!(res.origin, Some(Origin::Fallback));
        assert_eq!(res.attempts, 1);
    }

    #[test]
    fn empty_normalization_falls_back() {
        let generator = Scripted::new(vec![Ok(" , and ... ".into())]);
        let controller = Controller::coverage_rollback(generator, strict_similarity(0.9));
        let req = RefinementRequest::new(
            "ad submission how-to",
            "About online ads.",
            StructuralTag::Heading,
            0.7,
        );
        let res = controller.refine(&req);
        assert_eq!(res.final_text, "Ad Submission: How Is It Done?");
        assert_eq!(res.origin, Some(Origin::Fallback));
    }

    #[test]
    fn empty_anchor_rolls_back_without_scoring() {
        let controller = Controller::coverage_rollback(
            Arc::new(DeterministicGenerator::rule_based()),
            strict_similarity(0.9),
        );
        let req = paragraph("", "Some text.", 0.7);
        let res = controller.refine(&req);
        assert_eq!(res.decision, Decision::RolledBack);
        assert_eq!(res.final_text, "Some text.");
        assert_eq!(res.final_score, 0.7);
    }

    #[test]
    fn empty_current_text_never_scores_empty_strings() {
        let controller = Controller::coverage_rollback(
            Arc::new(DeterministicGenerator::rule_based()),
            strict_similarity(0.5),
        );
        let res = controller.refine(&paragraph("ad setup", "", 0.0));
        assert_eq!(res.decision, Decision::Improved);
        assert_eq!(res.final_text, "This section explains ad setup.");
        assert_eq!(res.percent_change, None);
    }

    #[test]
    fn deterministic_heading_scenario() {
        let controller = Controller::coverage_rollback(
            Arc::new(DeterministicGenerator::rule_based()),
            strict_similarity(0.8),
        );
        let req = RefinementRequest::new(
            "ad submission how-to",
            "About online ads.",
            StructuralTag::Heading,
            0.7,
        );
        let res = controller.refine(&req);
        assert_eq!(res.decision, Decision::Improved);
        assert_eq!(res.final_text, "Ad Submission: How Is It Done?");
        assert_eq!(res.origin, Some(Origin::Deterministic));
    }

    #[test]
    fn best_of_n_keeps_highest_even_below_baseline() {
        let scorer = Scorer::new(Arc::new(FnSimilarity(|_: &str, b: &str| {
            if b.starts_with("What") { 0.62 } else { 0.55 }
        })));
        let controller = Controller::best_of_n(scorer);
        let req = paragraph(
            "how to submit an ad",
            "Ads are shown online to many people every day.",
            0.80,
        );

        let res = controller.refine(&req);
        assert_eq!(controller.strategy(), DecisionStrategy::BestOfN);
        assert_eq!(res.final_text, "What are the steps of submit an ad?");
        assert_eq!(res.final_score, 0.62);
        assert_eq!(res.decision, Decision::Unchanged);
        assert_eq!(res.attempts, 2);
    }

    #[test]
    fn best_of_n_ties_prefer_first_contender() {
        let controller = Controller::best_of_n(strict_similarity(0.9));
        let req = RefinementRequest::new("ad creation", "Ad creation.", StructuralTag::ListItem, 0.7);
        let res = controller.refine(&req);
        assert_eq!(res.final_text, "Creation is explained.");
        assert_eq!(res.decision, Decision::Improved);
    }

    #[test]
    fn best_of_n_without_survivors_rolls_back() {
        let failing: Arc<dyn CandidateGenerator> =
            Scripted::new(vec![Err(GenerationFailure::Parse("x".into()))]);
        let controller = Controller::best_of_n(strict_similarity(0.9)).with_contenders(vec![failing]);
        let res = controller.refine(&paragraph("ad setup", "Old text.", 0.7));
        assert_eq!(res.decision, Decision::RolledBack);
        assert_eq!(res.final_text, "Old text.");
        assert_eq!(res.attempts, 1);
    }

    #[test]
    fn decision_invariants_hold_across_score_scripts() {
        let scripts: [&[f64]; 5] = [
            &[0.1, 0.2, 0.3],
            &[0.9],
            &[0.69, 0.70],
            &[0.5, 0.95, 0.4],
            &[],
        ];
        for scores in scripts {
            let generator = Scripted::repeat("Ad setup made easy.", 3);
            let controller =
                Controller::coverage_rollback(generator, Scorer::new(ScriptedScores::new(scores)));
            let req = paragraph("ad setup", "Our ads help.", 0.70);
            let res = controller.refine(&req);
            match res.decision {
                Decision::Improved => assert!(res.final_score >= res.baseline_score),
                Decision::RolledBack => {
                    assert_eq!(res.final_text, req.current_text);
                    assert_eq!(res.final_score, req.baseline_score);
                }
                Decision::Unchanged => assert_eq!(res.final_score, res.baseline_score),
            }
            assert!(res.attempts >= 1 && res.attempts <= 3);
        }
    }

    #[test]
    fn validation_rules() {
        let heading = RefinementRequest::new("ad setup", "Ads", StructuralTag::Heading, 0.5);
        assert_eq!(validate("Ad Setup.", &heading), Err(ValidationFailure::HeadingTerminal));
        assert_eq!(validate("Ad Setup?", &heading), Err(ValidationFailure::HeadingTerminal));
        assert_eq!(validate("Ad Setup", &heading), Ok(()));

        let question = RefinementRequest::new("how to set up ads", "Ads", StructuralTag::Heading, 0.5);
        assert_eq!(validate("Ad Setup?", &question), Ok(()));

        let item = RefinementRequest::new("ad setup", "Ad setup.", StructuralTag::ListItem, 0.5);
        assert_eq!(validate("Ad setup", &item), Err(ValidationFailure::MissingTerminal));
        assert_eq!(
            validate("Ad setup is easy now.", &item),
            Err(ValidationFailure::ListItemTooLong { words: 5, limit: 3 })
        );
        assert_eq!(validate("   ", &item), Err(ValidationFailure::Empty));
    }
}
