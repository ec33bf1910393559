//! Aggregate statistics over refinement results.

use anchorfit_core::{Decision, RefinementResult};
use serde::Serialize;

use crate::output::StoredResult;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultStats {
    pub count: usize,
    /// Mean final score; `0.0` for an empty set.
    pub avg_new_score: f64,
    /// Mean of `new_score - old_score`; `0.0` for an empty set.
    pub avg_delta: f64,
    pub improved_count: usize,
    pub unchanged_count: usize,
    pub rolled_back_count: usize,
}

impl ResultStats {
    pub fn from_results(results: &[RefinementResult]) -> Self {
        Self::tally(
            results
                .iter()
                .map(|r| (r.baseline_score, r.final_score, r.decision)),
        )
    }

    pub fn from_stored(rows: &[StoredResult]) -> Self {
        Self::tally(rows.iter().map(|r| (r.old_score, r.new_score, r.decision)))
    }

    fn tally(rows: impl Iterator<Item = (f64, f64, Decision)>) -> Self {
        let mut stats = Self::default();
        let mut new_sum = 0.0;
        let mut delta_sum = 0.0;
        for (old, new, decision) in rows {
            stats.count += 1;
            new_sum += new;
            delta_sum += new - old;
            match decision {
                Decision::Improved => stats.improved_count += 1,
                Decision::Unchanged => stats.unchanged_count += 1,
                Decision::RolledBack => stats.rolled_back_count += 1,
            }
        }
        if stats.count > 0 {
            stats.avg_new_score = new_sum / stats.count as f64;
            stats.avg_delta = delta_sum / stats.count as f64;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(old: f64, new: f64, decision: Decision) -> StoredResult {
        StoredResult {
            anchor: "ad setup".into(),
            original_text: "Old.".into(),
            improved_text: "New.".into(),
            tag: "paragraph".into(),
            old_score: old,
            new_score: new,
            percent_change: None,
            decision,
            attempts: 1,
        }
    }

    #[test]
    fn in_memory_results_match_stored_rows() {
        use anchorfit_core::{Candidate, Origin, RefinementRequest, ScoredCandidate, StructuralTag};

        let request = RefinementRequest::new("ad setup", "Old.", StructuralTag::Paragraph, 0.60);
        let improved = RefinementResult::accepted(
            &request,
            ScoredCandidate {
                candidate: Candidate {
                    text: "New.".into(),
                    origin: Origin::Deterministic,
                },
                score: 0.80,
                seq: 0,
            },
            1,
        );
        let rolled = RefinementResult::rolled_back(&request, 3);
        let results = vec![improved, rolled];

        let stats = ResultStats::from_results(&results);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.improved_count, 1);
        assert_eq!(stats.rolled_back_count, 1);
        assert!((stats.avg_new_score - 0.70).abs() < 1e-9);
        assert!((stats.avg_delta - 0.10).abs() < 1e-9);

        let stored: Vec<StoredResult> = results.iter().map(StoredResult::from).collect();
        assert_eq!(ResultStats::from_stored(&stored), stats);
    }

    #[test]
    fn empty_set_is_all_zero() {
        assert_eq!(ResultStats::from_stored(&[]), ResultStats::default());
    }

    #[test]
    fn averages_and_counts() {
        let rows = vec![
            stored(0.70, 0.80, Decision::Improved),
            stored(0.70, 0.70, Decision::Unchanged),
            stored(0.60, 0.60, Decision::RolledBack),
            stored(0.50, 0.90, Decision::Improved),
        ];
        let stats = ResultStats::from_stored(&rows);
        assert_eq!(stats.count, 4);
        assert_eq!(stats.improved_count, 2);
        assert_eq!(stats.unchanged_count, 1);
        assert_eq!(stats.rolled_back_count, 1);
        assert!((stats.avg_new_score - 0.75).abs() < 1e-9);
        assert!((stats.avg_delta - 0.125).abs() < 1e-9);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["improved_count"], 2);
    }
}
