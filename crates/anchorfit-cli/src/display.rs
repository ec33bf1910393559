//! Terminal output for refinement runs.

use std::path::Path;

use anchorfit_core::{Decision, RefinementResult, StructuralTag, ValidationFailure};
use anchorfit_engine::BatchSummary;
use anchorfit_store::ResultStats;
use chrono::{DateTime, Utc};

const MAX_LIST_ITEMS: usize = 10;
const MAX_TEXT_CHARS: usize = 72;

pub fn print_summary(
    summary: &BatchSummary,
    stats: &ResultStats,
    output: &Path,
    started: DateTime<Utc>,
) {
    println!("=== Refinement run {} ===", started.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  {:<14} {}", "rows", summary.rows);
    println!("  {:<14} {}", "improved", summary.improved);
    println!("  {:<14} {}", "unchanged", summary.unchanged);
    println!("  {:<14} {}", "rolled back", summary.rolled_back);
    println!("  {:<14} {:.3}", "avg score", stats.avg_new_score);
    println!("  {:<14} {:+.3}", "avg delta", stats.avg_delta);
    println!("  {:<14} {:.1}s", "elapsed", summary.elapsed_secs);
    println!("  {:<14} {}", "output", output.display());
    println!();
}

/// Largest score gains among improved rows, best first.
pub fn print_top_changes(results: &[RefinementResult]) {
    let mut improved: Vec<&RefinementResult> = results
        .iter()
        .filter(|r| r.decision == Decision::Improved)
        .collect();
    if improved.is_empty() {
        return;
    }
    improved.sort_by(|a, b| b.score_delta().total_cmp(&a.score_delta()));

    println!("Top changes ({} of {}):", improved.len().min(MAX_LIST_ITEMS), improved.len());
    for r in improved.iter().take(MAX_LIST_ITEMS) {
        println!(
            "  {:.3} -> {:.3}  [{}] {}",
            r.baseline_score,
            r.final_score,
            r.tag.as_str(),
            r.anchor
        );
        println!("    - {}", clip(&r.original_text));
        println!("    + {}", clip(&r.final_text));
    }
}

pub fn print_normalized(text: &str, tag: StructuralTag, check: Result<(), ValidationFailure>) {
    println!("{text}");
    match check {
        Ok(()) => eprintln!("  valid {}", tag.as_str()),
        Err(e) => eprintln!("  rejected as {}: {e}", tag.as_str()),
    }
}

fn clip(text: &str) -> String {
    if text.chars().count() <= MAX_TEXT_CHARS {
        return text.to_string();
    }
    let head: String = text.chars().take(MAX_TEXT_CHARS - 3).collect();
    format!("{}...", head.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_keeps_short_text() {
        assert_eq!(clip("Ad Submission Guide"), "Ad Submission Guide");
    }

    #[test]
    fn clip_shortens_long_text() {
        let long = "word ".repeat(40);
        let clipped = clip(&long);
        assert!(clipped.ends_with("..."));
        assert!(clipped.chars().count() <= MAX_TEXT_CHARS);
    }
}
