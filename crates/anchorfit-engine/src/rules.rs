//! Ordered rewrite tables consumed by the normalizer and the deterministic
//! generator.
//!
//! Every table is plain data. Order matters wherever a table is scanned for
//! the first match, and tests pin that order.

use once_cell::sync::Lazy;
use regex::Regex;

/// Closed list of connectors a fragment must never end on.
pub const CONJUNCTIONS: &[&str] = &[
    "and", "or", "but", "nor", "yet", "so", "because", "although", "though", "while", "whereas",
    "since", "unless", "if", "whether", "than", "that", "with", "plus", "then",
];

/// Interrogative markers. A fragment containing one gets its terminal mood
/// forced; an anchor containing one is interrogative.
pub const INTERROGATIVES: &[&str] = &[
    "how", "what", "why", "when", "where", "which", "who", "whom", "whose",
];

/// Verb and past participle pairs for the question-form repair.
/// `"how to submit X"` and `"how X submitting"` both become `"how X is submitted"`.
pub const VERB_FORMS: &[(&str, &str, &str)] = &[
    // (infinitive, gerund, participle)
    ("do", "doing", "done"),
    ("perform", "performing", "performed"),
    ("make", "making", "made"),
    ("give", "giving", "given"),
    ("take", "taking", "taken"),
    ("open", "opening", "opened"),
    ("close", "closing", "closed"),
    ("submit", "submitting", "submitted"),
    ("create", "creating", "created"),
];

/// Compiled verb-form fix: a pattern and its replacement template.
pub struct VerbFix {
    pub pattern: Regex,
    pub replacement: String,
}

/// Verb-form fixes in application order: every infinitive form first, then
/// every gerund form.
pub static VERB_FIXES: Lazy<Vec<VerbFix>> = Lazy::new(|| {
    let infinitives = VERB_FORMS.iter().map(|(verb, _, participle)| VerbFix {
        pattern: Regex::new(&format!(r"(?i)\b(how)\s+to\s+{verb}\s+(\w+(?:\s+\w+)*)"))
            .expect("invalid infinitive verb-fix regex"),
        replacement: format!("${{1}} ${{2}} is {participle}"),
    });
    let gerunds = VERB_FORMS.iter().map(|(_, gerund, participle)| VerbFix {
        pattern: Regex::new(&format!(r"(?i)\b(how)\s+(\w+(?:\s+\w+)*?)\s+{gerund}\b"))
            .expect("invalid gerund verb-fix regex"),
        replacement: format!("${{1}} ${{2}} is {participle}"),
    });
    infinitives.chain(gerunds).collect()
});

/// Marketing and call-to-action phrases removed from every candidate.
pub const BANNED_PHRASES: &[&str] = &[
    "click here",
    "learn more",
    "sign up today",
    "get started now",
    "contact us today",
    "don't miss out",
    "act now",
    "buy now",
    "call now",
    "reach your target audience",
    "potential customers",
    "you can start today",
];

pub static BANNED_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    BANNED_PHRASES
        .iter()
        .map(|phrase| {
            Regex::new(&format!(r"(?i)\b{}\b", regex::escape(phrase)))
                .expect("invalid banned-phrase regex")
        })
        .collect()
});

/// Light synonym edits. At most one entry applies per candidate.
pub const SYNONYMS: &[(&str, &str)] = &[
    ("simple", "easy"),
    ("purchase", "buy"),
    ("utilize", "apply"),
    ("assist", "support"),
    ("commence", "begin"),
];

pub static SYNONYM_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    SYNONYMS
        .iter()
        .map(|(from, to)| {
            let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(from)))
                .expect("invalid synonym regex");
            (re, *to)
        })
        .collect()
});

/// Anchor words that call for a how-to rewrite.
pub const HOW_CUES: &[&str] = &["how", "how-to", "howto", "steps", "step-by-step"];

/// Anchor words naming an action; also select the how-to templates.
pub const ACTION_CUES: &[&str] = &[
    "create", "creating", "creation", "submit", "submitting", "submission", "setup", "set",
    "make", "making", "open", "opening", "close", "closing", "give", "giving", "take", "build",
    "building", "launch", "launching", "add", "adding", "install", "installing",
];

/// Anchor words that call for a guide heading.
pub const GUIDE_CUES: &[&str] = &["guide", "guides", "tutorial", "handbook", "manual", "walkthrough"];

/// Anchor words dropped when deriving the core phrase.
pub const CORE_STOPWORDS: &[&str] = &["how", "how-to", "howto", "to", "guide", "guides", "tutorial", "handbook", "manual", "walkthrough"];

/// Words kept lowercase inside a title, unless first.
pub const TITLE_SMALL_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "by", "for", "in", "of", "on", "or", "the", "to", "with",
];

/// How-to heading suffix. Headings ending with it are never length-capped.
pub const HOW_TO_SUFFIX: &str = "How Is It Done";

/// Guide heading suffix. Headings ending with it are never length-capped.
pub const GUIDE_SUFFIX: &str = "Guide";

/// Factual cues the paragraph summary looks for in the current text.
pub mod summary_cues {
    use super::*;

    pub static COST_PER_CLICK: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)\b(cost[- ]per[- ]click|cpc|pay(s|ing)? per click|per click)\b")
            .expect("invalid cost-per-click regex")
    });

    pub static SEARCH_RESULTS: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)\bsearch results?\b").expect("invalid search-results regex")
    });

    pub static STEPS: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)\b(steps?|step-by-step|stages?)\b").expect("invalid steps regex")
    });

    pub static ACCOUNT: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)\baccounts?\b").expect("invalid account regex"));
}

/// Whether `word` (case-insensitive) is in `table`.
pub fn contains_word(table: &[&str], word: &str) -> bool {
    table.iter().any(|w| w.eq_ignore_ascii_case(word))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_compile() {
        assert_eq!(VERB_FIXES.len(), VERB_FORMS.len() * 2);
        assert_eq!(BANNED_PATTERNS.len(), BANNED_PHRASES.len());
        assert_eq!(SYNONYM_PATTERNS.len(), SYNONYMS.len());
    }

    #[test]
    fn infinitive_fix() {
        let fix = &VERB_FIXES[0];
        let out = fix.pattern.replace("How to do tax returns", fix.replacement.as_str());
        assert_eq!(out, "How tax returns is done");
    }

    #[test]
    fn gerund_fix() {
        let fix = VERB_FIXES
            .iter()
            .find(|f| f.pattern.as_str().contains("submitting"))
            .unwrap();
        let out = fix.pattern.replace("how ad submitting works", fix.replacement.as_str());
        assert_eq!(out, "how ad is submitted works");
    }

    #[test]
    fn banned_phrase_whole_word() {
        let re = &BANNED_PATTERNS[0];
        assert!(re.is_match("Please CLICK HERE now"));
        assert!(!re.is_match("doubleclick heretofore"));
    }

    #[test]
    fn conjunction_lookup_ignores_case() {
        assert!(contains_word(CONJUNCTIONS, "And"));
        assert!(!contains_word(CONJUNCTIONS, "ads"));
    }

    #[test]
    fn synonym_replacements_never_match_a_pattern() {
        // A replacement that is itself a pattern would let a second pass apply a second rule.
        for (_, to) in SYNONYMS {
            assert!(SYNONYM_PATTERNS.iter().all(|(re, _)| !re.is_match(to)));
        }
    }
}
