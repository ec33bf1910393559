//! Tag-aware text shaping.
//!
//! [`normalize`] runs eight rules in a fixed order and repeats the whole
//! pipeline until the text stops changing, so its output is a fixpoint:
//! normalizing an already-normalized fragment returns it untouched.
//!
//! 1. whitespace and punctuation-noise cleanup
//! 2. sentence truncation (one sentence for headings and list items, two otherwise)
//! 3. trailing-conjunction trimming
//! 4. question-form repair and terminal mood detection
//! 5. banned-phrase removal
//! 6. single synonym substitution
//! 7. length caps relative to the original word count
//! 8. terminal punctuation per tag

use anchorfit_core::StructuralTag;
use anchorfit_core::text::{collapse_whitespace, has_token, tokens, word_count};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use crate::rules::{
    BANNED_PATTERNS, CONJUNCTIONS, GUIDE_SUFFIX, HOW_TO_SUFFIX, INTERROGATIVES, SYNONYM_PATTERNS,
    SYNONYMS, VERB_FIXES, contains_word,
};

/// Upper bound on pipeline passes. Realistic input settles in two.
const MAX_PASSES: usize = 8;

const LEADING_NOISE: &[char] = &[',', ';', ':', '-', '"', '\'', '*', '•', '.', '!', '?'];
const TRAILING_NOISE: &[char] = &[',', ';', ':', '-', '"', '\'', '*', '•'];
const TERMINALS: &[char] = &['.', '!', '?'];

static ELLIPSIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.{2,}|…").expect("invalid ellipsis regex"));
static REPEATED_TERMINAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([.!?])[.!?]+").expect("invalid repeated-terminal regex"));
static DANGLING_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([.,;:!?])").expect("invalid dangling-punctuation regex"));
static REPEATED_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([,;:])(?:\s*[,;:])+").expect("invalid separator regex"));
static SEPARATOR_BEFORE_TERMINAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,;:]\s*([.!?])").expect("invalid separator regex"));

/// Terminal mood forced by rule 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mood {
    Question,
    Declarative,
}

/// An anchor is interrogative when it carries an interrogative marker or
/// ends with a question mark.
pub fn is_interrogative_anchor(anchor: &str) -> bool {
    anchor.trim_end().ends_with('?')
        || tokens(anchor).any(|t| contains_word(INTERROGATIVES, &t))
}

/// Shape `raw` for a fragment with the given tag.
///
/// `original` is the text being replaced; its word count drives the length
/// caps. Returns an empty string when nothing usable survives, which callers
/// must treat as a failed candidate.
pub fn normalize(raw: &str, tag: StructuralTag, anchor: &str, original: &str) -> String {
    let normalizer = Normalizer {
        tag,
        interrogative_anchor: is_interrogative_anchor(anchor),
        original_words: word_count(original),
    };

    let mut text = raw.to_string();
    for _ in 0..MAX_PASSES {
        let next = normalizer.pass(&text);
        if next == text {
            return next;
        }
        text = next;
    }
    debug!(tag = tag.as_str(), "normalizer did not settle");
    text
}

struct Normalizer {
    tag: StructuralTag,
    interrogative_anchor: bool,
    original_words: usize,
}

impl Normalizer {
    fn pass(&self, input: &str) -> String {
        let text = clean_noise(input);
        if text.is_empty() {
            return text;
        }
        let text = truncate_sentences(&text, self.tag.sentence_limit());
        let text = trim_trailing_conjunctions(&text);
        let (text, mood) = self.repair_question_form(&text);
        let text = remove_banned(&text);
        let text = substitute_synonym(&text);
        let text = self.cap_length(&text);
        self.apply_terminal(&text, mood)
    }

    fn repair_question_form(&self, text: &str) -> (String, Option<Mood>) {
        let mut out = text.to_string();
        for fix in VERB_FIXES.iter() {
            out = fix
                .pattern
                .replace_all(&out, fix.replacement.as_str())
                .into_owned();
        }
        let has_marker = tokens(&out).any(|t| contains_word(INTERROGATIVES, &t));
        let mood = has_marker.then(|| {
            if self.interrogative_anchor {
                Mood::Question
            } else {
                Mood::Declarative
            }
        });
        (out, mood)
    }

    fn cap_length(&self, text: &str) -> String {
        let o = self.original_words;
        if o == 0 {
            return text.to_string();
        }
        let cap = match self.tag {
            StructuralTag::Heading => {
                if has_protected_suffix(text) {
                    return text.to_string();
                }
                (o + 4).max(o * 9 / 5)
            }
            StructuralTag::ListItem => o + 1,
            StructuralTag::Paragraph | StructuralTag::Other => {
                if o >= 10 {
                    (o * 11).div_ceil(10)
                } else {
                    o + 1
                }
            }
        };
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.len() <= cap {
            return text.to_string();
        }
        trim_trailing_conjunctions(&words[..cap].join(" "))
    }

    fn apply_terminal(&self, text: &str, mood: Option<Mood>) -> String {
        let (body, terminal) = split_terminal(text);
        let body = body.trim_end_matches(|c: char| TRAILING_NOISE.contains(&c) || c.is_whitespace());
        match self.tag {
            StructuralTag::Heading => {
                let body = body.trim_end_matches(TERMINALS).trim_end();
                if body.is_empty() {
                    return String::new();
                }
                let question = match mood {
                    Some(Mood::Question) => true,
                    Some(Mood::Declarative) => false,
                    None => terminal == Some('?') && self.interrogative_anchor,
                };
                if question {
                    format!("{body}?")
                } else {
                    body.to_string()
                }
            }
            StructuralTag::ListItem | StructuralTag::Paragraph | StructuralTag::Other => {
                if body.is_empty() {
                    return String::new();
                }
                let terminal = match mood {
                    Some(Mood::Question) => '?',
                    Some(Mood::Declarative) => '.',
                    None => terminal.unwrap_or('.'),
                };
                format!("{body}{terminal}")
            }
        }
    }
}

fn clean_noise(text: &str) -> String {
    let text = collapse_whitespace(text);
    let text = ELLIPSIS.replace_all(&text, ".");
    let text = REPEATED_TERMINAL.replace_all(&text, "$1");
    let text = DANGLING_PUNCT.replace_all(&text, "$1");
    text.trim_start_matches(|c: char| LEADING_NOISE.contains(&c) || c.is_whitespace())
        .trim_end_matches(|c: char| TRAILING_NOISE.contains(&c) || c.is_whitespace())
        .to_string()
}

/// Sentences end at `.`, `!` or `?` followed by whitespace or the end of text.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if !TERMINALS.contains(&c) {
            continue;
        }
        let end = i + c.len_utf8();
        if end == text.len() || text[end..].starts_with(char::is_whitespace) {
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

fn truncate_sentences(text: &str, limit: usize) -> String {
    let sentences = split_sentences(text);
    if sentences.len() <= limit {
        return text.to_string();
    }
    sentences[..limit].join(" ")
}

fn split_terminal(text: &str) -> (&str, Option<char>) {
    match text.chars().last() {
        Some(c) if TERMINALS.contains(&c) => (text[..text.len() - c.len_utf8()].trim_end(), Some(c)),
        _ => (text, None),
    }
}

/// Drop trailing noise and conjunctions, keeping any terminal punctuation.
fn trim_trailing_conjunctions(text: &str) -> String {
    let (body, terminal) = split_terminal(text);
    let mut words: Vec<&str> = body.split_whitespace().collect();
    while let Some(last) = words.last().copied() {
        let stripped = last.trim_end_matches(TRAILING_NOISE);
        if stripped.is_empty() || contains_word(CONJUNCTIONS, stripped) {
            words.pop();
            continue;
        }
        let idx = words.len() - 1;
        words[idx] = stripped;
        break;
    }
    if words.is_empty() {
        return String::new();
    }
    let mut out = words.join(" ");
    if let Some(t) = terminal {
        out.push(t);
    }
    out
}

fn remove_banned(text: &str) -> String {
    if !BANNED_PATTERNS.iter().any(|re| re.is_match(text)) {
        return text.to_string();
    }
    let mut out = text.to_string();
    for re in BANNED_PATTERNS.iter() {
        out = re.replace_all(&out, "").into_owned();
    }
    let out = collapse_whitespace(&out);
    let out = DANGLING_PUNCT.replace_all(&out, "$1");
    let out = REPEATED_SEPARATOR.replace_all(&out, "$1");
    let out = SEPARATOR_BEFORE_TERMINAL.replace_all(&out, "$1");
    let out = REPEATED_TERMINAL.replace_all(&out, "$1");
    out.trim_start_matches(|c: char| LEADING_NOISE.contains(&c) || c.is_whitespace())
        .trim_end_matches(|c: char| TRAILING_NOISE.contains(&c) || c.is_whitespace())
        .to_string()
}

/// Apply the first matching synonym rule to every occurrence of its
/// pattern. Skipped entirely when a replacement word is already present.
fn substitute_synonym(text: &str) -> String {
    if SYNONYMS.iter().any(|(_, to)| has_token(text, to)) {
        return text.to_string();
    }
    for (pattern, replacement) in SYNONYM_PATTERNS.iter() {
        if pattern.is_match(text) {
            return pattern
                .replace_all(text, |caps: &Captures<'_>| match_case(&caps[0], replacement))
                .into_owned();
        }
    }
    text.to_string()
}

/// Carry the first letter's case of `matched` over to `replacement`.
fn match_case(matched: &str, replacement: &str) -> String {
    let upper = matched.chars().next().is_some_and(char::is_uppercase);
    if !upper {
        return replacement.to_string();
    }
    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Whether a heading ends with the how-to or guide suffix.
pub fn has_protected_suffix(text: &str) -> bool {
    let body = text.trim_end_matches(TERMINALS).trim_end().to_lowercase();
    body.ends_with(&HOW_TO_SUFFIX.to_lowercase())
        || body
            .split_whitespace()
            .last()
            .is_some_and(|w| w == GUIDE_SUFFIX.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use StructuralTag::*;

    fn norm(raw: &str, tag: StructuralTag, anchor: &str, original: &str) -> String {
        normalize(raw, tag, anchor, original)
    }

    #[test]
    fn trims_dangling_conjunction_and_applies_synonym() {
        let out = norm(
            "  the ad setup is simple and  ",
            Paragraph,
            "ad setup",
            "The ad setup is quick.",
        );
        assert_eq!(out, "the ad setup is easy.");
    }

    #[test]
    fn heading_without_question_drops_terminal() {
        assert_eq!(norm("Ad setup checklist.", Heading, "ad setup", "Ad setup"), "Ad setup checklist");
    }

    #[test]
    fn heading_keeps_first_sentence_only() {
        assert_eq!(norm("Ad Setup. Second part", Heading, "ad setup", "Ad setup"), "Ad Setup");
    }

    #[test]
    fn verb_fix_then_declarative_heading() {
        let out = norm("How to create an ad?", Heading, "ad creation", "Ads");
        assert_eq!(out, "How an ad is created");
    }

    #[test]
    fn interrogative_anchor_forces_question_mark() {
        let out = norm("what is cpc", Paragraph, "what is cost per click", "CPC means cost per click.");
        assert_eq!(out, "what is cpc?");
    }

    #[test]
    fn list_item_capped_to_original_plus_one() {
        let out = norm(
            "Creation of new ads is explained in detail.",
            ListItem,
            "ad creation",
            "Ad creation.",
        );
        assert_eq!(out, "Creation of new.");
        assert!(word_count(&out) <= 3);
    }

    #[test]
    fn cut_never_ends_on_conjunction() {
        let out = norm("Ads banners and more", ListItem, "ads", "Ads here");
        assert_eq!(out, "Ads banners.");
    }

    #[test]
    fn banned_phrase_removed_and_punctuation_reattached() {
        let out = norm(
            "Ads appear in search results. Click here!",
            Paragraph,
            "ads",
            "Ads appear in search results today.",
        );
        assert_eq!(out, "Ads appear in search results.");
    }

    #[test]
    fn paragraph_keeps_two_sentences() {
        assert_eq!(norm("One. Two. Three.", Paragraph, "x", ""), "One. Two.");
    }

    #[test]
    fn ellipsis_collapses() {
        assert_eq!(norm("Ads work...", Paragraph, "ads", ""), "Ads work.");
    }

    #[test]
    fn protected_heading_suffix_is_never_cut() {
        let raw = "Ad Submission For Small Business Owners Everywhere: How Is It Done?";
        let out = norm(raw, Heading, "how to submit ads", "Ads");
        assert_eq!(out, raw);
    }

    #[test]
    fn unprotected_heading_is_capped() {
        // o = 1, cap = max(5, 1) = 5
        let out = norm("One two three four five six seven", Heading, "numbers", "Numbers");
        assert_eq!(out, "One two three four five");
    }

    #[test]
    fn long_paragraph_cap_uses_ten_percent() {
        let original = "a b c d e f g h i j";
        let raw = "w1 w2 w3 w4 w5 w6 w7 w8 w9 w10 w11 w12 w13 w14";
        let out = norm(raw, Paragraph, "w1", original);
        assert_eq!(word_count(&out), 11);
        assert!(out.ends_with('.'));
    }

    #[test]
    fn synonym_preserves_case_and_applies_one_rule() {
        assert_eq!(norm("Simple steps", Paragraph, "steps", ""), "Easy steps.");
        assert_eq!(norm("simple purchase flow", Paragraph, "flow", ""), "easy purchase flow.");
    }

    #[test]
    fn noise_only_input_is_empty() {
        assert_eq!(norm("  , ; ...  ", Paragraph, "ads", "Ads."), "");
        assert_eq!(norm("and or", ListItem, "ads", "Ads."), "");
        assert_eq!(norm("", Heading, "ads", "Ads."), "");
    }

    #[test]
    fn anchor_interrogative_detection() {
        assert!(is_interrogative_anchor("ad submission how-to"));
        assert!(is_interrogative_anchor("is cpc worth it?"));
        assert!(!is_interrogative_anchor("ad creation"));
    }

    #[test]
    fn tag_invariants_hold() {
        let samples = [
            "How to create an ad?",
            "Ads appear in search results! Click here",
            "what is cpc",
            "The setup is simple and",
            "Ad Submission: How Is It Done?",
            "Cost per click. Search results. Steps.",
        ];
        let anchors = ["ad creation", "how to submit ads", "what is cpc"];
        for raw in samples {
            for anchor in anchors {
                let heading = norm(raw, Heading, anchor, "About online ads.");
                assert!(!heading.ends_with('.') && !heading.ends_with('!'), "{heading:?}");
                if heading.ends_with('?') {
                    assert!(is_interrogative_anchor(anchor), "{heading:?} for {anchor:?}");
                }
                for tag in [ListItem, Paragraph] {
                    let out = norm(raw, tag, anchor, "About online ads.");
                    assert!(out.ends_with(['.', '!', '?']), "{out:?}");
                }
                let item = norm(raw, ListItem, anchor, "Ad creation.");
                assert!(word_count(&item) <= 3, "{item:?}");
            }
        }
    }

    #[test]
    fn idempotent() {
        let samples = [
            "  the ad setup is simple and  ",
            "How to create an ad? It takes a few steps. Then more.",
            "Ads... appear in search results; learn more",
            "how ad submitting works",
            "Creation of new ads is explained in detail.",
            "One two three four five six seven eight nine ten eleven twelve",
        ];
        for raw in samples {
            for tag in [Heading, ListItem, Paragraph, Other] {
                for anchor in ["ad creation", "how to submit ads"] {
                    let once = norm(raw, tag, anchor, "Ad creation steps.");
                    let twice = norm(&once, tag, anchor, "Ad creation steps.");
                    assert_eq!(once, twice, "raw={raw:?} tag={tag:?} anchor={anchor:?}");
                }
            }
        }
    }
}
