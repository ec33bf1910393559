//! Candidate generators.
//!
//! Both variants return raw, un-normalized text; the controller normalizes
//! and validates whatever comes back.

use std::sync::Arc;

use anchorfit_core::text::{collapse_whitespace, tokens, word_count};
use anchorfit_core::{
    GenerationFailure, GenerationInput, Origin, RefinementRequest, StructuralTag, TextGeneration,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::rules::{
    ACTION_CUES, CORE_STOPWORDS, GUIDE_CUES, GUIDE_SUFFIX, HOW_CUES, HOW_TO_SUFFIX,
    TITLE_SMALL_WORDS, contains_word, summary_cues,
};

/// JSON field read from model replies unless configured otherwise.
pub const DEFAULT_REPLY_FIELD: &str = "improved_text";

/// Produces one raw candidate per call.
pub trait CandidateGenerator: Send + Sync {
    /// `prior_best` is the best text seen so far in this refinement, used to
    /// bias retries. It equals the current text on the first attempt.
    fn generate(
        &self,
        request: &RefinementRequest,
        prior_best: &str,
    ) -> Result<String, GenerationFailure>;

    /// Origin recorded on candidates from this generator.
    fn origin(&self) -> Origin;

    fn name(&self) -> &str;
}

/// Template flavour of the deterministic generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum DeterministicMode {
    /// Tag-keyed templates built from anchor cues and current-text facts.
    #[default]
    RuleBased,
    /// Short question or title answering the anchor directly.
    ShortAnswer,
}

/// Pattern-table rewrites. Never fails except on an empty anchor.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicGenerator {
    mode: DeterministicMode,
}

impl DeterministicGenerator {
    pub fn rule_based() -> Self {
        Self {
            mode: DeterministicMode::RuleBased,
        }
    }

    pub fn short_answer() -> Self {
        Self {
            mode: DeterministicMode::ShortAnswer,
        }
    }
}

impl CandidateGenerator for DeterministicGenerator {
    fn generate(
        &self,
        request: &RefinementRequest,
        _prior_best: &str,
    ) -> Result<String, GenerationFailure> {
        let cues = AnchorCues::parse(&request.anchor).ok_or(GenerationFailure::EmptyAnchor)?;
        let text = match self.mode {
            DeterministicMode::RuleBased => match request.tag {
                StructuralTag::Heading => heading_from_anchor(&cues),
                StructuralTag::ListItem => list_item(&cues, &request.current_text),
                StructuralTag::Paragraph | StructuralTag::Other => {
                    summary_sentence(&cues, &request.current_text)
                }
            },
            DeterministicMode::ShortAnswer => short_answer(&cues),
        };
        Ok(text)
    }

    fn origin(&self) -> Origin {
        Origin::Deterministic
    }

    fn name(&self) -> &str {
        match self.mode {
            DeterministicMode::RuleBased => "rule-based",
            DeterministicMode::ShortAnswer => "short-answer",
        }
    }
}

/// What the deterministic templates need to know about an anchor.
struct AnchorCues {
    /// Anchor words, lowercased, edge punctuation removed.
    words: Vec<String>,
    /// Anchor words minus how-to and guide vocabulary.
    core: Vec<String>,
    how: bool,
    action: bool,
    guide: bool,
}

impl AnchorCues {
    fn parse(anchor: &str) -> Option<Self> {
        let words: Vec<String> = anchor
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            return None;
        }
        let mut core: Vec<String> = words
            .iter()
            .filter(|w| !contains_word(CORE_STOPWORDS, w))
            .cloned()
            .collect();
        if core.is_empty() {
            core = words.clone();
        }
        Some(Self {
            how: has_cue(&words, HOW_CUES),
            action: has_cue(&words, ACTION_CUES),
            guide: has_cue(&words, GUIDE_CUES),
            words,
            core,
        })
    }

    fn core_phrase(&self) -> String {
        self.core.join(" ")
    }

    fn wants_how_to(&self) -> bool {
        self.how || self.action
    }
}

fn has_cue(words: &[String], table: &[&str]) -> bool {
    words
        .iter()
        .any(|w| contains_word(table, w) || tokens(w).any(|t| contains_word(table, &t)))
}

fn heading_from_anchor(cues: &AnchorCues) -> String {
    let title = title_case(&cues.core_phrase());
    if cues.wants_how_to() {
        format!("{title}: {HOW_TO_SUFFIX}?")
    } else if cues.guide {
        format!("{title} {GUIDE_SUFFIX}")
    } else {
        title_case(&cues.words.join(" "))
    }
}

/// `"<core phrase> is explained."` for action anchors, shortened from the
/// left so the sentence fits one word over the current text. Otherwise the
/// current text is kept and marked as summarized.
fn list_item(cues: &AnchorCues, current: &str) -> String {
    if cues.wants_how_to() {
        let budget = word_count(current) + 1;
        let keep = budget.saturating_sub(2).max(1);
        let start = cues.core.len().saturating_sub(keep);
        let phrase = capitalize_first(&cues.core[start..].join(" "));
        return format!("{phrase} is explained.");
    }
    let base = collapse_whitespace(current);
    let base = base.trim_end_matches(['.', '!', '?']).trim_end();
    if base.is_empty() {
        format!("{} is summarized.", title_case(&cues.core_phrase()))
    } else {
        format!("{base} is summarized.")
    }
}

/// One summary sentence picked by which facts the current text mentions.
fn summary_sentence(cues: &AnchorCues, current: &str) -> String {
    let subject = capitalize_first(&cues.core_phrase());
    let cost_per_click = summary_cues::COST_PER_CLICK.is_match(current);
    let search = summary_cues::SEARCH_RESULTS.is_match(current);
    let steps = summary_cues::STEPS.is_match(current);
    let account = summary_cues::ACCOUNT.is_match(current);

    let mut sentence = if cost_per_click {
        format!("{subject} runs on a cost-per-click model")
    } else if steps {
        format!("{subject} follows a few clear steps")
    } else if account {
        format!("{subject} is managed from an account")
    } else if search {
        format!("{subject} shows up in search results")
    } else {
        format!("This section explains {}", cues.core_phrase())
    };
    if search && (cost_per_click || steps || account) {
        sentence.push_str(", and it shows up in search results");
    }
    debug!(cost_per_click, search, steps, account, "summary cues");
    sentence.push('.');
    sentence
}

fn short_answer(cues: &AnchorCues) -> String {
    if cues.wants_how_to() {
        format!("What are the steps of {}?", cues.core_phrase())
    } else {
        title_case(&cues.words.join(" "))
    }
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Title case with small words kept lowercase after the first word.
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .enumerate()
        .map(|(i, w)| {
            let lower = w.to_lowercase();
            if i > 0 && contains_word(TITLE_SMALL_WORDS, &lower) {
                lower
            } else {
                capitalize_first(&lower)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Candidates from an external text generation capability.
pub struct ModelGenerator {
    capability: Arc<dyn TextGeneration>,
    reply_field: String,
}

impl ModelGenerator {
    pub fn new(capability: Arc<dyn TextGeneration>) -> Self {
        Self {
            capability,
            reply_field: DEFAULT_REPLY_FIELD.to_string(),
        }
    }

    /// Read the candidate from `field` of the reply object.
    pub fn with_reply_field(mut self, field: impl Into<String>) -> Self {
        self.reply_field = field.into();
        self
    }
}

impl CandidateGenerator for ModelGenerator {
    fn generate(
        &self,
        request: &RefinementRequest,
        prior_best: &str,
    ) -> Result<String, GenerationFailure> {
        let input = GenerationInput {
            anchor: &request.anchor,
            current_text: &request.current_text,
            tag: request.tag,
            baseline_score: request.baseline_score,
            prior_best,
        };
        let reply = self.capability.complete(&input)?;
        let object = extract_first_json_object(&reply)
            .ok_or_else(|| GenerationFailure::Parse("no JSON object in reply".into()))?;

        match object.get(&self.reply_field) {
            Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            Some(Value::String(_)) => Err(GenerationFailure::Parse(format!(
                "field `{}` is empty",
                self.reply_field
            ))),
            Some(_) => Err(GenerationFailure::Parse(format!(
                "field `{}` is not a string",
                self.reply_field
            ))),
            None => Err(GenerationFailure::Parse(format!(
                "field `{}` missing from reply",
                self.reply_field
            ))),
        }
    }

    fn origin(&self) -> Origin {
        Origin::Generated
    }

    fn name(&self) -> &str {
        self.capability.model_name()
    }
}

/// First well-formed JSON object embedded in free-form text. Text around
/// the object, and any later objects, are ignored.
pub fn extract_first_json_object(text: &str) -> Option<Map<String, Value>> {
    for (start, _) in text.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(Value::Object(map))) = stream.next() {
            return Some(map);
        }
    }
    None
}
