//! Blocking HTTP client for a local Ollama server.

use std::time::Duration;

use anchorfit_core::{GenerationConfig, GenerationFailure, GenerationInput, StructuralTag, TextGeneration};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum OllamaError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
}

fn system_prompt(reply_field: &str) -> String {
    format!(
        "\
You rewrite one short fragment of web page content so it matches a search query more closely.

Keep the fragment's role: a heading stays a short title without a final period, \
a list item stays a single short sentence, a paragraph stays at most two sentences.
Do not add marketing calls to action. Do not invent facts that are not in the fragment.
Keep roughly the same length as the original.

Respond ONLY with a JSON object. No markdown fences, no explanation, just raw JSON:
{{\"{reply_field}\": \"the rewritten fragment\"}}"
    )
}

/// User prompt for one attempt.
pub fn build_prompt(input: &GenerationInput<'_>) -> String {
    let role = match input.tag {
        StructuralTag::Heading => "heading",
        StructuralTag::ListItem => "list item",
        StructuralTag::Paragraph => "paragraph",
        StructuralTag::Other => "text block",
    };
    let mut prompt = format!(
        "Query: {anchor}\n\
         Role: {role}\n\
         Current similarity: {score:.2}\n\
         \n\
         Fragment:\n\
         {text}",
        anchor = input.anchor,
        score = input.baseline_score,
        text = input.current_text,
    );
    if input.prior_best != input.current_text {
        prompt.push_str(&format!(
            "\n\nBest rewrite so far (improve on it):\n{}",
            input.prior_best
        ));
    }
    prompt
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Text generation over Ollama's `/api/generate` endpoint.
///
/// Uses reqwest's blocking client, so it must be built and dropped outside
/// an async context. Calls run on the blocking pool.
pub struct OllamaClient {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
    temperature: f32,
    timeout: Duration,
    system: String,
}

impl OllamaClient {
    /// `host` should be like `http://localhost:11434`; a trailing slash is
    /// dropped.
    pub fn new(config: &GenerationConfig) -> Result<Self, OllamaError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.host.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout,
            system: system_prompt(&config.reply_field),
        })
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.model,
            system: &self.system,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        }
    }

    /// Send one prompt and return the raw model reply.
    pub fn generate(&self, prompt: &str) -> Result<String, OllamaError> {
        let url = format!("{}/api/generate", self.base_url);
        debug!(url = %url, model = %self.model, "requesting generation");
        let resp = self.client.post(&url).json(&self.request_body(prompt)).send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(OllamaError::Server {
                status: status.as_u16(),
                body,
            });
        }
        let reply: GenerateResponse = resp.json()?;
        Ok(reply.response)
    }
}

impl TextGeneration for OllamaClient {
    fn complete(&self, input: &GenerationInput<'_>) -> Result<String, GenerationFailure> {
        self.generate(&build_prompt(input)).map_err(|e| {
            warn!(model = %self.model, error = %e, "generation request failed");
            match e {
                OllamaError::Http(e) if e.is_timeout() => GenerationFailure::Timeout(self.timeout),
                OllamaError::Http(e) if e.is_decode() => GenerationFailure::Parse(e.to_string()),
                other => GenerationFailure::Process(other.to_string()),
            }
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
