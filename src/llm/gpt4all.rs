use std::io::{BufRead, BufReader};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use super::{Generation, Generator, ModelType, TokenSink};
use crate::config::ModelConfig;
use crate::http::{DEFAULT_RETRY_ATTEMPTS, build_agent, post_json, with_retry};
use crate::{RagError, Result};

const SSE_DATA_PREFIX: &str = "data:";
const SSE_DONE: &str = "[DONE]";

/// GPT4All model served through its OpenAI-compatible completions API
#[derive(Debug, Clone)]
pub struct Gpt4AllGenerator {
    base_url: Url,
    model: String,
    max_tokens: u32,
    temperature: f32,
    stop: Vec<String>,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

impl CompletionChunk {
    fn parse(payload: &str) -> Result<Self> {
        let chunk: Self = serde_json::from_str(payload)
            .map_err(|e| RagError::Generation(format!("Malformed completion chunk: {}", e)))?;

        match chunk.error {
            Some(error) => Err(RagError::Generation(error.to_string())),
            None => Ok(chunk),
        }
    }

    fn text(&self) -> &str {
        self.choices.first().map_or("", |choice| choice.text.as_str())
    }
}

impl Gpt4AllGenerator {
    #[inline]
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            base_url: config.gpt4all_url.clone(),
            model: config.model_path.clone(),
            max_tokens: config.n_ctx,
            temperature: config.temperature,
            stop: config.stop.clone(),
            agent: build_agent(Duration::from_secs(config.timeout_secs)),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }
}

impl Generator for Gpt4AllGenerator {
    #[inline]
    fn model_type(&self) -> ModelType {
        ModelType::Gpt4All
    }

    #[inline]
    fn generate(&self, prompt: &str, sink: &mut dyn TokenSink) -> Result<Generation> {
        let url = self
            .base_url
            .join("/v1/completions")
            .map_err(|e| RagError::Config(format!("Invalid GPT4All URL: {}", e)))?;

        let request = CompletionRequest {
            model: &self.model,
            prompt,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stop: &self.stop,
            stream: true,
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| RagError::Generation(format!("Failed to serialize request: {}", e)))?;

        debug!(
            "Requesting completion from {} (prompt length: {})",
            url,
            prompt.len()
        );

        let response = with_retry(&self.base_url, self.retry_attempts, || {
            post_json(&self.agent, &url, &request_json)
        })
        .map_err(|e| RagError::Network(format!("GPT4All request failed: {:#}", e)))?;

        let reader = BufReader::new(response.into_body().into_reader());
        let mut generation = Generation::default();
        // Servers that ignore `stream` answer with one plain JSON body
        let mut plain_body = String::new();
        let mut streamed = false;

        for line in reader.lines() {
            let line = line.map_err(|e| {
                RagError::Generation(format!("Failed to read completion stream: {}", e))
            })?;

            let Some(payload) = line.strip_prefix(SSE_DATA_PREFIX) else {
                plain_body.push_str(&line);
                plain_body.push('\n');
                continue;
            };

            streamed = true;
            let payload = payload.trim();
            if payload == SSE_DONE {
                return Ok(generation);
            }
            if payload.is_empty() {
                continue;
            }

            let chunk = CompletionChunk::parse(payload)?;
            let token = chunk.text();
            if !token.is_empty() && generation.push(token, sink).is_break() {
                info!("Generation cancelled after {} chars", generation.text.len());
                return Ok(generation);
            }
        }

        if streamed {
            return Err(RagError::Generation(format!(
                "Completion stream ended before [DONE] after {} chars",
                generation.text.len()
            )));
        }

        if !plain_body.trim().is_empty() {
            let chunk = CompletionChunk::parse(plain_body.trim())?;
            let token = chunk.text();
            if !token.is_empty() {
                // Nothing left to cancel; `push` still records a break
                let _ = generation.push(token, sink);
            }
        }

        Ok(generation)
    }
}
