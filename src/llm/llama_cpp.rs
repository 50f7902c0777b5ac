use std::io::{BufRead, BufReader};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use super::{Generation, Generator, ModelType, TokenSink};
use crate::config::ModelConfig;
use crate::http::{DEFAULT_RETRY_ATTEMPTS, build_agent, post_json, with_retry};
use crate::{RagError, Result};

/// llama.cpp model served through an Ollama-compatible `/api/generate`
#[derive(Debug, Clone)]
pub struct LlamaCppGenerator {
    base_url: Url,
    model: String,
    options: GenerateOptions,
    agent: ureq::Agent,
    retry_attempts: u32,
}

/// Sampling and runtime options forwarded with every request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateOptions {
    pub num_ctx: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    pub num_thread: u32,
    pub num_batch: u32,
    pub use_mlock: bool,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a GenerateOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

impl LlamaCppGenerator {
    #[inline]
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            base_url: config.llama_cpp_url.clone(),
            model: config.model_path.clone(),
            options: GenerateOptions {
                num_ctx: config.n_ctx,
                temperature: config.temperature,
                stop: config.stop.clone(),
                num_thread: config.n_threads,
                num_batch: config.n_batch,
                use_mlock: config.use_mlock,
            },
            agent: build_agent(Duration::from_secs(config.timeout_secs)),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    #[inline]
    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }
}

impl Generator for LlamaCppGenerator {
    #[inline]
    fn model_type(&self) -> ModelType {
        ModelType::LlamaCpp
    }

    #[inline]
    fn generate(&self, prompt: &str, sink: &mut dyn TokenSink) -> Result<Generation> {
        let url = self
            .base_url
            .join("/api/generate")
            .map_err(|e| RagError::Config(format!("Invalid LlamaCpp URL: {}", e)))?;

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: true,
            options: &self.options,
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
        .map_err(|e| RagError::Network(format!("LlamaCpp request failed: {:#}", e)))?;

        let reader = BufReader::new(response.into_body().into_reader());
        let mut generation = Generation::default();

        // One JSON object per line
        for line in reader.lines() {
            let line = line.map_err(|e| {
                RagError::Generation(format!("Failed to read completion stream: {}", e))
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let chunk: GenerateChunk = serde_json::from_str(&line).map_err(|e| {
                RagError::Generation(format!("Malformed completion chunk: {}", e))
            })?;

            if let Some(error) = chunk.error {
                return Err(RagError::Generation(error));
            }

            if !chunk.response.is_empty() && generation.push(&chunk.response, sink).is_break() {
                info!("Generation cancelled after {} chars", generation.text.len());
                return Ok(generation);
            }

            if chunk.done {
                return Ok(generation);
            }
        }

        Err(RagError::Generation(format!(
            "Completion stream ended before done after {} chars",
            generation.text.len()
        )))
    }
}
