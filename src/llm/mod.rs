// Generative model backends
// Each backend streams tokens from a local runtime into a TokenSink

pub mod gpt4all;
pub mod llama_cpp;


use std::fmt;
use std::io::{self, Write};
use std::ops::ControlFlow;
use std::str::FromStr;

use tracing::warn;

use crate::config::ModelConfig;
use crate::{RagError, Result};

pub use gpt4all::Gpt4AllGenerator;
pub use llama_cpp::LlamaCppGenerator;

/// Printed when the configured model type names no known backend
pub const UNSUPPORTED_MODEL_MESSAGE: &str =
    "Only LlamaCpp or GPT4All supported right now. Make sure you set up your .env correctly.";

/// Supported generation backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    LlamaCpp,
    Gpt4All,
}

impl FromStr for ModelType {
    type Err = RagError;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "LlamaCpp" => Ok(Self::LlamaCpp),
            "GPT4All" => Ok(Self::Gpt4All),
            other => Err(RagError::ModelUnavailable(other.to_string())),
        }
    }
}

impl fmt::Display for ModelType {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LlamaCpp => f.write_str("LlamaCpp"),
            Self::Gpt4All => f.write_str("GPT4All"),
        }
    }
}

/// Receives generated tokens as soon as they are decoded
///
/// Returning `ControlFlow::Break` stops generation; the text produced so far
/// is still returned to the caller.
pub trait TokenSink {
    fn on_token(&mut self, token: &str) -> ControlFlow<()>;
}

impl<F> TokenSink for F
where
    F: FnMut(&str) -> ControlFlow<()>,
{
    #[inline]
    fn on_token(&mut self, token: &str) -> ControlFlow<()> {
        self(token)
    }
}

/// Writes each token to `W` and flushes, so output appears while generating
pub struct WriterSink<W: Write> {
    writer: W,
    error: Option<io::Error>,
}

impl<W: Write> WriterSink<W> {
    #[inline]
    pub const fn new(writer: W) -> Self {
        Self {
            writer,
            error: None,
        }
    }

    /// The write error that stopped generation, if any
    #[inline]
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    #[inline]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TokenSink for WriterSink<W> {
    #[inline]
    fn on_token(&mut self, token: &str) -> ControlFlow<()> {
        match self
            .writer
            .write_all(token.as_bytes())
            .and_then(|()| self.writer.flush())
        {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => {
                self.error = Some(e);
                ControlFlow::Break(())
            }
        }
    }
}

/// Result of one generation call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    /// The sink stopped generation before the model finished
    pub cancelled: bool,
}

impl Generation {
    /// Append a token and hand it to the sink, recording a cancellation
    fn push(&mut self, token: &str, sink: &mut dyn TokenSink) -> ControlFlow<()> {
        self.text.push_str(token);
        let flow = sink.on_token(token);
        if flow.is_break() {
            self.cancelled = true;
        }
        flow
    }
}

/// A local language model that completes a prompt, streaming its output
pub trait Generator: Send + Sync {
    fn model_type(&self) -> ModelType;

    fn generate(&self, prompt: &str, sink: &mut dyn TokenSink) -> Result<Generation>;
}

/// Build the backend named by `config.model_type`
///
/// Fails with `RagError::ModelUnavailable` for an unrecognized type.
#[inline]
pub fn create_generator(config: &ModelConfig) -> Result<Box<dyn Generator>> {
    let model_type = config.model_type.parse::<ModelType>().inspect_err(|_| {
        warn!("Unsupported model type: {:?}", config.model_type);
    })?;

    Ok(match model_type {
        ModelType::LlamaCpp => Box::new(LlamaCppGenerator::new(config)),
        ModelType::Gpt4All => Box::new(Gpt4AllGenerator::new(config)),
    })
}
