use std::io::{BufRead, Write};

use tracing::{debug, info, warn};

use super::{QaAnswer, QaChain};
use crate::config::Config;
use crate::database::VectorStore;
use crate::embeddings::OllamaClient;
use crate::llm::{UNSUPPORTED_MODEL_MESSAGE, WriterSink, create_generator};
use crate::retrieval::Retriever;
use crate::{RagError, Result};

/// Typing this ends the session
pub const EXIT_COMMAND: &str = "exit";
pub const QUERY_PROMPT: &str = "\nEnter a query: ";
pub const EMPTY_QUERY_NOTICE: &str = "Empty query, skipping";

/// Interactive question loop over one chain, built once at startup
pub struct QaSession {
    chain: QaChain,
    announce_empty_queries: bool,
}

/// Counts reported when the session ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub answered: usize,
    pub skipped: usize,
}

impl QaSession {
    #[inline]
    pub const fn new(chain: QaChain, announce_empty_queries: bool) -> Self {
        Self {
            chain,
            announce_empty_queries,
        }
    }

    /// Open the store, connect the embedding client and select the model
    /// backend. An unsupported model type does not fail here.
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder = OllamaClient::new(config)
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;
        let store = VectorStore::new(config).await?;
        let retriever = Retriever::new(store, embedder, config.retrieval.clone());

        let generator = match create_generator(&config.model) {
            Ok(generator) => {
                info!("Using {} backend", generator.model_type());
                Some(generator)
            }
            Err(e) => {
                warn!("No generation backend: {}", e);
                None
            }
        };

        let chain = QaChain::new(retriever, generator, config.model.model_type.clone());
        Ok(Self::new(chain, config.session.announce_empty_queries))
    }

    #[inline]
    pub fn chain(&self) -> &QaChain {
        &self.chain
    }

    /// Read queries from `input` until `exit` or end of input, writing
    /// streamed answers and their sources to `output`
    #[inline]
    pub async fn run<R, W>(&self, mut input: R, mut output: W) -> Result<SessionSummary>
    where
        R: BufRead + Send,
        W: Write + Send,
    {
        if !self.chain.has_model() {
            writeln!(output, "{}", UNSUPPORTED_MODEL_MESSAGE)?;
        }

        let mut summary = SessionSummary::default();
        let mut line = String::new();

        loop {
            write!(output, "{}", QUERY_PROMPT)?;
            output.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                debug!("End of input, leaving session");
                break;
            }

            let query = line.trim_end_matches(['\n', '\r']);
            if query == EXIT_COMMAND {
                break;
            }
            if query.trim().is_empty() {
                summary.skipped += 1;
                if self.announce_empty_queries {
                    writeln!(output, "{}", EMPTY_QUERY_NOTICE)?;
                }
                continue;
            }

            let answer = {
                let mut sink = WriterSink::new(&mut output);
                let answer = self.chain.ask(query, &mut sink).await?;
                if let Some(e) = sink.take_error() {
                    return Err(e.into());
                }
                answer
            };

            write_answer(&mut output, query, &answer)?;
            summary.answered += 1;
        }

        info!(
            "Session ended after {} answered and {} skipped queries",
            summary.answered, summary.skipped
        );
        Ok(summary)
    }
}

fn write_answer<W: Write>(output: &mut W, query: &str, answer: &QaAnswer) -> Result<()> {
    writeln!(output, "\n\n> Question:")?;
    writeln!(output, "{}", query)?;
    writeln!(output, "\n> Answer:")?;
    writeln!(output, "{}", answer.answer)?;

    for source in &answer.sources {
        writeln!(output, "\n> {}:", source.source)?;
        writeln!(output, "{}", source.content)?;
    }

    output.flush()?;
    Ok(())
}
