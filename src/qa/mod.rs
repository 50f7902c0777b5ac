// Question answering
// Retrieve-then-answer chain and the interactive query session

pub mod session;


use tracing::{debug, info};

use crate::database::{ChunkMetadata, SearchResult};
use crate::llm::{Generator, TokenSink};
use crate::retrieval::Retriever;
use crate::{RagError, Result};

pub use session::QaSession;

const PROMPT_TEMPLATE_HEAD: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\n";

/// Fill the answer template with every retrieved chunk ("stuff" strategy)
#[inline]
pub fn build_prompt(question: &str, contexts: &[SearchResult]) -> String {
    let context = contexts
        .iter()
        .map(|result| result.chunk_metadata.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "{}{}\n\nQuestion: {}\nHelpful Answer:",
        PROMPT_TEMPLATE_HEAD, context, question
    )
}

/// An answer together with the chunks it was grounded in
#[derive(Debug, Clone, PartialEq)]
pub struct QaAnswer {
    pub answer: String,
    pub sources: Vec<ChunkMetadata>,
    pub cancelled: bool,
}

pub struct QaChain {
    retriever: Retriever,
    generator: Option<Box<dyn Generator>>,
    model_type: String,
}

impl QaChain {
    /// `generator` is `None` when the configured `model_type` named no
    /// supported backend; every question then fails.
    #[inline]
    pub fn new(
        retriever: Retriever,
        generator: Option<Box<dyn Generator>>,
        model_type: impl Into<String>,
    ) -> Self {
        Self {
            retriever,
            generator,
            model_type: model_type.into(),
        }
    }

    #[inline]
    pub fn has_model(&self) -> bool {
        self.generator.is_some()
    }

    #[inline]
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answer `question`, streaming generated tokens into `sink`
    #[inline]
    pub async fn ask(
        &self,
        question: &str,
        sink: &mut (dyn TokenSink + Send),
    ) -> Result<QaAnswer> {
        let Some(generator) = self.generator.as_deref() else {
            return Err(RagError::ModelUnavailable(self.model_type.clone()));
        };

        let contexts = self.retriever.retrieve(question).await?;
        debug!("Retrieved {} context chunks", contexts.len());

        let prompt = build_prompt(question, &contexts);
        let generation = generator.generate(&prompt, sink)?;

        info!(
            "Answered with {} chars from {} sources",
            generation.text.len(),
            contexts.len()
        );

        Ok(QaAnswer {
            answer: generation.text,
            sources: contexts.into_iter().map(|c| c.chunk_metadata).collect(),
            cancelled: generation.cancelled,
        })
    }
}
