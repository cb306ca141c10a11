//! Answer synthesis: retrieved context + question → prompt → generated answer

use crate::error::Result;
use crate::generate::Generator;
use crate::store::ScoredChunk;
use std::sync::Arc;
use tracing::debug;

const CONTEXT_RULE: &str = "---------------------";

/// Build the grounding prompt
///
/// Chunk texts appear verbatim in rank order, one per block.
pub fn build_prompt(question: &str, chunks: &[ScoredChunk]) -> String {
    let context = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Context information is below.\n{rule}\n{context}\n{rule}\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {question}\n\
         Answer: ",
        rule = CONTEXT_RULE,
        context = context,
        question = question,
    )
}

/// Turns a question and its supporting chunks into an answer
#[derive(Clone)]
pub struct AnswerSynthesizer {
    generator: Arc<dyn Generator>,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// The model's text, unmodified; generation failures propagate
    pub async fn synthesize(&self, question: &str, chunks: &[ScoredChunk]) -> Result<String> {
        let prompt = build_prompt(question, chunks);
        debug!(
            model = self.generator.model_name(),
            chunks = chunks.len(),
            "Synthesizing answer"
        );
        self.generator.generate(&prompt).await
    }
}
