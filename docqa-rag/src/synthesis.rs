//! Grounded answer synthesis from retrieved passages.
//!
//! The synthesizer labels each passage with its rank, substitutes the
//! context and question into a [`PromptTemplate`], and asks a [`Generator`]
//! for an answer under a system instruction that restricts it to the
//! supplied context. That restriction is a prompting convention only: the
//! model can still state facts that are not in the context.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::document::RagAnswer;
use crate::error::Result;
use crate::generation::{GenerationRequest, Generator};
use crate::prompt::{DEFAULT_SYSTEM_INSTRUCTION, PromptTemplate};

/// Build the context block for a list of passages.
///
/// ```text
///
/// Extracted documents:
/// Document 0:::
/// <first passage>
/// Document 1:::
/// <second passage>
/// ```
pub fn build_context<S: AsRef<str>>(texts: &[S]) -> String {
    let mut context = String::from("\nExtracted documents:\n");
    for (i, text) in texts.iter().enumerate() {
        context.push_str(&format!("Document {i}:::\n{}\n", text.as_ref()));
    }
    context
}

/// Remove exact duplicates, keeping the first occurrence.
pub fn deduplicate(texts: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    texts.into_iter().filter(|text| seen.insert(text.clone())).collect()
}

/// Produces answers restricted to retrieved context.
#[derive(Clone)]
pub struct AnswerSynthesizer {
    generator: Arc<dyn Generator>,
    template: PromptTemplate,
    system_instruction: String,
    temperature: f32,
    max_tokens: Option<u32>,
    deduplicate: bool,
}

impl AnswerSynthesizer {
    /// Create a synthesizer with the default template and system instruction
    /// at temperature zero.
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            template: PromptTemplate::rag_default(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            temperature: 0.0,
            max_tokens: None,
            deduplicate: false,
        }
    }

    /// Use a custom prompt template.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Replace the system instruction.
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Cap generated tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Drop exact-duplicate passages before building the context.
    pub fn with_deduplication(mut self, enabled: bool) -> Self {
        self.deduplicate = enabled;
        self
    }

    /// The generator backing this synthesizer.
    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    /// Answer `question` from `passages`, given in rank order.
    ///
    /// The returned context is exactly the list of passages placed in the
    /// prompt.
    pub async fn answer(&self, question: &str, passages: Vec<String>) -> Result<RagAnswer> {
        let passages = if self.deduplicate { deduplicate(passages) } else { passages };
        let context = build_context(&passages);
        let prompt = self.template.render(&[("question", question), ("context", &context)])?;

        let mut request = GenerationRequest::new(prompt)
            .with_system(self.system_instruction.clone())
            .with_temperature(self.temperature);
        request.max_tokens = self.max_tokens;

        debug!(model = self.generator.name(), passages = passages.len(), "generating answer");
        let output = self.generator.generate(&request).await?;

        Ok(RagAnswer { answer: output.trim().to_string(), context: passages })
    }
}

impl std::fmt::Debug for AnswerSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerSynthesizer")
            .field("generator", &self.generator.name())
            .field("temperature", &self.temperature)
            .field("deduplicate", &self.deduplicate)
            .finish_non_exhaustive()
    }
}
