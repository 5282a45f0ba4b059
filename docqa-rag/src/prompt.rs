//! Prompt templates with `{name}` placeholders.
//!
//! Placeholders are written `{name}`. A literal brace is written `{{` or
//! `}}`. Rendering fails on a placeholder with no value, so a typo in a
//! template surfaces as an error instead of a silently broken prompt.

use std::collections::BTreeSet;

use crate::error::{RagError, Result};

/// System instruction restricting answers to the supplied context.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are an assistant that answers questions \
using only the documents provided in the context. Every statement in your answer must come \
from that context. If the context does not contain the answer, say that you cannot find it \
in the documents.";

/// Default question-answering template; requires `{context}` and `{question}`.
pub const DEFAULT_RAG_TEMPLATE: &str = "Using the information contained in the context, \
give a comprehensive answer to the question.
Respond only to the question asked; the response should be concise and relevant to the question.
Provide the number of the source document when relevant.
If the answer cannot be deduced from the context, do not give an answer.

Context:
{context}
---
Now here is the question you need to answer.

Question: {question}";

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed prompt template.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::PromptTemplate;
///
/// let template = PromptTemplate::new("Q: {question}")?;
/// let prompt = template.render(&[("question", "Where is Nice?")])?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse a template.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Template`] on an unclosed `{`, a stray `}`, or an
    /// empty placeholder name.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let source = template.into();
        let segments = parse(&source)?;
        Ok(Self { source, segments })
    }

    /// Parse a template and check that it uses every name in `required`.
    pub fn with_required(template: impl Into<String>, required: &[&str]) -> Result<Self> {
        let parsed = Self::new(template)?;
        let present = parsed.placeholders();
        let missing: Vec<&str> =
            required.iter().copied().filter(|name| !present.contains(name)).collect();
        if !missing.is_empty() {
            return Err(RagError::Template(format!(
                "template is missing required placeholder(s): {}",
                missing.join(", ")
            )));
        }
        Ok(parsed)
    }

    /// The default RAG template.
    pub fn rag_default() -> Self {
        Self::builtin(DEFAULT_RAG_TEMPLATE)
    }

    /// Parse a template compiled into the binary.
    ///
    /// A template that fails to parse is kept as one literal segment.
    pub fn builtin(template: &'static str) -> Self {
        let segments =
            parse(template).unwrap_or_else(|_| vec![Segment::Literal(template.to_string())]);
        Self { source: template.to_string(), segments }
    }

    /// The template text as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names of the placeholders used by the template.
    pub fn placeholders(&self) -> BTreeSet<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Placeholder(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Substitute `values` into the template.
    ///
    /// Values for names the template does not use are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Template`] if the template uses a name with no value.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = values
                        .iter()
                        .find(|(key, _)| key == name)
                        .map(|(_, value)| *value)
                        .ok_or_else(|| {
                            RagError::Template(format!("no value for placeholder '{{{name}}}'"))
                        })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

fn parse(template: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => {
                            return Err(RagError::Template(format!(
                                "unclosed placeholder after '{{{name}'"
                            )));
                        }
                        Some(ch) => name.push(ch),
                    }
                }
                if name.trim().is_empty() {
                    return Err(RagError::Template("empty placeholder name".to_string()));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Placeholder(name));
            }
            '}' => return Err(RagError::Template("unmatched '}' in template".to_string())),
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_placeholders_and_escapes() {
        let template = PromptTemplate::new("{{json}} {question} / {context}").unwrap();
        let out = template.render(&[("question", "Q"), ("context", "C"), ("unused", "x")]).unwrap();
        assert_eq!(out, "{json} Q / C");
    }

    #[test]
    fn missing_value_is_an_error() {
        let template = PromptTemplate::new("Q: {question}").unwrap();
        assert!(matches!(template.render(&[]), Err(RagError::Template(_))));
    }

    #[test]
    fn malformed_templates_are_rejected() {
        assert!(PromptTemplate::new("open {question").is_err());
        assert!(PromptTemplate::new("stray } brace").is_err());
        assert!(PromptTemplate::new("empty {}").is_err());
    }

    #[test]
    fn required_placeholders_are_checked() {
        let err = PromptTemplate::with_required("Q: {question}", &["question", "context"])
            .unwrap_err();
        assert!(err.to_string().contains("context"));
    }

    #[test]
    fn default_template_uses_question_and_context() {
        let template = PromptTemplate::rag_default();
        let names: Vec<&str> = template.placeholders().into_iter().collect();
        assert_eq!(names, vec!["context", "question"]);
    }
}
