use anyhow::Result;
use tracing::info;

use docqa_index::NamespaceKey;
use docqa_llm::{Inference, InferenceAnswer};

use crate::prompt::format_prompt;
use crate::retriever::{RetrievedChunk, Retriever};

pub const NO_CONTENT_ANSWER: &str = "No relevant content found in documents.";

#[derive(Debug, Clone, PartialEq)]
pub struct QaAnswer {
    pub answer: String,
    pub passages: Vec<RetrievedChunk>,
    /// Absent when nothing was retrieved and inference was skipped.
    pub prompt: Option<String>,
    pub inference_failed: bool,
}

/// question -> retrieval -> prompt -> inference, for one namespace.
pub struct QaPipeline<'a> {
    retriever: Retriever<'a>,
    inference: &'a dyn Inference,
    top_k: usize,
}

impl<'a> QaPipeline<'a> {
    pub fn new(retriever: Retriever<'a>, inference: &'a dyn Inference, top_k: usize) -> Self {
        Self {
            retriever,
            inference,
            top_k,
        }
    }

    pub fn answer(&self, question: &str, key: &NamespaceKey) -> Result<QaAnswer> {
        let passages = self.retriever.search(question, key, self.top_k)?;
        if passages.is_empty() {
            info!(namespace = %key, "no passages retrieved");
            return Ok(QaAnswer {
                answer: NO_CONTENT_ANSWER.to_string(),
                passages,
                prompt: None,
                inference_failed: false,
            });
        }

        let texts: Vec<&str> = passages.iter().map(|p| p.record.text.as_str()).collect();
        let prompt = format_prompt(&texts, question);
        info!(namespace = %key, passages = passages.len(), "running inference");
        let outcome: InferenceAnswer = self.inference.infer(&prompt)?;
        let inference_failed = outcome.is_error();
        Ok(QaAnswer {
            answer: outcome.into_text(),
            passages,
            prompt: Some(prompt),
            inference_failed,
        })
    }
}
