pub mod builder;
pub mod embedding;
pub mod pipeline;
pub mod prompt;
pub mod retriever;

pub use builder::{discover_entities, discover_sources, BuildReport, IndexBuilder};
pub use embedding::{EmbeddingBackend, EmbeddingClient, OpenAiEmbeddingClient};
pub use pipeline::{QaAnswer, QaPipeline, NO_CONTENT_ANSWER};
pub use prompt::{format_prompt, CONTEXT_BEGIN, CONTEXT_END, PASSAGE_SEPARATOR};
pub use retriever::{RetrievedChunk, Retriever};
pub use docqa_llm::{Inference, InferenceAnswer, SubprocessInference};
