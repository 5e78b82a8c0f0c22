mod chunk;
mod cleanup;
mod config;
mod embedding;
mod error;
mod extract;
mod normalization;

pub use chunk::{chunk_text, split_sentences, ChunkConfig, Chunker, DEFAULT_MAX_CHUNK_LENGTH};
pub use cleanup::{cleanup_configured, cleanup_temp_artifacts, CleanupConfig, CleanupReport};
pub use config::{
    ChunkingSection, DocQaConfig, EmbeddingSection, InferenceSection, ServiceSection,
    DEFAULT_CONFIG_PATH, DEFAULT_INFERENCE_TIMEOUT_SECS, DEFAULT_TOP_K,
};
pub use embedding::{Embedder, HashEmbedder, HashEmbedderConfig};
pub use error::{DocQaError, Result};
pub use extract::{
    detect_tables, file_id, DocumentExtractor, ExtractedDocument, FileExtractor, TABLES_MARKER,
};
pub use normalization::{
    clean_extracted_text, looks_like_table_line, normalize_line, normalize_namespace_name,
    NAMESPACE_SEPARATOR,
};
