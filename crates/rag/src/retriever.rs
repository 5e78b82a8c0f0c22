use anyhow::{anyhow, Context, Result};
use tracing::{debug, warn};

use docqa_core::Embedder;
use docqa_index::{ChunkRecord, NamespaceKey, NamespaceStore};

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub record: ChunkRecord,
    pub distance: f32,
    pub ordinal: usize,
}

/// Nearest-neighbor lookup over one namespace at a time. Holds no state of
/// its own, so a single retriever may serve concurrent queries.
pub struct Retriever<'a> {
    store: &'a NamespaceStore,
    embedder: &'a dyn Embedder,
}

impl<'a> Retriever<'a> {
    pub fn new(store: &'a NamespaceStore, embedder: &'a dyn Embedder) -> Self {
        Self { store, embedder }
    }

    /// Up to `k` records closest to `query`, best match first. An absent or
    /// unreadable namespace yields no hits. Hits beyond the end of the
    /// metadata (an index written ahead of its records) are dropped.
    pub fn search(&self, query: &str, key: &NamespaceKey, k: usize) -> Result<Vec<RetrievedChunk>> {
        let namespace = match self.store.load(key) {
            Ok(Some(namespace)) => namespace,
            Ok(None) => {
                warn!(namespace = %key, "namespace not built yet");
                return Ok(Vec::new());
            }
            Err(err) => {
                warn!(namespace = %key, error = %err, "namespace unreadable, returning no context");
                return Ok(Vec::new());
            }
        };
        if namespace.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self
            .embedder
            .embed_one(query)
            .with_context(|| format!("failed to embed query for namespace {key}"))?;
        let hits = namespace
            .index()
            .search(&query_vector, k)
            .map_err(|err| anyhow!("search failed for namespace {key}: {err}"))?;

        let metadata = namespace.metadata();
        let mut chunks = Vec::with_capacity(hits.len());
        for hit in hits {
            match metadata.get(hit.ordinal) {
                Some(record) => chunks.push(RetrievedChunk {
                    record: record.clone(),
                    distance: hit.distance,
                    ordinal: hit.ordinal,
                }),
                None => warn!(namespace = %key, ordinal = hit.ordinal, "hit has no metadata record"),
            }
        }
        debug!(namespace = %key, hits = chunks.len(), "retrieved passages");
        Ok(chunks)
    }

    /// Passage texts only, in ascending distance order.
    pub fn top_chunks(&self, query: &str, key: &NamespaceKey, k: usize) -> Result<Vec<String>> {
        Ok(self
            .search(query, key, k)?
            .into_iter()
            .map(|chunk| chunk.record.text)
            .collect())
    }
}
