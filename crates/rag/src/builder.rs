use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use docqa_core::{
    cleanup_configured, file_id, normalize_namespace_name, Chunker, CleanupConfig,
    DocumentExtractor, Embedder, ExtractedDocument,
};
use docqa_index::{ChunkRecord, NamespaceKey, NamespaceStore};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub namespace: String,
    /// Files extracted and chunked in this run.
    pub indexed_files: Vec<String>,
    /// Files whose extraction failed; they will be retried on the next build.
    pub failed_files: Vec<String>,
    /// Files skipped because the namespace already holds them.
    pub already_indexed: usize,
    pub new_chunks: usize,
    pub total_chunks: usize,
    /// False when the run found nothing to add and wrote nothing.
    pub committed: bool,
}

/// Incremental build of one namespace from a folder of source documents.
///
/// Runs single-threaded and holds no lock on the namespace: at most one
/// builder may target a given namespace at a time.
pub struct IndexBuilder<'a> {
    store: &'a NamespaceStore,
    extractor: &'a dyn DocumentExtractor,
    embedder: &'a dyn Embedder,
    chunker: Chunker,
    cleanup: Option<CleanupConfig>,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(
        store: &'a NamespaceStore,
        extractor: &'a dyn DocumentExtractor,
        embedder: &'a dyn Embedder,
        chunker: Chunker,
    ) -> Self {
        Self {
            store,
            extractor,
            embedder,
            chunker,
            cleanup: None,
        }
    }

    /// Sweep leftover extraction temp files after every extraction pass.
    pub fn with_cleanup(mut self, cleanup: CleanupConfig) -> Self {
        self.cleanup = Some(cleanup);
        self
    }

    pub fn build_incremental(&self, source_folder: &Path, key: &NamespaceKey) -> Result<BuildReport> {
        info!(namespace = %key, source = %source_folder.display(), "building index");
        let mut report = BuildReport {
            namespace: key.to_string(),
            ..BuildReport::default()
        };

        let mut namespace = self.store.load_or_empty(key);
        if namespace.is_empty() {
            info!(namespace = %key, "starting a new index");
        } else {
            info!(namespace = %key, chunks = namespace.len(), "loaded existing index");
        }
        let indexed = namespace.metadata().distinct_sources();

        let candidates = discover_sources(source_folder, self.extractor)?;
        let (skipped, pending): (Vec<PathBuf>, Vec<PathBuf>) = candidates
            .into_iter()
            .partition(|path| indexed.contains(&file_id(path)));
        report.already_indexed = skipped.len();

        let documents = self.extract_all(&pending, &mut report);
        if documents.is_empty() {
            info!(namespace = %key, "no new files to index");
            report.total_chunks = namespace.len();
            return Ok(report);
        }
        info!(namespace = %key, files = documents.len(), "found new files to embed");

        let mut texts = Vec::new();
        let mut records = Vec::new();
        for document in &documents {
            let contains_table = document.contains_table();
            for passage in self.chunker.chunk(&document.combined_text()) {
                records.push(ChunkRecord::new(
                    document.file_id.clone(),
                    passage.clone(),
                    contains_table,
                ));
                texts.push(passage);
            }
        }
        if texts.is_empty() {
            warn!(namespace = %key, "new files produced no content chunks");
            report.total_chunks = namespace.len();
            return Ok(report);
        }

        info!(namespace = %key, chunks = texts.len(), "encoding chunks");
        let vectors = self
            .embedder
            .embed(&texts)
            .with_context(|| format!("embedding failed for namespace {key}"))?;
        if vectors.len() != texts.len() {
            return Err(anyhow!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                texts.len()
            ));
        }
        namespace
            .append(&vectors, records)
            .with_context(|| format!("cannot extend index for namespace {key}"))?;
        self.store
            .commit(key, &namespace)
            .with_context(|| format!("failed to persist namespace {key}"))?;

        report.new_chunks = texts.len();
        report.total_chunks = namespace.len();
        report.committed = true;
        info!(namespace = %key, total = report.total_chunks, "index ready");
        Ok(report)
    }

    fn extract_all(&self, pending: &[PathBuf], report: &mut BuildReport) -> Vec<ExtractedDocument> {
        let mut documents = Vec::with_capacity(pending.len());
        for path in pending {
            info!(file = %path.display(), "loading");
            match self.extractor.extract(path) {
                Ok(document) => {
                    report.indexed_files.push(document.file_id.clone());
                    documents.push(document);
                }
                Err(err) => {
                    warn!(file = %path.display(), error = %err, "failed to read document");
                    report.failed_files.push(file_id(path));
                }
            }
        }
        if let Some(cleanup) = &self.cleanup {
            match cleanup_configured(cleanup) {
                Ok(swept) if !swept.locked.is_empty() => {
                    warn!(locked = swept.locked.len(), "some temp artifacts could not be removed");
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "temp artifact cleanup failed"),
            }
        }
        documents
    }

    /// Builds every entity of `organization` that has a folder under
    /// `documents_root`. Entities without a folder are skipped. An entity
    /// with an unusable name or a failed build is logged and does not stop
    /// the others; only successful builds are reported.
    pub fn build_entities(
        &self,
        documents_root: &Path,
        organization: &str,
        entities: &[String],
    ) -> Result<Vec<BuildReport>> {
        let mut reports = Vec::new();
        for entity in entities {
            let key = match NamespaceKey::new(organization, entity) {
                Ok(key) => key,
                Err(err) => {
                    error!(organization, entity = %entity, error = %err, "skipping entity");
                    continue;
                }
            };
            let folder = key.dir_under(documents_root);
            if !folder.is_dir() {
                warn!(namespace = %key, folder = %folder.display(), "no document folder, skipping");
                continue;
            }
            match self.build_incremental(&folder, &key) {
                Ok(report) => reports.push(report),
                Err(err) => {
                    let reason = format!("{err:#}");
                    error!(namespace = %key, error = %reason, "build failed");
                }
            }
        }
        Ok(reports)
    }
}

/// Supported files directly inside `folder`, in file-name order.
pub fn discover_sources(folder: &Path, extractor: &dyn DocumentExtractor) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(anyhow!("source folder {} does not exist", folder.display()));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("cannot list {}", folder.display()))?;
        if entry.file_type().is_file() && extractor.supports(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Entity folder names under `<documents_root>/<organization>`.
pub fn discover_entities(documents_root: &Path, organization: &str) -> Result<Vec<String>> {
    let org_dir = documents_root.join(normalize_namespace_name(organization));
    if !org_dir.is_dir() {
        return Err(anyhow!(
            "no document folder for organization at {}",
            org_dir.display()
        ));
    }
    let mut entities = BTreeSet::new();
    for entry in WalkDir::new(&org_dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("cannot list {}", org_dir.display()))?;
        if entry.file_type().is_dir() {
            entities.insert(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(entities.into_iter().collect())
}
