use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use docqa_core::{
    file_id, Chunker, CleanupConfig, DocQaError, DocumentExtractor, Embedder, HashEmbedder,
    HashEmbedderConfig, Result as CoreResult,
};
use docqa_index::{ChunkRecord, Namespace, NamespaceKey, NamespaceStore, INDEX_FILE, METADATA_FILE};
use docqa_rag::{
    format_prompt, IndexBuilder, Inference, InferenceAnswer, QaPipeline, Retriever, CONTEXT_BEGIN,
    CONTEXT_END,
};
use tempfile::{tempdir, TempDir};

/// Reads file bodies as text; tables and failures are scripted per file name.
#[derive(Default)]
struct ScriptedExtractor {
    broken: HashSet<String>,
    tables: HashMap<String, Vec<String>>,
    broken_tables: HashSet<String>,
}

impl DocumentExtractor for ScriptedExtractor {
    fn supports(&self, _path: &Path) -> bool {
        true
    }

    fn extract_text(&self, path: &Path) -> CoreResult<String> {
        if self.broken.contains(&file_id(path)) {
            return Err(DocQaError::extraction(path, "unreadable document"));
        }
        Ok(fs::read_to_string(path)?)
    }

    fn extract_tables(&self, path: &Path) -> CoreResult<Vec<String>> {
        let name = file_id(path);
        if self.broken_tables.contains(&name) {
            return Err(DocQaError::extraction(path, "table parser crashed"));
        }
        Ok(self.tables.get(&name).cloned().unwrap_or_default())
    }
}

struct OfflineEmbedder;

impl Embedder for OfflineEmbedder {
    fn embed(&self, _texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
        Err(DocQaError::Embedding("model offline".to_string()))
    }
}

struct Echo;

impl Inference for Echo {
    fn infer(&self, prompt: &str) -> anyhow::Result<InferenceAnswer> {
        Ok(InferenceAnswer::Answer(format!("{} chars", prompt.len())))
    }
}

struct Fixture {
    _root: TempDir,
    source: std::path::PathBuf,
    store: NamespaceStore,
    key: NamespaceKey,
}

fn fixture(files: &[(&str, &str)]) -> Fixture {
    let root = tempdir().unwrap();
    let source = root.path().join("docs");
    fs::create_dir_all(&source).unwrap();
    for (name, body) in files {
        fs::write(source.join(name), body).unwrap();
    }
    let store = NamespaceStore::new(root.path().join("indexes"));
    Fixture {
        source,
        store,
        key: NamespaceKey::new("Acme Corp", "Client One").unwrap(),
        _root: root,
    }
}

fn snapshot(store: &NamespaceStore, key: &NamespaceKey) -> (Vec<u8>, Vec<u8>) {
    let dir = store.dir(key);
    (
        fs::read(dir.join(INDEX_FILE)).unwrap(),
        fs::read(dir.join(METADATA_FILE)).unwrap(),
    )
}

#[test]
fn single_document_end_to_end() {
    let fx = fixture(&[("A", "The pilot program launched in spring.")]);
    let extractor = ScriptedExtractor::default();
    let embedder = HashEmbedder::default();
    let builder = IndexBuilder::new(&fx.store, &extractor, &embedder, Chunker::default());

    let report = builder.build_incremental(&fx.source, &fx.key).unwrap();
    assert!(report.committed);
    assert_eq!(report.indexed_files, vec!["A".to_string()]);
    assert_eq!(report.new_chunks, 1);

    let namespace = fx.store.load(&fx.key).unwrap().unwrap();
    assert_eq!(namespace.index().len(), 1);
    let record = namespace.metadata().get(0).unwrap();
    assert_eq!(record.source, "A");
    assert!(!record.contains_table);

    let question = "When did the pilot program launch?";
    let passages = Retriever::new(&fx.store, &embedder)
        .top_chunks(question, &fx.key, 5)
        .unwrap();
    assert_eq!(passages, vec!["The pilot program launched in spring.".to_string()]);

    let prompt = format_prompt(&passages, question);
    let begin = prompt.find(CONTEXT_BEGIN).unwrap();
    let passage = prompt.find("The pilot program launched in spring.").unwrap();
    let end = prompt.find(CONTEXT_END).unwrap();
    let asked = prompt.find(question).unwrap();
    assert!(begin < passage && passage < end && end < asked);

    let answer = QaPipeline::new(Retriever::new(&fx.store, &embedder), &Echo, 5)
        .answer(question, &fx.key)
        .unwrap();
    assert_eq!(answer.prompt.as_deref(), Some(prompt.as_str()));
    assert!(!answer.inference_failed);
}

#[test]
fn rebuilding_an_unchanged_folder_writes_nothing() {
    let fx = fixture(&[
        ("a.txt", "Alpha one. Alpha two."),
        ("b.txt", "Beta one. Beta two."),
    ]);
    let extractor = ScriptedExtractor::default();
    let embedder = HashEmbedder::default();
    let builder = IndexBuilder::new(&fx.store, &extractor, &embedder, Chunker::default());

    builder.build_incremental(&fx.source, &fx.key).unwrap();
    let before = snapshot(&fx.store, &fx.key);
    let second = builder.build_incremental(&fx.source, &fx.key).unwrap();
    assert!(!second.committed);
    assert_eq!(second.already_indexed, 2);
    assert_eq!(second.new_chunks, 0);
    assert_eq!(snapshot(&fx.store, &fx.key), before);
}

#[test]
fn new_files_are_appended_after_existing_ones() {
    let fx = fixture(&[("a.txt", "First document body.")]);
    let extractor = ScriptedExtractor::default();
    let embedder = HashEmbedder::default();
    let builder =
        IndexBuilder::new(&fx.store, &extractor, &embedder, Chunker::with_max_length(20));
    builder.build_incremental(&fx.source, &fx.key).unwrap();

    fs::write(
        fx.source.join("b.txt"),
        "Second document opens here. It has another sentence.",
    )
    .unwrap();
    let report = builder.build_incremental(&fx.source, &fx.key).unwrap();
    assert_eq!(report.indexed_files, vec!["b.txt".to_string()]);
    assert_eq!(report.already_indexed, 1);

    let namespace = fx.store.load(&fx.key).unwrap().unwrap();
    assert_eq!(namespace.index().len(), namespace.metadata().len());
    let sources: Vec<&str> = namespace.metadata().iter().map(|r| r.source.as_str()).collect();
    assert_eq!(sources, vec!["a.txt", "b.txt", "b.txt"]);
    for (ordinal, record) in namespace.metadata().iter().enumerate() {
        let expected = embedder.embed_text(&record.text);
        assert_eq!(namespace.index().vector(ordinal).unwrap(), expected.as_slice());
    }
}

#[test]
fn table_flag_follows_table_extraction() {
    let fx = fixture(&[
        ("plain.txt", "Nothing tabular here."),
        ("sheet.txt", "Totals are below."),
        ("flaky.txt", "Tables could not be parsed."),
    ]);
    let extractor = ScriptedExtractor {
        tables: HashMap::from([("sheet.txt".to_string(), vec!["Q1 | 10\nQ2 | 12".to_string()])]),
        broken_tables: HashSet::from(["flaky.txt".to_string()]),
        ..ScriptedExtractor::default()
    };
    let embedder = HashEmbedder::default();
    IndexBuilder::new(&fx.store, &extractor, &embedder, Chunker::default())
        .build_incremental(&fx.source, &fx.key)
        .unwrap();

    let namespace = fx.store.load(&fx.key).unwrap().unwrap();
    let flags: HashMap<&str, bool> = namespace
        .metadata()
        .iter()
        .map(|r| (r.source.as_str(), r.contains_table))
        .collect();
    assert_eq!(flags["plain.txt"], false);
    assert_eq!(flags["sheet.txt"], true);
    assert_eq!(flags["flaky.txt"], false);

    let sheet = namespace
        .metadata()
        .iter()
        .find(|r| r.source == "sheet.txt")
        .unwrap();
    assert!(sheet.text.contains("[Extracted Tables]"));
}

#[test]
fn failed_extraction_skips_only_that_file() {
    let fx = fixture(&[("bad.txt", "never read"), ("good.txt", "Readable content.")]);
    let mut extractor = ScriptedExtractor {
        broken: HashSet::from(["bad.txt".to_string()]),
        ..ScriptedExtractor::default()
    };
    let embedder = HashEmbedder::default();

    let report = IndexBuilder::new(&fx.store, &extractor, &embedder, Chunker::default())
        .build_incremental(&fx.source, &fx.key)
        .unwrap();
    assert_eq!(report.failed_files, vec!["bad.txt".to_string()]);
    assert_eq!(report.indexed_files, vec!["good.txt".to_string()]);

    extractor.broken.clear();
    let retry = IndexBuilder::new(&fx.store, &extractor, &embedder, Chunker::default())
        .build_incremental(&fx.source, &fx.key)
        .unwrap();
    assert_eq!(retry.indexed_files, vec!["bad.txt".to_string()]);
    assert_eq!(retry.total_chunks, 2);
}

#[test]
fn embedding_failure_leaves_namespace_untouched() {
    let fx = fixture(&[("a.txt", "Some content.")]);
    let extractor = ScriptedExtractor::default();
    let result = IndexBuilder::new(&fx.store, &extractor, &OfflineEmbedder, Chunker::default())
        .build_incremental(&fx.source, &fx.key);
    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("model offline"));
    assert!(!fx.store.exists(&fx.key));
    assert!(!fx.store.dir(&fx.key).exists());
}

#[test]
fn embedding_width_change_is_rejected() {
    let fx = fixture(&[("a.txt", "Original content.")]);
    let extractor = ScriptedExtractor::default();
    let wide = HashEmbedder::default();
    IndexBuilder::new(&fx.store, &extractor, &wide, Chunker::default())
        .build_incremental(&fx.source, &fx.key)
        .unwrap();
    let before = snapshot(&fx.store, &fx.key);

    fs::write(fx.source.join("b.txt"), "Later content.").unwrap();
    let narrow = HashEmbedder::new(HashEmbedderConfig {
        dimensions: 16,
        ..HashEmbedderConfig::default()
    });
    let err = IndexBuilder::new(&fx.store, &extractor, &narrow, Chunker::default())
        .build_incremental(&fx.source, &fx.key)
        .unwrap_err();
    assert!(format!("{err:#}").contains("dimension mismatch"));
    assert_eq!(snapshot(&fx.store, &fx.key), before);
}

#[test]
fn empty_documents_produce_no_write() {
    let fx = fixture(&[("blank.txt", "   \n  ")]);
    let extractor = ScriptedExtractor::default();
    let embedder = HashEmbedder::default();
    let report = IndexBuilder::new(&fx.store, &extractor, &embedder, Chunker::default())
        .build_incremental(&fx.source, &fx.key)
        .unwrap();
    assert!(!report.committed);
    assert!(!fx.store.exists(&fx.key));
}

#[test]
fn corrupt_namespace_is_rebuilt_from_scratch() {
    let fx = fixture(&[("a.txt", "Recoverable content.")]);
    let extractor = ScriptedExtractor::default();
    let embedder = HashEmbedder::default();
    let builder = IndexBuilder::new(&fx.store, &extractor, &embedder, Chunker::default());
    builder.build_incremental(&fx.source, &fx.key).unwrap();
    fs::write(fx.store.dir(&fx.key).join(INDEX_FILE), b"torn").unwrap();

    let report = builder.build_incremental(&fx.source, &fx.key).unwrap();
    assert!(report.committed);
    assert_eq!(report.total_chunks, 1);
    assert!(fx.store.load(&fx.key).unwrap().is_some());
}

#[test]
fn build_entities_skips_missing_folders() {
    let root = tempdir().unwrap();
    let documents = root.path().join("pdfs");
    let org_dir = documents.join("Acme");
    fs::create_dir_all(org_dir.join("Client_One")).unwrap();
    fs::write(org_dir.join("Client_One/a.txt"), "Entity one content.").unwrap();
    let store = NamespaceStore::new(root.path().join("indexes"));
    let extractor = ScriptedExtractor::default();
    let embedder = HashEmbedder::default();

    let entities = docqa_rag::discover_entities(&documents, "Acme").unwrap();
    assert_eq!(entities, vec!["Client_One".to_string()]);

    let reports = IndexBuilder::new(&store, &extractor, &embedder, Chunker::default())
        .build_entities(
            &documents,
            "Acme",
            &["Client One".to_string(), "Ghost".to_string()],
        )
        .unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].namespace, "Acme/Client_One");
    assert!(store.exists(&NamespaceKey::new("Acme", "Client One").unwrap()));
}

#[test]
fn interrupted_commit_keeps_records_and_reindexes_the_rest() {
    let fx = fixture(&[("a.txt", "Alpha contract terms."), ("b.txt", "Beta delivery schedule.")]);
    let extractor = ScriptedExtractor::default();
    let embedder = HashEmbedder::default();
    let builder = IndexBuilder::new(&fx.store, &extractor, &embedder, Chunker::default());
    builder.build_incremental(&fx.source, &fx.key).unwrap();

    // index.bin renamed into place, metadata.jsonl still one batch behind
    let metadata_path = fx.store.dir(&fx.key).join(METADATA_FILE);
    let first = fs::read_to_string(&metadata_path).unwrap().lines().next().unwrap().to_string();
    fs::write(&metadata_path, format!("{first}\n")).unwrap();

    let served = Retriever::new(&fx.store, &embedder)
        .top_chunks("Alpha contract terms.", &fx.key, 5)
        .unwrap();
    assert_eq!(served, vec!["Alpha contract terms.".to_string()]);

    fs::remove_file(fx.source.join("a.txt")).unwrap();
    let report = builder.build_incremental(&fx.source, &fx.key).unwrap();
    assert_eq!(report.indexed_files, vec!["b.txt".to_string()]);
    assert_eq!(report.total_chunks, 2);

    let namespace = fx.store.load(&fx.key).unwrap().unwrap();
    assert!(namespace.is_synced());
    let sources: Vec<&str> = namespace.metadata().iter().map(|r| r.source.as_str()).collect();
    assert_eq!(sources, vec!["a.txt", "b.txt"]);
    for (ordinal, record) in namespace.metadata().iter().enumerate() {
        assert_eq!(
            namespace.index().vector(ordinal).unwrap(),
            embedder.embed_text(&record.text).as_slice()
        );
    }
}

#[test]
fn cleanup_sweeps_configured_directory_after_extraction() {
    let fx = fixture(&[("a.txt", "Content.")]);
    let scratch = tempdir().unwrap();
    for name in ["page-1-x.pdf", "page-2-y.pdf", "keep.pdf"] {
        fs::write(scratch.path().join(name), b"%PDF").unwrap();
    }
    let extractor = ScriptedExtractor::default();
    let embedder = HashEmbedder::default();
    IndexBuilder::new(&fx.store, &extractor, &embedder, Chunker::default())
        .with_cleanup(CleanupConfig {
            dir: Some(scratch.path().to_path_buf()),
            delay_ms: 0,
            ..CleanupConfig::default()
        })
        .build_incremental(&fx.source, &fx.key)
        .unwrap();

    assert!(!scratch.path().join("page-1-x.pdf").exists());
    assert!(!scratch.path().join("page-2-y.pdf").exists());
    assert!(scratch.path().join("keep.pdf").exists());
}

fn entity_tree(entities: &[&str]) -> (TempDir, std::path::PathBuf, NamespaceStore) {
    let root = tempdir().unwrap();
    let documents = root.path().join("pdfs");
    for entity in entities {
        let folder = documents.join("Acme").join(entity);
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("doc.txt"), format!("{entity} quarterly notes.")).unwrap();
    }
    let store = NamespaceStore::new(root.path().join("indexes"));
    (root, documents, store)
}

#[test]
fn build_entities_continues_past_a_failed_build() {
    let (_root, documents, store) = entity_tree(&["Alpha", "Beta", "Gamma"]);
    let narrow = HashEmbedder::new(HashEmbedderConfig {
        dimensions: 16,
        ..HashEmbedderConfig::default()
    });
    let beta = NamespaceKey::new("Acme", "Beta").unwrap();
    let mut seeded = Namespace::new();
    seeded
        .append(
            &narrow.embed(&["older notes".to_string()]).unwrap(),
            vec![ChunkRecord::new("old.txt", "older notes", false)],
        )
        .unwrap();
    store.commit(&beta, &seeded).unwrap();

    let extractor = ScriptedExtractor::default();
    let embedder = HashEmbedder::default();
    let entities = docqa_rag::discover_entities(&documents, "Acme").unwrap();
    let reports = IndexBuilder::new(&store, &extractor, &embedder, Chunker::default())
        .build_entities(&documents, "Acme", &entities)
        .unwrap();

    let built: Vec<&str> = reports.iter().map(|r| r.namespace.as_str()).collect();
    assert_eq!(built, vec!["Acme/Alpha", "Acme/Gamma"]);
    assert_eq!(store.load(&beta).unwrap().unwrap(), seeded);
}

#[test]
fn build_entities_skips_unusable_names() {
    let (_root, documents, store) = entity_tree(&["Client"]);
    let extractor = ScriptedExtractor::default();
    let embedder = HashEmbedder::default();
    let entities = vec!["bad\\name".to_string(), "..".to_string(), "Client".to_string()];

    let reports = IndexBuilder::new(&store, &extractor, &embedder, Chunker::default())
        .build_entities(&documents, "Acme", &entities)
        .unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].namespace, "Acme/Client");
}
