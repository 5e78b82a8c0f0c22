use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use docqa_core::normalize_namespace_name;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{IndexError, Result};
use crate::metadata::{ChunkRecord, MetadataSequence};
use crate::vector::VectorIndex;

pub const INDEX_FILE: &str = "index.bin";
pub const METADATA_FILE: &str = "metadata.jsonl";

/// (organization, entity) pair after whitespace normalization. Both parts
/// are safe to use as single path components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceKey {
    organization: String,
    entity: String,
}

impl NamespaceKey {
    pub fn new(organization: &str, entity: &str) -> Result<Self> {
        Ok(Self {
            organization: checked_component(organization)?,
            entity: checked_component(entity)?,
        })
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// `<root>/<organization>/<entity>`
    pub fn dir_under(&self, root: &Path) -> PathBuf {
        root.join(&self.organization).join(&self.entity)
    }
}

impl fmt::Display for NamespaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.organization, self.entity)
    }
}

fn checked_component(raw: &str) -> Result<String> {
    let normalized = normalize_namespace_name(raw);
    let unsafe_name = normalized.is_empty()
        || normalized == "."
        || normalized == ".."
        || normalized.contains(|c: char| matches!(c, '/' | '\\' | '\0'));
    if unsafe_name {
        return Err(IndexError::InvalidNamespace(raw.to_string()));
    }
    Ok(normalized)
}

/// One vector index paired with its metadata sequence. Ordinal `i` in the
/// index describes record `i` in the metadata; only a namespace read back
/// after an interrupted commit may hold vectors without a record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Namespace {
    index: VectorIndex,
    metadata: MetadataSequence,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(index: VectorIndex, metadata: MetadataSequence) -> Result<Self> {
        if index.len() != metadata.len() {
            return Err(IndexError::Corrupt(format!(
                "index holds {} vectors but metadata holds {} records",
                index.len(),
                metadata.len()
            )));
        }
        Ok(Self { index, metadata })
    }

    /// Pairs stores read back from disk without checking their sizes. A
    /// crash between the two renames of a commit leaves the index one batch
    /// ahead of the metadata; such a namespace is still searchable, callers
    /// just drop ordinals the metadata does not cover.
    pub fn from_unsynced(index: VectorIndex, metadata: MetadataSequence) -> Self {
        Self { index, metadata }
    }

    pub fn is_synced(&self) -> bool {
        self.index.len() == self.metadata.len()
    }

    /// Cuts both stores back to their common prefix and returns how many
    /// entries were dropped in total.
    pub fn truncate_to_synced(&mut self) -> usize {
        let (vectors, records) = (self.index.len(), self.metadata.len());
        let common = vectors.min(records);
        self.index.truncate(common);
        self.metadata.truncate(common);
        (vectors - common) + (records - common)
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn metadata(&self) -> &MetadataSequence {
        &self.metadata
    }

    /// Number of metadata records.
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Appends vectors and records pairwise. Nothing is appended when the
    /// counts differ or the vector width does not match the index. An
    /// unsynced namespace must be truncated first.
    pub fn append(&mut self, vectors: &[Vec<f32>], records: Vec<ChunkRecord>) -> Result<()> {
        if vectors.len() != records.len() || !self.is_synced() {
            return Err(IndexError::LengthMismatch {
                vectors: vectors.len(),
                records: records.len(),
            });
        }
        self.index.add(vectors)?;
        self.metadata.extend(records);
        Ok(())
    }
}

/// Filesystem home of all namespaces: one directory per key holding
/// [`INDEX_FILE`] and [`METADATA_FILE`].
///
/// There is no locking. Two concurrent commits to the same key race, so
/// callers must run at most one build per namespace at a time. Readers are
/// safe while no commit is in flight.
#[derive(Debug, Clone)]
pub struct NamespaceStore {
    root: PathBuf,
}

impl NamespaceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, key: &NamespaceKey) -> PathBuf {
        key.dir_under(&self.root)
    }

    pub fn exists(&self, key: &NamespaceKey) -> bool {
        let dir = self.dir(key);
        dir.join(INDEX_FILE).is_file() && dir.join(METADATA_FILE).is_file()
    }

    /// `Ok(None)` when either file is absent; unreadable files are errors.
    /// A pair whose sizes disagree is returned as is (see
    /// [`Namespace::from_unsynced`]).
    pub fn load(&self, key: &NamespaceKey) -> Result<Option<Namespace>> {
        let dir = self.dir(key);
        let index_path = dir.join(INDEX_FILE);
        let metadata_path = dir.join(METADATA_FILE);
        match (index_path.is_file(), metadata_path.is_file()) {
            (true, true) => {}
            (false, false) => return Ok(None),
            (has_index, has_metadata) => {
                warn!(
                    namespace = %key,
                    has_index,
                    has_metadata,
                    "namespace is missing one of its files"
                );
                return Ok(None);
            }
        }
        let index = VectorIndex::from_bytes(&fs::read(&index_path)?)?;
        let metadata = MetadataSequence::read_from(BufReader::new(File::open(&metadata_path)?))?;
        if index.len() != metadata.len() {
            warn!(
                namespace = %key,
                vectors = index.len(),
                records = metadata.len(),
                "index and metadata sizes differ"
            );
        }
        Ok(Some(Namespace::from_unsynced(index, metadata)))
    }

    /// Loads the namespace for appending: an unsynced pair is cut back to
    /// its common prefix, and an absent or unreadable one becomes empty.
    pub fn load_or_empty(&self, key: &NamespaceKey) -> Namespace {
        match self.load(key) {
            Ok(Some(mut namespace)) => {
                let dropped = namespace.truncate_to_synced();
                if dropped > 0 {
                    warn!(namespace = %key, dropped, "truncated unsynced namespace to common prefix");
                }
                namespace
            }
            Ok(None) => Namespace::new(),
            Err(err) => {
                warn!(namespace = %key, error = %err, "discarding unreadable namespace");
                Namespace::new()
            }
        }
    }

    /// Writes both files through temporaries in the namespace directory and
    /// renames them into place, so a reader never sees a half-written file.
    pub fn commit(&self, key: &NamespaceKey, namespace: &Namespace) -> Result<()> {
        if namespace.index.len() != namespace.metadata.len() {
            return Err(IndexError::LengthMismatch {
                vectors: namespace.index.len(),
                records: namespace.metadata.len(),
            });
        }
        let dir = self.dir(key);
        fs::create_dir_all(&dir)?;

        let mut index_tmp = NamedTempFile::new_in(&dir)?;
        index_tmp.write_all(&namespace.index.to_bytes())?;
        index_tmp.as_file().sync_all()?;

        let metadata_tmp = NamedTempFile::new_in(&dir)?;
        let mut writer = namespace.metadata.write_to(BufWriter::new(metadata_tmp))?;
        writer.flush()?;
        let metadata_tmp = writer.into_inner().map_err(|err| err.into_error())?;
        metadata_tmp.as_file().sync_all()?;

        index_tmp.persist(dir.join(INDEX_FILE))?;
        metadata_tmp.persist(dir.join(METADATA_FILE))?;
        debug!(namespace = %key, records = namespace.len(), "namespace committed");
        Ok(())
    }
}
