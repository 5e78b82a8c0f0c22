use std::collections::BTreeSet;
use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// One indexed passage. Its position in the [`MetadataSequence`] is its
/// identity and matches the ordinal of its vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkRecord {
    pub source: String,
    pub text: String,
    #[serde(default)]
    pub contains_table: bool,
}

impl ChunkRecord {
    pub fn new(source: impl Into<String>, text: impl Into<String>, contains_table: bool) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
            contains_table,
        }
    }
}

/// Append-only ordered store of [`ChunkRecord`]s, persisted as JSON Lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataSequence {
    records: Vec<ChunkRecord>,
}

impl MetadataSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, ordinal: usize) -> Option<&ChunkRecord> {
        self.records.get(ordinal)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChunkRecord> {
        self.records.iter()
    }

    pub fn push(&mut self, record: ChunkRecord) {
        self.records.push(record);
    }

    pub fn extend<I: IntoIterator<Item = ChunkRecord>>(&mut self, records: I) {
        self.records.extend(records);
    }

    /// Drops every record at ordinal `len` or later.
    pub fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }

    pub fn distinct_sources(&self) -> BTreeSet<String> {
        self.records.iter().map(|r| r.source.clone()).collect()
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<W> {
        let mut writer = JsonlWriter::new(writer);
        for record in &self.records {
            writer.write_record(record)?;
        }
        Ok(writer.into_inner())
    }

    pub fn read_from<R: BufRead>(reader: R) -> Result<Self> {
        let mut records = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str::<ChunkRecord>(&line).map_err(|err| {
                IndexError::Corrupt(format!("metadata line {}: {err}", idx + 1))
            })?;
            records.push(record);
        }
        Ok(Self { records })
    }
}

impl FromIterator<ChunkRecord> for MetadataSequence {
    fn from_iter<I: IntoIterator<Item = ChunkRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

pub struct JsonlWriter<W> {
    writer: W,
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_record<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let mut buf = serde_json::to_vec(record)?;
        buf.push(b'\n');
        self.writer.write_all(&buf)?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
