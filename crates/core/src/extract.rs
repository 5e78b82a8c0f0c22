use std::fs;
use std::path::Path;

use tracing::warn;

use crate::error::{DocQaError, Result};
use crate::normalization::{clean_extracted_text, looks_like_table_line};

/// Marker placed between a document's body text and its extracted tables.
pub const TABLES_MARKER: &str = "[Extracted Tables]";

const MIN_TABLE_ROWS: usize = 2;

/// Text and table extraction capability for one source file.
pub trait DocumentExtractor: Send + Sync {
    fn supports(&self, path: &Path) -> bool;

    fn extract_text(&self, path: &Path) -> Result<String>;

    /// Tables rendered as plain text, one entry per table.
    fn extract_tables(&self, path: &Path) -> Result<Vec<String>>;

    /// Text is mandatory; a table failure degrades to a text-only document.
    fn extract(&self, path: &Path) -> Result<ExtractedDocument> {
        let text = self.extract_text(path)?;
        let tables = self.extract_tables(path).unwrap_or_else(|err| {
            warn!(file = %path.display(), error = %err, "table extraction failed");
            Vec::new()
        });
        Ok(ExtractedDocument::new(file_id(path), text, tables))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub file_id: String,
    pub text: String,
    pub tables: Vec<String>,
}

impl ExtractedDocument {
    pub fn new(file_id: impl Into<String>, text: impl Into<String>, tables: Vec<String>) -> Self {
        Self {
            file_id: file_id.into(),
            text: text.into(),
            tables,
        }
    }

    pub fn contains_table(&self) -> bool {
        self.tables.iter().any(|table| !table.trim().is_empty())
    }

    /// Body text, followed by the tables section when any table has content.
    pub fn combined_text(&self) -> String {
        let tables: Vec<&str> = self
            .tables
            .iter()
            .map(|t| t.as_str())
            .filter(|t| !t.trim().is_empty())
            .collect();
        if tables.is_empty() {
            return self.text.clone();
        }
        format!(
            "{}\n\n{}\n{}",
            self.text,
            TABLES_MARKER,
            tables.join("\n\n")
        )
    }
}

pub fn file_id(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Default extractor: PDFs through `pdf-extract`, `.txt`/`.md` read as
/// lossy UTF-8. Tables come from a layout heuristic over the raw text.
#[derive(Debug, Clone, Default)]
pub struct FileExtractor;

impl FileExtractor {
    pub fn new() -> Self {
        Self
    }

    fn raw_text(&self, path: &Path) -> Result<String> {
        match extension(path).as_deref() {
            Some("pdf") => {
                let pages = pdf_extract::extract_text_by_pages(path)
                    .map_err(|e| DocQaError::extraction(path, format!("pdf extract failed: {e}")))?;
                Ok(pages.join("\n"))
            }
            Some("txt") | Some("md") => read_text_lossy(path),
            _ => Err(DocQaError::UnsupportedInput(path.to_path_buf())),
        }
    }
}

impl DocumentExtractor for FileExtractor {
    fn supports(&self, path: &Path) -> bool {
        matches!(extension(path).as_deref(), Some("pdf" | "txt" | "md"))
    }

    fn extract_text(&self, path: &Path) -> Result<String> {
        Ok(clean_extracted_text(&self.raw_text(path)?))
    }

    fn extract_tables(&self, path: &Path) -> Result<Vec<String>> {
        Ok(detect_tables(&self.raw_text(path)?))
    }

    fn extract(&self, path: &Path) -> Result<ExtractedDocument> {
        let raw = self.raw_text(path)?;
        Ok(ExtractedDocument::new(
            file_id(path),
            clean_extracted_text(&raw),
            detect_tables(&raw),
        ))
    }
}

/// Groups consecutive table-like lines; runs shorter than two rows are
/// treated as prose.
pub fn detect_tables(raw: &str) -> Vec<String> {
    let mut tables = Vec::new();
    let mut rows: Vec<&str> = Vec::new();
    for line in raw.lines() {
        if !line.trim().is_empty() && looks_like_table_line(line) {
            rows.push(line.trim_end());
            continue;
        }
        flush_rows(&mut rows, &mut tables);
    }
    flush_rows(&mut rows, &mut tables);
    tables
}

fn flush_rows(rows: &mut Vec<&str>, tables: &mut Vec<String>) {
    if rows.len() >= MIN_TABLE_ROWS {
        tables.push(rows.join("\n"));
    }
    rows.clear();
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

fn read_text_lossy(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).to_string())
}
