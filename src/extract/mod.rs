//! Document discovery and text extraction
//!
//! This module handles:
//! - Format detection from file extensions
//! - A registry of extractors keyed by format
//! - Loading a file into a [`Document`] with provenance

mod docx;
mod markdown;
#[cfg(feature = "pdf")]
mod pdf;
mod text;

pub use docx::*;
pub use markdown::*;
#[cfg(feature = "pdf")]
pub use pdf::*;
pub use text::*;

use crate::chunk::compute_text_hash;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Formats the indexer knows how to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    PlainText,
    Markdown,
    Docx,
}

impl DocumentFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "txt" | "text" => Some(DocumentFormat::PlainText),
            "md" | "markdown" => Some(DocumentFormat::Markdown),
            "docx" => Some(DocumentFormat::Docx),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::PlainText => "plaintext",
            DocumentFormat::Markdown => "markdown",
            DocumentFormat::Docx => "docx",
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converts one file format into plain text
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// The format this extractor handles
    fn format(&self) -> DocumentFormat;

    /// Extract the text of a file; failures name the file
    async fn extract(&self, path: &Path) -> Result<String>;
}

/// A source file read from the data directory
#[derive(Debug, Clone)]
pub struct Document {
    /// Absolute path on disk
    pub path: PathBuf,

    /// Stable identifier: path relative to the data directory, `/`-separated
    pub source_path: String,

    /// Bare file name
    pub file_name: String,

    pub format: DocumentFormat,

    /// Extracted plain text
    pub text: String,

    /// Filesystem modification time, when available
    pub modified: Option<DateTime<Utc>>,

    /// Blake3 hash of the extracted text
    pub content_hash: String,
}

/// Table of extractors keyed by format
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<DocumentFormat, Arc<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in extractor
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(PlainTextExtractor);
        registry.register(MarkdownExtractor);
        registry.register(DocxExtractor);
        #[cfg(feature = "pdf")]
        registry.register(PdfExtractor);
        registry
    }

    /// Add or replace the extractor for its format
    pub fn register<E: TextExtractor + 'static>(&mut self, extractor: E) {
        self.extractors.insert(extractor.format(), Arc::new(extractor));
    }

    /// Formats with a registered extractor
    pub fn formats(&self) -> Vec<DocumentFormat> {
        let mut formats: Vec<_> = self.extractors.keys().copied().collect();
        formats.sort_by_key(|f| f.as_str());
        formats
    }

    /// Whether the file has a recognized, registered format
    pub fn supports(&self, path: &Path) -> bool {
        DocumentFormat::from_path(path).is_some_and(|f| self.extractors.contains_key(&f))
    }

    /// Extract the text of a file using the extractor for its format
    pub async fn extract(&self, path: &Path) -> Result<String> {
        let extractor = DocumentFormat::from_path(path)
            .and_then(|f| self.extractors.get(&f))
            .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))?;

        extractor.extract(path).await
    }

    /// Read a file under `root` into a [`Document`]
    pub async fn load_document(&self, root: &Path, path: &Path) -> Result<Document> {
        let format = DocumentFormat::from_path(path)
            .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))?;

        debug!(path = %path.display(), %format, "Extracting document");
        let text = self.extract(path).await?;

        let modified = tokio::fs::metadata(path)
            .await
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Document {
            source_path: source_path_for(root, path),
            content_hash: compute_text_hash(&text),
            path: path.to_path_buf(),
            file_name,
            format,
            text,
            modified,
        })
    }
}

/// Stable, platform-independent identifier of `path` relative to `root`
pub fn source_path_for(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Check if content appears to be binary
pub fn is_binary_content(data: &[u8]) -> bool {
    let check_len = std::cmp::min(data.len(), 8192);
    data[..check_len].iter().any(|&b| b == 0)
}

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut last_was_whitespace = true;
    let mut newline_count = 0;

    for c in text.chars() {
        if c.is_whitespace() {
            if c == '\n' {
                newline_count += 1;
            }
            last_was_whitespace = true;
        } else {
            if last_was_whitespace && !result.is_empty() {
                if newline_count >= 2 {
                    result.push_str("\n\n");
                } else if newline_count == 1 {
                    result.push('\n');
                } else {
                    result.push(' ');
                }
            }
            newline_count = 0;
            result.push(c);
            last_was_whitespace = false;
        }
    }

    result.trim().to_string()
}
