//! PDF extraction via pdf-extract

use super::{normalize_whitespace, DocumentFormat, TextExtractor};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// Extracts the text layer of PDF files
pub struct PdfExtractor;

#[async_trait]
impl TextExtractor for PdfExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    async fn extract(&self, path: &Path) -> Result<String> {
        debug!("Extracting PDF: {:?}", path);

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::extraction(path, e.to_string()))?;

        // pdf-extract is synchronous and may panic on malformed input
        let text = tokio::task::spawn_blocking(move || {
            std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes))
        })
        .await
        .map_err(|e| Error::extraction(path, format!("task join error: {}", e)))?
        .map_err(|_| Error::extraction(path, "PDF parser panicked"))?
        .map_err(|e| Error::extraction(path, e.to_string()))?;

        Ok(normalize_whitespace(&text))
    }
}
