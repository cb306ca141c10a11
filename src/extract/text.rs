//! Plain text extraction

use super::{is_binary_content, DocumentFormat, TextExtractor};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::Path;

/// Reads `.txt` files as-is
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::PlainText
    }

    async fn extract(&self, path: &Path) -> Result<String> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| Error::extraction(path, e.to_string()))?;

        if is_binary_content(&content) {
            return Err(Error::extraction(path, "binary content in text file"));
        }

        Ok(String::from_utf8_lossy(&content).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_text_is_returned_verbatim() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        std::fs::write(&path, "Line one\n\n  Line two  ").unwrap();

        let text = PlainTextExtractor.extract(&path).await.unwrap();
        assert_eq!(text, "Line one\n\n  Line two  ");
    }

    #[tokio::test]
    async fn test_binary_text_file_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.txt");
        std::fs::write(&path, [b'a', 0, b'b']).unwrap();

        let err = PlainTextExtractor.extract(&path).await.unwrap_err();
        assert!(matches!(err, Error::Extraction { ref path, .. } if path.ends_with("bad.txt")));
    }
}
