//! Word document extraction
//!
//! A `.docx` file is a zip container; the body lives in `word/document.xml`
//! as runs of `<w:t>` text grouped into `<w:p>` paragraphs.

use super::{DocumentFormat, TextExtractor};
use crate::error::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::OnceLock;

const DOCUMENT_XML: &str = "word/document.xml";

/// Extracts paragraph text from `.docx` files
pub struct DocxExtractor;

#[async_trait]
impl TextExtractor for DocxExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    async fn extract(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::extraction(path, e.to_string()))?;

        let xml = tokio::task::spawn_blocking(move || read_document_xml(bytes))
            .await
            .map_err(|e| Error::extraction(path, format!("task join error: {}", e)))?
            .map_err(|message| Error::extraction(path, message))?;

        Ok(docx_xml_to_text(&xml))
    }
}

fn read_document_xml(bytes: Vec<u8>) -> std::result::Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("invalid docx container: {}", e))?;
    let mut entry = archive
        .by_name(DOCUMENT_XML)
        .map_err(|e| format!("missing {}: {}", DOCUMENT_XML, e))?;

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| format!("unreadable {}: {}", DOCUMENT_XML, e))?;
    Ok(xml)
}

fn token_regex() -> &'static Regex {
    static TOKENS: OnceLock<Regex> = OnceLock::new();
    TOKENS.get_or_init(|| {
        Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:tab(?:\s[^>]*)?/>|<w:br(?:\s[^>]*)?/>|</w:p>")
            .expect("static regex is valid")
    })
}

/// Flatten WordprocessingML into text: one line per paragraph
pub fn docx_xml_to_text(xml: &str) -> String {
    let mut out = String::new();

    for caps in token_regex().captures_iter(xml) {
        if let Some(text) = caps.get(1) {
            out.push_str(&unescape_xml(text.as_str()));
            continue;
        }
        let token = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        if token.starts_with("<w:tab") {
            out.push('\t');
        } else {
            out.push('\n');
        }
    }

    out.trim_end().to_string()
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
