//! Markdown extraction

use super::{DocumentFormat, TextExtractor};
use crate::error::{Error, Result};
use async_trait::async_trait;
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use std::path::Path;

/// Renders Markdown to plain text, dropping markup
pub struct MarkdownExtractor;

#[async_trait]
impl TextExtractor for MarkdownExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Markdown
    }

    async fn extract(&self, path: &Path) -> Result<String> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::extraction(path, e.to_string()))?;
        Ok(markdown_to_text(&content))
    }
}

/// Convert Markdown source to text blocks separated by blank lines
pub fn markdown_to_text(content: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let mut blocks: Vec<String> = Vec::new();
    let mut current = String::new();

    for event in Parser::new_ext(content, options) {
        match event {
            Event::Text(text) | Event::Code(text) => current.push_str(&text),
            Event::SoftBreak => current.push(' '),
            Event::HardBreak => current.push('\n'),
            // Nested lists: the parent item's text ends where the child starts
            Event::Start(Tag::Item) => flush_block(&mut blocks, &mut current),
            Event::End(TagEnd::TableCell) => current.push('\t'),
            Event::End(
                TagEnd::Heading(_)
                | TagEnd::Paragraph
                | TagEnd::Item
                | TagEnd::CodeBlock
                | TagEnd::TableHead
                | TagEnd::TableRow,
            ) => flush_block(&mut blocks, &mut current),
            _ => {}
        }
    }
    flush_block(&mut blocks, &mut current);

    blocks.join("\n\n")
}

fn flush_block(blocks: &mut Vec<String>, current: &mut String) {
    let block = current.trim_end();
    if !block.trim().is_empty() {
        blocks.push(block.to_string());
    }
    current.clear();
}
