//! Ask command implementation

use crate::config::Config;
use crate::engine::{global, Answer};
use crate::error::Result;
use tracing::info;

/// Answer one question through the shared engine
pub async fn cmd_ask(config: &Config, question: &str) -> Result<Answer> {
    info!("Asking: {}", question);
    global().answer_question(config, question).await
}

/// Print an answer and its sources to console
pub fn print_answer(answer: &Answer) {
    println!("\n{}\n", answer.answer.trim());

    if answer.sources.is_empty() {
        return;
    }

    println!("Sources:");
    for (i, source) in answer.sources.iter().enumerate() {
        println!(
            "{}. {} (score: {:.3})",
            i + 1,
            source.source_file.as_deref().unwrap_or("unknown"),
            source.score
        );
        println!("   {}", source.text.replace('\n', " "));
    }
}
