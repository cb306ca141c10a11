//! ragdoll: retrieval-augmented question answering over a local document directory
//!
//! Write path: data directory → extract → chunk → embed → vector store.
//! Read path: question → embed → top-K retrieval → prompt → language model.

pub mod chunk;
pub mod commands;
pub mod config;
pub mod embed;
pub mod engine;
pub mod error;
pub mod extract;
pub mod generate;
pub mod http;
pub mod index;
pub mod retrieve;
pub mod store;
pub mod synthesize;

#[cfg(test)]
mod testing;

pub use engine::{global, Answer, QueryEngine, SharedEngine, SourceExcerpt};
pub use error::{Error, Result};
