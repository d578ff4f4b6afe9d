pub mod chunking;
pub mod config;
pub mod document;
pub mod embeddings;
pub mod error;
pub mod history;
pub mod index;
pub mod llm;
pub mod ollama;
pub mod openai;
pub mod prompt;
pub mod quiz;
pub mod rag;
pub mod store;
pub mod wikipedia;

pub use error::{RagError, Result};
