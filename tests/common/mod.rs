#![allow(dead_code)]

use async_trait::async_trait;
use file_gpt::config::Config;
use file_gpt::embeddings::{Embedder, Embedding};
use file_gpt::llm::{ChatModel, TokenSink, TokenStream};
use file_gpt::prompt::Prompt;
use file_gpt::{RagError, Result};
use futures::stream;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Embeds text as letter frequencies and records every text it embeds
#[derive(Default)]
pub struct CountingEmbedder {
    pub batch_calls: AtomicUsize,
    pub embedded: Mutex<Vec<String>>,
    /// Batch calls after this many succeed with an error
    pub working_batches: Option<usize>,
}

impl CountingEmbedder {
    pub fn failing_after(working_batches: usize) -> Self {
        CountingEmbedder {
            working_batches: Some(working_batches),
            ..Self::default()
        }
    }

    pub fn embedded_texts(&self) -> Vec<String> {
        self.embedded.lock().unwrap().clone()
    }
}

pub fn letter_vector(text: &str) -> Embedding {
    let mut values = vec![0.0f32; 27];
    for c in text.chars().flat_map(|c| c.to_lowercase()) {
        match c {
            'a'..='z' => values[(c as u8 - b'a') as usize] += 1.0,
            '0'..='9' => values[26] += 1.0,
            _ => {}
        }
    }
    Embedding::new(values)
}

#[async_trait]
impl Embedder for CountingEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let previous_calls = self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.working_batches.is_some_and(|n| previous_calls >= n) {
            return Err(RagError::Embedding("model unreachable".to_string()));
        }
        self.embedded.lock().unwrap().extend(texts.iter().cloned());
        Ok(texts.iter().map(|t| letter_vector(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        Ok(letter_vector(text))
    }

    fn model_id(&self) -> &str {
        "counting"
    }
}

/// Replays fixed tokens, optionally failing after a number of them
pub struct ScriptedModel {
    pub tokens: Vec<String>,
    pub fail_after: Option<usize>,
    pub prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedModel {
    pub fn new(tokens: &[&str]) -> Self {
        ScriptedModel {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            fail_after: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_after(tokens: &[&str], fail_after: usize) -> Self {
        ScriptedModel {
            fail_after: Some(fail_after),
            ..Self::new(tokens)
        }
    }

    pub fn last_prompt(&self) -> Option<Prompt> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn stream(&self, prompt: &Prompt) -> Result<TokenStream> {
        self.prompts.lock().unwrap().push(prompt.clone());

        let mut items: Vec<Result<String>> = self.tokens.iter().cloned().map(Ok).collect();
        if let Some(n) = self.fail_after {
            items.truncate(n);
            items.push(Err(RagError::Generation("connection reset".to_string())));
        }
        Ok(Box::pin(stream::iter(items)))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Collects streamed tokens
#[derive(Default)]
pub struct CollectingSink {
    pub tokens: Vec<String>,
}

impl TokenSink for CollectingSink {
    fn on_token(&mut self, token: &str) -> Result<()> {
        self.tokens.push(token.to_string());
        Ok(())
    }
}

/// Default configuration with the cache rooted in `cache_dir`
pub fn test_config(cache_dir: &Path) -> Config {
    let cache_dir = cache_dir.to_string_lossy().to_string();
    Config::from_lookup(|key| match key {
        "CACHE_DIR" => Some(cache_dir.clone()),
        "CHUNK_SIZE" => Some("20".to_string()),
        "CHUNK_OVERLAP" => Some("5".to_string()),
        "RETRIEVER_K" => Some("2".to_string()),
        _ => None,
    })
    .unwrap()
}
