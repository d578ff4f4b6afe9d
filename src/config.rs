use crate::chunking::ChunkingConfig;
use crate::embeddings::Embedder;
use crate::error::{RagError, Result};
use crate::index::DEFAULT_TOP_K;
use crate::llm::ChatModel;
use crate::ollama::{OllamaClient, OllamaConfig};
use crate::openai::{OpenAiClient, OpenAiConfig};
use crate::wikipedia::WikipediaConfig;
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Which API serves a model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Ollama,
    OpenAi,
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Provider::Ollama),
            "openai" => Ok(Provider::OpenAi),
            other => Err(format!("unknown provider '{}', expected ollama or openai", other)),
        }
    }
}

/// A model served by a provider
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub provider: Provider,
    pub model: String,
    pub temperature: f32,
}

/// Application configuration, read from the environment
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub cache_dir: PathBuf,
    pub chunking: ChunkingConfig,
    pub retriever_k: usize,
    pub ollama_url: String,
    pub openai_base_url: String,
    pub openai_api_key: Option<String>,
    pub embedding: ModelConfig,
    pub chat: ModelConfig,
    pub quiz: ModelConfig,
    pub wikipedia: WikipediaConfig,
}

impl Config {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let chunking = ChunkingConfig {
            separator: unescape(&get("CHUNK_SEPARATOR", "\n")),
            chunk_size: parse(&lookup, "CHUNK_SIZE", 600)?,
            chunk_overlap: parse(&lookup, "CHUNK_OVERLAP", 100)?,
        };
        chunking.validate()?;

        let retriever_k = parse(&lookup, "RETRIEVER_K", DEFAULT_TOP_K)?;
        if retriever_k == 0 {
            return Err(RagError::Config("RETRIEVER_K must be positive".to_string()));
        }

        let config = Config {
            cache_dir: PathBuf::from(get("CACHE_DIR", "./.cache")),
            chunking,
            retriever_k,
            ollama_url: get("OLLAMA_URL", "http://localhost:11434"),
            openai_base_url: get("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            openai_api_key: lookup("OPENAI_API_KEY").filter(|key| !key.is_empty()),
            embedding: ModelConfig {
                provider: parse(&lookup, "EMBEDDING_PROVIDER", Provider::Ollama)?,
                model: get("EMBEDDING_MODEL", "mistral:latest"),
                temperature: 0.0,
            },
            chat: ModelConfig {
                provider: parse(&lookup, "CHAT_PROVIDER", Provider::Ollama)?,
                model: get("CHAT_MODEL", "mistral:latest"),
                temperature: parse(&lookup, "CHAT_TEMPERATURE", 0.1)?,
            },
            quiz: ModelConfig {
                provider: parse(&lookup, "QUIZ_PROVIDER", Provider::OpenAi)?,
                model: get("QUIZ_MODEL", "gpt-3.5-turbo-1106"),
                temperature: parse(&lookup, "QUIZ_TEMPERATURE", 0.1)?,
            },
            wikipedia: WikipediaConfig {
                base_url: get("WIKIPEDIA_URL", "https://en.wikipedia.org/w/api.php"),
                top_k_results: parse(&lookup, "WIKIPEDIA_TOP_K", 5)?,
            },
        };

        Ok(config)
    }

    /// Directory holding the cached embeddings of one document
    pub fn embeddings_dir(&self, fingerprint: &str) -> PathBuf {
        self.cache_dir.join("embeddings").join(fingerprint)
    }

    /// The embedding model shared by indexing and retrieval
    pub fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        let embedder: Arc<dyn Embedder> = match self.embedding.provider {
            Provider::Ollama => {
                Arc::new(OllamaClient::new(self.ollama_config(&self.embedding))?)
            }
            Provider::OpenAi => {
                Arc::new(OpenAiClient::new(self.openai_config(&self.embedding)?))
            }
        };
        Ok(embedder)
    }

    pub fn chat_model(&self, model: &ModelConfig) -> Result<Arc<dyn ChatModel>> {
        let chat_model: Arc<dyn ChatModel> = match model.provider {
            Provider::Ollama => Arc::new(OllamaClient::new(self.ollama_config(model))?),
            Provider::OpenAi => Arc::new(OpenAiClient::new(self.openai_config(model)?)),
        };
        Ok(chat_model)
    }

    fn ollama_config(&self, model: &ModelConfig) -> OllamaConfig {
        OllamaConfig {
            base_url: self.ollama_url.clone(),
            model: model.model.clone(),
            temperature: model.temperature,
        }
    }

    fn openai_config(&self, model: &ModelConfig) -> Result<OpenAiConfig> {
        let api_key = self.openai_api_key.clone().ok_or_else(|| {
            RagError::Config(format!(
                "OPENAI_API_KEY is required for the OpenAI model {}",
                model.model
            ))
        })?;

        Ok(OpenAiConfig {
            base_url: self.openai_base_url.clone(),
            api_key,
            model: model.model.clone(),
            temperature: model.temperature,
        })
    }
}

fn parse<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| RagError::Config(format!("invalid {}={:?}: {}", key, value, e))),
        None => Ok(default),
    }
}

/// Allow `\n` and `\t` escapes in separator settings
fn unescape(value: &str) -> String {
    value.replace("\\n", "\n").replace("\\t", "\t")
}
