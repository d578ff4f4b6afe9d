use crate::embeddings::{Embedder, Embedding};
use crate::error::{RagError, Result};
use crate::llm::{generation_error, ChatModel, TokenStream};
use crate::prompt::{Prompt, PromptRole};
use async_trait::async_trait;
use futures::StreamExt;
use log::debug;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::models::ModelOptions;
use ollama_rs::Ollama;
use serde::{Deserialize, Serialize};

/// Port Ollama listens on when the URL names none
const DEFAULT_PORT: u16 = 11434;

/// Configuration for a local Ollama server
#[derive(Debug, Clone, PartialEq)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
}

/// Client for the Ollama chat and embedding API
#[derive(Clone)]
pub struct OllamaClient {
    config: OllamaConfig,
    model_id: String,
    client: reqwest::Client,
    chat: Ollama,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let chat = chat_client(&config.base_url)?;
        let model_id = format!("ollama/{}", config.model);
        Ok(OllamaClient {
            config,
            model_id,
            client: reqwest::Client::new(),
            chat,
        })
    }

    /// Get the client configuration
    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

fn chat_client(base_url: &str) -> Result<Ollama> {
    let url = reqwest::Url::parse(base_url)
        .map_err(|e| RagError::Config(format!("Invalid Ollama URL {}: {}", base_url, e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| RagError::Config(format!("Ollama URL has no host: {}", base_url)))?;

    Ok(Ollama::new(
        format!("{}://{}", url.scheme(), host),
        url.port().unwrap_or(DEFAULT_PORT),
    ))
}

#[async_trait]
impl Embedder for OllamaClient {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: &self.config.model,
            input: texts,
        };

        debug!("Requesting {} embeddings from {}", texts.len(), self.config.model);

        let response = self
            .client
            .post(self.url("/api/embed"))
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("Ollama request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::Embedding(format!(
                "API request failed: {} {}",
                status, error_text
            )));
        }

        let response_data: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("Malformed embedding response: {}", e)))?;

        if response_data.embeddings.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response_data.embeddings.len()
            )));
        }

        Ok(response_data
            .embeddings
            .into_iter()
            .map(Embedding::new)
            .collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        self.embed_documents(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| RagError::Embedding("No embedding returned".to_string()))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn stream(&self, prompt: &Prompt) -> Result<TokenStream> {
        let messages = prompt
            .messages
            .iter()
            .map(|message| match message.role {
                PromptRole::System => ChatMessage::system(message.content.clone()),
                PromptRole::User => ChatMessage::user(message.content.clone()),
            })
            .collect();
        let request = ChatMessageRequest::new(self.config.model.clone(), messages)
            .options(ModelOptions::default().temperature(self.config.temperature));

        let mut response = self
            .chat
            .send_chat_messages_stream(request)
            .await
            .map_err(|e| generation_error("Ollama request failed", e))?;

        // The last chunk of a complete answer is flagged `done`
        let tokens = async_stream::stream! {
            let mut done = false;

            while let Some(chunk) = response.next().await {
                match chunk {
                    Ok(chunk) => {
                        if !chunk.message.content.is_empty() {
                            yield Ok(chunk.message.content);
                        }
                        if chunk.done {
                            done = true;
                            break;
                        }
                    }
                    Err(_) => {
                        yield Err(RagError::Generation(
                            "Ollama returned an unreadable stream chunk".to_string(),
                        ));
                        return;
                    }
                }
            }

            if !done {
                yield Err(RagError::Generation(
                    "Stream ended before the model finished".to_string(),
                ));
            }
        };

        Ok(Box::pin(tokens))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize, Debug)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}
