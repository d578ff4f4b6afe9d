use crate::embeddings::{Embedder, Embedding};
use crate::error::{RagError, Result};
use crate::llm::{generation_error, ChatModel, TokenStream};
use crate::prompt::{Prompt, PromptRole};
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use futures::StreamExt;
use log::debug;
use serde::{Deserialize, Serialize};

/// Configuration for an OpenAI-compatible API
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
}

/// Client for OpenAI-compatible chat completions and embeddings
#[derive(Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    model_id: String,
    client: reqwest::Client,
    chat: Client<OpenAIConfig>,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Self {
        let chat = Client::with_config(
            OpenAIConfig::new()
                .with_api_key(config.api_key.clone())
                .with_api_base(config.base_url.trim_end_matches('/').to_string()),
        );
        let model_id = format!("openai/{}", config.model);
        OpenAiClient {
            config,
            model_id,
            client: reqwest::Client::new(),
            chat,
        }
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(self.url(path))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Requesting {} embeddings from {}", texts.len(), self.config.model);

        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        };
        let response = self
            .post("/embeddings", &request)
            .await
            .map_err(|e| RagError::Embedding(format!("OpenAI request failed: {}", e)))?;

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

        let mut response_data: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("Malformed embedding response: {}", e)))?;

        if response_data.data.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response_data.data.len()
            )));
        }

        response_data.data.sort_by_key(|item| item.index);
        Ok(response_data
            .data
            .into_iter()
            .map(|item| Embedding::new(item.embedding))
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
impl ChatModel for OpenAiClient {
    async fn stream(&self, prompt: &Prompt) -> Result<TokenStream> {
        let messages: Vec<ChatCompletionRequestMessage> = prompt
            .messages
            .iter()
            .map(|message| match message.role {
                PromptRole::System => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessage::from(message.content.clone()),
                ),
                PromptRole::User => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessage::from(message.content.clone()),
                ),
            })
            .collect();

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.model)
            .messages(messages)
            .temperature(self.config.temperature)
            .build()
            .map_err(|e| generation_error("Failed to build request", e))?;

        let mut response = self
            .chat
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| generation_error("OpenAI request failed", e))?;

        // A complete answer ends with a choice carrying a finish reason
        let tokens = async_stream::stream! {
            let mut finished = false;

            while let Some(chunk) = response.next().await {
                match chunk {
                    Ok(chunk) => {
                        for choice in chunk.choices {
                            if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                                yield Ok(content);
                            }
                            if choice.finish_reason.is_some() {
                                finished = true;
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(generation_error("OpenAI stream failed", e));
                        return;
                    }
                }
            }

            if !finished {
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
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}
