use crate::chunking::{default_tokenizer, split_into_chunks, ChunkingConfig, TextChunk, Tokenizer};
use crate::document::Document;
use crate::error::{RagError, Result};
use crate::llm::{relay, ChatModel, TokenSink};
use crate::prompt::{format_docs, quiz_prompt};
use log::info;
use std::sync::Arc;

/// Turns documents into a multiple-choice quiz
pub struct QuizGenerator {
    model: Arc<dyn ChatModel>,
    chunking: ChunkingConfig,
    tokenizer: Box<dyn Tokenizer>,
}

impl QuizGenerator {
    pub fn new(model: Arc<dyn ChatModel>, chunking: ChunkingConfig) -> Self {
        QuizGenerator {
            model,
            chunking,
            tokenizer: default_tokenizer(),
        }
    }

    pub fn with_tokenizer(mut self, tokenizer: Box<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Split an uploaded file the same way the chat pipeline does
    pub fn file_chunks(&self, document: &Document) -> Result<Vec<TextChunk>> {
        split_into_chunks(
            &document.content,
            &document.document_id,
            &self.chunking,
            self.tokenizer.as_ref(),
        )
    }

    /// Whole articles, one chunk each, as returned by the encyclopedia loader
    pub fn article_chunks(&self, documents: &[Document]) -> Vec<TextChunk> {
        documents
            .iter()
            .enumerate()
            .map(|(index, document)| TextChunk {
                text: document.content.clone(),
                token_count: self.tokenizer.tokenize(&document.content).len(),
                document_id: document.document_id.clone(),
                index,
                start_position: 0,
            })
            .collect()
    }

    /// Stream a quiz built from all the given chunks into `sink`
    pub async fn generate(&self, chunks: &[TextChunk], sink: &mut dyn TokenSink) -> Result<String> {
        if chunks.is_empty() {
            return Err(RagError::Load("Nothing to build a quiz from".to_string()));
        }

        info!(
            "Generating quiz from {} chunks with {}",
            chunks.len(),
            self.model.model_name()
        );

        let prompt = quiz_prompt(&format_docs(chunks));
        let stream = self.model.stream(&prompt).await?;
        relay(stream, sink).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::WordTokenizer;
    use crate::llm::{NullSink, TokenStream};
    use crate::prompt::Prompt;
    use async_trait::async_trait;

    struct SilentModel;

    #[async_trait]
    impl ChatModel for SilentModel {
        async fn stream(&self, _prompt: &Prompt) -> Result<TokenStream> {
            Ok(Box::pin(futures::stream::empty()))
        }

        fn model_name(&self) -> &str {
            "silent"
        }
    }

    #[test]
    fn test_article_chunks() {
        let generator = QuizGenerator::new(Arc::new(SilentModel), ChunkingConfig::default())
            .with_tokenizer(Box::new(WordTokenizer));
        let docs = vec![Document::new("Sky", "The sky is blue."), Document::new("Sea", "Salty.")];
        let chunks = generator.article_chunks(&docs);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].document_id, "Sea");
        assert_eq!(chunks[1].index, 1);
        assert_eq!(chunks[0].token_count, 5);
    }

    #[tokio::test]
    async fn test_empty_source_is_rejected() {
        let generator = QuizGenerator::new(Arc::new(SilentModel), ChunkingConfig::default());
        let result = generator.generate(&[], &mut NullSink).await;
        assert!(matches!(result, Err(RagError::Load(_))));
    }
}
