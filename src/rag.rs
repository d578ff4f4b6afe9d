use crate::chunking::{default_tokenizer, split_into_chunks, ChunkingConfig, Tokenizer};
use crate::config::Config;
use crate::document::Document;
use crate::embeddings::{CacheBackedEmbedder, Embedder};
use crate::error::{RagError, Result};
use crate::history::{ConversationHistory, Role};
use crate::index::{Retriever, VectorIndex};
use crate::llm::{relay, ChatModel, TokenSink};
use crate::prompt::{answer_prompt, format_docs};
use crate::store::LocalFileStore;
use log::info;
use std::sync::Arc;

/// The document a session is currently answering questions about
pub struct ActiveDocument {
    pub document_id: String,
    pub fingerprint: String,
    pub retriever: Retriever,
}

/// One user's chat over one document at a time.
///
/// Loading a different document replaces the index and clears the history.
pub struct ChatSession {
    config: Config,
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn ChatModel>,
    tokenizer: Box<dyn Tokenizer>,
    active: Option<ActiveDocument>,
    history: ConversationHistory,
}

impl ChatSession {
    /// Create a new session
    pub fn new(config: &Config, embedder: Arc<dyn Embedder>, model: Arc<dyn ChatModel>) -> Self {
        ChatSession {
            config: config.clone(),
            embedder,
            model,
            tokenizer: default_tokenizer(),
            active: None,
            history: ConversationHistory::new(),
        }
    }

    pub fn with_tokenizer(mut self, tokenizer: Box<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn active_document(&self) -> Option<&ActiveDocument> {
        self.active.as_ref()
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Chunk, embed and index a document, making it the active one.
    ///
    /// Loading the document that is already active is a no-op. On failure
    /// the previously active document and history are left untouched.
    pub async fn load(&mut self, document: &Document) -> Result<()> {
        if let Some(active) = &self.active {
            if active.fingerprint == document.fingerprint {
                info!("Using existing index for {}", document.document_id);
                return Ok(());
            }
        }

        let store = Arc::new(LocalFileStore::new(
            self.config.embeddings_dir(&document.fingerprint),
        ));
        let cached: Arc<dyn Embedder> = Arc::new(CacheBackedEmbedder::new(
            self.embedder.clone(),
            store,
            document.fingerprint.clone(),
        ));

        let index = build_index(
            document,
            &self.config.chunking,
            self.tokenizer.as_ref(),
            cached.as_ref(),
        )
        .await?;

        self.active = Some(ActiveDocument {
            document_id: document.document_id.clone(),
            fingerprint: document.fingerprint.clone(),
            retriever: Retriever::new(Arc::new(index), cached, self.config.retriever_k),
        });
        self.history.clear();

        info!("Ready to answer questions about {}", document.document_id);
        Ok(())
    }

    /// Forget the active document and its conversation
    pub fn unload(&mut self) {
        self.active = None;
        self.history.clear();
    }

    /// Answer a question about the active document, streaming the answer
    /// into `sink`. The answer is recorded only if generation completes.
    pub async fn ask(&mut self, question: &str, sink: &mut dyn TokenSink) -> Result<String> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| RagError::Load("No document loaded".to_string()))?;

        self.history.append(question, Role::Human);

        let chunks = active.retriever.retrieve(question).await?;
        let prompt = answer_prompt(&format_docs(&chunks), question);

        let stream = self.model.stream(&prompt).await?;
        let answer = relay(stream, sink).await?;

        self.history.append(answer.clone(), Role::Ai);
        Ok(answer)
    }
}

/// Build phase of the pipeline: chunk, embed (through the cache) and index
pub async fn build_index(
    document: &Document,
    chunking: &ChunkingConfig,
    tokenizer: &dyn Tokenizer,
    embedder: &dyn Embedder,
) -> Result<VectorIndex> {
    let chunks = split_into_chunks(&document.content, &document.document_id, chunking, tokenizer)?;
    info!("Split {} into {} chunks", document.document_id, chunks.len());

    let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
    let vectors = embedder.embed_documents(&texts).await?;

    VectorIndex::build(chunks, vectors)
}
