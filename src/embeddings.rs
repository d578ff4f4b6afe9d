use crate::document::content_hash;
use crate::error::{RagError, Result};
use crate::store::ByteStore;
use async_trait::async_trait;
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Representation of a vector embedding
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Embedding { values }
    }

    pub fn dimensions(&self) -> usize {
        self.values.len()
    }

    /// Little-endian `f32` encoding used by the cache
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.values.len() * 4);
        for value in &self.values {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 4 != 0 {
            return Err(RagError::CacheIo(format!(
                "cached embedding has {} bytes, not a whole number of f32 values",
                bytes.len()
            )));
        }
        let values = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Ok(Embedding { values })
    }
}

/// An embedding model
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input in input order
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Embed a search query
    async fn embed_query(&self, text: &str) -> Result<Embedding>;

    /// Identifier of the underlying model, part of every cache key
    fn model_id(&self) -> &str;
}

/// Wraps an embedder with a content-addressed store so that a chunk is only
/// ever sent to the model once per source.
pub struct CacheBackedEmbedder {
    underlying: Arc<dyn Embedder>,
    store: Arc<dyn ByteStore>,
    namespace: String,
}

impl CacheBackedEmbedder {
    /// `namespace` identifies the source, normally the document fingerprint
    pub fn new(
        underlying: Arc<dyn Embedder>,
        store: Arc<dyn ByteStore>,
        namespace: impl Into<String>,
    ) -> Self {
        CacheBackedEmbedder {
            underlying,
            store,
            namespace: namespace.into(),
        }
    }

    /// Cache key of a chunk: hash of model, source and content
    pub fn key_for(&self, text: &str) -> String {
        content_hash(&[
            self.underlying.model_id().as_bytes(),
            self.namespace.as_bytes(),
            text.as_bytes(),
        ])
    }
}

#[async_trait]
impl Embedder for CacheBackedEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let keys: Vec<String> = texts.iter().map(|text| self.key_for(text)).collect();

        let mut vectors = self
            .store
            .mget(&keys)?
            .into_iter()
            .map(|bytes| bytes.map(|b| Embedding::from_bytes(&b)).transpose())
            .collect::<Result<Vec<Option<Embedding>>>>()?;

        // First position of every distinct key that has no stored vector
        let mut seen = HashSet::new();
        let missing: Vec<usize> = vectors
            .iter()
            .enumerate()
            .filter(|(i, vector)| vector.is_none() && seen.insert(keys[*i].as_str()))
            .map(|(i, _)| i)
            .collect();

        info!(
            "Embedding cache for {}: {} hits, {} to compute",
            self.namespace,
            texts.len() - vectors.iter().filter(|v| v.is_none()).count(),
            missing.len()
        );

        if !missing.is_empty() {
            let pending: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let computed = self.underlying.embed_documents(&pending).await?;

            if computed.len() != pending.len() {
                return Err(RagError::Embedding(format!(
                    "Mismatch between request and response counts: {} vs {}",
                    pending.len(),
                    computed.len()
                )));
            }

            let entries: Vec<(String, Vec<u8>)> = missing
                .iter()
                .zip(&computed)
                .map(|(&i, embedding)| (keys[i].clone(), embedding.to_bytes()))
                .collect();
            self.store.mset(&entries)?;

            let by_key: HashMap<&str, &Embedding> = missing
                .iter()
                .zip(&computed)
                .map(|(&i, embedding)| (keys[i].as_str(), embedding))
                .collect();

            for (vector, key) in vectors.iter_mut().zip(&keys) {
                if vector.is_none() {
                    *vector = by_key.get(key.as_str()).map(|e| (*e).clone());
                }
            }
        }

        debug!("Resolved {} embeddings", vectors.len());

        vectors
            .into_iter()
            .map(|vector| {
                vector.ok_or_else(|| RagError::Embedding("missing embedding for chunk".to_string()))
            })
            .collect()
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        self.underlying.embed_query(text).await
    }

    fn model_id(&self) -> &str {
        self.underlying.model_id()
    }
}
