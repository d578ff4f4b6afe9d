use crate::chunking::TextChunk;
use crate::embeddings::{Embedder, Embedding};
use crate::error::{RagError, Result};
use log::debug;
use std::sync::Arc;

/// Default number of chunks handed to the prompt
pub const DEFAULT_TOP_K: usize = 4;

/// In-memory nearest-neighbor index over the chunks of one document.
///
/// Immutable once built; a new document gets a new index.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    chunks: Vec<TextChunk>,
    vectors: Vec<Embedding>,
}

/// A chunk returned from a search with its squared Euclidean distance
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: TextChunk,
    pub distance: f32,
}

impl VectorIndex {
    pub fn build(chunks: Vec<TextChunk>, vectors: Vec<Embedding>) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(RagError::Index(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        if let Some(first) = vectors.first() {
            let dimensions = first.dimensions();
            if let Some(bad) = vectors.iter().find(|v| v.dimensions() != dimensions) {
                return Err(RagError::Index(format!(
                    "inconsistent vector dimensions: {} and {}",
                    dimensions,
                    bad.dimensions()
                )));
            }
        }

        debug!("Built vector index over {} chunks", chunks.len());
        Ok(VectorIndex { chunks, vectors })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[TextChunk] {
        &self.chunks
    }

    /// The `k` nearest chunks to `query`, nearest first. Equal distances keep
    /// the original chunk order.
    pub fn search(&self, query: &Embedding, k: usize) -> Result<Vec<ScoredChunk>> {
        if let Some(first) = self.vectors.first() {
            if first.dimensions() != query.dimensions() {
                return Err(RagError::Index(format!(
                    "query has {} dimensions, index has {}",
                    query.dimensions(),
                    first.dimensions()
                )));
            }
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, vector)| (i, squared_distance(&vector.values, &query.values)))
            .collect();

        // Stable sort keeps index order for ties
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, distance)| ScoredChunk {
                chunk: self.chunks[i].clone(),
                distance,
            })
            .collect())
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Embeds a question and looks up the most similar chunks
#[derive(Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    k: usize,
}

impl Retriever {
    /// `embedder` must be the one the index vectors were produced with
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>, k: usize) -> Self {
        Retriever { index, embedder, k }
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<TextChunk>> {
        let query_embedding = self.embedder.embed_query(query).await?;
        let results = self.index.search(&query_embedding, self.k)?;
        debug!("Retrieved {} chunks for query", results.len());
        Ok(results.into_iter().map(|scored| scored.chunk).collect())
    }
}
