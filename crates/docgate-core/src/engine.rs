//! Retrieval engine: chunked ingest and access-controlled search.
//!
//! The engine is constructed with an [`EmbeddingProvider`] and a
//! [`VectorIndex`] and holds no mutable state beyond them, so one instance
//! can serve concurrent queries.
//!
//! # Ingest
//!
//! 1. Chunk the unit text ([`chunk_text`]); zero chunks is a no-op.
//! 2. Embed all chunks in one batch and L2-normalize the vectors.
//! 3. Build one [`IndexedPoint`] per chunk with a [`stable_id`].
//! 4. Upsert every point in one index call.
//!
//! # Search
//!
//! 1. Embed and normalize the query.
//! 2. Build an [`AccessFilter`] from the caller's groups.
//! 3. Run a filtered k-NN search with `limit = top_k`.
//! 4. Shape each hit into a [`ScoredHit`].
//!
//! Embedding and index failures propagate unchanged; nothing is retried.

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::debug;

use crate::access::AccessFilter;
use crate::chunk::chunk_text;
use crate::embedding::{l2_normalize, EmbeddingProvider};
use crate::identity::stable_id;
use crate::index::{Distance, VectorIndex};
use crate::models::{Chunk, IndexedPoint, ScoredHit, UnitMetadata};

/// Engine tuning, decoupled from application config.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Target collection name.
    pub collection: String,
    /// Window length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive windows.
    pub chunk_overlap: usize,
    /// Default number of hits when the caller does not specify one.
    pub top_k: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            collection: "internal_docs".to_string(),
            chunk_size: 900,
            chunk_overlap: 150,
            top_k: 6,
        }
    }
}

pub struct RetrievalEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    settings: EngineSettings,
}

impl RetrievalEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            embedder,
            index,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Create the collection with the embedder's dimensionality if missing.
    ///
    /// Call once at startup; repeated calls are harmless.
    pub async fn bootstrap(&self) -> Result<()> {
        let dims = self.embedder.dims();
        if dims == 0 {
            bail!(
                "embedding provider '{}' reports zero dimensions",
                self.embedder.model_name()
            );
        }
        debug!(
            collection = %self.settings.collection,
            dims,
            "ensuring collection"
        );
        self.index
            .ensure_collection(&self.settings.collection, dims, Distance::Cosine)
            .await
    }

    /// Chunk, embed, and upsert one unit's text. Returns the number of points written.
    pub async fn upsert_chunked(
        &self,
        source: &str,
        text: &str,
        page_number: Option<u32>,
        meta: &UnitMetadata,
    ) -> Result<usize> {
        let chunks = chunk_text(text, self.settings.chunk_size, self.settings.chunk_overlap);
        if chunks.is_empty() {
            return Ok(0);
        }

        let vectors = self.embed_normalized(&chunks).await?;

        let points: Vec<IndexedPoint> = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (text, vector))| IndexedPoint {
                id: stable_id(source, page_number, i, &text),
                vector,
                payload: Chunk {
                    source: source.to_string(),
                    page_number,
                    chunk_index: i,
                    text,
                    doc_group: meta.doc_group.clone(),
                    mode: meta.mode,
                },
            })
            .collect();

        let count = points.len();
        self.index.upsert(&self.settings.collection, points).await?;
        Ok(count)
    }

    /// Nearest-neighbor search restricted to what `allowed_groups` may see.
    ///
    /// `top_k` of `None` or `Some(0)` falls back to the configured default.
    /// `allowed_groups` of `None` or an empty slice searches the whole
    /// collection; otherwise only public points and points in those groups
    /// are candidates.
    pub async fn search(
        &self,
        query: &str,
        top_k: Option<usize>,
        allowed_groups: Option<&[String]>,
    ) -> Result<Vec<ScoredHit>> {
        let limit = top_k.filter(|k| *k > 0).unwrap_or(self.settings.top_k);
        let query_vec = self
            .embed_normalized(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))?;

        let filter = AccessFilter::from_allowed_groups(allowed_groups);
        debug!(limit, restricted = !filter.is_unrestricted(), "searching index");

        let hits = self
            .index
            .search(&self.settings.collection, &query_vec, limit, &filter)
            .await?;

        Ok(hits
            .into_iter()
            .map(|h| ScoredHit::from_payload(h.score, h.payload))
            .collect())
    }

    async fn embed_normalized(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = self.embedder.embed(texts).await?;
        if vectors.len() != texts.len() {
            bail!(
                "embedding provider returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            );
        }
        for v in vectors.iter_mut() {
            l2_normalize(v);
        }
        Ok(vectors)
    }
}
