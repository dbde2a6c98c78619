//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the seam between the retrieval engine and
//! a concrete vector store (Qdrant over REST in the app crate, or the
//! in-memory backend in [`memory`]).
//!
//! Access filters are evaluated **inside** the index query, before ranking
//! and limiting, so forbidden points never consume a `limit` slot.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::access::AccessFilter;
use crate::models::{Chunk, IndexedPoint};

/// Distance metric of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    Cosine,
}

impl Distance {
    /// Name used by Qdrant's collection API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Distance::Cosine => "Cosine",
        }
    }
}

/// A single nearest-neighbor hit.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    /// Store-native id rendering.
    pub id: String,
    pub score: f32,
    pub payload: Chunk,
}

/// Abstract vector store holding one or more named collections.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_collection`](VectorIndex::ensure_collection) | Create the collection if missing (idempotent) |
/// | [`upsert`](VectorIndex::upsert) | Insert or overwrite points by id |
/// | [`search`](VectorIndex::search) | Filtered k-nearest-neighbor search |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create `name` with the given dimensionality and metric if it does not exist.
    async fn ensure_collection(&self, name: &str, dims: usize, distance: Distance) -> Result<()>;

    /// Write all points in one call. Existing points with the same id are replaced.
    async fn upsert(&self, collection: &str, points: Vec<IndexedPoint>) -> Result<()>;

    /// Return up to `limit` hits ordered by descending score.
    ///
    /// Points rejected by `filter` are excluded before ranking.
    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
        filter: &AccessFilter,
    ) -> Result<Vec<IndexHit>>;
}
