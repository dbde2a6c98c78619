//! In-memory [`VectorIndex`] implementation for tests and small deployments.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Search is brute-force cosine similarity over every permitted point.
//! Ties keep insertion order, matching the "index order" tie-break of the
//! retrieval contract.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::access::AccessFilter;
use crate::embedding::cosine_similarity;
use crate::models::IndexedPoint;

use super::{Distance, IndexHit, VectorIndex};

struct Collection {
    dims: usize,
    points: Vec<IndexedPoint>,
    positions: HashMap<String, usize>,
}

/// In-memory vector index.
pub struct InMemoryIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Number of points in `collection` (0 if it does not exist).
    pub fn len(&self, collection: &str) -> usize {
        let collections = self.collections.read().unwrap();
        collections.get(collection).map(|c| c.points.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Hex ids of all points in insertion order.
    pub fn ids(&self, collection: &str) -> Vec<String> {
        let collections = self.collections.read().unwrap();
        collections
            .get(collection)
            .map(|c| c.points.iter().map(|p| p.id.to_hex()).collect())
            .unwrap_or_default()
    }

    /// Dimensionality of `collection`, if it exists.
    pub fn dims(&self, collection: &str) -> Option<usize> {
        let collections = self.collections.read().unwrap();
        collections.get(collection).map(|c| c.dims)
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn ensure_collection(&self, name: &str, dims: usize, _distance: Distance) -> Result<()> {
        let mut collections = self.collections.write().unwrap();
        collections.entry(name.to_string()).or_insert_with(|| Collection {
            dims,
            points: Vec::new(),
            positions: HashMap::new(),
        });
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<IndexedPoint>) -> Result<()> {
        let mut collections = self.collections.write().unwrap();
        let coll = match collections.get_mut(collection) {
            Some(c) => c,
            None => bail!("collection not found: {}", collection),
        };

        if let Some(bad) = points.iter().find(|p| p.vector.len() != coll.dims) {
            bail!(
                "vector dimension mismatch for point {}: expected {}, got {}",
                bad.id,
                coll.dims,
                bad.vector.len()
            );
        }

        for point in points {
            let key = point.id.to_hex();
            match coll.positions.get(&key) {
                Some(&pos) => coll.points[pos] = point,
                None => {
                    coll.positions.insert(key, coll.points.len());
                    coll.points.push(point);
                }
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
        filter: &AccessFilter,
    ) -> Result<Vec<IndexHit>> {
        let collections = self.collections.read().unwrap();
        let coll = match collections.get(collection) {
            Some(c) => c,
            None => bail!("collection not found: {}", collection),
        };

        let mut hits: Vec<IndexHit> = coll
            .points
            .iter()
            .filter(|p| filter.permits(p.payload.doc_group.as_deref()))
            .map(|p| IndexHit {
                id: p.id.to_hex(),
                score: cosine_similarity(query, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();

        // Stable sort: equal scores keep insertion order.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::stable_id;
    use crate::models::Chunk;

    fn point(source: &str, index: usize, group: Option<&str>, vector: Vec<f32>) -> IndexedPoint {
        let text = format!("{} chunk {}", source, index);
        IndexedPoint {
            id: stable_id(source, None, index, &text),
            vector,
            payload: Chunk {
                source: source.to_string(),
                page_number: None,
                chunk_index: index,
                text,
                doc_group: group.map(|g| g.to_string()),
                mode: None,
            },
        }
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_id() {
        let index = InMemoryIndex::new();
        index.ensure_collection("c", 2, Distance::Cosine).await.unwrap();
        index
            .upsert("c", vec![point("a", 0, None, vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .upsert("c", vec![point("a", 0, None, vec![0.0, 1.0])])
            .await
            .unwrap();
        assert_eq!(index.len("c"), 1);

        let hits = index
            .search("c", &[0.0, 1.0], 5, &AccessFilter::Unrestricted)
            .await
            .unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_ensure_collection_is_idempotent() {
        let index = InMemoryIndex::new();
        index.ensure_collection("c", 2, Distance::Cosine).await.unwrap();
        index
            .upsert("c", vec![point("a", 0, None, vec![1.0, 0.0])])
            .await
            .unwrap();
        index.ensure_collection("c", 2, Distance::Cosine).await.unwrap();
        assert_eq!(index.len("c"), 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let index = InMemoryIndex::new();
        index.ensure_collection("c", 3, Distance::Cosine).await.unwrap();
        let err = index
            .upsert("c", vec![point("a", 0, None, vec![1.0, 0.0])])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dimension mismatch"));
    }

    #[tokio::test]
    async fn test_missing_collection_errors() {
        let index = InMemoryIndex::new();
        assert!(index
            .search("nope", &[1.0], 1, &AccessFilter::Unrestricted)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_filter_applied_before_limit() {
        let index = InMemoryIndex::new();
        index.ensure_collection("c", 2, Distance::Cosine).await.unwrap();
        index
            .upsert(
                "c",
                vec![
                    point("secret1", 0, Some("FINANCE-READ"), vec![1.0, 0.0]),
                    point("secret2", 0, Some("FINANCE-READ"), vec![1.0, 0.01]),
                    point("ops", 0, Some("OPS-TEAM"), vec![0.5, 0.5]),
                    point("public", 0, None, vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let groups = vec!["OPS-TEAM".to_string()];
        let filter = AccessFilter::from_allowed_groups(Some(&groups));
        let hits = index.search("c", &[1.0, 0.0], 2, &filter).await.unwrap();
        let sources: Vec<&str> = hits.iter().map(|h| h.payload.source.as_str()).collect();
        assert_eq!(sources, vec!["ops", "public"]);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let index = InMemoryIndex::new();
        index.ensure_collection("c", 2, Distance::Cosine).await.unwrap();
        index
            .upsert(
                "c",
                vec![
                    point("first", 0, None, vec![1.0, 0.0]),
                    point("second", 0, None, vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();
        let hits = index
            .search("c", &[1.0, 0.0], 2, &AccessFilter::Unrestricted)
            .await
            .unwrap();
        assert_eq!(hits[0].payload.source, "first");
        assert_eq!(hits[1].payload.source, "second");
    }
}
