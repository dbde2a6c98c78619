//! Qdrant REST implementation of [`VectorIndex`].
//!
//! Points are addressed by the UUID projection of their SHA-1 chunk id
//! (Qdrant accepts only unsigned integers or UUIDs). Access filters become
//! a Qdrant `should` clause: `doc_group` matches any allowed group, or
//! `doc_group` is empty (absent or null).

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use docgate_core::access::AccessFilter;
use docgate_core::index::{Distance, IndexHit, VectorIndex};
use docgate_core::models::{Chunk, IndexedPoint};

use crate::config::IndexConfig;

pub struct QdrantIndex {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct QdrantPoint<'a> {
    id: String,
    vector: &'a [f32],
    payload: &'a Chunk,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<SearchEntry>,
}

#[derive(Deserialize)]
struct SearchEntry {
    id: serde_json::Value,
    score: f32,
    payload: Option<Chunk>,
}

impl QdrantIndex {
    pub fn new(url: &str, api_key: Option<&str>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: url.trim_end_matches('/').to_string(),
            api_key: api_key.map(|s| s.to_string()),
        })
    }

    pub fn from_config(config: &IndexConfig) -> Result<Self> {
        Self::new(
            &config.url,
            config.api_key.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.api_key {
            headers.insert(
                HeaderName::from_static("api-key"),
                HeaderValue::from_str(key).context("invalid Qdrant API key")?,
            );
        }
        Ok(headers)
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/collections/{}", self.base_url, collection)
    }
}

/// Qdrant filter for an [`AccessFilter`]; `None` when unrestricted.
pub fn filter_json(filter: &AccessFilter) -> Option<serde_json::Value> {
    match filter {
        AccessFilter::Unrestricted => None,
        AccessFilter::GroupsOrPublic(groups) => Some(json!({
            "should": [
                {"key": "doc_group", "match": {"any": groups}},
                {"is_empty": {"key": "doc_group"}}
            ]
        })),
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_collection(&self, name: &str, dims: usize, distance: Distance) -> Result<()> {
        let url = self.collection_url(name);
        let response = self.http.get(&url).headers(self.headers()?).send().await?;
        match response.status() {
            StatusCode::OK => {
                debug!(collection = name, "collection exists");
                return Ok(());
            }
            StatusCode::NOT_FOUND => {}
            other => bail!(
                "qdrant collection lookup failed ({}): {}",
                other,
                response.text().await.unwrap_or_default()
            ),
        }

        let body = json!({
            "vectors": {
                "size": dims,
                "distance": distance.as_str()
            }
        });
        let response = self
            .http
            .put(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;
        match response.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::CONFLICT => {
                debug!(collection = name, dims, "collection created");
                Ok(())
            }
            other => bail!(
                "qdrant collection error ({}): {}",
                other,
                response.text().await.unwrap_or_default()
            ),
        }
    }

    async fn upsert(&self, collection: &str, points: Vec<IndexedPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let body_points: Vec<QdrantPoint<'_>> = points
            .iter()
            .map(|p| QdrantPoint {
                id: p.id.to_uuid().to_string(),
                vector: &p.vector,
                payload: &p.payload,
            })
            .collect();

        let response = self
            .http
            .put(format!("{}/points", self.collection_url(collection)))
            .headers(self.headers()?)
            .query(&[("wait", "true")])
            .json(&json!({ "points": body_points }))
            .send()
            .await?;
        if !response.status().is_success() {
            bail!(
                "qdrant upsert failed ({}): {}",
                response.status(),
                response.text().await.unwrap_or_default()
            );
        }
        debug!(collection, count = points.len(), "upserted points");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
        filter: &AccessFilter,
    ) -> Result<Vec<IndexHit>> {
        let body = SearchRequest {
            vector: query,
            limit,
            with_payload: true,
            filter: filter_json(filter),
        };
        let response = self
            .http
            .post(format!("{}/points/search", self.collection_url(collection)))
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            bail!(
                "qdrant search failed ({}): {}",
                response.status(),
                response.text().await.unwrap_or_default()
            );
        }

        let body: SearchResponse = response
            .json()
            .await
            .context("invalid qdrant search response")?;
        Ok(body
            .result
            .into_iter()
            .filter_map(|entry| {
                let id = match entry.id {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                entry.payload.map(|payload| IndexHit {
                    id,
                    score: entry.score,
                    payload,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgate_core::identity::stable_id;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> QdrantIndex {
        QdrantIndex::new(&server.uri(), Some("secret"), Duration::from_secs(5)).unwrap()
    }

    fn sample_point() -> IndexedPoint {
        let payload = Chunk {
            source: "/app/docs/OPS-TEAM/runbook.txt".to_string(),
            page_number: None,
            chunk_index: 0,
            text: "restart the worker".to_string(),
            doc_group: Some("OPS-TEAM".to_string()),
            mode: None,
        };
        IndexedPoint {
            id: stable_id(&payload.source, None, 0, &payload.text),
            vector: vec![0.6, 0.8],
            payload,
        }
    }

    #[test]
    fn test_filter_json_shapes() {
        assert!(filter_json(&AccessFilter::Unrestricted).is_none());
        let f = filter_json(&AccessFilter::GroupsOrPublic(vec!["OPS-TEAM".into()])).unwrap();
        assert_eq!(f["should"][0]["match"]["any"][0], "OPS-TEAM");
        assert_eq!(f["should"][1]["is_empty"]["key"], "doc_group");
    }

    #[tokio::test]
    async fn test_existing_collection_not_recreated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/internal_docs"))
            .and(header("api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/internal_docs"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        client(&server)
            .ensure_collection("internal_docs", 384, Distance::Cosine)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_collection_created_with_cosine() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/internal_docs"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/internal_docs"))
            .and(body_partial_json(json!({"vectors": {"size": 384, "distance": "Cosine"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .ensure_collection("internal_docs", 384, Distance::Cosine)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upsert_sends_uuid_and_payload() {
        let server = MockServer::start().await;
        let point = sample_point();
        let uuid = point.id.to_uuid().to_string();
        Mock::given(method("PUT"))
            .and(path("/collections/internal_docs/points"))
            .and(query_param("wait", "true"))
            .and(body_partial_json(json!({
                "points": [{
                    "id": uuid,
                    "payload": {
                        "source": "/app/docs/OPS-TEAM/runbook.txt",
                        "page_number": null,
                        "chunk_index": 0,
                        "doc_group": "OPS-TEAM"
                    }
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .upsert("internal_docs", vec![point])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_search_sends_filter_and_parses_hits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/internal_docs/points/search"))
            .and(body_partial_json(json!({
                "limit": 3,
                "with_payload": true,
                "filter": {"should": [{"key": "doc_group", "match": {"any": ["OPS-TEAM"]}}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [
                    {
                        "id": "5f1c1a52-0000-0000-0000-000000000000",
                        "score": 0.91,
                        "payload": {
                            "source": "/app/docs/OPS-TEAM/runbook.txt",
                            "page_number": 2,
                            "chunk_index": 1,
                            "text": "restart the worker",
                            "doc_group": "OPS-TEAM",
                            "mode": "text"
                        }
                    },
                    {"id": 7, "score": 0.5, "payload": null}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let filter = AccessFilter::GroupsOrPublic(vec!["OPS-TEAM".to_string()]);
        let hits = client(&server)
            .search("internal_docs", &[1.0, 0.0], 3, &filter)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload.page_number, Some(2));
        assert_eq!(hits[0].payload.doc_group.as_deref(), Some("OPS-TEAM"));
        assert!((hits[0].score - 0.91).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_search_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/internal_docs/points/search"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = client(&server)
            .search("internal_docs", &[1.0], 3, &AccessFilter::Unrestricted)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("overloaded"));
    }
}
