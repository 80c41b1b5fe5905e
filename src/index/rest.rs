//! REST vector index client.
//!
//! Speaks a Qdrant-flavored HTTP dialect (collections, points, filtered
//! delete/payload updates). Wire compatibility with any specific server is
//! not a contract; the dialect is small enough that compatible stores can
//! implement it behind the same trait.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::VectorIndexConfig;
use crate::error::{Error, Result};

use super::{Distance, IndexPoint, PointPayload, ScoredPoint, SearchFilter, VectorIndex};

/// HTTP client for a remote vector index
pub struct RestVectorIndex {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    upsert_batch_size: usize,
}

impl RestVectorIndex {
    pub fn new(config: &VectorIndexConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            upsert_batch_size: config.upsert_batch_size,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }
        builder
    }

    /// OR-filter matching the document id at both payload locations
    fn document_filter(document_id: &str) -> serde_json::Value {
        json!({
            "should": [
                { "key": "document_id", "match": { "value": document_id } },
                { "key": "metadata.document_id", "match": { "value": document_id } },
            ]
        })
    }

    fn search_filter(filter: &SearchFilter) -> serde_json::Value {
        let mut must = Vec::new();
        if let Some(org) = &filter.organization_id {
            must.push(json!({ "key": "organization_id", "match": { "value": org } }));
        }
        if let Some(types) = &filter.source_types {
            must.push(json!({ "key": "source_type", "match": { "any": types } }));
        }
        if let Some(ids) = &filter.document_ids {
            must.push(json!({ "key": "document_id", "match": { "any": ids } }));
        }
        if !filter.include_excluded {
            must.push(json!({ "key": "is_excluded", "match": { "value": false } }));
        }
        json!({ "must": must })
    }

    async fn count_by_filter(
        &self,
        collection: &str,
        filter: &serde_json::Value,
    ) -> Result<usize> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/count", collection),
            )
            .json(&json!({ "filter": filter, "exact": true }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }
        if !response.status().is_success() {
            return Err(Error::vector_index(format!(
                "Count failed: HTTP {}",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct CountResult {
            count: usize,
        }
        #[derive(Deserialize)]
        struct CountResponse {
            result: CountResult,
        }

        let body: CountResponse = response.json().await?;
        Ok(body.result.count)
    }
}

#[derive(Deserialize)]
struct CollectionsResponse {
    result: CollectionsResult,
}

#[derive(Deserialize)]
struct CollectionsResult {
    collections: Vec<CollectionDescription>,
}

#[derive(Deserialize)]
struct CollectionDescription {
    name: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    id: serde_json::Value,
    score: f32,
    payload: PointPayload,
}

#[async_trait]
impl VectorIndex for RestVectorIndex {
    async fn ensure_collection(
        &self,
        name: &str,
        dimensions: usize,
        distance: Distance,
    ) -> Result<()> {
        let status = self
            .request(reqwest::Method::GET, &format!("/collections/{}", name))
            .send()
            .await?
            .status();

        if status.is_success() {
            tracing::debug!("Collection '{}' already exists", name);
            return Ok(());
        }

        let response = self
            .request(reqwest::Method::PUT, &format!("/collections/{}", name))
            .json(&json!({
                "vectors": { "size": dimensions, "distance": distance.as_str() }
            }))
            .send()
            .await?;

        // A racing creator may have won; "already exists" is success.
        if response.status().is_success() || response.status() == StatusCode::CONFLICT {
            tracing::info!(
                "Collection '{}' ready (dimensions={}, distance={})",
                name,
                dimensions,
                distance.as_str()
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if body.to_lowercase().contains("already exists") {
            return Ok(());
        }
        Err(Error::vector_index(format!(
            "Failed to create collection '{}': {}",
            name, body
        )))
    }

    async fn upsert_batch(&self, collection: &str, points: &[IndexPoint]) -> Result<()> {
        let body = json!({
            "points": points
                .iter()
                .map(|p| json!({ "id": p.id, "vector": p.vector, "payload": p.payload }))
                .collect::<Vec<_>>()
        });

        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("/collections/{}/points?wait=true", collection),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::vector_index(format!(
                "Upsert failed: HTTP {} - {}",
                status, body
            )));
        }
        Ok(())
    }

    fn upsert_batch_size(&self) -> usize {
        self.upsert_batch_size
    }

    async fn delete_by_document(&self, collection: &str, document_id: &str) -> Result<usize> {
        let filter = Self::document_filter(document_id);
        let count = self.count_by_filter(collection, &filter).await?;
        if count == 0 {
            tracing::debug!(
                "No points to delete for document {} in '{}'",
                document_id,
                collection
            );
            return Ok(0);
        }

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/delete?wait=true", collection),
            )
            .json(&json!({ "filter": filter }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::vector_index(format!(
                "Delete failed: HTTP {}",
                response.status()
            )));
        }

        tracing::info!(
            "Deleted {} points for document {} from '{}'",
            count,
            document_id,
            collection
        );
        Ok(count)
    }

    async fn set_excluded(
        &self,
        collection: &str,
        document_id: &str,
        excluded: bool,
    ) -> Result<usize> {
        let filter = Self::document_filter(document_id);
        let count = self.count_by_filter(collection, &filter).await?;
        if count == 0 {
            return Ok(0);
        }

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/payload?wait=true", collection),
            )
            .json(&json!({
                "payload": { "is_excluded": excluded },
                "filter": filter,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::vector_index(format!(
                "Payload update failed: HTTP {}",
                response.status()
            )));
        }
        Ok(count)
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        filter: &SearchFilter,
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<ScoredPoint>> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/search", collection),
            )
            .json(&json!({
                "vector": vector,
                "limit": limit,
                "filter": Self::search_filter(filter),
                "score_threshold": min_score,
                "with_payload": true,
            }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(Error::vector_index(format!(
                "Search failed: HTTP {}",
                response.status()
            )));
        }

        let body: SearchResponse = response.json().await?;
        Ok(body
            .result
            .into_iter()
            .map(|hit| ScoredPoint {
                id: match hit.id {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                },
                score: hit.score,
                payload: hit.payload,
            })
            .collect())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.count_by_filter(collection, &json!({ "must": [] })).await
    }

    async fn list_collections(&self, prefix: &str) -> Result<Vec<String>> {
        let response = self
            .request(reqwest::Method::GET, "/collections")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::vector_index(format!(
                "List collections failed: HTTP {}",
                response.status()
            )));
        }

        let body: CollectionsResponse = response.json().await?;
        Ok(body
            .result
            .collections
            .into_iter()
            .map(|c| c.name)
            .filter(|name| name.starts_with(prefix))
            .collect())
    }

    async fn health_check(&self) -> Result<bool> {
        match self.request(reqwest::Method::GET, "/collections").send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "rest"
    }
}
