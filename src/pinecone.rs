//! Pinecone vector store adapter.
//!
//! [`PineconeStore`] implements the core [`VectorStore`] trait against a
//! Pinecone index over its REST API.
//!
//! # Provisioning
//!
//! [`PineconeStore::connect`] resolves the index's data-plane host. When
//! `vector_store.host` is configured it is used as-is; otherwise the control
//! plane is asked to describe the index, and the index is created
//! (serverless, configured cloud/region/metric/dimension) if it does not
//! exist yet.
//!
//! # Data-plane endpoints
//!
//! | Operation | Request |
//! |-----------|---------|
//! | upsert | `POST /vectors/upsert` |
//! | query | `POST /query` |
//! | delete | `POST /vectors/delete` with `ids` or `deleteAll` |
//! | list by prefix | `GET /vectors/list?prefix=` |

use std::time::Duration;

use async_trait::async_trait;
use ragchat_core::models::{QueryMatch, RecordMetadata, VectorRecord};
use ragchat_core::store::{StoreError, VectorStore};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::VectorStoreConfig;
use crate::http::{build_client, send_with_retry, HttpFailure};

const API_VERSION_HEADER: &str = "X-Pinecone-API-Version";
const API_VERSION: &str = "2024-07";
const UPSERT_BATCH: usize = 100;
const DELETE_BATCH: usize = 1000;
const LIST_PAGE_LIMIT: usize = 100;
const READY_POLL_ATTEMPTS: u32 = 60;

/// Vector store backed by a hosted Pinecone index.
pub struct PineconeStore {
    client: Client,
    api_key: String,
    host: String,
    dims: usize,
    max_retries: u32,
}

#[derive(Serialize)]
struct WireVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a RecordMetadata,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<WireVector<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<WireMatch>,
}

#[derive(Deserialize)]
struct WireMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<WireMetadata>,
}

/// Metadata as read back from the index. Fields are optional so records
/// written by other tools do not break queries.
#[derive(Deserialize, Default)]
struct WireMetadata {
    #[serde(default)]
    text: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    document_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    ids: Option<&'a [String]>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    delete_all: bool,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    vectors: Vec<ListedVector>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Deserialize)]
struct ListedVector {
    id: String,
}

#[derive(Deserialize)]
struct Pagination {
    next: Option<String>,
}

#[derive(Deserialize)]
struct IndexDescription {
    host: String,
    #[serde(default)]
    status: Option<IndexStatus>,
}

#[derive(Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    spec: CreateIndexSpec<'a>,
}

#[derive(Serialize)]
struct CreateIndexSpec<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

impl PineconeStore {
    /// Resolve (and if necessary create) the configured index and return a
    /// store bound to its data-plane host.
    pub async fn connect(config: &VectorStoreConfig, api_key: &str) -> Result<Self, StoreError> {
        let client =
            build_client(config.timeout_secs).map_err(|e| StoreError::Request(e.to_string()))?;

        let host = match &config.host {
            Some(host) => host.clone(),
            None => ensure_index(&client, config, api_key).await?,
        };

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            host: normalize_host(&host),
            dims: config.dims,
            max_retries: config.max_retries,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Api-Key", &self.api_key)
            .header(API_VERSION_HEADER, API_VERSION)
    }

    async fn post_json<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, StoreError> {
        let url = format!("{}{}", self.host, path);
        send_with_retry(
            || self.request(self.client.post(&url)).json(body),
            self.max_retries,
        )
        .await
        .map_err(store_error)
    }

    async fn delete_request(&self, body: &DeleteRequest<'_>) -> Result<(), StoreError> {
        match self.post_json("/vectors/delete", body).await {
            Ok(_) => Ok(()),
            // Serverless indexes answer 404 when the namespace holds no vectors.
            Err(StoreError::Api { status: 404, .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn list_ids_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let url = format!("{}/vectors/list", self.host);
        let mut ids = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut params = vec![
                ("prefix", prefix.to_string()),
                ("limit", LIST_PAGE_LIMIT.to_string()),
            ];
            if let Some(t) = &token {
                params.push(("paginationToken", t.clone()));
            }

            let response = send_with_retry(
                || self.request(self.client.get(&url)).query(&params),
                self.max_retries,
            )
            .await
            .map_err(store_error)?;
            let page: ListResponse = response
                .json()
                .await
                .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;

            ids.extend(page.vectors.into_iter().map(|v| v.id));
            token = page.pagination.and_then(|p| p.next);
            if token.is_none() {
                break;
            }
        }

        Ok(ids)
    }

    fn check_dims(&self, len: usize) -> Result<(), StoreError> {
        if len != self.dims {
            return Err(StoreError::DimensionMismatch {
                expected: self.dims,
                got: len,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<(), StoreError> {
        for r in records {
            self.check_dims(r.values.len())?;
        }
        for batch in records.chunks(UPSERT_BATCH) {
            let body = UpsertRequest {
                vectors: batch
                    .iter()
                    .map(|r| WireVector {
                        id: &r.id,
                        values: &r.values,
                        metadata: &r.metadata,
                    })
                    .collect(),
            };
            self.post_json("/vectors/upsert", &body).await?;
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>, StoreError> {
        self.check_dims(vector.len())?;
        let body = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
        };
        let response = self.post_json("/query", &body).await?;
        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;

        Ok(parsed
            .matches
            .into_iter()
            .map(|m| {
                let meta = m.metadata.unwrap_or_default();
                QueryMatch {
                    score: m.score,
                    metadata: RecordMetadata {
                        text: meta.text,
                        filename: meta.filename,
                        document_id: meta.document_id.unwrap_or_else(|| m.id.clone()),
                    },
                    id: m.id,
                }
            })
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let ids = [id.to_string()];
        self.delete_request(&DeleteRequest {
            ids: Some(&ids),
            delete_all: false,
        })
        .await
    }

    async fn delete_document(&self, document_id: &str) -> Result<(), StoreError> {
        let ids = self.list_ids_with_prefix(document_id).await?;
        for batch in ids.chunks(DELETE_BATCH) {
            self.delete_request(&DeleteRequest {
                ids: Some(batch),
                delete_all: false,
            })
            .await?;
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        self.delete_request(&DeleteRequest {
            ids: None,
            delete_all: true,
        })
        .await
    }
}

fn store_error(failure: HttpFailure) -> StoreError {
    match failure {
        HttpFailure::Request(msg) => StoreError::Request(msg),
        HttpFailure::Status { status, body } => StoreError::Api { status, body },
    }
}

/// Hosts returned by the control plane have no scheme.
fn normalize_host(host: &str) -> String {
    let trimmed = host.trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Describe the index, creating it if missing, and wait until it is ready.
/// Returns the data-plane host.
async fn ensure_index(
    client: &Client,
    config: &VectorStoreConfig,
    api_key: &str,
) -> Result<String, StoreError> {
    let control = config.control_url.trim_end_matches('/');
    let describe_url = format!("{}/indexes/{}", control, config.index_name);
    let authed = |b: RequestBuilder| {
        b.header("Api-Key", api_key)
            .header(API_VERSION_HEADER, API_VERSION)
    };

    let mut description = match send_with_retry(
        || authed(client.get(&describe_url)),
        config.max_retries,
    )
    .await
    {
        Ok(resp) => parse_description(resp).await?,
        Err(HttpFailure::Status { status: 404, .. }) => {
            info!(
                index = %config.index_name,
                dims = config.dims,
                metric = %config.metric,
                "creating vector index"
            );
            let body = CreateIndexRequest {
                name: &config.index_name,
                dimension: config.dims,
                metric: &config.metric,
                spec: CreateIndexSpec {
                    serverless: ServerlessSpec {
                        cloud: &config.cloud,
                        region: &config.region,
                    },
                },
            };
            let create_url = format!("{}/indexes", control);
            let resp = send_with_retry(
                || authed(client.post(&create_url)).json(&body),
                config.max_retries,
            )
            .await
            .map_err(store_error)?;
            parse_description(resp).await?
        }
        Err(other) => return Err(store_error(other)),
    };

    let mut attempts = 0;
    while !description.status.as_ref().map(|s| s.ready).unwrap_or(true) {
        attempts += 1;
        if attempts > READY_POLL_ATTEMPTS {
            return Err(StoreError::InvalidResponse(format!(
                "index {} not ready after {} polls",
                config.index_name, READY_POLL_ATTEMPTS
            )));
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        let resp = send_with_retry(|| authed(client.get(&describe_url)), config.max_retries)
            .await
            .map_err(store_error)?;
        description = parse_description(resp).await?;
    }

    Ok(description.host)
}

async fn parse_description(resp: reqwest::Response) -> Result<IndexDescription, StoreError> {
    resp.json()
        .await
        .map_err(|e| StoreError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host_adds_scheme() {
        assert_eq!(
            normalize_host("idx-abc.svc.pinecone.io"),
            "https://idx-abc.svc.pinecone.io"
        );
        assert_eq!(normalize_host("http://127.0.0.1:9000/"), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_delete_request_shapes() {
        let ids = vec!["a".to_string()];
        let by_id = serde_json::to_value(DeleteRequest {
            ids: Some(&ids),
            delete_all: false,
        })
        .unwrap();
        assert_eq!(by_id, serde_json::json!({ "ids": ["a"] }));

        let all = serde_json::to_value(DeleteRequest {
            ids: None,
            delete_all: true,
        })
        .unwrap();
        assert_eq!(all, serde_json::json!({ "deleteAll": true }));
    }

    #[test]
    fn test_query_request_uses_camel_case() {
        let v = [0.5f32, 0.25];
        let json = serde_json::to_value(QueryRequest {
            vector: &v,
            top_k: 3,
            include_metadata: true,
        })
        .unwrap();
        assert_eq!(json["topK"], 3);
        assert_eq!(json["includeMetadata"], true);
    }

    #[test]
    fn test_match_without_metadata_falls_back_to_id() {
        let parsed: QueryResponse =
            serde_json::from_str(r#"{"matches":[{"id":"x","score":0.5}]}"#).unwrap();
        assert_eq!(parsed.matches.len(), 1);
        assert!(parsed.matches[0].metadata.is_none());
    }
}
