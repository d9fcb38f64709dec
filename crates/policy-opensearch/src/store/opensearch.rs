//! OpenSearch implementation of the document store over its REST API.
//!
//! Requests are sent to the configured nodes in order; a node is skipped only
//! when the connection itself fails or times out. Any HTTP response, including
//! an error status, is authoritative and ends the attempt.
use super::{DeleteOutcome, DocumentStore, Hit, Query, Refresh, SearchPage};
use crate::errors::{StoreError, StoreResult};
use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::{Duration, Instant};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct OpenSearchConfig {
    pub addresses: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub request_timeout: Duration,
}

impl OpenSearchConfig {
    pub fn new(addresses: Vec<String>) -> Self {
        Self {
            addresses,
            username: None,
            password: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "_scroll_id")]
    scroll_id: Option<String>,
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source", default)]
    source: Value,
}

#[derive(Debug, Deserialize)]
struct DeleteByQueryResponse {
    #[serde(default)]
    deleted: u64,
}

#[derive(Debug, Deserialize)]
struct DocumentResult {
    result: Option<String>,
}

#[derive(Clone)]
pub struct OpenSearchStore {
    client: reqwest::Client,
    nodes: Vec<Url>,
    username: Option<String>,
    password: Option<String>,
}

impl OpenSearchStore {
    pub fn new(config: OpenSearchConfig) -> StoreResult<Self> {
        let nodes = config
            .addresses
            .iter()
            .map(|address| address.trim())
            .filter(|address| !address.is_empty())
            .map(|address| {
                Url::parse(address).map_err(|err| StoreError::Address(format!("{address}: {err}")))
            })
            .collect::<StoreResult<Vec<_>>>()?;
        if nodes.is_empty() {
            return Err(StoreError::Address("no store addresses configured".to_string()));
        }
        if let Some(bad) = nodes.iter().find(|url| url.cannot_be_a_base()) {
            return Err(StoreError::Address(bad.to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            nodes,
            username: config.username,
            password: config.password,
        })
    }

    pub fn nodes(&self) -> &[Url] {
        &self.nodes
    }

    fn endpoint(node: &Url, segments: &[&str], params: &[(&str, &str)]) -> StoreResult<Url> {
        let mut url = node.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Address(node.to_string()))?
            .pop_if_empty()
            .extend(segments);
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    async fn send(
        &self,
        operation: &'static str,
        method: Method,
        segments: &[&str],
        params: &[(&str, &str)],
        body: Option<&Value>,
    ) -> StoreResult<reqwest::Response> {
        let started = Instant::now();
        let mut last_error = None;
        for node in &self.nodes {
            let url = Self::endpoint(node, segments, params)?;
            let mut request = self.client.request(method.clone(), url);
            if let Some(username) = &self.username {
                request = request.basic_auth(username, self.password.as_deref());
            }
            if let Some(body) = body {
                request = request.json(body);
            }
            match request.send().await {
                Ok(response) => {
                    metrics::histogram!(
                        "policy_store_request_duration_seconds",
                        "operation" => operation
                    )
                    .record(started.elapsed().as_secs_f64());
                    return Ok(response);
                }
                Err(err) if err.is_connect() || err.is_timeout() => {
                    tracing::warn!(
                        node = %node,
                        operation,
                        error = %err,
                        "store node unreachable, trying next"
                    );
                    last_error = Some(err);
                }
                Err(err) => return Err(err.into()),
            }
        }
        metrics::counter!("policy_store_unreachable_total", "operation" => operation).increment(1);
        match last_error {
            Some(err) => Err(err.into()),
            None => Err(StoreError::Address("no store addresses configured".to_string())),
        }
    }

    async fn status_error(response: reqwest::Response) -> StoreError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        StoreError::Status { status, body }
    }

    async fn expect_success(response: reqwest::Response) -> StoreResult<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::status_error(response).await)
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> StoreResult<T> {
        let response = Self::expect_success(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| StoreError::Decode(err.to_string()))
    }

    fn keep_alive_param(keep_alive: Duration) -> String {
        format!("{}ms", keep_alive.as_millis())
    }

    fn into_page(response: SearchResponse) -> SearchPage {
        SearchPage {
            scroll_id: response.scroll_id,
            hits: response
                .hits
                .hits
                .into_iter()
                .map(|hit| Hit {
                    id: hit.id,
                    source: hit.source,
                })
                .collect(),
        }
    }
}

fn error_type(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(|error| error.get("type"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl DocumentStore for OpenSearchStore {
    async fn index_exists(&self, index: &str) -> StoreResult<bool> {
        let response = self
            .send("index_exists", Method::HEAD, &[index], &[], None)
            .await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::status_error(response).await),
        }
    }

    async fn create_index(&self, index: &str, body: &Value) -> StoreResult<()> {
        let response = self
            .send("create_index", Method::PUT, &[index], &[], Some(body))
            .await?;
        if response.status().is_success() {
            return Ok(());
        }
        match Self::status_error(response).await {
            StoreError::Status { status: 400, body }
                if error_type(&body).as_deref() == Some("resource_already_exists_exception") =>
            {
                Err(StoreError::IndexAlreadyExists(index.to_string()))
            }
            err => Err(err),
        }
    }

    async fn put_document(
        &self,
        index: &str,
        id: &str,
        document: &Value,
        refresh: Refresh,
    ) -> StoreResult<()> {
        let response = self
            .send(
                "put_document",
                Method::PUT,
                &[index, "_doc", id],
                &[("refresh", refresh.as_param())],
                Some(document),
            )
            .await?;
        Self::expect_success(response).await.map(|_| ())
    }

    async fn delete_document(
        &self,
        index: &str,
        id: &str,
        refresh: Refresh,
    ) -> StoreResult<DeleteOutcome> {
        let response = self
            .send(
                "delete_document",
                Method::DELETE,
                &[index, "_doc", id],
                &[("refresh", refresh.as_param())],
                None,
            )
            .await?;
        if response.status().is_success() {
            return Ok(DeleteOutcome::Deleted);
        }
        match Self::status_error(response).await {
            // A missing document answers 404 with `result: not_found`; a
            // missing index also answers 404 but carries an error object.
            StoreError::Status { status: 404, body } => {
                let result = serde_json::from_str::<DocumentResult>(&body)
                    .ok()
                    .and_then(|doc| doc.result);
                if result.as_deref() == Some("not_found") {
                    Ok(DeleteOutcome::NotFound)
                } else {
                    Err(StoreError::Status { status: 404, body })
                }
            }
            err => Err(err),
        }
    }

    async fn search(
        &self,
        index: &str,
        size: usize,
        keep_alive: Duration,
    ) -> StoreResult<SearchPage> {
        let scroll = Self::keep_alive_param(keep_alive);
        let mut body = Query::MatchAll.to_json();
        body["size"] = json!(size);
        body["sort"] = json!(["_doc"]);
        let response = self
            .send(
                "search",
                Method::POST,
                &[index, "_search"],
                &[("scroll", scroll.as_str())],
                Some(&body),
            )
            .await?;
        Self::decode::<SearchResponse>(response)
            .await
            .map(Self::into_page)
    }

    async fn scroll(&self, scroll_id: &str, keep_alive: Duration) -> StoreResult<SearchPage> {
        let body = json!({
            "scroll": Self::keep_alive_param(keep_alive),
            "scroll_id": scroll_id,
        });
        let response = self
            .send(
                "scroll",
                Method::POST,
                &["_search", "scroll"],
                &[],
                Some(&body),
            )
            .await?;
        Self::decode::<SearchResponse>(response)
            .await
            .map(Self::into_page)
    }

    async fn clear_scroll(&self, scroll_id: &str) -> StoreResult<()> {
        let body = json!({ "scroll_id": scroll_id });
        let response = self
            .send(
                "clear_scroll",
                Method::DELETE,
                &["_search", "scroll"],
                &[],
                Some(&body),
            )
            .await?;
        // An already expired context is not worth reporting.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::expect_success(response).await.map(|_| ())
    }

    async fn delete_by_query(
        &self,
        index: &str,
        query: &Query,
        refresh: Refresh,
    ) -> StoreResult<u64> {
        let body = query.to_json();
        let response = self
            .send(
                "delete_by_query",
                Method::POST,
                &[index, "_delete_by_query"],
                &[("refresh", refresh.as_param())],
                Some(&body),
            )
            .await?;
        Self::decode::<DeleteByQueryResponse>(response)
            .await
            .map(|resp| resp.deleted)
    }

    async fn health_check(&self) -> StoreResult<()> {
        let response = self
            .send(
                "health_check",
                Method::GET,
                &["_cluster", "health"],
                &[],
                None,
            )
            .await?;
        Self::expect_success(response).await.map(|_| ())
    }

    fn backend_name(&self) -> &'static str {
        "opensearch"
    }
}
