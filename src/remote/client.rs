//! HTTP client for the remote document store.
//!
//! Every operation is a single remote call wrapped in the resilient
//! layer under its own label. Multi-step workflows (read-merge-write)
//! are composed in [`super::properties`], never inside one retry
//! boundary.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::errors::ApiError;
use super::limiter::RateLimiter;
use super::retry::{with_retry, RetryPolicy};

/// A document as the store returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteDocument {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub markdown: String,
}

/// Property schema of a document's parent collection: property name to
/// descriptor. An empty map means the store exposed no schema.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertySchema {
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Client for the store's JSON API. Construction is cheap; clones share
/// the underlying connection pool, limiter, and policy.
#[derive(Debug, Clone)]
pub struct DocumentClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl DocumentClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ApiError::from_transport)?;

        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            limiter: Arc::new(RateLimiter::default()),
            policy: RetryPolicy::default(),
        })
    }

    /// Share a limiter with other clients, or inject an isolated one in
    /// tests.
    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn get_document(&self, id: &str) -> Result<RemoteDocument, ApiError> {
        let id = normalize_document_id(id)?;
        let url = format!("{}/v1/documents/{id}", self.api_url);
        self.request("documents.get", Method::GET, &url, None).await
    }

    pub async fn put_document(&self, id: &str, markdown: &str) -> Result<(), ApiError> {
        let id = normalize_document_id(id)?;
        let url = format!("{}/v1/documents/{id}", self.api_url);
        let body = serde_json::json!({ "markdown": markdown });
        let _: Value = self
            .request("documents.put", Method::PUT, &url, Some(body))
            .await?;
        Ok(())
    }

    pub async fn get_properties(&self, id: &str) -> Result<Map<String, Value>, ApiError> {
        let id = normalize_document_id(id)?;
        let url = format!("{}/v1/documents/{id}/properties", self.api_url);
        self.request("properties.get", Method::GET, &url, None).await
    }

    pub async fn put_properties(
        &self,
        id: &str,
        properties: &Map<String, Value>,
    ) -> Result<(), ApiError> {
        let id = normalize_document_id(id)?;
        let url = format!("{}/v1/documents/{id}/properties", self.api_url);
        let _: Value = self
            .request(
                "properties.put",
                Method::PATCH,
                &url,
                Some(Value::Object(properties.clone())),
            )
            .await?;
        Ok(())
    }

    pub async fn get_schema(&self, id: &str) -> Result<PropertySchema, ApiError> {
        let id = normalize_document_id(id)?;
        let url = format!("{}/v1/documents/{id}/schema", self.api_url);
        self.request("schema.get", Method::GET, &url, None).await
    }

    /// One labeled remote call through the resilient layer. The request
    /// is rebuilt per attempt so a retry is a fresh call.
    async fn request<T: DeserializeOwned>(
        &self,
        label: &str,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        let http = self.http.clone();
        let token = self.token.clone();
        let url = url.to_string();

        with_retry(&self.policy, &self.limiter, label, move || {
            let http = http.clone();
            let token = token.clone();
            let url = url.clone();
            let method = method.clone();
            let body = body.clone();
            async move {
                let mut request = http.request(method, &url).bearer_auth(&token);
                if let Some(body) = &body {
                    request = request.json(body);
                }
                let response = request.send().await.map_err(ApiError::from_transport)?;
                decode(response, &url).await
            }
        })
        .await
    }
}

async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
    resource: &str,
) -> Result<T, ApiError> {
    let status = response.status();
    if status.is_success() {
        return response.json().await.map_err(ApiError::from_transport);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();

    Err(ApiError::from_status(
        status.as_u16(),
        retry_after,
        resource,
        &body,
    ))
}

/// Canonicalize a document id to dashed form. Accepts a 32-hex-digit id
/// with or without dashes, or a share URL whose last path segment ends in
/// one (slug prefixes are ignored).
pub fn normalize_document_id(input: &str) -> Result<String, ApiError> {
    let tail = input.trim().rsplit('/').next().unwrap_or(input);
    let tail = tail.split(['?', '#']).next().unwrap_or(tail);
    let compact: String = tail.chars().filter(char::is_ascii_alphanumeric).collect();

    let hex_tail = compact
        .len()
        .checked_sub(32)
        .map(|cut| &compact[cut..])
        .filter(|candidate| candidate.chars().all(|c| c.is_ascii_hexdigit()));

    let Some(id) = hex_tail else {
        return Err(ApiError::InvalidRequest {
            message: format!("`{input}` does not contain a 32-hex-digit document id"),
        });
    };

    let id = id.to_lowercase();
    Ok(format!(
        "{}-{}-{}-{}-{}",
        &id[..8],
        &id[8..12],
        &id[12..16],
        &id[16..20],
        &id[20..]
    ))
}
