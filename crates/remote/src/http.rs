//! HTTP client for the remote document-store service.
//!
//! [`HttpDocumentStore`] holds the connection configuration for one
//! backend deployment. REST mapping: documents live at
//! `{base}/{collection}/{id}`; equality queries POST to
//! `{base}/{collection}/query`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::RemoteError;
use crate::store::{DocumentStore, SetMode};

/// Default bound on any single remote call.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration handle for one document-store backend.
pub struct HttpDocumentStore {
    base_url: String,
    client: reqwest::Client,
    bearer_token: Option<String>,
}

impl HttpDocumentStore {
    /// Create a client targeting `base_url` (e.g. `https://host/api/v1`),
    /// with the default request timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self, RemoteError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client with an explicit per-request timeout. On timeout the
    /// call fails as [`RemoteError::Network`], indistinguishable from any
    /// other outage.
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Unknown(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            bearer_token: None,
        })
    }

    /// Attach a bearer token sent with every request.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{collection}/{id}", self.base_url)
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        collection: &str,
        id: &str,
    ) -> Result<reqwest::Response, RemoteError> {
        let response = builder
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        match response.status() {
            s if s.is_success() => Ok(response),
            reqwest::StatusCode::NOT_FOUND => Err(RemoteError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Err(RemoteError::Permission(format!("HTTP {}", response.status())))
            }
            s if s.is_server_error() => Err(RemoteError::Network(format!("HTTP {s}"))),
            s => Err(RemoteError::Unknown(format!("HTTP {s}"))),
        }
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, RemoteError> {
        let builder = self.request(reqwest::Method::GET, self.document_url(collection, id));
        match self.send(builder, collection, id).await {
            Ok(response) => {
                let body = response
                    .json::<Value>()
                    .await
                    .map_err(|e| RemoteError::Unknown(format!("invalid response body: {e}")))?;
                Ok(Some(body))
            }
            Err(RemoteError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[(String, Value)],
    ) -> Result<Vec<(String, Value)>, RemoteError> {
        let body = json!({
            "filters": filters
                .iter()
                .map(|(field, value)| json!({ "field": field, "value": value }))
                .collect::<Vec<_>>(),
        });
        let builder = self
            .request(
                reqwest::Method::POST,
                format!("{}/{collection}/query", self.base_url),
            )
            .json(&body);
        let response = self.send(builder, collection, "").await?;

        let rows = response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| RemoteError::Unknown(format!("invalid response body: {e}")))?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| RemoteError::Unknown("query row missing id".into()))?
                .to_string();
            let fields = row.get("fields").cloned().unwrap_or(Value::Null);
            result.push((id, fields));
        }
        Ok(result)
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        fields: Value,
        mode: SetMode,
    ) -> Result<(), RemoteError> {
        let mut url = self.document_url(collection, id);
        if mode == SetMode::Merge {
            url.push_str("?mode=merge");
        }
        let builder = self.request(reqwest::Method::PUT, url).json(&fields);
        self.send(builder, collection, id).await?;
        tracing::debug!(collection, id, ?mode, "remote set ok");
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<(), RemoteError> {
        let builder = self
            .request(reqwest::Method::PATCH, self.document_url(collection, id))
            .json(&fields);
        self.send(builder, collection, id).await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        let builder = self.request(reqwest::Method::DELETE, self.document_url(collection, id));
        self.send(builder, collection, id).await?;
        Ok(())
    }
}
