//! JSON-over-HTTP implementation of the document collaborators.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::ShareId,
    error::ApiError,
    protocol::{
        Envelope, LoginConfig, SearchHit, SearchParams, SearchRequest, SharedDocumentBundle,
        SharedDocumentRequest,
    },
};
use tracing::{debug, warn};

use crate::{
    documents::PolicyStore, error::FetchError, DocumentSearchService, LoginConfigProvider,
    SharedDocumentService,
};

pub struct HttpBackend {
    http: Client,
    server_url: String,
    api_token: Option<String>,
    policies: PolicyStore,
}

impl HttpBackend {
    /// `policies` receives the policies returned with shared documents.
    pub fn new(
        server_url: impl Into<String>,
        api_token: Option<String>,
        timeout: Duration,
        policies: PolicyStore,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            server_url: server_url.into().trim_end_matches('/').to_string(),
            api_token,
            policies,
        })
    }

    async fn post<Req, Resp>(&self, method: &str, body: &Req) -> Result<Envelope<Resp>, FetchError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/api/{method}", self.server_url);
        let mut request = self.http.post(&url).json(body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let res = request.send().await.map_err(transport_error)?;
        let status = res.status();
        debug!(method, %status, "api response");
        if status.is_success() {
            return res
                .json::<Envelope<Resp>>()
                .await
                .with_context(|| format!("invalid {method} response body"))
                .map_err(FetchError::Other);
        }

        let body = match res.text().await {
            Ok(body) => body,
            Err(err) => {
                warn!(method, %status, error = %err, "failed to read error response body");
                String::new()
            }
        };
        Err(status_error(status, &body))
    }
}

fn transport_error(err: reqwest::Error) -> FetchError {
    if err.is_connect() || err.is_timeout() {
        FetchError::Offline(err.to_string())
    } else {
        FetchError::Other(err.into())
    }
}

fn status_error(status: StatusCode, body: &str) -> FetchError {
    let api_error = serde_json::from_str::<ApiError>(body).ok();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return FetchError::Authorization(
            api_error
                .map(|e| e.message)
                .unwrap_or_else(|| status.to_string()),
        );
    }
    match api_error {
        Some(api_error) => FetchError::Api(api_error),
        None => FetchError::Other(anyhow!("unexpected status {status}")),
    }
}

#[async_trait]
impl DocumentSearchService for HttpBackend {
    async fn search(&self, query: &str, params: &SearchParams) -> Result<Vec<SearchHit>> {
        let request = SearchRequest {
            query: query.to_string(),
            params: params.clone(),
        };
        let envelope: Envelope<Vec<SearchHit>> = self.post("documents.search", &request).await?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl SharedDocumentService for HttpBackend {
    async fn fetch_with_shared_tree(
        &self,
        document_slug: &str,
        share_id: &ShareId,
    ) -> Result<SharedDocumentBundle, FetchError> {
        let request = SharedDocumentRequest {
            id: (!document_slug.is_empty()).then(|| document_slug.to_string()),
            share_id: share_id.clone(),
        };
        let envelope: Envelope<SharedDocumentBundle> =
            self.post("documents.info", &request).await?;
        self.policies.add_policies(envelope.policies);
        Ok(envelope.data)
    }
}

#[async_trait]
impl LoginConfigProvider for HttpBackend {
    async fn login_config(&self) -> Result<Option<LoginConfig>> {
        let envelope: Envelope<LoginConfig> = self
            .post("auth.config", &serde_json::json!({}))
            .await
            .context("failed to load login config")?;
        Ok(Some(envelope.data))
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
