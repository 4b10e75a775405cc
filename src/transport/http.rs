//! HTTP dispatcher over reqwest.
//!
//! # Responsibilities
//! - Join an endpoint base address with the request path
//! - Apply the configured receive timeout to every call
//! - Report connection errors, timeouts and configured statuses as failures

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use thiserror::Error;
use url::Url;

use crate::cluster::FailoverSelector;
use crate::config::{ClusterConfig, FailoverConfig};
use crate::transport::{Dispatcher, FailoverClient};

/// Errors from a single HTTP dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upstream returned {0}")]
    Status(StatusCode),

    #[error("Invalid target URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// A replayable HTTP request. The path is appended to whichever endpoint is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub address: String,
    pub status: StatusCode,
    pub body: String,
}

/// Dispatches [`HttpRequest`]s with reqwest.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: reqwest::Client,
    receive_timeout: Option<Duration>,
    failover_status_codes: Vec<u16>,
}

impl HttpDispatcher {
    pub fn new(cluster: &ClusterConfig) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder().build().map_err(DispatchError::Client)?;
        Ok(Self::with_client(client, cluster))
    }

    pub fn with_client(client: reqwest::Client, cluster: &ClusterConfig) -> Self {
        tracing::info!(
            receive_timeout_ms = ?cluster.receive_timeout_ms,
            failover_status_codes = ?cluster.failover_status_codes,
            "HTTP dispatcher ready"
        );
        Self {
            client,
            receive_timeout: cluster.receive_timeout(),
            failover_status_codes: cluster.failover_status_codes.clone(),
        }
    }

    /// `address` + `path`, with exactly one slash between them.
    pub fn target_url(address: &str, path: &str) -> Result<Url, DispatchError> {
        let base = address.trim_end_matches('/');
        let url = if path.is_empty() || path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        };
        Url::parse(&url).map_err(|source| DispatchError::InvalidUrl { url, source })
    }
}

impl Dispatcher for HttpDispatcher {
    type Request = HttpRequest;
    type Response = HttpResponse;
    type Error = DispatchError;

    async fn dispatch(&self, address: &str, request: &HttpRequest) -> Result<HttpResponse, DispatchError> {
        let url = Self::target_url(address, &request.path)?;
        tracing::debug!(method = %request.method, url = %url, "Dispatching");

        let mut builder = self.client.request(request.method.clone(), url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = self.receive_timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status();
        if self.failover_status_codes.contains(&status.as_u16()) {
            return Err(DispatchError::Status(status));
        }

        let body = response.text().await?;
        Ok(HttpResponse {
            address: address.to_string(),
            status,
            body,
        })
    }
}

/// Build a failover HTTP client from loaded configuration.
pub fn http_client(config: &FailoverConfig) -> Result<FailoverClient<HttpDispatcher>, DispatchError> {
    let dispatcher = HttpDispatcher::new(&config.cluster)?;
    let selector = Arc::new(FailoverSelector::from_config(config));
    Ok(FailoverClient::new(selector, dispatcher))
}
