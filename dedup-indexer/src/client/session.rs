//! HTTP session shared by the manager client and every database handle.

use crate::config::{RetryConfig, StoreConfig};
use crate::utils::errors::{IndexerError, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, Proxy, RequestBuilder, Response};
use serde::Serialize;
use std::future::Future;
use tracing::{debug, warn};

pub(crate) struct Session {
    http: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| IndexerError::Config(format!("{name} contains characters not allowed in a header")))
}

impl Session {
    /// Authorization headers are fixed here for the session's lifetime.
    pub(crate) fn new(store: &StoreConfig, retry: &RetryConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("x-apikey", header_value("store.api_key", &store.api_key)?);
        headers.insert("x-idkey", header_value("store.tenant", &store.tenant)?);

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("dedup-indexer/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(retry.timeout());
        builder = match &store.proxy {
            Some(proxy) => builder.proxy(Proxy::all(proxy)?),
            None => builder.no_proxy(),
        };

        Ok(Self {
            http: builder.build()?,
            base_url: store.url.trim_end_matches('/').to_string(),
            retry: retry.clone(),
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    pub(crate) async fn send(&self, method: Method, url: &str) -> Result<Response> {
        dispatch(self.http.request(method, url)).await
    }

    pub(crate) async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: &B,
    ) -> Result<Response> {
        dispatch(self.http.request(method, url).json(body)).await
    }

    /// Retry an idempotent call on transient failures with exponential backoff.
    pub(crate) async fn with_retry<T, F, Fut>(&self, op: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.retry.attempts.max(1);
        let mut delay = self.retry.base_delay();
        let mut attempt = 1;
        loop {
            match call().await {
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        op, attempt, attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

async fn dispatch(request: RequestBuilder) -> Result<Response> {
    let response = request.send().await?;
    check_status(response).await
}

/// Map HTTP status ranges onto the error taxonomy.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().clone();
    let detail = response.text().await.unwrap_or_default();
    debug!("{} answered {}: {}", url, status, detail);

    let message = format!("HTTP_STATUS {} received from {}", status.as_u16(), url.path());
    Err(match status.as_u16() {
        401 | 403 => IndexerError::Unauthorized(message),
        400 => IndexerError::MalformedInput(message),
        402..=499 => IndexerError::NotFound(message),
        500..=599 => IndexerError::Server(message),
        other => IndexerError::UnexpectedStatus(other),
    })
}
