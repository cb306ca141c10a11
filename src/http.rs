//! Shared HTTP plumbing for the model services
//!
//! Embedding and generation both talk JSON over HTTP with a per-request
//! timeout and a bounded number of retries on transient failures.

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// First backoff delay; doubles on every retry
const BASE_BACKOFF: Duration = Duration::from_millis(250);

/// Longest single backoff delay
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// A JSON service endpoint with timeout and retry policy
#[derive(Debug, Clone)]
pub struct ServiceClient {
    client: Client,
    base_url: Url,
    retries: usize,
}

/// Why a call failed, before it is mapped to a domain error
#[derive(Debug)]
pub struct CallError {
    pub message: String,
    pub transient: bool,
}

impl ServiceClient {
    pub fn new(base_url: &str, timeout: Duration, retries: usize) -> crate::error::Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        // Endpoints join relative to the base, so keep any path prefix as a directory
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            retries,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `path` under the base URL, keeping any base path prefix
    pub fn endpoint(&self, path: &str) -> std::result::Result<Url, CallError> {
        self.base_url.join(path.trim_start_matches('/')).map_err(|e| CallError {
            message: format!("invalid service URL: {}", e),
            transient: false,
        })
    }

    /// POST a JSON body and decode the JSON response, retrying transient failures
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> std::result::Result<T, CallError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let request = self.client.post(url).json(body);
        self.send_with_retry(request).await
    }

    async fn send_with_retry<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> std::result::Result<T, CallError> {
        let mut attempt = 0;
        loop {
            let req = request.try_clone().ok_or_else(|| CallError {
                message: "request body cannot be retried".to_string(),
                transient: false,
            })?;

            let err = match send_once(req).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !err.transient || attempt >= self.retries {
                return Err(err);
            }

            let delay = backoff_delay(attempt);
            warn!(
                attempt = attempt + 1,
                retries = self.retries,
                error = %err.message,
                "Transient service failure, retrying in {:?}",
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

async fn send_once<T: DeserializeOwned>(req: RequestBuilder) -> std::result::Result<T, CallError> {
    let response = req.send().await.map_err(|e| CallError {
        transient: e.is_timeout() || e.is_connect() || e.is_request(),
        message: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        debug!(%status, "Service returned error body: {}", body);
        return Err(CallError {
            transient: is_transient_status(status),
            message: format!("{}: {}", status, body.trim()),
        });
    }

    response.json::<T>().await.map_err(|e| CallError {
        message: format!("malformed response: {}", e),
        transient: false,
    })
}

/// Exponential backoff for the given zero-based retry, capped at [`MAX_BACKOFF`]
fn backoff_delay(attempt: usize) -> Duration {
    let factor = 2u32.saturating_pow(u32::try_from(attempt).unwrap_or(u32::MAX));
    BASE_BACKOFF.saturating_mul(factor).min(MAX_BACKOFF)
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}
