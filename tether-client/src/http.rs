//! HTTP remote worker
//!
//! Talks to a worker exposing a small JSON/text API:
//! - `GET  {base}/api/jobs/{id}/status` returns the status name as plain text;
//!   a 404 means the worker does not know the job
//! - `POST {base}/api/jobs/{id}/run` runs a script and returns its JSON output
//!
//! Connection pooling is left to `reqwest`; checking a client out only
//! clones the underlying handle and keeps count of outstanding clients.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use tether_core::UNKNOWN_STATUS;
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::worker::{RemoteWorker, StatusClient};

/// Request body for running a script on the worker
#[derive(Debug, Serialize)]
struct RunScriptRequest<'a> {
    script: &'a str,
}

/// Handle to a worker reachable over HTTP
///
/// The handle starts with no references: the owner calls [`reference`]
/// once the worker process is known to be up, and [`dereference`] when it
/// goes away.
///
/// [`reference`]: HttpRemoteWorker::reference
/// [`dereference`]: HttpRemoteWorker::dereference
#[derive(Debug)]
pub struct HttpRemoteWorker {
    /// Base URL of the worker (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
    references: AtomicI64,
    active_clients: AtomicUsize,
}

impl HttpRemoteWorker {
    /// Create a new worker handle
    ///
    /// # Example
    /// ```
    /// use tether_client::HttpRemoteWorker;
    ///
    /// let worker = HttpRemoteWorker::new("http://localhost:8080/");
    /// assert_eq!(worker.base_url(), "http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new worker handle with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            references: AtomicI64::new(0),
            active_clients: AtomicUsize::new(0),
        }
    }

    /// Get the base URL of the worker
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Adds a reference and returns the new count
    pub fn reference(&self) -> i64 {
        self.references.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Drops a reference and returns the new count
    pub fn dereference(&self) -> i64 {
        self.references.fetch_sub(1, Ordering::SeqCst) - 1
    }

    /// Number of clients checked out and not yet released
    pub fn active_clients(&self) -> usize {
        self.active_clients.load(Ordering::SeqCst)
    }

    /// A client for direct use, outside the checkout accounting
    ///
    /// Job payloads use this to submit their work to the worker.
    pub fn client(&self) -> HttpWorkerClient {
        HttpWorkerClient {
            base_url: self.base_url.clone(),
            client: self.client.clone(),
        }
    }
}

#[async_trait]
impl RemoteWorker for HttpRemoteWorker {
    fn reference_count(&self) -> i64 {
        self.references.load(Ordering::SeqCst)
    }

    async fn acquire_client(&self) -> Result<Box<dyn StatusClient>> {
        if self.reference_count() <= 0 {
            return Err(ClientError::Unavailable(format!(
                "worker at {} is not referenced",
                self.base_url
            )));
        }

        self.active_clients.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.client()))
    }

    fn release_client(&self, client: Box<dyn StatusClient>) {
        drop(client);
        self.active_clients.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Client for a single HTTP worker
#[derive(Debug, Clone)]
pub struct HttpWorkerClient {
    base_url: String,
    client: Client,
}

impl HttpWorkerClient {
    /// Run a script for a job on the worker
    ///
    /// # Arguments
    /// * `job_id` - The job the script belongs to
    /// * `script` - Source text the worker executes
    ///
    /// # Returns
    /// Whatever JSON output the worker produced
    pub async fn run_script(&self, job_id: &str, script: &str) -> Result<JsonValue> {
        let url = self.job_url(job_id, "run")?;
        debug!("Submitting script for job {} to {}", job_id, self.base_url);

        let response = self
            .client
            .post(url)
            .json(&RunScriptRequest { script })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Builds `{base}/api/jobs/{job_id}/{action}`, escaping the id as one path segment
    fn job_url(&self, job_id: &str, action: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            ClientError::ParseError(format!("Invalid worker URL {}: {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::ParseError(format!("Worker URL {} cannot have a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(["api", "jobs", job_id, action]);
        Ok(url)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize a JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = Self::check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Check the status code and return the trimmed body text
    async fn handle_text_response(&self, response: reqwest::Response) -> Result<String> {
        let response = Self::check_status(response).await?;
        let text = response.text().await?;
        Ok(text.trim().to_string())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(response)
    }
}

#[async_trait]
impl StatusClient for HttpWorkerClient {
    async fn get_status(&self, job_id: &str) -> Result<String> {
        let url = self.job_url(job_id, "status")?;
        let response = self.client.get(url).send().await?;

        unknown_if_not_found(self.handle_text_response(response).await)
    }
}

/// A worker that answers 404 has no record of the job
fn unknown_if_not_found(result: Result<String>) -> Result<String> {
    match result {
        Err(e) if e.is_not_found() => Ok(UNKNOWN_STATUS.to_string()),
        other => other,
    }
}
