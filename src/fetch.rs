///! Conditional HTTP fetcher
///!
///! HEAD/GET requests carrying `If-Modified-Since`, with 304 responses
///! surfaced as a distinct outcome instead of an error.

use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::header::{HeaderName, ETAG, IF_MODIFIED_SINCE, LAST_MODIFIED};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

const FETCH_TIMEOUT_SECONDS: u64 = 5;

/// Outcome of a conditional HEAD request.
#[derive(Debug, Clone)]
pub enum HeadOutcome {
    NotModified,
    /// A missing ETag header is not an error, just no signal.
    Fresh { etag: Option<String> },
}

/// Body and validators from a successful conditional GET.
#[derive(Debug, Clone)]
pub struct FrameResponse {
    pub bytes: Vec<u8>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_length: Option<u64>,
}

/// Outcome of a conditional GET request.
#[derive(Debug, Clone)]
pub enum GetOutcome {
    NotModified,
    Fetched(FrameResponse),
}

/// Seam between the refresh logic and the network.
#[async_trait]
pub trait RadarFetch: Send + Sync {
    async fn head(
        &self,
        url: &str,
        if_modified_since: Option<&str>,
    ) -> Result<HeadOutcome, FetchError>;

    async fn get(
        &self,
        url: &str,
        if_modified_since: Option<&str>,
    ) -> Result<GetOutcome, FetchError>;
}

/// reqwest-backed fetcher used in production.
///
/// The client is shared and safe for concurrent use; every request is
/// individually bounded to 5 seconds.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Use an existing client (e.g. the host platform's shared session).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RadarFetch for HttpFetcher {
    async fn head(
        &self,
        url: &str,
        if_modified_since: Option<&str>,
    ) -> Result<HeadOutcome, FetchError> {
        let mut request = self
            .client
            .head(url)
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECONDS));
        if let Some(since) = if_modified_since {
            request = request.header(IF_MODIFIED_SINCE, since);
        }

        let response = request.send().await?;
        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(HeadOutcome::NotModified);
        }
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        Ok(HeadOutcome::Fresh {
            etag: header_string(&response, ETAG),
        })
    }

    async fn get(
        &self,
        url: &str,
        if_modified_since: Option<&str>,
    ) -> Result<GetOutcome, FetchError> {
        let mut request = self
            .client
            .get(url)
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECONDS));
        if let Some(since) = if_modified_since {
            request = request.header(IF_MODIFIED_SINCE, since);
        }

        let response = request.send().await?;
        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(GetOutcome::NotModified);
        }
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let etag = header_string(&response, ETAG);
        let last_modified = header_string(&response, LAST_MODIFIED);
        let content_length = response.content_length();
        let bytes = response.bytes().await?.to_vec();

        tracing::debug!("GET {} -> {} bytes", url, bytes.len());

        Ok(GetOutcome::Fetched(FrameResponse {
            bytes,
            etag,
            last_modified,
            content_length,
        }))
    }
}

fn header_string(response: &Response, name: HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}
