//! HTTP client for the internal API.

use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

use crate::config::InternalApiConfig;
use crate::internal_api::forwarder::CredentialForwarder;
use crate::internal_api::models::{OrgSummary, PagedResult};

/// Internal API call failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request was cancelled by the caller.
    Cancelled,
    /// The configured timeout elapsed.
    Timeout,
    /// Connection or protocol failure.
    Transport(String),
    /// Non-success HTTP status.
    Status { status: u16, path: String },
    /// Response body did not match the expected shape.
    Decode(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "Internal API request cancelled"),
            Self::Timeout => write!(f, "Internal API request timed out"),
            Self::Transport(msg) => write!(f, "Internal API transport error: {}", msg),
            Self::Status { status, path } => {
                write!(f, "Internal API returned HTTP {} for {}", status, path)
            }
            Self::Decode(msg) => write!(f, "Internal API response could not be decoded: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

/// Client for the internal API, bound to one session's credentials.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct InternalApiClient {
    http: reqwest::Client,
    base_url: Url,
    max_page_size: u32,
    forwarder: CredentialForwarder,
}

impl InternalApiClient {
    pub fn new(config: &InternalApiConfig, forwarder: CredentialForwarder) -> anyhow::Result<Self> {
        let mut base_url = Url::parse(&config.base_url)?;
        // Keep any path prefix when joining relative endpoints.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            base_url,
            max_page_size: config.max_page_size,
            forwarder,
        })
    }

    /// Same client and settings, different session credentials.
    pub fn with_forwarder(&self, forwarder: CredentialForwarder) -> Self {
        Self {
            forwarder,
            ..self.clone()
        }
    }

    pub fn max_page_size(&self) -> u32 {
        self.max_page_size
    }

    pub async fn get_my_org_summary(
        &self,
        cancel: &CancellationToken,
    ) -> Result<OrgSummary, ApiError> {
        self.get_json("org/summary", &[], cancel).await
    }

    pub async fn search_items(
        &self,
        query: &str,
        page: u32,
        page_size: u32,
        cancel: &CancellationToken,
    ) -> Result<PagedResult<String>, ApiError> {
        let page_size = page_size.min(self.max_page_size);
        let params = [
            ("query", query.to_string()),
            ("page", page.to_string()),
            ("pageSize", page_size.to_string()),
        ];
        self.get_json("items/search", &params, cancel).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<T, ApiError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let mut request = self.http.get(url);
        if !params.is_empty() {
            request = request.query(params);
        }
        let request = self.forwarder.attach(request);

        info!("Calling internal API: GET /{}", path);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ApiError::Cancelled),
            sent = request.send() => sent.map_err(classify_reqwest)?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                path: format!("/{}", path),
            });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            body = response.json::<T>() => body.map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout
                } else {
                    ApiError::Decode(e.to_string())
                }
            }),
        }
    }
}

fn classify_reqwest(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Transport(e.without_url().to_string())
    }
}
