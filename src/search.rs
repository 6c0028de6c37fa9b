//! Web search through the Tavily API.
//!
//! [`SearchClient`] is the seam the pipeline depends on; [`TavilyClient`] is
//! the production implementation. Every failure is mapped into a
//! [`SearchError`], and an empty result list counts as a failure.

use crate::error::SearchError;
use crate::models::Snippet;
use crate::retry::RetryPolicy;
use crate::utils::truncate_for_log;
use itertools::Itertools;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

/// Anything that turns a query into ordered snippets.
pub trait SearchClient {
    async fn search(&self, query: &str) -> Result<Vec<Snippet>, SearchError>;
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'static str,
    include_images: bool,
    max_results: usize,
}

/// The query-level `images` array is not tied to any result and is ignored.
#[derive(Debug, Deserialize)]
struct TavilyResponse {
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    images: Vec<TavilyImage>,
}

/// Tavily returns images either as bare URLs or as `{url, description}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TavilyImage {
    Url(String),
    Described { url: String },
}

impl TavilyImage {
    fn into_url(self) -> String {
        match self {
            TavilyImage::Url(url) | TavilyImage::Described { url } => url,
        }
    }
}

/// Tavily search client.
#[derive(Debug)]
pub struct TavilyClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    max_results: usize,
    retry: RetryPolicy,
}

impl TavilyClient {
    /// Create a client for the Tavily search endpoint.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Tavily API key, sent in the request body
    /// * `max_results` - Upper bound on results requested per query
    /// * `timeout` - Per-request timeout, applied to every attempt
    /// * `retry` - Backoff policy for rate limits, network errors and 5xx
    ///
    /// # Errors
    ///
    /// [`SearchError::Network`] if the HTTP client cannot be built.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let client = TavilyClient::new("tvly-...", 10, Duration::from_secs(60), RetryPolicy::default())?;
    /// let snippets = client.search("Reston, Virginia news").await?;
    /// ```
    pub fn new(
        api_key: &str,
        max_results: usize,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            endpoint: TAVILY_SEARCH_URL.to_string(),
            max_results,
            retry,
        })
    }

    async fn search_once(&self, query: &str) -> Result<Vec<Snippet>, SearchError> {
        let request = TavilyRequest {
            api_key: &self.api_key,
            query,
            search_depth: "advanced",
            include_images: true,
            max_results: self.max_results,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_status(status, body));
        }

        parse_response(query, &body)
    }
}

impl SearchClient for TavilyClient {
    #[instrument(level = "info", skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<Snippet>, SearchError> {
        let t0 = Instant::now();
        let snippets = self
            .retry
            .run("tavily.search", || self.search_once(query))
            .await?;
        info!(
            count = snippets.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "Tavily search returned results"
        );
        Ok(snippets)
    }
}

fn classify_status(status: StatusCode, body: String) -> SearchError {
    let body = truncate_for_log(&body, 300);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SearchError::Auth {
            status: status.as_u16(),
            body,
        },
        StatusCode::TOO_MANY_REQUESTS => SearchError::RateLimited(body),
        _ => SearchError::Api {
            status: status.as_u16(),
            body,
        },
    }
}

/// Decode a Tavily response body into snippets.
///
/// Results with blank content are dropped, and so is any later result whose
/// URL repeats an earlier one. Results without a URL are always kept. A
/// snippet's image is the first image attached to that result, if any.
///
/// # Errors
///
/// [`SearchError::Malformed`] when the body is not a Tavily response, and
/// [`SearchError::Empty`] when no usable result remains.
fn parse_response(query: &str, body: &str) -> Result<Vec<Snippet>, SearchError> {
    let parsed: TavilyResponse =
        serde_json::from_str(body).map_err(|e| SearchError::Malformed(e.to_string()))?;

    let snippets: Vec<Snippet> = parsed
        .results
        .into_iter()
        .filter(|r| r.content.as_deref().is_some_and(|c| !c.trim().is_empty()))
        .enumerate()
        .unique_by(|(i, r)| r.url.clone().ok_or(*i))
        .map(|(_, r)| Snippet {
            title: r.title.unwrap_or_else(|| "No Title".to_string()),
            content: r.content.unwrap_or_default(),
            url: r.url,
            published_date: r.published_date,
            image_url: r.images.into_iter().next().map(TavilyImage::into_url),
        })
        .collect();

    debug!(count = snippets.len(), "Parsed Tavily results");

    if snippets.is_empty() {
        return Err(SearchError::Empty(query.to_string()));
    }
    Ok(snippets)
}
