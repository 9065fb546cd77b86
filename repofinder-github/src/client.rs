//! Authenticated GitHub REST transport
//!
//! Every request goes through [`GitHubClient::send`], which waits out
//! rate-limit suspensions, retries transient failures with jittered
//! exponential backoff and maps terminal statuses onto [`ApiError`].

use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use regex::Regex;
use reqwest::header::{HeaderMap, ACCEPT};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{ApiError, ApiResult};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

pub const JSON_ACCEPT: &str = "application/vnd.github+json";
pub const RAW_ACCEPT: &str = "application/vnd.github.raw+json";

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("repofinder/", env!("CARGO_PKG_VERSION"));

/// Suspension used when a limit response carries no reset hint
const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

static NEXT_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<([^>]+)>\s*;\s*rel="next""#).unwrap());

/// GitHub client configuration
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// API base URL (default: https://api.github.com)
    pub api_url: String,
    /// Personal access token
    pub token: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries after the first attempt for transient failures
    pub max_retries: u32,
    /// Base backoff delay in milliseconds
    pub retry_delay_ms: u64,
    /// Rate-limit suspensions tolerated for a single request
    pub max_rate_limit_waits: u32,
    /// Items requested per page
    pub per_page: u32,
    /// Pages fetched per paginated listing
    pub max_pages: u32,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            timeout_secs: 10,
            max_retries: 3,
            retry_delay_ms: 2000,
            max_rate_limit_waits: 5,
            per_page: 100,
            max_pages: 10,
        }
    }
}

impl GitHubConfig {
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}

/// Create the underlying HTTP client
pub fn create_http_client(config: &GitHubConfig) -> ApiResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ApiError::ClientBuild(e.to_string()))
}

/// GitHub meters search separately from everything else
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateResource {
    Core,
    Search,
}

impl RateResource {
    pub fn for_url(url: &str) -> Self {
        if url.contains("/search/") {
            RateResource::Search
        } else {
            RateResource::Core
        }
    }
}

/// Shared suspension state; once one request sees an exhausted limit,
/// every request against that resource waits for the reset
#[derive(Debug, Default)]
pub struct RateGate {
    blocked_until: Mutex<HashMap<RateResource, Instant>>,
}

impl RateGate {
    pub fn block_for(&self, resource: RateResource, wait: Duration) {
        let until = Instant::now() + wait;
        let mut blocked = self.blocked_until.lock();
        let entry = blocked.entry(resource).or_insert(until);
        if *entry < until {
            *entry = until;
        }
    }

    pub fn remaining(&self, resource: RateResource) -> Option<Duration> {
        let blocked = self.blocked_until.lock();
        blocked
            .get(&resource)
            .and_then(|until| until.checked_duration_since(Instant::now()))
            .filter(|d| !d.is_zero())
    }

    pub async fn wait(&self, resource: RateResource) {
        if let Some(wait) = self.remaining(resource) {
            debug!("Waiting {:?} for {:?} rate limit reset", wait, resource);
            tokio::time::sleep(wait).await;
        }
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

/// Time until `x-ratelimit-reset`, at least one second
fn reset_wait(headers: &HeaderMap) -> Option<Duration> {
    let reset = header_u64(headers, "x-ratelimit-reset")? as i64;
    let secs = (reset - Utc::now().timestamp()).max(1);
    Some(Duration::from_secs(secs as u64))
}

/// How long to suspend if this response is a rate-limit rejection
pub fn rate_limit_wait(status: StatusCode, headers: &HeaderMap) -> Option<Duration> {
    if status != StatusCode::FORBIDDEN && status != StatusCode::TOO_MANY_REQUESTS {
        return None;
    }
    if let Some(secs) = header_u64(headers, "retry-after") {
        return Some(Duration::from_secs(secs));
    }
    if header_u64(headers, "x-ratelimit-remaining") == Some(0) {
        return Some(reset_wait(headers).unwrap_or(DEFAULT_RATE_LIMIT_WAIT));
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Some(DEFAULT_RATE_LIMIT_WAIT);
    }
    None
}

/// Target of the `rel="next"` entry of a Link header
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get("link")?.to_str().ok()?;
    NEXT_LINK.captures(link).map(|c| c[1].to_string())
}

/// Outcome of one attempt that did not produce a usable response
enum Attempt {
    Retry(String),
    Fail(ApiError),
}

/// GitHub REST client
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    config: GitHubConfig,
    gate: Arc<RateGate>,
}

impl GitHubClient {
    pub fn new(config: GitHubConfig) -> ApiResult<Self> {
        let http = create_http_client(&config)?;
        Ok(Self {
            http,
            config,
            gate: Arc::new(RateGate::default()),
        })
    }

    pub fn config(&self) -> &GitHubConfig {
        &self.config
    }

    pub fn gate(&self) -> &RateGate {
        &self.gate
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self
            .config
            .retry_delay_ms
            .saturating_mul(1u64 << attempt.saturating_sub(1).min(6));
        let jitter = rand::thread_rng().gen_range(0..=self.config.retry_delay_ms / 2);
        Duration::from_millis(base + jitter)
    }

    fn classify(&self, url: &str, status: StatusCode) -> Attempt {
        match status.as_u16() {
            401 => Attempt::Fail(ApiError::Unauthorized),
            403 | 451 => Attempt::Fail(ApiError::Forbidden(url.to_string())),
            404 | 410 => Attempt::Fail(ApiError::NotFound(url.to_string())),
            409 => Attempt::Fail(ApiError::Conflict(url.to_string())),
            422 => Attempt::Fail(ApiError::Invalid(url.to_string())),
            408 | 500..=599 => Attempt::Retry(format!("status {}", status)),
            other => Attempt::Fail(ApiError::Status {
                status: other,
                url: url.to_string(),
            }),
        }
    }

    /// GET with rate-limit handling and retries
    pub async fn send(&self, url: &str, accept: &str) -> ApiResult<Response> {
        let resource = RateResource::for_url(url);
        let mut attempts = 0u32;
        let mut waits = 0u32;

        loop {
            self.gate.wait(resource).await;

            let mut request = self
                .http
                .get(url)
                .header(ACCEPT, accept)
                .header("X-GitHub-Api-Version", API_VERSION);
            if let Some(token) = &self.config.token {
                request = request.bearer_auth(token);
            }

            let outcome = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let headers = response.headers();

                    if status.is_success() {
                        if header_u64(headers, "x-ratelimit-remaining") == Some(0) {
                            if let Some(wait) = reset_wait(headers) {
                                self.gate.block_for(resource, wait);
                            }
                        }
                        return Ok(response);
                    }

                    if let Some(wait) = rate_limit_wait(status, headers) {
                        waits += 1;
                        if waits > self.config.max_rate_limit_waits {
                            return Err(ApiError::RateLimited {
                                url: url.to_string(),
                                waits: waits - 1,
                            });
                        }
                        warn!(
                            "Rate limited on {:?}, suspending for {}s ({}/{})",
                            resource,
                            wait.as_secs(),
                            waits,
                            self.config.max_rate_limit_waits
                        );
                        self.gate.block_for(resource, wait);
                        continue;
                    }

                    self.classify(url, status)
                }
                Err(e) => Attempt::Retry(e.to_string()),
            };

            match outcome {
                Attempt::Fail(err) => return Err(err),
                Attempt::Retry(reason) => {
                    attempts += 1;
                    if attempts > self.config.max_retries {
                        return Err(ApiError::MaxRetries {
                            attempts,
                            url: url.to_string(),
                            last: reason,
                        });
                    }
                    let delay = self.backoff(attempts);
                    debug!(
                        "Retrying {} in {:?} ({}/{}): {}",
                        url, delay, attempts, self.config.max_retries, reason
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn decode<T: DeserializeOwned>(url: &str, response: Response) -> ApiResult<T> {
        let body = response.text().await.map_err(|e| ApiError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        let response = self.send(url, JSON_ACCEPT).await?;
        Self::decode(url, response).await
    }

    pub async fn get_text(&self, url: &str, accept: &str) -> ApiResult<String> {
        let response = self.send(url, accept).await?;
        response.text().await.map_err(|e| ApiError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// One page of a listing plus the next page URL; 204 is an empty page
    pub async fn get_page<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> ApiResult<(Vec<T>, Option<String>)> {
        let response = self.send(url, JSON_ACCEPT).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok((Vec::new(), None));
        }
        let next = next_link(response.headers());
        let items = Self::decode(url, response).await?;
        Ok((items, next))
    }

    /// Follow Link headers collecting at most `limit` items.
    ///
    /// `stop` is checked per item; the first item it accepts ends the
    /// listing and is not included.
    pub async fn paginate<T, F>(
        &self,
        first_url: &str,
        limit: Option<usize>,
        mut stop: F,
    ) -> ApiResult<Vec<T>>
    where
        T: DeserializeOwned,
        F: FnMut(&T) -> bool,
    {
        let mut collected = Vec::new();
        let mut url = Some(first_url.to_string());
        let mut pages = 0u32;

        while let Some(current) = url.take() {
            if pages >= self.config.max_pages {
                debug!("Page cap reached for {}", first_url);
                break;
            }
            pages += 1;

            let (items, next) = self.get_page::<T>(&current).await?;
            for item in items {
                if stop(&item) {
                    return Ok(collected);
                }
                collected.push(item);
                if limit.is_some_and(|l| collected.len() >= l) {
                    return Ok(collected);
                }
            }
            url = next;
        }

        Ok(collected)
    }
}
