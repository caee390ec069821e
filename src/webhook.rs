use crate::config::WebhookConfig;
use crate::error::{Error, Result, SearchError};
use crate::model::{ResultRecord, SearchCriteria};
use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

const FENCE: &str = "```";
const MAX_REDIRECTS: usize = 10;
const RATE_LIMIT_MARKERS: [&str; 3] = ["too many requests", "rate limit", "scenario"];

/// Anything that can turn search criteria into result records.
#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search(
        &self,
        criteria: &SearchCriteria,
    ) -> std::result::Result<Vec<ResultRecord>, SearchError>;
}

/// Posts criteria to the automation webhook and normalizes its reply.
pub struct WebhookClient {
    client: Client,
    endpoint: Url,
    timeout: Duration,
    rate_limit_cooldown_secs: u64,
}

impl WebhookClient {
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.url)
            .map_err(|e| Error::Config(format!("webhook url {:?}: {}", config.url, e)))?;
        let timeout = Duration::from_millis(config.timeout_ms);

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("clients-radar/", env!("CARGO_PKG_VERSION")))
            .redirect(same_origin_redirects())
            .build()?;

        Ok(Self {
            client,
            endpoint,
            timeout,
            rate_limit_cooldown_secs: config.rate_limit_cooldown_secs,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn classify_transport(&self, err: reqwest::Error) -> SearchError {
        if err.is_timeout() {
            SearchError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else if err.is_redirect() {
            SearchError::CrossOriginBlocked
        } else if err.is_connect() {
            SearchError::NetworkUnavailable
        } else {
            SearchError::Transport(err.to_string())
        }
    }

    fn classify_status(&self, status: StatusCode, body: &str) -> SearchError {
        if is_rate_limited(status, body) {
            return SearchError::RateLimited {
                cooldown_secs: self.rate_limit_cooldown_secs,
            };
        }
        if body.trim().is_empty() {
            SearchError::RequestFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status")
            ))
        } else {
            SearchError::RequestFailed(body.to_string())
        }
    }
}

#[async_trait]
impl SearchService for WebhookClient {
    async fn search(
        &self,
        criteria: &SearchCriteria,
    ) -> std::result::Result<Vec<ResultRecord>, SearchError> {
        log::info!("Posting search for niche {:?} to {}", criteria.niche, self.endpoint);

        let res = self
            .client
            .post(self.endpoint.clone())
            .json(criteria)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let status = res.status();
        log::info!("Webhook responded with {}", status);

        if !status.is_success() {
            let body = match res.text().await {
                Ok(body) => body,
                Err(e) => {
                    log::warn!("Could not read error response body: {}", e);
                    String::new()
                }
            };
            if !body.is_empty() {
                log::error!("Error response body: {}", body);
            }
            return Err(self.classify_status(status, &body));
        }

        let body = res.text().await.map_err(|e| self.classify_transport(e))?;
        log::debug!("Raw response body: {}", body);
        parse_results(&body)
    }
}

/// Refuses redirects that leave the endpoint's origin.
fn same_origin_redirects() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            return attempt.stop();
        }
        let same_origin = attempt
            .previous()
            .first()
            .is_some_and(|first| first.origin() == attempt.url().origin());
        if same_origin {
            attempt.follow()
        } else {
            attempt.error("cross-origin redirect blocked")
        }
    })
}

pub fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    let body = body.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|marker| body.contains(marker))
}

/// Removes a markdown code fence (with optional language tag) around `raw`.
/// Unfenced text is returned trimmed.
pub fn strip_code_fence(raw: &str) -> &str {
    let text = raw.trim();
    if !(text.starts_with(FENCE) && text.ends_with(FENCE)) {
        return text;
    }

    let inner = &text[FENCE.len()..];
    let inner = inner
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .trim_start();
    inner.strip_suffix(FENCE).unwrap_or(inner).trim_end()
}

/// Parses a successful webhook body into result records.
pub fn parse_results(body: &str) -> std::result::Result<Vec<ResultRecord>, SearchError> {
    let cleaned = strip_code_fence(body);

    let value: Value = serde_json::from_str(cleaned).map_err(|e| {
        log::error!("JSON parsing failed for {:?}: {}", cleaned, e);
        SearchError::InvalidResponse(format!("Invalid JSON response from server: {}", e))
    })?;

    let Value::Array(items) = value else {
        return Err(SearchError::InvalidResponse(
            "Server response is not an array of results".to_string(),
        ));
    };
    if items.is_empty() {
        return Err(SearchError::EmptyResults);
    }

    Ok(items.into_iter().map(ResultRecord::from).collect())
}
