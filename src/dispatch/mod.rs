//! 记录分发模块：对单个条目发起一次 HTTP 请求并归一化结果。
//!
//! # Record Dispatcher
//!
//! Turns one [`Item`] into one [`ResultRecord`]:
//!
//! 1. compute params with the injected [`ItemToParams`]
//! 2. render the URL template from the item's fields
//! 3. wait for a rate-limiter slot and issue exactly one request
//! 4. normalize the outcome
//!
//! | Outcome | Recorded `response` |
//! |---------|---------------------|
//! | 200 + JSON content type | decoded body |
//! | 200 + other content type | raw text body |
//! | any other status | the status code |
//! | connect/timeout/reset | `{"error": "transport", ...}` |
//! | missing template field | `{"error": "template", ...}` |
//! | unparseable JSON body | `{"error": "decode", ...}` |
//!
//! [`Dispatcher::dispatch`] never fails; one bad item cannot take down its chunk.

pub mod params;

pub use params::{ItemToParams, NoParams, ParamMapping, Params};

use crate::resilience::{RateLimiter, RetryPolicy};
use crate::transport::{HttpMethod, HttpTransport};
use crate::types::{FailureKind, Item, Payload, ResultRecord};
use crate::utils::template::Template;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::StatusCode;
use std::sync::Arc;
use tracing::{debug, warn};

/// Request shape shared by every item of a run. Immutable once built.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: HttpMethod,
    pub url: Template,
    pub headers: HeaderMap,
}

impl RequestSpec {
    pub fn new(method: HttpMethod, url: Template) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// Issues one request per item against a shared client and limiter.
pub struct Dispatcher {
    transport: HttpTransport,
    limiter: Arc<RateLimiter>,
    spec: RequestSpec,
    params: Arc<dyn ItemToParams>,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(
        transport: HttpTransport,
        limiter: Arc<RateLimiter>,
        spec: RequestSpec,
        params: Arc<dyn ItemToParams>,
    ) -> Self {
        Self {
            transport,
            limiter,
            spec,
            params,
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn spec(&self) -> &RequestSpec {
        &self.spec
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Dispatch one item and return its normalized outcome.
    pub async fn dispatch(&self, item: &Item) -> ResultRecord {
        let params = self.params.params(item);
        let url = match self.spec.url.render(item) {
            Ok(url) => url,
            Err(e) => {
                warn!(template = %self.spec.url, error = %e, "Skipping item: URL template failed");
                return ResultRecord::failure(
                    self.spec.url.source(),
                    FailureKind::Template,
                    e.to_string(),
                );
            }
        };

        let mut attempt = 0u32;
        loop {
            self.limiter.acquire().await;
            let record = self.send_once(&url, &params).await;

            match self.retry.should_retry(attempt, &record.response) {
                Some(delay) => {
                    attempt += 1;
                    debug!(
                        url = %record.url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying request"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    log_outcome(&record);
                    return record;
                }
            }
        }
    }

    async fn send_once(&self, url: &str, params: &[(String, String)]) -> ResultRecord {
        let request = match self
            .transport
            .prepare(self.spec.method, url, &self.spec.headers, params)
        {
            Ok(request) => request,
            Err(e) => return ResultRecord::failure(url, FailureKind::Transport, e.to_string()),
        };
        let request_url = request.url().to_string();
        debug!(method = %self.spec.method, url = %request_url, "Sending request");

        let response = match self.transport.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                return ResultRecord::failure(request_url, FailureKind::Transport, e.to_string())
            }
        };

        let response_url = response.url().to_string();
        let status = response.status();
        if status != StatusCode::OK {
            return ResultRecord::new(response_url, Payload::Status(status.as_u16()));
        }

        let is_json = is_json_content_type(response.headers());
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return ResultRecord::failure(response_url, FailureKind::Transport, e.to_string())
            }
        };

        if !is_json {
            return ResultRecord::new(response_url, Payload::Text(body));
        }
        match serde_json::from_str(&body) {
            Ok(value) => ResultRecord::new(response_url, Payload::Json(value)),
            Err(e) => ResultRecord::failure(response_url, FailureKind::Decode, e.to_string()),
        }
    }
}

fn log_outcome(record: &ResultRecord) {
    match &record.response {
        Payload::Status(code) => warn!(url = %record.url, status = code, "Request returned non-200 status"),
        Payload::Failure(f) => {
            warn!(url = %record.url, kind = ?f.error, detail = %f.detail, "Request failed")
        }
        Payload::Json(_) | Payload::Text(_) => debug!(url = %record.url, "Request succeeded"),
    }
}

/// `application/json` or any `+json` media type.
pub fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| {
            let essence = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            essence == "application/json" || essence.ends_with("+json")
        })
        .unwrap_or(false)
}
