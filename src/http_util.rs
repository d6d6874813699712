use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::RETRY_AFTER;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct BackoffSchedule {
    pub initial: Duration,
    pub max: Duration,
}

impl BackoffSchedule {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial
            .checked_mul(factor)
            .unwrap_or(self.max)
            .min(self.max)
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(4),
            max: Duration::from_secs(64),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: BackoffSchedule,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: BackoffSchedule::default(),
        }
    }
}

#[derive(Debug)]
pub enum HttpFailure {
    Transport(String),
    Status { status: u16, message: String },
}

pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(format!("geoharvest/{}", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
}

/// Sends a request until it succeeds, retries are exhausted, or a
/// non-retryable response arrives. 429/5xx responses honor a `Retry-After`
/// seconds hint when the server provides one.
pub fn send_with_retries<F>(policy: &RetryPolicy, mut make_req: F) -> Result<Response, HttpFailure>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 0u32;
    loop {
        match make_req().send() {
            Ok(response) => {
                if response.status().is_success() {
                    return Ok(response);
                }
                let status = response.status().as_u16();
                if attempt < policy.max_retries && is_retryable_status(status) {
                    let wait = retry_after_hint(&response)
                        .unwrap_or_else(|| policy.backoff.delay_for(attempt));
                    warn!(status, wait_secs = wait.as_secs(), "retryable response, backing off");
                    thread::sleep(wait);
                    attempt += 1;
                    continue;
                }
                let message = response
                    .text()
                    .unwrap_or_else(|_| "request failed".to_string());
                return Err(HttpFailure::Status { status, message });
            }
            Err(err) => {
                if attempt < policy.max_retries && is_retryable_error(&err) {
                    let wait = policy.backoff.delay_for(attempt);
                    warn!(error = %err, wait_secs = wait.as_secs(), "request error, backing off");
                    thread::sleep(wait);
                    attempt += 1;
                    continue;
                }
                return Err(HttpFailure::Transport(err.to_string()));
            }
        }
    }
}

pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

pub fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn retry_after_hint(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

pub fn page_count(total: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}
