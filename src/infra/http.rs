//! Shared HTTP fetcher: one reqwest client with an explicit timeout, plus
//! bounded retries with exponential backoff for transient failures.

use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::StatusCode;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::common::error::{AggregatorError, Result};
use crate::observability::metrics;

const USER_AGENT: &str = "event-scout/0.1 (+https://github.com/event-scout)";
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 500;

pub struct HttpFetcher {
    client: reqwest::Client,
    max_retries: u32,
    retry_delay: Duration,
}

/// Transient statuses are retried; other non-2xx statuses are permanent
/// for the request.
fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        })
    }

    /// GET a JSON document with the given query parameters and headers,
    /// retrying transient failures (connect/timeout errors, 5xx, 429, 408)
    /// with exponential backoff.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, &str)],
    ) -> Result<serde_json::Value> {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.retry_delay,
            max_interval: self.retry_delay * 16,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };

        let mut last_error: Option<AggregatorError> = None;

        for attempt in 0..=self.max_retries {
            let started = Instant::now();
            let mut request = self.client.get(url).query(query);
            for (name, value) in headers {
                request = request.header(*name, *value);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    metrics::providers::request_duration(started.elapsed().as_secs_f64());

                    if status.is_success() {
                        metrics::providers::request_success();
                        debug!(url, status = status.as_u16(), attempt, "HTTP GET succeeded");
                        return Ok(response.json::<serde_json::Value>().await?);
                    }

                    metrics::providers::request_error();
                    let error = AggregatorError::Provider {
                        message: format!("{} returned status {}", url, status),
                    };
                    if !is_transient_status(status) {
                        return Err(error);
                    }
                    last_error = Some(error);
                }
                Err(e) => {
                    metrics::providers::request_error();
                    let transient = e.is_timeout() || e.is_connect();
                    let error = AggregatorError::Http(e);
                    if !transient {
                        return Err(error);
                    }
                    last_error = Some(error);
                }
            }

            if attempt < self.max_retries {
                if let Some(delay) = backoff.next_backoff() {
                    warn!(url, attempt = attempt + 1, ?delay, "transient failure, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AggregatorError::Provider {
            message: format!("{} failed after {} attempts", url, self.max_retries + 1),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_status_classification() {
        assert!(is_transient_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::REQUEST_TIMEOUT));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::UNAUTHORIZED));
        assert!(!is_transient_status(StatusCode::BAD_REQUEST));
    }
}
