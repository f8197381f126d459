//! Rolling-window request quota shared by each provider adapter.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Tracks request timestamps over a rolling window. Adapters pre-check the
/// quota and reject immediately when it is exhausted rather than queueing.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    max_requests: u32,
    window: Duration,
    hits: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                max_requests,
                window,
                hits: Mutex::new(VecDeque::new()),
            }),
        }
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    /// Record a request if the window has capacity. Returns false when the
    /// quota is exhausted; the caller must skip the call.
    pub async fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut hits = self.inner.hits.lock().await;
        while let Some(front) = hits.front() {
            if now.duration_since(*front) >= self.inner.window {
                hits.pop_front();
            } else {
                break;
            }
        }
        if hits.len() as u32 >= self.inner.max_requests {
            return false;
        }
        hits.push_back(now);
        true
    }

    /// Requests still available in the current window.
    pub async fn remaining(&self) -> u32 {
        let now = Instant::now();
        let mut hits = self.inner.hits.lock().await;
        while let Some(front) = hits.front() {
            if now.duration_since(*front) >= self.inner.window {
                hits.pop_front();
            } else {
                break;
            }
        }
        self.inner.max_requests.saturating_sub(hits.len() as u32)
    }
}
