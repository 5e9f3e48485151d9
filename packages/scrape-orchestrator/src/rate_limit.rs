//! Per-domain admission control.
//!
//! Each domain gets a fixed window that starts on first use. Admissions
//! inside the live window increment a counter; once the counter reaches the
//! ceiling further requests fail immediately. When the window elapses the
//! counter and boundary reset before the next request is evaluated.
//!
//! This is reset-based, not a true sliding window: a burst of up to
//! `2 * max_requests` can pass across a window boundary. Callers rely on
//! that permissiveness, so it is kept.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;
use url::Url;

use crate::error::{FetchError, FetchResult};

/// Stand-in reset time for windows that overflow the clock (about 30 years).
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Counter state for one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateWindow {
    pub domain: String,
    pub count: u32,
    pub window_reset_at: Instant,
}

pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            window,
            max_requests,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn windows(&self) -> MutexGuard<'_, HashMap<String, RateWindow>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// End of a window opened at `now`, clamped for windows too long to
    /// represent.
    fn window_end(&self, now: Instant) -> Instant {
        now.checked_add(self.window)
            .unwrap_or_else(|| now + FAR_FUTURE)
    }

    /// Admit one request for `domain` or fail with `RateLimitExceeded`.
    ///
    /// Reset, check and increment happen under one lock so two callers can
    /// never both pass on a just-reset window.
    pub fn admit(&self, domain: &str) -> FetchResult<()> {
        let now = Instant::now();
        let mut windows = self.windows();

        let state = windows
            .entry(domain.to_string())
            .or_insert_with(|| RateWindow {
                domain: domain.to_string(),
                count: 0,
                window_reset_at: self.window_end(now),
            });

        if now >= state.window_reset_at {
            state.count = 0;
            state.window_reset_at = self.window_end(now);
        }

        if state.count >= self.max_requests {
            warn!(
                domain = %domain,
                max_requests = self.max_requests,
                "Rate limit exceeded"
            );
            return Err(FetchError::RateLimitExceeded {
                domain: domain.to_string(),
                max_requests: self.max_requests,
                window: self.window,
            });
        }

        state.count += 1;
        Ok(())
    }

    /// [`RateLimiter::admit`] keyed by the URL's host.
    pub fn admit_url(&self, url: &Url) -> FetchResult<()> {
        self.admit(&domain_of(url))
    }

    /// Current window for `domain`, if one has been opened.
    pub fn snapshot(&self, domain: &str) -> Option<RateWindow> {
        self.windows().get(domain).cloned()
    }

    /// Forget all windows.
    pub fn reset(&self) {
        self.windows().clear();
    }
}

/// Rate-limit key for a URL: its lowercase host.
pub fn domain_of(url: &Url) -> String {
    url.host_str().unwrap_or_default().to_ascii_lowercase()
}
