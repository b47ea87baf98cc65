//! Per-user fixed-window rate limiting for AI-backed endpoints.
//!
//! Fixed window, not sliding: a user can spend a full quota at the tail of one
//! window and another immediately after it rolls over. That imprecision is
//! acceptable here; the limiter protects a third-party-billed generation API
//! from casual abuse, it does not provide hard guarantees.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::time::interval;
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct Window {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// In-process fixed-window request counter keyed by user id.
///
/// State is per process: it is lost on restart and not shared across
/// horizontally scaled instances, so limits apply per instance.
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    max_requests: u32,
    window: chrono::Duration,
}

impl Default for RateLimiter {
    /// Default: 10 requests per minute per user.
    fn default() -> Self {
        Self::new(10, Duration::from_secs(60))
    }
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window: chrono::Duration::from_std(window)
                .unwrap_or_else(|_| chrono::Duration::seconds(60)),
        }
    }

    /// Count a request against the user's current window.
    ///
    /// Returns `true` if the request is allowed (and counted), `false` if the
    /// user is over the limit. A denied call does not mutate state.
    pub fn check_and_consume(&self, user_id: &str) -> bool {
        self.check_and_consume_at(user_id, Utc::now())
    }

    /// Requests the user may still make in the current window. An absent or
    /// expired window reads as full quota.
    pub fn remaining_requests(&self, user_id: &str) -> u32 {
        self.remaining_requests_at(user_id, Utc::now())
    }

    /// When the user's current window expires. An absent or expired window
    /// reads as "now".
    pub fn window_reset_at(&self, user_id: &str) -> DateTime<Utc> {
        self.window_reset_at_at(user_id, Utc::now())
    }

    /// Remove windows that have already expired. Expired entries behave
    /// identically to absent ones, so this never changes observable behavior;
    /// it only bounds memory for long-lived processes.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    /// Spawn a background task sweeping expired windows on an interval.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        info!("Starting rate limit sweeper with interval {:?}", every);
        tokio::spawn(async move {
            let mut interval = interval(every);
            loop {
                interval.tick().await;
                let removed = self.sweep_expired();
                if removed > 0 {
                    debug!(removed, "Swept expired rate limit windows");
                }
            }
        })
    }

    fn check_and_consume_at(&self, user_id: &str, now: DateTime<Utc>) -> bool {
        // The entry guard holds the shard lock, making the check-and-increment
        // atomic per key: count never exceeds max_requests within a window.
        let mut entry = self
            .windows
            .entry(user_id.to_string())
            .or_insert_with(|| Window {
                count: 0,
                reset_at: now + self.window,
            });

        if now >= entry.reset_at {
            // Window expired: start a fresh one with this request counted.
            entry.count = 1;
            entry.reset_at = now + self.window;
            return true;
        }

        if entry.count >= self.max_requests {
            return false;
        }

        entry.count += 1;
        true
    }

    fn remaining_requests_at(&self, user_id: &str, now: DateTime<Utc>) -> u32 {
        match self.windows.get(user_id) {
            Some(window) if now < window.reset_at => {
                self.max_requests.saturating_sub(window.count)
            }
            _ => self.max_requests,
        }
    }

    fn window_reset_at_at(&self, user_id: &str, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.windows.get(user_id) {
            Some(window) if now < window.reset_at => window.reset_at,
            _ => now,
        }
    }

    fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| now < window.reset_at);
        before.saturating_sub(self.windows.len())
    }
}
