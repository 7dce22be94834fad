//! Fixed-window rate limiter for remote inference.

use crate::config::RateLimitConfig;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Per-caller call budget, held in process memory.
///
/// Never blocks on I/O and never fails. Windows are replaced, not
/// decremented, once their reset time has passed; [`RateLimiter::sweep`]
/// drops the expired ones.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    window: Duration,
    max: u32,
}

impl RateLimiter {
    pub fn new(window: Duration, max: u32) -> Self {
        Self {
            windows: DashMap::new(),
            window,
            max,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.window, config.max)
    }

    /// Count a call for `caller` and report whether it fits the budget.
    pub fn allow(&self, caller: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.windows.entry(caller.to_string()).or_insert(Window {
            count: 0,
            reset_at: now + self.window,
        });

        if now > entry.reset_at {
            *entry = Window {
                count: 0,
                reset_at: now + self.window,
            };
        }

        if entry.count < self.max {
            entry.count += 1;
            true
        } else {
            false
        }
    }

    /// Calls left for `caller` in its current window.
    pub fn remaining(&self, caller: &str) -> u32 {
        let now = Instant::now();
        match self.windows.get(caller) {
            Some(window) if now <= window.reset_at => self.max.saturating_sub(window.count),
            _ => self.max,
        }
    }

    /// Drop every window whose reset time has passed. Returns how many were
    /// removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|_, window| now <= window.reset_at);
        before.saturating_sub(self.windows.len())
    }

    /// Number of live windows.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Sweep on a fixed period until `shutdown` flips to `true`.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            // The first tick completes immediately.
            ticker.tick().await;

            info!(period_secs = period.as_secs(), "Starting rate limit sweeper");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = limiter.sweep();
                        if evicted > 0 {
                            debug!(evicted, live = limiter.len(), "Swept expired rate limit windows");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Rate limit sweeper shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }
}
