//! In-memory request throttling for sensitive endpoints.
//!
//! DESIGN
//! ======
//! Fixed-window counters backed by `HashMap<String, WindowEntry>`. Each key is
//! an opaque caller-built string (`"login:1.2.3.4"`), and each check carries
//! its own `ThrottleConfig`, so one throttle instance serves every protected
//! operation:
//! - Login: 5 attempts/min
//! - Registration: 3 attempts/min
//! - Password reset: 3 attempts/min
//! - Generic API: 100 requests/min
//!
//! A background sweeper drops expired windows on a fixed interval so the map
//! stays bounded by the number of recently active keys.
//!
//! TRADE-OFFS
//! ==========
//! Fixed windows allow up to 2x the nominal rate across a window boundary.
//! That burst is acceptable for human-paced actions. State is process-local:
//! replicas each enforce their own budget.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::clock::Clock;

pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

// =============================================================================
// CONFIG
// =============================================================================

/// Budget for one protected operation. Both fields are positive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    max_requests: u32,
    window: Duration,
}

impl ThrottleConfig {
    pub const LOGIN: Self = Self::new(5, 60);
    pub const REGISTRATION: Self = Self::new(3, 60);
    pub const PASSWORD_RESET: Self = Self::new(3, 60);
    pub const API: Self = Self::new(100, 60);

    /// # Panics
    ///
    /// Panics if either value is zero.
    #[must_use]
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        assert!(max_requests > 0, "throttle max_requests must be positive");
        assert!(window_secs > 0, "throttle window_secs must be positive");
        Self { max_requests, window: Duration::from_secs(window_secs) }
    }

    #[must_use]
    pub const fn max_requests(&self) -> u32 {
        self.max_requests
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }
}

// =============================================================================
// DECISION
// =============================================================================

/// Outcome of a single `check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThrottleDecision {
    pub allowed: bool,
    /// Admissions left in the current window.
    pub remaining: u32,
    /// Seconds until the current window expires, rounded up.
    pub reset_in_secs: u64,
}

impl ThrottleDecision {
    fn denied(reset_in_secs: u64) -> Self {
        Self { allowed: false, remaining: 0, reset_in_secs }
    }
}

// =============================================================================
// THROTTLE
// =============================================================================

struct WindowEntry {
    count: u32,
    reset_at: Instant,
}

/// Shared fixed-window throttle. Cloning shares the underlying map.
#[derive(Clone)]
pub struct Throttle {
    entries: Arc<Mutex<HashMap<String, WindowEntry>>>,
    clock: Arc<dyn Clock>,
}

impl Throttle {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { entries: Arc::new(Mutex::new(HashMap::new())), clock }
    }

    /// Count an attempt against `key` and report whether it is admitted.
    ///
    /// Denied attempts do not touch the stored window.
    pub fn check(&self, key: &str, config: ThrottleConfig) -> ThrottleDecision {
        debug_assert!(!key.is_empty(), "throttle key must not be empty");
        let now = self.clock.now();
        let mut entries = self.lock();

        if let Some(entry) = entries.get_mut(key).filter(|e| now <= e.reset_at) {
            let reset_in_secs = ceil_secs(entry.reset_at.saturating_duration_since(now));
            if entry.count >= config.max_requests {
                return ThrottleDecision::denied(reset_in_secs);
            }
            entry.count += 1;
            return ThrottleDecision {
                allowed: true,
                remaining: config.max_requests - entry.count,
                reset_in_secs,
            };
        }

        // Absent or expired: start a fresh window.
        entries.insert(key.to_owned(), WindowEntry { count: 1, reset_at: now + config.window });
        ThrottleDecision {
            allowed: true,
            remaining: config.max_requests - 1,
            reset_in_secs: config.window.as_secs(),
        }
    }

    /// Drop every expired window. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| now <= entry.reset_at);
        before - entries.len()
    }

    /// Number of stored windows, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Start the periodic sweep. The task runs until the returned handle is
    /// shut down or dropped.
    #[must_use]
    pub fn spawn_sweeper(&self, every: Duration) -> ThrottleSweeper {
        let throttle = self.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        info!(interval_secs = every.as_secs(), "throttle sweeper started");

        // Anchor the period at spawn time, not at the task's first poll.
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let handle = tokio::spawn(async move {
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let removed = throttle.sweep();
                        if removed > 0 {
                            info!(removed, live = throttle.len(), "throttle sweep");
                        }
                    }
                }
            }
        });

        ThrottleSweeper { shutdown_tx, handle }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, WindowEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to the background sweep task.
pub struct ThrottleSweeper {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl ThrottleSweeper {
    /// Stop the sweep task and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "throttle sweeper exited abnormally");
        }
        info!("throttle sweeper stopped");
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn ceil_secs(d: Duration) -> u64 {
    u64::try_from(d.as_millis().div_ceil(1000)).unwrap_or(u64::MAX)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[path = "throttle_test.rs"]
mod tests;
