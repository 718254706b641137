//! Time source used for crawl budgets and request delays

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of the current time and of delays
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio timers
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug)]
struct MockState {
    now: DateTime<Utc>,
    sleeps: Vec<Duration>,
}

/// Manually driven clock for tests
///
/// `sleep` returns immediately and advances the clock by the requested
/// duration.
#[derive(Debug)]
pub struct MockClock {
    state: Mutex<MockState>,
}

impl MockClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(MockState {
                now,
                sleeps: Vec::new(),
            }),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, duration: Duration) {
        let Ok(delta) = chrono::Duration::from_std(duration) else {
            return;
        };
        if let Ok(mut state) = self.state.lock() {
            if let Some(now) = state.now.checked_add_signed(delta) {
                state.now = now;
            }
        }
    }

    /// Every duration passed to `sleep` so far
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state
            .lock()
            .map(|state| state.sleeps.clone())
            .unwrap_or_default()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

#[async_trait]
impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        self.state
            .lock()
            .map(|state| state.now)
            .unwrap_or_else(|poisoned| poisoned.into_inner().now)
    }

    async fn sleep(&self, duration: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.sleeps.push(duration);
        }
        self.advance(duration);
    }
}
