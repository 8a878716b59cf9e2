use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

/// Sliding-window attempt counter keyed by caller (one key per customer for AI replies).
pub struct SlidingWindowLimiter {
    max_attempts: usize,
    window: Duration,
    entries: Mutex<HashMap<String, Vec<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self { max_attempts: max_attempts as usize, window, entries: Mutex::new(HashMap::new()) }
    }

    /// Records an attempt when the key still has room in the window.
    pub async fn try_acquire(&self, key: &str) -> bool {
        self.try_acquire_at(key, Instant::now()).await
    }

    pub async fn try_acquire_at(&self, key: &str, now: Instant) -> bool {
        let mut entries = self.entries.lock().await;
        let attempts = entries.entry(key.to_string()).or_default();
        attempts.retain(|&at| now.saturating_duration_since(at) < self.window);

        if attempts.len() >= self.max_attempts {
            debug!(key, attempts = attempts.len(), limit = self.max_attempts, "rate limit reached");
            return false;
        }
        attempts.push(now);
        true
    }

    pub async fn remaining(&self, key: &str) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        let used = entries
            .get(key)
            .map(|attempts| {
                attempts.iter().filter(|&&at| now.saturating_duration_since(at) < self.window).count()
            })
            .unwrap_or(0);
        self.max_attempts.saturating_sub(used)
    }
}
