//! Fixed-window rate limiting per (user, operation class)
//!
//! Counters live behind [`CounterStore`] so a shared store can replace the
//! in-process map when several instances serve the same users.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::{RateBudget, RateLimitConfig};
use crate::error::{StudioError, StudioResult};

/// Budgeted operation, named explicitly by each caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationClass {
    Create,
    Status,
    Cancel,
    List,
}

impl OperationClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationClass::Create => "create",
            OperationClass::Status => "status",
            OperationClass::Cancel => "cancel",
            OperationClass::List => "list",
        }
    }
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// When the current window closes
    pub reset_at: Instant,
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Count one call against `key` unless the window's budget is spent
    async fn increment_and_check(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> StudioResult<RateDecision>;

    async fn reset(&self, key: &str);

    /// Drop counters whose window has closed; returns how many were removed
    async fn sweep(&self) -> usize;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

#[derive(Default)]
pub struct InMemoryCounterStore {
    windows: Mutex<HashMap<String, Window>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.windows.lock().await.len()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment_and_check(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> StudioResult<RateDecision> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        let entry = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            reset_at: now + window,
        });
        if now > entry.reset_at {
            *entry = Window {
                count: 0,
                reset_at: now + window,
            };
        }

        if entry.count >= limit {
            return Ok(RateDecision {
                allowed: false,
                remaining: 0,
                reset_at: entry.reset_at,
            });
        }

        entry.count += 1;
        Ok(RateDecision {
            allowed: true,
            remaining: limit - entry.count,
            reset_at: entry.reset_at,
        })
    }

    async fn reset(&self, key: &str) {
        self.windows.lock().await.remove(key);
    }

    async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, w| w.reset_at >= now);
        before - windows.len()
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    pub fn budget(&self, class: OperationClass) -> RateBudget {
        match class {
            OperationClass::Create => self.config.create,
            OperationClass::Status => self.config.status,
            OperationClass::Cancel => self.config.cancel,
            OperationClass::List => self.config.list,
        }
    }

    /// Spend one call from `user_id`'s budget for `class`
    pub async fn check(&self, user_id: &str, class: OperationClass) -> StudioResult<RateDecision> {
        let budget = self.budget(class);
        let key = format!("{}:{}", class, user_id);
        let decision = self
            .store
            .increment_and_check(&key, budget.limit, budget.window())
            .await?;

        if !decision.allowed {
            let retry_after = decision
                .reset_at
                .saturating_duration_since(Instant::now())
                .min(budget.window());
            warn!(
                user_id = %user_id,
                operation = %class,
                limit = budget.limit,
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit exceeded"
            );
            return Err(StudioError::RateLimited {
                operation: class.to_string(),
                limit: budget.limit,
                retry_after,
            });
        }

        Ok(decision)
    }

    pub async fn reset(&self, user_id: &str, class: OperationClass) {
        self.store.reset(&format!("{}:{}", class, user_id)).await;
    }

    /// Periodically drop expired counters
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let store = self.store.clone();
        let period = Duration::from_secs(self.config.sweep_interval_secs.max(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = store.sweep().await;
                if removed > 0 {
                    debug!(removed, "Swept expired rate-limit counters");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32) -> RateLimiter {
        let budget = RateBudget {
            limit,
            window_secs: 1,
        };
        let config = RateLimitConfig {
            create: budget,
            status: budget,
            cancel: budget,
            list: budget,
            sweep_interval_secs: 1,
        };
        RateLimiter::new(Arc::new(InMemoryCounterStore::new()), config)
    }

    #[tokio::test]
    async fn store_window_resets_after_expiry() {
        let store = InMemoryCounterStore::new();
        let window = Duration::from_millis(100);

        for remaining in [1, 0] {
            let decision = store.increment_and_check("k", 2, window).await.unwrap();
            assert!(decision.allowed);
            assert_eq!(decision.remaining, remaining);
        }
        assert!(!store.increment_and_check("k", 2, window).await.unwrap().allowed);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(store.increment_and_check("k", 2, window).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_windows() {
        let store = InMemoryCounterStore::new();
        store
            .increment_and_check("short", 1, Duration::from_millis(20))
            .await
            .unwrap();
        store
            .increment_and_check("long", 1, Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.sweep().await, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn exceeding_budget_reports_retry_after_within_window() {
        let limiter = limiter(3);

        for _ in 0..3 {
            limiter.check("alice", OperationClass::Create).await.unwrap();
        }
        match limiter.check("alice", OperationClass::Create).await {
            Err(StudioError::RateLimited { operation, limit, retry_after }) => {
                assert_eq!(operation, "create");
                assert_eq!(limit, 3);
                assert!(retry_after <= Duration::from_secs(1));
            }
            other => panic!("expected rate limit, got {:?}", other.map(|d| d.allowed)),
        }
    }

    #[tokio::test]
    async fn classes_and_users_are_independent() {
        let limiter = limiter(1);

        limiter.check("alice", OperationClass::Create).await.unwrap();
        limiter.check("alice", OperationClass::Status).await.unwrap();
        limiter.check("bob", OperationClass::Create).await.unwrap();
        assert!(limiter.check("alice", OperationClass::Create).await.is_err());
    }

    #[tokio::test]
    async fn reset_clears_the_counter() {
        let limiter = limiter(1);

        limiter.check("alice", OperationClass::Cancel).await.unwrap();
        assert!(limiter.check("alice", OperationClass::Cancel).await.is_err());

        limiter.reset("alice", OperationClass::Cancel).await;
        assert!(limiter.check("alice", OperationClass::Cancel).await.is_ok());
    }
}
