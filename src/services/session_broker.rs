//! Session token broker
//!
//! Owns the process-wide TuneIn serial. Every acquisition goes through one
//! FIFO async mutex, so the "is there a token" check, the extractor run and
//! the retry budget are only ever touched by a single caller at a time.
//! Callers queued behind an extraction observe its outcome when they get
//! the lock: `Ready` or `PermanentlyFailed` short-circuit without another
//! browser launch.
//!
//! ```text
//! NoToken ──► Acquiring ──► Ready(token)
//!                 │
//!                 └──(budget spent)──► PermanentlyFailed
//! ```
//!
//! `PermanentlyFailed` is terminal: the budget is never replenished and a
//! process restart is required.
//!
//! Health endpoints read a [`BrokerSnapshot`] published on a `watch`
//! channel, so they never contend for the acquisition lock.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};

use crate::services::token_extractor::TokenSource;

/// Broker state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerState {
    NoToken,
    Acquiring,
    Ready(String),
    PermanentlyFailed,
}

/// State summary safe to expose on health endpoints (no token value)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerStatus {
    NoToken,
    Acquiring,
    Ready,
    PermanentlyFailed,
}

/// Published view of the broker for health checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerSnapshot {
    pub status: BrokerStatus,
    pub attempts_used: u32,
}

struct Inner {
    state: BrokerState,
    attempts_left: u32,
    max_attempts: u32,
    snapshot: watch::Sender<BrokerSnapshot>,
}

impl Inner {
    /// Move to `state` and publish the matching snapshot
    fn transition(&mut self, state: BrokerState) {
        let status = match &state {
            BrokerState::NoToken => BrokerStatus::NoToken,
            BrokerState::Acquiring => BrokerStatus::Acquiring,
            BrokerState::Ready(_) => BrokerStatus::Ready,
            BrokerState::PermanentlyFailed => BrokerStatus::PermanentlyFailed,
        };
        self.state = state;
        self.snapshot.send_replace(BrokerSnapshot {
            status,
            attempts_used: self.max_attempts - self.attempts_left,
        });
    }
}

/// Single-flight acquirer of the session token
pub struct SessionBroker {
    source: Arc<dyn TokenSource>,
    inner: Arc<Mutex<Inner>>,
    retry_delay: Duration,
    snapshot: watch::Receiver<BrokerSnapshot>,
}

impl SessionBroker {
    /// Create a broker allowing `max_attempts` extractor runs in total
    pub fn new(source: Arc<dyn TokenSource>, max_attempts: u32, retry_delay: Duration) -> Self {
        let (tx, snapshot) = watch::channel(BrokerSnapshot {
            status: BrokerStatus::NoToken,
            attempts_used: 0,
        });
        Self {
            source,
            inner: Arc::new(Mutex::new(Inner {
                state: BrokerState::NoToken,
                attempts_left: max_attempts,
                max_attempts,
                snapshot: tx,
            })),
            retry_delay,
            snapshot,
        }
    }

    /// Resolve `true` once a token is held, `false` if it never will be
    pub async fn acquire(&self) -> bool {
        self.acquire_token().await.is_some()
    }

    /// Like [`acquire`](Self::acquire) but hands back the token itself
    pub async fn acquire_token(&self) -> Option<String> {
        let guard = self.inner.clone().lock_owned().await;

        match &guard.state {
            BrokerState::Ready(token) => return Some(token.clone()),
            BrokerState::PermanentlyFailed => return None,
            BrokerState::NoToken | BrokerState::Acquiring => {}
        }

        // The retry loop runs detached so a dropped caller cannot cancel it
        // halfway; the guard moves with it and keeps the queue closed.
        let task = tokio::spawn(run_acquisition(
            guard,
            self.source.clone(),
            self.retry_delay,
        ));

        match task.await {
            Ok(token) => token,
            Err(e) => {
                error!("Session broker: acquisition task failed: {}", e);
                None
            }
        }
    }

    /// Current state without waiting on an in-flight acquisition
    pub fn status(&self) -> BrokerStatus {
        self.snapshot.borrow().status
    }

    /// Extractor runs spent so far
    pub fn attempts_used(&self) -> u32 {
        self.snapshot.borrow().attempts_used
    }
}

/// Extractor runs with a fixed delay until success or the budget is spent
async fn run_acquisition(
    mut inner: OwnedMutexGuard<Inner>,
    source: Arc<dyn TokenSource>,
    retry_delay: Duration,
) -> Option<String> {
    loop {
        if inner.attempts_left == 0 {
            error!("Session broker: could not get TuneIn session serial, giving up");
            inner.transition(BrokerState::PermanentlyFailed);
            return None;
        }

        inner.attempts_left -= 1;
        inner.transition(BrokerState::Acquiring);

        if let Some(token) = source.run().await {
            info!("Session broker: session serial acquired");
            inner.transition(BrokerState::Ready(token.clone()));
            return Some(token);
        }

        if inner.attempts_left > 0 {
            warn!(
                "Session broker: retrying to get session serial ({} attempts left)",
                inner.attempts_left
            );
            tokio::time::sleep(retry_delay).await;
        }
    }
}
