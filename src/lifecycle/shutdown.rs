//! Shutdown coordination for the proxy.
//!
//! # Responsibilities
//! - Latch the shutdown signal exactly once, no matter how many sources
//!   fire it (Ctrl-C, tests, a failed subsystem)
//! - Wake every waiter without losing a trigger that lands between a
//!   waiter's flag check and its sleep
//! - Bound the post-trigger drain so a wedged connection cannot keep the
//!   process alive forever

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// How long in-flight exchanges may keep draining after the trigger before
/// the server gives up on them.
pub const DRAIN_GRACE: Duration = Duration::from_secs(10);

/// Latched shutdown signal shared between the signal handler, the server,
/// and the tests.
///
/// Cloning is cheap; every clone observes the same latch.
#[derive(Clone, Default)]
pub struct Shutdown {
    state: Arc<State>,
}

#[derive(Default)]
struct State {
    triggered: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch the signal and wake every waiter. Later calls are no-ops.
    pub fn trigger(&self) {
        if !self.state.triggered.swap(true, Ordering::SeqCst) {
            self.state.notify.notify_waiters();
        }
    }

    /// Whether the signal has been latched.
    pub fn is_triggered(&self) -> bool {
        self.state.triggered.load(Ordering::SeqCst)
    }

    /// Resolve once the signal is latched.
    ///
    /// Registers with the notifier before re-checking the flag, so a
    /// `trigger()` landing between the check and the sleep is not lost.
    pub async fn wait(&self) {
        let notified = self.state.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_triggered() {
            return;
        }
        notified.await;
    }

    /// Resolve [`DRAIN_GRACE`] after the signal is latched.
    ///
    /// Raced against a gracefully draining server, this caps how long
    /// in-flight work may hold the process open.
    pub async fn drain_deadline(&self) {
        self.wait().await;
        tokio::time::sleep(DRAIN_GRACE).await;
    }
}
