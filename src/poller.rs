//! Fixed-period background work that can be cancelled deterministically.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Lets a tick tell whether its poller is still live before applying results.
#[derive(Clone, Debug)]
pub struct EpochGuard {
    epoch: Arc<AtomicU64>,
    mine: u64,
}

impl EpochGuard {
    pub fn is_current(&self) -> bool {
        self.epoch.load(Ordering::SeqCst) == self.mine
    }
}

/// Runs `tick` immediately and then every `period` until stopped or dropped.
///
/// Ticks never overlap: the next one is scheduled only after the previous future
/// finished, and late ticks are delayed rather than bunched.
#[derive(Debug)]
pub struct Poller {
    epoch: Arc<AtomicU64>,
    handle: JoinHandle<()>,
}

impl Poller {
    pub fn spawn<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut(EpochGuard) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let epoch = Arc::new(AtomicU64::new(0));
        let guard = EpochGuard {
            epoch: Arc::clone(&epoch),
            mine: 0,
        };

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                if !guard.is_current() {
                    break;
                }
                tick(guard.clone()).await;
            }
        });

        Self { epoch, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancel the poller. In-flight results observe a stale epoch.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.handle.abort();
    }
}
