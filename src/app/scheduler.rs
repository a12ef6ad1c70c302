use crate::activity::{AlertApi, ActivityStore};
use crate::auth::AuthState;
use crate::backend::Backend;
use crate::blocking::{BlockingState, BlockingStore};
use crate::poller::Poller;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything the enforcement decision depends on
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EnforcementInputs {
    pub authenticated: bool,
    pub currently_blocking: bool,
    pub game_blocking: bool,
    pub ai_blocking: bool,
    pub dns_blocking: bool,
}

impl EnforcementInputs {
    pub fn from_state(auth: &AuthState, blocking: &BlockingState) -> Self {
        Self {
            authenticated: auth.is_authenticated,
            currently_blocking: blocking.status.currently_blocking,
            game_blocking: blocking.status.game_blocking_enabled,
            ai_blocking: blocking.status.ai_blocking_enabled,
            dns_blocking: blocking.status.dns_blocking_enabled,
        }
    }

    pub fn should_enforce(&self) -> bool {
        self.authenticated && self.currently_blocking && (self.game_blocking || self.ai_blocking || self.dns_blocking)
    }
}

/// Drives the periodic enforcement check while [`EnforcementInputs::should_enforce`]
/// holds. Dropping the scheduler cancels the poller.
pub struct EnforcementScheduler<B, A> {
    backend: Arc<B>,
    blocking: Arc<BlockingStore<B>>,
    activity: Arc<ActivityStore<A>>,
    period: Duration,
    poller: Option<Poller>,
}

impl<B: Backend, A: AlertApi> EnforcementScheduler<B, A> {
    pub fn new(
        backend: Arc<B>,
        blocking: Arc<BlockingStore<B>>,
        activity: Arc<ActivityStore<A>>,
        period: Duration,
    ) -> Self {
        Self {
            backend,
            blocking,
            activity,
            period,
            poller: None,
        }
    }

    /// Start or stop the poller to match `inputs`. Returns whether it is running.
    pub fn reconcile(&mut self, inputs: EnforcementInputs) -> bool {
        match (inputs.should_enforce(), self.poller.is_some()) {
            (true, false) => self.start(),
            (false, true) => {
                debug!(?inputs, "Enforcement no longer required");
                self.stop();
            }
            _ => {}
        }
        self.is_running()
    }

    fn start(&mut self) {
        info!(period_secs = self.period.as_secs(), "Starting enforcement checks");

        let backend = Arc::clone(&self.backend);
        let blocking = Arc::clone(&self.blocking);
        let activity = Arc::clone(&self.activity);

        self.poller = Some(Poller::spawn(self.period, move |guard| {
            let backend = Arc::clone(&backend);
            let blocking = Arc::clone(&blocking);
            let activity = Arc::clone(&activity);

            async move {
                match backend.run_blocking_check().await {
                    Ok(processes) => {
                        if !guard.is_current() {
                            debug!("Discarding enforcement result after cancellation");
                            return;
                        }
                        if !processes.is_empty() {
                            info!(count = processes.len(), "Enforcement check terminated processes");
                        }
                        blocking.apply_check_result(&processes);
                        activity.record_blocked_processes(&processes);
                    }
                    Err(e) => warn!(error = %e, "Enforcement check failed"),
                }
            }
        }));
    }

}

impl<B, A> EnforcementScheduler<B, A> {
    pub fn is_running(&self) -> bool {
        self.poller.is_some()
    }

    pub fn stop(&mut self) {
        if let Some(poller) = self.poller.take() {
            info!("Stopping enforcement checks");
            poller.stop();
        }
    }
}
