use crate::activity::api::AlertApi;
use crate::activity::types::{ActivityEvent, ActivityKind, Alert, NewActivity, Severity};
use crate::backend::BlockedProcess;
use crate::config::ACTIVITY_CAPACITY;
use crate::error::ClientError;
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityState {
    /// Newest first
    pub activities: Vec<ActivityEvent>,
    pub alerts: Vec<Alert>,
    pub unread_alert_count: usize,
    pub is_loading: bool,
}

impl ActivityState {
    fn recount(&mut self) {
        self.unread_alert_count = self.alerts.iter().filter(|a| !a.is_read).count();
    }
}

/// Local activity log plus the server-synced alert list.
///
/// Alert read state is advisory: local updates are applied first and the server is
/// told afterwards without retry or rollback.
pub struct ActivityStore<A> {
    api: Arc<A>,
    capacity: usize,
    state: watch::Sender<ActivityState>,
}

impl<A: AlertApi> ActivityStore<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self::with_capacity(api, ACTIVITY_CAPACITY)
    }

    pub fn with_capacity(api: Arc<A>, capacity: usize) -> Self {
        let (state, _) = watch::channel(ActivityState::default());
        Self {
            api,
            capacity: capacity.max(1),
            state,
        }
    }

    pub fn state(&self) -> ActivityState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ActivityState> {
        self.state.subscribe()
    }

    pub fn unread_count(&self) -> usize {
        self.state.borrow().unread_alert_count
    }

    /// Stamp and prepend an activity, evicting the oldest beyond capacity.
    pub fn record_activity(&self, activity: NewActivity) -> ActivityEvent {
        let event = ActivityEvent {
            id: uuid::Uuid::new_v4().to_string(),
            kind: activity.kind,
            title: activity.title,
            description: activity.description,
            timestamp: Utc::now(),
            severity: activity.severity,
            details: activity.details,
        };

        let capacity = self.capacity;
        let recorded = event.clone();
        self.state.send_modify(|s| {
            s.activities.insert(0, recorded);
            s.activities.truncate(capacity);
        });

        event
    }

    pub fn clear_activities(&self) {
        self.state.send_modify(|s| s.activities.clear());
    }

    /// Turn processes terminated by an enforcement check into `blocked_app`
    /// activities. A pid already present in the log is not recorded again.
    pub fn record_blocked_processes(&self, processes: &[BlockedProcess]) -> usize {
        let mut recorded = 0;
        for process in processes {
            let exists = self.state.borrow().activities.iter().any(|a| {
                a.kind == ActivityKind::BlockedApp && a.pid() == Some(u64::from(process.pid))
            });
            if exists {
                continue;
            }

            self.record_activity(
                NewActivity::new(
                    ActivityKind::BlockedApp,
                    "Process Blocked",
                    format!("{} was terminated", process.name),
                )
                .severity(Severity::Warning)
                .detail("pid", process.pid)
                .detail("name", process.name.clone()),
            );
            recorded += 1;
        }
        recorded
    }

    /// Replace alerts from the server. Failures keep the current list.
    pub async fn fetch_alerts(&self) {
        self.state.send_modify(|s| s.is_loading = true);

        match self.api.list_alerts().await {
            Ok(alerts) => {
                debug!(count = alerts.len(), "Fetched alerts");
                self.state.send_modify(|s| {
                    s.alerts = alerts;
                    s.recount();
                    s.is_loading = false;
                });
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch alerts");
                self.state.send_modify(|s| s.is_loading = false);
            }
        }
    }

    /// Mark one alert read locally, then notify the server in the background.
    pub fn mark_read(&self, alert_id: &str) -> Result<(), ClientError> {
        let mut found = false;
        let changed = self.state.send_if_modified(|s| {
            let Some(alert) = s.alerts.iter_mut().find(|a| a.id == alert_id) else {
                return false;
            };
            found = true;
            if alert.is_read {
                return false;
            }
            alert.is_read = true;
            s.recount();
            true
        });

        if !found {
            return Err(ClientError::NotFound(format!("alert {}", alert_id)));
        }

        if changed {
            let api = Arc::clone(&self.api);
            let alert_id = alert_id.to_string();
            notify_server(async move {
                if let Err(e) = api.mark_read(&alert_id).await {
                    warn!(alert_id = %alert_id, error = %e, "Failed to mark alert read");
                }
            });
        }

        Ok(())
    }

    pub fn mark_all_read(&self) {
        self.state.send_modify(|s| {
            for alert in s.alerts.iter_mut() {
                alert.is_read = true;
            }
            s.recount();
        });

        let api = Arc::clone(&self.api);
        notify_server(async move {
            if let Err(e) = api.mark_all_read().await {
                warn!(error = %e, "Failed to mark all alerts read");
            }
        });
    }
}

/// Run a fire-and-forget server call on the current runtime. Outside a runtime the
/// call is skipped; the local state is already updated.
fn notify_server<F>(call: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(call);
        }
        Err(_) => warn!("No async runtime, alert read state not sent to server"),
    }
}
