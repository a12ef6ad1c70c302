use crate::backend::{Backend, BackendEvent, PlatformLoginResult, Subscription};
use crate::error::ClientError;
use crate::licensing::mapping::{feature_key, map_snapshot};
use crate::licensing::types::{EntitlementSnapshot, FeatureKey, LicenseInfo};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LicenseState {
    pub snapshot: EntitlementSnapshot,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl Default for LicenseState {
    fn default() -> Self {
        Self {
            snapshot: EntitlementSnapshot::none(),
            is_loading: false,
            error: None,
        }
    }
}

/// Client view of the subscription entitlement.
///
/// The backend enforces entitlement on its own; a failed refresh here keeps the last
/// known snapshot.
pub struct LicenseStore<B> {
    backend: Arc<B>,
    state: watch::Sender<LicenseState>,
}

impl<B: Backend> LicenseStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        let (state, _) = watch::channel(LicenseState::default());
        Self { backend, state }
    }

    pub fn state(&self) -> LicenseState {
        self.state.borrow().clone()
    }

    pub fn snapshot(&self) -> EntitlementSnapshot {
        self.state.borrow().snapshot.clone()
    }

    pub fn info(&self) -> LicenseInfo {
        LicenseInfo::from(&self.state.borrow().snapshot)
    }

    pub fn watch(&self) -> watch::Receiver<LicenseState> {
        self.state.subscribe()
    }

    /// Replace the snapshot with the mapping of `raw`. Returns whether anything changed.
    pub fn apply_raw(&self, raw: &Value) -> bool {
        let snapshot = map_snapshot(raw);
        self.replace(snapshot)
    }

    fn replace(&self, snapshot: EntitlementSnapshot) -> bool {
        self.state.send_if_modified(|s| {
            if s.snapshot == snapshot {
                return false;
            }
            debug!(plan = snapshot.plan.as_str(), locked = snapshot.is_locked, "Entitlement updated");
            s.snapshot = snapshot;
            true
        })
    }

    /// Ask the backend to re-validate upstream, then replace the snapshot.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        self.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });

        let result = self.backend.check_license().await;
        self.finish_fetch(result, "check_license")
    }

    /// Load the backend's cached snapshot without upstream validation.
    pub async fn pull_snapshot(&self) -> Result<(), ClientError> {
        let result = self.backend.get_license_state().await;
        self.finish_fetch(result, "get_license_state")
    }

    fn finish_fetch(
        &self,
        result: Result<Value, crate::error::BackendError>,
        command: &str,
    ) -> Result<(), ClientError> {
        match result {
            Ok(raw) => {
                let snapshot = map_snapshot(&raw);
                self.state.send_modify(|s| {
                    s.snapshot = snapshot;
                    s.is_loading = false;
                });
                Ok(())
            }
            Err(e) => {
                warn!(command, error = %e, "Entitlement fetch failed, keeping last snapshot");
                let err = ClientError::from(e);
                let message = err.to_string();
                self.state.send_modify(|s| {
                    s.is_loading = false;
                    s.error = Some(message);
                });
                Err(err)
            }
        }
    }

    /// Apply pushed entitlement changes until the returned token is dropped.
    pub fn subscribe_to_changes(self: &Arc<Self>) -> Subscription {
        let store = Arc::clone(self);
        Subscription::spawn(self.backend.subscribe(), move |event| {
            if let BackendEvent::EntitlementChanged(raw) = event {
                store.apply_raw(&raw);
            }
        })
    }

    pub fn is_feature_available(&self, key: FeatureKey) -> bool {
        self.state.borrow().snapshot.is_feature_available(key)
    }

    /// Lookup by payload name in either spelling. Unknown names are unavailable.
    pub fn is_feature_available_by_name(&self, name: &str) -> bool {
        feature_key(name)
            .map(|key| self.is_feature_available(key))
            .unwrap_or(false)
    }

    pub fn max_blocks(&self) -> i64 {
        let state = self.state.borrow();
        if state.snapshot.is_locked {
            return 0;
        }
        state.snapshot.features.max_blocks()
    }

    /// Link this device to a web platform account. On success the entitlement is
    /// refreshed; on failure the snapshot is untouched.
    pub async fn login_to_platform(&self, email: &str, password: &str) -> PlatformLoginResult {
        self.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });

        let result = match self.backend.platform_login(email, password).await {
            Ok(result) => result,
            Err(e) => PlatformLoginResult {
                success: false,
                plan: None,
                message: Some(e.message()),
            },
        };

        if result.success {
            info!(plan = ?result.plan, "Linked platform account");
            // refresh() clears the loading flag on both paths
            let _ = self.refresh().await;
        } else {
            self.state.send_modify(|s| {
                s.is_loading = false;
                s.error = result.message.clone();
            });
        }

        result
    }

    /// Unlink the platform account and drop back to no entitlement.
    pub async fn logout_of_platform(&self) -> Result<(), ClientError> {
        match self.backend.platform_logout().await {
            Ok(()) => {
                info!("Unlinked platform account");
                self.replace(EntitlementSnapshot::none());
                Ok(())
            }
            Err(e) => {
                let err = ClientError::from(e);
                let message = err.to_string();
                self.state.send_modify(|s| s.error = Some(message));
                Err(err)
            }
        }
    }
}
