//! Boundary to the native enforcement backend.
//!
//! The backend is only reachable through commands (request/response) and pushed
//! events. Hosts implement [`Backend`] by bridging to whatever transport they use.

use crate::error::BackendError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Event name for pushed entitlement snapshots
pub const LICENSE_CHANGED_EVENT: &str = "license-state-changed";

/// Event name emitted by the tray when the user asks to quit
pub const QUIT_REQUESTED_EVENT: &str = "quit-requested";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub is_configured: bool,
    pub is_authenticated: bool,
}

/// Response of `setup_password`
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct SetupResult {
    pub success: bool,
    /// One-time recovery secret
    pub master_password: Option<String>,
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PlatformLoginResult {
    pub success: bool,
    pub plan: Option<String>,
    pub message: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlockingStatus {
    pub game_blocking_enabled: bool,
    pub ai_blocking_enabled: bool,
    pub dns_blocking_enabled: bool,
    pub browser_blocking_enabled: bool,
    pub currently_blocking: bool,
    pub firewall_blocking_active: bool,
}

/// A process terminated by an enforcement check
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BlockedProcess {
    pub pid: u32,
    pub name: String,
}

/// User-toggleable blocking categories
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BlockingCategory {
    Game,
    Ai,
    Dns,
    Browser,
}

impl BlockingCategory {
    /// Backend command toggling this category
    pub fn command(&self) -> &'static str {
        match self {
            BlockingCategory::Game => "set_game_blocking",
            BlockingCategory::Ai => "set_ai_blocking",
            BlockingCategory::Dns => "set_dns_blocking",
            BlockingCategory::Browser => "set_browser_blocking",
        }
    }
}

/// Notifications pushed by the backend
#[derive(Clone, Debug, PartialEq)]
pub enum BackendEvent {
    /// Raw entitlement payload, same shape as `check_license`
    EntitlementChanged(Value),
    QuitRequested,
}

impl BackendEvent {
    /// Decode a named host event. Unknown names are ignored.
    pub fn from_named(name: &str, payload: Value) -> Option<Self> {
        match name {
            LICENSE_CHANGED_EVENT => Some(BackendEvent::EntitlementChanged(payload)),
            QUIT_REQUESTED_EVENT => Some(BackendEvent::QuitRequested),
            _ => None,
        }
    }
}

/// Command surface of the enforcement backend.
///
/// Implementations may be written with `async fn`; the returned futures must be `Send`
/// because periodic work runs on spawned tasks.
pub trait Backend: Send + Sync + 'static {
    fn get_auth_status(&self) -> impl Future<Output = Result<AuthStatus, BackendError>> + Send;

    fn setup_password(
        &self,
        password: &str,
    ) -> impl Future<Output = Result<SetupResult, BackendError>> + Send;

    fn verify_password(&self, password: &str) -> impl Future<Output = Result<bool, BackendError>> + Send;

    fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> impl Future<Output = Result<bool, BackendError>> + Send;

    fn reset_with_master(
        &self,
        master_password: &str,
        new_password: &str,
    ) -> impl Future<Output = Result<bool, BackendError>> + Send;

    /// `None` when the password does not verify
    fn get_master_password(
        &self,
        password: &str,
    ) -> impl Future<Output = Result<Option<String>, BackendError>> + Send;

    /// Re-validate the entitlement upstream and return the raw snapshot
    fn check_license(&self) -> impl Future<Output = Result<Value, BackendError>> + Send;

    /// Cached raw snapshot, no network
    fn get_license_state(&self) -> impl Future<Output = Result<Value, BackendError>> + Send;

    fn platform_login(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<PlatformLoginResult, BackendError>> + Send;

    fn platform_logout(&self) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Privileged quit. `Ok(false)` means the password was wrong; on success the
    /// process is expected to exit.
    fn quit_with_password(&self, password: &str) -> impl Future<Output = Result<bool, BackendError>> + Send;

    fn get_blocking_status(&self) -> impl Future<Output = Result<BlockingStatus, BackendError>> + Send;

    /// Scan and terminate blocked processes
    fn run_blocking_check(&self) -> impl Future<Output = Result<Vec<BlockedProcess>, BackendError>> + Send;

    fn set_blocking(
        &self,
        category: BlockingCategory,
        enabled: bool,
    ) -> impl Future<Output = Result<bool, BackendError>> + Send;

    /// Receiver for pushed events
    fn subscribe(&self) -> broadcast::Receiver<BackendEvent>;
}

/// Token for a registered event listener. Dropping it stops delivery.
#[derive(Debug)]
pub struct Subscription {
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Forward every event from `events` to `handler` until cancelled or the channel
    /// closes.
    pub fn spawn<F>(mut events: broadcast::Receiver<BackendEvent>, mut handler: F) -> Self
    where
        F: FnMut(BackendEvent) + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => handler(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event listener lagged behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self { handle: Some(handle) }
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_from_named() {
        assert_eq!(
            BackendEvent::from_named("quit-requested", Value::Null),
            Some(BackendEvent::QuitRequested)
        );
        assert_eq!(
            BackendEvent::from_named("license-state-changed", json!({ "plan": "pro" })),
            Some(BackendEvent::EntitlementChanged(json!({ "plan": "pro" })))
        );
        assert_eq!(BackendEvent::from_named("tray-click", Value::Null), None);
    }

    #[test]
    fn test_wire_casing() {
        let status: AuthStatus =
            serde_json::from_value(json!({ "isConfigured": true, "isAuthenticated": false })).unwrap();
        assert!(status.is_configured);

        let blocking: BlockingStatus = serde_json::from_value(json!({
            "gameBlockingEnabled": true,
            "aiBlockingEnabled": false,
            "dnsBlockingEnabled": false,
            "browserBlockingEnabled": false,
            "currentlyBlocking": true,
            "firewallBlockingActive": false
        }))
        .unwrap();
        assert!(blocking.game_blocking_enabled && blocking.currently_blocking);
    }

    #[tokio::test]
    async fn test_subscription_stops_on_drop() {
        let (tx, rx) = broadcast::channel(8);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();

        let subscription = Subscription::spawn(rx, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(subscription.is_active());

        tx.send(BackendEvent::QuitRequested).unwrap();
        tokio::task::yield_now().await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        drop(subscription);
        tokio::task::yield_now().await;

        let _ = tx.send(BackendEvent::QuitRequested);
        tokio::task::yield_now().await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
