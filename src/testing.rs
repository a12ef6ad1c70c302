//! In-memory collaborators for unit tests.

use crate::activity::{Alert, AlertApi};
use crate::backend::{
    AuthStatus, Backend, BackendEvent, BlockedProcess, BlockingCategory, BlockingStatus, PlatformLoginResult,
    SetupResult,
};
use crate::error::{BackendError, ClientError};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;

const MASTER_SECRET: &str = "MSTR-7Q4K-ZP2D-W9XH";

/// Let spawned tasks (listeners, fire-and-forget calls) run to completion.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[derive(Default)]
struct BackendState {
    password: Option<String>,
    license: Value,
    blocking: BlockingStatus,
    blocked: Vec<BlockedProcess>,
    platform_account: Option<(String, String, Value)>,
    failures: HashMap<String, Value>,
    calls: HashMap<String, usize>,
    quit_delay: Option<Duration>,
    check_delay: Option<Duration>,
}

/// Scriptable backend. Every command is counted by name; `fail_command` makes a
/// command reject with the given raw value until the test ends.
pub struct FakeBackend {
    state: Mutex<BackendState>,
    events: broadcast::Sender<BackendEvent>,
}

impl FakeBackend {
    pub fn new() -> Self {
        crate::logging::init_test();
        let (events, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(BackendState::default()),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap()
    }

    /// Count the call and return the scripted rejection, if any
    fn enter(&self, command: &str) -> Result<(), BackendError> {
        let mut state = self.lock();
        *state.calls.entry(command.to_string()).or_default() += 1;
        match state.failures.get(command) {
            Some(value) => Err(BackendError(value.clone())),
            None => Ok(()),
        }
    }

    pub fn configure(&self, password: &str) {
        self.lock().password = Some(password.to_string());
    }

    pub fn calls(&self, command: &str) -> usize {
        self.lock().calls.get(command).copied().unwrap_or(0)
    }

    pub fn quit_calls(&self) -> usize {
        self.calls("quit_with_password")
    }

    pub fn fail_command(&self, command: &str, rejection: Value) {
        self.lock().failures.insert(command.to_string(), rejection);
    }

    pub fn master_secret(&self) -> String {
        MASTER_SECRET.to_string()
    }

    pub fn set_license(&self, payload: Value) {
        self.lock().license = payload;
    }

    pub fn set_blocking_status(&self, status: BlockingStatus) {
        self.lock().blocking = status;
    }

    pub fn set_blocked(&self, processes: Vec<BlockedProcess>) {
        self.lock().blocked = processes;
    }

    pub fn set_platform_account(&self, email: &str, password: &str, payload: Value) {
        self.lock().platform_account = Some((email.to_string(), password.to_string(), payload));
    }

    pub fn set_quit_delay(&self, delay: Duration) {
        self.lock().quit_delay = Some(delay);
    }

    pub fn set_check_delay(&self, delay: Duration) {
        self.lock().check_delay = Some(delay);
    }

    pub fn emit(&self, event: BackendEvent) {
        let _ = self.events.send(event);
    }

    fn password_matches(&self, password: &str) -> bool {
        self.lock().password.as_deref() == Some(password)
    }
}

impl Backend for FakeBackend {
    async fn get_auth_status(&self) -> Result<AuthStatus, BackendError> {
        self.enter("get_auth_status")?;
        Ok(AuthStatus {
            is_configured: self.lock().password.is_some(),
            is_authenticated: false,
        })
    }

    async fn setup_password(&self, password: &str) -> Result<SetupResult, BackendError> {
        self.enter("setup_password")?;
        let mut state = self.lock();
        if state.password.is_some() {
            return Ok(SetupResult {
                success: false,
                master_password: None,
                error: Some("Password already set".to_string()),
            });
        }
        state.password = Some(password.to_string());
        Ok(SetupResult {
            success: true,
            master_password: Some(MASTER_SECRET.to_string()),
            error: None,
        })
    }

    async fn verify_password(&self, password: &str) -> Result<bool, BackendError> {
        self.enter("verify_password")?;
        Ok(self.password_matches(password))
    }

    async fn change_password(&self, old_password: &str, new_password: &str) -> Result<bool, BackendError> {
        self.enter("change_password")?;
        if !self.password_matches(old_password) {
            return Ok(false);
        }
        self.configure(new_password);
        Ok(true)
    }

    async fn reset_with_master(&self, master_password: &str, new_password: &str) -> Result<bool, BackendError> {
        self.enter("reset_with_master")?;
        if master_password != MASTER_SECRET || self.lock().password.is_none() {
            return Ok(false);
        }
        self.configure(new_password);
        Ok(true)
    }

    async fn get_master_password(&self, password: &str) -> Result<Option<String>, BackendError> {
        self.enter("get_master_password")?;
        Ok(self.password_matches(password).then(|| MASTER_SECRET.to_string()))
    }

    async fn check_license(&self) -> Result<Value, BackendError> {
        self.enter("check_license")?;
        Ok(self.lock().license.clone())
    }

    async fn get_license_state(&self) -> Result<Value, BackendError> {
        self.enter("get_license_state")?;
        Ok(self.lock().license.clone())
    }

    async fn platform_login(&self, email: &str, password: &str) -> Result<PlatformLoginResult, BackendError> {
        self.enter("platform_login")?;
        let mut state = self.lock();
        let payload = match &state.platform_account {
            Some((e, p, payload)) if e == email && p == password => payload.clone(),
            _ => {
                return Ok(PlatformLoginResult {
                    success: false,
                    plan: None,
                    message: Some("Invalid email or password".to_string()),
                })
            }
        };

        let plan = payload.get("plan").and_then(Value::as_str).map(str::to_string);
        state.license = payload;
        Ok(PlatformLoginResult {
            success: true,
            plan,
            message: None,
        })
    }

    async fn platform_logout(&self) -> Result<(), BackendError> {
        self.enter("platform_logout")?;
        self.lock().license = Value::Null;
        Ok(())
    }

    async fn quit_with_password(&self, password: &str) -> Result<bool, BackendError> {
        self.enter("quit_with_password")?;
        let delay = self.lock().quit_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.password_matches(password))
    }

    async fn get_blocking_status(&self) -> Result<BlockingStatus, BackendError> {
        self.enter("get_blocking_status")?;
        Ok(self.lock().blocking)
    }

    async fn run_blocking_check(&self) -> Result<Vec<BlockedProcess>, BackendError> {
        self.enter("run_blocking_check")?;
        let delay = self.lock().check_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.lock().blocked.clone())
    }

    async fn set_blocking(&self, category: BlockingCategory, enabled: bool) -> Result<bool, BackendError> {
        self.enter("set_blocking")?;
        let mut state = self.lock();
        match category {
            BlockingCategory::Game => state.blocking.game_blocking_enabled = enabled,
            BlockingCategory::Ai => state.blocking.ai_blocking_enabled = enabled,
            BlockingCategory::Dns => state.blocking.dns_blocking_enabled = enabled,
            BlockingCategory::Browser => state.blocking.browser_blocking_enabled = enabled,
        }
        Ok(enabled)
    }

    fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.events.subscribe()
    }
}

pub fn alert(id: &str, is_read: bool) -> Alert {
    Alert {
        id: id.to_string(),
        alert_type: "blocked_app".to_string(),
        severity: "warning".to_string(),
        title: format!("Alert {}", id),
        message: "Blocked application".to_string(),
        details: Map::new(),
        is_read,
        created_at: Utc::now(),
        device_name: Some("LINUX Device".to_string()),
    }
}

#[derive(Default)]
struct AlertApiState {
    alerts: Vec<Alert>,
    failing: bool,
    mark_read_calls: Vec<String>,
    mark_all_calls: usize,
}

/// Alert server double. Calls are recorded even when failing.
#[derive(Default)]
pub struct FakeAlertApi {
    state: Mutex<AlertApiState>,
}

impl FakeAlertApi {
    pub fn new() -> Self {
        crate::logging::init_test();
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AlertApiState> {
        self.state.lock().unwrap()
    }

    pub fn set_alerts(&self, alerts: Vec<Alert>) {
        self.lock().alerts = alerts;
    }

    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    pub fn mark_read_calls(&self) -> Vec<String> {
        self.lock().mark_read_calls.clone()
    }

    pub fn mark_all_calls(&self) -> usize {
        self.lock().mark_all_calls
    }

    fn outcome(failing: bool) -> Result<(), ClientError> {
        if failing {
            return Err(ClientError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

impl AlertApi for FakeAlertApi {
    async fn list_alerts(&self) -> Result<Vec<Alert>, ClientError> {
        let state = self.lock();
        Self::outcome(state.failing)?;
        Ok(state.alerts.clone())
    }

    async fn mark_read(&self, alert_id: &str) -> Result<(), ClientError> {
        let mut state = self.lock();
        state.mark_read_calls.push(alert_id.to_string());
        Self::outcome(state.failing)
    }

    async fn mark_all_read(&self) -> Result<(), ClientError> {
        let mut state = self.lock();
        state.mark_all_calls += 1;
        Self::outcome(state.failing)
    }
}
