//! Local credential gate.
//!
//! Tracks whether a parental password exists and whether this session has unlocked
//! the app. Verification and recovery are delegated to the backend; the session flag
//! itself is never written to disk here.

use crate::backend::{Backend, SetupResult};
use crate::config::MIN_PASSWORD_LENGTH;
use crate::error::{BackendError, ErrorKind};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

pub const INVALID_PASSWORD_MESSAGE: &str = "Invalid password";
pub const INCORRECT_CURRENT_PASSWORD_MESSAGE: &str = "Current password is incorrect";
pub const INVALID_RECOVERY_MESSAGE: &str = "Invalid recovery password";
pub const CHANGE_FAILED_MESSAGE: &str = "Could not change the password. Please try again.";
pub const ALREADY_CONFIGURED_MESSAGE: &str = "App is already configured";

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub is_configured: bool,
    pub is_authenticated: bool,
    /// Shown once after setup, then discarded
    #[serde(skip)]
    pub recovery_secret: Option<String>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl AuthState {
    fn set_authenticated(&mut self, authenticated: bool) {
        self.is_authenticated = authenticated && self.is_configured;
    }
}

/// Failures returned by credential operations
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("{0}")]
    InvalidCredential(String),

    #[error("{0}")]
    ValidationFailed(String),

    #[error("{0}")]
    BackendUnreachable(String),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidCredential(_) => ErrorKind::Unauthorized,
            AuthError::ValidationFailed(_) => ErrorKind::Validation,
            AuthError::BackendUnreachable(_) => ErrorKind::Transport,
        }
    }

    /// Stable code for the view layer
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredential(_) => "invalid_credential",
            AuthError::ValidationFailed(_) => "validation_failed",
            AuthError::BackendUnreachable(_) => "backend_unreachable",
        }
    }
}

impl From<BackendError> for AuthError {
    fn from(err: BackendError) -> Self {
        AuthError::BackendUnreachable(err.message())
    }
}

impl Serialize for AuthError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result of first-run setup
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct SetupOutcome {
    pub success: bool,
    pub error: Option<String>,
}

fn check_length(password: &str, field: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::ValidationFailed(format!(
            "{} must be at least {} characters",
            field, MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

pub struct CredentialStore<B> {
    backend: Arc<B>,
    state: watch::Sender<AuthState>,
}

impl<B: Backend> CredentialStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        let initial = AuthState {
            is_loading: true,
            ..Default::default()
        };
        let (state, _) = watch::channel(initial);
        Self { backend, state }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated
    }

    fn begin(&self) {
        self.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });
    }

    fn fail(&self, err: &AuthError) {
        let message = err.to_string();
        self.state.send_modify(|s| {
            s.is_loading = false;
            s.error = Some(message);
        });
    }

    fn finish(&self) {
        self.state.send_modify(|s| s.is_loading = false);
    }

    /// Refresh `is_configured` from the backend. Failures are recorded but keep the
    /// previous state.
    pub async fn check_status(&self) {
        self.begin();

        match self.backend.get_auth_status().await {
            Ok(status) => self.state.send_modify(|s| {
                s.is_configured = status.is_configured;
                let authenticated = s.is_authenticated || status.is_authenticated;
                s.set_authenticated(authenticated);
                s.is_loading = false;
            }),
            Err(e) => {
                warn!(error = %e, "Failed to get auth status");
                self.fail(&AuthError::from(e));
            }
        }
    }

    /// First-run setup. Never fails with an error value; the outcome carries the
    /// reason instead.
    pub async fn setup_credential(&self, password: &str) -> SetupOutcome {
        if self.state.borrow().is_configured {
            return SetupOutcome {
                success: false,
                error: Some(ALREADY_CONFIGURED_MESSAGE.to_string()),
            };
        }

        if let Err(e) = check_length(password, "Password") {
            return SetupOutcome {
                success: false,
                error: Some(e.to_string()),
            };
        }

        self.begin();

        match self.backend.setup_password(password).await {
            Ok(SetupResult {
                success: true,
                master_password,
                ..
            }) => {
                info!("Parental password configured");
                self.state.send_modify(|s| {
                    s.is_configured = true;
                    s.set_authenticated(true);
                    s.recovery_secret = master_password;
                    s.is_loading = false;
                });
                SetupOutcome {
                    success: true,
                    error: None,
                }
            }
            Ok(SetupResult { error, .. }) => {
                let err = AuthError::ValidationFailed(
                    error.unwrap_or_else(|| "Failed to set up password".to_string()),
                );
                self.fail(&err);
                SetupOutcome {
                    success: false,
                    error: Some(err.to_string()),
                }
            }
            Err(e) => {
                let err = AuthError::from(e);
                self.fail(&err);
                SetupOutcome {
                    success: false,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Hand out the recovery secret captured at setup. Only the first call sees it.
    pub fn take_recovery_secret(&self) -> Option<String> {
        let mut secret = None;
        self.state.send_if_modified(|s| {
            secret = s.recovery_secret.take();
            secret.is_some()
        });
        secret
    }

    /// Leave the setup flow; any undisplayed secret is dropped.
    pub fn complete_setup(&self) {
        self.state.send_modify(|s| {
            s.is_configured = true;
            s.set_authenticated(true);
            s.recovery_secret = None;
        });
    }

    /// Unlock the app. The caller clears its password input on failure.
    pub async fn login(&self, password: &str) -> Result<(), AuthError> {
        self.begin();

        match self.backend.verify_password(password).await {
            Ok(true) => {
                info!("App unlocked");
                self.state.send_modify(|s| {
                    s.set_authenticated(true);
                    s.is_loading = false;
                });
                Ok(())
            }
            Ok(false) => {
                let err = AuthError::InvalidCredential(INVALID_PASSWORD_MESSAGE.to_string());
                self.fail(&err);
                Err(err)
            }
            Err(e) => {
                let err = AuthError::from(e);
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Lock the UI. Enforcement in the backend is unaffected.
    pub fn logout(&self) {
        info!("App locked");
        self.state.send_modify(|s| s.is_authenticated = false);
    }

    pub async fn change_credential(&self, old_password: &str, new_password: &str) -> Result<(), AuthError> {
        check_length(new_password, "Password")?;
        self.begin();

        match self.backend.change_password(old_password, new_password).await {
            Ok(true) => {
                info!("Parental password changed");
                self.finish();
                Ok(())
            }
            Ok(false) => {
                self.finish();
                Err(AuthError::InvalidCredential(INCORRECT_CURRENT_PASSWORD_MESSAGE.to_string()))
            }
            Err(e) => {
                warn!(error = %e, "Password change failed");
                let err = AuthError::BackendUnreachable(CHANGE_FAILED_MESSAGE.to_string());
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Reset the password with the recovery secret; unlocks on success.
    pub async fn recover_with_master(&self, master_password: &str, new_password: &str) -> Result<(), AuthError> {
        check_length(new_password, "New password")?;
        self.begin();

        match self.backend.reset_with_master(master_password, new_password).await {
            Ok(true) => {
                info!("Password reset with recovery secret");
                self.state.send_modify(|s| {
                    s.is_configured = true;
                    s.set_authenticated(true);
                    s.is_loading = false;
                });
                Ok(())
            }
            Ok(false) => {
                let err = AuthError::InvalidCredential(INVALID_RECOVERY_MESSAGE.to_string());
                self.fail(&err);
                Err(err)
            }
            Err(e) => {
                let err = AuthError::from(e);
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Show the recovery secret again after re-entering the password
    pub async fn reveal_recovery_secret(&self, password: &str) -> Result<String, AuthError> {
        match self.backend.get_master_password(password).await? {
            Some(secret) => Ok(secret),
            None => Err(AuthError::InvalidCredential(INVALID_PASSWORD_MESSAGE.to_string())),
        }
    }
}
