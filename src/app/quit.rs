//! Password gate in front of the privileged quit command.

use crate::backend::Backend;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

pub const INCORRECT_PASSWORD_MESSAGE: &str = "Incorrect password";

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuitForm {
    pub is_open: bool,
    #[serde(skip)]
    pub password: String,
    pub error: Option<String>,
    pub is_submitting: bool,
    /// Quit accepted; the host is tearing the process down
    pub is_exiting: bool,
}

impl QuitForm {
    fn reset(&mut self) {
        self.password.clear();
        self.error = None;
        self.is_submitting = false;
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "outcome", content = "message", rename_all = "snake_case")]
pub enum QuitOutcome {
    /// The backend accepted the password and is exiting
    Exiting,
    WrongPassword,
    Failed(String),
    /// Another submission is already in flight
    Busy,
    /// Modal closed or password empty; nothing was sent
    Rejected,
}

pub struct QuitGate<B> {
    backend: Arc<B>,
    form: watch::Sender<QuitForm>,
}

impl<B: Backend> QuitGate<B> {
    pub fn new(backend: Arc<B>) -> Self {
        let (form, _) = watch::channel(QuitForm::default());
        Self { backend, form }
    }

    pub fn form(&self) -> QuitForm {
        self.form.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<QuitForm> {
        self.form.subscribe()
    }

    /// Show the modal with empty fields. Ignored while a submission is in flight.
    pub fn open(&self) {
        self.form.send_if_modified(|f| {
            if f.is_submitting || f.is_exiting {
                return false;
            }
            f.reset();
            f.is_open = true;
            true
        });
    }

    pub fn set_password(&self, password: &str) {
        self.form.send_if_modified(|f| {
            if !f.is_open || f.is_submitting {
                return false;
            }
            f.password = password.to_string();
            true
        });
    }

    pub fn cancel(&self) {
        self.form.send_if_modified(|f| {
            if f.is_submitting || f.is_exiting || !f.is_open {
                return false;
            }
            f.reset();
            f.is_open = false;
            true
        });
    }

    /// Whether the submit control is enabled
    pub fn can_submit(&self) -> bool {
        let f = self.form.borrow();
        f.is_open && !f.is_submitting && !f.is_exiting && !f.password.is_empty()
    }

    pub async fn submit(&self) -> QuitOutcome {
        // Claim the form before the first await so a second submit sees it busy
        let mut claim = Err(QuitOutcome::Rejected);
        self.form.send_if_modified(|f| {
            if f.is_submitting || f.is_exiting {
                claim = Err(QuitOutcome::Busy);
                return false;
            }
            if !f.is_open || f.password.is_empty() {
                return false;
            }
            f.is_submitting = true;
            f.error = None;
            claim = Ok(f.password.clone());
            true
        });

        let password = match claim {
            Ok(password) => password,
            Err(outcome) => return outcome,
        };

        match self.backend.quit_with_password(&password).await {
            Ok(true) => {
                info!("Quit authorized");
                self.form.send_modify(|f| {
                    f.is_submitting = false;
                    f.is_exiting = true;
                    f.password.clear();
                });
                QuitOutcome::Exiting
            }
            Ok(false) => {
                warn!("Quit attempted with wrong password");
                self.form.send_modify(|f| {
                    f.is_submitting = false;
                    f.password.clear();
                    f.error = Some(INCORRECT_PASSWORD_MESSAGE.to_string());
                });
                QuitOutcome::WrongPassword
            }
            Err(e) => {
                let message = e.message();
                warn!(error = %message, "Quit command failed");
                self.form.send_modify(|f| {
                    f.is_submitting = false;
                    f.error = Some(format!("Failed to quit: {}", message));
                });
                QuitOutcome::Failed(message)
            }
        }
    }
}
