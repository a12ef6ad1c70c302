pub mod activity;
pub mod app;
pub mod auth;
pub mod backend;
pub mod blocking;
pub mod config;
pub mod error;
pub mod licensing;
pub mod logging;
pub mod platform;
pub mod poller;

#[cfg(test)]
pub(crate) mod testing;

use activity::HttpAlertClient;
use app::App;
use backend::Backend;
use config::AppConfig;
use error::ClientError;
use logging::LoggingGuard;
use platform::{PlatformClient, TokenStore};
use std::sync::Arc;

pub use app::{AppState, DashboardView, Page, Screen};
pub use backend::{BackendEvent, Subscription};
pub use error::{ActionResult, ErrorKind};

/// A started client bound to a host backend
pub struct ParentShield<B: Backend> {
    pub app: App<B, HttpAlertClient>,
    pub config: AppConfig,
    _logging: LoggingGuard,
}

/// Load configuration, start logging and bring the client up against `backend`.
pub async fn run<B: Backend>(backend: Arc<B>) -> Result<ParentShield<B>, ClientError> {
    let config = AppConfig::load()?;
    let logging = logging::init(&config.logging)?;

    let device_id = platform::device::get_device_id()
        .map_err(|e| ClientError::Unknown(format!("Failed to get device id: {}", e)))?;
    tracing::info!(%device_id, version = %config::get_app_version(), "Starting ParentShield client");

    let tokens = Arc::new(TokenStore::default_location());
    let alerts = Arc::new(HttpAlertClient::new(&config.api, Arc::clone(&tokens))?);
    let platform = Arc::new(PlatformClient::new(&config, tokens, device_id)?);

    let app = App::new(backend, alerts, &config).with_platform(platform);
    app.start().await;

    Ok(ParentShield {
        app,
        config,
        _logging: logging,
    })
}
