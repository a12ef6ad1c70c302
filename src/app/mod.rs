//! Top-level controller: owns the stores, keeps the enforcement poller in line with
//! them and resolves what the host should render.

pub mod quit;
pub mod routing;
pub mod scheduler;

pub use quit::{QuitForm, QuitGate, QuitOutcome};
pub use routing::{DashboardView, Page, Screen};
pub use scheduler::{EnforcementInputs, EnforcementScheduler};

use crate::activity::{ActivityStore, AlertApi};
use crate::auth::{AuthError, CredentialStore, SetupOutcome};
use crate::backend::{Backend, BackendEvent, BlockingCategory, Subscription};
use crate::blocking::BlockingStore;
use crate::config::AppConfig;
use crate::error::ClientError;
use crate::licensing::{FeatureKey, LicenseStore};
use crate::platform::PlatformClient;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The stores every screen reads from. Each store is mutated only through its own
/// operations.
pub struct AppState<B, A> {
    pub auth: Arc<CredentialStore<B>>,
    pub license: Arc<LicenseStore<B>>,
    pub blocking: Arc<BlockingStore<B>>,
    pub activity: Arc<ActivityStore<A>>,
    pub quit: Arc<QuitGate<B>>,
}

impl<B: Backend, A: AlertApi> AppState<B, A> {
    pub fn new(backend: Arc<B>, alerts: Arc<A>, config: &AppConfig) -> Self {
        Self {
            auth: Arc::new(CredentialStore::new(Arc::clone(&backend))),
            license: Arc::new(LicenseStore::new(Arc::clone(&backend))),
            blocking: Arc::new(BlockingStore::new(Arc::clone(&backend))),
            activity: Arc::new(ActivityStore::with_capacity(alerts, config.activity.capacity)),
            quit: Arc::new(QuitGate::new(backend)),
        }
    }

    pub fn enforcement_inputs(&self) -> EnforcementInputs {
        EnforcementInputs::from_state(&self.auth.state(), &self.blocking.state())
    }
}

type SharedScheduler<B, A> = Arc<Mutex<EnforcementScheduler<B, A>>>;

fn reconcile_scheduler<B: Backend, A: AlertApi>(scheduler: &SharedScheduler<B, A>, inputs: EnforcementInputs) -> bool {
    match scheduler.lock() {
        Ok(mut scheduler) => scheduler.reconcile(inputs),
        Err(_) => {
            warn!("Enforcement scheduler lock poisoned");
            false
        }
    }
}

pub struct App<B, A> {
    backend: Arc<B>,
    state: AppState<B, A>,
    scheduler: SharedScheduler<B, A>,
    page: Mutex<Page>,
    subscriptions: Mutex<Vec<Subscription>>,
    reconciler: Mutex<Option<JoinHandle<()>>>,
    platform: Option<Arc<PlatformClient>>,
}

impl<B: Backend, A: AlertApi> App<B, A> {
    pub fn new(backend: Arc<B>, alerts: Arc<A>, config: &AppConfig) -> Self {
        let state = AppState::new(Arc::clone(&backend), alerts, config);
        let scheduler = EnforcementScheduler::new(
            Arc::clone(&backend),
            Arc::clone(&state.blocking),
            Arc::clone(&state.activity),
            config.enforcement.check_interval(),
        );

        Self {
            backend,
            state,
            scheduler: Arc::new(Mutex::new(scheduler)),
            page: Mutex::new(Page::default()),
            subscriptions: Mutex::new(Vec::new()),
            reconciler: Mutex::new(None),
            platform: None,
        }
    }

    pub fn with_platform(mut self, platform: Arc<PlatformClient>) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn state(&self) -> &AppState<B, A> {
        &self.state
    }

    pub fn platform(&self) -> Option<&Arc<PlatformClient>> {
        self.platform.as_ref()
    }

    /// Wire up event listeners, load the credential status and resume any platform
    /// session.
    pub async fn start(&self) {
        self.listen();
        self.spawn_reconciler();

        self.state.auth.check_status().await;
        if self.state.auth.is_authenticated() {
            self.on_authenticated().await;
        }

        if let Some(platform) = &self.platform {
            platform.initialize().await;
        }

        self.reconcile();
        info!(screen = ?self.screen(), "Client started");
    }

    fn listen(&self) {
        let quit = Arc::clone(&self.state.quit);
        let quit_listener = Subscription::spawn(self.backend.subscribe(), move |event| {
            if event == BackendEvent::QuitRequested {
                debug!("Quit requested");
                quit.open();
            }
        });
        let license_listener = self.state.license.subscribe_to_changes();

        if let Ok(mut subscriptions) = self.subscriptions.lock() {
            subscriptions.push(quit_listener);
            subscriptions.push(license_listener);
        }
    }

    /// Follow store changes made outside the controller (a store operation called
    /// directly by the host) and keep the poller consistent with them.
    fn spawn_reconciler(&self) {
        let mut auth_changes = self.state.auth.watch();
        let mut blocking_changes = self.state.blocking.watch();
        let auth = Arc::clone(&self.state.auth);
        let blocking = Arc::clone(&self.state.blocking);
        let scheduler = Arc::clone(&self.scheduler);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = auth_changes.changed() => if changed.is_err() { break },
                    changed = blocking_changes.changed() => if changed.is_err() { break },
                }
                let inputs = EnforcementInputs::from_state(&auth.state(), &blocking.state());
                reconcile_scheduler(&scheduler, inputs);
            }
        });

        if let Ok(mut reconciler) = self.reconciler.lock() {
            if let Some(previous) = reconciler.replace(handle) {
                previous.abort();
            }
        }
    }

    async fn on_authenticated(&self) {
        if let Err(e) = self.state.blocking.fetch_status().await {
            warn!(error = %e, "Could not load blocking status after unlock");
        }
        if let Err(e) = self.state.license.pull_snapshot().await {
            warn!(error = %e, "Could not load entitlement after unlock");
        }
        self.reconcile();
    }

    /// Bring the poller in line with the current stores. Returns whether it runs.
    pub fn reconcile(&self) -> bool {
        reconcile_scheduler(&self.scheduler, self.state.enforcement_inputs())
    }

    pub fn is_enforcing(&self) -> bool {
        self.scheduler.lock().map(|s| s.is_running()).unwrap_or(false)
    }

    pub async fn setup(&self, password: &str) -> SetupOutcome {
        let outcome = self.state.auth.setup_credential(password).await;
        if outcome.success {
            self.on_authenticated().await;
        }
        outcome
    }

    pub async fn unlock(&self, password: &str) -> Result<(), AuthError> {
        self.state.auth.login(password).await?;
        self.on_authenticated().await;
        Ok(())
    }

    pub async fn recover(&self, master_password: &str, new_password: &str) -> Result<(), AuthError> {
        self.state.auth.recover_with_master(master_password, new_password).await?;
        self.on_authenticated().await;
        Ok(())
    }

    /// Back to the lock screen. Stops the poller before returning.
    pub fn lock(&self) {
        self.state.auth.logout();
        if let Ok(mut page) = self.page.lock() {
            *page = Page::Dashboard;
        }
        self.reconcile();
    }

    pub async fn refresh_blocking_status(&self) -> Result<(), ClientError> {
        let result = self.state.blocking.fetch_status().await;
        self.reconcile();
        result
    }

    /// Toggle a category. Turning game blocking on requires a plan that includes it.
    pub async fn set_blocking(&self, category: BlockingCategory, enabled: bool) -> Result<(), ClientError> {
        if category == BlockingCategory::Game
            && enabled
            && !self.state.license.is_feature_available(FeatureKey::GameBlocking)
        {
            return Err(ClientError::Validation(
                "Game blocking is not included in your plan".to_string(),
            ));
        }

        let result = self.state.blocking.set_category(category, enabled).await;
        self.reconcile();
        result
    }

    pub fn page(&self) -> Page {
        self.page.lock().map(|p| *p).unwrap_or_default()
    }

    pub fn navigate(&self, page: Page) {
        if let Ok(mut current) = self.page.lock() {
            *current = page;
        }
    }

    pub fn back(&self) {
        self.navigate(Page::Dashboard);
    }

    pub fn screen(&self) -> Screen {
        Screen::resolve(&self.state.auth.state(), self.page())
    }

    pub fn dashboard_view(&self) -> DashboardView {
        DashboardView::from_snapshot(&self.state.license.snapshot())
    }

    /// Stop the poller, listeners and heartbeat. Safe to call more than once.
    pub fn shutdown(&self) {
        if let Ok(mut scheduler) = self.scheduler.lock() {
            scheduler.stop();
        }
        if let Ok(mut subscriptions) = self.subscriptions.lock() {
            subscriptions.clear();
        }
        if let Ok(mut reconciler) = self.reconciler.lock() {
            if let Some(handle) = reconciler.take() {
                handle.abort();
            }
        }
        if let Some(platform) = &self.platform {
            platform.stop_heartbeat();
        }
    }
}

impl<B, A> Drop for App<B, A> {
    fn drop(&mut self) {
        if let Ok(mut scheduler) = self.scheduler.lock() {
            scheduler.stop();
        }
        if let Ok(mut reconciler) = self.reconciler.lock() {
            if let Some(handle) = reconciler.take() {
                handle.abort();
            }
        }
        if let Ok(mut subscriptions) = self.subscriptions.lock() {
            subscriptions.clear();
        }
        if let Some(platform) = &self.platform {
            platform.stop_heartbeat();
        }
    }
}
