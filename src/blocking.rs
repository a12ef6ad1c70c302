//! Live blocking status as reported by the backend.

use crate::backend::{Backend, BlockedProcess, BlockingCategory, BlockingStatus};
use crate::config::RECENTLY_BLOCKED_CAPACITY;
use crate::error::ClientError;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlockingState {
    #[serde(flatten)]
    pub status: BlockingStatus,
    /// Newest first, unique by pid
    pub recently_blocked: Vec<BlockedProcess>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl BlockingState {
    pub fn any_category_enabled(&self) -> bool {
        self.status.game_blocking_enabled || self.status.ai_blocking_enabled || self.status.dns_blocking_enabled
    }

    fn set_category(&mut self, category: BlockingCategory, enabled: bool) {
        match category {
            BlockingCategory::Game => self.status.game_blocking_enabled = enabled,
            BlockingCategory::Ai => self.status.ai_blocking_enabled = enabled,
            BlockingCategory::Dns => self.status.dns_blocking_enabled = enabled,
            BlockingCategory::Browser => self.status.browser_blocking_enabled = enabled,
        }
    }
}

pub struct BlockingStore<B> {
    backend: Arc<B>,
    state: watch::Sender<BlockingState>,
}

impl<B: Backend> BlockingStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        let (state, _) = watch::channel(BlockingState::default());
        Self { backend, state }
    }

    pub fn state(&self) -> BlockingState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<BlockingState> {
        self.state.subscribe()
    }

    pub async fn fetch_status(&self) -> Result<(), ClientError> {
        self.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });

        match self.backend.get_blocking_status().await {
            Ok(status) => {
                self.state.send_modify(|s| {
                    s.status = status;
                    s.is_loading = false;
                });
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to get blocking status");
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

    /// Toggle a category. The local flag follows what the backend confirms.
    pub async fn set_category(&self, category: BlockingCategory, enabled: bool) -> Result<(), ClientError> {
        info!(command = category.command(), enabled, "Toggling blocking category");

        match self.backend.set_blocking(category, enabled).await {
            Ok(applied) => {
                self.state.send_modify(|s| {
                    s.set_category(category, applied);
                    s.error = None;
                });
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

    /// Merge processes terminated by an enforcement check into `recently_blocked`.
    pub fn apply_check_result(&self, processes: &[BlockedProcess]) {
        if processes.is_empty() {
            return;
        }

        self.state.send_modify(|s| {
            for process in processes.iter().rev() {
                s.recently_blocked.retain(|p| p.pid != process.pid);
                s.recently_blocked.insert(0, process.clone());
            }
            s.recently_blocked.truncate(RECENTLY_BLOCKED_CAPACITY);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;

    fn process(pid: u32, name: &str) -> BlockedProcess {
        BlockedProcess { pid, name: name.to_string() }
    }

    #[tokio::test]
    async fn test_fetch_status() {
        let backend = Arc::new(FakeBackend::new());
        backend.set_blocking_status(BlockingStatus {
            dns_blocking_enabled: true,
            currently_blocking: true,
            ..Default::default()
        });
        let store = BlockingStore::new(backend.clone());

        store.fetch_status().await.unwrap();
        let state = store.state();
        assert!(state.status.currently_blocking);
        assert!(state.any_category_enabled());

        backend.fail_command("get_blocking_status", serde_json::json!("daemon not running"));
        assert!(store.fetch_status().await.is_err());
        assert!(store.state().status.currently_blocking);
        assert!(!store.state().is_loading);
    }

    #[tokio::test]
    async fn test_browser_category_does_not_count() {
        let backend = Arc::new(FakeBackend::new());
        let store = BlockingStore::new(backend.clone());

        store.set_category(BlockingCategory::Browser, true).await.unwrap();
        assert!(store.state().status.browser_blocking_enabled);
        assert!(!store.state().any_category_enabled());

        store.set_category(BlockingCategory::Ai, true).await.unwrap();
        assert!(store.state().any_category_enabled());
        assert_eq!(backend.calls("set_blocking"), 2);
    }

    #[tokio::test]
    async fn test_recently_blocked_unique_newest_first() {
        let store = BlockingStore::new(Arc::new(FakeBackend::new()));
        store.apply_check_result(&[process(1, "a"), process(2, "b")]);
        store.apply_check_result(&[process(3, "c"), process(1, "a")]);

        let pids: Vec<u32> = store.state().recently_blocked.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![3, 1, 2]);

        let many: Vec<_> = (100..140).map(|pid| process(pid, "x")).collect();
        store.apply_check_result(&many);
        assert_eq!(store.state().recently_blocked.len(), RECENTLY_BLOCKED_CAPACITY);
        assert_eq!(store.state().recently_blocked[0].pid, 100);
    }
}
