use crate::auth::AuthState;
use crate::licensing::{EntitlementSnapshot, FeatureKey, Plan, SubscriptionStatus};
use serde::Serialize;

#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    #[default]
    Dashboard,
    Schedule,
    Blocklist,
    Settings,
}

impl Page {
    /// Unknown names land on the dashboard
    pub fn parse(name: &str) -> Self {
        match name {
            "schedule" => Page::Schedule,
            "blocklist" => Page::Blocklist,
            "settings" => Page::Settings,
            _ => Page::Dashboard,
        }
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(tag = "screen", content = "page", rename_all = "snake_case")]
pub enum Screen {
    Loading,
    FirstRun,
    LockScreen,
    Main(Page),
}

impl Screen {
    pub fn resolve(auth: &AuthState, page: Page) -> Self {
        if auth.is_loading {
            return Screen::Loading;
        }
        if !auth.is_configured {
            return Screen::FirstRun;
        }
        if !auth.is_authenticated {
            return Screen::LockScreen;
        }
        Screen::Main(page)
    }
}

/// What the dashboard renders for the current entitlement
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum DashboardView {
    Locked {
        status: SubscriptionStatus,
        message: Option<String>,
        upgrade_url: Option<String>,
    },
    Unlocked {
        plan: Plan,
        days_remaining: Option<i64>,
        /// Game toggle is only offered on plans that include it
        game_blocking_available: bool,
    },
}

impl DashboardView {
    pub fn from_snapshot(snapshot: &EntitlementSnapshot) -> Self {
        if snapshot.is_locked {
            return DashboardView::Locked {
                status: snapshot.status.clone(),
                message: snapshot.message.clone(),
                upgrade_url: snapshot.upgrade_url.clone(),
            };
        }

        DashboardView::Unlocked {
            plan: snapshot.plan.clone(),
            days_remaining: snapshot.days_remaining(),
            game_blocking_available: snapshot.is_feature_available(FeatureKey::GameBlocking),
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, DashboardView::Locked { .. })
    }
}
