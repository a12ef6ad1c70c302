//! Raw entitlement payload -> [`EntitlementSnapshot`].
//!
//! The payload casing is not guaranteed, so every field is listed once below with
//! both spellings. Add new fields to the tables, never as one-off lookups.

use crate::licensing::types::{
    Capability, EntitlementSnapshot, FeatureKey, Features, Plan, SubscriptionStatus,
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Accepted spellings of one payload field
#[derive(Debug, Clone, Copy)]
pub struct FieldSpelling {
    pub snake: &'static str,
    pub camel: &'static str,
}

impl FieldSpelling {
    const fn new(snake: &'static str, camel: &'static str) -> Self {
        Self { snake, camel }
    }

    /// First non-null value, snake_case first
    fn lookup<'a>(&self, object: &'a Map<String, Value>) -> Option<&'a Value> {
        [self.snake, self.camel]
            .into_iter()
            .filter_map(|name| object.get(name))
            .find(|value| !value.is_null())
    }

    fn matches(&self, name: &str) -> bool {
        name == self.snake || name == self.camel
    }
}

pub const PLAN: FieldSpelling = FieldSpelling::new("plan", "plan");
pub const STATUS: FieldSpelling = FieldSpelling::new("status", "status");
pub const IS_LOCKED: FieldSpelling = FieldSpelling::new("is_locked", "isLocked");
pub const FEATURES: FieldSpelling = FieldSpelling::new("features", "features");
pub const EXPIRES_AT: FieldSpelling = FieldSpelling::new("expires_at", "expiresAt");
pub const UPGRADE_URL: FieldSpelling = FieldSpelling::new("upgrade_url", "upgradeUrl");
pub const MESSAGE: FieldSpelling = FieldSpelling::new("message", "message");

/// Default for `is_locked` when the payload omits it
pub const DEFAULT_LOCKED: bool = true;

pub const FEATURE_FIELDS: [(FeatureKey, FieldSpelling); 7] = [
    (FeatureKey::WebsiteBlocking, FieldSpelling::new("website_blocking", "websiteBlocking")),
    (FeatureKey::GameBlocking, FieldSpelling::new("game_blocking", "gameBlocking")),
    (FeatureKey::MaxBlocks, FieldSpelling::new("max_blocks", "maxBlocks")),
    (FeatureKey::WebDashboard, FieldSpelling::new("web_dashboard", "webDashboard")),
    (FeatureKey::ActivityReports, FieldSpelling::new("activity_reports", "activityReports")),
    (FeatureKey::Schedules, FieldSpelling::new("schedules", "schedules")),
    (FeatureKey::TamperProtection, FieldSpelling::new("tamper_protection", "tamperProtection")),
];

/// Resolve a feature name in either spelling
pub fn feature_key(name: &str) -> Option<FeatureKey> {
    FEATURE_FIELDS
        .iter()
        .find(|(_, spelling)| spelling.matches(name))
        .map(|(key, _)| *key)
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!(raw, error = %e, "Ignoring unparseable expires_at");
            None
        }
    }
}

fn capability(key: FeatureKey, value: Option<&Value>) -> Capability {
    let parsed = match (key.default_capability(), value) {
        (Capability::Flag(_), Some(v)) => v.as_bool().map(Capability::Flag),
        (Capability::Limit(_), Some(v)) => v
            .as_i64()
            .or_else(|| v.as_f64().map(|f| f as i64))
            .map(Capability::Limit),
        (Capability::Tier(_), Some(v)) => v.as_str().map(|s| Capability::Tier(Some(s.to_string()))),
        (_, None) => None,
    };
    parsed.unwrap_or_else(|| key.default_capability())
}

fn map_features(raw: Option<&Value>) -> Features {
    let empty = Map::new();
    let object = raw.and_then(Value::as_object).unwrap_or(&empty);

    let mut features = Features::default();
    for (key, spelling) in FEATURE_FIELDS {
        features.insert(key, capability(key, spelling.lookup(object)));
    }
    features
}

/// Map a raw payload to a full snapshot.
///
/// Anything that is not an object is treated as "no entitlement". A snapshot without
/// a plan is always locked.
pub fn map_snapshot(raw: &Value) -> EntitlementSnapshot {
    let Some(object) = raw.as_object() else {
        return EntitlementSnapshot::none();
    };

    let plan = non_empty_str(PLAN.lookup(object))
        .map(|p| Plan::parse(&p))
        .unwrap_or(Plan::None);

    let is_locked = IS_LOCKED
        .lookup(object)
        .and_then(Value::as_bool)
        .unwrap_or(DEFAULT_LOCKED);

    EntitlementSnapshot {
        is_locked: is_locked || plan == Plan::None,
        plan,
        status: non_empty_str(STATUS.lookup(object))
            .map(|s| SubscriptionStatus::parse(&s))
            .unwrap_or(SubscriptionStatus::None),
        features: map_features(FEATURES.lookup(object)),
        expires_at: non_empty_str(EXPIRES_AT.lookup(object)).and_then(|s| parse_timestamp(&s)),
        upgrade_url: non_empty_str(UPGRADE_URL.lookup(object)),
        message: non_empty_str(MESSAGE.lookup(object)),
    }
}
