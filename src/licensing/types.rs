use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

const MS_PER_DAY: i64 = 86_400_000;

/// Subscription plan
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub enum Plan {
    #[default]
    None,
    Basic,
    Pro,
    Other(String),
}

impl Plan {
    /// Parse a raw plan name. Empty and `"none"` both mean no plan.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Plan::None,
            "basic" => Plan::Basic,
            "pro" => Plan::Pro,
            other => Plan::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Plan::None => "none",
            Plan::Basic => "basic",
            Plan::Pro => "pro",
            Plan::Other(name) => name,
        }
    }
}

impl Serialize for Plan {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Billing status reported by the platform
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub enum SubscriptionStatus {
    #[default]
    None,
    Trialing,
    Active,
    PastDue,
    Canceled,
    ExpiredTrial,
    Other(String),
}

impl SubscriptionStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "none" => SubscriptionStatus::None,
            "trialing" => SubscriptionStatus::Trialing,
            "active" => SubscriptionStatus::Active,
            "past_due" => SubscriptionStatus::PastDue,
            "canceled" | "cancelled" => SubscriptionStatus::Canceled,
            "expired_trial" => SubscriptionStatus::ExpiredTrial,
            other => SubscriptionStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SubscriptionStatus::None => "none",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::ExpiredTrial => "expired_trial",
            SubscriptionStatus::Other(name) => name,
        }
    }
}

impl Serialize for SubscriptionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Features a plan can unlock
#[derive(Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKey {
    WebsiteBlocking,
    GameBlocking,
    MaxBlocks,
    WebDashboard,
    ActivityReports,
    Schedules,
    TamperProtection,
}

impl FeatureKey {
    pub const ALL: [FeatureKey; 7] = [
        FeatureKey::WebsiteBlocking,
        FeatureKey::GameBlocking,
        FeatureKey::MaxBlocks,
        FeatureKey::WebDashboard,
        FeatureKey::ActivityReports,
        FeatureKey::Schedules,
        FeatureKey::TamperProtection,
    ];

    /// Value used when the payload does not carry this feature
    pub fn default_capability(&self) -> Capability {
        match self {
            FeatureKey::MaxBlocks => Capability::Limit(0),
            FeatureKey::TamperProtection => Capability::Tier(None),
            _ => Capability::Flag(false),
        }
    }
}

/// What a feature grants
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Capability {
    Flag(bool),
    Limit(i64),
    /// Named tier, e.g. tamper protection level
    Tier(Option<String>),
}

impl Capability {
    pub fn is_truthy(&self) -> bool {
        match self {
            Capability::Flag(enabled) => *enabled,
            Capability::Limit(n) => *n != 0,
            Capability::Tier(tier) => tier.as_deref().map(|t| !t.is_empty()).unwrap_or(false),
        }
    }
}

impl Serialize for Capability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Capability::Flag(enabled) => serializer.serialize_bool(*enabled),
            Capability::Limit(n) => serializer.serialize_i64(*n),
            Capability::Tier(Some(tier)) => serializer.serialize_str(tier),
            Capability::Tier(None) => serializer.serialize_none(),
        }
    }
}

/// Feature map of a snapshot. Every key is always present, holding its default
/// until a payload says otherwise.
#[derive(Serialize, Clone, PartialEq, Eq, Debug)]
#[serde(transparent)]
pub struct Features(BTreeMap<FeatureKey, Capability>);

impl Default for Features {
    fn default() -> Self {
        Self(
            FeatureKey::ALL
                .into_iter()
                .map(|key| (key, key.default_capability()))
                .collect(),
        )
    }
}

impl Features {
    pub fn get(&self, key: FeatureKey) -> Capability {
        self.0.get(&key).cloned().unwrap_or_else(|| key.default_capability())
    }

    pub fn insert(&mut self, key: FeatureKey, capability: Capability) {
        self.0.insert(key, capability);
    }

    pub fn max_blocks(&self) -> i64 {
        match self.get(FeatureKey::MaxBlocks) {
            Capability::Limit(n) => n,
            _ => 0,
        }
    }
}

/// Entitlement state as last reported by the backend
#[derive(Serialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementSnapshot {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub is_locked: bool,
    pub features: Features,
    pub expires_at: Option<DateTime<Utc>>,
    pub upgrade_url: Option<String>,
    pub message: Option<String>,
}

impl Default for EntitlementSnapshot {
    fn default() -> Self {
        Self::none()
    }
}

impl EntitlementSnapshot {
    /// The single "no entitlement" representation: no plan, locked.
    pub fn none() -> Self {
        Self {
            plan: Plan::None,
            status: SubscriptionStatus::None,
            is_locked: true,
            features: Features::default(),
            expires_at: None,
            upgrade_url: None,
            message: None,
        }
    }

    pub fn has_entitlement(&self) -> bool {
        self.plan != Plan::None
    }

    /// Whole days until `expires_at`, rounded up. Recomputed on every call.
    pub fn days_remaining(&self) -> Option<i64> {
        self.days_remaining_at(Utc::now())
    }

    pub fn days_remaining_at(&self, now: DateTime<Utc>) -> Option<i64> {
        let expires = self.expires_at?;
        let ms = (expires - now).num_milliseconds();
        // Integer division truncates toward zero, which is already the ceiling for
        // negative values.
        let days = ms / MS_PER_DAY;
        Some(if ms % MS_PER_DAY > 0 { days + 1 } else { days })
    }

    pub fn is_feature_available(&self, key: FeatureKey) -> bool {
        if self.is_locked {
            return false;
        }
        self.features.get(key).is_truthy()
    }
}

/// License state for the view layer
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LicenseInfo {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub is_locked: bool,
    pub features: Features,
    pub expires_at: Option<DateTime<Utc>>,
    pub days_remaining: Option<i64>,
    pub upgrade_url: Option<String>,
    pub message: Option<String>,
}

impl From<&EntitlementSnapshot> for LicenseInfo {
    fn from(snapshot: &EntitlementSnapshot) -> Self {
        LicenseInfo {
            plan: snapshot.plan.clone(),
            status: snapshot.status.clone(),
            is_locked: snapshot.is_locked,
            features: snapshot.features.clone(),
            expires_at: snapshot.expires_at,
            days_remaining: snapshot.days_remaining(),
            upgrade_url: snapshot.upgrade_url.clone(),
            message: snapshot.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_days_remaining_rounds_up() {
        let now = Utc::now();
        let snapshot = EntitlementSnapshot {
            expires_at: Some(now + Duration::hours(36)),
            ..EntitlementSnapshot::none()
        };
        assert_eq!(snapshot.days_remaining_at(now), Some(2));

        let exact = EntitlementSnapshot {
            expires_at: Some(now + Duration::days(3)),
            ..EntitlementSnapshot::none()
        };
        assert_eq!(exact.days_remaining_at(now), Some(3));

        let expired = EntitlementSnapshot {
            expires_at: Some(now - Duration::hours(36)),
            ..EntitlementSnapshot::none()
        };
        assert_eq!(expired.days_remaining_at(now), Some(-1));

        assert_eq!(EntitlementSnapshot::none().days_remaining_at(now), None);
    }

    #[test]
    fn test_locked_hides_every_feature() {
        let mut features = Features::default();
        for key in FeatureKey::ALL {
            let capability = match key.default_capability() {
                Capability::Flag(_) => Capability::Flag(true),
                Capability::Limit(_) => Capability::Limit(50),
                Capability::Tier(_) => Capability::Tier(Some("strict".to_string())),
            };
            features.insert(key, capability);
        }

        let mut snapshot = EntitlementSnapshot {
            plan: Plan::Pro,
            status: SubscriptionStatus::PastDue,
            is_locked: true,
            features,
            ..EntitlementSnapshot::none()
        };

        for key in FeatureKey::ALL {
            assert!(!snapshot.is_feature_available(key), "{:?} leaked while locked", key);
        }

        snapshot.is_locked = false;
        for key in FeatureKey::ALL {
            assert!(snapshot.is_feature_available(key));
        }
    }

    #[test]
    fn test_missing_features_use_defaults() {
        let features = Features::default();
        assert_eq!(features.get(FeatureKey::GameBlocking), Capability::Flag(false));
        assert_eq!(features.get(FeatureKey::MaxBlocks), Capability::Limit(0));
        assert_eq!(features.get(FeatureKey::TamperProtection), Capability::Tier(None));
        assert_eq!(features.max_blocks(), 0);
    }

    #[test]
    fn test_default_features_serialize_every_key() {
        let value = serde_json::to_value(EntitlementSnapshot::none().features).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), FeatureKey::ALL.len());
        assert_eq!(object["game_blocking"], serde_json::json!(false));
        assert_eq!(object["max_blocks"], serde_json::json!(0));
        assert!(object["tamper_protection"].is_null());
    }

    #[test]
    fn test_plan_and_status_parse() {
        assert_eq!(Plan::parse(""), Plan::None);
        assert_eq!(Plan::parse("None"), Plan::None);
        assert_eq!(Plan::parse("pro"), Plan::Pro);
        assert_eq!(Plan::parse("family"), Plan::Other("family".to_string()));
        assert_eq!(SubscriptionStatus::parse("past_due"), SubscriptionStatus::PastDue);
        assert_eq!(SubscriptionStatus::parse("expired_trial").as_str(), "expired_trial");
    }
}
