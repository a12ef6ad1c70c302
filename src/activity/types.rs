use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    BlockedSite,
    BlockedApp,
    ScreenTime,
    TamperAttempt,
    Login,
    SettingChange,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Critical,
}

/// Entry of the local activity log
#[derive(Serialize, Clone, PartialEq, Debug)]
pub struct ActivityEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub title: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub details: Map<String, Value>,
}

impl ActivityEvent {
    /// Process id carried in `details`, if any
    pub fn pid(&self) -> Option<u64> {
        self.details.get("pid").and_then(Value::as_u64)
    }
}

/// Activity before it is stamped with an id and time
#[derive(Clone, PartialEq, Debug)]
pub struct NewActivity {
    pub kind: ActivityKind,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub details: Map<String, Value>,
}

impl NewActivity {
    pub fn new(kind: ActivityKind, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            description: description.into(),
            severity: Severity::Info,
            details: Map::new(),
        }
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Alert synced from the web platform
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Alert {
    pub id: String,
    pub alert_type: String,
    pub severity: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub details: Map<String, Value>,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub device_name: Option<String>,
}

/// Body of `GET /parental-controls/alerts`
#[derive(Deserialize, Debug, Default)]
pub struct AlertListResponse {
    #[serde(default)]
    pub alerts: Vec<Alert>,
}
