use crate::config::{endpoints, get_app_version, get_platform, AppConfig};
use crate::error::ClientError;
use crate::platform::device::device_name;
use crate::platform::storage::{PlatformTokens, TokenStore};
use crate::poller::Poller;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

// ============================================================================
// Auth
// ============================================================================

#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Tokens returned by login and refresh
#[derive(Deserialize, Debug)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

// ============================================================================
// Installation
// ============================================================================

#[derive(Serialize, Debug)]
pub struct InstallationRegisterRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_token: Option<String>,
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    pub app_version: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct InstallationResponse {
    pub installation_id: String,
    pub device_id: String,
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct HeartbeatRequest {
    pub device_id: String,
    pub app_version: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct HeartbeatResponse {
    pub status: String,
    pub server_time: String,
}

// ============================================================================
// HTTP Client
// ============================================================================

/// Web platform session: tokens, installation registration and heartbeat
pub struct PlatformClient {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenStore>,
    device_id: String,
    download_token: Option<String>,
    heartbeat_period: Duration,
    heartbeat: Mutex<Option<Poller>>,
}

impl PlatformClient {
    pub fn new(config: &AppConfig, tokens: Arc<TokenStore>, device_id: String) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.api.timeout())
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api.base_url.clone(),
            tokens,
            device_id,
            download_token: config.platform.download_token.clone(),
            heartbeat_period: config.platform.heartbeat_interval(),
            heartbeat: Mutex::new(None),
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn is_logged_in(&self) -> bool {
        self.tokens.access_token().is_some()
    }

    pub fn is_heartbeat_running(&self) -> bool {
        self.heartbeat
            .lock()
            .map(|h| h.as_ref().map(Poller::is_running).unwrap_or(false))
            .unwrap_or(false)
    }

    /// Resume a stored session on app start
    pub async fn initialize(self: &Arc<Self>) {
        if !self.is_logged_in() {
            debug!("No platform session, skipping installation registration");
            return;
        }

        self.register_installation().await;
        self.start_heartbeat();
    }

    /// Sign in to the web platform, register this installation and start the
    /// heartbeat.
    pub async fn login(self: &Arc<Self>, email: &str, password: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .post(endpoints::login(&self.base_url))
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Platform login failed");
            return Err(ClientError::Unauthorized("Invalid email or password".to_string()));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Unknown(format!("Failed to parse response: {}", e)))?;

        self.tokens.save(&PlatformTokens {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })?;

        self.register_installation().await;
        self.start_heartbeat();
        Ok(())
    }

    pub fn logout(&self) {
        if let Err(e) = self.tokens.clear() {
            warn!(error = %e, "Failed to clear platform session");
        }
        self.stop_heartbeat();
    }

    pub async fn register_installation(&self) -> Option<InstallationResponse> {
        let request = InstallationRegisterRequest {
            download_token: self.download_token.clone(),
            device_id: self.device_id.clone(),
            device_name: Some(device_name()),
            platform: get_platform().to_string(),
            os_version: None,
            app_version: get_app_version(),
        };

        match self
            .authorized_post::<_, InstallationResponse>(endpoints::installation_register(&self.base_url), &request)
            .await
        {
            Ok(installation) => {
                info!(installation_id = %installation.installation_id, "Installation registered");
                Some(installation)
            }
            Err(e) => {
                warn!(error = %e, "Installation registration failed");
                None
            }
        }
    }

    pub async fn send_heartbeat(&self) -> Option<HeartbeatResponse> {
        let request = HeartbeatRequest {
            device_id: self.device_id.clone(),
            app_version: get_app_version(),
        };

        match self
            .authorized_post::<_, HeartbeatResponse>(endpoints::installation_heartbeat(&self.base_url), &request)
            .await
        {
            Ok(heartbeat) => Some(heartbeat),
            Err(e) => {
                warn!(error = %e, "Heartbeat failed");
                None
            }
        }
    }

    /// Replace the heartbeat poller; the first beat is sent immediately.
    pub fn start_heartbeat(self: &Arc<Self>) {
        let client = Arc::clone(self);
        let poller = Poller::spawn(self.heartbeat_period, move |_| {
            let client = Arc::clone(&client);
            async move {
                client.send_heartbeat().await;
            }
        });

        if let Ok(mut heartbeat) = self.heartbeat.lock() {
            *heartbeat = Some(poller);
        }
    }

    pub fn stop_heartbeat(&self) {
        let poller = self.heartbeat.lock().ok().and_then(|mut h| h.take());
        drop(poller);
    }

    /// POST with the bearer token. A 401 triggers one token refresh and one retry.
    async fn authorized_post<T, R>(&self, url: String, body: &T) -> Result<R, ClientError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut refreshed = false;

        loop {
            let token = self
                .tokens
                .access_token()
                .ok_or_else(|| ClientError::Unauthorized("Not signed in to the platform".to_string()))?;

            let response = self
                .client
                .post(url.as_str())
                .bearer_auth(token)
                .json(body)
                .send()
                .await?;

            let status = response.status();
            if status == reqwest::StatusCode::UNAUTHORIZED {
                if !refreshed && self.refresh_access_token().await {
                    refreshed = true;
                    continue;
                }
                return Err(ClientError::Unauthorized("Platform session expired".to_string()));
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(ClientError::NotFound(url));
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(ClientError::Transport(format!("Server returned {}: {}", status, text)));
            }

            return response
                .json()
                .await
                .map_err(|e| ClientError::Unknown(format!("Failed to parse response: {}", e)));
        }
    }

    /// Exchange the refresh token. A rejected refresh ends the session.
    async fn refresh_access_token(&self) -> bool {
        let Some(refresh_token) = self.tokens.refresh_token() else {
            return false;
        };

        let response = match self
            .client
            .post(endpoints::refresh(&self.base_url))
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                return false;
            }
        };

        if !response.status().is_success() {
            info!("Refresh token rejected, ending platform session");
            self.logout();
            return false;
        }

        match response.json::<TokenResponse>().await {
            Ok(tokens) => {
                let saved = self.tokens.save(&PlatformTokens {
                    access_token: tokens.access_token,
                    refresh_token: tokens.refresh_token.or(Some(refresh_token)),
                });
                saved.is_ok()
            }
            Err(e) => {
                warn!(error = %e, "Failed to parse refresh response");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;

    fn client(dir: &tempfile::TempDir) -> Arc<PlatformClient> {
        let config = AppConfig {
            api: ApiConfig {
                base_url: "http://127.0.0.1:9".to_string(),
                timeout_secs: 2,
            },
            ..Default::default()
        };
        let tokens = Arc::new(TokenStore::new(dir.path().join("session.json")));
        Arc::new(PlatformClient::new(&config, tokens, "device_test".to_string()).unwrap())
    }

    #[test]
    fn test_register_request_shape() {
        let request = InstallationRegisterRequest {
            download_token: None,
            device_id: "device_1".to_string(),
            device_name: Some("LINUX Device".to_string()),
            platform: "linux".to_string(),
            os_version: None,
            app_version: "0.1.0".to_string(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("download_token").is_none());
        assert!(value.get("os_version").is_none());
        assert_eq!(value["device_name"], "LINUX Device");
    }

    #[tokio::test]
    async fn test_initialize_without_session_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(&dir);

        client.initialize().await;
        assert!(!client.is_logged_in());
        assert!(!client.is_heartbeat_running());
        assert!(client.register_installation().await.is_none());
    }

    #[tokio::test]
    async fn test_login_against_unreachable_server() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(&dir);

        let err = client.login("parent@example.com", "pw").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)), "{:?}", err);
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn test_heartbeat_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(&dir);

        client.start_heartbeat();
        assert!(client.is_heartbeat_running());

        client.logout();
        assert!(!client.is_heartbeat_running());
    }
}
