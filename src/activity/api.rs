use crate::activity::types::{Alert, AlertListResponse};
use crate::config::{endpoints, ApiConfig};
use crate::error::ClientError;
use crate::platform::storage::TokenStore;
use std::future::Future;
use std::sync::Arc;

/// Server-side alert endpoints. Every call is idempotent under retry.
pub trait AlertApi: Send + Sync + 'static {
    fn list_alerts(&self) -> impl Future<Output = Result<Vec<Alert>, ClientError>> + Send;

    fn mark_read(&self, alert_id: &str) -> impl Future<Output = Result<(), ClientError>> + Send;

    fn mark_all_read(&self) -> impl Future<Output = Result<(), ClientError>> + Send;
}

/// HTTP client for the platform alert API (bearer-authenticated)
pub struct HttpAlertClient {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenStore>,
}

impl HttpAlertClient {
    pub fn new(config: &ApiConfig, tokens: Arc<TokenStore>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            tokens,
        })
    }

    fn bearer(&self) -> Result<String, ClientError> {
        self.tokens
            .access_token()
            .ok_or_else(|| ClientError::Unauthorized("Not signed in to the platform".to_string()))
    }

    async fn post(&self, url: String) -> Result<(), ClientError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(self.bearer()?)
            .send()
            .await?;

        check_status(&response)?;
        Ok(())
    }
}

fn check_status(response: &reqwest::Response) -> Result<(), ClientError> {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized("Platform session expired".to_string()));
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(response.url().path().to_string()));
    }
    if !status.is_success() {
        return Err(ClientError::Transport(format!("Server returned {}", status)));
    }
    Ok(())
}

impl AlertApi for HttpAlertClient {
    async fn list_alerts(&self) -> Result<Vec<Alert>, ClientError> {
        let response = self
            .client
            .get(endpoints::alerts(&self.base_url))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;

        check_status(&response)?;

        let body: AlertListResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Unknown(format!("Failed to parse response: {}", e)))?;

        Ok(body.alerts)
    }

    async fn mark_read(&self, alert_id: &str) -> Result<(), ClientError> {
        self.post(endpoints::alert_read(&self.base_url, alert_id)).await
    }

    async fn mark_all_read(&self) -> Result<(), ClientError> {
        self.post(endpoints::alerts_read_all(&self.base_url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requires_platform_session() {
        let dir = tempfile::tempdir().unwrap();
        let tokens = Arc::new(TokenStore::new(dir.path().join("session.json")));
        let client = HttpAlertClient::new(&ApiConfig::default(), tokens).unwrap();

        let err = client.list_alerts().await.unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized(_)));
        assert!(matches!(client.mark_all_read().await, Err(ClientError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let tokens = Arc::new(TokenStore::new(dir.path().join("session.json")));
        tokens
            .save(&crate::platform::storage::PlatformTokens {
                access_token: "token".to_string(),
                refresh_token: None,
            })
            .unwrap();

        let config = ApiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
        };
        let client = HttpAlertClient::new(&config, tokens).unwrap();

        let err = client.mark_read("a1").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)), "{:?}", err);
    }
}
