use crate::config::data_dir;
use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Storage file for the platform session
const SESSION_FILE: &str = "platform-session.json";

/// Bearer tokens issued by the web platform
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PlatformTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// File-backed token storage with an in-memory cache
pub struct TokenStore {
    path: PathBuf,
    cache: Mutex<Option<PlatformTokens>>,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    /// Store under the app data directory
    pub fn default_location() -> Self {
        Self::new(data_dir().join(SESSION_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn cached(&self) -> Option<PlatformTokens> {
        self.cache.lock().ok().and_then(|cache| cache.clone())
    }

    fn set_cache(&self, tokens: Option<PlatformTokens>) {
        if let Ok(mut cache) = self.cache.lock() {
            *cache = tokens;
        }
    }

    /// Load tokens, preferring the cache
    pub fn load(&self) -> Result<Option<PlatformTokens>, ClientError> {
        if let Some(tokens) = self.cached() {
            return Ok(Some(tokens));
        }

        if !self.path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| ClientError::Unknown(format!("Failed to read platform session: {}", e)))?;

        let tokens: PlatformTokens = serde_json::from_str(&contents)
            .map_err(|e| ClientError::Unknown(format!("Failed to parse platform session: {}", e)))?;

        self.set_cache(Some(tokens.clone()));
        Ok(Some(tokens))
    }

    pub fn save(&self, tokens: &PlatformTokens) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ClientError::Unknown(format!("Failed to create data dir: {}", e)))?;
        }

        let json = serde_json::to_string_pretty(tokens)
            .map_err(|e| ClientError::Unknown(format!("Failed to serialize platform session: {}", e)))?;

        std::fs::write(&self.path, json)
            .map_err(|e| ClientError::Unknown(format!("Failed to write platform session: {}", e)))?;

        self.set_cache(Some(tokens.clone()));
        Ok(())
    }

    /// Forget the session in memory and on disk
    pub fn clear(&self) -> Result<(), ClientError> {
        self.set_cache(None);

        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .map_err(|e| ClientError::Unknown(format!("Failed to delete platform session: {}", e)))?;
        }
        Ok(())
    }

    pub fn access_token(&self) -> Option<String> {
        match self.load() {
            Ok(tokens) => tokens.map(|t| t.access_token),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable platform session");
                None
            }
        }
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.load().ok().flatten().and_then(|t| t.refresh_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> PlatformTokens {
        PlatformTokens {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
        }
    }

    #[test]
    fn test_save_and_reload_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SESSION_FILE);

        TokenStore::new(&path).save(&tokens()).unwrap();

        let fresh = TokenStore::new(&path);
        assert_eq!(fresh.load().unwrap(), Some(tokens()));
        assert_eq!(fresh.access_token().as_deref(), Some("access"));
        assert_eq!(fresh.refresh_token().as_deref(), Some("refresh"));
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join(SESSION_FILE));
        store.save(&tokens()).unwrap();

        store.clear().unwrap();
        assert!(!store.path().exists());
        assert_eq!(store.access_token(), None);
        store.clear().unwrap();
    }

    #[test]
    fn test_corrupt_file_is_ignored_for_bearer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE);
        std::fs::write(&path, "{not json").unwrap();

        let store = TokenStore::new(&path);
        assert!(store.load().is_err());
        assert_eq!(store.access_token(), None);
    }
}
