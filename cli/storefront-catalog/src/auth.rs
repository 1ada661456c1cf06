//! Token storage and bearer authentication.
//!
//! Tokens are read from the store right before every request is sent,
//! so a login or logout in another process is picked up without
//! rebuilding the client.

use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// File name of the token document within the data directory.
pub const TOKENS_FILE_NAME: &str = "tokens.json";

/// Credentials and session state persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_promo_code: Option<String>,
}

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("could not read token file '{}'", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not write token file '{}'", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("token file '{}' is corrupt", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Storage backend for [Tokens].
pub trait TokenStore: Debug + Send + Sync {
    fn load(&self) -> Result<Tokens, TokenStoreError>;

    fn save(&self, tokens: &Tokens) -> Result<(), TokenStoreError>;

    /// Replace the access token, keeping everything else.
    fn set_access_token(&self, token: String) -> Result<(), TokenStoreError> {
        let mut tokens = self.load()?;
        tokens.access_token = Some(token);
        self.save(&tokens)
    }

    /// Drop the access and refresh tokens.
    ///
    /// The guest promo code is not tied to the login and survives.
    fn clear_credentials(&self) -> Result<(), TokenStoreError> {
        let mut tokens = self.load()?;
        tokens.access_token = None;
        tokens.refresh_token = None;
        self.save(&tokens)
    }
}

pub type SharedTokenStore = Arc<dyn TokenStore>;

/// Tokens persisted as a JSON document on disk.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Token store at the default location within `data_dir`.
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join(TOKENS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Tokens, TokenStoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Tokens::default()),
            Err(source) => {
                return Err(TokenStoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            },
        };
        serde_json::from_str(&contents).map_err(|source| TokenStoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, tokens: &Tokens) -> Result<(), TokenStoreError> {
        let write_err = |source| TokenStoreError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let contents = serde_json::to_string_pretty(tokens)
            .map_err(|e| write_err(io::Error::other(e)))?;
        fs::write(&self.path, contents).map_err(write_err)?;
        debug!(path = %self.path.display(), "saved tokens");
        Ok(())
    }
}

/// Tokens held in memory, used in tests and for one-off invocations.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Tokens>,
}

impl MemoryTokenStore {
    pub fn new(tokens: Tokens) -> Self {
        Self {
            tokens: Mutex::new(tokens),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Tokens, TokenStoreError> {
        Ok(self
            .tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, tokens: &Tokens) -> Result<(), TokenStoreError> {
        *self.tokens.lock().unwrap_or_else(PoisonError::into_inner) = tokens.clone();
        Ok(())
    }
}

/// Format an `Authorization` header value for a bearer token.
///
/// Returns [None] for tokens that cannot be sent as a header value.
pub(crate) fn bearer_header(token: &str) -> Option<HeaderValue> {
    let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) else {
        warn!("Failed to create header value from bearer token");
        return None;
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn missing_token_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::in_dir(dir.path());
        assert_eq!(store.load().unwrap(), Tokens::default());
    }

    #[test]
    fn file_store_persists_tokens() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::in_dir(dir.path().join("nested"));
        let tokens = Tokens {
            access_token: Some("access".to_string()),
            refresh_token: Some("refresh".to_string()),
            guest_promo_code: Some("WELCOME10".to_string()),
        };
        store.save(&tokens).unwrap();

        let reopened = FileTokenStore::in_dir(dir.path().join("nested"));
        assert_eq!(reopened.load().unwrap(), tokens);
    }

    #[test]
    fn clearing_credentials_keeps_promo_code() {
        let store = MemoryTokenStore::new(Tokens {
            access_token: Some("access".to_string()),
            refresh_token: Some("refresh".to_string()),
            guest_promo_code: Some("WELCOME10".to_string()),
        });
        store.clear_credentials().unwrap();
        assert_eq!(store.load().unwrap(), Tokens {
            access_token: None,
            refresh_token: None,
            guest_promo_code: Some("WELCOME10".to_string()),
        });
    }

    #[test]
    fn corrupt_token_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::in_dir(dir.path());
        fs::write(store.path(), "not json").unwrap();
        assert!(matches!(store.load(), Err(TokenStoreError::Parse { .. })));
    }

    #[test]
    fn invalid_token_is_not_sent() {
        assert!(bearer_header("line\nbreak").is_none());
        assert_eq!(bearer_header("abc").unwrap(), "Bearer abc");
    }
}
