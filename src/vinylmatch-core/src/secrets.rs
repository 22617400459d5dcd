//! Discogs token storage in the OS keyring.
//!
//! The personal access token is the only secret the client keeps; it never
//! touches the key/value store or the config file.

use thiserror::Error;

/// Service name used for all VinylMatch credentials in the OS keyring.
const SERVICE_NAME: &str = "vinylmatch";

const DISCOGS_ACCOUNT: &str = "discogs";

#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("credential not found: {key}")]
    NotFound { key: String },

    #[error("keyring access denied: {0}")]
    AccessDenied(String),

    #[error("keyring unavailable: {0}")]
    Unavailable(String),

    #[error("keyring error: {0}")]
    Other(String),
}

impl From<keyring::Error> for SecretsError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::NoEntry => SecretsError::NotFound {
                key: "unknown".into(),
            },
            keyring::Error::NoStorageAccess(e) => SecretsError::AccessDenied(e.to_string()),
            keyring::Error::PlatformFailure(e) => SecretsError::Unavailable(e.to_string()),
            other => SecretsError::Other(other.to_string()),
        }
    }
}

pub type SecretsResult<T> = Result<T, SecretsError>;

#[derive(Debug, Clone)]
pub struct CredentialStore {
    service: String,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.into(),
        }
    }

    fn token_key(profile: Option<&str>) -> String {
        match profile {
            Some(p) => format!("{DISCOGS_ACCOUNT}/{p}/token"),
            None => format!("{DISCOGS_ACCOUNT}/token"),
        }
    }

    pub fn store_discogs_token(&self, profile: Option<&str>, token: &str) -> SecretsResult<()> {
        let key = Self::token_key(profile);
        let entry = keyring::Entry::new(&self.service, &key)?;
        entry.set_password(token)?;
        tracing::debug!(key = %key, "stored discogs token in keyring");
        Ok(())
    }

    /// Returns `Ok(None)` when no token has been stored.
    pub fn discogs_token(&self, profile: Option<&str>) -> SecretsResult<Option<String>> {
        let key = Self::token_key(profile);
        let entry = keyring::Entry::new(&self.service, &key)?;
        match entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Deleting a missing token is not an error.
    pub fn delete_discogs_token(&self, profile: Option<&str>) -> SecretsResult<()> {
        let key = Self::token_key(profile);
        let entry = keyring::Entry::new(&self.service, &key)?;
        match entry.delete_credential() {
            Ok(()) => {
                tracing::debug!(key = %key, "deleted discogs token from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
