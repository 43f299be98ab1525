//! Credential validation and precedence.
//!
//! The long-lived keys (pickle key, device id, recovery key) are checked once,
//! when a transport is built. The access token is resolved on every dispatch:
//! a token carried by the connection string wins over the configured one.

use std::{fs, path::PathBuf};

use log::{debug, info};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{Credential, NotifierError, Result};

/// Scheme prefix of a SQLite session-store DSN.
const SQLITE_SCHEME: &str = "sqlite://";

/// Credentials as configured, any of them possibly missing.
#[derive(Debug, Default)]
pub struct Credentials {
    pub pickle_key: Option<SecretString>,
    pub device_id: Option<String>,
    pub access_token: Option<SecretString>,
    pub recovery_key: Option<SecretString>,
    pub default_recipient: Option<String>,
    /// Session-store locator, either a filesystem path or a `sqlite://` DSN.
    pub session_store_path: String,
}

/// Credentials whose long-lived keys are known to be present.
#[derive(Debug)]
pub struct ValidatedCredentials {
    pickle_key: SecretString,
    device_id: String,
    recovery_key: SecretString,
    access_token: Option<SecretString>,
    default_recipient: Option<String>,
    session_store_path: String,
}

fn is_blank(secret: &SecretString) -> bool {
    secret.expose_secret().is_empty()
}

fn copy_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}

impl Credentials {
    /// Checks the long-lived keys, in pickle key, device id, recovery key order.
    ///
    /// # Errors
    ///
    /// [`NotifierError::MissingCredential`] naming the first absent or empty key.
    pub fn validate(&self) -> Result<ValidatedCredentials> {
        let pickle_key = self
            .pickle_key
            .as_ref()
            .filter(|key| !is_blank(key))
            .map(copy_secret)
            .ok_or(NotifierError::MissingCredential {
                which: Credential::PickleKey,
            })?;
        let device_id = self
            .device_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or(NotifierError::MissingCredential {
                which: Credential::DeviceId,
            })?;
        let recovery_key = self
            .recovery_key
            .as_ref()
            .filter(|key| !is_blank(key))
            .map(copy_secret)
            .ok_or(NotifierError::MissingCredential {
                which: Credential::RecoveryKey,
            })?;

        debug!("credentials validated for device {}", device_id);

        Ok(ValidatedCredentials {
            pickle_key,
            device_id,
            recovery_key,
            access_token: self.access_token.as_ref().map(copy_secret),
            default_recipient: self.default_recipient.clone(),
            session_store_path: self.session_store_path.clone(),
        })
    }
}

impl ValidatedCredentials {
    pub fn pickle_key(&self) -> SecretString {
        copy_secret(&self.pickle_key)
    }

    pub fn recovery_key(&self) -> SecretString {
        copy_secret(&self.recovery_key)
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn default_recipient(&self) -> Option<&str> {
        self.default_recipient.as_deref()
    }

    pub fn session_store_path(&self) -> &str {
        &self.session_store_path
    }

    /// Resolves the access token for one dispatch.
    ///
    /// A non-empty `override_token` wins, then the configured token.
    ///
    /// # Errors
    ///
    /// [`NotifierError::MissingAccessToken`] when neither is available.
    pub fn resolve_access_token(&self, override_token: Option<&SecretString>) -> Result<SecretString> {
        override_token
            .filter(|token| !is_blank(token))
            .or_else(|| self.access_token.as_ref().filter(|token| !is_blank(token)))
            .map(copy_secret)
            .ok_or(NotifierError::MissingAccessToken)
    }

    /// Directory that holds the session store.
    ///
    /// `sqlite://` prefixes and extra leading slashes of a DSN are stripped so
    /// `sqlite:///var/matrix.db` lives in `/var`.
    pub fn session_store_dir(&self) -> Option<PathBuf> {
        let mut path = self
            .session_store_path
            .strip_prefix(SQLITE_SCHEME)
            .unwrap_or(&self.session_store_path);
        while path.starts_with("//") {
            path = &path[1..];
        }

        PathBuf::from(path)
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(PathBuf::from)
    }

    /// Creates the session store's parent directory when it doesn't exist.
    ///
    /// # Errors
    ///
    /// [`NotifierError::SessionStore`] when the directory cannot be created.
    pub fn ensure_session_store_dir(&self) -> Result<()> {
        let Some(dir) = self.session_store_dir() else {
            return Ok(());
        };
        if dir.is_dir() {
            return Ok(());
        }

        info!("creating session store directory {}", dir.display());
        fs::create_dir_all(&dir).map_err(|source| NotifierError::SessionStore {
            path: dir.display().to_string(),
            source,
        })
    }
}
