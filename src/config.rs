//! Configuration file structures for the notifier.
//!
//! The configuration is a YAML file whose values can be overridden by
//! environment variables prefixed with `MATRIX_NOTIFIER_`. Nested keys are
//! separated by a double underscore.
//!
//! # Configuration File Format
//!
//! ```yaml
//! # SQLite database the native engine keeps its state in. Losing it means
//! # logging in again and configuring a new device ID.
//! database_path: "var/matrix_notifier/matrix_internal.sqlite3"
//!
//! # Random 32 bytes, hex encoded. `matrix-notifier init` generates one.
//! pickle_key: "..."
//!
//! # Obtained by logging in, `matrix-notifier init` prints both.
//! device_id: "ABCDEFGHIJ"
//! access_token: "syt_..."
//!
//! # Recovery key of the bot account, the most sensitive secret it has.
//! recovery_key: "EsTc ..."
//!
//! # Homeserver hostname (optionally with a port) WITHOUT scheme.
//! server_hostname: "matrix.example.com"
//!
//! # Recipient used when a message doesn't name one.
//! default_recipient: "@ops:example.com"
//!
//! # Custom native library paths, leave unset to use the bundled ones.
//! lib:
//!   directory: "lib/out"
//!   library_path: null
//!   headers_path: null
//! ```
//!
//! # Environment Variable Overrides
//!
//! ```bash
//! export MATRIX_NOTIFIER_ACCESS_TOKEN="syt_..."
//! export MATRIX_NOTIFIER_RECOVERY_KEY="EsTc ..."
//! export MATRIX_NOTIFIER_LIB__LIBRARY_PATH="/opt/libmatrix.so"
//! ```

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::bridge::locator::{DEFAULT_LIB_DIR, LibraryLocator};
use crate::credentials::Credentials;

/// Prefix of the environment variables overriding the file.
pub const ENV_PREFIX: &str = "MATRIX_NOTIFIER_";

/// Session database used when none is configured.
pub const DEFAULT_DATABASE_PATH: &str = "var/matrix_notifier/matrix_internal.sqlite3";

fn default_database_path() -> String {
    DEFAULT_DATABASE_PATH.to_string()
}

fn default_lib_dir() -> PathBuf {
    PathBuf::from(DEFAULT_LIB_DIR)
}

/// Root configuration structure.
///
/// Secrets are [`SecretString`]s so printing the configuration never leaks them.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Session-store locator passed to the native engine, a path or a `sqlite://` DSN.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    pub pickle_key: Option<SecretString>,

    pub device_id: Option<String>,

    /// Can also be given per destination, as the `accessToken` DSN option.
    pub access_token: Option<SecretString>,

    pub recovery_key: Option<SecretString>,

    /// Hostname used by `init` and as the default DSN host.
    pub server_hostname: Option<String>,

    pub default_recipient: Option<String>,

    #[serde(default)]
    pub lib: Lib,
}

/// Native library location.
#[derive(Debug, Deserialize)]
pub struct Lib {
    /// Directory holding the bundled artifacts.
    #[serde(default = "default_lib_dir")]
    pub directory: PathBuf,

    /// Replaces the computed shared object path.
    pub library_path: Option<PathBuf>,

    /// Replaces the computed header path.
    pub headers_path: Option<PathBuf>,
}

impl Default for Lib {
    fn default() -> Self {
        Lib {
            directory: default_lib_dir(),
            library_path: None,
            headers_path: None,
        }
    }
}

impl Config {
    /// Loads the YAML file at `path`, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is not valid YAML or a value has the
    /// wrong type.
    pub fn load(path: impl AsRef<Path>) -> Result<Config, figment::Error> {
        Figment::new()
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }

    /// Credentials bundle handed to the transport factory.
    pub fn credentials(&self) -> Credentials {
        let copy = |secret: &Option<SecretString>| {
            secret
                .as_ref()
                .map(|secret| SecretString::from(secret.expose_secret().to_owned()))
        };

        Credentials {
            pickle_key: copy(&self.pickle_key),
            device_id: self.device_id.clone(),
            access_token: copy(&self.access_token),
            recovery_key: copy(&self.recovery_key),
            default_recipient: self.default_recipient.clone(),
            session_store_path: self.database_path.clone(),
        }
    }

    /// Locator for the native library, honouring the path overrides.
    pub fn library_locator(&self) -> LibraryLocator {
        LibraryLocator::new(&self.lib.directory)
            .with_overrides(self.lib.library_path.clone(), self.lib.headers_path.clone())
    }
}
