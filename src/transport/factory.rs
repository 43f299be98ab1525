use std::sync::Arc;

use log::debug;
use secrecy::{ExposeSecret, SecretString};

use crate::bridge::NativeBridge;
use crate::credentials::Credentials;
use crate::dsn::Dsn;
use crate::error::{NotifierError, Result};
use crate::transport::MatrixTransport;

/// DSN schemes a [`TransportFactory`] accepts.
pub const SUPPORTED_SCHEMES: [&str; 2] = ["smatrix", "matrix"];

/// Builds [`MatrixTransport`]s sharing one native bridge and one credential set.
pub struct TransportFactory {
    credentials: Credentials,
    bridge: Arc<dyn NativeBridge>,
}

impl TransportFactory {
    pub fn new(credentials: Credentials, bridge: Arc<dyn NativeBridge>) -> Self {
        TransportFactory {
            credentials,
            bridge,
        }
    }

    /// Creates a transport for the homeserver named by `dsn`.
    ///
    /// The long-lived credentials are validated first, so a misconfigured
    /// factory never yields a transport. The session store directory is
    /// created when missing.
    ///
    /// # Errors
    ///
    /// - [`NotifierError::MissingCredential`] for a missing long-lived key
    /// - [`NotifierError::UnsupportedScheme`] for a scheme outside [`SUPPORTED_SCHEMES`]
    /// - [`NotifierError::SessionStore`] when the store directory cannot be created
    pub fn create(&self, dsn: &Dsn) -> Result<MatrixTransport> {
        let credentials = self.credentials.validate()?;

        if !SUPPORTED_SCHEMES.contains(&dsn.scheme()) {
            return Err(NotifierError::UnsupportedScheme {
                scheme: dsn.scheme().to_string(),
                supported: SUPPORTED_SCHEMES.join(", "),
            });
        }

        credentials.ensure_session_store_dir()?;

        debug!("creating transport for {:?}", dsn);

        let access_token = dsn
            .access_token()
            .map(|token| SecretString::from(token.expose_secret().to_owned()));

        Ok(
            MatrixTransport::new(credentials, dsn.host(), Arc::clone(&self.bridge))
                .with_port(dsn.port())
                .with_access_token(access_token),
        )
    }

    /// Parses `dsn` and creates a transport for it.
    pub fn create_from_str(&self, dsn: &str) -> Result<MatrixTransport> {
        self.create(&Dsn::parse(dsn)?)
    }
}
