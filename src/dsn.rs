//! Connection strings such as `smatrix://matrix.example.com:8448?accessToken=...`.

use std::fmt;

use secrecy::SecretString;
use url::Url;

use crate::error::{NotifierError, Result};

/// Query option carrying a per-destination access token.
pub const ACCESS_TOKEN_OPTION: &str = "accessToken";

/// Parsed connection string.
pub struct Dsn {
    scheme: String,
    host: String,
    port: Option<u16>,
    access_token: Option<SecretString>,
}

impl Dsn {
    /// Parses a DSN of the form `scheme://host[:port][?accessToken=token]`.
    ///
    /// # Errors
    ///
    /// [`NotifierError::InvalidDsn`] when the string is not a URL or has no host.
    pub fn parse(dsn: &str) -> Result<Self> {
        let url = Url::parse(dsn).map_err(|e| NotifierError::InvalidDsn(e.to_string()))?;

        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| NotifierError::InvalidDsn(format!("missing host in {}", url.scheme())))?
            .to_string();

        let access_token = url
            .query_pairs()
            .find(|(key, _)| key == ACCESS_TOKEN_OPTION)
            .map(|(_, value)| SecretString::from(value.into_owned()));

        Ok(Dsn {
            scheme: url.scheme().to_string(),
            host,
            port: url.port(),
            access_token,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn access_token(&self) -> Option<&SecretString> {
        self.access_token.as_ref()
    }
}

impl fmt::Debug for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dsn")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_parse_full_dsn() {
        let dsn = Dsn::parse("smatrix://matrix.example.com:8448?accessToken=dsn-token").unwrap();

        assert_eq!(dsn.scheme(), "smatrix");
        assert_eq!(dsn.host(), "matrix.example.com");
        assert_eq!(dsn.port(), Some(8448));
        assert_eq!(dsn.access_token().unwrap().expose_secret(), "dsn-token");
    }

    #[test]
    fn test_parse_host_only() {
        let dsn = Dsn::parse("matrix://matrix.example.com").unwrap();

        assert_eq!(dsn.scheme(), "matrix");
        assert_eq!(dsn.host(), "matrix.example.com");
        assert_eq!(dsn.port(), None);
        assert!(dsn.access_token().is_none());
    }

    #[test]
    fn test_parse_ignores_other_options() {
        let dsn = Dsn::parse("smatrix://matrix.example.com?foo=bar&accessToken=a%2Bb").unwrap();
        assert_eq!(dsn.access_token().unwrap().expose_secret(), "a+b");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(Dsn::parse("not a dsn"), Err(NotifierError::InvalidDsn(_))));
        assert!(matches!(Dsn::parse("smatrix:"), Err(NotifierError::InvalidDsn(_))));
    }

    #[test]
    fn test_debug_redacts_token() {
        let dsn = Dsn::parse("smatrix://matrix.example.com?accessToken=dsn-token").unwrap();
        let debug = format!("{:?}", dsn);
        assert!(debug.contains("matrix.example.com"));
        assert!(!debug.contains("dsn-token"));
    }
}
