//! Error types shared by every layer of the notifier.
//!
//! Construction-time failures ([`NotifierError::MissingNativeArtifact`],
//! [`NotifierError::MissingCredential`], ...) abort the creation of a transport.
//! Dispatch-time failures only abort the one send that raised them.

use std::fmt;

use thiserror::Error;

/// Long-lived credential that must be configured before a transport is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    PickleKey,
    DeviceId,
    RecoveryKey,
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::PickleKey => write!(f, "pickle key"),
            Credential::DeviceId => write!(f, "device ID"),
            Credential::RecoveryKey => write!(f, "recovery key"),
        }
    }
}

/// Every failure the notifier can report to its caller.
#[derive(Debug, Error)]
pub enum NotifierError {
    // -- Native artifact --
    #[error(
        "cannot find the native library for your OS ({os_family}) and architecture ({architecture}), build it yourself and point lib.library_path/lib.headers_path at it"
    )]
    MissingNativeArtifact {
        os_family: String,
        architecture: String,
    },

    #[error("failed to load native library {path}: {source}")]
    NativeLoad {
        path: String,
        #[source]
        source: libloading::Error,
    },

    #[error("{field} contains a NUL byte and cannot be passed to the native library")]
    InvalidNativeArgument { field: &'static str },

    // -- Credentials --
    #[error("the {which} is not initialized, please configure it (the init command can generate it)")]
    MissingCredential { which: Credential },

    #[error("the access token must be provided either as part of the DSN or as a configuration parameter")]
    MissingAccessToken,

    #[error("failed to prepare session store directory {path}: {source}")]
    SessionStore {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // -- Requests --
    #[error("unsupported message kind {0}, only chat messages can be sent")]
    UnsupportedMessageKind(&'static str),

    #[error("unsupported options {0}, expected matrix options")]
    UnsupportedOptionsShape(String),

    #[error("unsupported message type: {token}")]
    UnsupportedMessageType { token: String },

    #[error("recipient id is required")]
    MissingRecipient,

    // -- Connection string --
    #[error("invalid DSN: {0}")]
    InvalidDsn(String),

    #[error("unsupported scheme {scheme}, supported schemes are: {supported}")]
    UnsupportedScheme { scheme: String, supported: String },

    // -- Native engine --
    #[error("{message}")]
    NativeSendFailure { message: String },

    #[error("{message}")]
    NativeLoginFailure { message: String },

    #[error("the native library returned neither a {field} nor an error")]
    EmptyNativeResponse { field: &'static str },

    #[error("the native library returned a {field} that is not valid UTF-8")]
    InvalidNativeOutput { field: &'static str },
}

/// Alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NotifierError>;
