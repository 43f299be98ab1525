//! Foreign-call boundary to the native messaging engine.
//!
//! The engine is a separately compiled shared library that implements the
//! Matrix protocol and its cryptography. This module only knows its calling
//! contract:
//!
//! - [`locator`] computes which artifact to load for the running platform
//! - `native` loads it and marshals calls through the C ABI
//! - [`NativeBridge`] is the seam the rest of the crate depends on, so tests
//!   can substitute [`MockNativeBridge`] when no library is present
//!
//! # Examples
//!
//! ```no_run
//! use matrix_notifier::bridge::{NativeBridge, NativeLibrary, locator::LibraryLocator};
//! use secrecy::SecretString;
//!
//! # fn example() -> Result<(), matrix_notifier::error::NotifierError> {
//! let library = NativeLibrary::load(&LibraryLocator::new("lib/out"))?;
//! let password = SecretString::from("hunter2".to_string());
//! let login = library.login("https://matrix.example.com", "bot", &password)?;
//! println!("device {}", login.device_id);
//! # Ok(())
//! # }
//! ```

pub mod locator;
mod message;
mod native;

use mockall::automock;
use secrecy::SecretString;

pub use crate::bridge::message::{MessageKind, OutboundMessage, RenderKind};
pub use crate::bridge::native::NativeLibrary;
use crate::error::Result;

/// Credentials returned by a successful native login.
#[derive(Debug)]
pub struct LoginResult {
    pub access_token: SecretString,
    pub device_id: String,
}

/// Calling contract of the native messaging engine.
///
/// Both operations block until the engine answers. Implementations must be
/// shareable across threads; any locking around the engine's session store is
/// the engine's own business.
#[automock]
pub trait NativeBridge: Send + Sync {
    /// Sends one message and returns the engine's event identifier.
    fn send(&self, message: &OutboundMessage) -> Result<String>;

    /// Logs in with a password and returns long-lived credentials.
    fn login(&self, homeserver: &str, username: &str, password: &SecretString)
    -> Result<LoginResult>;
}
