//! Matrix notifications through a native messaging engine.
//!
//! The Matrix protocol and its end-to-end encryption live in a separately
//! compiled native library. This crate is the dispatch layer in front of it:
//! it picks the library built for the running platform, unifies the option
//! shapes a message can carry, resolves which credentials to use and marshals
//! each send or login across the foreign-call boundary.
//!
//! # Architecture
//!
//! - [`bridge`] - Native library location, loading and the [`bridge::NativeBridge`] calling contract
//! - [`options`] - Delivery options and their normalization into one canonical message
//! - [`credentials`] - Long-lived key validation and access-token precedence
//! - [`dsn`] - Connection string parsing
//! - [`transport`] - The Matrix transport and the factory building it from a DSN
//! - [`login`] - Interactive login producing the credentials to configure
//! - [`config`] - YAML configuration with environment variable overrides
//! - [`error`] - Error taxonomy shared by all of the above
//!
//! # Runtime Behavior
//!
//! Every call is synchronous: a send or a login blocks until the native
//! engine answers. Nothing is retried; a failed send leaves the transport
//! usable for the next one.

pub mod bridge;
pub mod config;
pub mod credentials;
pub mod dsn;
pub mod error;
pub mod login;
pub mod message;
pub mod options;
pub mod transport;
