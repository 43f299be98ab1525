//! One-shot credential bootstrap.
//!
//! Logs into the homeserver through the native bridge, generates a fresh
//! pickle key and shows the resulting credentials so they can be copied into
//! the configuration. Nothing is stored by the flow itself.
//!
//! Invalid input (insecure server URL, blank username or password) is reported
//! on the [`Console`] and ends the flow with [`LoginOutcome::Rejected`]; only
//! I/O and native login failures are returned as errors.

use std::{
    io::{self, BufRead, Write},
    sync::Arc,
};

use log::{debug, info};
use mockall::automock;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::bridge::NativeBridge;

/// Number of random bytes in a generated pickle key.
pub const PICKLE_KEY_BYTES: usize = 32;

/// Interactive input and output of the flow.
#[automock]
pub trait Console {
    /// Asks a question and returns the answer.
    fn ask(&mut self, question: &str) -> io::Result<String>;
    /// Asks a question without echoing the answer.
    fn ask_hidden(&mut self, question: &str) -> io::Result<SecretString>;
    fn error(&mut self, message: &str);
    fn success(&mut self, message: &str);
}

/// [`Console`] on the process terminal.
pub struct TerminalConsole;

impl Console for TerminalConsole {
    fn ask(&mut self, question: &str) -> io::Result<String> {
        print!("{}: ", question);
        io::stdout().flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(answer.trim().to_string())
    }

    fn ask_hidden(&mut self, question: &str) -> io::Result<SecretString> {
        let answer = rpassword::prompt_password(format!("{}: ", question))?;
        Ok(SecretString::from(answer))
    }

    fn error(&mut self, message: &str) {
        eprintln!("[ERROR] {}", message);
    }

    fn success(&mut self, message: &str) {
        println!("[OK] {}", message);
    }
}

/// Input the flow was given up front. Missing values are asked for.
#[derive(Debug, Default)]
pub struct LoginInput {
    pub server_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<SecretString>,
}

/// User-facing reasons to stop before logging in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoginRejection {
    #[error("Only https URLs are supported.")]
    InsecureSchemeRejected,
    #[error("The server URL cannot be empty.")]
    EmptyServerUrl,
    #[error("The username cannot be empty.")]
    EmptyUsername,
    #[error("The password cannot be empty.")]
    EmptyPassword,
}

/// Credentials to copy into the configuration.
#[derive(Debug)]
pub struct InitializedKeys {
    pub access_token: SecretString,
    pub device_id: String,
    pub pickle_key: SecretString,
}

#[derive(Debug)]
pub enum LoginOutcome {
    Initialized(InitializedKeys),
    Rejected(LoginRejection),
}

/// Adds `https://` to a scheme-less URL and rejects any other scheme or a
/// URL without a host.
pub fn normalize_server_url(server_url: &str) -> Result<String, LoginRejection> {
    let server_url = server_url.trim();
    if server_url.is_empty() {
        return Err(LoginRejection::EmptyServerUrl);
    }

    match server_url.split_once("://") {
        None => Ok(format!("https://{}", server_url)),
        Some(("https", rest)) if rest.is_empty() || rest.starts_with('/') => {
            Err(LoginRejection::EmptyServerUrl)
        }
        Some(("https", _)) => Ok(server_url.to_string()),
        Some(_) => Err(LoginRejection::InsecureSchemeRejected),
    }
}

/// Hex-encoded random key used by the engine to encrypt its local state.
pub fn generate_pickle_key() -> SecretString {
    let bytes: [u8; PICKLE_KEY_BYTES] = rand::random();
    SecretString::from(hex::encode(bytes))
}

/// Runs the login handshake against the native bridge.
pub struct LoginFlow {
    bridge: Arc<dyn NativeBridge>,
    /// Server from the configuration, used when none is given explicitly.
    configured_server: Option<String>,
}

impl LoginFlow {
    pub fn new(bridge: Arc<dyn NativeBridge>, configured_server: Option<String>) -> Self {
        LoginFlow {
            bridge,
            configured_server,
        }
    }

    fn reject(console: &mut dyn Console, rejection: LoginRejection) -> LoginOutcome {
        debug!("login rejected: {:?}", rejection);
        console.error(&rejection.to_string());
        LoginOutcome::Rejected(rejection)
    }

    /// Runs the flow, asking `console` for whatever `input` lacks.
    ///
    /// # Errors
    ///
    /// Returns an error when the console fails or the native login fails.
    pub fn run(&self, console: &mut dyn Console, input: LoginInput) -> anyhow::Result<LoginOutcome> {
        let server_url = match input.server_url.or_else(|| self.configured_server.clone()) {
            Some(server_url) => server_url,
            None => console.ask("Server URL")?,
        };
        let server_url = match normalize_server_url(&server_url) {
            Ok(server_url) => server_url,
            Err(rejection) => return Ok(Self::reject(console, rejection)),
        };

        let username = match input.username {
            Some(username) => username,
            None => console.ask("Username")?,
        };
        if username.trim().is_empty() {
            return Ok(Self::reject(console, LoginRejection::EmptyUsername));
        }

        let password = match input.password {
            Some(password) => password,
            None => console.ask_hidden("Password")?,
        };
        if password.expose_secret().is_empty() {
            return Ok(Self::reject(console, LoginRejection::EmptyPassword));
        }

        info!("logging in as {} on {}", username, server_url);
        let login = self.bridge.login(&server_url, &username, &password)?;
        let pickle_key = generate_pickle_key();

        console.success(&format!(
            "Access token: {}\nDevice ID: {}\nPickle key: {}",
            login.access_token.expose_secret(),
            login.device_id,
            pickle_key.expose_secret()
        ));

        Ok(LoginOutcome::Initialized(InitializedKeys {
            access_token: login.access_token,
            device_id: login.device_id,
            pickle_key,
        }))
    }
}
