//! Canonical message handed to the native engine.

use std::fmt;

use secrecy::SecretString;

/// Matrix `msgtype` of the sent event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageKind {
    #[default]
    TextMessage,
    Notice,
}

impl MessageKind {
    /// Token understood by the native engine.
    pub fn as_token(&self) -> &'static str {
        match self {
            MessageKind::TextMessage => "m.text",
            MessageKind::Notice => "m.notice",
        }
    }

    /// Parses a `msgtype` token, returning `None` for anything unknown.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "m.text" => Some(MessageKind::TextMessage),
            "m.notice" => Some(MessageKind::Notice),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// How the engine renders the body before sending it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderKind {
    #[default]
    PlainText,
    Html,
    Markdown,
}

impl RenderKind {
    /// Token understood by the native engine.
    pub fn as_token(&self) -> &'static str {
        match self {
            RenderKind::PlainText => "text",
            RenderKind::Html => "html",
            RenderKind::Markdown => "markdown",
        }
    }
}

impl fmt::Display for RenderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Fully resolved message, built once per send attempt and consumed by a
/// [`NativeBridge`](crate::bridge::NativeBridge).
///
/// Secret fields are [`SecretString`]s so the derived `Debug` never prints them.
#[derive(Debug)]
pub struct OutboundMessage {
    pub message_kind: MessageKind,
    pub render_kind: RenderKind,
    pub body: String,
    pub recipient: String,
    /// Locator of the engine's local session database, passed through untouched.
    pub session_store_path: String,
    pub access_token: SecretString,
    pub recovery_key: SecretString,
    pub pickle_key: SecretString,
    pub device_id: String,
    /// Homeserver base URL, e.g. `https://matrix.example.com:8448`.
    pub destination_url: String,
}
