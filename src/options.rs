//! Delivery options and their normalization.
//!
//! Two option shapes are accepted:
//!
//! - [`MatrixOptions`], the native shape with typed message and render kinds
//! - [`LegacyMatrixOptions`], the free-form shape used by older integrations
//!   (`recipient_id`, `msgtype`, `format`), kept for backward compatibility
//!
//! [`resolve`] turns either shape into [`ResolvedOptions`], which then becomes
//! the canonical [`OutboundMessage`] once credentials are known.

use log::debug;
use secrecy::SecretString;
use serde::Deserialize;

use crate::bridge::{MessageKind, OutboundMessage, RenderKind};
use crate::error::{NotifierError, Result};
use crate::message::ChatMessage;

/// `format` value that selects HTML rendering in the legacy shape.
pub const HTML_FORMAT: &str = "org.matrix.custom.html";

/// Native option shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatrixOptions {
    pub recipient_id: Option<String>,
    pub message_kind: MessageKind,
    pub render_kind: RenderKind,
}

impl MatrixOptions {
    pub fn new(recipient_id: &str) -> Self {
        MatrixOptions {
            recipient_id: Some(recipient_id.to_string()),
            ..Default::default()
        }
    }

    pub fn with_message_kind(mut self, message_kind: MessageKind) -> Self {
        self.message_kind = message_kind;
        self
    }

    pub fn with_render_kind(mut self, render_kind: RenderKind) -> Self {
        self.render_kind = render_kind;
        self
    }
}

/// Legacy option shape, as older integrations serialize it.
///
/// ```json
/// { "recipient_id": "@alice:example.com", "msgtype": "m.text", "format": "org.matrix.custom.html" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LegacyMatrixOptions {
    pub recipient_id: Option<String>,
    pub msgtype: Option<String>,
    pub format: Option<String>,
}

/// Options attached to a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOptions {
    Canonical(MatrixOptions),
    Legacy(LegacyMatrixOptions),
    /// Options meant for another transport, named after it.
    Foreign(String),
}

impl From<MatrixOptions> for MessageOptions {
    fn from(options: MatrixOptions) -> Self {
        MessageOptions::Canonical(options)
    }
}

impl From<LegacyMatrixOptions> for MessageOptions {
    fn from(options: LegacyMatrixOptions) -> Self {
        MessageOptions::Legacy(options)
    }
}

/// Message attributes once the option shape has been unified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub recipient: String,
    pub message_kind: MessageKind,
    pub render_kind: RenderKind,
}

/// Credentials and location the message is delivered with.
pub struct Delivery {
    pub session_store_path: String,
    pub access_token: SecretString,
    pub recovery_key: SecretString,
    pub pickle_key: SecretString,
    pub device_id: String,
    pub destination_url: String,
}

impl ResolvedOptions {
    /// Builds the canonical message sent through the native bridge.
    pub fn into_outbound(self, body: &str, delivery: Delivery) -> OutboundMessage {
        OutboundMessage {
            message_kind: self.message_kind,
            render_kind: self.render_kind,
            body: body.to_string(),
            recipient: self.recipient,
            session_store_path: delivery.session_store_path,
            access_token: delivery.access_token,
            recovery_key: delivery.recovery_key,
            pickle_key: delivery.pickle_key,
            device_id: delivery.device_id,
            destination_url: delivery.destination_url,
        }
    }
}

/// Maps a legacy `format` onto a render kind. Anything but HTML is plain text.
pub fn render_kind_from_format(format: Option<&str>) -> RenderKind {
    match format {
        Some(HTML_FORMAT) => RenderKind::Html,
        _ => RenderKind::PlainText,
    }
}

fn convert_legacy(options: &LegacyMatrixOptions) -> Result<MatrixOptions> {
    let message_kind = match options.msgtype.as_deref() {
        None => MessageKind::default(),
        Some(token) => MessageKind::from_token(token).ok_or_else(|| {
            NotifierError::UnsupportedMessageType {
                token: token.to_string(),
            }
        })?,
    };

    Ok(MatrixOptions {
        recipient_id: options.recipient_id.clone(),
        message_kind,
        render_kind: render_kind_from_format(options.format.as_deref()),
    })
}

/// Unifies the options of `chat` into [`ResolvedOptions`].
///
/// The recipient comes from the options when they carry a non-empty one,
/// otherwise from the message itself.
///
/// # Errors
///
/// - [`NotifierError::UnsupportedOptionsShape`] for options of another transport
/// - [`NotifierError::UnsupportedMessageType`] for an unknown legacy `msgtype`
/// - [`NotifierError::MissingRecipient`] when no recipient is left
pub fn resolve(chat: &ChatMessage) -> Result<ResolvedOptions> {
    let options = match &chat.options {
        None => MatrixOptions::default(),
        Some(MessageOptions::Canonical(options)) => options.clone(),
        Some(MessageOptions::Legacy(options)) => {
            debug!("converting legacy matrix options");
            convert_legacy(options)?
        }
        Some(MessageOptions::Foreign(name)) => {
            return Err(NotifierError::UnsupportedOptionsShape(name.clone()));
        }
    };

    let recipient = options
        .recipient_id
        .filter(|recipient| !recipient.is_empty())
        .or_else(|| chat.recipient.clone())
        .filter(|recipient| !recipient.is_empty())
        .ok_or(NotifierError::MissingRecipient)?;

    Ok(ResolvedOptions {
        recipient,
        message_kind: options.message_kind,
        render_kind: options.render_kind,
    })
}
