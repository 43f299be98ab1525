//! Matrix transport: validates a message, normalizes its options and hands it
//! to the native bridge.
//!
//! A [`MatrixTransport`] is usually built by a [`TransportFactory`] from a
//! connection string. It holds no state between sends besides the credentials
//! fixed at construction, so a failed send leaves it usable for the next one.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use matrix_notifier::bridge::{NativeLibrary, locator::LibraryLocator};
//! use matrix_notifier::credentials::Credentials;
//! use matrix_notifier::message::ChatMessage;
//! use matrix_notifier::options::MatrixOptions;
//! use matrix_notifier::transport::TransportFactory;
//!
//! # fn example(credentials: Credentials) -> Result<(), matrix_notifier::error::NotifierError> {
//! let bridge = Arc::new(NativeLibrary::load(&LibraryLocator::new("lib/out"))?);
//! let factory = TransportFactory::new(credentials, bridge);
//! let transport = factory.create_from_str("smatrix://matrix.example.com")?;
//!
//! let message = ChatMessage::new("Deployment finished")
//!     .with_options(MatrixOptions::new("@ops:example.com").into());
//! let sent = transport.send(&message.into())?;
//! println!("sent {}", sent.message_id);
//! # Ok(())
//! # }
//! ```

mod factory;

use std::{fmt, sync::Arc};

use log::{error, info};
use secrecy::SecretString;

pub use crate::transport::factory::{SUPPORTED_SCHEMES, TransportFactory};
use crate::bridge::NativeBridge;
use crate::credentials::ValidatedCredentials;
use crate::error::{NotifierError, Result};
use crate::message::{Message, SentMessage};
use crate::options::{self, Delivery, MessageOptions};

/// Sends chat messages to one Matrix homeserver.
pub struct MatrixTransport {
    credentials: ValidatedCredentials,
    /// Token carried by the connection string, preferred over the configured one.
    access_token_override: Option<SecretString>,
    host: String,
    port: Option<u16>,
    bridge: Arc<dyn NativeBridge>,
}

impl MatrixTransport {
    pub fn new(credentials: ValidatedCredentials, host: &str, bridge: Arc<dyn NativeBridge>) -> Self {
        MatrixTransport {
            credentials,
            access_token_override: None,
            host: host.to_string(),
            port: None,
            bridge,
        }
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    pub fn with_access_token(mut self, access_token: Option<SecretString>) -> Self {
        self.access_token_override = access_token;
        self
    }

    /// Recipient configured for messages that don't name one.
    pub fn default_recipient(&self) -> Option<&str> {
        self.credentials.default_recipient()
    }

    fn endpoint(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        }
    }

    /// Homeserver URL handed to the native engine.
    pub fn destination_url(&self) -> String {
        format!("https://{}", self.endpoint())
    }

    /// Whether this transport advertises support for `message`.
    ///
    /// Only chat messages without options or with [`MatrixOptions`](crate::options::MatrixOptions)
    /// are reported. Legacy options are still accepted by [`Self::send`] but
    /// are deliberately not advertised.
    pub fn supports(&self, message: &Message) -> bool {
        match message {
            Message::Chat(chat) => matches!(chat.options, None | Some(MessageOptions::Canonical(_))),
            _ => false,
        }
    }

    /// Sends `message` and returns the receipt carrying the native event id.
    ///
    /// # Errors
    ///
    /// - [`NotifierError::UnsupportedMessageKind`] for anything but a chat message
    /// - [`NotifierError::UnsupportedOptionsShape`] for options of another transport
    /// - normalization errors, see [`options::resolve`]
    /// - [`NotifierError::MissingAccessToken`] when no token is available
    /// - any error of the native bridge, unchanged
    pub fn send(&self, message: &Message) -> Result<SentMessage> {
        let Message::Chat(chat) = message else {
            return Err(NotifierError::UnsupportedMessageKind(message.kind()));
        };

        if let Some(MessageOptions::Foreign(name)) = &chat.options {
            return Err(NotifierError::UnsupportedOptionsShape(name.clone()));
        }

        let resolved = options::resolve(chat)?;
        let access_token = self
            .credentials
            .resolve_access_token(self.access_token_override.as_ref())?;

        let delivery = Delivery {
            session_store_path: self.credentials.session_store_path().to_string(),
            access_token,
            recovery_key: self.credentials.recovery_key(),
            pickle_key: self.credentials.pickle_key(),
            device_id: self.credentials.device_id().to_string(),
            destination_url: self.destination_url(),
        };
        let outbound = resolved.into_outbound(&chat.subject, delivery);

        info!(
            "sending {} ({}) to {} through {}",
            outbound.message_kind, outbound.render_kind, outbound.recipient, self
        );

        let message_id = self
            .bridge
            .send(&outbound)
            .inspect_err(|e| error!("failed to send message to {}: {}", outbound.recipient, e))?;

        info!("message sent with id {}", message_id);

        Ok(SentMessage {
            message_id,
            transport: self.to_string(),
        })
    }
}

impl fmt::Display for MatrixTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "matrix://{}", self.endpoint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{MessageKind, MockNativeBridge, RenderKind};
    use crate::credentials::Credentials;
    use crate::message::{ChatMessage, SmsMessage};
    use crate::options::{HTML_FORMAT, LegacyMatrixOptions, MatrixOptions};
    use secrecy::ExposeSecret;

    fn create_credentials() -> ValidatedCredentials {
        Credentials {
            pickle_key: Some(SecretString::from("pickle-key".to_string())),
            device_id: Some("DEVICEID".to_string()),
            access_token: Some(SecretString::from("access-token".to_string())),
            recovery_key: Some(SecretString::from("recovery-key".to_string())),
            default_recipient: Some("@default:example.com".to_string()),
            session_store_path: "sqlite:///var/matrix.db".to_string(),
        }
        .validate()
        .unwrap()
    }

    fn create_transport(bridge: MockNativeBridge) -> MatrixTransport {
        MatrixTransport::new(create_credentials(), "matrix.example.com", Arc::new(bridge))
    }

    fn legacy_message(msgtype: Option<&str>, format: Option<&str>) -> Message {
        ChatMessage::new("Body")
            .with_options(
                LegacyMatrixOptions {
                    recipient_id: Some("@alice:example.com".to_string()),
                    msgtype: msgtype.map(str::to_string),
                    format: format.map(str::to_string),
                }
                .into(),
            )
            .into()
    }

    #[test]
    fn test_send_chat_message_with_matrix_options() {
        let mut bridge = MockNativeBridge::new();
        bridge
            .expect_send()
            .withf(|message| {
                message.message_kind == MessageKind::Notice
                    && message.render_kind == RenderKind::Html
                    && message.body == "Hello Matrix"
                    && message.recipient == "@john:example.com"
                    && message.session_store_path == "sqlite:///var/matrix.db"
                    && message.access_token.expose_secret() == "access-token"
                    && message.recovery_key.expose_secret() == "recovery-key"
                    && message.pickle_key.expose_secret() == "pickle-key"
                    && message.device_id == "DEVICEID"
                    && message.destination_url == "https://matrix.example.com:8448"
            })
            .times(1)
            .returning(|_| Ok("$123".to_string()));

        let transport = create_transport(bridge).with_port(Some(8448));
        let message = ChatMessage::new("Hello Matrix").with_options(
            MatrixOptions::new("@john:example.com")
                .with_message_kind(MessageKind::Notice)
                .with_render_kind(RenderKind::Html)
                .into(),
        );

        let sent = transport.send(&message.into()).unwrap();

        assert_eq!(sent.message_id, "$123");
        assert_eq!(sent.transport, "matrix://matrix.example.com:8448");
    }

    #[test]
    fn test_send_with_default_option_values() {
        let mut bridge = MockNativeBridge::new();
        bridge
            .expect_send()
            .withf(|message| {
                message.message_kind == MessageKind::TextMessage
                    && message.render_kind == RenderKind::PlainText
                    && message.recipient == "@john:example.com"
                    && message.destination_url == "https://matrix.example.com"
            })
            .times(1)
            .returning(|_| Ok("event-id".to_string()));

        let transport = create_transport(bridge);
        let message = ChatMessage::new("Hello Matrix").with_options(MatrixOptions::new("@john:example.com").into());

        assert_eq!(transport.send(&message.into()).unwrap().message_id, "event-id");
    }

    #[test]
    fn test_send_converts_legacy_options() {
        let mut bridge = MockNativeBridge::new();
        bridge
            .expect_send()
            .withf(|message| {
                message.message_kind == MessageKind::TextMessage
                    && message.render_kind == RenderKind::Html
                    && message.recipient == "@alice:example.com"
            })
            .times(1)
            .returning(|_| Ok("event-id".to_string()));

        let transport = create_transport(bridge);
        let sent = transport
            .send(&legacy_message(Some("m.text"), Some(HTML_FORMAT)))
            .unwrap();

        assert_eq!(sent.message_id, "event-id");
    }

    #[test]
    fn test_send_converts_legacy_options_with_defaults() {
        let mut bridge = MockNativeBridge::new();
        bridge
            .expect_send()
            .withf(|message| {
                message.message_kind == MessageKind::TextMessage
                    && message.render_kind == RenderKind::PlainText
            })
            .times(1)
            .returning(|_| Ok("event-id".to_string()));

        let transport = create_transport(bridge);
        assert!(transport.send(&legacy_message(None, None)).is_ok());
    }

    #[test]
    fn test_send_rejects_unsupported_legacy_msgtype() {
        let mut bridge = MockNativeBridge::new();
        bridge.expect_send().times(0);

        let transport = create_transport(bridge);
        let err = transport
            .send(&legacy_message(Some("invalid-type"), None))
            .unwrap_err();

        assert_eq!(err.to_string(), "unsupported message type: invalid-type");
    }

    #[test]
    fn test_send_rejects_missing_recipient() {
        let mut bridge = MockNativeBridge::new();
        bridge.expect_send().times(0);

        let transport = create_transport(bridge);
        let message = ChatMessage::new("Body").with_options(MatrixOptions::new("").into());

        assert!(matches!(
            transport.send(&message.into()),
            Err(NotifierError::MissingRecipient)
        ));
    }

    #[test]
    fn test_send_rejects_non_chat_message() {
        let mut bridge = MockNativeBridge::new();
        bridge.expect_send().times(0);

        let transport = create_transport(bridge);
        let message = Message::Sms(SmsMessage {
            phone: "123".to_string(),
            subject: "Body".to_string(),
        });

        assert!(matches!(
            transport.send(&message),
            Err(NotifierError::UnsupportedMessageKind("sms"))
        ));
    }

    #[test]
    fn test_send_rejects_foreign_options() {
        let mut bridge = MockNativeBridge::new();
        bridge.expect_send().times(0);

        let transport = create_transport(bridge);
        let message = ChatMessage::new("Body")
            .with_recipient("@john:example.com")
            .with_options(MessageOptions::Foreign("slack".to_string()));

        assert!(matches!(
            transport.send(&message.into()),
            Err(NotifierError::UnsupportedOptionsShape(_))
        ));
    }

    #[test]
    fn test_send_propagates_native_failure_unchanged() {
        let mut bridge = MockNativeBridge::new();
        bridge.expect_send().times(1).returning(|_| {
            Err(NotifierError::NativeSendFailure {
                message: "M_FORBIDDEN: You are not invited to this room.".to_string(),
            })
        });

        let transport = create_transport(bridge);
        let message = ChatMessage::new("Body").with_recipient("!room:example.com");

        match transport.send(&message.into()) {
            Err(NotifierError::NativeSendFailure { message }) => {
                assert_eq!(message, "M_FORBIDDEN: You are not invited to this room.");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_transport_usable_after_failure() {
        let mut bridge = MockNativeBridge::new();
        bridge.expect_send().times(1).returning(|_| Ok("$ok".to_string()));

        let transport = create_transport(bridge);

        let invalid = ChatMessage::new("Body");
        assert!(transport.send(&invalid.into()).is_err());

        let valid = ChatMessage::new("Body").with_recipient("@john:example.com");
        assert_eq!(transport.send(&valid.into()).unwrap().message_id, "$ok");
    }

    #[test]
    fn test_send_prefers_override_token() {
        let mut bridge = MockNativeBridge::new();
        bridge
            .expect_send()
            .withf(|message| message.access_token.expose_secret() == "dsn-token")
            .times(1)
            .returning(|_| Ok("$1".to_string()));

        let transport =
            create_transport(bridge).with_access_token(Some(SecretString::from("dsn-token".to_string())));
        let message = ChatMessage::new("Body").with_recipient("@john:example.com");

        assert!(transport.send(&message.into()).is_ok());
    }

    #[test]
    fn test_send_fails_without_any_token() {
        let mut bridge = MockNativeBridge::new();
        bridge.expect_send().times(0);

        let credentials = Credentials {
            pickle_key: Some(SecretString::from("pickle-key".to_string())),
            device_id: Some("DEVICEID".to_string()),
            recovery_key: Some(SecretString::from("recovery-key".to_string())),
            ..Default::default()
        }
        .validate()
        .unwrap();
        let transport = MatrixTransport::new(credentials, "matrix.example.com", Arc::new(bridge));
        let message = ChatMessage::new("Body").with_recipient("@john:example.com");

        assert!(matches!(
            transport.send(&message.into()),
            Err(NotifierError::MissingAccessToken)
        ));
    }

    #[test]
    fn test_supports_only_matrix_chat_messages() {
        let transport = create_transport(MockNativeBridge::new());

        let canonical = ChatMessage::new("body").with_options(MatrixOptions::new("@user:example.com").into());
        assert!(transport.supports(&canonical.into()));

        assert!(transport.supports(&ChatMessage::new("body").into()));

        let legacy = ChatMessage::new("body").with_options(LegacyMatrixOptions::default().into());
        assert!(!transport.supports(&legacy.into()));

        let foreign = ChatMessage::new("body").with_options(MessageOptions::Foreign("slack".to_string()));
        assert!(!transport.supports(&foreign.into()));

        let sms = Message::Sms(SmsMessage {
            phone: "123".to_string(),
            subject: "body".to_string(),
        });
        assert!(!transport.supports(&sms));
    }

    #[test]
    fn test_display_and_destination_url() {
        let transport = create_transport(MockNativeBridge::new());
        assert_eq!(transport.to_string(), "matrix://matrix.example.com");
        assert_eq!(transport.destination_url(), "https://matrix.example.com");

        let transport = transport.with_port(Some(8448));
        assert_eq!(transport.to_string(), "matrix://matrix.example.com:8448");
        assert_eq!(transport.destination_url(), "https://matrix.example.com:8448");
    }

    #[test]
    fn test_default_recipient() {
        let transport = create_transport(MockNativeBridge::new());
        assert_eq!(transport.default_recipient(), Some("@default:example.com"));
    }
}
