//! Messages accepted by the transport and the receipts it hands back.

use crate::options::MessageOptions;

/// A notification handed to a transport.
///
/// Only [`Message::Chat`] can be delivered to Matrix; other kinds exist so a
/// caller routing notifications through several transports can ask
/// [`MatrixTransport::supports`](crate::transport::MatrixTransport::supports)
/// before sending.
#[derive(Debug, Clone)]
pub enum Message {
    Chat(ChatMessage),
    Sms(SmsMessage),
}

impl Message {
    /// Short name of the message kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Chat(_) => "chat",
            Message::Sms(_) => "sms",
        }
    }
}

/// A chat message with optional delivery options.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Text sent as the event body.
    pub subject: String,
    /// Recipient used when the options don't carry one.
    pub recipient: Option<String>,
    pub options: Option<MessageOptions>,
}

impl ChatMessage {
    pub fn new(subject: &str) -> Self {
        ChatMessage {
            subject: subject.to_string(),
            recipient: None,
            options: None,
        }
    }

    pub fn with_recipient(mut self, recipient: &str) -> Self {
        self.recipient = Some(recipient.to_string());
        self
    }

    pub fn with_options(mut self, options: MessageOptions) -> Self {
        self.options = Some(options);
        self
    }
}

impl From<ChatMessage> for Message {
    fn from(chat: ChatMessage) -> Self {
        Message::Chat(chat)
    }
}

/// A text message for phone delivery, never handled by the Matrix transport.
#[derive(Debug, Clone)]
pub struct SmsMessage {
    pub phone: String,
    pub subject: String,
}

/// Receipt of a delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Event identifier returned by the native engine.
    pub message_id: String,
    /// Transport that delivered the message, e.g. `matrix://matrix.example.com`.
    pub transport: String,
}
