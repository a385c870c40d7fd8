use crate::model::{ChannelError, ChannelNumber};
use bytes::Bytes;
use rabbitwire_codec::frame::{BasicProperties, BasicReturnArgs};

/// Body and properties of a message.
///
/// The body is owned by the message, dropping it releases the buffer. Moving a message moves the
/// ownership, the body is never copied.
#[derive(Debug, Default, PartialEq)]
pub struct Message {
    pub body: Bytes,
    pub properties: BasicProperties,
}

impl Message {
    pub fn new(body: impl Into<Bytes>, properties: BasicProperties) -> Self {
        Message {
            body: body.into(),
            properties,
        }
    }

    /// The body as text if it is valid UTF-8.
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// A message delivered to a consumer.
#[derive(Debug, Default, PartialEq)]
pub struct Envelope {
    /// The channel the delivery arrived on, zero only for a placeholder delivery which means
    /// timeout.
    pub channel: ChannelNumber,
    pub consumer_tag: String,
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub exchange: String,
    pub routing_key: String,
    pub message: Message,
}

/// A mandatory or immediate message the broker sent back.
#[derive(Debug, PartialEq)]
pub struct ReturnedMessage {
    pub channel: ChannelNumber,
    pub method: BasicReturnArgs,
    pub message: Message,
}

impl ReturnedMessage {
    pub fn reply_code(&self) -> u16 {
        self.method.reply_code
    }

    pub fn reply_text(&self) -> &str {
        &self.method.reply_text
    }

    /// Why the broker sent it back, `NoRoute` or `NoConsumers` normally.
    pub fn reason(&self) -> Option<ChannelError> {
        ChannelError::from_code(self.method.reply_code)
    }
}
