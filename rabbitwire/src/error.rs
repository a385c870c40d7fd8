use crate::model::{ChannelError, ChannelNumber, ConnectionError};
use crate::transport::Status;
use thiserror::Error;

/// Every failure of the client. The `context` prefix names the connection, the channel and the
/// call which failed, like `Connection(1): Channel(2): Queue(jobs): `.
#[derive(Debug, Error)]
pub enum Error {
    /// Opening the socket or waiting on it failed, the connection is unusable.
    #[error("{context}Socket error: {status}")]
    Socket { context: String, status: Status },

    /// A setup step outside of the RPC flow failed, like setting the handshake timeout.
    #[error("{context}{operation}: {status}")]
    Operation {
        context: String,
        operation: String,
        status: Status,
    },

    /// The transport reported a failure of its own during an RPC.
    #[error("{context}Library exception: {status}")]
    Library { context: String, status: Status },

    /// Unexpected reply shape or method.
    #[error("{context}{reason}")]
    Rpc { context: String, reason: String },

    /// Waiting for an asynchronous frame failed with a status other than timeout.
    #[error("{context}Frame wait failed: {status}")]
    FrameStatus { context: String, status: Status },

    /// An asynchronous frame arrived which the consume loop cannot handle.
    #[error("{context}{reason}")]
    Frame { context: String, reason: String },

    /// The broker closed a channel. The connection stays usable, the channel doesn't.
    #[error("{context}Channel close received. Code: {reply_code} Message: {reply_text}")]
    ChannelClose {
        context: String,
        channel: ChannelNumber,
        reply_code: u16,
        reply_text: String,
    },

    /// The broker closed the connection.
    #[error("{context}Connection close received. Code: {reply_code} Message: {reply_text}")]
    ConnectionClose {
        context: String,
        reply_code: u16,
        reply_text: String,
    },

    /// Writing the published message to the socket failed, the publish may be retried.
    #[error(
        "{context}Failed to publish message to exchange: {exchange} with routing key: {routing_key} \
         mandatory: {mandatory} immediate: {immediate} body: {body} ({status})"
    )]
    Publish {
        context: String,
        exchange: String,
        routing_key: String,
        mandatory: bool,
        immediate: bool,
        body: String,
        status: Status,
    },

    #[error("Invalid connection options: {0}")]
    Options(String),
}

impl Error {
    /// True when the connection cannot be used anymore and needs to be reopened.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Socket { .. } | Error::Operation { .. } | Error::Library { .. } | Error::ConnectionClose { .. }
        )
    }

    /// The closed channel of a channel close error.
    pub fn channel(&self) -> Option<ChannelNumber> {
        match self {
            Error::ChannelClose { channel, .. } => Some(*channel),
            _ => None,
        }
    }

    /// The AMQP reply code of a channel or connection close.
    pub fn reply_code(&self) -> Option<u16> {
        match self {
            Error::ChannelClose { reply_code, .. } | Error::ConnectionClose { reply_code, .. } => Some(*reply_code),
            _ => None,
        }
    }

    /// The reply code of a channel close as a known channel error.
    pub fn channel_error(&self) -> Option<ChannelError> {
        match self {
            Error::ChannelClose { reply_code, .. } => ChannelError::from_code(*reply_code),
            _ => None,
        }
    }

    /// The reply code of a connection close as a known connection error.
    pub fn connection_error(&self) -> Option<ConnectionError> {
        match self {
            Error::ConnectionClose { reply_code, .. } => ConnectionError::from_code(*reply_code),
            _ => None,
        }
    }

    /// The library status code carried by the error, if any.
    pub fn status(&self) -> Option<Status> {
        match self {
            Error::Socket { status, .. }
            | Error::Operation { status, .. }
            | Error::Library { status, .. }
            | Error::FrameStatus { status, .. }
            | Error::Publish { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
