//! The socket level collaborator of the RPC and consume engines.
//!
//! A transport owns the socket and speaks frames. It has no idea about error classification,
//! every call records its outcome as the last RPC reply which the engines fetch and classify
//! in a second step.
mod tcp;

pub use tcp::TcpTransport;

use crate::message::{Envelope, Message};
use crate::model::ChannelNumber;
use crate::options::Credentials;
use bytes::Bytes;
use rabbitwire_codec::frame::{AMQPFrame, BasicProperties, BasicPublishArgs, FieldTable, MethodFrameArgs};
use std::fmt;
use std::time::Duration;

/// Outcome codes of the transport primitives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Ok,
    NoMemory,
    BadAmqpData,
    UnknownClass,
    UnknownMethod,
    HostnameResolutionFailed,
    IncompatibleAmqpVersion,
    ConnectionClosed,
    BadUrl,
    SocketError,
    InvalidParameter,
    TableTooBig,
    WrongMethod,
    Timeout,
    TimerFailure,
    HeartbeatTimeout,
    UnexpectedState,
    SocketClosed,
    SocketInUse,
    BrokerUnsupportedSaslMethod,
    Unsupported,
}

impl Status {
    /// Numeric code, zero for success and negative for failures.
    pub fn code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::NoMemory => -1,
            Status::BadAmqpData => -2,
            Status::UnknownClass => -3,
            Status::UnknownMethod => -4,
            Status::HostnameResolutionFailed => -5,
            Status::IncompatibleAmqpVersion => -6,
            Status::ConnectionClosed => -7,
            Status::BadUrl => -8,
            Status::SocketError => -9,
            Status::InvalidParameter => -10,
            Status::TableTooBig => -11,
            Status::WrongMethod => -12,
            Status::Timeout => -13,
            Status::TimerFailure => -14,
            Status::HeartbeatTimeout => -15,
            Status::UnexpectedState => -16,
            Status::SocketClosed => -17,
            Status::SocketInUse => -18,
            Status::BrokerUnsupportedSaslMethod => -19,
            Status::Unsupported => -20,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Status::Ok => "operation completed successfully",
            Status::NoMemory => "could not allocate memory",
            Status::BadAmqpData => "invalid AMQP data",
            Status::UnknownClass => "unknown AMQP class id",
            Status::UnknownMethod => "unknown AMQP method id",
            Status::HostnameResolutionFailed => "hostname lookup failed",
            Status::IncompatibleAmqpVersion => "incompatible AMQP version",
            Status::ConnectionClosed => "connection closed unexpectedly",
            Status::BadUrl => "could not parse AMQP URL",
            Status::SocketError => "a socket error occurred",
            Status::InvalidParameter => "invalid parameter",
            Status::TableTooBig => "table too large for buffer",
            Status::WrongMethod => "unexpected method received",
            Status::Timeout => "request timed out",
            Status::TimerFailure => "system timer has failed",
            Status::HeartbeatTimeout => "heartbeat timeout, connection closed",
            Status::UnexpectedState => "unexpected protocol state",
            Status::SocketClosed => "socket is closed",
            Status::SocketInUse => "socket already open",
            Status::BrokerUnsupportedSaslMethod => "broker does not support the requested SASL mechanism",
            Status::Unsupported => "parameter is unsupported in this version",
        }
    }

    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}

/// The outcome of the most recent synchronous call.
#[derive(Clone, Debug, PartialEq)]
pub enum RpcReply {
    /// Nothing has been called yet.
    None,
    Normal,
    LibraryException(Status),
    /// The server answered with a method other than the expected reply, normally a channel or
    /// a connection close.
    ServerException(MethodFrameArgs),
}

/// Connection limits agreed on during the handshake.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tune {
    pub channel_max: u16,
    pub frame_max: u32,
    /// Heartbeat interval in seconds, zero disables heartbeats.
    pub heartbeat: u16,
}

/// Parameters of the login, the limits are the client side proposals.
#[derive(Debug)]
pub struct LoginParams<'a> {
    pub virtual_host: &'a str,
    pub channel_max: u16,
    pub frame_max: u32,
    pub heartbeat: u16,
    pub credentials: &'a Credentials,
    pub properties: Option<&'a FieldTable>,
}

/// Socket level operations the engines are built on.
///
/// Synchronous calls (`login`, `call`, `send`, `publish`, `read_message`) record their outcome
/// in [`Transport::last_rpc_reply`].
pub trait Transport: Send {
    fn set_handshake_timeout(&mut self, timeout: Duration) -> Status;

    /// Protocol header, authentication, tuning and opening the virtual host.
    fn login(&mut self, params: &LoginParams<'_>) -> RpcReply;

    /// Sends a synchronous method and waits for its reply on the same channel. Frames for other
    /// channels arriving in the meantime are queued.
    fn call(&mut self, channel: ChannelNumber, method: MethodFrameArgs) -> Option<MethodFrameArgs>;

    /// Sends a method which has no reply.
    fn send(&mut self, channel: ChannelNumber, method: MethodFrameArgs) -> Status;

    /// Sends the publish method, the content header and the body frames.
    fn publish(
        &mut self,
        channel: ChannelNumber,
        args: BasicPublishArgs,
        properties: &BasicProperties,
        body: Bytes,
    ) -> Status;

    fn last_rpc_reply(&self) -> RpcReply;

    /// Waits for a basic.deliver and reads its content. A frame which is not a delivery is put
    /// back and `UnexpectedState` is reported, it can be fetched by `wait_frame`.
    fn consume_message(&mut self, timeout: Option<Duration>) -> std::result::Result<Envelope, RpcReply>;

    /// Waits for the next frame on any channel.
    fn wait_frame(&mut self, timeout: Option<Duration>) -> std::result::Result<AMQPFrame, Status>;

    /// Reads the content header and body frames following a method on `channel`.
    fn read_message(&mut self, channel: ChannelNumber) -> std::result::Result<Message, RpcReply>;

    /// Gives back buffer memory if nothing is queued for the channel (or for any channel).
    fn release_buffers(&mut self, channel: Option<ChannelNumber>);

    fn rpc_timeout(&self) -> Option<Duration>;

    fn set_rpc_timeout(&mut self, timeout: Option<Duration>) -> Status;

    /// The negotiated limits, valid after a successful login.
    fn tune(&self) -> Tune;

    /// Closes the socket without any protocol exchange.
    fn close(&mut self);
}
