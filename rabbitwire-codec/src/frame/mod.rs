mod basic;
mod channel;
mod connection;
mod exchange;
mod field;
mod queue;

use bitflags::Flags;
use bytes::Bytes;

pub use self::{
    basic::{
        BasicAckArgs, BasicCancelArgs, BasicCancelOkArgs, BasicConsumeArgs, BasicConsumeFlags, BasicConsumeOkArgs,
        BasicDeliverArgs, BasicGetArgs, BasicGetOkArgs, BasicNackArgs, BasicNackFlags, BasicPublishArgs,
        BasicPublishFlags, BasicQosArgs, BasicRecoverArgs, BasicRejectArgs, BasicReturnArgs, ConfirmSelectArgs,
    },
    channel::{channel_close_ok, ChannelCloseArgs, ChannelFlowArgs},
    connection::{
        connection_close, connection_close_ok, ConnectionBlockedArgs, ConnectionCloseArgs, ConnectionOpenArgs,
        ConnectionStartArgs, ConnectionStartOkArgs, ConnectionTuneArgs, ConnectionTuneOkArgs,
    },
    exchange::{
        ExchangeBindArgs, ExchangeDeclareArgs, ExchangeDeclareFlags, ExchangeDeleteArgs, ExchangeDeleteFlags,
        ExchangeUnbindArgs,
    },
    field::{Decimal, FieldTable, FieldValue, TableEntry},
    queue::{
        QueueBindArgs, QueueDeclareArgs, QueueDeclareFlags, QueueDeclareOkArgs, QueueDeleteArgs, QueueDeleteFlags,
        QueueDeleteOkArgs, QueuePurgeArgs, QueuePurgeOkArgs, QueueUnbindArgs,
    },
};

pub const CONNECTION_START: u32 = 0x000A000A;
pub const CONNECTION_START_OK: u32 = 0x000A000B;
pub const CONNECTION_TUNE: u32 = 0x000A001E;
pub const CONNECTION_TUNE_OK: u32 = 0x000A001F;
pub const CONNECTION_OPEN: u32 = 0x000A0028;
pub const CONNECTION_OPEN_OK: u32 = 0x000A0029;
pub const CONNECTION_CLOSE: u32 = 0x000A0032;
pub const CONNECTION_CLOSE_OK: u32 = 0x000A0033;
pub const CONNECTION_BLOCKED: u32 = 0x000A003C;
pub const CONNECTION_UNBLOCKED: u32 = 0x000A003D;

pub const CHANNEL_OPEN: u32 = 0x0014000A;
pub const CHANNEL_OPEN_OK: u32 = 0x0014000B;
pub const CHANNEL_FLOW: u32 = 0x00140014;
pub const CHANNEL_FLOW_OK: u32 = 0x00140015;
pub const CHANNEL_CLOSE: u32 = 0x00140028;
pub const CHANNEL_CLOSE_OK: u32 = 0x00140029;

pub const EXCHANGE_DECLARE: u32 = 0x0028000A;
pub const EXCHANGE_DECLARE_OK: u32 = 0x0028000B;
pub const EXCHANGE_DELETE: u32 = 0x00280014;
pub const EXCHANGE_DELETE_OK: u32 = 0x00280015;
pub const EXCHANGE_BIND: u32 = 0x0028001E;
pub const EXCHANGE_BIND_OK: u32 = 0x0028001F;
pub const EXCHANGE_UNBIND: u32 = 0x00280028;
pub const EXCHANGE_UNBIND_OK: u32 = 0x00280033;

pub const QUEUE_DECLARE: u32 = 0x0032000A;
pub const QUEUE_DECLARE_OK: u32 = 0x0032000B;
pub const QUEUE_BIND: u32 = 0x00320014;
pub const QUEUE_BIND_OK: u32 = 0x00320015;
pub const QUEUE_PURGE: u32 = 0x0032001E;
pub const QUEUE_PURGE_OK: u32 = 0x0032001F;
pub const QUEUE_DELETE: u32 = 0x00320028;
pub const QUEUE_DELETE_OK: u32 = 0x00320029;
pub const QUEUE_UNBIND: u32 = 0x00320032;
pub const QUEUE_UNBIND_OK: u32 = 0x00320033;

pub const BASIC_QOS: u32 = 0x003C000A;
pub const BASIC_QOS_OK: u32 = 0x003C000B;
pub const BASIC_CONSUME: u32 = 0x003C0014;
pub const BASIC_CONSUME_OK: u32 = 0x003C0015;
pub const BASIC_CANCEL: u32 = 0x003C001E;
pub const BASIC_CANCEL_OK: u32 = 0x003C001F;
pub const BASIC_PUBLISH: u32 = 0x003C0028;
pub const BASIC_RETURN: u32 = 0x003C0032;
pub const BASIC_DELIVER: u32 = 0x003C003C;
pub const BASIC_GET: u32 = 0x003C0046;
pub const BASIC_GET_OK: u32 = 0x003C0047;
pub const BASIC_GET_EMPTY: u32 = 0x003C0048;
pub const BASIC_ACK: u32 = 0x003C0050;
pub const BASIC_REJECT: u32 = 0x003C005A;
pub const BASIC_RECOVER_ASYNC: u32 = 0x003C0064;
pub const BASIC_RECOVER: u32 = 0x003C006E;
pub const BASIC_RECOVER_OK: u32 = 0x003C006F;
pub const BASIC_NACK: u32 = 0x003C0078;

pub const CONFIRM_SELECT: u32 = 0x0055000A;
pub const CONFIRM_SELECT_OK: u32 = 0x0055000B;

/// Class id of the basic class, used in content headers.
pub const BASIC_CLASS: ClassId = 60;

pub type Channel = u16;
pub type ClassMethod = u32;
pub type ClassId = u16;
pub type Weight = u16;

/// Represents an AMQP frame.
#[derive(Clone, PartialEq)]
pub enum AMQPFrame {
    /// Protocol header, sent by the client first. The server sends it back when it doesn't
    /// support the version we asked for.
    Header,
    /// Represents the AMQP RPC frames. Connection based calls have a channel number 0, otherwise
    /// channel is the current channel on which the frames are sent. The RPC arguments are
    /// represented in `MethodFrameArgs`.
    Method(Channel, ClassMethod, MethodFrameArgs),
    ContentHeader(ContentHeaderFrame),
    ContentBody(ContentBodyFrame),
    Heartbeat(Channel),
}

impl AMQPFrame {
    /// The channel the frame travels on, the protocol header has none.
    pub fn channel(&self) -> Option<Channel> {
        match self {
            AMQPFrame::Header => None,
            AMQPFrame::Method(ch, _, _) => Some(*ch),
            AMQPFrame::ContentHeader(header) => Some(header.channel),
            AMQPFrame::ContentBody(body) => Some(body.channel),
            AMQPFrame::Heartbeat(ch) => Some(*ch),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AMQPFrame::Header => "protocol header",
            AMQPFrame::Method(..) => "method",
            AMQPFrame::ContentHeader(_) => "content header",
            AMQPFrame::ContentBody(_) => "content body",
            AMQPFrame::Heartbeat(_) => "heartbeat",
        }
    }
}

impl std::fmt::Debug for AMQPFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AMQPFrame::Header => write!(f, "Header"),
            AMQPFrame::Method(ch, cm, args) => write!(f, "Method(channel={}, {:08X}, {:?})", ch, cm, args),
            AMQPFrame::ContentHeader(ch) => write!(f, "ContentHeader({:?})", ch),
            AMQPFrame::ContentBody(cb) => write!(f, "ContentBody({:?})", cb),
            AMQPFrame::Heartbeat(_) => write!(f, "Heartbeat"),
        }
    }
}

/// Represents all types of method frame arguments.
#[derive(Clone, Debug, PartialEq)]
pub enum MethodFrameArgs {
    ConnectionStart(ConnectionStartArgs),
    ConnectionStartOk(ConnectionStartOkArgs),
    ConnectionTune(ConnectionTuneArgs),
    ConnectionTuneOk(ConnectionTuneOkArgs),
    ConnectionOpen(ConnectionOpenArgs),
    ConnectionOpenOk,
    ConnectionClose(ConnectionCloseArgs),
    ConnectionCloseOk,
    ConnectionBlocked(ConnectionBlockedArgs),
    ConnectionUnblocked,
    ChannelOpen,
    ChannelOpenOk,
    ChannelFlow(ChannelFlowArgs),
    ChannelFlowOk(ChannelFlowArgs),
    ChannelClose(ChannelCloseArgs),
    ChannelCloseOk,
    ExchangeDeclare(ExchangeDeclareArgs),
    ExchangeDeclareOk,
    ExchangeDelete(ExchangeDeleteArgs),
    ExchangeDeleteOk,
    ExchangeBind(ExchangeBindArgs),
    ExchangeBindOk,
    ExchangeUnbind(ExchangeUnbindArgs),
    ExchangeUnbindOk,
    QueueDeclare(QueueDeclareArgs),
    QueueDeclareOk(QueueDeclareOkArgs),
    QueueBind(QueueBindArgs),
    QueueBindOk,
    QueuePurge(QueuePurgeArgs),
    QueuePurgeOk(QueuePurgeOkArgs),
    QueueDelete(QueueDeleteArgs),
    QueueDeleteOk(QueueDeleteOkArgs),
    QueueUnbind(QueueUnbindArgs),
    QueueUnbindOk,
    BasicQos(BasicQosArgs),
    BasicQosOk,
    BasicConsume(BasicConsumeArgs),
    BasicConsumeOk(BasicConsumeOkArgs),
    BasicCancel(BasicCancelArgs),
    BasicCancelOk(BasicCancelOkArgs),
    BasicGet(BasicGetArgs),
    BasicGetOk(BasicGetOkArgs),
    BasicGetEmpty,
    BasicPublish(BasicPublishArgs),
    BasicReturn(BasicReturnArgs),
    BasicDeliver(BasicDeliverArgs),
    BasicAck(BasicAckArgs),
    BasicReject(BasicRejectArgs),
    BasicRecoverAsync(BasicRecoverArgs),
    BasicRecover(BasicRecoverArgs),
    BasicRecoverOk,
    BasicNack(BasicNackArgs),
    ConfirmSelect(ConfirmSelectArgs),
    ConfirmSelectOk,
}

impl MethodFrameArgs {
    /// The combined class and method id of the arguments.
    pub fn class_method(&self) -> ClassMethod {
        use MethodFrameArgs::*;

        match self {
            ConnectionStart(_) => CONNECTION_START,
            ConnectionStartOk(_) => CONNECTION_START_OK,
            ConnectionTune(_) => CONNECTION_TUNE,
            ConnectionTuneOk(_) => CONNECTION_TUNE_OK,
            ConnectionOpen(_) => CONNECTION_OPEN,
            ConnectionOpenOk => CONNECTION_OPEN_OK,
            ConnectionClose(_) => CONNECTION_CLOSE,
            ConnectionCloseOk => CONNECTION_CLOSE_OK,
            ConnectionBlocked(_) => CONNECTION_BLOCKED,
            ConnectionUnblocked => CONNECTION_UNBLOCKED,
            ChannelOpen => CHANNEL_OPEN,
            ChannelOpenOk => CHANNEL_OPEN_OK,
            ChannelFlow(_) => CHANNEL_FLOW,
            ChannelFlowOk(_) => CHANNEL_FLOW_OK,
            ChannelClose(_) => CHANNEL_CLOSE,
            ChannelCloseOk => CHANNEL_CLOSE_OK,
            ExchangeDeclare(_) => EXCHANGE_DECLARE,
            ExchangeDeclareOk => EXCHANGE_DECLARE_OK,
            ExchangeDelete(_) => EXCHANGE_DELETE,
            ExchangeDeleteOk => EXCHANGE_DELETE_OK,
            ExchangeBind(_) => EXCHANGE_BIND,
            ExchangeBindOk => EXCHANGE_BIND_OK,
            ExchangeUnbind(_) => EXCHANGE_UNBIND,
            ExchangeUnbindOk => EXCHANGE_UNBIND_OK,
            QueueDeclare(_) => QUEUE_DECLARE,
            QueueDeclareOk(_) => QUEUE_DECLARE_OK,
            QueueBind(_) => QUEUE_BIND,
            QueueBindOk => QUEUE_BIND_OK,
            QueuePurge(_) => QUEUE_PURGE,
            QueuePurgeOk(_) => QUEUE_PURGE_OK,
            QueueDelete(_) => QUEUE_DELETE,
            QueueDeleteOk(_) => QUEUE_DELETE_OK,
            QueueUnbind(_) => QUEUE_UNBIND,
            QueueUnbindOk => QUEUE_UNBIND_OK,
            BasicQos(_) => BASIC_QOS,
            BasicQosOk => BASIC_QOS_OK,
            BasicConsume(_) => BASIC_CONSUME,
            BasicConsumeOk(_) => BASIC_CONSUME_OK,
            BasicCancel(_) => BASIC_CANCEL,
            BasicCancelOk(_) => BASIC_CANCEL_OK,
            BasicGet(_) => BASIC_GET,
            BasicGetOk(_) => BASIC_GET_OK,
            BasicGetEmpty => BASIC_GET_EMPTY,
            BasicPublish(_) => BASIC_PUBLISH,
            BasicReturn(_) => BASIC_RETURN,
            BasicDeliver(_) => BASIC_DELIVER,
            BasicAck(_) => BASIC_ACK,
            BasicReject(_) => BASIC_REJECT,
            BasicRecoverAsync(_) => BASIC_RECOVER_ASYNC,
            BasicRecover(_) => BASIC_RECOVER,
            BasicRecoverOk => BASIC_RECOVER_OK,
            BasicNack(_) => BASIC_NACK,
            ConfirmSelect(_) => CONFIRM_SELECT,
            ConfirmSelectOk => CONFIRM_SELECT_OK,
        }
    }

    /// Wraps the arguments into a method frame on `channel`.
    pub fn frame(self, channel: Channel) -> AMQPFrame {
        AMQPFrame::Method(channel, self.class_method(), self)
    }
}

/// Human readable name of a class method, like `basic.publish`.
pub fn method_name(cm: ClassMethod) -> &'static str {
    match cm {
        CONNECTION_START => "connection.start",
        CONNECTION_START_OK => "connection.start-ok",
        CONNECTION_TUNE => "connection.tune",
        CONNECTION_TUNE_OK => "connection.tune-ok",
        CONNECTION_OPEN => "connection.open",
        CONNECTION_OPEN_OK => "connection.open-ok",
        CONNECTION_CLOSE => "connection.close",
        CONNECTION_CLOSE_OK => "connection.close-ok",
        CONNECTION_BLOCKED => "connection.blocked",
        CONNECTION_UNBLOCKED => "connection.unblocked",
        CHANNEL_OPEN => "channel.open",
        CHANNEL_OPEN_OK => "channel.open-ok",
        CHANNEL_FLOW => "channel.flow",
        CHANNEL_FLOW_OK => "channel.flow-ok",
        CHANNEL_CLOSE => "channel.close",
        CHANNEL_CLOSE_OK => "channel.close-ok",
        EXCHANGE_DECLARE => "exchange.declare",
        EXCHANGE_DECLARE_OK => "exchange.declare-ok",
        EXCHANGE_DELETE => "exchange.delete",
        EXCHANGE_DELETE_OK => "exchange.delete-ok",
        EXCHANGE_BIND => "exchange.bind",
        EXCHANGE_BIND_OK => "exchange.bind-ok",
        EXCHANGE_UNBIND => "exchange.unbind",
        EXCHANGE_UNBIND_OK => "exchange.unbind-ok",
        QUEUE_DECLARE => "queue.declare",
        QUEUE_DECLARE_OK => "queue.declare-ok",
        QUEUE_BIND => "queue.bind",
        QUEUE_BIND_OK => "queue.bind-ok",
        QUEUE_PURGE => "queue.purge",
        QUEUE_PURGE_OK => "queue.purge-ok",
        QUEUE_DELETE => "queue.delete",
        QUEUE_DELETE_OK => "queue.delete-ok",
        QUEUE_UNBIND => "queue.unbind",
        QUEUE_UNBIND_OK => "queue.unbind-ok",
        BASIC_QOS => "basic.qos",
        BASIC_QOS_OK => "basic.qos-ok",
        BASIC_CONSUME => "basic.consume",
        BASIC_CONSUME_OK => "basic.consume-ok",
        BASIC_CANCEL => "basic.cancel",
        BASIC_CANCEL_OK => "basic.cancel-ok",
        BASIC_PUBLISH => "basic.publish",
        BASIC_RETURN => "basic.return",
        BASIC_DELIVER => "basic.deliver",
        BASIC_GET => "basic.get",
        BASIC_GET_OK => "basic.get-ok",
        BASIC_GET_EMPTY => "basic.get-empty",
        BASIC_ACK => "basic.ack",
        BASIC_REJECT => "basic.reject",
        BASIC_RECOVER_ASYNC => "basic.recover-async",
        BASIC_RECOVER => "basic.recover",
        BASIC_RECOVER_OK => "basic.recover-ok",
        BASIC_NACK => "basic.nack",
        CONFIRM_SELECT => "confirm.select",
        CONFIRM_SELECT_OK => "confirm.select-ok",
        _ => "unknown",
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct HeaderPropertyFlags: u16 {
        const CLUSTER_ID       = 0b0000_0000_0000_0100;
        const APP_ID           = 0b0000_0000_0000_1000;
        const USER_ID          = 0b0000_0000_0001_0000;
        const MESSAGE_TYPE     = 0b0000_0000_0010_0000;
        const TIMESTAMP        = 0b0000_0000_0100_0000;
        const MESSAGE_ID       = 0b0000_0000_1000_0000;
        const EXPIRATION       = 0b0000_0001_0000_0000;
        const REPLY_TO         = 0b0000_0010_0000_0000;
        const CORRELATION_ID   = 0b0000_0100_0000_0000;
        const PRIORITY         = 0b0000_1000_0000_0000;
        const DELIVERY_MODE    = 0b0001_0000_0000_0000;
        const HEADERS          = 0b0010_0000_0000_0000;
        const CONTENT_ENCODING = 0b0100_0000_0000_0000;
        const CONTENT_TYPE     = 0b1000_0000_0000_0000;
    }
}

impl Default for HeaderPropertyFlags {
    fn default() -> Self {
        HeaderPropertyFlags::empty()
    }
}

/// Properties of the basic class sent in the content header.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BasicProperties {
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub headers: Option<FieldTable>,
    pub delivery_mode: Option<u8>,
    pub priority: Option<u8>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
    pub expiration: Option<String>,
    pub message_id: Option<String>,
    pub timestamp: Option<u64>,
    pub message_type: Option<String>,
    pub user_id: Option<String>,
    pub app_id: Option<String>,
    pub cluster_id: Option<String>,
}

impl BasicProperties {
    /// The property flag word, one bit for each present property.
    pub fn flags(&self) -> HeaderPropertyFlags {
        let mut flags = HeaderPropertyFlags::empty();

        Flags::set(&mut flags, HeaderPropertyFlags::CONTENT_TYPE, self.content_type.is_some());
        Flags::set(&mut flags, HeaderPropertyFlags::CONTENT_ENCODING, self.content_encoding.is_some());
        Flags::set(&mut flags, HeaderPropertyFlags::HEADERS, self.headers.is_some());
        Flags::set(&mut flags, HeaderPropertyFlags::DELIVERY_MODE, self.delivery_mode.is_some());
        Flags::set(&mut flags, HeaderPropertyFlags::PRIORITY, self.priority.is_some());
        Flags::set(&mut flags, HeaderPropertyFlags::CORRELATION_ID, self.correlation_id.is_some());
        Flags::set(&mut flags, HeaderPropertyFlags::REPLY_TO, self.reply_to.is_some());
        Flags::set(&mut flags, HeaderPropertyFlags::EXPIRATION, self.expiration.is_some());
        Flags::set(&mut flags, HeaderPropertyFlags::MESSAGE_ID, self.message_id.is_some());
        Flags::set(&mut flags, HeaderPropertyFlags::TIMESTAMP, self.timestamp.is_some());
        Flags::set(&mut flags, HeaderPropertyFlags::MESSAGE_TYPE, self.message_type.is_some());
        Flags::set(&mut flags, HeaderPropertyFlags::USER_ID, self.user_id.is_some());
        Flags::set(&mut flags, HeaderPropertyFlags::APP_ID, self.app_id.is_some());
        Flags::set(&mut flags, HeaderPropertyFlags::CLUSTER_ID, self.cluster_id.is_some());

        flags
    }

    pub fn content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    /// 1 for transient, 2 for persistent messages.
    pub fn delivery_mode(mut self, mode: u8) -> Self {
        self.delivery_mode = Some(mode);
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.headers.get_or_insert_with(FieldTable::new).insert(key, value);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContentHeaderFrame {
    pub channel: Channel,
    pub class_id: ClassId,
    pub weight: Weight,
    pub body_size: u64,
    pub properties: BasicProperties,
}

impl ContentHeaderFrame {
    pub fn new(channel: Channel, body_size: u64, properties: BasicProperties) -> Self {
        Self {
            channel,
            class_id: BASIC_CLASS,
            weight: 0,
            body_size,
            properties,
        }
    }

    pub fn frame(self) -> AMQPFrame {
        AMQPFrame::ContentHeader(self)
    }
}

#[derive(Clone, PartialEq)]
pub struct ContentBodyFrame {
    pub channel: Channel,
    pub body: Bytes,
}

impl ContentBodyFrame {
    pub fn frame(self) -> AMQPFrame {
        AMQPFrame::ContentBody(self)
    }
}

impl std::fmt::Debug for ContentBodyFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = String::from_utf8_lossy(&self.body[..std::cmp::min(64usize, self.body.len())]);

        f.write_fmt(format_args!(
            "ContentBodyFrame {{ channel: {}, body: \"{}\" }}",
            &self.channel, body
        ))
    }
}

impl From<ContentHeaderFrame> for AMQPFrame {
    fn from(chf: ContentHeaderFrame) -> AMQPFrame {
        AMQPFrame::ContentHeader(chf)
    }
}

impl From<ContentBodyFrame> for AMQPFrame {
    fn from(cbf: ContentBodyFrame) -> AMQPFrame {
        AMQPFrame::ContentBody(cbf)
    }
}

/// Split class id and method id from `u32` combined code.
pub fn split_class_method(cm: u32) -> (u16, u16) {
    let method_id = (cm & 0x0000FFFF) as u16;
    let class_id = (cm >> 16) as u16;

    (class_id, method_id)
}

/// Combine class id and method id to a single `u32` value
pub fn unify_class_method(class: u16, method: u16) -> u32 {
    ((class as u32) << 16) | (method as u32)
}

pub fn heartbeat() -> AMQPFrame {
    AMQPFrame::Heartbeat(0)
}
