use crate::frame::*;
use crate::{frame_error, FrameError, FRAME_ERROR, SYNTAX_ERROR};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

const FRAME_METHOD_FRAME: u8 = 0x01;
const FRAME_CONTENT_HEADER: u8 = 0x02;
const FRAME_CONTENT_BODY: u8 = 0x03;
const FRAME_HEARTBEAT: u8 = 0x08;
const FRAME_AMQP_VERSION: u8 = 0x41;
const FRAME_END: u8 = 0xCE;

/// Size of the frame header and the frame end octet, the overhead of every frame.
pub const FRAME_OVERHEAD: usize = 8;

/// Largest frame accepted before tune, and when the negotiated frame max is zero.
pub const DEFAULT_MAX_FRAME: usize = 131072;

/// AMQP frame encoder and decoder. Frames bigger than `max_frame`, overhead included, are
/// refused before their payload is buffered.
#[derive(Debug)]
pub struct AMQPCodec {
    max_frame: usize,
}

impl Default for AMQPCodec {
    fn default() -> Self {
        AMQPCodec {
            max_frame: DEFAULT_MAX_FRAME,
        }
    }
}

impl AMQPCodec {
    pub fn max_frame(&self) -> usize {
        self.max_frame
    }

    /// Sets the negotiated frame max, zero falls back to the default limit.
    pub fn set_max_frame(&mut self, frame_max: u32) {
        self.max_frame = match frame_max {
            0 => DEFAULT_MAX_FRAME,
            max => max as usize,
        };
    }
}

#[derive(Debug)]
pub enum Frame {
    Frame(AMQPFrame),
    Frames(Vec<AMQPFrame>),
}

impl Encoder<Frame> for AMQPCodec {
    type Error = io::Error;

    fn encode(&mut self, event: Frame, buf: &mut BytesMut) -> Result<(), Self::Error> {
        match event {
            Frame::Frame(frame) => encode_amqp_frame(buf, &frame),
            Frame::Frames(frames) => frames.iter().try_for_each(|frame| encode_amqp_frame(buf, frame)),
        }
        .map_err(invalid_data)
    }
}

impl Decoder for AMQPCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        if src[0] == FRAME_AMQP_VERSION {
            if src.len() < 8 {
                return Ok(None);
            }

            let head = src.split_to(8);

            if &head[..4] != b"AMQP" {
                return Err(invalid_data(error(FRAME_ERROR, "Malformed protocol header")));
            }

            return Ok(Some(Frame::Frame(AMQPFrame::Header)));
        }

        if src.len() < 7 {
            return Ok(None);
        }

        let frame_len = u32::from_be_bytes([src[3], src[4], src[5], src[6]]) as usize;

        if frame_len.saturating_add(FRAME_OVERHEAD) > self.max_frame {
            return Err(invalid_data(error(
                FRAME_ERROR,
                &format!("Frame size {} exceeds frame max {}", frame_len + FRAME_OVERHEAD, self.max_frame),
            )));
        }

        if src.len() < frame_len + FRAME_OVERHEAD {
            src.reserve(frame_len + FRAME_OVERHEAD - src.len());

            return Ok(None);
        }

        let frame_type = src.get_u8();
        let channel = src.get_u16();
        let _ = src.get_u32();
        let payload = src.split_to(frame_len);

        if src.get_u8() != FRAME_END {
            return Err(invalid_data(error(FRAME_ERROR, "Missing frame end octet")));
        }

        decode_frame(frame_type, channel, payload)
            .map(|frame| Some(Frame::Frame(frame)))
            .map_err(invalid_data)
    }
}

fn error(code: u16, message: &str) -> crate::Error {
    Box::new(FrameError {
        code,
        message: message.to_string(),
    })
}

fn invalid_data(err: crate::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

/// Encodes a field table to its wire form, including the length prefix.
pub fn encode_table(table: &FieldTable) -> crate::Result<Bytes> {
    let mut buf = BytesMut::new();

    encode_field_table(&mut buf, table)?;

    Ok(buf.freeze())
}

/// Decodes a length prefixed field table. Trailing bytes after the table are an error.
pub fn decode_table(bytes: &[u8]) -> crate::Result<FieldTable> {
    let mut buf = BytesMut::from(bytes);
    let table = decode_field_table(&mut buf)?;

    if buf.has_remaining() {
        return frame_error!(SYNTAX_ERROR, "Trailing bytes after field table");
    }

    Ok(table)
}

fn decode_frame(frame_type: u8, channel: Channel, mut payload: BytesMut) -> crate::Result<AMQPFrame> {
    match frame_type {
        FRAME_METHOD_FRAME => decode_method_frame(&mut payload, channel),
        FRAME_CONTENT_HEADER => decode_content_header_frame(&mut payload, channel),
        FRAME_CONTENT_BODY => Ok(AMQPFrame::ContentBody(ContentBodyFrame {
            channel,
            body: payload.freeze(),
        })),
        FRAME_HEARTBEAT => Ok(AMQPFrame::Heartbeat(channel)),
        f => frame_error!(FRAME_ERROR, format!("Unknown frame type {}", f)),
    }
}

fn need(buf: &BytesMut, len: usize) -> crate::Result<()> {
    if buf.remaining() < len {
        return frame_error!(
            FRAME_ERROR,
            format!("Truncated frame, {} bytes needed, {} left", len, buf.remaining())
        );
    }

    Ok(())
}

macro_rules! reader {
    ($($name:ident => $ty:ty, $get:ident);* $(;)?) => {
        $(
            fn $name(buf: &mut BytesMut) -> crate::Result<$ty> {
                need(buf, std::mem::size_of::<$ty>())?;

                Ok(buf.$get())
            }
        )*
    };
}

reader! {
    read_u8 => u8, get_u8;
    read_i8 => i8, get_i8;
    read_u16 => u16, get_u16;
    read_i16 => i16, get_i16;
    read_u32 => u32, get_u32;
    read_i32 => i32, get_i32;
    read_u64 => u64, get_u64;
    read_i64 => i64, get_i64;
    read_f32 => f32, get_f32;
    read_f64 => f64, get_f64;
}

fn read_bool(buf: &mut BytesMut) -> crate::Result<bool> {
    Ok(read_u8(buf)? != 0)
}

fn decode_method_frame(src: &mut BytesMut, channel: Channel) -> crate::Result<AMQPFrame> {
    let class_method = read_u32(src)?;

    let args = match class_method {
        CONNECTION_START => decode_connection_start(src)?,
        CONNECTION_START_OK => decode_connection_start_ok(src)?,
        CONNECTION_TUNE => MethodFrameArgs::ConnectionTune(ConnectionTuneArgs {
            channel_max: read_u16(src)?,
            frame_max: read_u32(src)?,
            heartbeat: read_u16(src)?,
        }),
        CONNECTION_TUNE_OK => MethodFrameArgs::ConnectionTuneOk(ConnectionTuneOkArgs {
            channel_max: read_u16(src)?,
            frame_max: read_u32(src)?,
            heartbeat: read_u16(src)?,
        }),
        CONNECTION_OPEN => decode_connection_open(src)?,
        CONNECTION_OPEN_OK => {
            let _reserved = decode_short_string(src)?;

            MethodFrameArgs::ConnectionOpenOk
        }
        CONNECTION_CLOSE => MethodFrameArgs::ConnectionClose(ConnectionCloseArgs {
            code: read_u16(src)?,
            text: decode_short_string(src)?,
            class_id: read_u16(src)?,
            method_id: read_u16(src)?,
        }),
        CONNECTION_CLOSE_OK => MethodFrameArgs::ConnectionCloseOk,
        CONNECTION_BLOCKED => MethodFrameArgs::ConnectionBlocked(ConnectionBlockedArgs {
            reason: decode_short_string(src)?,
        }),
        CONNECTION_UNBLOCKED => MethodFrameArgs::ConnectionUnblocked,
        CHANNEL_OPEN => {
            let _reserved = decode_short_string(src)?;

            MethodFrameArgs::ChannelOpen
        }
        CHANNEL_OPEN_OK => {
            let _reserved = decode_long_bytes(src)?;

            MethodFrameArgs::ChannelOpenOk
        }
        CHANNEL_FLOW => MethodFrameArgs::ChannelFlow(ChannelFlowArgs {
            active: read_bool(src)?,
        }),
        CHANNEL_FLOW_OK => MethodFrameArgs::ChannelFlowOk(ChannelFlowArgs {
            active: read_bool(src)?,
        }),
        CHANNEL_CLOSE => MethodFrameArgs::ChannelClose(ChannelCloseArgs {
            code: read_u16(src)?,
            text: decode_short_string(src)?,
            class_id: read_u16(src)?,
            method_id: read_u16(src)?,
        }),
        CHANNEL_CLOSE_OK => MethodFrameArgs::ChannelCloseOk,
        EXCHANGE_DECLARE => decode_exchange_declare(src)?,
        EXCHANGE_DECLARE_OK => MethodFrameArgs::ExchangeDeclareOk,
        EXCHANGE_DELETE => decode_exchange_delete(src)?,
        EXCHANGE_DELETE_OK => MethodFrameArgs::ExchangeDeleteOk,
        EXCHANGE_BIND => MethodFrameArgs::ExchangeBind(decode_exchange_bind(src)?),
        EXCHANGE_BIND_OK => MethodFrameArgs::ExchangeBindOk,
        EXCHANGE_UNBIND => MethodFrameArgs::ExchangeUnbind(decode_exchange_bind(src)?),
        EXCHANGE_UNBIND_OK => MethodFrameArgs::ExchangeUnbindOk,
        QUEUE_DECLARE => decode_queue_declare(src)?,
        QUEUE_DECLARE_OK => MethodFrameArgs::QueueDeclareOk(QueueDeclareOkArgs {
            name: decode_short_string(src)?,
            message_count: read_u32(src)?,
            consumer_count: read_u32(src)?,
        }),
        QUEUE_BIND => decode_queue_bind(src)?,
        QUEUE_BIND_OK => MethodFrameArgs::QueueBindOk,
        QUEUE_PURGE => {
            let _ = read_u16(src)?;

            MethodFrameArgs::QueuePurge(QueuePurgeArgs {
                queue_name: decode_short_string(src)?,
                no_wait: read_bool(src)?,
            })
        }
        QUEUE_PURGE_OK => MethodFrameArgs::QueuePurgeOk(QueuePurgeOkArgs {
            message_count: read_u32(src)?,
        }),
        QUEUE_DELETE => decode_queue_delete(src)?,
        QUEUE_DELETE_OK => MethodFrameArgs::QueueDeleteOk(QueueDeleteOkArgs {
            message_count: read_u32(src)?,
        }),
        QUEUE_UNBIND => decode_queue_unbind(src)?,
        QUEUE_UNBIND_OK => MethodFrameArgs::QueueUnbindOk,
        BASIC_QOS => MethodFrameArgs::BasicQos(BasicQosArgs {
            prefetch_size: read_u32(src)?,
            prefetch_count: read_u16(src)?,
            global: read_bool(src)?,
        }),
        BASIC_QOS_OK => MethodFrameArgs::BasicQosOk,
        BASIC_CONSUME => decode_basic_consume(src)?,
        BASIC_CONSUME_OK => MethodFrameArgs::BasicConsumeOk(BasicConsumeOkArgs {
            consumer_tag: decode_short_string(src)?,
        }),
        BASIC_CANCEL => MethodFrameArgs::BasicCancel(BasicCancelArgs {
            consumer_tag: decode_short_string(src)?,
            no_wait: read_bool(src)?,
        }),
        BASIC_CANCEL_OK => MethodFrameArgs::BasicCancelOk(BasicCancelOkArgs {
            consumer_tag: decode_short_string(src)?,
        }),
        BASIC_PUBLISH => decode_basic_publish(src)?,
        BASIC_RETURN => MethodFrameArgs::BasicReturn(BasicReturnArgs {
            reply_code: read_u16(src)?,
            reply_text: decode_short_string(src)?,
            exchange_name: decode_short_string(src)?,
            routing_key: decode_short_string(src)?,
        }),
        BASIC_DELIVER => MethodFrameArgs::BasicDeliver(BasicDeliverArgs {
            consumer_tag: decode_short_string(src)?,
            delivery_tag: read_u64(src)?,
            redelivered: read_bool(src)?,
            exchange_name: decode_short_string(src)?,
            routing_key: decode_short_string(src)?,
        }),
        BASIC_GET => {
            let _ = read_u16(src)?;

            MethodFrameArgs::BasicGet(BasicGetArgs {
                queue: decode_short_string(src)?,
                no_ack: read_bool(src)?,
            })
        }
        BASIC_GET_OK => MethodFrameArgs::BasicGetOk(BasicGetOkArgs {
            delivery_tag: read_u64(src)?,
            redelivered: read_bool(src)?,
            exchange_name: decode_short_string(src)?,
            routing_key: decode_short_string(src)?,
            message_count: read_u32(src)?,
        }),
        BASIC_GET_EMPTY => {
            let _reserved = decode_short_string(src)?;

            MethodFrameArgs::BasicGetEmpty
        }
        BASIC_ACK => MethodFrameArgs::BasicAck(BasicAckArgs {
            delivery_tag: read_u64(src)?,
            multiple: read_bool(src)?,
        }),
        BASIC_REJECT => MethodFrameArgs::BasicReject(BasicRejectArgs {
            delivery_tag: read_u64(src)?,
            requeue: read_bool(src)?,
        }),
        BASIC_RECOVER_ASYNC => MethodFrameArgs::BasicRecoverAsync(BasicRecoverArgs {
            requeue: read_bool(src)?,
        }),
        BASIC_RECOVER => MethodFrameArgs::BasicRecover(BasicRecoverArgs {
            requeue: read_bool(src)?,
        }),
        BASIC_RECOVER_OK => MethodFrameArgs::BasicRecoverOk,
        BASIC_NACK => MethodFrameArgs::BasicNack(BasicNackArgs {
            delivery_tag: read_u64(src)?,
            flags: BasicNackFlags::from_bits_truncate(read_u8(src)?),
        }),
        CONFIRM_SELECT => MethodFrameArgs::ConfirmSelect(ConfirmSelectArgs {
            no_wait: read_bool(src)?,
        }),
        CONFIRM_SELECT_OK => MethodFrameArgs::ConfirmSelectOk,
        _ => return frame_error!(FRAME_ERROR, format!("Unknown class method {:08X}", class_method)),
    };

    Ok(AMQPFrame::Method(channel, class_method, args))
}

fn decode_connection_start(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    let args = ConnectionStartArgs {
        version_major: read_u8(src)?,
        version_minor: read_u8(src)?,
        properties: decode_field_table(src)?,
        mechanisms: decode_long_string(src)?,
        locales: decode_long_string(src)?,
    };

    Ok(MethodFrameArgs::ConnectionStart(args))
}

fn decode_connection_start_ok(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    let args = ConnectionStartOkArgs {
        properties: decode_field_table(src)?,
        mechanism: decode_short_string(src)?,
        response: decode_long_string(src)?,
        locale: decode_short_string(src)?,
    };

    Ok(MethodFrameArgs::ConnectionStartOk(args))
}

fn decode_connection_open(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    let virtual_host = decode_short_string(src)?;
    let _reserved = decode_short_string(src)?;
    let flags = read_u8(src)?;

    Ok(MethodFrameArgs::ConnectionOpen(ConnectionOpenArgs {
        virtual_host,
        insist: flags & 0x01 != 0,
    }))
}

fn decode_exchange_declare(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    let _ = read_u16(src)?;
    let args = ExchangeDeclareArgs {
        exchange_name: decode_short_string(src)?,
        exchange_type: decode_short_string(src)?,
        flags: ExchangeDeclareFlags::from_bits_truncate(read_u8(src)?),
        args: decode_field_table(src)?,
    };

    Ok(MethodFrameArgs::ExchangeDeclare(args))
}

fn decode_exchange_delete(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    let _ = read_u16(src)?;
    let args = ExchangeDeleteArgs {
        exchange_name: decode_short_string(src)?,
        flags: ExchangeDeleteFlags::from_bits_truncate(read_u8(src)?),
    };

    Ok(MethodFrameArgs::ExchangeDelete(args))
}

fn decode_exchange_bind(src: &mut BytesMut) -> crate::Result<ExchangeBindArgs> {
    let _ = read_u16(src)?;

    Ok(ExchangeBindArgs {
        destination: decode_short_string(src)?,
        source: decode_short_string(src)?,
        routing_key: decode_short_string(src)?,
        no_wait: read_bool(src)?,
        args: decode_field_table(src)?,
    })
}

fn decode_queue_declare(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    let _ = read_u16(src)?;
    let args = QueueDeclareArgs {
        name: decode_short_string(src)?,
        flags: QueueDeclareFlags::from_bits_truncate(read_u8(src)?),
        args: decode_field_table(src)?,
    };

    Ok(MethodFrameArgs::QueueDeclare(args))
}

fn decode_queue_bind(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    let _ = read_u16(src)?;
    let args = QueueBindArgs {
        queue_name: decode_short_string(src)?,
        exchange_name: decode_short_string(src)?,
        routing_key: decode_short_string(src)?,
        no_wait: read_bool(src)?,
        args: decode_field_table(src)?,
    };

    Ok(MethodFrameArgs::QueueBind(args))
}

fn decode_queue_delete(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    let _ = read_u16(src)?;
    let args = QueueDeleteArgs {
        queue_name: decode_short_string(src)?,
        flags: QueueDeleteFlags::from_bits_truncate(read_u8(src)?),
    };

    Ok(MethodFrameArgs::QueueDelete(args))
}

fn decode_queue_unbind(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    let _ = read_u16(src)?;
    let args = QueueUnbindArgs {
        queue_name: decode_short_string(src)?,
        exchange_name: decode_short_string(src)?,
        routing_key: decode_short_string(src)?,
        args: decode_field_table(src)?,
    };

    Ok(MethodFrameArgs::QueueUnbind(args))
}

fn decode_basic_consume(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    let _ = read_u16(src)?;
    let args = BasicConsumeArgs {
        queue: decode_short_string(src)?,
        consumer_tag: decode_short_string(src)?,
        flags: BasicConsumeFlags::from_bits_truncate(read_u8(src)?),
        args: decode_field_table(src)?,
    };

    Ok(MethodFrameArgs::BasicConsume(args))
}

fn decode_basic_publish(src: &mut BytesMut) -> crate::Result<MethodFrameArgs> {
    let _ = read_u16(src)?;
    let args = BasicPublishArgs {
        exchange_name: decode_short_string(src)?,
        routing_key: decode_short_string(src)?,
        flags: BasicPublishFlags::from_bits_truncate(read_u8(src)?),
    };

    Ok(MethodFrameArgs::BasicPublish(args))
}

fn decode_content_header_frame(src: &mut BytesMut, channel: Channel) -> crate::Result<AMQPFrame> {
    let class_id = read_u16(src)?;
    let weight = read_u16(src)?;
    let body_size = read_u64(src)?;
    let raw_flags = read_u16(src)?;

    // The lowest bit announces a continuation flag word, basic properties never need one.
    if raw_flags & 0x0001 != 0 {
        return frame_error!(SYNTAX_ERROR, "Property flag continuation is not supported");
    }

    let flags = HeaderPropertyFlags::from_bits_truncate(raw_flags);
    let mut properties = BasicProperties::default();

    if flags.contains(HeaderPropertyFlags::CONTENT_TYPE) {
        properties.content_type = Some(decode_short_string(src)?);
    }
    if flags.contains(HeaderPropertyFlags::CONTENT_ENCODING) {
        properties.content_encoding = Some(decode_short_string(src)?);
    }
    if flags.contains(HeaderPropertyFlags::HEADERS) {
        properties.headers = Some(decode_field_table(src)?);
    }
    if flags.contains(HeaderPropertyFlags::DELIVERY_MODE) {
        properties.delivery_mode = Some(read_u8(src)?);
    }
    if flags.contains(HeaderPropertyFlags::PRIORITY) {
        properties.priority = Some(read_u8(src)?);
    }
    if flags.contains(HeaderPropertyFlags::CORRELATION_ID) {
        properties.correlation_id = Some(decode_short_string(src)?);
    }
    if flags.contains(HeaderPropertyFlags::REPLY_TO) {
        properties.reply_to = Some(decode_short_string(src)?);
    }
    if flags.contains(HeaderPropertyFlags::EXPIRATION) {
        properties.expiration = Some(decode_short_string(src)?);
    }
    if flags.contains(HeaderPropertyFlags::MESSAGE_ID) {
        properties.message_id = Some(decode_short_string(src)?);
    }
    if flags.contains(HeaderPropertyFlags::TIMESTAMP) {
        properties.timestamp = Some(read_u64(src)?);
    }
    if flags.contains(HeaderPropertyFlags::MESSAGE_TYPE) {
        properties.message_type = Some(decode_short_string(src)?);
    }
    if flags.contains(HeaderPropertyFlags::USER_ID) {
        properties.user_id = Some(decode_short_string(src)?);
    }
    if flags.contains(HeaderPropertyFlags::APP_ID) {
        properties.app_id = Some(decode_short_string(src)?);
    }
    if flags.contains(HeaderPropertyFlags::CLUSTER_ID) {
        properties.cluster_id = Some(decode_short_string(src)?);
    }

    Ok(AMQPFrame::ContentHeader(ContentHeaderFrame {
        channel,
        class_id,
        weight,
        body_size,
        properties,
    }))
}

fn decode_value(buf: &mut BytesMut) -> crate::Result<FieldValue> {
    let value = match read_u8(buf)? {
        b't' => FieldValue::Bool(read_bool(buf)?),
        b'b' => FieldValue::I8(read_i8(buf)?),
        b'B' => FieldValue::U8(read_u8(buf)?),
        b's' => FieldValue::I16(read_i16(buf)?),
        b'u' => FieldValue::U16(read_u16(buf)?),
        b'I' => FieldValue::I32(read_i32(buf)?),
        b'i' => FieldValue::U32(read_u32(buf)?),
        b'l' => FieldValue::I64(read_i64(buf)?),
        b'L' => FieldValue::U64(read_u64(buf)?),
        b'f' => FieldValue::F32(read_f32(buf)?),
        b'd' => FieldValue::F64(read_f64(buf)?),
        b'D' => FieldValue::Decimal(Decimal {
            scale: read_u8(buf)?,
            value: read_u32(buf)?,
        }),
        b'S' => FieldValue::String(decode_long_string(buf)?),
        b'x' => FieldValue::Bytes(decode_long_bytes(buf)?),
        b'A' => FieldValue::Array(decode_field_array(buf)?),
        b'F' => FieldValue::Table(decode_field_table(buf)?),
        b'T' => FieldValue::Timestamp(read_u64(buf)?),
        b'V' => FieldValue::Void,
        t => return frame_error!(SYNTAX_ERROR, format!("Unknown field value type {:?}", t as char)),
    };

    Ok(value)
}

fn decode_short_string(buf: &mut BytesMut) -> crate::Result<String> {
    let len = read_u8(buf)? as usize;
    need(buf, len)?;
    let sb = buf.split_to(len);

    String::from_utf8(sb.to_vec()).map_err(|_| error(SYNTAX_ERROR, "Short string is not valid UTF-8"))
}

fn decode_long_bytes(buf: &mut BytesMut) -> crate::Result<Bytes> {
    let len = read_u32(buf)? as usize;
    need(buf, len)?;

    Ok(buf.split_to(len).freeze())
}

fn decode_long_string(buf: &mut BytesMut) -> crate::Result<String> {
    let bytes = decode_long_bytes(buf)?;

    String::from_utf8(bytes.to_vec()).map_err(|_| error(SYNTAX_ERROR, "Long string is not valid UTF-8"))
}

/// Decode a field table
///
/// The buffer points to the beginning of the field table which is a `u32` length
/// information. Entries keep their wire order, duplicates included.
fn decode_field_table(buf: &mut BytesMut) -> crate::Result<FieldTable> {
    let ft_len = read_u32(buf)? as usize;
    need(buf, ft_len)?;

    let mut ft_buf = buf.split_to(ft_len);
    let mut table = FieldTable::new();

    while ft_buf.has_remaining() {
        let key = decode_short_string(&mut ft_buf)?;
        let value = decode_value(&mut ft_buf)?;

        table.push(TableEntry { key, value });
    }

    Ok(table)
}

fn decode_field_array(buf: &mut BytesMut) -> crate::Result<Vec<FieldValue>> {
    let len = read_u32(buf)? as usize;
    need(buf, len)?;

    let mut array_buf = buf.split_to(len);
    let mut values = vec![];

    while array_buf.has_remaining() {
        values.push(decode_value(&mut array_buf)?);
    }

    Ok(values)
}

fn encode_amqp_frame(buf: &mut BytesMut, frame: &AMQPFrame) -> crate::Result<()> {
    match frame {
        AMQPFrame::Header => buf.put(&b"AMQP\x00\x00\x09\x01"[..]),

        AMQPFrame::Method(ch, cm, args) => encode_method_frame(buf, *ch, *cm, args)?,

        AMQPFrame::ContentHeader(header_frame) => encode_content_header_frame(buf, header_frame)?,

        AMQPFrame::ContentBody(body_frame) => encode_content_body_frame(buf, body_frame),

        AMQPFrame::Heartbeat(channel) => encode_heartbeat_frame(buf, *channel),
    }

    Ok(())
}

fn encode_method_frame(buf: &mut BytesMut, channel: Channel, cm: ClassMethod, args: &MethodFrameArgs) -> crate::Result<()> {
    let mut fr = BytesMut::with_capacity(256);
    fr.put_u32(cm);

    match args {
        MethodFrameArgs::ConnectionStart(args) => {
            fr.put_u8(args.version_major);
            fr.put_u8(args.version_minor);
            encode_field_table(&mut fr, &args.properties)?;
            encode_long_string(&mut fr, &args.mechanisms);
            encode_long_string(&mut fr, &args.locales);
        }
        MethodFrameArgs::ConnectionStartOk(args) => {
            encode_field_table(&mut fr, &args.properties)?;
            encode_short_string(&mut fr, &args.mechanism)?;
            encode_long_string(&mut fr, &args.response);
            encode_short_string(&mut fr, &args.locale)?;
        }
        MethodFrameArgs::ConnectionTune(args) => {
            fr.put_u16(args.channel_max);
            fr.put_u32(args.frame_max);
            fr.put_u16(args.heartbeat);
        }
        MethodFrameArgs::ConnectionTuneOk(args) => {
            fr.put_u16(args.channel_max);
            fr.put_u32(args.frame_max);
            fr.put_u16(args.heartbeat);
        }
        MethodFrameArgs::ConnectionOpen(args) => {
            encode_short_string(&mut fr, &args.virtual_host)?;
            encode_short_string(&mut fr, "")?;
            fr.put_u8(u8::from(args.insist));
        }
        MethodFrameArgs::ConnectionClose(args) => {
            fr.put_u16(args.code);
            encode_short_string(&mut fr, &args.text)?;
            fr.put_u16(args.class_id);
            fr.put_u16(args.method_id);
        }
        MethodFrameArgs::ConnectionBlocked(args) => encode_short_string(&mut fr, &args.reason)?,
        // reserved empty short string
        MethodFrameArgs::ConnectionOpenOk | MethodFrameArgs::ChannelOpen | MethodFrameArgs::BasicGetEmpty => {
            fr.put_u8(0)
        }
        // reserved empty long string
        MethodFrameArgs::ChannelOpenOk => fr.put_u32(0),
        MethodFrameArgs::ChannelFlow(args) | MethodFrameArgs::ChannelFlowOk(args) => fr.put_u8(u8::from(args.active)),
        MethodFrameArgs::ChannelClose(args) => {
            fr.put_u16(args.code);
            encode_short_string(&mut fr, &args.text)?;
            fr.put_u16(args.class_id);
            fr.put_u16(args.method_id);
        }
        MethodFrameArgs::ExchangeDeclare(args) => {
            fr.put_u16(0);
            encode_short_string(&mut fr, &args.exchange_name)?;
            encode_short_string(&mut fr, &args.exchange_type)?;
            fr.put_u8(args.flags.bits());
            encode_field_table(&mut fr, &args.args)?;
        }
        MethodFrameArgs::ExchangeDelete(args) => {
            fr.put_u16(0);
            encode_short_string(&mut fr, &args.exchange_name)?;
            fr.put_u8(args.flags.bits());
        }
        MethodFrameArgs::ExchangeBind(args) | MethodFrameArgs::ExchangeUnbind(args) => {
            fr.put_u16(0);
            encode_short_string(&mut fr, &args.destination)?;
            encode_short_string(&mut fr, &args.source)?;
            encode_short_string(&mut fr, &args.routing_key)?;
            fr.put_u8(u8::from(args.no_wait));
            encode_field_table(&mut fr, &args.args)?;
        }
        MethodFrameArgs::QueueDeclare(args) => {
            fr.put_u16(0);
            encode_short_string(&mut fr, &args.name)?;
            fr.put_u8(args.flags.bits());
            encode_field_table(&mut fr, &args.args)?;
        }
        MethodFrameArgs::QueueDeclareOk(args) => {
            encode_short_string(&mut fr, &args.name)?;
            fr.put_u32(args.message_count);
            fr.put_u32(args.consumer_count);
        }
        MethodFrameArgs::QueueBind(args) => {
            fr.put_u16(0);
            encode_short_string(&mut fr, &args.queue_name)?;
            encode_short_string(&mut fr, &args.exchange_name)?;
            encode_short_string(&mut fr, &args.routing_key)?;
            fr.put_u8(u8::from(args.no_wait));
            encode_field_table(&mut fr, &args.args)?;
        }
        MethodFrameArgs::QueuePurge(args) => {
            fr.put_u16(0);
            encode_short_string(&mut fr, &args.queue_name)?;
            fr.put_u8(u8::from(args.no_wait));
        }
        MethodFrameArgs::QueuePurgeOk(args) => fr.put_u32(args.message_count),
        MethodFrameArgs::QueueDelete(args) => {
            fr.put_u16(0);
            encode_short_string(&mut fr, &args.queue_name)?;
            fr.put_u8(args.flags.bits());
        }
        MethodFrameArgs::QueueDeleteOk(args) => fr.put_u32(args.message_count),
        MethodFrameArgs::QueueUnbind(args) => {
            fr.put_u16(0);
            encode_short_string(&mut fr, &args.queue_name)?;
            encode_short_string(&mut fr, &args.exchange_name)?;
            encode_short_string(&mut fr, &args.routing_key)?;
            encode_field_table(&mut fr, &args.args)?;
        }
        MethodFrameArgs::BasicQos(args) => {
            fr.put_u32(args.prefetch_size);
            fr.put_u16(args.prefetch_count);
            fr.put_u8(u8::from(args.global));
        }
        MethodFrameArgs::BasicConsume(args) => {
            fr.put_u16(0);
            encode_short_string(&mut fr, &args.queue)?;
            encode_short_string(&mut fr, &args.consumer_tag)?;
            fr.put_u8(args.flags.bits());
            encode_field_table(&mut fr, &args.args)?;
        }
        MethodFrameArgs::BasicConsumeOk(args) => encode_short_string(&mut fr, &args.consumer_tag)?,
        MethodFrameArgs::BasicCancel(args) => {
            encode_short_string(&mut fr, &args.consumer_tag)?;
            fr.put_u8(u8::from(args.no_wait));
        }
        MethodFrameArgs::BasicCancelOk(args) => encode_short_string(&mut fr, &args.consumer_tag)?,
        MethodFrameArgs::BasicGet(args) => {
            fr.put_u16(0);
            encode_short_string(&mut fr, &args.queue)?;
            fr.put_u8(u8::from(args.no_ack));
        }
        MethodFrameArgs::BasicGetOk(args) => {
            fr.put_u64(args.delivery_tag);
            fr.put_u8(u8::from(args.redelivered));
            encode_short_string(&mut fr, &args.exchange_name)?;
            encode_short_string(&mut fr, &args.routing_key)?;
            fr.put_u32(args.message_count);
        }
        MethodFrameArgs::BasicPublish(args) => {
            fr.put_u16(0);
            encode_short_string(&mut fr, &args.exchange_name)?;
            encode_short_string(&mut fr, &args.routing_key)?;
            fr.put_u8(args.flags.bits());
        }
        MethodFrameArgs::BasicReturn(args) => {
            fr.put_u16(args.reply_code);
            encode_short_string(&mut fr, &args.reply_text)?;
            encode_short_string(&mut fr, &args.exchange_name)?;
            encode_short_string(&mut fr, &args.routing_key)?;
        }
        MethodFrameArgs::BasicDeliver(args) => {
            encode_short_string(&mut fr, &args.consumer_tag)?;
            fr.put_u64(args.delivery_tag);
            fr.put_u8(u8::from(args.redelivered));
            encode_short_string(&mut fr, &args.exchange_name)?;
            encode_short_string(&mut fr, &args.routing_key)?;
        }
        MethodFrameArgs::BasicAck(args) => {
            fr.put_u64(args.delivery_tag);
            fr.put_u8(u8::from(args.multiple));
        }
        MethodFrameArgs::BasicReject(args) => {
            fr.put_u64(args.delivery_tag);
            fr.put_u8(u8::from(args.requeue));
        }
        MethodFrameArgs::BasicRecoverAsync(args) | MethodFrameArgs::BasicRecover(args) => {
            fr.put_u8(u8::from(args.requeue))
        }
        MethodFrameArgs::BasicNack(args) => {
            fr.put_u64(args.delivery_tag);
            fr.put_u8(args.flags.bits());
        }
        MethodFrameArgs::ConfirmSelect(args) => fr.put_u8(u8::from(args.no_wait)),
        MethodFrameArgs::ConnectionCloseOk
        | MethodFrameArgs::ConnectionUnblocked
        | MethodFrameArgs::ChannelCloseOk
        | MethodFrameArgs::ExchangeDeclareOk
        | MethodFrameArgs::ExchangeDeleteOk
        | MethodFrameArgs::ExchangeBindOk
        | MethodFrameArgs::ExchangeUnbindOk
        | MethodFrameArgs::QueueBindOk
        | MethodFrameArgs::QueueUnbindOk
        | MethodFrameArgs::BasicQosOk
        | MethodFrameArgs::BasicRecoverOk
        | MethodFrameArgs::ConfirmSelectOk => (),
    }

    buf.put_u8(FRAME_METHOD_FRAME);
    buf.put_u16(channel);
    buf.put_u32(fr.len() as u32);
    buf.put(fr);
    buf.put_u8(FRAME_END);

    Ok(())
}

fn encode_content_header_frame(buf: &mut BytesMut, hf: &ContentHeaderFrame) -> crate::Result<()> {
    let props = &hf.properties;
    let mut fr_buf = BytesMut::with_capacity(256);

    fr_buf.put_u16(hf.class_id);
    fr_buf.put_u16(hf.weight);
    fr_buf.put_u64(hf.body_size);
    fr_buf.put_u16(props.flags().bits());

    if let Some(ref s) = props.content_type {
        encode_short_string(&mut fr_buf, s)?;
    }
    if let Some(ref s) = props.content_encoding {
        encode_short_string(&mut fr_buf, s)?;
    }
    if let Some(ref headers) = props.headers {
        encode_field_table(&mut fr_buf, headers)?;
    }
    if let Some(mode) = props.delivery_mode {
        fr_buf.put_u8(mode);
    }
    if let Some(priority) = props.priority {
        fr_buf.put_u8(priority);
    }
    if let Some(ref s) = props.correlation_id {
        encode_short_string(&mut fr_buf, s)?;
    }
    if let Some(ref s) = props.reply_to {
        encode_short_string(&mut fr_buf, s)?;
    }
    if let Some(ref s) = props.expiration {
        encode_short_string(&mut fr_buf, s)?;
    }
    if let Some(ref s) = props.message_id {
        encode_short_string(&mut fr_buf, s)?;
    }
    if let Some(timestamp) = props.timestamp {
        fr_buf.put_u64(timestamp);
    }
    if let Some(ref s) = props.message_type {
        encode_short_string(&mut fr_buf, s)?;
    }
    if let Some(ref s) = props.user_id {
        encode_short_string(&mut fr_buf, s)?;
    }
    if let Some(ref s) = props.app_id {
        encode_short_string(&mut fr_buf, s)?;
    }
    if let Some(ref s) = props.cluster_id {
        encode_short_string(&mut fr_buf, s)?;
    }

    buf.put_u8(FRAME_CONTENT_HEADER);
    buf.put_u16(hf.channel);
    buf.put_u32(fr_buf.len() as u32);
    buf.put(fr_buf);
    buf.put_u8(FRAME_END);

    Ok(())
}

fn encode_content_body_frame(buf: &mut BytesMut, bf: &ContentBodyFrame) {
    buf.reserve(bf.body.len() + FRAME_OVERHEAD);
    buf.put_u8(FRAME_CONTENT_BODY);
    buf.put_u16(bf.channel);
    buf.put_u32(bf.body.len() as u32);
    buf.put_slice(&bf.body);
    buf.put_u8(FRAME_END);
}

fn encode_heartbeat_frame(buf: &mut BytesMut, channel: Channel) {
    buf.put_u8(FRAME_HEARTBEAT);
    buf.put_u16(channel);
    buf.put_u32(0);
    buf.put_u8(FRAME_END);
}

fn encode_short_string(buf: &mut BytesMut, s: &str) -> crate::Result<()> {
    if s.len() > u8::MAX as usize {
        return frame_error!(
            SYNTAX_ERROR,
            format!("Short string is longer than 255 bytes: {}", s.len())
        );
    }

    buf.put_u8(s.len() as u8);
    buf.put(s.as_bytes());

    Ok(())
}

fn encode_long_string(buf: &mut BytesMut, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put(s.as_bytes());
}

fn encode_field_table(buf: &mut BytesMut, ft: &FieldTable) -> crate::Result<()> {
    let mut ft_buf = BytesMut::with_capacity(256);

    for entry in ft {
        encode_short_string(&mut ft_buf, &entry.key)?;
        encode_value(&mut ft_buf, &entry.value)?;
    }

    buf.put_u32(ft_buf.len() as u32);
    buf.put(ft_buf);

    Ok(())
}

fn encode_field_array(buf: &mut BytesMut, values: &[FieldValue]) -> crate::Result<()> {
    let mut array_buf = BytesMut::with_capacity(64);

    for value in values {
        encode_value(&mut array_buf, value)?;
    }

    buf.put_u32(array_buf.len() as u32);
    buf.put(array_buf);

    Ok(())
}

fn encode_value(buf: &mut BytesMut, value: &FieldValue) -> crate::Result<()> {
    buf.put_u8(value.tag());

    match value {
        FieldValue::Bool(v) => buf.put_u8(u8::from(*v)),
        FieldValue::I8(v) => buf.put_i8(*v),
        FieldValue::U8(v) => buf.put_u8(*v),
        FieldValue::I16(v) => buf.put_i16(*v),
        FieldValue::U16(v) => buf.put_u16(*v),
        FieldValue::I32(v) => buf.put_i32(*v),
        FieldValue::U32(v) => buf.put_u32(*v),
        FieldValue::I64(v) => buf.put_i64(*v),
        FieldValue::U64(v) => buf.put_u64(*v),
        FieldValue::F32(v) => buf.put_f32(*v),
        FieldValue::F64(v) => buf.put_f64(*v),
        FieldValue::Decimal(d) => {
            buf.put_u8(d.scale);
            buf.put_u32(d.value);
        }
        FieldValue::String(s) => encode_long_string(buf, s),
        FieldValue::Bytes(b) => {
            buf.put_u32(b.len() as u32);
            buf.put_slice(b);
        }
        FieldValue::Array(values) => encode_field_array(buf, values)?,
        FieldValue::Table(table) => encode_field_table(buf, table)?,
        FieldValue::Timestamp(t) => buf.put_u64(*t),
        FieldValue::Void => (),
    }

    Ok(())
}
