use super::{LoginParams, RpcReply, Status, Transport, Tune};
use crate::message::{Envelope, Message};
use crate::model::{ChannelNumber, ClassMethod};
use crate::options::Credentials;
use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, trace, warn};
use rabbitwire_codec::codec::{AMQPCodec, Frame, FRAME_OVERHEAD};
use rabbitwire_codec::frame::{
    self, AMQPFrame, BasicProperties, BasicPublishArgs, ConnectionOpenArgs, ConnectionStartOkArgs,
    ConnectionTuneOkArgs, ContentBodyFrame, ContentHeaderFrame, FieldTable, MethodFrameArgs,
};
use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio_util::codec::Framed;

/// Read buffers above this capacity are given back when they are drained.
const RELEASE_THRESHOLD: usize = 256 * 1024;

/// How long a silent socket is read for before a missed heartbeat is reported.
const DRAIN_WINDOW: Duration = Duration::from_millis(10);

struct Heartbeat {
    interval: Duration,
    last_sent: Instant,
    last_received: Instant,
}

impl Heartbeat {
    fn send_due(&self) -> Instant {
        self.last_sent + self.interval
    }

    /// Two missed heartbeats mean a dead peer.
    fn receive_deadline(&self) -> Instant {
        self.last_received + self.interval * 2
    }
}

/// Blocking transport over a TCP socket.
///
/// The socket is driven by a current thread tokio runtime owned by the transport, every
/// primitive blocks on it until a frame arrives or the timeout expires.
pub struct TcpTransport {
    runtime: Runtime,
    framed: Option<Framed<TcpStream, AMQPCodec>>,
    /// Frames received while waiting for something else, in arrival order.
    pending: VecDeque<AMQPFrame>,
    last_reply: RpcReply,
    handshake_timeout: Option<Duration>,
    rpc_timeout: Option<Duration>,
    tune: Tune,
    heartbeat: Option<Heartbeat>,
}

impl TcpTransport {
    /// Connects to the broker, it doesn't send anything yet.
    pub fn open(address: &str, port: u16, timeout: Duration) -> Result<Self, Status> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                error!("Cannot build socket runtime {:?}", e);

                Status::TimerFailure
            })?;

        let connect = runtime.block_on(async { tokio::time::timeout(timeout, TcpStream::connect((address, port))).await });

        let stream = match connect {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                error!("Cannot connect to {}:{} {:?}", address, port, e);

                return Err(Status::SocketError);
            }
            Err(_) => {
                error!("Connecting to {}:{} timed out after {:?}", address, port, timeout);

                return Err(Status::Timeout);
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Cannot set TCP_NODELAY {:?}", e);
        }

        debug!("Socket connected to {}:{}", address, port);

        Ok(TcpTransport {
            runtime,
            framed: Some(Framed::new(stream, AMQPCodec::default())),
            pending: VecDeque::new(),
            last_reply: RpcReply::None,
            handshake_timeout: None,
            rpc_timeout: None,
            tune: Tune::default(),
            heartbeat: None,
        })
    }

    fn send_frames(&mut self, frames: Vec<AMQPFrame>) -> Status {
        let Some(framed) = self.framed.as_mut() else {
            return Status::SocketClosed;
        };

        for f in &frames {
            trace!("Outgoing frame {:?}", f);
        }

        match self.runtime.block_on(framed.send(Frame::Frames(frames))) {
            Ok(()) => {
                if let Some(hb) = self.heartbeat.as_mut() {
                    hb.last_sent = Instant::now();
                }

                Status::Ok
            }
            Err(e) => {
                error!("Error sending frames {:?}", e);

                status_of_io(&e)
            }
        }
    }

    /// Reads the next frame from the socket. Heartbeats are sent and swallowed here.
    ///
    /// When the server has been silent for two intervals, frames already sitting in the socket
    /// are read before the connection is declared dead.
    fn recv_frame(&mut self, timeout: Option<Duration>) -> Result<AMQPFrame, Status> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let now = Instant::now();

            let (silent, send_due) = match &self.heartbeat {
                Some(hb) => (now >= hb.receive_deadline(), now >= hb.send_due()),
                None => (false, false),
            };

            if send_due {
                let status = self.send_frames(vec![frame::heartbeat()]);

                if !status.is_ok() {
                    return Err(status);
                }
            }

            let wake_up = if silent {
                Some(now + DRAIN_WINDOW)
            } else {
                [
                    deadline,
                    self.heartbeat.as_ref().map(|hb| hb.send_due().min(hb.receive_deadline())),
                ]
                .into_iter()
                .flatten()
                .min()
            };

            let Some(framed) = self.framed.as_mut() else {
                return Err(Status::SocketClosed);
            };

            let next = match wake_up {
                Some(at) => {
                    let wait = at.saturating_duration_since(now);

                    match self.runtime.block_on(async { tokio::time::timeout(wait, framed.next()).await }) {
                        Ok(next) => next,
                        Err(_) => {
                            if silent {
                                if let Some(hb) = &self.heartbeat {
                                    error!("No heartbeat from server for {:?}", hb.last_received.elapsed());
                                }

                                return Err(Status::HeartbeatTimeout);
                            }

                            if deadline.is_some_and(|d| Instant::now() >= d) {
                                return Err(Status::Timeout);
                            }

                            continue;
                        }
                    }
                }
                None => self.runtime.block_on(framed.next()),
            };

            match next {
                Some(Ok(Frame::Frame(f))) => {
                    if let Some(hb) = self.heartbeat.as_mut() {
                        hb.last_received = Instant::now();
                    }

                    trace!("Incoming frame {:?}", f);

                    match f {
                        AMQPFrame::Heartbeat(_) => continue,
                        AMQPFrame::Method(_, frame::CONNECTION_BLOCKED, MethodFrameArgs::ConnectionBlocked(args)) => {
                            warn!("Connection is blocked by the server: {}", args.reason);
                        }
                        AMQPFrame::Method(_, frame::CONNECTION_UNBLOCKED, _) => {
                            info!("Connection is unblocked");
                        }
                        other => return Ok(self.answer_close(other)),
                    }
                }
                Some(Ok(Frame::Frames(_))) => {
                    error!("Decoder returned a frame batch");

                    return Err(Status::BadAmqpData);
                }
                Some(Err(e)) => {
                    error!("Error reading frame {:?}", e);

                    return Err(status_of_io(&e));
                }
                None => {
                    debug!("Server closed the socket");

                    return Err(Status::ConnectionClosed);
                }
            }
        }
    }

    /// A close from the server needs a close-ok before anything else happens on the channel.
    fn answer_close(&mut self, f: AMQPFrame) -> AMQPFrame {
        match &f {
            AMQPFrame::Method(channel, frame::CHANNEL_CLOSE, MethodFrameArgs::ChannelClose(args)) => {
                warn!("Server closed channel {} {} {}", channel, args.code, args.text);

                let status = self.send_frames(vec![frame::channel_close_ok(*channel)]);
                if !status.is_ok() {
                    warn!("Cannot send channel close-ok {}", status);
                }

                let closed = *channel;
                self.pending.retain(|p| p.channel() != Some(closed));
            }
            AMQPFrame::Method(_, frame::CONNECTION_CLOSE, MethodFrameArgs::ConnectionClose(args)) => {
                warn!("Server closed the connection {} {}", args.code, args.text);

                let status = self.send_frames(vec![frame::connection_close_ok()]);
                if !status.is_ok() {
                    warn!("Cannot send connection close-ok {}", status);
                }
            }
            _ => (),
        }

        f
    }

    fn next_frame(&mut self, timeout: Option<Duration>) -> Result<AMQPFrame, Status> {
        match self.pending.pop_front() {
            Some(f) => Ok(f),
            None => self.recv_frame(timeout),
        }
    }

    /// Waits for the first frame matching `pred`, the others are queued.
    fn wait_for(&mut self, timeout: Option<Duration>, pred: impl Fn(&AMQPFrame) -> bool) -> Result<AMQPFrame, Status> {
        if let Some(f) = self.pending.iter().position(&pred).and_then(|pos| self.pending.remove(pos)) {
            return Ok(f);
        }

        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            let f = self.recv_frame(remaining)?;

            if pred(&f) {
                return Ok(f);
            }

            trace!("Queueing frame {:?}", f);

            self.pending.push_back(f);
        }
    }

    fn handshake(&mut self, params: &LoginParams<'_>) -> Result<(), RpcReply> {
        let timeout = self.handshake_timeout;

        check(self.send_frames(vec![AMQPFrame::Header]))?;

        let start = match self.next_frame(timeout).map_err(RpcReply::LibraryException)? {
            AMQPFrame::Method(_, _, MethodFrameArgs::ConnectionStart(args)) => args,
            AMQPFrame::Header => return Err(RpcReply::LibraryException(Status::IncompatibleAmqpVersion)),
            other => return Err(unexpected(other)),
        };

        if (start.version_major, start.version_minor) != (0, 9) {
            error!("Server speaks AMQP {}.{}", start.version_major, start.version_minor);

            return Err(RpcReply::LibraryException(Status::IncompatibleAmqpVersion));
        }

        let start_ok = match params.credentials {
            Credentials::Plain { username, password } => ConnectionStartOkArgs::new(username, password),
            Credentials::External { identity } => ConnectionStartOkArgs::external(identity),
        };

        if !start.supports_mechanism(&start_ok.mechanism) {
            error!("Server mechanisms {} don't include {}", start.mechanisms, start_ok.mechanism);

            return Err(RpcReply::LibraryException(Status::BrokerUnsupportedSaslMethod));
        }

        let start_ok = start_ok.properties(client_properties(params.properties));

        check(self.send_frames(vec![start_ok.frame()]))?;

        let server_tune = match self.next_frame(timeout).map_err(RpcReply::LibraryException)? {
            AMQPFrame::Method(_, _, MethodFrameArgs::ConnectionTune(args)) => args,
            AMQPFrame::Method(_, _, args @ MethodFrameArgs::ConnectionClose(_)) => {
                return Err(RpcReply::ServerException(args))
            }
            other => return Err(unexpected(other)),
        };

        let tune = Tune {
            channel_max: negotiate(params.channel_max.into(), server_tune.channel_max.into()) as u16,
            frame_max: negotiate(params.frame_max, server_tune.frame_max),
            heartbeat: if server_tune.heartbeat != 0 && server_tune.heartbeat < params.heartbeat {
                server_tune.heartbeat
            } else {
                params.heartbeat
            },
        };

        debug!("Server tune {:?}, negotiated {:?}", server_tune, tune);

        let tune_ok = ConnectionTuneOkArgs {
            channel_max: tune.channel_max,
            frame_max: tune.frame_max,
            heartbeat: tune.heartbeat,
        };

        check(self.send_frames(vec![tune_ok.frame()]))?;

        self.tune = tune;

        if let Some(framed) = self.framed.as_mut() {
            framed.codec_mut().set_max_frame(tune.frame_max);
        }

        if tune.heartbeat > 0 {
            let now = Instant::now();

            self.heartbeat = Some(Heartbeat {
                interval: Duration::from_secs(tune.heartbeat.into()),
                last_sent: now,
                last_received: now,
            });
        }

        let open = ConnectionOpenArgs::default().virtual_host(params.virtual_host);

        check(self.send_frames(vec![open.frame()]))?;

        match self.next_frame(timeout).map_err(RpcReply::LibraryException)? {
            AMQPFrame::Method(_, frame::CONNECTION_OPEN_OK, _) => Ok(()),
            AMQPFrame::Method(_, _, args @ MethodFrameArgs::ConnectionClose(_)) => Err(RpcReply::ServerException(args)),
            other => Err(unexpected(other)),
        }
    }
}

impl Transport for TcpTransport {
    fn set_handshake_timeout(&mut self, timeout: Duration) -> Status {
        if timeout.is_zero() {
            return Status::InvalidParameter;
        }

        self.handshake_timeout = Some(timeout);

        Status::Ok
    }

    fn login(&mut self, params: &LoginParams<'_>) -> RpcReply {
        self.last_reply = match self.handshake(params) {
            Ok(()) => RpcReply::Normal,
            Err(reply) => reply,
        };

        self.last_reply.clone()
    }

    fn call(&mut self, channel: ChannelNumber, method: MethodFrameArgs) -> Option<MethodFrameArgs> {
        let cm = method.class_method();
        let expected = reply_methods(cm);

        debug!("Call {} on channel {}", frame::method_name(cm), channel);

        let status = self.send_frames(vec![method.frame(channel)]);

        if !status.is_ok() {
            self.last_reply = RpcReply::LibraryException(status);

            return None;
        }

        if expected.is_empty() {
            self.last_reply = RpcReply::Normal;

            return None;
        }

        let timeout = self.rpc_timeout;

        match self.wait_for(timeout, |f| is_reply(f, channel, expected)) {
            Ok(AMQPFrame::Method(_, reply_cm, args)) if expected.contains(&reply_cm) => {
                if cm == frame::CHANNEL_CLOSE {
                    self.pending.retain(|p| p.channel() != Some(channel));
                }

                self.last_reply = RpcReply::Normal;

                Some(args)
            }
            Ok(AMQPFrame::Method(_, _, args)) => {
                self.last_reply = RpcReply::ServerException(args);

                None
            }
            Ok(_) => {
                self.last_reply = RpcReply::LibraryException(Status::UnexpectedState);

                None
            }
            Err(status) => {
                self.last_reply = RpcReply::LibraryException(status);

                None
            }
        }
    }

    fn send(&mut self, channel: ChannelNumber, method: MethodFrameArgs) -> Status {
        trace!("Send {} on channel {}", frame::method_name(method.class_method()), channel);

        let status = self.send_frames(vec![method.frame(channel)]);

        self.last_reply = if status.is_ok() {
            RpcReply::Normal
        } else {
            RpcReply::LibraryException(status)
        };

        status
    }

    fn publish(
        &mut self,
        channel: ChannelNumber,
        args: BasicPublishArgs,
        properties: &BasicProperties,
        body: Bytes,
    ) -> Status {
        let max_body = match self.tune.frame_max {
            0 => usize::MAX,
            max => (max as usize).saturating_sub(FRAME_OVERHEAD).max(1),
        };

        let mut frames = vec![
            MethodFrameArgs::BasicPublish(args).frame(channel),
            ContentHeaderFrame::new(channel, body.len() as u64, properties.clone()).frame(),
        ];

        let mut rest = body;

        while !rest.is_empty() {
            let chunk = rest.split_to(std::cmp::min(max_body, rest.len()));

            frames.push(ContentBodyFrame { channel, body: chunk }.frame());
        }

        // The write result is reported as the publish status, the exchange itself stays normal.
        self.last_reply = RpcReply::Normal;

        self.send_frames(frames)
    }

    fn last_rpc_reply(&self) -> RpcReply {
        self.last_reply.clone()
    }

    fn consume_message(&mut self, timeout: Option<Duration>) -> Result<Envelope, RpcReply> {
        self.release_buffers(None);

        let f = self.next_frame(timeout).map_err(RpcReply::LibraryException)?;

        match f {
            AMQPFrame::Method(channel, frame::BASIC_DELIVER, MethodFrameArgs::BasicDeliver(args)) => {
                let message = self.read_message(channel)?;

                Ok(Envelope {
                    channel,
                    consumer_tag: args.consumer_tag,
                    delivery_tag: args.delivery_tag,
                    redelivered: args.redelivered,
                    exchange: args.exchange_name,
                    routing_key: args.routing_key,
                    message,
                })
            }
            other => {
                self.pending.push_front(other);

                Err(RpcReply::LibraryException(Status::UnexpectedState))
            }
        }
    }

    fn wait_frame(&mut self, timeout: Option<Duration>) -> Result<AMQPFrame, Status> {
        self.next_frame(timeout)
    }

    fn read_message(&mut self, channel: ChannelNumber) -> Result<Message, RpcReply> {
        let timeout = self.rpc_timeout;
        let on_channel = |f: &AMQPFrame| !matches!(f, AMQPFrame::Header) && f.channel() == Some(channel);

        let header = match self.wait_for(timeout, on_channel).map_err(RpcReply::LibraryException)? {
            AMQPFrame::ContentHeader(header) => header,
            other => {
                error!("Expected content header on channel {}, got {:?}", channel, other);
                self.pending.push_front(other);

                return Err(RpcReply::LibraryException(Status::UnexpectedState));
            }
        };

        let mut parts: Vec<Bytes> = vec![];
        let mut received = 0u64;

        while received < header.body_size {
            match self.wait_for(timeout, on_channel).map_err(RpcReply::LibraryException)? {
                AMQPFrame::ContentBody(part) => {
                    received += part.body.len() as u64;
                    parts.push(part.body);
                }
                other => {
                    error!("Expected content body on channel {}, got {:?}", channel, other);

                    return Err(RpcReply::LibraryException(Status::BadAmqpData));
                }
            }
        }

        if received > header.body_size {
            return Err(RpcReply::LibraryException(Status::BadAmqpData));
        }

        let body = match parts.len() {
            0 => Bytes::new(),
            1 => parts.remove(0),
            _ => {
                let mut joined = BytesMut::with_capacity(received as usize);
                for part in parts {
                    joined.extend_from_slice(&part);
                }

                joined.freeze()
            }
        };

        self.last_reply = RpcReply::Normal;

        Ok(Message::new(body, header.properties))
    }

    fn release_buffers(&mut self, channel: Option<ChannelNumber>) {
        let queued = match channel {
            Some(ch) => self.pending.iter().any(|f| f.channel() == Some(ch)),
            None => !self.pending.is_empty(),
        };

        if queued {
            return;
        }

        if self.pending.is_empty() {
            self.pending.shrink_to_fit();
        }

        if let Some(framed) = self.framed.as_mut() {
            let buf = framed.read_buffer_mut();

            if buf.is_empty() && buf.capacity() > RELEASE_THRESHOLD {
                *buf = BytesMut::new();
            }
        }
    }

    fn rpc_timeout(&self) -> Option<Duration> {
        self.rpc_timeout
    }

    fn set_rpc_timeout(&mut self, timeout: Option<Duration>) -> Status {
        if timeout.is_some_and(|t| t.is_zero()) {
            return Status::InvalidParameter;
        }

        self.rpc_timeout = timeout;

        Status::Ok
    }

    fn tune(&self) -> Tune {
        self.tune
    }

    fn close(&mut self) {
        if let Some(mut framed) = self.framed.take() {
            if let Err(e) = self.runtime.block_on(framed.get_mut().shutdown()) {
                debug!("Error shutting down the socket {:?}", e);
            }
        }

        self.pending.clear();
        self.heartbeat = None;
    }
}

fn check(status: Status) -> Result<(), RpcReply> {
    match status {
        Status::Ok => Ok(()),
        failed => Err(RpcReply::LibraryException(failed)),
    }
}

fn unexpected(f: AMQPFrame) -> RpcReply {
    error!("Unexpected frame during handshake {:?}", f);

    RpcReply::LibraryException(Status::UnexpectedState)
}

fn status_of_io(err: &io::Error) -> Status {
    match err.kind() {
        io::ErrorKind::InvalidData => Status::BadAmqpData,
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => Status::ConnectionClosed,
        io::ErrorKind::TimedOut => Status::Timeout,
        _ => Status::SocketError,
    }
}

/// Zero means no limit, otherwise the smaller value wins.
fn negotiate(client: u32, server: u32) -> u32 {
    if server != 0 && (client == 0 || server < client) {
        server
    } else {
        client
    }
}

fn client_properties(user: Option<&FieldTable>) -> FieldTable {
    let capabilities = FieldTable::new().with("authentication_failure_close", true);

    let defaults = FieldTable::new()
        .with("product", "rabbitwire")
        .with("version", env!("CARGO_PKG_VERSION"))
        .with("platform", "Rust")
        .with("capabilities", capabilities);

    let mut properties = user.cloned().unwrap_or_default();
    properties.merge_missing(&defaults);

    properties
}

/// The replies a synchronous method waits for.
fn reply_methods(cm: ClassMethod) -> &'static [ClassMethod] {
    match cm {
        frame::CONNECTION_CLOSE => &[frame::CONNECTION_CLOSE_OK],
        frame::CHANNEL_OPEN => &[frame::CHANNEL_OPEN_OK],
        frame::CHANNEL_FLOW => &[frame::CHANNEL_FLOW_OK],
        frame::CHANNEL_CLOSE => &[frame::CHANNEL_CLOSE_OK],
        frame::EXCHANGE_DECLARE => &[frame::EXCHANGE_DECLARE_OK],
        frame::EXCHANGE_DELETE => &[frame::EXCHANGE_DELETE_OK],
        frame::EXCHANGE_BIND => &[frame::EXCHANGE_BIND_OK],
        frame::EXCHANGE_UNBIND => &[frame::EXCHANGE_UNBIND_OK],
        frame::QUEUE_DECLARE => &[frame::QUEUE_DECLARE_OK],
        frame::QUEUE_BIND => &[frame::QUEUE_BIND_OK],
        frame::QUEUE_PURGE => &[frame::QUEUE_PURGE_OK],
        frame::QUEUE_DELETE => &[frame::QUEUE_DELETE_OK],
        frame::QUEUE_UNBIND => &[frame::QUEUE_UNBIND_OK],
        frame::BASIC_QOS => &[frame::BASIC_QOS_OK],
        frame::BASIC_CONSUME => &[frame::BASIC_CONSUME_OK],
        frame::BASIC_CANCEL => &[frame::BASIC_CANCEL_OK],
        frame::BASIC_GET => &[frame::BASIC_GET_OK, frame::BASIC_GET_EMPTY],
        frame::BASIC_RECOVER => &[frame::BASIC_RECOVER_OK],
        frame::CONFIRM_SELECT => &[frame::CONFIRM_SELECT_OK],
        _ => &[],
    }
}

fn is_reply(f: &AMQPFrame, channel: ChannelNumber, expected: &[ClassMethod]) -> bool {
    match f {
        AMQPFrame::Method(_, frame::CONNECTION_CLOSE, _) => true,
        AMQPFrame::Method(ch, cm, _) => *ch == channel && (expected.contains(cm) || *cm == frame::CHANNEL_CLOSE),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rabbitwire_codec::frame::{
        BasicAckArgs, BasicDeliverArgs, ChannelCloseArgs, ConnectionStartArgs, ConnectionTuneArgs,
    };
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};
    use tokio_util::codec::{Decoder, Encoder};

    /// Server side of a socket speaking frames with plain blocking IO.
    struct Broker {
        stream: std::net::TcpStream,
        codec: AMQPCodec,
        buf: BytesMut,
    }

    impl Broker {
        fn send(&mut self, frames: Vec<AMQPFrame>) {
            let mut out = BytesMut::new();
            self.codec.encode(Frame::Frames(frames), &mut out).unwrap();
            self.stream.write_all(&out).unwrap();
        }

        /// The next frame from the client, `None` once the client has gone.
        fn recv(&mut self) -> Option<AMQPFrame> {
            loop {
                if let Some(Frame::Frame(f)) = self.codec.decode(&mut self.buf).ok()? {
                    return Some(f);
                }

                let mut chunk = [0u8; 4096];
                match self.stream.read(&mut chunk) {
                    Ok(0) | Err(_) => return None,
                    Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                }
            }
        }

        fn recv_method(&mut self) -> AMQPFrame {
            loop {
                match self.recv() {
                    Some(AMQPFrame::Heartbeat(_)) => continue,
                    Some(f) => return f,
                    None => panic!("client closed the socket"),
                }
            }
        }

        fn handshake(&mut self, tune: ConnectionTuneArgs) {
            assert_eq!(self.recv(), Some(AMQPFrame::Header));
            self.send(vec![ConnectionStartArgs::new().frame()]);

            let start_ok = self.recv_method();
            assert!(matches!(start_ok, AMQPFrame::Method(0, frame::CONNECTION_START_OK, _)));
            self.send(vec![MethodFrameArgs::ConnectionTune(tune).frame(0)]);

            let tune_ok = self.recv_method();
            assert!(matches!(tune_ok, AMQPFrame::Method(0, frame::CONNECTION_TUNE_OK, _)));

            let open = self.recv_method();
            assert!(matches!(open, AMQPFrame::Method(0, frame::CONNECTION_OPEN, _)));
            self.send(vec![MethodFrameArgs::ConnectionOpenOk.frame(0)]);
        }
    }

    /// Starts a broker thread which runs `script` after the handshake, and logs a client in.
    fn start<F>(tune: ConnectionTuneArgs, client_heartbeat: u16, script: F) -> (TcpTransport, JoinHandle<()>)
    where
        F: FnOnce(&mut Broker) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut broker = Broker {
                stream,
                codec: AMQPCodec::default(),
                buf: BytesMut::new(),
            };

            broker.handshake(tune);
            script(&mut broker);
        });

        let mut transport = TcpTransport::open("127.0.0.1", port, Duration::from_secs(2)).unwrap();
        assert!(transport.set_handshake_timeout(Duration::from_secs(2)).is_ok());
        assert!(transport.set_rpc_timeout(Some(Duration::from_secs(2))).is_ok());

        let credentials = Credentials::plain("guest", "guest");
        let params = LoginParams {
            virtual_host: "/",
            channel_max: 0,
            frame_max: 0,
            heartbeat: client_heartbeat,
            credentials: &credentials,
            properties: None,
        };

        assert_eq!(transport.login(&params), RpcReply::Normal);

        (transport, handle)
    }

    fn tune(frame_max: u32, heartbeat: u16) -> ConnectionTuneArgs {
        ConnectionTuneArgs {
            channel_max: 2047,
            frame_max,
            heartbeat,
        }
    }

    fn ack(channel: ChannelNumber, delivery_tag: u64) -> AMQPFrame {
        MethodFrameArgs::BasicAck(BasicAckArgs::default().delivery_tag(delivery_tag)).frame(channel)
    }

    fn deliver(channel: ChannelNumber, delivery_tag: u64) -> AMQPFrame {
        let args = BasicDeliverArgs {
            consumer_tag: "ctag-1".to_string(),
            delivery_tag,
            exchange_name: "events".to_string(),
            routing_key: "orders.created".to_string(),
            ..Default::default()
        };

        MethodFrameArgs::BasicDeliver(args).frame(channel)
    }

    fn body(channel: ChannelNumber, text: &str) -> AMQPFrame {
        ContentBodyFrame {
            channel,
            body: Bytes::copy_from_slice(text.as_bytes()),
        }
        .frame()
    }

    fn is_ack(f: &AMQPFrame, channel: ChannelNumber, delivery_tag: u64) -> bool {
        matches!(f, AMQPFrame::Method(ch, frame::BASIC_ACK, MethodFrameArgs::BasicAck(args))
            if *ch == channel && args.delivery_tag == delivery_tag)
    }

    #[test]
    fn tune_sets_the_frame_limit_of_the_decoder() {
        let (transport, handle) = start(tune(4096, 0), 0, |_| ());

        assert_eq!(transport.tune().frame_max, 4096);
        assert_eq!(transport.framed.as_ref().map(|f| f.codec().max_frame()), Some(4096));

        handle.join().unwrap();
    }

    #[test]
    fn frame_put_back_by_consume_is_the_next_frame() {
        let (mut transport, handle) = start(tune(0, 0), 0, |broker| broker.send(vec![ack(1, 7)]));

        let res = transport.consume_message(Some(Duration::from_secs(2)));
        assert_eq!(res, Err(RpcReply::LibraryException(Status::UnexpectedState)));

        let f = transport.wait_frame(Some(Duration::from_secs(2))).unwrap();
        assert!(is_ack(&f, 1, 7));

        handle.join().unwrap();
    }

    #[test]
    fn other_channel_frames_are_queued_during_a_call() {
        let (mut transport, handle) = start(tune(0, 0), 0, |broker| {
            assert!(matches!(broker.recv_method(), AMQPFrame::Method(2, frame::CHANNEL_OPEN, _)));

            broker.send(vec![ack(1, 1), ack(3, 2), MethodFrameArgs::ChannelOpenOk.frame(2)]);
        });

        let reply = transport.call(2, MethodFrameArgs::ChannelOpen);
        assert_eq!(reply, Some(MethodFrameArgs::ChannelOpenOk));
        assert_eq!(transport.last_rpc_reply(), RpcReply::Normal);

        let first = transport.wait_frame(Some(Duration::from_secs(1))).unwrap();
        let second = transport.wait_frame(Some(Duration::from_secs(1))).unwrap();
        assert!(is_ack(&first, 1, 1));
        assert!(is_ack(&second, 3, 2));

        handle.join().unwrap();
    }

    #[test]
    fn server_channel_close_is_answered_and_drops_queued_frames() {
        let (mut transport, handle) = start(tune(0, 0), 0, |broker| {
            assert!(matches!(broker.recv_method(), AMQPFrame::Method(2, frame::CHANNEL_OPEN, _)));

            let close = ChannelCloseArgs {
                code: 404,
                text: "NOT_FOUND - no queue 'orders'".to_string(),
                class_id: 50,
                method_id: 10,
            };

            broker.send(vec![
                ack(1, 1),
                ack(3, 2),
                MethodFrameArgs::ChannelClose(close).frame(1),
                MethodFrameArgs::ChannelOpenOk.frame(2),
            ]);

            assert!(matches!(broker.recv_method(), AMQPFrame::Method(1, frame::CHANNEL_CLOSE_OK, _)));
        });

        assert_eq!(transport.call(2, MethodFrameArgs::ChannelOpen), Some(MethodFrameArgs::ChannelOpenOk));

        let first = transport.wait_frame(Some(Duration::from_secs(1))).unwrap();
        assert!(is_ack(&first, 3, 2));

        let second = transport.wait_frame(Some(Duration::from_secs(1))).unwrap();
        assert!(matches!(second, AMQPFrame::Method(1, frame::CHANNEL_CLOSE, _)));

        handle.join().unwrap();
    }

    #[test]
    fn delivery_body_is_joined_from_its_frames() {
        let (mut transport, handle) = start(tune(0, 0), 0, |broker| {
            broker.send(vec![
                deliver(1, 42),
                ContentHeaderFrame::new(1, 11, BasicProperties::default().content_type("text/plain")).frame(),
                body(1, "hello"),
                ack(2, 5),
                body(1, " wor"),
                body(1, "ld"),
            ]);
        });

        let envelope = transport.consume_message(Some(Duration::from_secs(2))).unwrap();

        assert_eq!(envelope.channel, 1);
        assert_eq!(envelope.delivery_tag, 42);
        assert_eq!(envelope.routing_key, "orders.created");
        assert_eq!(envelope.message.body_str(), Some("hello world"));
        assert_eq!(envelope.message.properties.content_type.as_deref(), Some("text/plain"));

        let queued = transport.wait_frame(Some(Duration::from_secs(1))).unwrap();
        assert!(is_ack(&queued, 2, 5));

        handle.join().unwrap();
    }

    #[test]
    fn publish_splits_the_body_at_the_frame_limit() {
        let (mut transport, handle) = start(tune(4096, 0), 0, |broker| {
            assert!(matches!(broker.recv_method(), AMQPFrame::Method(1, frame::BASIC_PUBLISH, _)));

            match broker.recv_method() {
                AMQPFrame::ContentHeader(header) => assert_eq!(header.body_size, 10000),
                other => panic!("expected content header, got {:?}", other),
            }

            let mut sizes = vec![];
            while sizes.iter().sum::<usize>() < 10000 {
                match broker.recv_method() {
                    AMQPFrame::ContentBody(part) => sizes.push(part.body.len()),
                    other => panic!("expected content body, got {:?}", other),
                }
            }

            assert_eq!(sizes, vec![4088, 4088, 1824]);
        });

        let args = BasicPublishArgs::new("events").routing_key("orders.created");
        let status = transport.publish(1, args, &BasicProperties::default(), Bytes::from(vec![b'x'; 10000]));
        assert_eq!(status, Status::Ok);

        handle.join().unwrap();
    }

    #[test]
    fn heartbeat_is_sent_while_waiting() {
        let (mut transport, handle) = start(tune(0, 1), 60, |broker| {
            assert_eq!(broker.recv(), Some(frame::heartbeat()));
            while broker.recv().is_some() {}
        });

        assert_eq!(transport.tune().heartbeat, 1);

        let res = transport.wait_frame(Some(Duration::from_millis(1500)));
        assert_eq!(res, Err(Status::Timeout));

        transport.close();
        handle.join().unwrap();
    }

    #[test]
    fn server_heartbeats_keep_the_connection_alive() {
        let (mut transport, handle) = start(tune(0, 1), 1, |broker| {
            for _ in 0..5 {
                thread::sleep(Duration::from_millis(500));
                broker.send(vec![frame::heartbeat()]);
            }

            while broker.recv().is_some() {}
        });

        let res = transport.wait_frame(Some(Duration::from_millis(3000)));
        assert_eq!(res, Err(Status::Timeout));

        transport.close();
        handle.join().unwrap();
    }

    #[test]
    fn silent_server_is_a_heartbeat_timeout() {
        let (mut transport, handle) = start(tune(0, 1), 1, |broker| while broker.recv().is_some() {});

        let started = Instant::now();
        let res = transport.wait_frame(Some(Duration::from_secs(10)));

        assert_eq!(res, Err(Status::HeartbeatTimeout));
        assert!(started.elapsed() < Duration::from_secs(5));

        transport.close();
        handle.join().unwrap();
    }

    #[test]
    fn frames_read_after_a_long_pause_are_not_a_heartbeat_timeout() {
        let (mut transport, handle) = start(tune(0, 1), 1, |broker| {
            broker.send(vec![ack(1, 9)]);

            for _ in 0..4 {
                thread::sleep(Duration::from_millis(500));
                broker.send(vec![frame::heartbeat()]);
            }

            while broker.recv().is_some() {}
        });

        thread::sleep(Duration::from_millis(2500));

        let f = transport.wait_frame(Some(Duration::from_millis(500))).unwrap();
        assert!(is_ack(&f, 1, 9));

        transport.close();
        handle.join().unwrap();
    }

    #[test]
    fn zero_means_no_limit_in_negotiation() {
        assert_eq!(negotiate(0, 2047), 2047);
        assert_eq!(negotiate(131072, 0), 131072);
        assert_eq!(negotiate(131072, 65536), 65536);
        assert_eq!(negotiate(4096, 131072), 4096);
    }

    #[test]
    fn user_properties_win_over_defaults() {
        let user = FieldTable::new().with("product", "billing");

        let properties = client_properties(Some(&user));

        assert_eq!(properties.get("product").and_then(|v| v.as_str()), Some("billing"));
        assert!(properties.get("capabilities").and_then(|v| v.as_table()).is_some());
    }

    #[test]
    fn close_of_the_connection_is_a_reply_on_any_channel() {
        let close = frame::connection_close(320, "forced", 0);
        let other_channel = frame::channel_close_ok(2);

        assert!(is_reply(&close, 1, reply_methods(frame::QUEUE_DECLARE)));
        assert!(!is_reply(&other_channel, 1, reply_methods(frame::CHANNEL_CLOSE)));
        assert!(is_reply(&frame::channel_close_ok(1), 1, reply_methods(frame::CHANNEL_CLOSE)));
    }

    #[test]
    fn unreachable_port_is_a_socket_error() {
        let res = TcpTransport::open("127.0.0.1", 1, Duration::from_secs(2));

        assert!(matches!(res, Err(Status::SocketError) | Err(Status::Timeout)));
    }
}
