use crate::clock::Clock;
use crate::message::{Envelope, Message};
use crate::model::ChannelNumber;
use crate::options::ConnectionOptions;
use crate::transport::{LoginParams, RpcReply, Status, Transport, Tune};
use crate::Connection;
use bytes::Bytes;
use rabbitwire_codec::frame::{AMQPFrame, BasicAckArgs, BasicProperties, BasicPublishArgs, MethodFrameArgs};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// A clock which only moves when it is told to, it can go backwards too.
#[derive(Clone)]
pub(crate) struct ManualClock {
    base: Instant,
    offset_ms: Arc<AtomicI64>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        ManualClock {
            base: Instant::now() + Duration::from_secs(3600),
            offset_ms: Arc::new(AtomicI64::new(0)),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        self.offset_ms.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }

    pub(crate) fn rewind(&self, by: Duration) {
        self.offset_ms.fetch_sub(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = self.offset_ms.load(Ordering::SeqCst);

        if offset >= 0 {
            self.base + Duration::from_millis(offset as u64)
        } else {
            self.base - Duration::from_millis(offset.unsigned_abs())
        }
    }
}

pub(crate) struct Published {
    pub channel: ChannelNumber,
    pub args: BasicPublishArgs,
    pub properties: BasicProperties,
    pub body: Bytes,
}

/// Scripted answers of the mock and the record of what it was asked.
pub(crate) struct MockState {
    pub handshake_status: Status,
    pub handshake_timeout: Option<Duration>,
    pub login_reply: RpcReply,
    pub login_vhost: Option<String>,
    pub tune: Tune,
    /// Answers of `call`, `(None, Normal)` when empty.
    pub call_replies: VecDeque<(Option<MethodFrameArgs>, RpcReply)>,
    pub calls: Vec<(ChannelNumber, MethodFrameArgs)>,
    pub send_status: Status,
    pub sent: Vec<(ChannelNumber, MethodFrameArgs)>,
    pub publish_status: Status,
    pub published: Vec<Published>,
    /// Answers of `consume_message`, a timeout when empty.
    pub deliveries: VecDeque<Result<Envelope, RpcReply>>,
    pub consume_timeouts: Vec<Option<Duration>>,
    /// Answers of `wait_frame`, a timeout when empty.
    pub frames: VecDeque<Result<AMQPFrame, Status>>,
    pub frame_timeouts: Vec<Option<Duration>>,
    pub messages: VecDeque<Result<Message, RpcReply>>,
    pub released: Vec<Option<ChannelNumber>>,
    pub rpc_timeout: Option<Duration>,
    pub rpc_timeout_status: Status,
    pub last_reply: RpcReply,
    pub closed: bool,
    /// Time passing in every `consume_message`.
    pub consume_takes: Duration,
    /// Clock adjustment backwards in every `consume_message`.
    pub consume_rewinds: Duration,
    pub clock: ManualClock,
}

impl MockState {
    fn new(clock: ManualClock) -> Self {
        MockState {
            handshake_status: Status::Ok,
            handshake_timeout: None,
            login_reply: RpcReply::Normal,
            login_vhost: None,
            tune: Tune {
                channel_max: 2047,
                frame_max: 131072,
                heartbeat: 0,
            },
            call_replies: VecDeque::new(),
            calls: vec![],
            send_status: Status::Ok,
            sent: vec![],
            publish_status: Status::Ok,
            published: vec![],
            deliveries: VecDeque::new(),
            consume_timeouts: vec![],
            frames: VecDeque::new(),
            frame_timeouts: vec![],
            messages: VecDeque::new(),
            released: vec![],
            rpc_timeout: None,
            rpc_timeout_status: Status::Ok,
            last_reply: RpcReply::None,
            closed: false,
            consume_takes: Duration::ZERO,
            consume_rewinds: Duration::ZERO,
            clock,
        }
    }

    pub(crate) fn reply(&mut self, args: Option<MethodFrameArgs>, reply: RpcReply) -> &mut Self {
        self.call_replies.push_back((args, reply));
        self
    }

    /// A non-delivery frame which arrives in the second wait.
    pub(crate) fn frame(&mut self, frame: AMQPFrame) -> &mut Self {
        self.deliveries
            .push_back(Err(RpcReply::LibraryException(Status::UnexpectedState)));
        self.frames.push_back(Ok(frame));
        self
    }

    pub(crate) fn ack(&mut self, channel: ChannelNumber, delivery_tag: u64, multiple: bool) -> &mut Self {
        let args = BasicAckArgs::default().delivery_tag(delivery_tag).multiple(multiple);

        self.frame(MethodFrameArgs::BasicAck(args).frame(channel))
    }

    pub(crate) fn deliver(&mut self, channel: ChannelNumber, delivery_tag: u64, body: &'static str) -> &mut Self {
        self.deliveries.push_back(Ok(envelope(channel, delivery_tag, body)));
        self
    }

    pub(crate) fn calls_of(&self, class_method: u32) -> Vec<&(ChannelNumber, MethodFrameArgs)> {
        self.calls
            .iter()
            .filter(|(_, args)| args.class_method() == class_method)
            .collect()
    }
}

pub(crate) fn envelope(channel: ChannelNumber, delivery_tag: u64, body: &'static str) -> Envelope {
    Envelope {
        channel,
        consumer_tag: "ctag".to_string(),
        delivery_tag,
        exchange: "events".to_string(),
        routing_key: "orders.created".to_string(),
        message: Message::new(body, BasicProperties::default()),
        ..Default::default()
    }
}

#[derive(Clone)]
pub(crate) struct MockTransport(Arc<Mutex<MockState>>);

impl MockTransport {
    pub(crate) fn new() -> (Self, ManualClock) {
        let clock = ManualClock::new();

        (
            MockTransport(Arc::new(Mutex::new(MockState::new(clock.clone())))),
            clock,
        )
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, MockState> {
        self.0.lock().unwrap()
    }
}

impl Transport for MockTransport {
    fn set_handshake_timeout(&mut self, timeout: Duration) -> Status {
        let mut state = self.state();

        state.handshake_timeout = Some(timeout);
        state.handshake_status
    }

    fn login(&mut self, params: &LoginParams<'_>) -> RpcReply {
        let mut state = self.state();

        state.login_vhost = Some(params.virtual_host.to_string());
        state.last_reply = state.login_reply.clone();
        state.last_reply.clone()
    }

    fn call(&mut self, channel: ChannelNumber, method: MethodFrameArgs) -> Option<MethodFrameArgs> {
        let mut state = self.state();

        state.calls.push((channel, method));

        let (value, reply) = state.call_replies.pop_front().unwrap_or((None, RpcReply::Normal));
        state.last_reply = reply;

        value
    }

    fn send(&mut self, channel: ChannelNumber, method: MethodFrameArgs) -> Status {
        let mut state = self.state();

        state.sent.push((channel, method));
        state.last_reply = if state.send_status.is_ok() {
            RpcReply::Normal
        } else {
            RpcReply::LibraryException(state.send_status)
        };

        state.send_status
    }

    fn publish(
        &mut self,
        channel: ChannelNumber,
        args: BasicPublishArgs,
        properties: &BasicProperties,
        body: Bytes,
    ) -> Status {
        let mut state = self.state();

        state.published.push(Published {
            channel,
            args,
            properties: properties.clone(),
            body,
        });
        state.last_reply = RpcReply::Normal;

        state.publish_status
    }

    fn last_rpc_reply(&self) -> RpcReply {
        self.state().last_reply.clone()
    }

    fn consume_message(&mut self, timeout: Option<Duration>) -> Result<Envelope, RpcReply> {
        let mut state = self.state();

        state.consume_timeouts.push(timeout);
        state.clock.advance(state.consume_takes);
        state.clock.rewind(state.consume_rewinds);

        state
            .deliveries
            .pop_front()
            .unwrap_or(Err(RpcReply::LibraryException(Status::Timeout)))
    }

    fn wait_frame(&mut self, timeout: Option<Duration>) -> Result<AMQPFrame, Status> {
        let mut state = self.state();

        state.frame_timeouts.push(timeout);
        state.frames.pop_front().unwrap_or(Err(Status::Timeout))
    }

    fn read_message(&mut self, _channel: ChannelNumber) -> Result<Message, RpcReply> {
        let mut state = self.state();

        let message = state
            .messages
            .pop_front()
            .unwrap_or(Err(RpcReply::LibraryException(Status::UnexpectedState)));

        state.last_reply = match &message {
            Ok(_) => RpcReply::Normal,
            Err(reply) => reply.clone(),
        };

        message
    }

    fn release_buffers(&mut self, channel: Option<ChannelNumber>) {
        self.state().released.push(channel);
    }

    fn rpc_timeout(&self) -> Option<Duration> {
        self.state().rpc_timeout
    }

    fn set_rpc_timeout(&mut self, timeout: Option<Duration>) -> Status {
        let mut state = self.state();

        if state.rpc_timeout_status.is_ok() {
            state.rpc_timeout = timeout;
        }

        state.rpc_timeout_status
    }

    fn tune(&self) -> Tune {
        self.state().tune
    }

    fn close(&mut self) {
        self.state().closed = true;
    }
}

/// A logged in connection over a fresh mock, the clock of the connection is the mock's clock.
pub(crate) fn connect() -> (Connection, MockTransport, ManualClock) {
    let (transport, clock) = MockTransport::new();

    let connection = Connection::with_transport(Box::new(transport.clone()), &ConnectionOptions::default())
        .unwrap()
        .with_clock(clock.clone());

    (connection, transport, clock)
}
