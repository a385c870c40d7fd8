//! Waiting for deliveries, returned messages and publisher confirms.
//!
//! Every wait has a budget. The delivery wait and the wait for other frames share it, the second
//! one gets what the first one left. Non-blocking filters give up once the budget is spent, the
//! blocking ones wait until the kind they are looking for arrives.
use crate::clock::remaining;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::message::{Envelope, ReturnedMessage};
use crate::model::ChannelNumber;
use crate::transport::{RpcReply, Status, Transport};
use log::{debug, trace};
use rabbitwire_codec::frame::{self, AMQPFrame, MethodFrameArgs};
use std::time::Duration;

/// A publisher confirm.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Acknowledge {
    pub channel: ChannelNumber,
    pub delivery_tag: u64,
    /// Confirms every message up to and including `delivery_tag`.
    pub multiple: bool,
}

/// The outcome of one consume step.
#[derive(Debug, PartialEq)]
pub enum ConsumeResult {
    /// Nothing arrived within the budget.
    Timeout,
    Envelope(Envelope),
    Returned(ReturnedMessage),
    Acknowledge(Acknowledge),
}

impl Connection {
    /// Waits at most `timeout` for the next delivery, returned message or confirm.
    pub fn consume(&self, timeout: Duration) -> Result<ConsumeResult> {
        self.consume_step(Some(timeout))
    }

    /// Waits for the next delivery, returned message or confirm without a time limit. It can
    /// still return `Timeout` if the transport gives up on its own.
    pub fn consume_blocking(&self) -> Result<ConsumeResult> {
        self.consume_step(None)
    }

    fn consume_step(&self, timeout: Option<Duration>) -> Result<ConsumeResult> {
        let start = self.clock.now();
        let mut transport = self.transport.borrow_mut();

        match transport.consume_message(timeout) {
            Ok(envelope) if envelope.channel == 0 => Ok(ConsumeResult::Timeout),
            Ok(envelope) => {
                trace!(
                    "{}Delivery {} on channel {}",
                    self.context(),
                    envelope.delivery_tag,
                    envelope.channel
                );

                Ok(ConsumeResult::Envelope(envelope))
            }
            Err(RpcReply::LibraryException(Status::UnexpectedState)) => {
                let left = timeout.map(|t| remaining(t, start, self.clock.now()));
                let next = transport.wait_frame(left);

                self.dispatch_frame(&mut **transport, next)
            }
            Err(RpcReply::LibraryException(Status::Timeout)) => Ok(ConsumeResult::Timeout),
            Err(RpcReply::LibraryException(Status::SocketError)) => Err(Error::Socket {
                context: format!("{}Consumer: ", self.context()),
                status: Status::SocketError,
            }),
            Err(RpcReply::LibraryException(status)) => Err(Error::Rpc {
                context: self.context().to_string(),
                reason: format!("Consumer: Received an unhandled library exception: {}", status),
            }),
            Err(reply) => Err(Error::Rpc {
                context: self.context().to_string(),
                reason: format!("Consumer: Received an unhandled RPC reply: {:?}", reply),
            }),
        }
    }

    /// Classifies a frame which arrived instead of a delivery.
    fn dispatch_frame(
        &self,
        transport: &mut dyn Transport,
        next: std::result::Result<AMQPFrame, Status>,
    ) -> Result<ConsumeResult> {
        let context = || format!("{}Consumer: ", self.context());

        let (channel, args) = match next {
            Ok(AMQPFrame::Method(channel, _, args)) => (channel, args),
            Ok(other) => {
                debug!("{}Unhandled {} frame {:?}", self.context(), other.kind(), other);

                return Err(Error::Frame {
                    context: context(),
                    reason: "Received unhandled frame type!".to_string(),
                });
            }
            Err(Status::Timeout) => return Ok(ConsumeResult::Timeout),
            Err(status) => {
                return Err(Error::FrameStatus {
                    context: context(),
                    status,
                })
            }
        };

        match args {
            MethodFrameArgs::BasicAck(ack) => Ok(ConsumeResult::Acknowledge(Acknowledge {
                channel,
                delivery_tag: ack.delivery_tag,
                multiple: ack.multiple,
            })),
            MethodFrameArgs::BasicReturn(method) => match transport.read_message(channel) {
                Ok(message) => Ok(ConsumeResult::Returned(ReturnedMessage {
                    channel,
                    method,
                    message,
                })),
                Err(reply) => {
                    self.process_reply(Some(channel), "Consumer (return method): ", reply)?;

                    Err(Error::Rpc {
                        context: format!("{}Consumer (return method): ", self.context()),
                        reason: "Missing returned message".to_string(),
                    })
                }
            },
            MethodFrameArgs::ChannelClose(args) => Err(Error::ChannelClose {
                context: context(),
                channel,
                reply_code: args.code,
                reply_text: args.text,
            }),
            MethodFrameArgs::ConnectionClose(args) => Err(Error::ConnectionClose {
                context: context(),
                reply_code: args.code,
                reply_text: args.text,
            }),
            other => Err(Error::Frame {
                context: context(),
                reason: format!(
                    "Received unhandled method: {}",
                    frame::method_name(other.class_method())
                ),
            }),
        }
    }

    /// Waits for a delivery, other events arriving in the meantime are dropped. `None` means the
    /// budget ran out.
    pub fn consume_envelope(&self, timeout: Duration) -> Result<Option<Envelope>> {
        self.consume_until(timeout, |r| match r {
            ConsumeResult::Envelope(envelope) => Some(envelope),
            _ => None,
        })
    }

    /// Waits for a returned message, other events are dropped.
    pub fn consume_returned(&self, timeout: Duration) -> Result<Option<ReturnedMessage>> {
        self.consume_until(timeout, |r| match r {
            ConsumeResult::Returned(returned) => Some(returned),
            _ => None,
        })
    }

    /// Waits for a publisher confirm, other events are dropped.
    pub fn consume_acknowledge(&self, timeout: Duration) -> Result<Option<Acknowledge>> {
        self.consume_until(timeout, |r| match r {
            ConsumeResult::Acknowledge(ack) => Some(ack),
            _ => None,
        })
    }

    pub fn consume_envelope_blocking(&self) -> Result<Envelope> {
        self.consume_until_blocking(|r| match r {
            ConsumeResult::Envelope(envelope) => Some(envelope),
            _ => None,
        })
    }

    pub fn consume_returned_blocking(&self) -> Result<ReturnedMessage> {
        self.consume_until_blocking(|r| match r {
            ConsumeResult::Returned(returned) => Some(returned),
            _ => None,
        })
    }

    pub fn consume_acknowledge_blocking(&self) -> Result<Acknowledge> {
        self.consume_until_blocking(|r| match r {
            ConsumeResult::Acknowledge(ack) => Some(ack),
            _ => None,
        })
    }

    fn consume_until<T>(&self, timeout: Duration, mut pick: impl FnMut(ConsumeResult) -> Option<T>) -> Result<Option<T>> {
        let start = self.clock.now();
        let mut budget = timeout;

        loop {
            let result = self.consume(budget)?;

            if matches!(result, ConsumeResult::Timeout) {
                return Ok(None);
            }

            if let Some(found) = pick(result) {
                return Ok(Some(found));
            }

            // A spent budget still gets one poll for frames which are already there.
            if budget.is_zero() {
                return Ok(None);
            }

            budget = remaining(timeout, start, self.clock.now());
        }
    }

    fn consume_until_blocking<T>(&self, mut pick: impl FnMut(ConsumeResult) -> Option<T>) -> Result<T> {
        loop {
            if let Some(found) = pick(self.consume_blocking()?) {
                return Ok(found);
            }
        }
    }

    /// Callback flavour of [`Connection::consume`], returns false on timeout.
    pub fn consume_with(
        &self,
        timeout: Duration,
        on_envelope: impl FnOnce(Envelope),
        on_returned: impl FnOnce(ReturnedMessage),
        on_acknowledge: impl FnOnce(Acknowledge),
    ) -> Result<bool> {
        match self.consume(timeout)? {
            ConsumeResult::Timeout => Ok(false),
            ConsumeResult::Envelope(envelope) => {
                on_envelope(envelope);
                Ok(true)
            }
            ConsumeResult::Returned(returned) => {
                on_returned(returned);
                Ok(true)
            }
            ConsumeResult::Acknowledge(ack) => {
                on_acknowledge(ack);
                Ok(true)
            }
        }
    }

    pub fn consume_envelope_with(&self, timeout: Duration, on_envelope: impl FnOnce(Envelope)) -> Result<bool> {
        Ok(self.consume_envelope(timeout)?.map(on_envelope).is_some())
    }

    pub fn consume_returned_with(&self, timeout: Duration, on_returned: impl FnOnce(ReturnedMessage)) -> Result<bool> {
        Ok(self.consume_returned(timeout)?.map(on_returned).is_some())
    }

    pub fn consume_acknowledge_with(&self, timeout: Duration, on_acknowledge: impl FnOnce(Acknowledge)) -> Result<bool> {
        Ok(self.consume_acknowledge(timeout)?.map(on_acknowledge).is_some())
    }
}
