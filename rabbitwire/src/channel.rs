use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::exchange::Exchange;
use crate::model::{ChannelNumber, ClassMethod};
use crate::queue::Queue;
use crate::transport::Transport;
use bytes::Bytes;
use log::{debug, warn};
use rabbitwire_codec::frame::{
    self, BasicAckArgs, BasicCancelArgs, BasicNackArgs, BasicProperties, BasicPublishArgs, BasicQosArgs,
    BasicRecoverArgs, BasicRejectArgs, ChannelCloseArgs, ChannelFlowArgs, ConfirmSelectArgs, MethodFrameArgs,
};
use std::cell::Cell;

/// An open AMQP channel on a borrowed connection.
///
/// Dropping the channel closes it, failures of the close are logged.
pub struct Channel<'c> {
    connection: &'c Connection,
    id: ChannelNumber,
    context: String,
    closed: Cell<bool>,
}

/// Gives back the transport buffers of the channel when a channel call finishes, however it
/// finishes.
struct ReleaseGuard<'c> {
    connection: &'c Connection,
    channel: ChannelNumber,
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        self.connection.release_buffers(Some(self.channel));
    }
}

impl<'c> Channel<'c> {
    pub fn open(connection: &'c Connection, id: ChannelNumber) -> Result<Self> {
        let context = format!("Channel({}): ", id);

        connection.rpc_in(Some(id), &context, |t| t.call(id, MethodFrameArgs::ChannelOpen))?;

        debug!("{}{}Opened", connection.context(), context);

        Ok(Channel {
            connection,
            id,
            context,
            closed: Cell::new(false),
        })
    }

    pub fn id(&self) -> ChannelNumber {
        self.id
    }

    pub fn connection(&self) -> &'c Connection {
        self.connection
    }

    /// Descriptor of an exchange, nothing is sent to the broker.
    pub fn exchange(&self, name: &str) -> Exchange<'_> {
        Exchange::new(self, name)
    }

    /// Descriptor of a queue, nothing is sent to the broker.
    pub fn queue(&self, name: &str) -> Queue<'_> {
        Queue::new(self, name)
    }

    /// Runs a synchronous call on this channel and classifies its reply. Buffers of the channel
    /// are released afterwards.
    pub fn rpc<R>(&self, call: impl FnOnce(&mut dyn Transport, ChannelNumber) -> R) -> Result<R> {
        self.rpc_as("", call)
    }

    pub(crate) fn rpc_as<R>(
        &self,
        context: &str,
        call: impl FnOnce(&mut dyn Transport, ChannelNumber) -> R,
    ) -> Result<R> {
        let _release = ReleaseGuard {
            connection: self.connection,
            channel: self.id,
        };

        let id = self.id;
        let result = self
            .connection
            .rpc_in(Some(id), &format!("{}{}", self.context, context), |t| call(t, id));

        if let Err(Error::ChannelClose { channel, .. }) = &result {
            if *channel == id {
                self.closed.set(true);
            }
        }

        result
    }

    /// The error of a call whose reply didn't carry the expected arguments.
    pub(crate) fn missing_reply(&self, context: &str, reply: ClassMethod) -> Error {
        Error::Rpc {
            context: format!("{}{}{}", self.connection.context(), self.context, context),
            reason: format!("Missing {} reply", frame::method_name(reply)),
        }
    }

    pub fn ack(&self, delivery_tag: u64, multiple: bool) -> Result<()> {
        let args = BasicAckArgs::default().delivery_tag(delivery_tag).multiple(multiple);

        self.rpc(|t, ch| t.send(ch, MethodFrameArgs::BasicAck(args)))?;

        Ok(())
    }

    pub fn nack(&self, delivery_tag: u64, multiple: bool, requeue: bool) -> Result<()> {
        let args = BasicNackArgs::default()
            .delivery_tag(delivery_tag)
            .multiple(multiple)
            .requeue(requeue);

        self.rpc(|t, ch| t.send(ch, MethodFrameArgs::BasicNack(args)))?;

        Ok(())
    }

    pub fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<()> {
        let args = BasicRejectArgs { delivery_tag, requeue };

        self.rpc(|t, ch| t.send(ch, MethodFrameArgs::BasicReject(args)))?;

        Ok(())
    }

    /// Limits the unacknowledged deliveries, `global` applies the limit to the whole connection.
    pub fn qos(&self, prefetch_count: u16, prefetch_size: u32, global: bool) -> Result<()> {
        let args = BasicQosArgs {
            prefetch_size,
            prefetch_count,
            global,
        };

        self.rpc(|t, ch| t.call(ch, MethodFrameArgs::BasicQos(args)))?;

        Ok(())
    }

    /// Pauses or restarts deliveries, returns the state the broker confirmed.
    pub fn flow(&self, active: bool) -> Result<bool> {
        match self.rpc(|t, ch| t.call(ch, MethodFrameArgs::ChannelFlow(ChannelFlowArgs { active })))? {
            Some(MethodFrameArgs::ChannelFlowOk(args)) => Ok(args.active),
            _ => Err(self.missing_reply("", frame::CHANNEL_FLOW_OK)),
        }
    }

    /// Redelivers the unacknowledged messages, to any consumer if `requeue` is set.
    pub fn recover(&self, requeue: bool) -> Result<()> {
        self.rpc(|t, ch| t.call(ch, MethodFrameArgs::BasicRecover(BasicRecoverArgs { requeue })))?;

        Ok(())
    }

    /// Turns on publisher confirms, they can be waited for by the consume calls.
    pub fn confirm_select(&self) -> Result<()> {
        self.rpc(|t, ch| t.call(ch, MethodFrameArgs::ConfirmSelect(ConfirmSelectArgs { no_wait: false })))?;

        Ok(())
    }

    /// Cancels a consumer and returns the tag the broker confirmed.
    pub fn cancel(&self, consumer_tag: &str) -> Result<String> {
        let args = BasicCancelArgs::new(consumer_tag);

        match self.rpc(|t, ch| t.call(ch, MethodFrameArgs::BasicCancel(args)))? {
            Some(MethodFrameArgs::BasicCancelOk(ok)) => Ok(ok.consumer_tag),
            _ => Err(self.missing_reply("", frame::BASIC_CANCEL_OK)),
        }
    }

    /// Publishes a message. A failed socket write is reported as [`Error::Publish`].
    pub fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        mandatory: bool,
        immediate: bool,
        body: impl Into<Bytes>,
        properties: &BasicProperties,
    ) -> Result<()> {
        self.publish_as("", exchange, routing_key, mandatory, immediate, body.into(), properties)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn publish_as(
        &self,
        context: &str,
        exchange: &str,
        routing_key: &str,
        mandatory: bool,
        immediate: bool,
        body: Bytes,
        properties: &BasicProperties,
    ) -> Result<()> {
        let args = BasicPublishArgs::new(exchange)
            .routing_key(routing_key)
            .mandatory(mandatory)
            .immediate(immediate);

        let sent = body.clone();
        let status = self.rpc_as(context, |t, ch| t.publish(ch, args, properties, sent))?;

        if !status.is_ok() {
            return Err(Error::Publish {
                context: format!("{}{}{}", self.connection.context(), self.context, context),
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                mandatory,
                immediate,
                body: String::from_utf8_lossy(&body).into_owned(),
                status,
            });
        }

        Ok(())
    }

    /// Closes the channel with `200 Normal shutdown`.
    pub fn close(self) -> Result<()> {
        self.shutdown()
    }

    /// Forgets a channel the broker has already closed, nothing is sent.
    pub fn discard(self) {
        self.closed.set(true);
    }

    fn shutdown(&self) -> Result<()> {
        if self.closed.replace(true) {
            return Ok(());
        }

        let close = ChannelCloseArgs {
            code: 200,
            text: "Normal shutdown".to_string(),
            ..Default::default()
        };

        self.rpc_as("Close: ", |t, ch| t.call(ch, MethodFrameArgs::ChannelClose(close)))?;

        debug!("{}{}Closed", self.connection.context(), self.context);

        Ok(())
    }
}

impl Drop for Channel<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Error closing channel {}", e);
        }
    }
}
