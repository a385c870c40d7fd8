use crate::channel::Channel;
use crate::error::Result;
use crate::model::ChannelNumber;
use crate::transport::Transport;
use rabbitwire_codec::frame::{
    self, BasicConsumeArgs, MethodFrameArgs, QueueBindArgs, QueueDeclareArgs, QueueDeclareOkArgs, QueueDeleteArgs,
    QueuePurgeArgs, QueueUnbindArgs, TableEntry,
};

/// A named queue on a channel. Creating the descriptor doesn't touch the broker.
pub struct Queue<'a> {
    channel: &'a Channel<'a>,
    name: String,
    context: String,
}

impl<'a> Queue<'a> {
    pub fn new(channel: &'a Channel<'a>, name: &str) -> Self {
        Queue {
            channel,
            name: name.to_string(),
            context: format!("Queue({}): ", name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declares the queue. With an empty name the broker generates one, it is in the reply.
    pub fn declare(
        &self,
        passive: bool,
        durable: bool,
        exclusive: bool,
        auto_delete: bool,
        args: impl IntoIterator<Item = TableEntry>,
    ) -> Result<QueueDeclareOkArgs> {
        let args = QueueDeclareArgs::default()
            .name(&self.name)
            .passive(passive)
            .durable(durable)
            .exclusive(exclusive)
            .auto_delete(auto_delete)
            .args(args.into_iter().collect());

        match self.rpc(|t, ch, _| t.call(ch, MethodFrameArgs::QueueDeclare(args)))? {
            Some(MethodFrameArgs::QueueDeclareOk(ok)) => Ok(ok),
            _ => Err(self.channel.missing_reply(&self.context, frame::QUEUE_DECLARE_OK)),
        }
    }

    pub fn bind(&self, exchange: &str, routing_key: &str, args: impl IntoIterator<Item = TableEntry>) -> Result<()> {
        let args = QueueBindArgs::new(&self.name, exchange)
            .routing_key(routing_key)
            .args(args.into_iter().collect());

        self.rpc(|t, ch, _| t.call(ch, MethodFrameArgs::QueueBind(args)))?;

        Ok(())
    }

    pub fn unbind(&self, exchange: &str, routing_key: &str, args: impl IntoIterator<Item = TableEntry>) -> Result<()> {
        let args = QueueUnbindArgs::new(&self.name, exchange)
            .routing_key(routing_key)
            .args(args.into_iter().collect());

        self.rpc(|t, ch, _| t.call(ch, MethodFrameArgs::QueueUnbind(args)))?;

        Ok(())
    }

    /// Starts a consumer, returns its tag. With an empty tag the broker generates one.
    pub fn consume(
        &self,
        consumer_tag: &str,
        no_local: bool,
        no_ack: bool,
        exclusive: bool,
        args: impl IntoIterator<Item = TableEntry>,
    ) -> Result<String> {
        let args = BasicConsumeArgs::default()
            .queue(&self.name)
            .consumer_tag(consumer_tag)
            .no_local(no_local)
            .no_ack(no_ack)
            .exclusive(exclusive)
            .args(args.into_iter().collect());

        match self.rpc(|t, ch, _| t.call(ch, MethodFrameArgs::BasicConsume(args)))? {
            Some(MethodFrameArgs::BasicConsumeOk(ok)) => Ok(ok.consumer_tag),
            _ => Err(self.channel.missing_reply(&self.context, frame::BASIC_CONSUME_OK)),
        }
    }

    /// Deletes the queue and returns the number of messages deleted with it.
    pub fn remove(&self, if_unused: bool, if_empty: bool) -> Result<u32> {
        let args = QueueDeleteArgs::default()
            .queue_name(&self.name)
            .if_unused(if_unused)
            .if_empty(if_empty);

        match self.rpc(|t, ch, _| t.call(ch, MethodFrameArgs::QueueDelete(args)))? {
            Some(MethodFrameArgs::QueueDeleteOk(ok)) => Ok(ok.message_count),
            _ => Err(self.channel.missing_reply(&self.context, frame::QUEUE_DELETE_OK)),
        }
    }

    /// Drops the ready messages, returns how many were dropped.
    pub fn purge(&self) -> Result<u32> {
        let args = QueuePurgeArgs {
            queue_name: self.name.clone(),
            no_wait: false,
        };

        match self.rpc(|t, ch, _| t.call(ch, MethodFrameArgs::QueuePurge(args)))? {
            Some(MethodFrameArgs::QueuePurgeOk(ok)) => Ok(ok.message_count),
            _ => Err(self.channel.missing_reply(&self.context, frame::QUEUE_PURGE_OK)),
        }
    }

    /// Runs a synchronous call on the channel with the queue name at hand.
    pub fn rpc<R>(&self, call: impl FnOnce(&mut dyn Transport, ChannelNumber, &str) -> R) -> Result<R> {
        self.channel.rpc_as(&self.context, |t, ch| call(t, ch, &self.name))
    }
}
