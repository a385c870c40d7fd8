use crate::channel::Channel;
use crate::error::Result;
use crate::model::ChannelNumber;
use crate::transport::Transport;
use bytes::Bytes;
use rabbitwire_codec::frame::{
    BasicProperties, ExchangeBindArgs, ExchangeDeclareArgs, ExchangeDeleteArgs, FieldTable, MethodFrameArgs,
    TableEntry,
};

/// A named exchange on a channel. Creating the descriptor doesn't touch the broker.
pub struct Exchange<'a> {
    channel: &'a Channel<'a>,
    name: String,
    context: String,
}

impl<'a> Exchange<'a> {
    pub fn new(channel: &'a Channel<'a>, name: &str) -> Self {
        Exchange {
            channel,
            name: name.to_string(),
            context: format!("Exchange({}): ", name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declares the exchange, `kind` is like `direct`, `fanout`, `topic` or `headers`.
    ///
    /// ```no_run
    /// # use rabbitwire::{Connection, ConnectionOptions, TableEntry};
    /// # let connection = Connection::open(&ConnectionOptions::default()).unwrap();
    /// # let channel = connection.open_channel(1).unwrap();
    /// channel
    ///     .exchange("events")
    ///     .declare("topic", false, true, false, [TableEntry::new("alternate-exchange", "unrouted")])
    ///     .unwrap();
    /// ```
    pub fn declare(
        &self,
        kind: &str,
        passive: bool,
        durable: bool,
        auto_delete: bool,
        args: impl IntoIterator<Item = TableEntry>,
    ) -> Result<()> {
        let args = ExchangeDeclareArgs::new(&self.name, kind)
            .passive(passive)
            .durable(durable)
            .auto_delete(auto_delete)
            .args(args.into_iter().collect());

        self.rpc(|t, ch, _| t.call(ch, MethodFrameArgs::ExchangeDeclare(args)))?;

        Ok(())
    }

    /// Routes messages from `source` to this exchange.
    pub fn bind(&self, source: &str, routing_key: &str, args: impl IntoIterator<Item = TableEntry>) -> Result<()> {
        let args = self.binding(source, routing_key, args.into_iter().collect());

        self.rpc(|t, ch, _| t.call(ch, MethodFrameArgs::ExchangeBind(args)))?;

        Ok(())
    }

    pub fn unbind(&self, source: &str, routing_key: &str, args: impl IntoIterator<Item = TableEntry>) -> Result<()> {
        let args = self.binding(source, routing_key, args.into_iter().collect());

        self.rpc(|t, ch, _| t.call(ch, MethodFrameArgs::ExchangeUnbind(args)))?;

        Ok(())
    }

    /// Deletes the exchange, with `if_unused` only if it has no bindings.
    pub fn remove(&self, if_unused: bool) -> Result<()> {
        let args = ExchangeDeleteArgs::new(&self.name).if_unused(if_unused);

        self.rpc(|t, ch, _| t.call(ch, MethodFrameArgs::ExchangeDelete(args)))?;

        Ok(())
    }

    pub fn publish(
        &self,
        routing_key: &str,
        mandatory: bool,
        immediate: bool,
        body: impl Into<Bytes>,
        properties: &BasicProperties,
    ) -> Result<()> {
        self.channel
            .publish_as(&self.context, &self.name, routing_key, mandatory, immediate, body.into(), properties)
    }

    /// Runs a synchronous call on the channel with the exchange name at hand.
    pub fn rpc<R>(&self, call: impl FnOnce(&mut dyn Transport, ChannelNumber, &str) -> R) -> Result<R> {
        self.channel.rpc_as(&self.context, |t, ch| call(t, ch, &self.name))
    }

    fn binding(&self, source: &str, routing_key: &str, args: FieldTable) -> ExchangeBindArgs {
        ExchangeBindArgs::new(&self.name, source)
            .routing_key(routing_key)
            .args(args)
    }
}
