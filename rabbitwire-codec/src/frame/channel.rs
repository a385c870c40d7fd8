use super::{AMQPFrame, Channel, MethodFrameArgs};

/// Reply code and text of a channel.close, with the method which caused it (zero if none).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChannelCloseArgs {
    pub code: u16,
    pub text: String,
    pub class_id: u16,
    pub method_id: u16,
}

/// Arguments of both channel.flow and channel.flow-ok.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChannelFlowArgs {
    pub active: bool,
}

pub fn channel_close_ok(channel: Channel) -> AMQPFrame {
    AMQPFrame::Method(channel, super::CHANNEL_CLOSE_OK, MethodFrameArgs::ChannelCloseOk)
}
