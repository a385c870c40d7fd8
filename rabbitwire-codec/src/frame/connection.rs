use super::{AMQPFrame, FieldTable, MethodFrameArgs};

#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionStartArgs {
    pub version_major: u8,
    pub version_minor: u8,
    pub properties: FieldTable,
    pub mechanisms: String,
    pub locales: String,
}

impl Default for ConnectionStartArgs {
    fn default() -> Self {
        Self {
            version_major: 0,
            version_minor: 9,
            properties: FieldTable::new(),
            mechanisms: "PLAIN".into(),
            locales: "en_US".into(),
        }
    }
}

impl ConnectionStartArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mechanisms(mut self, mechanisms: &str) -> Self {
        self.mechanisms = mechanisms.to_string();
        self
    }

    /// Checks if the space separated mechanism list of the server has `mechanism`.
    pub fn supports_mechanism(&self, mechanism: &str) -> bool {
        self.mechanisms.split_whitespace().any(|m| m == mechanism)
    }

    pub fn frame(self) -> AMQPFrame {
        AMQPFrame::Method(0, super::CONNECTION_START, MethodFrameArgs::ConnectionStart(self))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnectionStartOkArgs {
    pub properties: FieldTable,
    pub mechanism: String,
    pub response: String,
    pub locale: String,
}

impl ConnectionStartOkArgs {
    /// Start-ok with PLAIN authentication.
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            mechanism: "PLAIN".into(),
            response: format!("\x00{}\x00{}", username, password),
            locale: "en_US".into(),
            ..Default::default()
        }
    }

    /// Start-ok with EXTERNAL authentication, the identity comes from outside of the protocol.
    pub fn external(identity: &str) -> Self {
        Self {
            mechanism: "EXTERNAL".into(),
            response: identity.to_string(),
            locale: "en_US".into(),
            ..Default::default()
        }
    }

    pub fn properties(mut self, properties: FieldTable) -> Self {
        self.properties = properties;
        self
    }

    pub fn frame(self) -> AMQPFrame {
        AMQPFrame::Method(0, super::CONNECTION_START_OK, MethodFrameArgs::ConnectionStartOk(self))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnectionTuneArgs {
    pub channel_max: u16,
    pub frame_max: u32,
    pub heartbeat: u16,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnectionTuneOkArgs {
    pub channel_max: u16,
    pub frame_max: u32,
    pub heartbeat: u16,
}

impl ConnectionTuneOkArgs {
    pub fn frame(self) -> AMQPFrame {
        AMQPFrame::Method(0, super::CONNECTION_TUNE_OK, MethodFrameArgs::ConnectionTuneOk(self))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnectionOpenArgs {
    pub virtual_host: String,
    pub insist: bool,
}

impl ConnectionOpenArgs {
    pub fn virtual_host(mut self, virtual_host: &str) -> Self {
        self.virtual_host = virtual_host.to_string();
        self
    }

    pub fn frame(self) -> AMQPFrame {
        AMQPFrame::Method(0, super::CONNECTION_OPEN, MethodFrameArgs::ConnectionOpen(self))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnectionCloseArgs {
    pub code: u16,
    pub text: String,
    pub class_id: u16,
    pub method_id: u16,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnectionBlockedArgs {
    pub reason: String,
}

pub fn connection_close(code: u16, text: &str, class_method: u32) -> AMQPFrame {
    let (class_id, method_id) = super::split_class_method(class_method);

    AMQPFrame::Method(
        0,
        super::CONNECTION_CLOSE,
        MethodFrameArgs::ConnectionClose(ConnectionCloseArgs {
            code,
            text: text.into(),
            class_id,
            method_id,
        }),
    )
}

pub fn connection_close_ok() -> AMQPFrame {
    AMQPFrame::Method(0, super::CONNECTION_CLOSE_OK, MethodFrameArgs::ConnectionCloseOk)
}
