//! Blocking AMQP 0-9-1 client.
//!
//! A [`Connection`] owns the socket, [`Channel`]s borrow the connection, [`Exchange`] and
//! [`Queue`] descriptors borrow a channel. Every synchronous call goes through one RPC engine
//! which turns the reply into a typed [`Error`]. Deliveries, returned messages and publisher
//! confirms are waited for by the consume calls of the connection.
//!
//! ```no_run
//! use rabbitwire::{BasicProperties, Connection, ConnectionOptions, ConsumeResult, FieldTable};
//! use std::time::Duration;
//!
//! let connection = Connection::open(&ConnectionOptions::default()).unwrap();
//! let channel = connection.open_channel(1).unwrap();
//! let queue = channel.queue("jobs");
//!
//! queue.declare(false, true, false, false, FieldTable::new()).unwrap();
//! channel.publish("", "jobs", false, false, "hello", &BasicProperties::default()).unwrap();
//! queue.consume("", false, false, false, FieldTable::new()).unwrap();
//!
//! if let ConsumeResult::Envelope(envelope) = connection.consume(Duration::from_secs(5)).unwrap() {
//!     channel.ack(envelope.delivery_tag, false).unwrap();
//! }
//! ```
mod dev;
pub use dev::setup_logger;

mod channel;
pub use channel::Channel;

mod clock;
pub use clock::{Clock, SystemClock};

mod connection;
pub use connection::Connection;

mod consume;
pub use consume::{Acknowledge, ConsumeResult};

mod error;
pub use error::{Error, Result};

mod exchange;
pub use exchange::Exchange;

mod message;
pub use message::{Envelope, Message, ReturnedMessage};

mod model;
pub use model::{ChannelError, ChannelNumber, ConnectionError};

mod options;
pub use options::{ConnectionOptions, Credentials};

mod queue;
pub use queue::Queue;

pub mod transport;

pub use rabbitwire_codec::frame::{
    BasicProperties, BasicReturnArgs, Decimal, FieldTable, FieldValue, QueueDeclareOkArgs, TableEntry,
};

#[cfg(test)]
mod tests;
