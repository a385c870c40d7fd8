use anyhow::Result;
use log::{info, warn};
use rabbitwire::{BasicProperties, Connection, ConnectionOptions, ConsumeResult, FieldTable};
use std::time::{Duration, Instant};

mod config;

fn main() -> Result<()> {
    rabbitwire::setup_logger();

    let (cli, broker) = config::load()?;

    let connection = Connection::open(&ConnectionOptions::from_url(&broker.url)?)?;
    let channel = connection.open_channel(1)?;

    if cli.confirm {
        channel.confirm_select()?;
    }

    let exchange = channel.exchange(&broker.exchange);
    exchange.declare("topic", false, true, false, FieldTable::new())?;

    let properties = BasicProperties::default().content_type("text/plain").delivery_mode(2);
    let start = Instant::now();

    for i in 0..cli.count {
        exchange.publish(&broker.routing_key, true, false, format!("Message #{i}"), &properties)?;
    }

    info!("Published {} messages in {:?}", cli.count, start.elapsed());

    // A return arrives before the confirm of the same message.
    let mut confirmed = 0;
    let mut returned = 0;

    loop {
        match connection.consume(Duration::from_secs(1))? {
            ConsumeResult::Returned(message) => {
                warn!("Returned: {} {}", message.reply_code(), message.reply_text());
                returned += 1;
            }
            ConsumeResult::Acknowledge(ack) => confirmed = ack.delivery_tag,
            ConsumeResult::Envelope(envelope) => channel.reject(envelope.delivery_tag, true)?,
            ConsumeResult::Timeout => break,
        }

        if cli.confirm && confirmed == u64::from(cli.count) {
            break;
        }
    }

    info!("Confirmed up to {confirmed}, {returned} returned");

    channel.close()?;
    connection.close()?;

    Ok(())
}
