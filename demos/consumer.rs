use anyhow::Result;
use log::info;
use rabbitwire::{Connection, ConnectionOptions, ConsumeResult, FieldTable};
use std::time::Duration;

mod config;

fn main() -> Result<()> {
    rabbitwire::setup_logger();

    let (cli, broker) = config::load()?;

    let connection = Connection::open(&ConnectionOptions::from_url(&broker.url)?)?;
    let channel = connection.open_channel(1)?;

    channel.exchange(&broker.exchange).declare("topic", false, true, false, FieldTable::new())?;

    let queue = channel.queue(&broker.queue);
    queue.declare(false, true, false, false, FieldTable::new())?;
    queue.bind(&broker.exchange, "#", FieldTable::new())?;

    channel.qos(10, 0, false)?;
    let tag = queue.consume("", false, false, false, FieldTable::new())?;

    let mut received = 0;

    while received < cli.count {
        match connection.consume(Duration::from_secs(1))? {
            ConsumeResult::Envelope(envelope) => {
                info!(
                    "{} {} {:?}",
                    envelope.delivery_tag,
                    envelope.routing_key,
                    envelope.message.body_str()
                );

                channel.ack(envelope.delivery_tag, false)?;
                received += 1;
            }
            ConsumeResult::Timeout => (),
            other => info!("Skipping {:?}", other),
        }
    }

    channel.cancel(&tag)?;
    channel.close()?;
    connection.close()?;

    Ok(())
}
