use crate::helper;
use anyhow::Result;
use rabbitwire::{ConsumeResult, FieldTable};
use std::time::Duration;

#[test]
fn published_message_is_delivered() -> Result<()> {
    let connection = helper::connect()?;
    let channel = connection.open_channel(1)?;
    let exchange_name = helper::unique("orders");
    let queue_name = helper::unique("orders-created");

    let exchange = channel.exchange(&exchange_name);
    exchange.declare("topic", false, false, true, FieldTable::new())?;

    let queue = channel.queue(&queue_name);
    queue.declare(false, false, true, true, FieldTable::new())?;
    queue.bind(&exchange_name, "orders.*", FieldTable::new())?;

    let tag = queue.consume("", false, false, false, FieldTable::new())?;

    exchange.publish("orders.created", false, false, "order 1", &helper::text_properties())?;

    let envelope = connection
        .consume_envelope(Duration::from_secs(5))?
        .expect("delivery in time");

    assert_eq!(envelope.consumer_tag, tag);
    assert_eq!(envelope.exchange, exchange_name);
    assert_eq!(envelope.routing_key, "orders.created");
    assert_eq!(envelope.message.body_str(), Some("order 1"));
    assert_eq!(envelope.message.properties.content_type.as_deref(), Some("text/plain"));

    channel.ack(envelope.delivery_tag, false)?;
    channel.cancel(&tag)?;

    exchange.remove(false)?;
    channel.close()?;
    connection.close()?;

    Ok(())
}

#[test]
fn body_larger_than_a_frame_is_split_and_joined() -> Result<()> {
    let connection = helper::connect()?;
    let channel = connection.open_channel(1)?;
    let queue_name = helper::unique("big");

    let queue = channel.queue(&queue_name);
    queue.declare(false, false, true, true, FieldTable::new())?;
    queue.consume("", false, true, false, FieldTable::new())?;

    let body = vec![b'x'; connection.frame_max() as usize * 3 + 17];
    channel.publish("", &queue_name, false, false, body.clone(), &helper::text_properties())?;

    match connection.consume(Duration::from_secs(5))? {
        ConsumeResult::Envelope(envelope) => assert_eq!(envelope.message.body.len(), body.len()),
        other => panic!("{other:?} is not a delivery"),
    }

    Ok(())
}

#[test]
fn unroutable_mandatory_message_is_returned() -> Result<()> {
    let connection = helper::connect()?;
    let channel = connection.open_channel(1)?;
    let exchange_name = helper::unique("nowhere");

    let exchange = channel.exchange(&exchange_name);
    exchange.declare("direct", false, false, true, FieldTable::new())?;
    exchange.publish("no-queue", true, false, "lost", &helper::text_properties())?;

    let returned = connection
        .consume_returned(Duration::from_secs(5))?
        .expect("return in time");

    assert_eq!(returned.reply_code(), 312);
    assert_eq!(returned.method.routing_key, "no-queue");
    assert_eq!(returned.message.body_str(), Some("lost"));

    exchange.remove(false)?;

    Ok(())
}

#[test]
fn nothing_to_consume_is_a_timeout() -> Result<()> {
    let connection = helper::connect()?;

    let started = std::time::Instant::now();
    let result = connection.consume(Duration::from_millis(300))?;

    assert_eq!(result, ConsumeResult::Timeout);
    assert!(started.elapsed() < Duration::from_secs(2));

    Ok(())
}
