use crate::helper;
use anyhow::Result;
use rabbitwire::FieldTable;
use std::time::Duration;

#[test]
fn confirms_arrive_for_every_publish() -> Result<()> {
    let connection = helper::connect()?;
    let channel = connection.open_channel(1)?;
    let queue_name = helper::unique("safe");

    channel.confirm_select()?;
    channel
        .queue(&queue_name)
        .declare(false, false, true, true, FieldTable::new())?;

    for i in 0..3 {
        channel.publish("", &queue_name, false, false, format!("message {i}"), &helper::text_properties())?;
    }

    let mut confirmed = 0;

    while confirmed < 3 {
        let ack = connection
            .consume_acknowledge(Duration::from_secs(5))?
            .expect("confirm in time");

        confirmed = ack.delivery_tag;
    }

    assert_eq!(confirmed, 3);

    Ok(())
}
