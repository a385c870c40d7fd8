use crate::helper;
use anyhow::Result;
use rabbitwire::{FieldTable, TableEntry};

#[test]
fn declare_purge_and_delete() -> Result<()> {
    let connection = helper::connect()?;
    let channel = connection.open_channel(1)?;
    let queue_name = helper::unique("jobs");
    let queue = channel.queue(&queue_name);

    let ok = queue.declare(false, false, false, false, [TableEntry::new("x-queue-type", "classic")])?;
    assert_eq!(ok.name, queue_name);
    assert_eq!(ok.message_count, 0);

    for _ in 0..2 {
        channel.publish("", &queue_name, false, false, "job", &helper::text_properties())?;
    }

    // A passive declare is a round trip, by then the publishes are routed.
    let ok = queue.declare(true, false, false, false, FieldTable::new())?;
    assert_eq!(ok.message_count, 2);

    assert_eq!(queue.purge()?, 2);
    assert_eq!(queue.remove(false, false)?, 0);

    Ok(())
}

#[test]
fn server_named_queue() -> Result<()> {
    let connection = helper::connect()?;
    let channel = connection.open_channel(1)?;

    let ok = channel.queue("").declare(false, false, true, true, FieldTable::new())?;

    assert!(ok.name.starts_with("amq.gen-"), "{}", ok.name);

    Ok(())
}
