use crate::helper;
use anyhow::Result;
use rabbitwire::{Connection, ConnectionOptions, Error};

#[test]
fn login_negotiates_limits() -> Result<()> {
    let connection = helper::connect()?;

    assert!(connection.channel_max() > 0);
    assert!(connection.frame_max() >= 4096);

    connection.close()?;

    Ok(())
}

#[test]
fn wrong_password_is_refused() {
    let options = ConnectionOptions::default().credentials(rabbitwire::Credentials::plain("guest", "not-the-password"));

    let err = Connection::open(&options).err().unwrap();

    assert!(err.is_fatal(), "{err}");
}

#[test]
fn unknown_vhost_is_refused() {
    let options = ConnectionOptions::default().virtual_host("/no-such-vhost");

    let err = Connection::open(&options).err().unwrap();

    assert!(matches!(err, Error::ConnectionClose { reply_code: 530, .. }), "{err:?}");
}

#[test]
fn channels_are_independent() -> Result<()> {
    let connection = helper::connect()?;
    let first = connection.open_channel(1)?;
    let second = connection.open_channel(2)?;

    // Passive declare of a missing queue closes the channel with 404.
    let err = first
        .queue(&helper::unique("missing"))
        .declare(true, false, false, false, rabbitwire::FieldTable::new())
        .err()
        .unwrap();

    assert_eq!(err.channel(), Some(1));
    assert_eq!(err.reply_code(), Some(404));

    second.qos(10, 0, false)?;

    second.close()?;
    drop(first);
    connection.close()?;

    Ok(())
}
