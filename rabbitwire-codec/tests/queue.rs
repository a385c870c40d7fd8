use bytes::BytesMut;
use rabbitwire_codec::codec::{AMQPCodec, Frame};
use rabbitwire_codec::frame::{
    self, AMQPFrame, FieldTable, FieldValue, MethodFrameArgs, QueueDeclareArgs, QueueDeclareFlags, QueueDeleteArgs,
    QueuePurgeArgs,
};
use tokio_util::codec::{Decoder, Encoder};

macro_rules! extract_method_frame_args {
    ( $name:ident, $frame:expr ) => {
        match $frame {
            AMQPFrame::Method(_, _, mf) => match mf {
                MethodFrameArgs::$name(args) => args,
                _ => panic!("{:?} is not of the correct type", mf),
            },
            other => panic!("{:?} is not a method frame", other),
        }
    };
}

fn pass_through(fr: AMQPFrame) -> AMQPFrame {
    let mut codec = AMQPCodec::default();
    let mut buf = BytesMut::with_capacity(256);

    codec.encode(Frame::Frame(fr), &mut buf).unwrap();

    let decoded = codec.decode(&mut buf).unwrap().unwrap();
    assert!(buf.is_empty());

    match decoded {
        Frame::Frame(fr) => fr,
        Frame::Frames(_) => panic!("It is not a single frame"),
    }
}

#[test]
fn queue_declare_keeps_flags_and_arguments() {
    let args = FieldTable::new()
        .with("x-queue-type", "quorum")
        .with("x-max-length", 1000i32)
        .with("x-dead-letter", FieldTable::new().with("exchange", "dlx"));

    let declare = QueueDeclareArgs::default()
        .name("jobs")
        .durable(true)
        .exclusive(false)
        .args(args.clone());

    let fr = pass_through(MethodFrameArgs::QueueDeclare(declare).frame(2));

    assert_eq!(fr.channel(), Some(2));

    let decoded = extract_method_frame_args!(QueueDeclare, fr);
    assert_eq!(decoded.name, "jobs");
    assert_eq!(decoded.flags, QueueDeclareFlags::DURABLE);
    assert_eq!(decoded.args, args);
    assert_eq!(decoded.args.get("x-max-length"), Some(&FieldValue::I32(1000)));
    assert_eq!(
        decoded
            .args
            .get("x-dead-letter")
            .and_then(|v| v.as_table())
            .and_then(|t| t.get("exchange"))
            .and_then(|v| v.as_str()),
        Some("dlx")
    );
}

#[test]
fn queue_purge() {
    let purge = QueuePurgeArgs {
        queue_name: "test-queue".to_string(),
        no_wait: false,
    };

    let fr = pass_through(MethodFrameArgs::QueuePurge(purge).frame(3));

    let args = extract_method_frame_args!(QueuePurge, fr);
    assert_eq!(args.queue_name, "test-queue");
    assert!(!args.no_wait);
}

#[test]
fn queue_delete_flags() {
    let delete = QueueDeleteArgs::default()
        .queue_name("test-queue")
        .if_empty(true)
        .if_unused(true);

    let fr = pass_through(MethodFrameArgs::QueueDelete(delete).frame(1));

    assert_eq!(frame::method_name(fr_class_method(&fr)), "queue.delete");

    let args = extract_method_frame_args!(QueueDelete, fr);
    assert_eq!(args.queue_name, "test-queue");
    assert!(args.flags.contains(frame::QueueDeleteFlags::IF_EMPTY | frame::QueueDeleteFlags::IF_UNUSED));
}

fn fr_class_method(fr: &AMQPFrame) -> u32 {
    match fr {
        AMQPFrame::Method(_, cm, _) => *cm,
        other => panic!("{:?} is not a method frame", other),
    }
}
