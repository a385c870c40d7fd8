use bencher::Bencher;
use bytes::{Bytes, BytesMut};
use rabbitwire_codec::codec::{AMQPCodec, Frame};
use rabbitwire_codec::frame::{self, FieldTable, MethodFrameArgs, TableEntry};
use tokio_util::codec::Encoder;

fn encode_method_frame(b: &mut Bencher) {
    let mut codec = AMQPCodec::default();

    b.iter(move || {
        let args = frame::QueueDeclareArgs::default()
            .name("test queue")
            .args(FieldTable::from([TableEntry::new("x-queue-type", "classic")]));
        let mut buf = BytesMut::with_capacity(1024);

        codec.encode(Frame::Frame(MethodFrameArgs::QueueDeclare(args).frame(12)), &mut buf)
    });
}

fn encode_publish(b: &mut Bencher) {
    let mut codec = AMQPCodec::default();
    let body = Bytes::from(vec![b'x'; 4096]);

    b.iter(move || {
        let publish = MethodFrameArgs::BasicPublish(frame::BasicPublishArgs::new("exchange0").routing_key("key"));
        let header = frame::ContentHeaderFrame::new(1, body.len() as u64, Default::default());
        let content = frame::ContentBodyFrame {
            channel: 1,
            body: body.clone(),
        };
        let mut buf = BytesMut::with_capacity(8192);

        codec.encode(
            Frame::Frames(vec![publish.frame(1), header.frame(), content.frame()]),
            &mut buf,
        )
    });
}

bencher::benchmark_group!(encoder, encode_method_frame, encode_publish);

bencher::benchmark_main!(encoder);
