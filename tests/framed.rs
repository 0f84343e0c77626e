//! Drives the codec over an in-memory transport through `tokio_util::codec::Framed`.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{duplex, AsyncWriteExt};
use tokio_util::codec::{Framed, FramedRead};
use wsframe::{
    codec::{self, Codec, Role},
    FixedMask, Frame, FrameError, FrameHeader, Message, OpCode, Options, Reassembler,
};

#[tokio::test]
async fn client_and_server_exchange_frames() {
    let (client_io, server_io) = duplex(64 * 1024);
    let options = Options::default();

    let mut client = Framed::new(client_io, Codec::new(Role::Client, &options));
    let mut server = Framed::new(server_io, Codec::new(Role::Server, &options));

    client.send(Frame::text("Hello, server")).await.unwrap();
    let frame = server.next().await.unwrap().unwrap();
    assert_eq!(frame.opcode(), OpCode::Text);
    assert!(frame.header().is_masked());
    assert_eq!(frame.payload(), &Bytes::from("Hello, server"));

    // echo it back; the server strips the mask
    server.send(frame).await.unwrap();
    let echo = client.next().await.unwrap().unwrap();
    assert!(!echo.header().is_masked());
    assert_eq!(echo.payload(), &Bytes::from("Hello, server"));
}

#[tokio::test]
async fn fragmented_message_is_reassembled() {
    let (client_io, server_io) = duplex(64 * 1024);
    let options = Options::default().with_max_frame_payload(7);

    let mut client = Framed::new(
        client_io,
        Codec::with_key_source(Role::Client, &options, FixedMask(0x6334_3261)),
    );
    let mut server = Framed::new(server_io, Codec::new(Role::Server, &options));

    let text = "a message long enough to need several frames";
    client.send(Message::text(text)).await.unwrap();
    client.send(Message::ping("still there?").unwrap()).await.unwrap();

    let mut reassembler = Reassembler::new(&options);
    let mut messages = Vec::new();
    while messages.len() < 2 {
        let frame = server.next().await.unwrap().unwrap();
        if let Some(message) = reassembler.push(frame).unwrap() {
            messages.push(message);
        }
    }

    assert_eq!(messages[0].opcode, OpCode::Text);
    assert_eq!(messages[0].as_str(), Some(text));
    assert_eq!(messages[1].opcode, OpCode::Ping);
}

#[tokio::test]
async fn frames_split_across_reads() {
    let (mut writer, reader) = duplex(16);
    let mut frames = FramedRead::new(reader, codec::Decoder::new(Role::Server, 1024));

    let payload = vec![0x5Au8; 300];
    let header = FrameHeader::new(true, OpCode::Binary, Some(0x0102_0304), 300).unwrap();
    let wire = codec::encode(&header, &payload).unwrap();

    let write = tokio::spawn(async move {
        for chunk in wire.chunks(5) {
            writer.write_all(chunk).await.unwrap();
        }
    });

    let frame = frames.next().await.unwrap().unwrap();
    assert_eq!(&frame.payload()[..], &payload[..]);
    write.await.unwrap();
}

#[tokio::test]
async fn unmasked_client_frame_is_rejected_by_server() {
    let (mut writer, reader) = duplex(1024);
    let mut frames = FramedRead::new(reader, codec::Decoder::new(Role::Server, 1024));

    writer.write_all(&[0x81, 0x02, b'h', b'i']).await.unwrap();

    match frames.next().await {
        Some(Err(FrameError::ProtocolError(_))) => {}
        other => panic!("expected protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn truncated_stream_reports_error_at_eof() {
    let (mut writer, reader) = duplex(1024);
    let mut frames = FramedRead::new(reader, codec::Decoder::new(Role::Client, 1024));

    writer.write_all(&[0x82, 0x05, 1, 2]).await.unwrap();
    drop(writer);

    assert!(matches!(frames.next().await, Some(Err(FrameError::Io(_)))));
}
