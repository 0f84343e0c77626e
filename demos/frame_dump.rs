//! Encodes a fragmented client message, prints the wire bytes, then decodes and
//! reassembles it the way a server would.
//!
//! Run with `cargo run --example frame_dump --features logging`.

use anyhow::Result;
use bytes::BytesMut;
use tokio_util::codec::{Decoder as _, Encoder as _};
use wsframe::{
    codec::{Codec, Role},
    FixedMask, Frame, FrameHeader, OpCode, Options, Reassembler,
};

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn main() -> Result<()> {
    simple_logger::init_with_level(log::Level::Trace).expect("log");

    let options = Options::default().with_utf8();
    // a fixed key keeps the dump reproducible; real clients use random keys
    let key = u32::from_le_bytes(*b"b429");
    let mut client = Codec::with_key_source(Role::Client, &options, FixedMask(key));
    let mut server = Codec::new(Role::Server, &options);

    // "Hi!" goes out as a non-final text frame, a one-byte continuation closes the message
    let first = Frame::new(FrameHeader::new(false, OpCode::Text, None, 3)?, "Hi!")?;
    let last = Frame::continuation(true, vec![0u8]);

    let mut wire = BytesMut::new();
    for frame in [first, last] {
        let start = wire.len();
        client.encode(frame, &mut wire)?;
        log::info!("client frame: {}", hex(&wire[start..]));
    }

    let mut reassembler = Reassembler::new(&options);
    while let Some(frame) = server.decode(&mut wire)? {
        log::info!(
            "server got fin={} opcode={:?} payload={:?}",
            frame.fin(),
            frame.opcode(),
            frame.payload()
        );
        if let Some(message) = reassembler.push(frame)? {
            log::info!("message complete: {:?}", message.as_str());
        }
    }

    Ok(())
}
