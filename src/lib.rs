//! # wsframe
//! A symmetric implementation of the WebSocket wire framing defined by RFC 6455 §5: frame
//! headers, the client-to-server masking cipher, encoding and decoding of single frames, and
//! the fragmentation and reassembly of logical messages across several frames.
//!
//! The crate does no I/O. The transport hands bytes to the decoder and writes the bytes
//! returned by the encoder; everything in between is a pure transform over buffers, so a
//! codec value can be used from any thread or task without locking.
//!
//! # Features
//! The crate provides a few optional features that can be enabled in your `Cargo.toml`:
//!
//! - `logging`: Enables debug logging for frame encoding, decoding and reassembly using the `log` crate.
//!   Useful for inspecting what goes over the wire.
//!
//! - `simd`: Validates UTF-8 in reassembled text messages with `simdutf8`.
//!
//! # One-shot Example
//! ```rust
//! use wsframe::{codec::{self, Role}, FrameHeader, OpCode};
//!
//! # fn main() -> wsframe::Result<()> {
//! let header = FrameHeader::new(true, OpCode::Text, Some(0x6334_3261), 3)?;
//! let wire = codec::encode(&header, b"Hi!")?;
//! assert_eq!(wire.len(), 9);
//!
//! // The frame came from a client, so it is decoded by the server side.
//! let (frame, consumed) = codec::decode(&wire, Role::Server)?;
//! assert_eq!(consumed, 9);
//! assert_eq!(&frame.payload()[..], b"Hi!");
//! # Ok(())
//! # }
//! ```
//!
//! # Streaming Example
//! ```rust
//! use bytes::BytesMut;
//! use tokio_util::codec::{Decoder as _, Encoder as _};
//! use wsframe::{codec::{Codec, Role}, Message, Options};
//!
//! # fn main() -> wsframe::Result<()> {
//! let options = Options::default().with_max_frame_payload(4);
//! let mut client = Codec::new(Role::Client, &options);
//! let mut server = Codec::new(Role::Server, &options);
//!
//! let mut wire = BytesMut::new();
//! client.encode(Message::text("Hello!"), &mut wire)?;
//!
//! let first = server.decode(&mut wire)?.expect("first fragment");
//! assert!(!first.fin());
//! let last = server.decode(&mut wire)?.expect("last fragment");
//! assert!(last.fin());
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod codec;
pub mod frame;
pub mod mask;
pub mod message;
mod options;

use thiserror::Error;

// Re-exports
pub use frame::{Frame, FrameHeader, OpCode};
pub use mask::{FixedMask, MaskKeySource, RandomMask};
pub use message::{fragment, Message, Reassembler};
pub use options::{Options, MAX_MESSAGE_SIZE, MAX_PAYLOAD_READ};

/// A result type for frame operations, using `FrameError` as the error type.
pub type Result<T> = std::result::Result<T, FrameError>;

/// Represents errors that can occur while building, encoding or decoding frames.
///
/// [`FrameError::Incomplete`] is the only kind a caller is expected to retry on: it means
/// the buffer ends before the frame does. Every other kind is either a malformed peer or a
/// mistake at the call site, and the application decides whether to close the connection.
#[derive(Error, Debug)]
pub enum FrameError {
    /// A raw opcode value does not fit in the 4-bit opcode field.
    #[error("Invalid opcode (byte={0})")]
    InvalidOpCode(u8),

    /// The payload length cannot be carried by the frame: a control frame longer than
    /// 125 bytes, or a length with the most significant bit of the 64-bit form set.
    #[error("Invalid payload length ({0})")]
    InvalidLength(u64),

    /// The payload handed to the encoder disagrees with the length declared in the header.
    #[error("Payload length mismatch: header declares {declared} bytes, payload has {actual}")]
    LengthMismatch { declared: u64, actual: usize },

    /// The buffer holds only a prefix of a frame. `needed` is the minimum number of
    /// additional bytes required before decoding can make progress.
    #[error("Incomplete frame: at least {needed} more bytes needed")]
    Incomplete { needed: usize },

    /// The peer broke a framing rule of the protocol.
    #[error("Protocol error: {0}")]
    ProtocolError(Violation),

    /// A frame or reassembled message is larger than the configured limit.
    #[error("Frame too large")]
    FrameTooLarge,

    /// A text message does not contain valid UTF-8.
    #[error("Invalid UTF-8")]
    InvalidUTF8,

    /// Wraps I/O errors surfaced through `tokio_util::codec::Framed`.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Returns `true` if more bytes may turn this failure into a successful decode.
    #[inline]
    pub fn is_incomplete(&self) -> bool {
        matches!(self, FrameError::Incomplete { .. })
    }
}

impl From<Violation> for FrameError {
    fn from(violation: Violation) -> Self {
        FrameError::ProtocolError(violation)
    }
}

/// Protocol rules whose violation is reported through [`FrameError::ProtocolError`].
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Violation {
    /// An unmasked frame reached a server. Clients must mask every frame.
    #[error("frame from client is not masked")]
    MaskRequired,

    /// A masked frame reached a client. Servers must never mask.
    #[error("frame from server is masked")]
    MaskForbidden,

    /// A control frame arrived with the FIN bit cleared.
    #[error("control frame must not be fragmented")]
    ControlFrameFragmented,

    /// A new `Text` or `Binary` frame arrived before the previous message was finished.
    #[error("data frame received while a fragmented message is open")]
    InvalidFragment,

    /// A `Continuation` frame arrived without a message to continue.
    #[error("continuation frame without a message to continue")]
    InvalidContinuationFrame,

    /// A frame used one of the reserved opcodes 0x3-0x7 or 0xB-0xF.
    #[error("reserved opcode {0:#x}")]
    ReservedOpCode(u8),
}
