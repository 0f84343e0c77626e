//! Logical messages and their mapping onto frames.
//!
//! A message is what the application sends or receives: one opcode and one payload. On the
//! wire a data message may be split into several frames, the first carrying the message
//! opcode and the rest carrying `Continuation`, with FIN set only on the last one.
//! [`fragment`] performs the split and [`Reassembler`] undoes it.
use bytes::{Bytes, BytesMut};

use crate::{
    frame::{Frame, FrameHeader, OpCode},
    FrameError, Options, Result, Violation,
};

/// A complete WebSocket message: an opcode and the whole payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// The operation code indicating the type of message (Text, Binary, Close, etc.)
    pub opcode: OpCode,
    /// The message payload, never masked.
    pub payload: Bytes,
}

impl Message {
    /// Creates a text message.
    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self {
            opcode: OpCode::Text,
            payload: payload.into(),
        }
    }

    /// Creates a binary message.
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self {
            opcode: OpCode::Binary,
            payload: payload.into(),
        }
    }

    /// Creates a ping message. Fails with `InvalidLength` above 125 bytes.
    pub fn ping(payload: impl Into<Bytes>) -> Result<Self> {
        Self::control(OpCode::Ping, payload.into())
    }

    /// Creates a pong message. Fails with `InvalidLength` above 125 bytes.
    pub fn pong(payload: impl Into<Bytes>) -> Result<Self> {
        Self::control(OpCode::Pong, payload.into())
    }

    /// Creates a close message with a raw payload.
    ///
    /// The payload is not checked for a valid close code or reason.
    pub fn close_raw(payload: impl Into<Bytes>) -> Result<Self> {
        Self::control(OpCode::Close, payload.into())
    }

    fn control(opcode: OpCode, payload: Bytes) -> Result<Self> {
        FrameHeader::new(true, opcode, None, payload.len() as u64)?;
        Ok(Self { opcode, payload })
    }

    /// Returns the payload as a string slice, or `None` if it is not valid UTF-8.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// Converts a `Message` into a tuple of `(OpCode, Bytes)`.
impl From<Message> for (OpCode, Bytes) {
    fn from(val: Message) -> Self {
        (val.opcode, val.payload)
    }
}

/// Converts a tuple of `(OpCode, Bytes)` to a `Message`.
impl From<(OpCode, Bytes)> for Message {
    fn from((opcode, payload): (OpCode, Bytes)) -> Self {
        Self { opcode, payload }
    }
}

/// Splits a message into unmasked frames carrying at most `max_frame_payload` bytes each.
///
/// Data messages that fit, control messages and messages with a reserved opcode produce
/// exactly one final frame. An empty data message produces one empty final frame. A
/// `max_frame_payload` of zero means no limit.
///
/// # Errors
/// `InvalidLength` if a control message carries more than 125 bytes.
pub fn fragment(message: Message, max_frame_payload: usize) -> Result<Vec<Frame>> {
    let Message {
        opcode,
        mut payload,
    } = message;

    if opcode.is_control() {
        let header = FrameHeader::new(true, opcode, None, payload.len() as u64)?;
        return Ok(vec![Frame::new(header, payload)?]);
    }

    if !opcode.is_data() || max_frame_payload == 0 || payload.len() <= max_frame_payload {
        return Ok(vec![Frame::data(true, opcode, payload)]);
    }

    let mut frames = Vec::with_capacity(payload.len().div_ceil(max_frame_payload));
    let mut opcode = opcode;
    while payload.len() > max_frame_payload {
        let chunk = payload.split_to(max_frame_payload);
        frames.push(Frame::data(false, opcode, chunk));
        opcode = OpCode::Continuation;
    }
    frames.push(Frame::data(true, opcode, payload));

    #[cfg(feature = "logging")]
    log::debug!("fragmented message into {} frames", frames.len());

    Ok(frames)
}

/// Joins fragmented data frames back into messages.
///
/// [`Reassembler`] follows a sans-io design: the caller feeds it decoded frames one at a
/// time and it hands back a [`Message`] whenever one is complete. Control frames may arrive
/// between the fragments of a data message and are returned immediately.
///
/// # Example
/// ```
/// use wsframe::{Frame, OpCode, Options, Reassembler};
///
/// # fn main() -> wsframe::Result<()> {
/// let mut reassembler = Reassembler::new(&Options::default());
///
/// let first = wsframe::fragment(wsframe::Message::text("Hi!"), 2)?;
/// assert_eq!(first.len(), 2);
///
/// let mut frames = first.into_iter();
/// assert!(reassembler.push(frames.next().unwrap())?.is_none());
///
/// let pong = reassembler.push(Frame::pong("between fragments")?)?.unwrap();
/// assert_eq!(pong.opcode, OpCode::Pong);
///
/// let message = reassembler.push(frames.next().unwrap())?.unwrap();
/// assert_eq!(message.opcode, OpCode::Text);
/// assert_eq!(message.as_str(), Some("Hi!"));
/// # Ok(())
/// # }
/// ```
pub struct Reassembler {
    /// Opcode of the message being accumulated, if one is open.
    fragment: Option<OpCode>,
    /// Accumulated data from fragmented frames.
    accumulated: BytesMut,
    max_message_size: usize,
    check_utf8: bool,
}

impl Reassembler {
    pub fn new(options: &Options) -> Self {
        Self {
            fragment: None,
            accumulated: BytesMut::new(),
            max_message_size: options.message_size_limit(),
            check_utf8: options.check_utf8,
        }
    }

    /// Returns `true` if no fragmented message is currently open.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.fragment.is_none()
    }

    /// Processes one incoming frame.
    ///
    /// # Returns
    /// - `Ok(Some(Message))` if the frame completes a message or is a control frame.
    /// - `Ok(None)` if the frame is part of a fragmented message and not yet complete.
    /// - `Err(FrameError)` if the frame is out of sequence, uses a reserved opcode, makes the
    ///   message too large, or completes a text message that is not valid UTF-8.
    pub fn push(&mut self, frame: Frame) -> Result<Option<Message>> {
        let (header, payload) = frame.into_parts();
        let opcode = header.opcode();

        match opcode {
            OpCode::Text | OpCode::Binary => {
                if self.fragment.is_some() {
                    return Err(Violation::InvalidFragment.into());
                }
                if payload.len() > self.max_message_size {
                    return Err(FrameError::FrameTooLarge);
                }

                if header.fin() {
                    self.complete(Message { opcode, payload }).map(Some)
                } else {
                    self.fragment = Some(opcode);
                    self.accumulated.extend_from_slice(&payload);
                    Ok(None)
                }
            }
            OpCode::Continuation => {
                let opcode = self
                    .fragment
                    .ok_or(Violation::InvalidContinuationFrame)?;

                if self.accumulated.len() + payload.len() > self.max_message_size {
                    self.reset();
                    return Err(FrameError::FrameTooLarge);
                }
                self.accumulated.extend_from_slice(&payload);

                if header.fin() {
                    self.fragment = None;
                    let payload = self.accumulated.split().freeze();
                    self.complete(Message { opcode, payload }).map(Some)
                } else {
                    Ok(None)
                }
            }
            OpCode::Close | OpCode::Ping | OpCode::Pong => Ok(Some(Message { opcode, payload })),
            OpCode::Reserved(code) => {
                #[cfg(feature = "logging")]
                log::debug!("rejecting frame with reserved opcode {code:#x}");
                Err(Violation::ReservedOpCode(code).into())
            }
        }
    }

    /// Drops any partially accumulated message.
    pub fn reset(&mut self) {
        self.fragment = None;
        self.accumulated.clear();
    }

    fn complete(&self, message: Message) -> Result<Message> {
        if self.check_utf8 && message.opcode == OpCode::Text && !is_utf8(&message.payload) {
            return Err(FrameError::InvalidUTF8);
        }
        Ok(message)
    }
}

#[inline]
fn is_utf8(payload: &[u8]) -> bool {
    #[cfg(not(feature = "simd"))]
    {
        std::str::from_utf8(payload).is_ok()
    }
    #[cfg(feature = "simd")]
    {
        simdutf8::basic::from_utf8(payload).is_ok()
    }
}
