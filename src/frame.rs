//! # Frame
//!
//! The `frame` module models WebSocket frames as defined in [RFC 6455 Section 5.2](https://datatracker.ietf.org/doc/html/rfc6455#section-5.2).
//! A [`FrameHeader`] holds every field of the fixed and variable header, and a [`Frame`]
//! pairs a header with the payload it describes.
//!
//! ### Frame Binary Format
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |         (16 or 64 bits)       |
//! |N|V|V|V|       |S|             |                               |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |        Extended payload length continued, if payload len == 127|
//! +---------------------------------------------------------------+
//! |                               |   Masking-key, if MASK set to 1|
//! +-------------------------------+-------------------------------+
//! |     Masking-key (continued)       |          Payload Data      |
//! +-----------------------------------+ - - - - - - - - - - - - - -+
//! :                     Payload Data continued ...                :
//! +---------------------------------------------------------------+
//! ```
//!
//! Frames come in two categories:
//!
//! - **Data Frames**: `Text`, `Binary` and `Continuation`, which may be fragmented.
//! - **Control Frames**: `Close`, `Ping` and `Pong`, which carry at most 125 bytes and
//!   always have the FIN bit set.
//!
//! The reserved opcodes 0x3-0x7 and 0xB-0xF are kept as [`OpCode::Reserved`] so that a
//! frame using them round-trips through the codec; deciding whether to accept them is
//! left to the application.
//!
//! ## Masking Key Byte Order
//!
//! The 32-bit mask key is written to the wire in little-endian order, and byte `i` of the
//! payload is XORed with byte `i % 4` of that little-endian representation. Encoding and
//! decoding use the same convention, so `0x6334_3261` travels as `61 32 34 63`.
use bytes::{Bytes, BytesMut};

use crate::{FrameError, Result, Violation};

/// Largest payload a control frame may carry.
pub const MAX_CONTROL_PAYLOAD: u64 = 125;

/// Largest payload length expressible in the 16-bit extended form.
pub(crate) const MAX_EXTENDED_16: u64 = u16::MAX as u64;

/// Largest payload length expressible in the 64-bit extended form, whose top bit is reserved.
pub(crate) const MAX_EXTENDED_64: u64 = i64::MAX as u64;

/// Longest possible header: 2 fixed bytes, 8 bytes of extended length and a 4-byte mask key.
pub(crate) const MAX_HEAD_SIZE: usize = 14;

/// WebSocket operation code (OpCode) that determines the semantic meaning and handling of a frame.
///
/// The numeric values for each OpCode are defined in [RFC 6455, Section 11.8](https://datatracker.ietf.org/doc/html/rfc6455#section-11.8):
/// - Continuation = 0x0
/// - Text = 0x1
/// - Binary = 0x2
/// - Close = 0x8
/// - Ping = 0x9
/// - Pong = 0xA
///
/// Any other 4-bit value is represented by `Reserved(n)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
    /// One of the unassigned codes 0x3-0x7 or 0xB-0xF.
    Reserved(u8),
}

impl OpCode {
    /// Returns `true` if the `OpCode` represents a control frame (`Close`, `Ping`, or `Pong`).
    ///
    /// Control frames cannot be fragmented and their payload must not exceed 125 bytes.
    #[inline]
    pub fn is_control(&self) -> bool {
        matches!(*self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }

    /// Returns `true` for the opcodes that carry message data.
    #[inline]
    pub fn is_data(&self) -> bool {
        matches!(*self, OpCode::Continuation | OpCode::Text | OpCode::Binary)
    }

    /// Returns `true` for the unassigned opcodes.
    #[inline]
    pub fn is_reserved(&self) -> bool {
        matches!(*self, OpCode::Reserved(_))
    }
}

impl TryFrom<u8> for OpCode {
    type Error = FrameError;

    /// Converts a raw opcode value into an `OpCode`.
    ///
    /// Every value in the 4-bit range maps to a variant; values above 0xF fail with
    /// `FrameError::InvalidOpCode`.
    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x0 => Ok(Self::Continuation),
            0x1 => Ok(Self::Text),
            0x2 => Ok(Self::Binary),
            0x8 => Ok(Self::Close),
            0x9 => Ok(Self::Ping),
            0xA => Ok(Self::Pong),
            0x3..=0x7 | 0xB..=0xF => Ok(Self::Reserved(value)),
            _ => Err(FrameError::InvalidOpCode(value)),
        }
    }
}

impl From<OpCode> for u8 {
    /// Converts an `OpCode` into its 4-bit wire value.
    fn from(val: OpCode) -> Self {
        match val {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
            OpCode::Reserved(code) => code & 0x0F,
        }
    }
}

/// The fields of a WebSocket frame header.
///
/// A header can only be obtained through its validating constructors, so every value
/// satisfies the framing rules:
///
/// - control frames declare at most 125 payload bytes and have FIN set,
/// - the payload length fits the 64-bit extended form (top bit clear),
/// - a mask key is present exactly when the MASK bit is set.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    fin: bool,
    rsv1: bool,
    rsv2: bool,
    rsv3: bool,
    opcode: OpCode,
    mask_key: Option<u32>,
    payload_length: u64,
}

impl FrameHeader {
    /// Creates a header with all reserved bits cleared.
    ///
    /// # Errors
    /// - `InvalidLength` if `opcode` is a control opcode and `payload_length` exceeds 125,
    ///   or if `payload_length` has its most significant bit set.
    /// - `ProtocolError(ControlFrameFragmented)` if `opcode` is a control opcode and `fin` is `false`.
    pub fn new(
        fin: bool,
        opcode: OpCode,
        mask_key: Option<u32>,
        payload_length: u64,
    ) -> Result<Self> {
        Self::with_reserved(fin, [false; 3], opcode, mask_key, payload_length)
    }

    /// Creates a header with explicit RSV1, RSV2 and RSV3 bits.
    ///
    /// The reserved bits belong to extensions; the codec carries them through untouched.
    pub fn with_reserved(
        fin: bool,
        [rsv1, rsv2, rsv3]: [bool; 3],
        opcode: OpCode,
        mask_key: Option<u32>,
        payload_length: u64,
    ) -> Result<Self> {
        if payload_length > MAX_EXTENDED_64 {
            return Err(FrameError::InvalidLength(payload_length));
        }
        if opcode.is_control() {
            if payload_length > MAX_CONTROL_PAYLOAD {
                return Err(FrameError::InvalidLength(payload_length));
            }
            if !fin {
                return Err(Violation::ControlFrameFragmented.into());
            }
        }

        Ok(Self {
            fin,
            rsv1,
            rsv2,
            rsv3,
            opcode,
            mask_key,
            payload_length,
        })
    }

    /// Creates a header from the raw first header byte's opcode nibble and the remaining fields.
    ///
    /// # Errors
    /// `InvalidOpCode` if `opcode` is outside 0x0-0xF, plus the errors of [`FrameHeader::with_reserved`].
    pub fn from_raw(
        fin: bool,
        rsv: [bool; 3],
        opcode: u8,
        mask_key: Option<u32>,
        payload_length: u64,
    ) -> Result<Self> {
        let opcode = OpCode::try_from(opcode)?;
        Self::with_reserved(fin, rsv, opcode, mask_key, payload_length)
    }

    /// Indicates if this is the final fragment of a message.
    #[inline]
    pub fn fin(&self) -> bool {
        self.fin
    }

    #[inline]
    pub fn rsv1(&self) -> bool {
        self.rsv1
    }

    #[inline]
    pub fn rsv2(&self) -> bool {
        self.rsv2
    }

    #[inline]
    pub fn rsv3(&self) -> bool {
        self.rsv3
    }

    #[inline]
    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    /// Returns whether the MASK bit is set.
    #[inline]
    pub fn is_masked(&self) -> bool {
        self.mask_key.is_some()
    }

    #[inline]
    pub fn mask_key(&self) -> Option<u32> {
        self.mask_key
    }

    #[inline]
    pub fn payload_length(&self) -> u64 {
        self.payload_length
    }

    /// Returns a copy of this header with the mask key replaced.
    #[inline]
    pub fn with_mask_key(self, mask_key: Option<u32>) -> Self {
        Self { mask_key, ..self }
    }

    /// Number of bytes this header occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        let length_size = if self.payload_length <= MAX_CONTROL_PAYLOAD {
            0
        } else if self.payload_length <= MAX_EXTENDED_16 {
            2
        } else {
            8
        };
        2 + length_size + self.mask_key.map_or(0, |_| 4)
    }

    /// Header for a data frame whose payload is already in memory. Such a length always
    /// fits the 64-bit form, so no validation is needed.
    pub(crate) fn data(fin: bool, opcode: OpCode, payload_length: usize) -> Self {
        Self {
            fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            mask_key: None,
            payload_length: payload_length as u64,
        }
    }

    /// Formats the header into `head` and returns the number of bytes written.
    pub(crate) fn fmt_head(&self, head: &mut [u8; MAX_HEAD_SIZE]) -> usize {
        head[0] = (self.fin as u8) << 7
            | (self.rsv1 as u8) << 6
            | (self.rsv2 as u8) << 5
            | (self.rsv3 as u8) << 4
            | u8::from(self.opcode);

        let len = self.payload_length;
        let size = if len <= MAX_CONTROL_PAYLOAD {
            head[1] = len as u8;
            2
        } else if len <= MAX_EXTENDED_16 {
            head[1] = 126;
            head[2..4].copy_from_slice(&(len as u16).to_be_bytes());
            4
        } else {
            head[1] = 127;
            head[2..10].copy_from_slice(&len.to_be_bytes());
            10
        };

        if let Some(key) = self.mask_key {
            head[1] |= 0x80;
            head[size..size + 4].copy_from_slice(&key.to_le_bytes());
            size + 4
        } else {
            size
        }
    }
}

/// A frame header together with its payload.
///
/// The payload held here is always the plain (unmasked) data; masking only exists on the
/// wire. The length of the payload always equals the header's `payload_length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    header: FrameHeader,
    payload: Bytes,
}

impl Frame {
    /// Pairs a header with its payload.
    ///
    /// # Errors
    /// `LengthMismatch` if the payload length differs from `header.payload_length()`.
    pub fn new(header: FrameHeader, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() as u64 != header.payload_length {
            return Err(FrameError::LengthMismatch {
                declared: header.payload_length,
                actual: payload.len(),
            });
        }
        Ok(Self { header, payload })
    }

    /// A final, unmasked `Text` frame.
    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self::data(true, OpCode::Text, payload)
    }

    /// A final, unmasked `Binary` frame.
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self::data(true, OpCode::Binary, payload)
    }

    /// An unmasked `Continuation` frame.
    pub fn continuation(fin: bool, payload: impl Into<Bytes>) -> Self {
        Self::data(fin, OpCode::Continuation, payload)
    }

    /// An unmasked `Ping` frame. Fails with `InvalidLength` above 125 bytes.
    pub fn ping(payload: impl Into<Bytes>) -> Result<Self> {
        Self::control(OpCode::Ping, payload)
    }

    /// An unmasked `Pong` frame. Fails with `InvalidLength` above 125 bytes.
    pub fn pong(payload: impl Into<Bytes>) -> Result<Self> {
        Self::control(OpCode::Pong, payload)
    }

    /// An unmasked `Close` frame with a raw payload.
    ///
    /// This method does not validate if `payload` is a valid close frame payload.
    pub fn close_raw(payload: impl Into<Bytes>) -> Result<Self> {
        Self::control(OpCode::Close, payload)
    }

    pub(crate) fn data(fin: bool, opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            header: FrameHeader::data(fin, opcode, payload.len()),
            payload,
        }
    }

    fn control(opcode: OpCode, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        let header = FrameHeader::new(true, opcode, None, payload.len() as u64)?;
        Ok(Self { header, payload })
    }

    /// Pairs a header with a payload that is known to match its length.
    pub(crate) fn from_parts_unchecked(header: FrameHeader, payload: BytesMut) -> Self {
        debug_assert_eq!(header.payload_length, payload.len() as u64);
        Self {
            header,
            payload: payload.freeze(),
        }
    }

    #[inline]
    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    #[inline]
    pub fn fin(&self) -> bool {
        self.header.fin
    }

    #[inline]
    pub fn opcode(&self) -> OpCode {
        self.header.opcode
    }

    /// Returns a copy of this frame that will be masked with `mask_key` when encoded.
    pub fn with_mask_key(self, mask_key: Option<u32>) -> Self {
        Self {
            header: self.header.with_mask_key(mask_key),
            payload: self.payload,
        }
    }

    /// Checks if the frame payload is valid UTF-8.
    #[inline]
    pub fn is_utf8(&self) -> bool {
        std::str::from_utf8(&self.payload).is_ok()
    }

    /// Splits the frame into its header and payload.
    pub fn into_parts(self) -> (FrameHeader, Bytes) {
        (self.header, self.payload)
    }

    /// Serializes the frame, masking the payload if the header carries a mask key.
    pub fn encode(&self) -> BytesMut {
        let mut dst = BytesMut::with_capacity(self.header.encoded_len() + self.payload.len());
        crate::codec::write_frame(&self.header, &self.payload, &mut dst);
        dst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod opcode_tests {
        use super::*;

        #[test]
        fn test_is_control() {
            assert!(OpCode::Close.is_control());
            assert!(OpCode::Ping.is_control());
            assert!(OpCode::Pong.is_control());

            assert!(!OpCode::Continuation.is_control());
            assert!(!OpCode::Text.is_control());
            assert!(!OpCode::Binary.is_control());
            assert!(!OpCode::Reserved(0xB).is_control());
        }

        #[test]
        fn test_try_from_u8_valid() {
            assert_eq!(OpCode::try_from(0x0).unwrap(), OpCode::Continuation);
            assert_eq!(OpCode::try_from(0x1).unwrap(), OpCode::Text);
            assert_eq!(OpCode::try_from(0x2).unwrap(), OpCode::Binary);
            assert_eq!(OpCode::try_from(0x8).unwrap(), OpCode::Close);
            assert_eq!(OpCode::try_from(0x9).unwrap(), OpCode::Ping);
            assert_eq!(OpCode::try_from(0xA).unwrap(), OpCode::Pong);
        }

        #[test]
        fn test_try_from_u8_reserved() {
            for code in [0x3, 0x4, 0x5, 0x6, 0x7, 0xB, 0xC, 0xD, 0xE, 0xF] {
                let opcode = OpCode::try_from(code).unwrap();
                assert_eq!(opcode, OpCode::Reserved(code));
                assert!(opcode.is_reserved());
                assert_eq!(u8::from(opcode), code);
            }
        }

        #[test]
        fn test_try_from_u8_out_of_range() {
            for code in [0x10, 0x7F, 0xFF] {
                assert!(matches!(
                    OpCode::try_from(code),
                    Err(FrameError::InvalidOpCode(c)) if c == code
                ));
            }
        }

        #[test]
        fn test_from_opcode_to_u8() {
            assert_eq!(u8::from(OpCode::Continuation), 0x0);
            assert_eq!(u8::from(OpCode::Text), 0x1);
            assert_eq!(u8::from(OpCode::Binary), 0x2);
            assert_eq!(u8::from(OpCode::Close), 0x8);
            assert_eq!(u8::from(OpCode::Ping), 0x9);
            assert_eq!(u8::from(OpCode::Pong), 0xA);
        }
    }

    mod header_tests {
        use super::*;

        #[test]
        fn test_control_length_limit() {
            for opcode in [OpCode::Close, OpCode::Ping, OpCode::Pong] {
                assert!(FrameHeader::new(true, opcode, None, 125).is_ok());
                assert!(matches!(
                    FrameHeader::new(true, opcode, None, 126),
                    Err(FrameError::InvalidLength(126))
                ));
            }
            // data frames have no such limit
            assert!(FrameHeader::new(true, OpCode::Binary, None, 126).is_ok());
        }

        #[test]
        fn test_control_must_be_final() {
            assert!(matches!(
                FrameHeader::new(false, OpCode::Ping, None, 0),
                Err(FrameError::ProtocolError(Violation::ControlFrameFragmented))
            ));
            assert!(FrameHeader::new(false, OpCode::Text, None, 0).is_ok());
        }

        #[test]
        fn test_top_bit_of_length_rejected() {
            assert!(FrameHeader::new(true, OpCode::Binary, None, MAX_EXTENDED_64).is_ok());
            assert!(matches!(
                FrameHeader::new(true, OpCode::Binary, None, MAX_EXTENDED_64 + 1),
                Err(FrameError::InvalidLength(_))
            ));
        }

        #[test]
        fn test_from_raw() {
            let header = FrameHeader::from_raw(true, [true, false, true], 0x5, None, 3).unwrap();
            assert_eq!(header.opcode(), OpCode::Reserved(0x5));
            assert!(header.rsv1());
            assert!(!header.rsv2());
            assert!(header.rsv3());

            assert!(matches!(
                FrameHeader::from_raw(true, [false; 3], 0x10, None, 0),
                Err(FrameError::InvalidOpCode(0x10))
            ));
        }

        #[test]
        fn test_fmt_head() {
            let mask_key = 0xDDCC_BBAA;
            let header = FrameHeader::new(true, OpCode::Text, Some(mask_key), 11).unwrap();

            let mut head = [0u8; MAX_HEAD_SIZE];
            let head_size = header.fmt_head(&mut head);

            assert_eq!(head_size, 2 + 4);
            assert_eq!(head_size, header.encoded_len());
            // FIN=1, RSV1-3=0, OpCode=0x1 (Text)
            assert_eq!(head[0], 0x81);
            assert_eq!(head[1], 0x80 | 11);
            assert_eq!(&head[2..6], &[0xAA, 0xBB, 0xCC, 0xDD]);
        }

        #[test]
        fn test_fmt_head_reserved_bits() {
            let header =
                FrameHeader::with_reserved(false, [true, true, true], OpCode::Binary, None, 0)
                    .unwrap();
            let mut head = [0u8; MAX_HEAD_SIZE];
            assert_eq!(header.fmt_head(&mut head), 2);
            assert_eq!(head[0], 0b0111_0010);
            assert_eq!(head[1], 0);
        }

        #[test]
        fn test_fmt_head_length_classes() {
            let cases: [(u64, u8, usize); 5] = [
                (0, 0, 2),
                (125, 125, 2),
                (126, 126, 4),
                (65535, 126, 4),
                (65536, 127, 10),
            ];
            for (len, selector, size) in cases {
                let header = FrameHeader::new(true, OpCode::Binary, None, len).unwrap();
                let mut head = [0u8; MAX_HEAD_SIZE];
                assert_eq!(header.fmt_head(&mut head), size, "length {len}");
                assert_eq!(head[1], selector, "length {len}");
                match size {
                    4 => assert_eq!(u16::from_be_bytes([head[2], head[3]]) as u64, len),
                    10 => assert_eq!(
                        u64::from_be_bytes(head[2..10].try_into().unwrap()),
                        len
                    ),
                    _ => {}
                }
            }
        }
    }

    mod frame_tests {
        use super::*;

        #[test]
        fn test_frame_new_length_mismatch() {
            let header = FrameHeader::new(true, OpCode::Text, None, 4).unwrap();
            assert!(matches!(
                Frame::new(header, "abc"),
                Err(FrameError::LengthMismatch {
                    declared: 4,
                    actual: 3
                })
            ));
            assert!(Frame::new(header, "abcd").is_ok());
        }

        #[test]
        fn test_control_constructors() {
            let ping = Frame::ping("Ping payload").unwrap();
            assert!(ping.fin());
            assert_eq!(ping.opcode(), OpCode::Ping);

            assert!(Frame::pong(vec![0u8; 126]).is_err());
            assert!(Frame::close_raw(vec![0u8; 125]).is_ok());
        }

        #[test]
        fn test_frame_is_utf8() {
            assert!(Frame::text("Hello, 世界").is_utf8());
            assert!(!Frame::binary(vec![0xFF, 0xFE, 0xFD]).is_utf8());
        }

        #[test]
        fn test_with_mask_key() {
            let frame = Frame::binary("Mask me").with_mask_key(Some(0x0403_0201));
            assert!(frame.header().is_masked());
            assert_eq!(frame.payload(), &Bytes::from("Mask me"));
        }

        #[test]
        fn test_encode_leaves_payload_unmasked() {
            let frame = Frame::text("Hi!").with_mask_key(Some(0x6334_3261));
            let wire = frame.encode();
            assert_eq!(&wire[..2], &[0x81, 0x83]);
            assert_eq!(frame.payload(), &Bytes::from("Hi!"));
        }
    }
}
