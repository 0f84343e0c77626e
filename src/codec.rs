//! Encoding and decoding of single frames.
//!
//! [`encode`] and [`decode`] are one-shot transforms over byte slices. [`Decoder`],
//! [`Encoder`] and [`Codec`] wrap the same logic in the `tokio_util::codec` traits so a
//! transport can be driven through `Framed`.
use bytes::{Buf, BytesMut};
use tokio_util::codec;

use crate::{
    frame::{Frame, FrameHeader, MAX_HEAD_SIZE},
    mask::{apply_mask, MaskKeySource, RandomMask},
    message::{fragment, Message},
    FrameError, Options, Result, Violation,
};

/// Fixed part of every frame header.
const MIN_HEAD_SIZE: usize = 2;

/// The side of the connection the codec is running on.
///
/// The role decides the masking rules: a server receives masked frames and sends
/// unmasked ones, a client does the opposite.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Role {
    /// Decodes frames sent by clients; every incoming frame must be masked.
    Server,
    /// Decodes frames sent by servers; no incoming frame may be masked.
    Client,
}

impl Role {
    fn check_mask(self, masked: bool) -> Result<()> {
        match (self, masked) {
            (Role::Server, false) => Err(Violation::MaskRequired.into()),
            (Role::Client, true) => Err(Violation::MaskForbidden.into()),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Server => {
                write!(f, "server")
            }
            Self::Client => {
                write!(f, "client")
            }
        }
    }
}

/// Encodes a header and its payload into a freshly allocated buffer.
///
/// If the header carries a mask key the payload is masked in the output; `payload` itself
/// is never modified.
///
/// # Errors
/// `LengthMismatch` if `payload.len()` differs from `header.payload_length()`.
pub fn encode(header: &FrameHeader, payload: &[u8]) -> Result<BytesMut> {
    let mut dst = BytesMut::new();
    encode_into(header, payload, &mut dst)?;
    Ok(dst)
}

/// Appends the encoded frame to `dst`. See [`encode`].
pub fn encode_into(header: &FrameHeader, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if header.payload_length() != payload.len() as u64 {
        return Err(FrameError::LengthMismatch {
            declared: header.payload_length(),
            actual: payload.len(),
        });
    }
    write_frame(header, payload, dst);
    Ok(())
}

/// Writes a frame whose length has already been checked.
pub(crate) fn write_frame(header: &FrameHeader, payload: &[u8], dst: &mut BytesMut) {
    let mut head = [0; MAX_HEAD_SIZE];
    let size = header.fmt_head(&mut head);

    dst.reserve(size + payload.len());
    dst.extend_from_slice(&head[..size]);

    let start = dst.len();
    dst.extend_from_slice(payload);
    if let Some(key) = header.mask_key() {
        apply_mask(&mut dst[start..], key);
    }

    #[cfg(feature = "logging")]
    log::trace!(
        ">>fin={} opcode={:?} masked={} len={}",
        header.fin(),
        header.opcode(),
        header.is_masked(),
        payload.len()
    );
}

/// Parses the header at the start of `src`.
///
/// Returns the header and the number of bytes it occupies; the payload starts right after.
///
/// # Errors
/// - `Incomplete` if `src` ends inside the header.
/// - `ProtocolError` if the MASK bit breaks the rule for `role`, or a control frame is fragmented.
/// - `InvalidLength` if the 64-bit length has its top bit set or a control frame is longer than 125 bytes.
pub fn decode_head(src: &[u8], role: Role) -> Result<(FrameHeader, usize)> {
    if src.len() < MIN_HEAD_SIZE {
        return Err(FrameError::Incomplete {
            needed: MIN_HEAD_SIZE - src.len(),
        });
    }

    let fin = src[0] & 0b1000_0000 != 0;
    let rsv1 = src[0] & 0b0100_0000 != 0;
    let rsv2 = src[0] & 0b0010_0000 != 0;
    let rsv3 = src[0] & 0b0001_0000 != 0;
    let opcode = src[0] & 0b0000_1111;

    let masked = src[1] & 0b1000_0000 != 0;
    role.check_mask(masked)?;

    let length_code = src[1] & 0x7F;
    let extra = match length_code {
        126 => 2,
        127 => 8,
        _ => 0,
    };
    let head_size = MIN_HEAD_SIZE + extra + masked as usize * 4;
    if src.len() < head_size {
        return Err(FrameError::Incomplete {
            needed: head_size - src.len(),
        });
    }

    let payload_length = match extra {
        0 => u64::from(length_code),
        2 => u64::from(u16::from_be_bytes([src[2], src[3]])),
        _ => {
            let mut length = [0; 8];
            length.copy_from_slice(&src[2..10]);
            u64::from_be_bytes(length)
        }
    };

    let mask_key = if masked {
        let at = MIN_HEAD_SIZE + extra;
        Some(u32::from_le_bytes([
            src[at],
            src[at + 1],
            src[at + 2],
            src[at + 3],
        ]))
    } else {
        None
    };

    let header =
        FrameHeader::from_raw(fin, [rsv1, rsv2, rsv3], opcode, mask_key, payload_length)?;
    Ok((header, head_size))
}

/// Decodes the frame at the start of `src`.
///
/// Returns the frame, with its payload unmasked, and the number of bytes it occupied so the
/// caller can move on to whatever follows it. Bytes after the frame are left alone.
///
/// # Errors
/// `Incomplete` if `src` holds only a prefix of the frame; buffer more bytes and call again.
/// Any other error of [`decode_head`] means the frame is malformed.
pub fn decode(src: &[u8], role: Role) -> Result<(Frame, usize)> {
    let (header, head_size) = decode_head(src, role)?;
    let payload_len = payload_len(&header)?;
    let frame_size = head_size
        .checked_add(payload_len)
        .ok_or(FrameError::FrameTooLarge)?;

    if src.len() < frame_size {
        return Err(FrameError::Incomplete {
            needed: frame_size - src.len(),
        });
    }

    let mut payload = BytesMut::from(&src[head_size..frame_size]);
    if let Some(key) = header.mask_key() {
        apply_mask(&mut payload, key);
    }

    Ok((Frame::from_parts_unchecked(header, payload), frame_size))
}

/// The declared payload length as an in-memory size.
#[inline]
fn payload_len(header: &FrameHeader) -> Result<usize> {
    usize::try_from(header.payload_length()).map_err(|_| FrameError::FrameTooLarge)
}

/// A combined codec that provides both encoding and decoding functionality for WebSocket frames.
///
/// This codec can be used with Tokio's framed streams to read and write frames over any
/// `AsyncRead + AsyncWrite` transport.
pub struct Codec<K = RandomMask> {
    decoder: Decoder,
    encoder: Encoder<K>,
}

impl Codec {
    /// Creates a codec for `role`, masking outgoing client frames with random keys.
    pub fn new(role: Role, options: &Options) -> Self {
        Self::with_key_source(role, options, RandomMask)
    }
}

impl<K: MaskKeySource> Codec<K> {
    /// Creates a codec whose client-side mask keys come from `keys`.
    pub fn with_key_source(role: Role, options: &Options, keys: K) -> Self {
        Self {
            decoder: Decoder::new(role, options.payload_read_limit()),
            encoder: Encoder::with_key_source(role, keys)
                .with_max_frame_payload(options.max_frame_payload),
        }
    }
}

impl<K> From<(Decoder, Encoder<K>)> for Codec<K> {
    fn from((decoder, encoder): (Decoder, Encoder<K>)) -> Self {
        Self { decoder, encoder }
    }
}

impl<K> codec::Decoder for Codec<K> {
    type Item = <Decoder as codec::Decoder>::Item;
    type Error = <Decoder as codec::Decoder>::Error;

    #[inline]
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        codec::Decoder::decode(&mut self.decoder, src)
    }
}

impl<K: MaskKeySource> codec::Encoder<Frame> for Codec<K> {
    type Error = FrameError;

    #[inline]
    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<()> {
        codec::Encoder::<Frame>::encode(&mut self.encoder, item, dst)
    }
}

impl<K: MaskKeySource> codec::Encoder<Message> for Codec<K> {
    type Error = FrameError;

    #[inline]
    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        codec::Encoder::<Message>::encode(&mut self.encoder, item, dst)
    }
}

/// A streaming decoder for WebSocket frames.
///
/// Each call parses at most one frame from the front of the buffer. A buffer that ends
/// mid-frame yields `Ok(None)` and is left untouched, so the next call starts over once more
/// bytes have arrived.
pub struct Decoder {
    role: Role,
    /// Maximum allowed size for a frame payload.
    max_payload_read: usize,
}

impl Decoder {
    /// Creates a new `Decoder` for `role` that rejects payloads larger than `max_payload_read`.
    pub fn new(role: Role, max_payload_read: usize) -> Self {
        Self {
            role,
            max_payload_read,
        }
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }
}

impl codec::Decoder for Decoder {
    type Item = Frame;
    type Error = FrameError;

    /// Decodes one frame from `src`.
    ///
    /// # Returns
    /// - `Ok(Some(Frame))` once a whole frame is buffered; its bytes are removed from `src`.
    /// - `Ok(None)` if more data is needed to complete the frame.
    /// - `Err(FrameError)` if a protocol violation or invalid frame structure is detected.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let (header, head_size) = match decode_head(src, self.role) {
            Ok(parsed) => parsed,
            Err(FrameError::Incomplete { needed }) => {
                src.reserve(needed);
                return Ok(None);
            }
            Err(err) => {
                #[cfg(feature = "logging")]
                log::debug!("rejecting frame from peer of {}: {}", self.role, err);
                return Err(err);
            }
        };

        // Checked before the payload is buffered so an oversized frame cannot make us wait for it.
        if header.payload_length() > self.max_payload_read as u64 {
            #[cfg(feature = "logging")]
            log::debug!(
                "frame of {} bytes exceeds limit of {}",
                header.payload_length(),
                self.max_payload_read
            );
            return Err(FrameError::FrameTooLarge);
        }

        let payload_len = payload_len(&header)?;
        let frame_size = head_size + payload_len;
        if src.len() < frame_size {
            src.reserve(frame_size - src.len());
            return Ok(None);
        }

        src.advance(head_size);
        let mut payload = src.split_to(payload_len);
        if let Some(key) = header.mask_key() {
            apply_mask(&mut payload, key);
        }

        #[cfg(feature = "logging")]
        log::trace!(
            "<<fin={} opcode={:?} masked={} len={}",
            header.fin(),
            header.opcode(),
            header.is_masked(),
            payload_len
        );

        Ok(Some(Frame::from_parts_unchecked(header, payload)))
    }
}

/// WebSocket frame encoder for serializing frames and messages into a buffer.
///
/// In the client role every outgoing frame is masked, with a key drawn from the key source
/// unless the frame already carries one. In the server role mask keys are stripped.
pub struct Encoder<K = RandomMask> {
    role: Role,
    keys: K,
    /// Data messages larger than this are split into several frames.
    max_frame_payload: Option<usize>,
}

impl Encoder {
    /// Creates an encoder for `role` that masks client frames with random keys.
    pub fn new(role: Role) -> Self {
        Self::with_key_source(role, RandomMask)
    }
}

impl<K: MaskKeySource> Encoder<K> {
    pub fn with_key_source(role: Role, keys: K) -> Self {
        Self {
            role,
            keys,
            max_frame_payload: None,
        }
    }

    /// Sets the largest payload a single frame written from a [`Message`] may carry.
    pub fn with_max_frame_payload(self, max_frame_payload: Option<usize>) -> Self {
        Self {
            max_frame_payload,
            ..self
        }
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    fn outgoing_header(&mut self, header: &FrameHeader) -> FrameHeader {
        match self.role {
            Role::Client if header.is_masked() => *header,
            Role::Client => header.with_mask_key(Some(self.keys.next_key())),
            Role::Server => header.with_mask_key(None),
        }
    }
}

impl<K: MaskKeySource> codec::Encoder<Frame> for Encoder<K> {
    type Error = FrameError;

    /// Encodes a `Frame` into the provided buffer, applying the role's masking rule.
    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        let header = self.outgoing_header(frame.header());
        write_frame(&header, frame.payload(), dst);
        Ok(())
    }
}

impl<K: MaskKeySource> codec::Encoder<Message> for Encoder<K> {
    type Error = FrameError;

    /// Encodes a `Message` as one or more frames, fragmenting data messages larger than
    /// the configured frame payload limit.
    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> Result<()> {
        let frames = fragment(message, self.max_frame_payload.unwrap_or(0))?;
        for frame in frames {
            codec::Encoder::<Frame>::encode(self, frame, dst)?;
        }
        Ok(())
    }
}
