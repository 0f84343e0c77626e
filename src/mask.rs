//! Payload masking (RFC 6455 §5.3).
//!
//! Masking XORs byte `i` of the payload with byte `i % 4` of the little-endian
//! representation of the 32-bit key. XOR is its own inverse, so [`apply_mask`] both masks
//! and unmasks.

/// Mask/unmask a buffer in place with `key`.
#[inline]
pub fn apply_mask(buf: &mut [u8], key: u32) {
    apply_mask_fast64(buf, key.to_le_bytes());
}

/// A safe unoptimized mask application.
#[inline]
fn apply_mask_fallback(buf: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte ^= mask[i & 3];
    }
}

/// Faster version of `apply_mask()` which operates on 8-byte blocks.
///
/// The unaligned head is masked byte by byte, the key word is rotated to the phase the
/// head left it in, the aligned body is masked a word at a time, and the tail is masked
/// byte by byte with the rotated key.
#[inline]
fn apply_mask_fast64(buf: &mut [u8], mask: [u8; 4]) {
    let mask_u64 = u64::from_ne_bytes([
        mask[0], mask[1], mask[2], mask[3], mask[0], mask[1], mask[2], mask[3],
    ]);

    // SAFETY: every bit pattern is a valid u64, and `align_to_mut` only hands out the
    // correctly aligned middle part.
    let (prefix, words, suffix) = unsafe { buf.align_to_mut::<u64>() };
    apply_mask_fallback(prefix, mask);
    let head = prefix.len() & 3;
    let mask_u64 = if head > 0 {
        if cfg!(target_endian = "big") {
            mask_u64.rotate_left(8 * head as u32)
        } else {
            mask_u64.rotate_right(8 * head as u32)
        }
    } else {
        mask_u64
    };
    for word in words.iter_mut() {
        *word ^= mask_u64;
    }
    let rotated = mask_u64.to_ne_bytes();
    apply_mask_fallback(suffix, [rotated[0], rotated[1], rotated[2], rotated[3]]);
}

/// Supplies the 32-bit keys used to mask outgoing frames.
///
/// RFC 6455 requires keys to be unpredictable, so anything talking to a real server should
/// use [`RandomMask`]. [`FixedMask`] exists for tests and reproducible captures.
pub trait MaskKeySource {
    fn next_key(&mut self) -> u32;
}

/// Draws every key from the thread-local random number generator.
#[derive(Debug, Default, Copy, Clone)]
pub struct RandomMask;

impl MaskKeySource for RandomMask {
    #[inline]
    fn next_key(&mut self) -> u32 {
        rand::random()
    }
}

/// Returns the same key every time.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FixedMask(pub u32);

impl MaskKeySource for FixedMask {
    #[inline]
    fn next_key(&mut self) -> u32 {
        self.0
    }
}

impl<T: MaskKeySource + ?Sized> MaskKeySource for &mut T {
    #[inline]
    fn next_key(&mut self) -> u32 {
        (**self).next_key()
    }
}

impl<T: MaskKeySource + ?Sized> MaskKeySource for Box<T> {
    #[inline]
    fn next_key(&mut self) -> u32 {
        (**self).next_key()
    }
}
