/// The maximum allowed payload size for reading, set to 1 MiB.
///
/// Frames with a payload size larger than this limit will be rejected to ensure memory safety
/// and prevent excessively large frames from impacting performance.
pub const MAX_PAYLOAD_READ: usize = 1024 * 1024;

/// The maximum allowed size of a reassembled message, set to 2 MiB.
///
/// Once the fragments of a message add up to more than this, reassembly fails instead of
/// growing the buffer further.
pub const MAX_MESSAGE_SIZE: usize = 2 * 1024 * 1024;

/// Configuration options for the streaming codec and the reassembler.
///
/// # Example
/// ```
/// use wsframe::Options;
///
/// let options = Options::default()
///     .with_max_payload_read(64 * 1024)
///     .with_max_frame_payload(16 * 1024)
///     .with_utf8();
/// ```
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Maximum allowed payload size of a single incoming frame, in bytes.
    ///
    /// Default: 1 MiB (1,048,576 bytes) as defined in [`MAX_PAYLOAD_READ`]
    pub max_payload_read: Option<usize>,

    /// Maximum size of a message reassembled from fragments.
    ///
    /// Default: 2 MiB (2,097,152 bytes) as defined in [`MAX_MESSAGE_SIZE`], or twice the
    /// configured `max_payload_read` value if that is set.
    pub max_message_size: Option<usize>,

    /// Largest payload of a single outgoing frame. Data messages larger than this are
    /// fragmented into a first frame and `Continuation` frames.
    ///
    /// Default: unset, every message goes out as a single frame.
    pub max_frame_payload: Option<usize>,

    /// Flag to determine whether reassembled text messages should be validated for UTF-8 encoding.
    ///
    /// Default: `false`
    pub check_utf8: bool,
}

impl Options {
    /// Sets the maximum allowed payload size for incoming frames.
    pub fn with_max_payload_read(self, size: usize) -> Self {
        Self {
            max_payload_read: Some(size),
            ..self
        }
    }

    /// Sets the maximum size of a message reassembled from fragments.
    pub fn with_max_message_size(self, size: usize) -> Self {
        Self {
            max_message_size: Some(size),
            ..self
        }
    }

    /// Sets the largest payload a single outgoing frame may carry.
    pub fn with_max_frame_payload(self, size: usize) -> Self {
        Self {
            max_frame_payload: Some(size),
            ..self
        }
    }

    /// Enables UTF-8 validation for reassembled text messages.
    pub fn with_utf8(self) -> Self {
        Self {
            check_utf8: true,
            ..self
        }
    }

    pub(crate) fn payload_read_limit(&self) -> usize {
        self.max_payload_read.unwrap_or(MAX_PAYLOAD_READ)
    }

    pub(crate) fn message_size_limit(&self) -> usize {
        match (self.max_message_size, self.max_payload_read) {
            (Some(size), _) => size,
            (None, Some(read)) => read.saturating_mul(2),
            (None, None) => MAX_MESSAGE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert_eq!(options.payload_read_limit(), MAX_PAYLOAD_READ);
        assert_eq!(options.message_size_limit(), MAX_MESSAGE_SIZE);
        assert_eq!(options.max_frame_payload, None);
        assert!(!options.check_utf8);
    }

    #[test]
    fn test_message_limit_follows_payload_limit() {
        let options = Options::default().with_max_payload_read(1000);
        assert_eq!(options.message_size_limit(), 2000);

        let options = options.with_max_message_size(1500);
        assert_eq!(options.message_size_limit(), 1500);
    }
}
