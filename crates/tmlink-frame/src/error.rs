/// Errors that can occur during frame encoding/decoding.
///
/// Envelope faults are carried on the rejected [`Frame`](crate::Frame) rather
/// than returned, since a rejected frame is still a unit the caller discards.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The frame does not start with the `$` marker.
    #[error("missing frame marker (found 0x{0:02x})")]
    MissingMarker(u8),

    /// No separator was found within the maximum header token length.
    #[error("header token longer than {max} bytes")]
    HeaderTooLong { max: usize },

    /// The length field is empty, not decimal, or too long.
    #[error("invalid length field")]
    InvalidLength,

    /// The declared payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The byte after the payload is not a separator.
    #[error("missing separator after payload")]
    MissingSeparator,

    /// The `*` checksum marker is missing.
    #[error("missing checksum marker")]
    MissingChecksumMarker,

    /// The checksum field is not two hex digits.
    #[error("invalid checksum digits")]
    InvalidChecksumDigits,

    /// The received checksum does not match the computed one.
    #[error("checksum mismatch (computed 0x{computed:02x}, received 0x{received:02x})")]
    ChecksumMismatch { computed: u8, received: u8 },

    /// The frame is not terminated by CR LF.
    #[error("missing frame terminator")]
    MissingTerminator,

    /// A sub-protocol payload does not follow its grammar.
    #[error("malformed {kind} payload: {reason}")]
    MalformedPayload {
        kind: &'static str,
        reason: &'static str,
    },

    /// A payload was interpreted against the wrong frame kind.
    #[error("expected {expected} frame, found {found}")]
    UnexpectedKind { expected: String, found: String },
}

/// Result alias for frame operations.
pub type Result<T> = std::result::Result<T, FrameError>;
