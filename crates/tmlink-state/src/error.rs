/// Errors that can occur while decoding a state record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// A length prefix or the bytes it announces run past the record.
    #[error("state record truncated at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
}

/// Result alias for state decoding.
pub type Result<T> = std::result::Result<T, StateError>;
