//! Envelope bytes and header tokens.
//!
//! The header token selects the sub-protocol carried by a frame. An empty
//! token is legal; unknown non-empty tokens decode as [`FrameKind::Other`].

use std::fmt;

/// Leading frame marker `$`.
pub const MARKER: u8 = 0x24;
/// Field separator `,`.
pub const SEPARATOR: u8 = 0x2C;
/// Checksum marker `*`.
pub const CHECKSUM_MARKER: u8 = 0x2A;
/// Terminator, first byte.
pub const CR: u8 = 0x0D;
/// Terminator, second byte.
pub const LF: u8 = 0x0A;

/// Controller error report.
pub const CPERR: &str = "CPERR";
/// Script command / script reply.
pub const TMSCT: &str = "TMSCT";
/// Status query / status reply.
pub const TMSTA: &str = "TMSTA";
/// State report (data table stream, reads and writes).
pub const TMSVR: &str = "TMSVR";

/// The sub-protocol a frame carries, derived from its header token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Empty header token.
    #[default]
    Empty,
    /// `CPERR`.
    Error,
    /// `TMSCT`.
    Script,
    /// `TMSTA`.
    Status,
    /// `TMSVR`.
    StateReport,
    /// Any other non-empty token, kept verbatim.
    Other(String),
}

impl FrameKind {
    /// Classify a header token.
    pub fn from_token(token: &str) -> Self {
        match token {
            "" => FrameKind::Empty,
            CPERR => FrameKind::Error,
            TMSCT => FrameKind::Script,
            TMSTA => FrameKind::Status,
            TMSVR => FrameKind::StateReport,
            other => FrameKind::Other(other.to_string()),
        }
    }

    /// The header token written on the wire.
    pub fn token(&self) -> &str {
        match self {
            FrameKind::Empty => "",
            FrameKind::Error => CPERR,
            FrameKind::Script => TMSCT,
            FrameKind::Status => TMSTA,
            FrameKind::StateReport => TMSVR,
            FrameKind::Other(token) => token,
        }
    }

    /// Returns true for the four known sub-protocols.
    pub fn is_known(&self) -> bool {
        !matches!(self, FrameKind::Empty | FrameKind::Other(_))
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Empty => f.write_str("<empty>"),
            other => f.write_str(other.token()),
        }
    }
}
