//! Checksummed frame envelope shared by every sub-protocol of the robot link.
//!
//! Every message on the wire is wrapped as:
//! - a `$` marker
//! - an ASCII header token naming the sub-protocol, then `,`
//! - the decimal payload length, then `,`
//! - the payload bytes, then `,`
//! - `*` followed by a two-digit hex XOR checksum
//! - `\r\n`
//!
//! [`decode_frame`] never fails hard: it either reports byte starvation or
//! tells the caller how many bytes to discard, so a stream can always
//! resynchronize after corruption.

pub mod codec;
pub mod error;
pub mod header;
pub mod payload;

pub use codec::{checksum_xor, decode_frame, encode_frame, Frame, DEFAULT_MAX_PAYLOAD};
pub use error::{FrameError, Result};
pub use header::{FrameKind, CPERR, TMSCT, TMSTA, TMSVR};
pub use payload::{
    ErrorCode, ErrorReport, ModeCode, Payload, ResponseCode, Script, StateMode, StateReport,
    Status,
};
