//! Sub-protocol grammars carried inside a frame payload.
//!
//! | Kind          | Grammar                                        |
//! |---------------|------------------------------------------------|
//! | `TMSVR`       | `<id>,<mode>[,<errcode>],<content>`            |
//! | `TMSCT`       | `<id>,<"OK" \| "ERROR" \| script text>`         |
//! | `TMSTA`       | `<subcmd>,<subdata>`                           |
//! | `CPERR`       | `<2 hex digits>`                               |

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{hex_byte, parse_hex_byte, Frame};
use crate::error::{FrameError, Result};
use crate::header::{FrameKind, SEPARATOR};

/// A payload grammar bound to one frame kind.
pub trait Payload: Sized {
    /// Frame kind this grammar is carried on.
    const KIND: FrameKind;

    /// Append the payload bytes (without envelope) to `dst`.
    fn write_payload(&self, dst: &mut BytesMut);

    /// Parse payload bytes.
    fn parse(payload: &[u8]) -> Result<Self>;

    /// Build an outbound frame carrying this payload.
    fn to_frame(&self) -> Frame {
        let mut buf = BytesMut::new();
        self.write_payload(&mut buf);
        Frame::new(Self::KIND, buf.freeze())
    }

    /// Interpret a decoded frame, checking its kind first.
    fn from_frame(frame: &Frame) -> Result<Self> {
        if frame.kind != Self::KIND {
            return Err(FrameError::UnexpectedKind {
                expected: Self::KIND.to_string(),
                found: frame.kind.to_string(),
            });
        }
        Self::parse(&frame.payload)
    }
}

fn split_field(payload: &[u8]) -> Option<(&[u8], &[u8])> {
    let idx = payload.iter().position(|&b| b == SEPARATOR)?;
    Some((&payload[..idx], &payload[idx + 1..]))
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn malformed(kind: &'static str, reason: &'static str) -> FrameError {
    FrameError::MalformedPayload { kind, reason }
}

/// Mode of a state report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateMode {
    /// Reply to a write request; carries a response code.
    Response,
    /// Binary data table record.
    Binary,
    /// `Item=Value` text.
    String,
    /// JSON array of `{"Item", "Value"}` objects.
    Json,
    /// Read request answered in binary.
    ReadBinary,
    /// Read request answered as text.
    ReadString,
    /// Read request answered as JSON.
    ReadJson,
    /// A code with no named mode. Only [`StateMode::from_code`] builds one,
    /// so it never aliases a named mode and always fits the two-digit field.
    Unknown(ModeCode),
}

/// Raw code of a [`StateMode::Unknown`] report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModeCode(u8);

impl ModeCode {
    /// The numeric mode code.
    pub fn get(self) -> u8 {
        self.0
    }
}

impl StateMode {
    /// Largest code the one-or-two digit mode field can carry.
    pub const MAX_CODE: u8 = 99;

    /// Map a numeric code to a mode. Returns `None` above [`Self::MAX_CODE`].
    pub fn from_code(code: u8) -> Option<Self> {
        let mode = match code {
            0 => StateMode::Response,
            1 => StateMode::Binary,
            2 => StateMode::String,
            3 => StateMode::Json,
            11 => StateMode::ReadBinary,
            12 => StateMode::ReadString,
            13 => StateMode::ReadJson,
            other if other <= Self::MAX_CODE => StateMode::Unknown(ModeCode(other)),
            _ => return None,
        };
        Some(mode)
    }

    /// The numeric code written on the wire.
    pub fn code(self) -> u8 {
        match self {
            StateMode::Response => 0,
            StateMode::Binary => 1,
            StateMode::String => 2,
            StateMode::Json => 3,
            StateMode::ReadBinary => 11,
            StateMode::ReadString => 12,
            StateMode::ReadJson => 13,
            StateMode::Unknown(code) => code.get(),
        }
    }
}

/// Response code carried by [`StateMode::Response`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    /// The request succeeded.
    Ok,
    /// The request is not supported.
    NotSupport,
    /// The item cannot be written in the current state.
    WritePermission,
    /// The request data could not be parsed.
    InvalidData,
    /// The named item does not exist.
    NotExist,
    /// The item is read-only.
    ReadOnly,
    /// The mode is not valid for this request.
    ModeError,
    /// The value is out of range or of the wrong type.
    ValueError,
    /// Any code from 8 up.
    Other,
}

impl ResponseCode {
    /// Map a numeric code; anything above 7 is [`ResponseCode::Other`].
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => ResponseCode::Ok,
            1 => ResponseCode::NotSupport,
            2 => ResponseCode::WritePermission,
            3 => ResponseCode::InvalidData,
            4 => ResponseCode::NotExist,
            5 => ResponseCode::ReadOnly,
            6 => ResponseCode::ModeError,
            7 => ResponseCode::ValueError,
            _ => ResponseCode::Other,
        }
    }

    /// The numeric code written on the wire.
    pub fn code(self) -> u8 {
        match self {
            ResponseCode::Ok => 0,
            ResponseCode::NotSupport => 1,
            ResponseCode::WritePermission => 2,
            ResponseCode::InvalidData => 3,
            ResponseCode::NotExist => 4,
            ResponseCode::ReadOnly => 5,
            ResponseCode::ModeError => 6,
            ResponseCode::ValueError => 7,
            ResponseCode::Other => 8,
        }
    }
}

/// `TMSVR` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateReport {
    /// Transaction id echoed by the controller.
    pub id: String,
    /// How `content` is encoded.
    pub mode: StateMode,
    /// Present only for [`StateMode::Response`].
    pub code: Option<ResponseCode>,
    /// Remaining bytes; binary for [`StateMode::Binary`].
    pub content: Bytes,
}

impl StateReport {
    /// Build a report. Response-mode reports get [`ResponseCode::Ok`].
    pub fn new(id: impl Into<String>, mode: StateMode, content: impl Into<Bytes>) -> Self {
        let code = (mode == StateMode::Response).then_some(ResponseCode::Ok);
        Self {
            id: id.into(),
            mode,
            code,
            content: content.into(),
        }
    }

    /// A response-mode report with an explicit code.
    pub fn response(id: impl Into<String>, code: ResponseCode, content: impl Into<Bytes>) -> Self {
        Self {
            id: id.into(),
            mode: StateMode::Response,
            code: Some(code),
            content: content.into(),
        }
    }

    /// The content as (lossy) UTF-8.
    pub fn content_str(&self) -> String {
        text(&self.content)
    }

    /// Parse the content of a JSON-mode report.
    pub fn json_content(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.content)
    }
}

impl Payload for StateReport {
    const KIND: FrameKind = FrameKind::StateReport;

    fn write_payload(&self, dst: &mut BytesMut) {
        dst.put_slice(self.id.as_bytes());
        dst.put_u8(SEPARATOR);
        dst.put_slice(self.mode.code().to_string().as_bytes());
        dst.put_u8(SEPARATOR);
        if self.mode == StateMode::Response {
            let code = self.code.unwrap_or(ResponseCode::Ok).code();
            dst.put_slice(format!("{code:02}").as_bytes());
            dst.put_u8(SEPARATOR);
        }
        dst.put_slice(&self.content);
    }

    fn parse(payload: &[u8]) -> Result<Self> {
        const KIND: &str = "TMSVR";

        let (id, rest) =
            split_field(payload).ok_or_else(|| malformed(KIND, "missing transaction id"))?;

        // One or two mode digits, always followed by a separator.
        let digits = match rest {
            [_, SEPARATOR, ..] => 1,
            [_, _, SEPARATOR, ..] => 2,
            _ => return Err(malformed(KIND, "missing mode")),
        };
        let mode = parse_digits(&rest[..digits]).ok_or_else(|| malformed(KIND, "invalid mode"))?;
        let mode = StateMode::from_code(mode).ok_or_else(|| malformed(KIND, "invalid mode"))?;
        let mut rest = &rest[digits + 1..];

        let mut code = None;
        if mode == StateMode::Response {
            match rest {
                [_, _, SEPARATOR, ..] => {
                    let value = parse_digits(&rest[..2])
                        .ok_or_else(|| malformed(KIND, "invalid response code"))?;
                    code = Some(ResponseCode::from_code(value));
                    rest = &rest[3..];
                }
                _ => return Err(malformed(KIND, "missing response code")),
            }
        }

        Ok(Self {
            id: text(id),
            mode,
            code,
            content: Bytes::copy_from_slice(rest),
        })
    }
}

fn parse_digits(digits: &[u8]) -> Option<u8> {
    digits.iter().try_fold(0u8, |acc, &d| {
        d.is_ascii_digit()
            .then(|| acc.checked_mul(10)?.checked_add(d - b'0'))
            .flatten()
    })
}

/// `TMSCT` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    /// Script id echoed in the reply.
    pub id: String,
    /// Script text, or the literal `OK` / `ERROR` in replies.
    pub script: String,
    /// Set when the reply is the literal `ERROR`.
    pub has_error: bool,
}

impl Script {
    /// Build a script payload; `has_error` is derived from the text.
    pub fn new(id: impl Into<String>, script: impl Into<String>) -> Self {
        let script = script.into();
        Self {
            id: id.into(),
            has_error: script == "ERROR",
            script,
        }
    }

    /// True when the reply is the literal `OK`.
    pub fn is_ok(&self) -> bool {
        self.script == "OK"
    }
}

impl Payload for Script {
    const KIND: FrameKind = FrameKind::Script;

    fn write_payload(&self, dst: &mut BytesMut) {
        dst.put_slice(self.id.as_bytes());
        dst.put_u8(SEPARATOR);
        dst.put_slice(self.script.as_bytes());
    }

    fn parse(payload: &[u8]) -> Result<Self> {
        let (id, script) =
            split_field(payload).ok_or_else(|| malformed("TMSCT", "missing script id"))?;
        Ok(Self::new(text(id), text(script)))
    }
}

/// `TMSTA` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Two-digit status command, e.g. `00` for the responsive check.
    pub subcmd: String,
    /// Command-specific data.
    pub subdata: String,
}

impl Status {
    /// Build a status payload.
    pub fn new(subcmd: impl Into<String>, subdata: impl Into<String>) -> Self {
        Self {
            subcmd: subcmd.into(),
            subdata: subdata.into(),
        }
    }
}

impl Payload for Status {
    const KIND: FrameKind = FrameKind::Status;

    fn write_payload(&self, dst: &mut BytesMut) {
        dst.put_slice(self.subcmd.as_bytes());
        dst.put_u8(SEPARATOR);
        dst.put_slice(self.subdata.as_bytes());
    }

    fn parse(payload: &[u8]) -> Result<Self> {
        let (subcmd, subdata) =
            split_field(payload).ok_or_else(|| malformed("TMSTA", "missing subcommand"))?;
        Ok(Self::new(text(subcmd), text(subdata)))
    }
}

/// Controller error codes reported on `CPERR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// No error.
    Ok,
    /// Bad packet format.
    Packet,
    /// Checksum did not match.
    Checksum,
    /// Unknown header token.
    Header,
    /// Packet data was rejected.
    Data,
    /// The controller is not in external script mode.
    NoExternalScriptMode,
    /// Any other byte.
    Other(u8),
}

impl ErrorCode {
    /// Reported when the payload is not exactly two hex digits.
    pub const MALFORMED: ErrorCode = ErrorCode::Other(0xff);

    /// Map a raw error byte.
    pub fn from_byte(code: u8) -> Self {
        match code {
            0x00 => ErrorCode::Ok,
            0x01 => ErrorCode::Packet,
            0x02 => ErrorCode::Checksum,
            0x03 => ErrorCode::Header,
            0x04 => ErrorCode::Data,
            0xf1 => ErrorCode::NoExternalScriptMode,
            other => ErrorCode::Other(other),
        }
    }

    /// The raw error byte.
    pub fn byte(self) -> u8 {
        match self {
            ErrorCode::Ok => 0x00,
            ErrorCode::Packet => 0x01,
            ErrorCode::Checksum => 0x02,
            ErrorCode::Header => 0x03,
            ErrorCode::Data => 0x04,
            ErrorCode::NoExternalScriptMode => 0xf1,
            ErrorCode::Other(code) => code,
        }
    }
}

/// `CPERR` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorReport {
    /// Reported error.
    pub code: ErrorCode,
}

impl ErrorReport {
    /// Build an error payload.
    pub fn new(code: ErrorCode) -> Self {
        Self { code }
    }
}

impl Payload for ErrorReport {
    const KIND: FrameKind = FrameKind::Error;

    fn write_payload(&self, dst: &mut BytesMut) {
        dst.put_slice(&hex_byte(self.code.byte()));
    }

    fn parse(payload: &[u8]) -> Result<Self> {
        let code = match payload {
            [hi, lo] => parse_hex_byte(*hi, *lo).map_or(ErrorCode::MALFORMED, ErrorCode::from_byte),
            _ => ErrorCode::MALFORMED,
        };
        Ok(Self { code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_frame, DEFAULT_MAX_PAYLOAD};

    fn roundtrip<P: Payload>(payload: &P) -> P {
        let bytes = payload.to_frame().to_bytes();
        let (frame, consumed) = decode_frame(&bytes, DEFAULT_MAX_PAYLOAD);
        assert!(frame.valid);
        assert_eq!(consumed, bytes.len());
        P::from_frame(&frame).unwrap()
    }

    #[test]
    fn state_report_example_roundtrip() {
        let report = StateReport::new("1", StateMode::String, &b"123"[..]);
        let mut frame = report.to_frame();
        assert_eq!(frame.to_bytes().as_ref(), b"$TMSVR,7,1,2,123,*66\r\n");

        let decoded = roundtrip(&report);
        assert_eq!(decoded.id, "1");
        assert_eq!(decoded.mode, StateMode::String);
        assert_eq!(decoded.content_str(), "123");
        assert_eq!(decoded.code, None);
    }

    #[test]
    fn state_report_every_mode_roundtrips() {
        let modes = [
            StateMode::Response,
            StateMode::Binary,
            StateMode::String,
            StateMode::Json,
            StateMode::ReadBinary,
            StateMode::ReadString,
            StateMode::ReadJson,
            StateMode::from_code(42).unwrap(),
        ];
        for mode in modes {
            let report = StateReport::new("Tx9", mode, &b"a,b\x00c"[..]);
            assert_eq!(roundtrip(&report), report, "{mode:?}");
        }
    }

    #[test]
    fn state_report_mode_codes_roundtrip() {
        for code in 0..=u8::MAX {
            let Some(mode) = StateMode::from_code(code) else {
                assert!(code > StateMode::MAX_CODE, "code {code} has no mode");
                continue;
            };
            assert_eq!(mode.code(), code);
            let report = StateReport::new("1", mode, &b"x"[..]);
            let decoded = roundtrip(&report);
            assert_eq!(decoded.mode, mode, "code {code}");
            assert_eq!(decoded.mode.code(), code);
        }
    }

    #[test]
    fn unknown_mode_never_aliases_named_modes() {
        for code in [0, 1, 2, 3, 11, 12, 13] {
            let mode = StateMode::from_code(code).unwrap();
            assert!(!matches!(mode, StateMode::Unknown(_)), "code {code}");
        }
        assert!(matches!(StateMode::from_code(42), Some(StateMode::Unknown(c)) if c.get() == 42));
        assert_eq!(StateMode::from_code(100), None);
    }

    #[test]
    fn state_report_response_code_roundtrips() {
        let report = StateReport::response("w1", ResponseCode::ReadOnly, &b"Camera_Light"[..]);
        let decoded = roundtrip(&report);
        assert_eq!(decoded.code, Some(ResponseCode::ReadOnly));
        assert_eq!(decoded.content_str(), "Camera_Light");
    }

    #[test]
    fn state_report_parses_wire_response() {
        let report = StateReport::parse(b"Play,0,03,Stick_PlayPause=x").unwrap();
        assert_eq!(report.id, "Play");
        assert_eq!(report.mode, StateMode::Response);
        assert_eq!(report.code, Some(ResponseCode::InvalidData));
        assert_eq!(report.content_str(), "Stick_PlayPause=x");

        let report = StateReport::parse(b"1,0,12,").unwrap();
        assert_eq!(report.code, Some(ResponseCode::Other));
        assert!(report.content.is_empty());
    }

    #[test]
    fn state_report_two_digit_mode() {
        let report = StateReport::parse(b"q,13,{\"Robot_Link\":1}").unwrap();
        assert_eq!(report.mode, StateMode::ReadJson);
        let json = report.json_content().unwrap();
        assert_eq!(json["Robot_Link"], 1);
    }

    #[test]
    fn state_report_rejects_malformed() {
        assert!(StateReport::parse(b"no-separator").is_err());
        assert!(StateReport::parse(b"1,").is_err());
        assert!(StateReport::parse(b"1,123,x").is_err());
        assert!(StateReport::parse(b"1,x,abc").is_err());
        assert!(StateReport::parse(b"1,0,abc").is_err());
    }

    #[test]
    fn script_roundtrip_and_reply_flags() {
        let script = Script::new("Q1", "QueueTag(1,0)\r\nScriptExit()");
        assert_eq!(roundtrip(&script), script);

        let ok = Script::parse(b"1,OK").unwrap();
        assert!(ok.is_ok());
        assert!(!ok.has_error);

        let err = Script::parse(b"1,ERROR").unwrap();
        assert!(err.has_error);
        assert!(!err.is_ok());

        assert!(Script::parse(b"noid").is_err());
    }

    #[test]
    fn status_roundtrip() {
        let status = Status::new("00", "false,1,Stop");
        assert_eq!(roundtrip(&status), status);
        assert!(Status::parse(b"00").is_err());
    }

    #[test]
    fn error_report_roundtrip_and_malformed() {
        for code in [
            ErrorCode::Ok,
            ErrorCode::Checksum,
            ErrorCode::NoExternalScriptMode,
            ErrorCode::Other(0x55),
        ] {
            assert_eq!(roundtrip(&ErrorReport::new(code)).code, code);
        }

        assert_eq!(ErrorReport::parse(b"F1").unwrap().code, ErrorCode::NoExternalScriptMode);
        assert_eq!(ErrorReport::parse(b"1").unwrap().code, ErrorCode::MALFORMED);
        assert_eq!(ErrorReport::parse(b"001").unwrap().code, ErrorCode::MALFORMED);
    }

    #[test]
    fn from_frame_checks_kind() {
        let frame = Status::new("00", "").to_frame();
        let err = Script::from_frame(&frame).unwrap_err();
        assert!(matches!(err, FrameError::UnexpectedKind { .. }));
    }
}
