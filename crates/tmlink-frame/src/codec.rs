use bytes::{BufMut, Bytes, BytesMut};

use crate::error::FrameError;
use crate::header::{FrameKind, CHECKSUM_MARKER, CR, LF, MARKER, SEPARATOR};

/// Default maximum payload size: 1 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

/// Longest header token accepted before the frame is rejected.
pub const MAX_HEADER_LEN: usize = 16;

/// Longest decimal length field accepted before the frame is rejected.
const MAX_LENGTH_DIGITS: usize = 10;

/// Bytes after the payload: separator, `*`, two hex digits, CR, LF.
const TRAILER_LEN: usize = 6;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// One envelope unit, either built for sending or produced by [`decode_frame`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// Sub-protocol selected by the header token.
    pub kind: FrameKind,
    /// Raw payload bytes.
    pub payload: Bytes,
    /// Encoded size on the wire. For rejected frames, the bytes to discard.
    pub size: usize,
    /// Checksum byte (computed on encode, received on decode).
    pub checksum: u8,
    /// The frame is a definite unit (valid or not), not a starved prefix.
    pub complete: bool,
    /// Marker, checksum and terminator all verified.
    pub valid: bool,
    /// Why the frame was rejected, if it was.
    pub fault: Option<FrameError>,
}

impl Frame {
    /// Create an outbound frame. Size and checksum are filled by [`Frame::encode`].
    pub fn new(kind: FrameKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
            ..Self::default()
        }
    }

    /// Encode this frame into `dst`, recording size and checksum.
    pub fn encode(&mut self, dst: &mut BytesMut) -> usize {
        let (size, checksum) = encode_frame(&self.kind, &self.payload, dst);
        self.size = size;
        self.checksum = checksum;
        self.complete = true;
        self.valid = true;
        self.fault = None;
        size
    }

    /// Encode this frame into a fresh buffer.
    pub fn to_bytes(&mut self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// The payload interpreted as (lossy) UTF-8.
    pub fn payload_str(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    fn rejected(kind: FrameKind, consumed: usize, checksum: u8, fault: FrameError) -> Self {
        Self {
            kind,
            payload: Bytes::new(),
            size: consumed,
            checksum,
            complete: true,
            valid: false,
            fault: Some(fault),
        }
    }
}

/// XOR of every byte in `data`.
pub fn checksum_xor(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Encode a frame into the wire format.
///
/// ```text
/// $ TOKEN , LENGTH , PAYLOAD , * HH \r \n
///   └────────── xor ─────────┘
/// ```
///
/// Returns the number of bytes appended and the checksum.
pub fn encode_frame(kind: &FrameKind, payload: &[u8], dst: &mut BytesMut) -> (usize, u8) {
    let start = dst.len();
    let token = kind.token().as_bytes();
    let length = payload.len().to_string();

    dst.reserve(3 + token.len() + length.len() + payload.len() + TRAILER_LEN);
    dst.put_u8(MARKER);
    dst.put_slice(token);
    dst.put_u8(SEPARATOR);
    dst.put_slice(length.as_bytes());
    dst.put_u8(SEPARATOR);
    dst.put_slice(payload);
    dst.put_u8(SEPARATOR);

    let checksum = checksum_xor(&dst[start + 1..]);
    dst.put_u8(CHECKSUM_MARKER);
    dst.put_slice(&hex_byte(checksum));
    dst.put_u8(CR);
    dst.put_u8(LF);

    (dst.len() - start, checksum)
}

/// Decode one frame from the front of `src`.
///
/// Returns the frame and the number of bytes the caller must consume:
/// - `0` with `complete == false` when more bytes are needed;
/// - `complete == true, valid == false` for garbage and malformed envelopes,
///   consuming up to the byte where the scan failed, and for checksum
///   mismatches, consuming the full frame length;
/// - the full frame length for a valid frame.
pub fn decode_frame(src: &[u8], max_payload: usize) -> (Frame, usize) {
    let Some(&first) = src.first() else {
        return incomplete();
    };

    if first != MARKER {
        // Skip ahead to the next marker so the stream can resynchronize.
        let skip = src
            .iter()
            .position(|&b| b == MARKER)
            .unwrap_or(src.len());
        return rejected(FrameKind::Empty, skip, FrameError::MissingMarker(first));
    }

    let header_end = match find_separator(src, 1, MAX_HEADER_LEN) {
        Search::Found(idx) => idx,
        Search::Starved => return incomplete(),
        Search::Exceeded => {
            return rejected(
                FrameKind::Empty,
                1,
                FrameError::HeaderTooLong {
                    max: MAX_HEADER_LEN,
                },
            )
        }
    };
    let kind = FrameKind::from_token(&String::from_utf8_lossy(&src[1..header_end]));

    let length_start = header_end + 1;
    let length_end = match find_separator(src, length_start, MAX_LENGTH_DIGITS) {
        Search::Found(idx) => idx,
        Search::Starved => return incomplete(),
        Search::Exceeded => return rejected(kind, length_start, FrameError::InvalidLength),
    };
    let Some(length) = parse_decimal(&src[length_start..length_end]) else {
        return rejected(kind, length_end + 1, FrameError::InvalidLength);
    };
    if length > max_payload {
        return rejected(
            kind,
            length_end + 1,
            FrameError::PayloadTooLarge {
                size: length,
                max: max_payload,
            },
        );
    }

    let payload_start = length_end + 1;
    let payload_end = payload_start + length;
    let total = payload_end + TRAILER_LEN;
    if src.len() < total {
        return incomplete();
    }

    if src[payload_end] != SEPARATOR {
        return rejected(kind, payload_end, FrameError::MissingSeparator);
    }
    if src[payload_end + 1] != CHECKSUM_MARKER {
        return rejected(kind, payload_end + 1, FrameError::MissingChecksumMarker);
    }
    let Some(received) = parse_hex_byte(src[payload_end + 2], src[payload_end + 3]) else {
        return rejected(kind, payload_end + 2, FrameError::InvalidChecksumDigits);
    };
    if src[payload_end + 4] != CR || src[payload_end + 5] != LF {
        return rejected(kind, payload_end + 4, FrameError::MissingTerminator);
    }

    let computed = checksum_xor(&src[1..=payload_end]);
    if computed != received {
        let frame = Frame::rejected(
            kind,
            total,
            received,
            FrameError::ChecksumMismatch { computed, received },
        );
        return (frame, total);
    }

    let frame = Frame {
        kind,
        payload: Bytes::copy_from_slice(&src[payload_start..payload_end]),
        size: total,
        checksum: received,
        complete: true,
        valid: true,
        fault: None,
    };
    (frame, total)
}

enum Search {
    Found(usize),
    Starved,
    Exceeded,
}

fn find_separator(src: &[u8], from: usize, limit: usize) -> Search {
    let end = src.len().min(from + limit + 1);
    if from < end {
        if let Some(offset) = src[from..end].iter().position(|&b| b == SEPARATOR) {
            return Search::Found(from + offset);
        }
    }
    if src.len() > from + limit {
        Search::Exceeded
    } else {
        Search::Starved
    }
}

fn parse_decimal(digits: &[u8]) -> Option<usize> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

pub(crate) fn parse_hex_byte(hi: u8, lo: u8) -> Option<u8> {
    Some(hex_value(hi)? << 4 | hex_value(lo)?)
}

pub(crate) fn hex_byte(value: u8) -> [u8; 2] {
    [
        HEX_DIGITS[usize::from(value >> 4)],
        HEX_DIGITS[usize::from(value & 0x0f)],
    ]
}

fn incomplete() -> (Frame, usize) {
    (Frame::default(), 0)
}

fn rejected(kind: FrameKind, consumed: usize, fault: FrameError) -> (Frame, usize) {
    (Frame::rejected(kind, consumed, 0, fault), consumed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(kind: FrameKind, payload: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_frame(&kind, payload, &mut buf);
        buf
    }

    #[test]
    fn encodes_state_report_example() {
        let buf = encoded(FrameKind::StateReport, b"1,2,123");
        assert_eq!(buf.as_ref(), b"$TMSVR,7,1,2,123,*66\r\n");
    }

    #[test]
    fn encode_records_size_and_checksum() {
        let mut frame = Frame::new(FrameKind::Script, &b"1,OK"[..]);
        let mut buf = BytesMut::new();
        let size = frame.encode(&mut buf);

        assert_eq!(size, buf.len());
        assert_eq!(frame.size, size);
        assert_eq!(frame.checksum, 0x5c);
        assert!(frame.valid);
    }

    #[test]
    fn encode_appends_after_existing_bytes() {
        let mut buf = BytesMut::from(&b"junk"[..]);
        let (size, checksum) = encode_frame(&FrameKind::Status, b"00,", &mut buf);
        assert_eq!(buf.len(), 4 + size);

        let (frame, consumed) = decode_frame(&buf[4..], DEFAULT_MAX_PAYLOAD);
        assert!(frame.valid);
        assert_eq!(consumed, size);
        assert_eq!(frame.checksum, checksum);
    }

    #[test]
    fn decode_roundtrip_every_kind() {
        let kinds = [
            FrameKind::Empty,
            FrameKind::Error,
            FrameKind::Script,
            FrameKind::Status,
            FrameKind::StateReport,
            FrameKind::Other("TMXYZ".to_string()),
        ];
        for kind in kinds {
            let payload = b"id,some \x00 binary \xff bytes,\r\n";
            let buf = encoded(kind.clone(), payload);

            let (frame, consumed) = decode_frame(&buf, DEFAULT_MAX_PAYLOAD);
            assert!(frame.complete, "{kind}");
            assert!(frame.valid, "{kind}");
            assert_eq!(consumed, buf.len());
            assert_eq!(frame.kind, kind);
            assert_eq!(frame.payload.as_ref(), payload);
        }
    }

    #[test]
    fn decode_empty_payload() {
        let buf = encoded(FrameKind::Status, b"");
        let (frame, consumed) = decode_frame(&buf, DEFAULT_MAX_PAYLOAD);
        assert!(frame.valid);
        assert!(frame.payload.is_empty());
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn decode_accepts_uppercase_checksum() {
        let (frame, _) = decode_frame(b"$TMSVR,7,1,2,123,*66\r\n", DEFAULT_MAX_PAYLOAD);
        assert!(frame.valid);

        let mut buf = encoded(FrameKind::Script, b"1,OK");
        let len = buf.len();
        buf[len - 4..len - 2].copy_from_slice(b"5C");
        let (frame, _) = decode_frame(&buf, DEFAULT_MAX_PAYLOAD);
        assert!(frame.valid);
    }

    #[test]
    fn every_truncation_is_incomplete() {
        let buf = encoded(FrameKind::StateReport, b"1,2,123");
        for cut in 0..buf.len() {
            let (frame, consumed) = decode_frame(&buf[..cut], DEFAULT_MAX_PAYLOAD);
            assert!(!frame.complete, "cut at {cut}");
            assert!(!frame.valid, "cut at {cut}");
            assert_eq!(consumed, 0, "cut at {cut}");
        }
    }

    #[test]
    fn single_byte_corruption_consumes_whole_frame() {
        let buf = encoded(FrameKind::StateReport, b"1,2,123");
        // Header token bytes and payload bytes are all covered by the checksum.
        let positions = (1..6).chain(9..16);
        for pos in positions {
            let mut corrupt = buf.clone();
            corrupt[pos] ^= 0x01;

            let (frame, consumed) = decode_frame(&corrupt, DEFAULT_MAX_PAYLOAD);
            assert!(frame.complete, "corrupt at {pos}");
            assert!(!frame.valid, "corrupt at {pos}");
            assert_eq!(consumed, buf.len(), "corrupt at {pos}");
            assert!(matches!(
                frame.fault,
                Some(FrameError::ChecksumMismatch { .. })
            ));
        }
    }

    #[test]
    fn structural_corruption_consumes_to_scan_point_and_resyncs() {
        let buf = encoded(FrameKind::StateReport, b"1,2,123");
        let good = encoded(FrameKind::Script, b"9,OK");

        // `$TMSVR,7,1,2,123,*66\r\n`: separators at 6, 8 and 16, length at 7.
        let cases = [
            (6, 13, FrameError::MissingChecksumMarker),
            (7, 15, FrameError::MissingSeparator),
            (8, 11, FrameError::InvalidLength),
            (16, 16, FrameError::MissingSeparator),
        ];
        for (pos, expected, fault) in cases {
            let mut stream = buf.clone();
            stream[pos] ^= 0x01;

            let (frame, consumed) = decode_frame(&stream, DEFAULT_MAX_PAYLOAD);
            assert!(frame.complete, "corrupt at {pos}");
            assert!(!frame.valid, "corrupt at {pos}");
            assert_eq!(consumed, expected, "corrupt at {pos}");
            assert_eq!(frame.fault, Some(fault), "corrupt at {pos}");

            stream.extend_from_slice(&good);
            let mut offset = 0;
            let mut recovered = Vec::new();
            while offset < stream.len() {
                let (frame, consumed) = decode_frame(&stream[offset..], DEFAULT_MAX_PAYLOAD);
                assert!(frame.complete, "stalled at {offset} (corrupt at {pos})");
                offset += consumed;
                if frame.valid {
                    recovered.push(frame);
                }
            }
            assert_eq!(recovered.len(), 1, "corrupt at {pos}");
            assert_eq!(recovered[0].kind, FrameKind::Script);
            assert_eq!(recovered[0].payload.as_ref(), b"9,OK");
        }
    }

    #[test]
    fn bad_terminator_is_rejected_after_length() {
        let mut buf = encoded(FrameKind::Script, b"1,OK");
        let len = buf.len();
        buf[len - 1] = b'X';

        let (frame, consumed) = decode_frame(&buf, DEFAULT_MAX_PAYLOAD);
        assert!(frame.complete);
        assert!(!frame.valid);
        assert_eq!(consumed, len - 2);
        assert_eq!(frame.fault, Some(FrameError::MissingTerminator));
    }

    #[test]
    fn missing_separator_after_payload() {
        // Declared length 3 but payload is 4 bytes.
        let (frame, consumed) = decode_frame(b"$TMSCT,3,1,OK,*00\r\n", DEFAULT_MAX_PAYLOAD);
        assert!(frame.complete);
        assert!(!frame.valid);
        assert_eq!(consumed, 12);
        assert_eq!(frame.fault, Some(FrameError::MissingSeparator));
    }

    #[test]
    fn missing_checksum_marker() {
        let (frame, consumed) = decode_frame(b"$TMSCT,4,1,OK,#5c\r\n", DEFAULT_MAX_PAYLOAD);
        assert!(!frame.valid);
        assert_eq!(consumed, 14);
        assert_eq!(frame.fault, Some(FrameError::MissingChecksumMarker));
    }

    #[test]
    fn invalid_checksum_digits() {
        let (frame, consumed) = decode_frame(b"$TMSCT,4,1,OK,*zz\r\n", DEFAULT_MAX_PAYLOAD);
        assert!(!frame.valid);
        assert_eq!(consumed, 15);
        assert_eq!(frame.fault, Some(FrameError::InvalidChecksumDigits));
    }

    #[test]
    fn garbage_before_marker_is_skipped() {
        let mut buf = BytesMut::from(&b"noise"[..]);
        encode_frame(&FrameKind::Script, b"1,OK", &mut buf);

        let (frame, consumed) = decode_frame(&buf, DEFAULT_MAX_PAYLOAD);
        assert!(frame.complete);
        assert!(!frame.valid);
        assert_eq!(consumed, 5);
        assert_eq!(frame.fault, Some(FrameError::MissingMarker(b'n')));

        let (frame, _) = decode_frame(&buf[consumed..], DEFAULT_MAX_PAYLOAD);
        assert!(frame.valid);
    }

    #[test]
    fn garbage_without_marker_is_skipped_entirely() {
        let (frame, consumed) = decode_frame(b"abc", DEFAULT_MAX_PAYLOAD);
        assert!(frame.complete);
        assert_eq!(consumed, 3);
    }

    #[test]
    fn overlong_header_skips_marker() {
        let buf = b"$ABCDEFGHIJKLMNOPQRSTUVWXYZ,1,x,*00\r\n";
        let (frame, consumed) = decode_frame(buf, DEFAULT_MAX_PAYLOAD);
        assert!(frame.complete);
        assert_eq!(consumed, 1);
        assert!(matches!(frame.fault, Some(FrameError::HeaderTooLong { .. })));
    }

    #[test]
    fn non_decimal_length_is_rejected() {
        let (frame, consumed) = decode_frame(b"$TMSCT,4x,1,OK,*00\r\n", DEFAULT_MAX_PAYLOAD);
        assert!(frame.complete);
        assert!(!frame.valid);
        assert_eq!(consumed, 10);
        assert_eq!(frame.kind, FrameKind::Script);
        assert_eq!(frame.fault, Some(FrameError::InvalidLength));
    }

    #[test]
    fn oversized_length_is_rejected() {
        let (frame, consumed) = decode_frame(b"$TMSVR,4096,", 1024);
        assert!(frame.complete);
        assert_eq!(consumed, 12);
        assert!(matches!(
            frame.fault,
            Some(FrameError::PayloadTooLarge { size: 4096, max: 1024 })
        ));
    }

    #[test]
    fn concatenated_frames_decode_in_order() {
        let mut buf = BytesMut::new();
        encode_frame(&FrameKind::Script, b"1,OK", &mut buf);
        encode_frame(&FrameKind::Status, b"00,false", &mut buf);

        let (first, n1) = decode_frame(&buf, DEFAULT_MAX_PAYLOAD);
        let (second, n2) = decode_frame(&buf[n1..], DEFAULT_MAX_PAYLOAD);

        assert_eq!(first.kind, FrameKind::Script);
        assert_eq!(second.kind, FrameKind::Status);
        assert_eq!(second.payload.as_ref(), b"00,false");
        assert_eq!(n1 + n2, buf.len());
    }
}
