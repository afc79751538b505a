//! Response parsing and decoding.
//!
//! Inbound datagrams mirror the outgoing frame: the 10-byte header echoed
//! back (byte 9 carries the correlating SID), the echoed 2-byte command
//! code, a big-endian 16-bit end code, then a command-specific body.
//!
//! Decoding a memory-read body needs context the frame itself does not
//! carry: the element width and bit mask recorded at send time. That
//! context travels as a [`PendingRead`] parked in the session registry
//! under the request's SID and consumed exactly once here.

use crate::error::{FinsError, Result};
use crate::memory::MemoryLocation;

/// Minimum response size: header (10) + command (2) + end code (2).
pub const MIN_RESPONSE_SIZE: usize = 14;

/// Offset of the command-specific body within a response.
const BODY_OFFSET: usize = 14;

/// Decoding context for an in-flight memory read, keyed by SID.
///
/// Stored before the request datagram is sent so the response can never
/// outrun its decoding context; removed when the response is decoded or
/// discarded when the client closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRead {
    /// Element width used for decoding: 1, 2, or 4 bytes.
    pub bytes_per_location: u8,
    /// Nonzero when bit access is emulated over a word area.
    pub bit_mask: u16,
}

impl From<&MemoryLocation> for PendingRead {
    fn from(location: &MemoryLocation) -> Self {
        Self {
            bytes_per_location: location.bytes_per_location,
            bit_mask: location.bit_mask,
        }
    }
}

/// The fixed leading fields shared by every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHead {
    /// Echoed session id.
    pub sid: u8,
    /// Echoed command code, raw.
    pub command: [u8; 2],
    /// End code; 0 means success.
    pub end_code: u16,
}

impl ResponseHead {
    /// Parses the leading fields of a response datagram.
    ///
    /// # Errors
    ///
    /// Returns [`FinsError::Response`] if the datagram is shorter than the
    /// 14-byte fixed part.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < MIN_RESPONSE_SIZE {
            return Err(FinsError::response(format!(
                "datagram too short: expected at least {MIN_RESPONSE_SIZE} bytes, got {}",
                buf.len()
            )));
        }
        Ok(Self {
            sid: buf[9],
            command: [buf[10], buf[11]],
            end_code: u16::from_be_bytes([buf[12], buf[13]]),
        })
    }
}

/// A decoded successful response, delivered as a `Reply` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Echoed session id.
    pub sid: u8,
    /// Echoed command code, raw.
    pub command: [u8; 2],
    /// End code (0 for a `Reply`).
    pub end_code: u16,
    /// Command-specific body.
    pub body: ReplyBody,
}

/// Command-specific response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    /// Memory-read values, one per location, in request order.
    Values(Vec<u32>),
    /// Controller status fields.
    Status(ControllerStatus),
    /// Bare acknowledgement (write, fill, run, stop, unknown commands).
    Ack,
}

/// Decodes a memory-read body into one value per location.
///
/// Elements are unsigned big-endian at the recorded width; when a bit mask
/// is set each element collapses to 0 or 1. A partial trailing chunk is
/// ignored.
pub(crate) fn decode_values(payload: &[u8], pending: &PendingRead) -> Vec<u32> {
    let mask = u32::from(pending.bit_mask);
    let apply = |value: u32| {
        if mask == 0 {
            value
        } else {
            u32::from(value & mask != 0)
        }
    };
    match pending.bytes_per_location {
        1 => payload.iter().map(|&b| apply(u32::from(b))).collect(),
        4 => payload
            .chunks_exact(4)
            .map(|c| apply(u32::from_be_bytes([c[0], c[1], c[2], c[3]])))
            .collect(),
        _ => payload
            .chunks_exact(2)
            .map(|c| apply(u32::from(u16::from_be_bytes([c[0], c[1]]))))
            .collect(),
    }
}

/// CPU execution status reported by a status read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuStatus {
    /// Program execution stopped.
    Stop,
    /// Program running.
    Run,
    /// CPU on standby.
    Standby,
}

impl CpuStatus {
    /// Reverse lookup from the wire byte.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(CpuStatus::Stop),
            0x01 => Some(CpuStatus::Run),
            0x80 => Some(CpuStatus::Standby),
            _ => None,
        }
    }
}

/// CPU operating mode reported by a status read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuMode {
    /// Debug mode.
    Debug,
    /// Monitor mode.
    Monitor,
    /// Run mode.
    Run,
}

impl CpuMode {
    /// Reverse lookup from the wire byte.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(CpuMode::Debug),
            0x02 => Some(CpuMode::Monitor),
            0x04 => Some(CpuMode::Run),
            _ => None,
        }
    }
}

/// Fatal error flags from the status-read fatal bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalError {
    /// FALS instruction or system-detected fatal error.
    SystemError,
    /// I/O table setting error.
    IoSettingError,
    /// Too many I/O points.
    IoPointOverflow,
    /// CPU bus error.
    CpuBusError,
    /// Memory error.
    MemoryError,
}

impl FatalError {
    const ALL: [FatalError; 5] = [
        FatalError::SystemError,
        FatalError::IoSettingError,
        FatalError::IoPointOverflow,
        FatalError::CpuBusError,
        FatalError::MemoryError,
    ];

    fn mask(self) -> u16 {
        match self {
            FatalError::SystemError => 1 << 6,
            FatalError::IoSettingError => 1 << 10,
            FatalError::IoPointOverflow => 1 << 11,
            FatalError::CpuBusError => 1 << 14,
            FatalError::MemoryError => 1 << 15,
        }
    }

    /// Expands a fatal bitfield into the set of named flags.
    pub fn from_bits(bits: u16) -> Vec<FatalError> {
        Self::ALL
            .into_iter()
            .filter(|flag| bits & flag.mask() != 0)
            .collect()
    }
}

/// Non-fatal error flags from the status-read non-fatal bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonFatalError {
    /// PC link error.
    PcLinkError,
    /// Host link error.
    HostLinkError,
    /// Battery voltage low.
    BatteryError,
    /// Remote I/O error.
    RemoteIoError,
    /// Special I/O unit error.
    SpecialIoUnitError,
    /// I/O verification error.
    IoCollateError,
    /// FAL instruction or system-detected non-fatal error.
    SystemError,
}

impl NonFatalError {
    const ALL: [NonFatalError; 7] = [
        NonFatalError::PcLinkError,
        NonFatalError::HostLinkError,
        NonFatalError::BatteryError,
        NonFatalError::RemoteIoError,
        NonFatalError::SpecialIoUnitError,
        NonFatalError::IoCollateError,
        NonFatalError::SystemError,
    ];

    fn mask(self) -> u16 {
        match self {
            NonFatalError::PcLinkError => 1 << 0,
            NonFatalError::HostLinkError => 1 << 1,
            NonFatalError::BatteryError => 1 << 4,
            NonFatalError::RemoteIoError => 1 << 5,
            NonFatalError::SpecialIoUnitError => 1 << 8,
            NonFatalError::IoCollateError => 1 << 9,
            NonFatalError::SystemError => 1 << 15,
        }
    }

    /// Expands a non-fatal bitfield into the set of named flags.
    pub fn from_bits(bits: u16) -> Vec<NonFatalError> {
        Self::ALL
            .into_iter()
            .filter(|flag| bits & flag.mask() != 0)
            .collect()
    }
}

/// Decoded controller status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerStatus {
    /// CPU execution status; `None` for an unlisted wire code.
    pub status: Option<CpuStatus>,
    /// CPU operating mode; `None` for an unlisted wire code.
    pub mode: Option<CpuMode>,
    /// Fatal error flags currently raised.
    pub fatal_errors: Vec<FatalError>,
    /// Non-fatal error flags currently raised.
    pub non_fatal_errors: Vec<NonFatalError>,
}

/// Decodes a status-read response body.
///
/// Field offsets within the datagram: status at 14, mode at 15, fatal
/// bitfield at 17, non-fatal bitfield at 18 (the two overlap by one byte;
/// that is the shape the protocol peer produces).
pub(crate) fn decode_status(buf: &[u8]) -> Result<ControllerStatus> {
    if buf.len() < 20 {
        return Err(FinsError::response(format!(
            "status response too short: expected at least 20 bytes, got {}",
            buf.len()
        )));
    }
    Ok(ControllerStatus {
        status: CpuStatus::from_code(buf[14]),
        mode: CpuMode::from_code(buf[15]),
        fatal_errors: FatalError::from_bits(u16::from_be_bytes([buf[17], buf[18]])),
        non_fatal_errors: NonFatalError::from_bits(u16::from_be_bytes([buf[18], buf[19]])),
    })
}

/// Decodes a memory-read response body using its pending-read context.
///
/// `buf` must have passed [`ResponseHead::parse`], so the fixed 14-byte
/// part is present.
pub(crate) fn decode_read_body(buf: &[u8], pending: &PendingRead) -> ReplyBody {
    ReplyBody::Values(decode_values(&buf[BODY_OFFSET..], pending))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_frame(sid: u8, command: [u8; 2], end_code: u16, body: &[u8]) -> Vec<u8> {
        let mut buf = vec![0xC0, 0x00, 0x02, 0x00, 0x22, 0x00, 0x00, 0x00, 0x00, sid];
        buf.extend_from_slice(&command);
        buf.extend_from_slice(&end_code.to_be_bytes());
        buf.extend_from_slice(body);
        buf
    }

    #[test]
    fn test_head_parse() {
        let buf = response_frame(0x2A, [0x01, 0x01], 0x0000, &[0x00, 0x0A]);
        let head = ResponseHead::parse(&buf).unwrap();
        assert_eq!(head.sid, 0x2A);
        assert_eq!(head.command, [0x01, 0x01]);
        assert_eq!(head.end_code, 0);
    }

    #[test]
    fn test_head_parse_end_code() {
        let buf = response_frame(1, [0x01, 0x02], 0x0101, &[]);
        let head = ResponseHead::parse(&buf).unwrap();
        assert_eq!(head.end_code, 0x0101);
    }

    #[test]
    fn test_head_too_short() {
        assert!(ResponseHead::parse(&[0xC0, 0x00, 0x02]).is_err());
        assert!(ResponseHead::parse(&response_frame(1, [0x01, 0x01], 0, &[])[..13]).is_err());
    }

    #[test]
    fn test_decode_words() {
        let pending = PendingRead {
            bytes_per_location: 2,
            bit_mask: 0,
        };
        let payload = [0x00, 0x0A, 0x00, 0x0B, 0x00, 0x0C, 0x00, 0x0D];
        assert_eq!(decode_values(&payload, &pending), vec![10, 11, 12, 13]);
    }

    #[test]
    fn test_decode_word_count() {
        // 8 payload bytes at width 2 decode to exactly 4 values
        let pending = PendingRead {
            bytes_per_location: 2,
            bit_mask: 0,
        };
        assert_eq!(decode_values(&[0u8; 8], &pending).len(), 4);
    }

    #[test]
    fn test_decode_bytes() {
        let pending = PendingRead {
            bytes_per_location: 1,
            bit_mask: 0,
        };
        assert_eq!(decode_values(&[0, 1, 0xFF], &pending), vec![0, 1, 255]);
    }

    #[test]
    fn test_decode_dwords() {
        let pending = PendingRead {
            bytes_per_location: 4,
            bit_mask: 0,
        };
        let payload = [0x00, 0x01, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(decode_values(&payload, &pending), vec![0x0001_0000, u32::MAX]);
    }

    #[test]
    fn test_decode_masked_words() {
        // D100.3 style read: mask 1 << 3 over each word
        let pending = PendingRead {
            bytes_per_location: 2,
            bit_mask: 1 << 3,
        };
        let payload = [0x00, 0x08, 0x00, 0x00, 0xFF, 0xFF];
        assert_eq!(decode_values(&payload, &pending), vec![1, 0, 1]);
    }

    #[test]
    fn test_decode_ignores_trailing_partial_chunk() {
        let pending = PendingRead {
            bytes_per_location: 2,
            bit_mask: 0,
        };
        assert_eq!(decode_values(&[0x00, 0x05, 0x09], &pending), vec![5]);
    }

    #[test]
    fn test_status_decode() {
        let mut body = vec![0u8; 6];
        body[0] = 0x01; // run
        body[1] = 0x02; // monitor
        body[3] = 0x04; // fatal bitfield high byte: 1 << 10
        body[4] = 0x00;
        let buf = response_frame(7, [0x06, 0x01], 0, &body);
        let status = decode_status(&buf).unwrap();
        assert_eq!(status.status, Some(CpuStatus::Run));
        assert_eq!(status.mode, Some(CpuMode::Monitor));
        assert_eq!(status.fatal_errors, vec![FatalError::IoSettingError]);
        assert!(status.non_fatal_errors.is_empty());
    }

    #[test]
    fn test_status_unknown_codes() {
        let body = [0x7F, 0x7F, 0, 0, 0, 0];
        let buf = response_frame(7, [0x06, 0x01], 0, &body);
        let status = decode_status(&buf).unwrap();
        assert_eq!(status.status, None);
        assert_eq!(status.mode, None);
    }

    #[test]
    fn test_status_too_short() {
        let buf = response_frame(7, [0x06, 0x01], 0, &[0x01]);
        assert!(decode_status(&buf).is_err());
    }

    #[test]
    fn test_fatal_bits_expansion() {
        let bits = (1 << 6) | (1 << 15);
        assert_eq!(
            FatalError::from_bits(bits),
            vec![FatalError::SystemError, FatalError::MemoryError]
        );
    }

    #[test]
    fn test_non_fatal_bits_expansion() {
        let bits = (1 << 4) | (1 << 9);
        assert_eq!(
            NonFatalError::from_bits(bits),
            vec![NonFatalError::BatteryError, NonFatalError::IoCollateError]
        );
    }

    #[test]
    fn test_decode_read_body() {
        let buf = response_frame(4, [0x01, 0x01], 0, &[0x12, 0x34]);
        let pending = PendingRead {
            bytes_per_location: 2,
            bit_mask: 0,
        };
        assert_eq!(
            decode_read_body(&buf, &pending),
            ReplyBody::Values(vec![0x1234])
        );
    }
}
