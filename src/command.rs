//! FINS command codes and frame construction.
//!
//! A FINS frame is the 10-byte header, a 2-byte command code, and a
//! command-specific payload. [`FrameBuilder`] assembles frames through typed
//! appenders (command, location, word, data) so every byte written has an
//! explicit width; there is no runtime flattening of nested buffers.
//!
//! Payload shapes:
//!
//! - memory read: location (4 bytes) + item count (2 bytes)
//! - memory write: location + item count + encoded values
//! - memory fill: location + item count + one encoded value
//! - run / stop / status read: no payload

use bytes::{BufMut, Bytes, BytesMut};

use crate::header::{FinsHeader, FINS_HEADER_SIZE};
use crate::memory::MemoryLocation;

/// The FINS commands this client issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCode {
    /// Controller status read (0x06 0x01).
    StatusRead,
    /// Memory area read (0x01 0x01).
    MemoryRead,
    /// Memory area write (0x01 0x02).
    MemoryWrite,
    /// Memory area fill (0x01 0x03).
    MemoryFill,
    /// Run (0x04 0x01).
    Run,
    /// Stop (0x04 0x02).
    Stop,
}

impl CommandCode {
    /// The 2-byte wire form of this command.
    pub fn to_bytes(self) -> [u8; 2] {
        match self {
            CommandCode::StatusRead => [0x06, 0x01],
            CommandCode::MemoryRead => [0x01, 0x01],
            CommandCode::MemoryWrite => [0x01, 0x02],
            CommandCode::MemoryFill => [0x01, 0x03],
            CommandCode::Run => [0x04, 0x01],
            CommandCode::Stop => [0x04, 0x02],
        }
    }

    /// Classifies an echoed command code from a response frame.
    ///
    /// Unknown codes return `None`; responses carrying them are still
    /// processed through the default (acknowledge-only) path.
    pub fn from_bytes(bytes: [u8; 2]) -> Option<Self> {
        match bytes {
            [0x06, 0x01] => Some(CommandCode::StatusRead),
            [0x01, 0x01] => Some(CommandCode::MemoryRead),
            [0x01, 0x02] => Some(CommandCode::MemoryWrite),
            [0x01, 0x03] => Some(CommandCode::MemoryFill),
            [0x04, 0x01] => Some(CommandCode::Run),
            [0x04, 0x02] => Some(CommandCode::Stop),
            _ => None,
        }
    }
}

/// Typed builder for outgoing FINS frames.
///
/// Starts from a serialized header, then appends the command code and the
/// payload pieces in order.
///
/// # Example
///
/// ```
/// use fins_udp::{CommandCode, FinsHeader, FrameBuilder};
///
/// let mut header = FinsHeader::new(0x00, 0x22);
/// header.bump_sid();
/// let frame = FrameBuilder::new(&header)
///     .command(CommandCode::StatusRead)
///     .build();
/// assert_eq!(frame.len(), 12);
/// assert_eq!(&frame[10..], [0x06, 0x01]);
/// ```
#[derive(Debug)]
pub struct FrameBuilder {
    buf: BytesMut,
}

impl FrameBuilder {
    /// Starts a frame with the serialized header.
    pub fn new(header: &FinsHeader) -> Self {
        let mut buf = BytesMut::with_capacity(FINS_HEADER_SIZE + 16);
        buf.put_slice(&header.to_bytes());
        Self { buf }
    }

    /// Appends the 2-byte command code.
    pub fn command(mut self, command: CommandCode) -> Self {
        self.buf.put_slice(&command.to_bytes());
        self
    }

    /// Appends a translated location: area code + 3 address bytes.
    pub fn location(mut self, location: &MemoryLocation) -> Self {
        self.buf.put_u8(location.area_code);
        self.buf.put_slice(&location.address);
        self
    }

    /// Appends a big-endian 16-bit scalar (item counts, fill counts).
    pub fn word(mut self, word: u16) -> Self {
        self.buf.put_u16(word);
        self
    }

    /// Appends pre-encoded payload bytes.
    pub fn data(mut self, data: &[u8]) -> Self {
        self.buf.put_slice(data);
        self
    }

    /// Finishes the frame.
    pub fn build(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Encodes values for a write or fill payload at the location's width.
///
/// Width 1 carries one byte per value (0 or 1, bit semantics), width 2 a
/// big-endian word, width 4 a big-endian double word. Values wider than the
/// element are truncated to it.
pub(crate) fn encode_values(values: &[u32], bytes_per_location: u8) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * bytes_per_location as usize);
    for &value in values {
        match bytes_per_location {
            1 => bytes.push(u8::from(value > 0)),
            4 => bytes.extend_from_slice(&value.to_be_bytes()),
            _ => bytes.extend_from_slice(&(value as u16).to_be_bytes()),
        }
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::DEFAULT_SOURCE_NODE;
    use crate::memory::translate;

    fn header_with_sid(sid: u8) -> FinsHeader {
        let mut header = FinsHeader::new(0x00, DEFAULT_SOURCE_NODE);
        for _ in 0..sid {
            header.bump_sid();
        }
        header
    }

    #[test]
    fn test_command_code_round_trip() {
        for command in [
            CommandCode::StatusRead,
            CommandCode::MemoryRead,
            CommandCode::MemoryWrite,
            CommandCode::MemoryFill,
            CommandCode::Run,
            CommandCode::Stop,
        ] {
            assert_eq!(CommandCode::from_bytes(command.to_bytes()), Some(command));
        }
        assert_eq!(CommandCode::from_bytes([0x23, 0x01]), None);
    }

    #[test]
    fn test_read_frame_layout() {
        let location = translate("D100").unwrap().location();
        let frame = FrameBuilder::new(&header_with_sid(1))
            .command(CommandCode::MemoryRead)
            .location(&location)
            .word(4)
            .build();

        assert_eq!(
            hex::encode(&frame),
            "800002000000002200010101820064000004"
        );
    }

    #[test]
    fn test_write_frame_layout() {
        let location = translate("D200").unwrap().location();
        let data = encode_values(&[0x1234, 0x5678], location.bytes_per_location);
        let frame = FrameBuilder::new(&header_with_sid(2))
            .command(CommandCode::MemoryWrite)
            .location(&location)
            .word(2)
            .data(&data)
            .build();

        assert_eq!(
            hex::encode(&frame),
            "8000020000000022000201028200c800000212345678"
        );
    }

    #[test]
    fn test_fill_frame_layout() {
        let location = translate("D10").unwrap().location();
        let data = encode_values(&[0xBEEF], location.bytes_per_location);
        let frame = FrameBuilder::new(&header_with_sid(3))
            .command(CommandCode::MemoryFill)
            .location(&location)
            .word(50)
            .data(&data)
            .build();

        assert_eq!(frame.len(), 10 + 2 + 4 + 2 + 2);
        assert_eq!(&frame[10..12], [0x01, 0x03]);
        assert_eq!(&frame[12..16], [0x82, 0x00, 0x0A, 0x00]);
        assert_eq!(&frame[16..18], [0x00, 0x32]);
        assert_eq!(&frame[18..], [0xBE, 0xEF]);
    }

    #[test]
    fn test_bare_command_frame() {
        let frame = FrameBuilder::new(&header_with_sid(1))
            .command(CommandCode::Run)
            .build();
        assert_eq!(frame.len(), 12);
        assert_eq!(&frame[10..], [0x04, 0x01]);
    }

    #[test]
    fn test_encode_words() {
        assert_eq!(encode_values(&[0x0102, 0xFFFF], 2), [0x01, 0x02, 0xFF, 0xFF]);
    }

    #[test]
    fn test_encode_bits() {
        assert_eq!(encode_values(&[0, 1, 7], 1), [0, 1, 1]);
    }

    #[test]
    fn test_encode_dwords() {
        assert_eq!(
            encode_values(&[0x0102_0304], 4),
            [0x01, 0x02, 0x03, 0x04]
        );
    }
}
