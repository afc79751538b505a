//! Error types for FINS communication.

use std::io;
use thiserror::Error;

/// Result type alias for FINS operations.
pub type Result<T> = std::result::Result<T, FinsError>;

/// Errors that can occur during FINS communication.
///
/// Timeouts are deliberately *not* an error: no answer within the window is
/// reported as a [`ClientEvent::Timeout`](crate::ClientEvent::Timeout) event
/// so callers can tell "no answer" apart from "answer with a failure code".
#[derive(Debug, Error)]
pub enum FinsError {
    /// Memory address string does not match the `AREA<number>[.<bit>]` grammar.
    #[error("invalid address '{address}': {reason}")]
    AddressFormat {
        /// The offending address string.
        address: String,
        /// Description of the grammar violation.
        reason: String,
    },

    /// Non-zero end code returned by the controller.
    ///
    /// The message carries the two-byte hex code; codes listed in the FINS
    /// network-relay table also carry their text.
    #[error("{}", format_end_code(.main, .sub))]
    EndCode {
        /// High byte of the end code (network relay class).
        main: u8,
        /// Low byte of the end code.
        sub: u8,
    },

    /// Malformed or truncated response datagram.
    #[error("invalid response: {reason}")]
    Response {
        /// Description of the framing violation.
        reason: String,
    },

    /// Socket-level failure, forwarded verbatim.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Operation issued after the client was closed.
    #[error("client is closed")]
    Closed,
}

impl FinsError {
    /// Creates a new `AddressFormat` error.
    pub fn address_format(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AddressFormat {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `EndCode` error from a 16-bit response code.
    pub fn end_code(code: u16) -> Self {
        Self::EndCode {
            main: (code >> 8) as u8,
            sub: (code & 0xFF) as u8,
        }
    }

    /// Creates a new `Response` error.
    pub fn response(reason: impl Into<String>) -> Self {
        Self::Response {
            reason: reason.into(),
        }
    }
}

/// Returns the network-relay text for an end code, if the code is mapped.
///
/// The table covers the FINS network-relay class; controller-specific codes
/// outside it are surfaced with the raw hex only.
///
/// # Example
///
/// ```
/// use fins_udp::end_code_description;
///
/// assert_eq!(
///     end_code_description(0x01, 0x01),
///     Some("Local node not part of Network")
/// );
/// assert_eq!(end_code_description(0x20, 0x05), None);
/// ```
pub fn end_code_description(main: u8, sub: u8) -> Option<&'static str> {
    match (main, sub) {
        (0x00, 0x00) => Some("Completed normally"),
        (0x00, 0x01) => Some("Service was interrupted"),
        (0x01, 0x01) => Some("Local node not part of Network"),
        (0x01, 0x02) => Some("Token time-out, node number too large"),
        (0x01, 0x03) => Some("Number of transmit retries exceeded"),
        (0x01, 0x04) => Some("Maximum number of frames exceeded"),
        (0x01, 0x05) => Some("Node number setting error (range)"),
        (0x01, 0x06) => Some("Node number duplication error"),
        _ => None,
    }
}

fn format_end_code(main: &u8, sub: &u8) -> String {
    match end_code_description(*main, *sub) {
        Some(text) => format!("controller end code {main:02X}:{sub:02X} ({text})"),
        None => format!("controller end code {main:02X}:{sub:02X}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_format_display() {
        let err = FinsError::address_format("D", "missing numeric address");
        assert_eq!(
            err.to_string(),
            "invalid address 'D': missing numeric address"
        );
    }

    #[test]
    fn test_end_code_mapped_display() {
        let err = FinsError::end_code(0x0101);
        assert_eq!(
            err.to_string(),
            "controller end code 01:01 (Local node not part of Network)"
        );
    }

    #[test]
    fn test_end_code_unmapped_display() {
        let err = FinsError::end_code(0x2005);
        assert_eq!(err.to_string(), "controller end code 20:05");
    }

    #[test]
    fn test_end_code_splits_bytes() {
        match FinsError::end_code(0x0103) {
            FinsError::EndCode { main, sub } => {
                assert_eq!(main, 0x01);
                assert_eq!(sub, 0x03);
            }
            other => panic!("expected EndCode, got {other:?}"),
        }
    }

    #[test]
    fn test_description_table() {
        assert_eq!(end_code_description(0x00, 0x00), Some("Completed normally"));
        assert_eq!(
            end_code_description(0x01, 0x03),
            Some("Number of transmit retries exceeded")
        );
        assert_eq!(end_code_description(0xFF, 0xFF), None);
    }

    #[test]
    fn test_closed_display() {
        assert_eq!(FinsError::Closed.to_string(), "client is closed");
    }
}
