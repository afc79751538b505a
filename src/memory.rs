//! Memory area tables and address translation.
//!
//! Translates human-readable addresses such as `D100`, `CIO10.5`, or `C5`
//! into the binary area-code/offset form carried in FINS frames.
//!
//! Addresses follow the grammar `AREA<number>[.<bit>]`. The area prefix is
//! matched case-insensitively against fixed tables; word and bit access use
//! separate area codes, and a handful of areas (counters, data registers,
//! index registers) live at fixed offsets within a shared address space.
//!
//! Two quirks of the addressing scheme are part of the contract:
//!
//! - A bit suffix on an area without a bit-addressable code (e.g. `D100.3`)
//!   downgrades to a word read with a bit mask applied during decoding.
//! - An unrecognized area prefix does not fail: it falls back to the Data
//!   Memory code for the resolved addressing mode. The fallback is tagged
//!   as [`Translation::Defaulted`] so callers can observe it.

use crate::error::{FinsError, Result};

/// Data Memory word-access area code, used as the fallback for unknown areas.
const DM_WORD_CODE: u8 = 0x82;
/// Data Memory bit-access area code, used as the fallback for unknown areas.
const DM_BIT_CODE: u8 = 0x02;

/// Word-access area code for a memory area prefix.
fn word_area_code(area: &str) -> Option<u8> {
    match area {
        "E" | "EM" => Some(0xA0),
        "CIO" => Some(0xB0),
        "W" | "WR" => Some(0xB1),
        "H" | "HR" => Some(0xB2),
        "A" | "AR" => Some(0xB3),
        "D" | "DM" => Some(0x82),
        "C" | "T" => Some(0x89),
        "DR" => Some(0xBC),
        "IR" => Some(0xDC),
        _ => None,
    }
}

/// Bit-access area code for a memory area prefix.
fn bit_area_code(area: &str) -> Option<u8> {
    match area {
        "E" | "EM" => Some(0x20),
        "CIO" => Some(0x30),
        "W" | "WR" => Some(0x31),
        "H" | "HR" => Some(0x32),
        "A" | "AR" => Some(0x33),
        "D" | "DM" => Some(0x02),
        "TK" => Some(0x06),
        "TS" => Some(0x09),
        _ => None,
    }
}

/// Constant word offset for areas stored within a shared address space.
fn address_offset(area: &str) -> u16 {
    match area {
        "C" => 0x8000,
        "DR" => 0x0200,
        "IR" => 0x0100,
        _ => 0,
    }
}

/// Element width override for areas not using the 1-bit/2-word default.
fn bytes_per_location_override(area: &str) -> Option<u8> {
    match area {
        "IR" => Some(4),
        _ => None,
    }
}

/// Binary-ready form of a translated memory address.
///
/// Immutable once produced; for memory reads a copy of the decoding-relevant
/// fields is parked in the session registry until the response arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLocation {
    /// FINS memory area code (word- or bit-access variant).
    pub area_code: u8,
    /// Area-relative offset: 2-byte big-endian word address, then the bit
    /// index (0 unless true bit addressing is in effect).
    pub address: [u8; 3],
    /// Element width used for decoding: 1, 2, or 4 bytes.
    pub bytes_per_location: u8,
    /// Nonzero only when bit access is emulated over a word area; each
    /// decoded element is reduced to `(element & mask) != 0`.
    pub bit_mask: u16,
}

/// Outcome of address translation.
///
/// Unrecognized area prefixes silently map to the Data Memory default; the
/// variant records that the fallback happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    /// The area prefix matched a known memory area.
    Resolved(MemoryLocation),
    /// The area prefix was unrecognized and fell back to Data Memory.
    Defaulted {
        /// The DM-defaulted location.
        location: MemoryLocation,
        /// The unrecognized area prefix, uppercased.
        area: String,
    },
}

impl Translation {
    /// The translated location, regardless of how the area resolved.
    pub fn location(&self) -> MemoryLocation {
        match self {
            Translation::Resolved(location) => *location,
            Translation::Defaulted { location, .. } => *location,
        }
    }

    /// Whether the area prefix fell back to the Data Memory default.
    pub fn is_defaulted(&self) -> bool {
        matches!(self, Translation::Defaulted { .. })
    }
}

/// Split into area letters, numeric address, and optional bit suffix.
struct ParsedAddress<'a> {
    area: String,
    word: u32,
    bit: Option<u32>,
    raw: &'a str,
}

fn parse_address(raw: &str) -> Result<ParsedAddress<'_>> {
    let letters: String = raw.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    if letters.is_empty() || letters.len() > 3 {
        return Err(FinsError::address_format(
            raw,
            "area prefix must be 1 to 3 letters",
        ));
    }

    let rest = &raw[letters.len()..];
    let digits: &str = &rest[..rest
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(rest.len(), |(i, _)| i)];
    if digits.is_empty() || digits.len() > 5 {
        return Err(FinsError::address_format(
            raw,
            "numeric address must be 1 to 5 digits",
        ));
    }
    let word: u32 = digits
        .parse()
        .map_err(|_| FinsError::address_format(raw, "numeric address out of range"))?;

    // A bare trailing dot counts as no bit suffix.
    let bit = match &rest[digits.len()..] {
        "" | "." => None,
        suffix => {
            let bit_digits = suffix
                .strip_prefix('.')
                .ok_or_else(|| FinsError::address_format(raw, "expected '.' before bit index"))?;
            if !bit_digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(FinsError::address_format(raw, "bit index must be numeric"));
            }
            let bit: u32 = bit_digits
                .parse()
                .map_err(|_| FinsError::address_format(raw, "bit index out of range"))?;
            Some(bit)
        }
    };

    Ok(ParsedAddress {
        area: letters.to_ascii_uppercase(),
        word,
        bit,
        raw,
    })
}

/// Translates a memory address string into its binary location form.
///
/// Pure and deterministic: the same input always yields the same
/// [`Translation`]. No I/O, no state beyond the area tables.
///
/// # Errors
///
/// Returns [`FinsError::AddressFormat`] when the string does not match the
/// `AREA<number>[.<bit>]` grammar, or when a bit suffix over a word-only
/// area names a bit outside 0..=15 (the mask is one word wide).
///
/// # Example
///
/// ```
/// use fins_udp::translate;
///
/// let location = translate("D100")?.location();
/// assert_eq!(location.area_code, 0x82);
/// assert_eq!(location.address, [0x00, 0x64, 0x00]);
/// assert_eq!(location.bytes_per_location, 2);
/// # Ok::<(), fins_udp::FinsError>(())
/// ```
pub fn translate(address: &str) -> Result<Translation> {
    let parsed = parse_address(address)?;
    let area = parsed.area.as_str();

    let mut bit_addressing = parsed.bit.is_some();
    let mut bit_mask: u16 = 0;

    // Bit suffix over an area without a bit code: downgrade to a word read
    // and mask the requested bit out of each decoded word.
    if bit_addressing && bit_area_code(area).is_none() {
        let bit = parsed.bit.unwrap_or(0);
        if bit > 15 {
            return Err(FinsError::address_format(
                parsed.raw,
                "masked bit index must be 0 to 15",
            ));
        }
        bit_addressing = false;
        bit_mask = 1 << bit;
    }

    // Areas with no word code at all are bit-addressed regardless of suffix.
    if word_area_code(area).is_none() {
        bit_addressing = true;
    }

    let (area_code, defaulted) = if bit_addressing {
        match bit_area_code(area) {
            Some(code) => (code, false),
            None => (DM_BIT_CODE, true),
        }
    } else {
        match word_area_code(area) {
            Some(code) => (code, false),
            None => (DM_WORD_CODE, true),
        }
    };

    let word = (parsed.word.wrapping_add(u32::from(address_offset(area))) & 0xFFFF) as u16;

    let bytes_per_location = bytes_per_location_override(area)
        .unwrap_or(if bit_addressing { 1 } else { 2 });

    let bit_byte = match parsed.bit {
        Some(bit) if bit_addressing && bit < 16 => bit as u8,
        _ => 0,
    };

    let location = MemoryLocation {
        area_code,
        address: [(word >> 8) as u8, (word & 0xFF) as u8, bit_byte],
        bytes_per_location,
        bit_mask,
    };

    if defaulted {
        Ok(Translation::Defaulted {
            location,
            area: parsed.area,
        })
    } else {
        Ok(Translation::Resolved(location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(address: &str) -> MemoryLocation {
        match translate(address).unwrap() {
            Translation::Resolved(location) => location,
            other => panic!("expected Resolved for {address}, got {other:?}"),
        }
    }

    #[test]
    fn test_dm_word_read() {
        for (address, word) in [("D0", 0u16), ("D100", 100), ("D9999", 9999)] {
            let location = resolved(address);
            assert_eq!(location.area_code, 0x82);
            assert_eq!(location.address, [(word >> 8) as u8, (word & 0xFF) as u8, 0]);
            assert_eq!(location.bytes_per_location, 2);
            assert_eq!(location.bit_mask, 0);
        }
    }

    #[test]
    fn test_counter_offset() {
        let location = resolved("C5");
        assert_eq!(location.area_code, 0x89);
        // 5 + 0x8000
        assert_eq!(location.address, [0x80, 0x05, 0x00]);
        assert_eq!(location.bytes_per_location, 2);
    }

    #[test]
    fn test_data_register_offset() {
        let location = resolved("DR3");
        assert_eq!(location.area_code, 0xBC);
        assert_eq!(location.address, [0x02, 0x03, 0x00]);
    }

    #[test]
    fn test_index_register_width() {
        let location = resolved("IR2");
        assert_eq!(location.area_code, 0xDC);
        assert_eq!(location.address, [0x01, 0x02, 0x00]);
        assert_eq!(location.bytes_per_location, 4);
    }

    #[test]
    fn test_true_bit_addressing() {
        let location = resolved("CIO10.5");
        assert_eq!(location.area_code, 0x30);
        assert_eq!(location.address, [0x00, 0x0A, 0x05]);
        assert_eq!(location.bytes_per_location, 1);
        assert_eq!(location.bit_mask, 0);
    }

    #[test]
    fn test_emulated_bit_over_dm() {
        // DM has no bit code: downgraded to a word read with a mask.
        let location = resolved("D100.3");
        assert_eq!(location.area_code, 0x82);
        assert_eq!(location.address, [0x00, 0x64, 0x00]);
        assert_eq!(location.bytes_per_location, 2);
        assert_eq!(location.bit_mask, 1 << 3);
    }

    #[test]
    fn test_emulated_bit_out_of_range() {
        assert!(translate("D100.16").is_err());
        assert!(translate("D100.15").is_ok());
    }

    #[test]
    fn test_bit_only_area() {
        // TS has no word code, so a plain address is still bit-addressed.
        let location = resolved("TS7");
        assert_eq!(location.area_code, 0x09);
        assert_eq!(location.address, [0x00, 0x07, 0x00]);
        assert_eq!(location.bytes_per_location, 1);
    }

    #[test]
    fn test_true_bit_index_above_15_encodes_zero() {
        let location = resolved("CIO1.17");
        assert_eq!(location.address, [0x00, 0x01, 0x00]);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(translate("cio10.5").unwrap(), translate("CIO10.5").unwrap());
        assert_eq!(translate("d100").unwrap(), translate("D100").unwrap());
    }

    #[test]
    fn test_unknown_area_defaults_to_dm() {
        // No word code for Z forces bit addressing, then the bit table
        // misses too, landing on the DM bit code.
        match translate("Z100").unwrap() {
            Translation::Defaulted { location, area } => {
                assert_eq!(area, "Z");
                assert_eq!(location.area_code, 0x02);
                assert_eq!(location.bytes_per_location, 1);
            }
            other => panic!("expected Defaulted, got {other:?}"),
        }
    }

    #[test]
    fn test_trailing_dot_is_word_access() {
        let location = resolved("D100.");
        assert_eq!(location.bit_mask, 0);
        assert_eq!(location.bytes_per_location, 2);
    }

    #[test]
    fn test_idempotent() {
        let first = translate("H12.9").unwrap();
        let second = translate("H12.9").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rejects_malformed() {
        for address in ["", "100", "D", "TOOL5", "D1X", "D100.x", "D123456"] {
            assert!(
                matches!(translate(address), Err(FinsError::AddressFormat { .. })),
                "expected AddressFormat for {address:?}"
            );
        }
    }
}
