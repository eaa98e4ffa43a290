//! # Byte Order Handling for Register Cells
//!
//! A storage cell is 32 bits wide and carries two 16-bit wire registers.
//! This module converts between the cell value and the four bytes that
//! appear on the wire.
//!
//! ## Naming Convention
//!
//! Uses ABCD notation where:
//! - A = Most significant byte (MSB)
//! - B = Second byte
//! - C = Third byte
//! - D = Least significant byte (LSB)
//!
//! For cell value `0x12345678`:
//! - `BigEndian (ABCD)`: \[0x12, 0x34, 0x56, 0x78\]
//! - `LittleEndian (DCBA)`: \[0x78, 0x56, 0x34, 0x12\]
//! - `BigEndianSwap (CDAB)`: \[0x56, 0x78, 0x12, 0x34\] (default, low word first)
//! - `LittleEndianSwap (BADC)`: \[0x34, 0x12, 0x78, 0x56\]
//!
//! With `CDAB` the first wire register of a pair is the low half of the cell
//! and the second one is the high half.

use core::fmt;
use core::str::FromStr;

use crate::error::SlaveError;

/// Cell-to-wire byte order.
///
/// # Example
///
/// ```rust
/// use voltage_modbus_slave::ByteOrder;
///
/// let order: ByteOrder = "CDAB".parse().unwrap();
/// assert_eq!(order, ByteOrder::BigEndianSwap);
/// assert!(order.has_word_swap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ByteOrder {
    /// Big-endian: ABCD (high word first)
    BigEndian,

    /// Little-endian: DCBA
    LittleEndian,

    /// Big-endian with swapped words: CDAB
    ///
    /// Low word first, each word big-endian. 32-bit cells of a little-endian
    /// MCU read out register by register appear in this order.
    #[default]
    BigEndianSwap,

    /// Little-endian with swapped words: BADC
    LittleEndianSwap,
}

impl ByteOrder {
    /// Get descriptive name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BigEndian => "ABCD (Big-Endian)",
            Self::LittleEndian => "DCBA (Little-Endian)",
            Self::BigEndianSwap => "CDAB (Big-Endian Swap)",
            Self::LittleEndianSwap => "BADC (Little-Endian Swap)",
        }
    }

    /// Check if words are swapped.
    #[inline]
    pub fn has_word_swap(&self) -> bool {
        matches!(self, Self::BigEndianSwap | Self::LittleEndianSwap)
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ByteOrder {
    type Err = SlaveError;

    /// Accepts "ABCD", "DCBA", "CDAB", "BADC" in any case, with optional
    /// '-' or '_' separators ("cd-ab").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut letters = [0u8; 4];
        let mut n = 0;
        for c in s.bytes().filter(|c| *c != b'-' && *c != b'_') {
            if n == letters.len() {
                return Err(SlaveError::InvalidConfig {
                    reason: "byte order must be four letters",
                });
            }
            letters[n] = c.to_ascii_uppercase();
            n += 1;
        }

        match &letters[..n] {
            b"ABCD" => Ok(Self::BigEndian),
            b"DCBA" => Ok(Self::LittleEndian),
            b"CDAB" => Ok(Self::BigEndianSwap),
            b"BADC" => Ok(Self::LittleEndianSwap),
            _ => Err(SlaveError::InvalidConfig {
                reason: "unknown byte order",
            }),
        }
    }
}

// ============================================================================
// Cell <-> Wire Conversions
// ============================================================================

/// Exchange two byte slots of `buffer`.
#[inline]
pub fn swap(buffer: &mut [u8], a: usize, b: usize) {
    buffer.swap(a, b);
}

/// Lay out a 32-bit cell as four wire bytes.
///
/// For the default order the bytes are extracted least significant first and
/// then each adjacent pair is swapped, which gives `CDAB`.
///
/// ```rust
/// use voltage_modbus_slave::{bytes::cell_to_wire, ByteOrder};
///
/// assert_eq!(cell_to_wire(0x12345678, ByteOrder::BigEndianSwap), [0x56, 0x78, 0x12, 0x34]);
/// assert_eq!(cell_to_wire(0x12345678, ByteOrder::BigEndian), [0x12, 0x34, 0x56, 0x78]);
/// ```
#[inline]
pub fn cell_to_wire(value: u32, order: ByteOrder) -> [u8; 4] {
    match order {
        ByteOrder::BigEndian => value.to_be_bytes(),
        ByteOrder::LittleEndian => value.to_le_bytes(),
        ByteOrder::BigEndianSwap => {
            let mut bytes = value.to_le_bytes();
            swap(&mut bytes, 0, 1);
            swap(&mut bytes, 2, 3);
            bytes
        }
        ByteOrder::LittleEndianSwap => {
            let mut bytes = value.to_be_bytes();
            swap(&mut bytes, 0, 1);
            swap(&mut bytes, 2, 3);
            bytes
        }
    }
}

/// Inverse of [`cell_to_wire`].
#[inline]
pub fn wire_to_cell(bytes: [u8; 4], order: ByteOrder) -> u32 {
    let [b0, b1, b2, b3] = bytes;
    match order {
        ByteOrder::BigEndian => u32::from_be_bytes(bytes),
        ByteOrder::LittleEndian => u32::from_le_bytes(bytes),
        ByteOrder::BigEndianSwap => u32::from_le_bytes([b1, b0, b3, b2]),
        ByteOrder::LittleEndianSwap => u32::from_be_bytes([b1, b0, b3, b2]),
    }
}

/// Build a cell from a pair of wire registers (first, second).
#[inline]
pub fn registers_to_cell(first: u16, second: u16, order: ByteOrder) -> u32 {
    let [a, b] = first.to_be_bytes();
    let [c, d] = second.to_be_bytes();
    wire_to_cell([a, b, c, d], order)
}

/// Replace the first wire register of `cell`, keeping the second one.
///
/// Used for the trailing register of an odd-length write.
#[inline]
pub fn merge_first_register(cell: u32, first: u16, order: ByteOrder) -> u32 {
    let mut bytes = cell_to_wire(cell, order);
    bytes[..2].copy_from_slice(&first.to_be_bytes());
    wire_to_cell(bytes, order)
}

/// Cell written by a single register write: the value becomes the first wire
/// register and the rest of the cell is zeroed.
#[inline]
pub fn single_register_cell(value: u16, order: ByteOrder) -> u32 {
    registers_to_cell(value, 0, order)
}

// ============================================================================
// Tests
// ============================================================================
