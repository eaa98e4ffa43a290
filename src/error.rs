//! Error types for the RTU slave core
//!
//! Every variant carries only `Copy` data so the core stays allocation-free.
//! In `std` builds `thiserror` provides `Display` and `std::error::Error`;
//! `no_std` builds use the hand-written `Display` below.

use crate::constants::{
    EXCEPTION_ILLEGAL_DATA_ADDRESS, EXCEPTION_ILLEGAL_DATA_VALUE, EXCEPTION_ILLEGAL_FUNCTION,
    EXCEPTION_SERVER_DEVICE_FAILURE,
};

/// Result alias used throughout the crate
pub type SlaveResult<T> = core::result::Result<T, SlaveError>;

/// Errors raised by the slave core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlaveError {
    /// A push would exceed the fixed frame capacity
    #[cfg_attr(
        feature = "std",
        error("Frame buffer overflow: {requested} bytes exceed capacity {capacity}")
    )]
    BufferOverflow { capacity: usize, requested: usize },

    /// Inbound frame shorter than the minimum for its function
    #[cfg_attr(
        feature = "std",
        error("Frame too short: {len} bytes (need at least {min})")
    )]
    FrameTooShort { len: usize, min: usize },

    /// Trailing CRC does not match the frame contents
    #[cfg_attr(
        feature = "std",
        error("CRC mismatch: expected 0x{expected:04X}, got 0x{actual:04X}")
    )]
    CrcMismatch { expected: u16, actual: u16 },

    /// Function code not supported (or disabled) on this slave
    #[cfg_attr(feature = "std", error("Illegal function code: 0x{code:02X}"))]
    IllegalFunction { code: u8 },

    /// Register address outside the register store
    #[cfg_attr(feature = "std", error("Register address out of range: 0x{address:08X}"))]
    AddressOutOfRange { address: u32 },

    /// Quantity of registers outside the allowed range
    #[cfg_attr(
        feature = "std",
        error("Invalid quantity: {quantity} (allowed 1..={max})")
    )]
    InvalidQuantity { quantity: u16, max: u16 },

    /// Byte count field disagrees with the quantity or the frame length
    #[cfg_attr(
        feature = "std",
        error("Byte count mismatch: declared {declared}, expected {expected}")
    )]
    ByteCountMismatch { declared: usize, expected: usize },

    /// Configuration rejected by validation
    #[cfg_attr(feature = "std", error("Invalid configuration: {reason}"))]
    InvalidConfig { reason: &'static str },

    /// Event queue full, the event was dropped
    #[cfg_attr(feature = "std", error("Event queue full (capacity {capacity})"))]
    QueueFull { capacity: usize },

    /// Serial collaborator failure (host server only)
    #[cfg_attr(feature = "std", error("Serial I/O error: {kind}"))]
    Io { kind: IoKind },
}

/// Coarse classification of serial I/O failures, kept `Copy` for `no_std`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoKind {
    /// Opening the port failed
    Open,
    /// Reading from the port failed
    Read,
    /// Writing to the port failed
    Write,
}

impl core::fmt::Display for IoKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Read => "read",
            Self::Write => "write",
        };
        f.write_str(s)
    }
}

#[cfg(not(feature = "std"))]
impl core::fmt::Display for SlaveError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BufferOverflow {
                capacity,
                requested,
            } => write!(
                f,
                "Frame buffer overflow: {} bytes exceed capacity {}",
                requested, capacity
            ),
            Self::FrameTooShort { len, min } => {
                write!(f, "Frame too short: {} bytes (need at least {})", len, min)
            }
            Self::CrcMismatch { expected, actual } => write!(
                f,
                "CRC mismatch: expected 0x{:04X}, got 0x{:04X}",
                expected, actual
            ),
            Self::IllegalFunction { code } => write!(f, "Illegal function code: 0x{:02X}", code),
            Self::AddressOutOfRange { address } => {
                write!(f, "Register address out of range: 0x{:08X}", address)
            }
            Self::InvalidQuantity { quantity, max } => {
                write!(f, "Invalid quantity: {} (allowed 1..={})", quantity, max)
            }
            Self::ByteCountMismatch { declared, expected } => write!(
                f,
                "Byte count mismatch: declared {}, expected {}",
                declared, expected
            ),
            Self::InvalidConfig { reason } => write!(f, "Invalid configuration: {}", reason),
            Self::QueueFull { capacity } => write!(f, "Event queue full (capacity {})", capacity),
            Self::Io { kind } => write!(f, "Serial I/O error: {}", kind),
        }
    }
}

impl SlaveError {
    /// Exception code answered on the wire for this error, if any.
    ///
    /// Framing errors (short frame, CRC, overflow) have no exception: the frame
    /// is dropped without a response.
    pub fn exception(&self) -> Option<Exception> {
        match self {
            Self::IllegalFunction { .. } => Some(Exception::IllegalFunction),
            Self::AddressOutOfRange { .. } => Some(Exception::IllegalDataAddress),
            Self::InvalidQuantity { .. } | Self::ByteCountMismatch { .. } => {
                Some(Exception::IllegalDataValue)
            }
            Self::Io { .. } => Some(Exception::ServerDeviceFailure),
            Self::BufferOverflow { .. }
            | Self::FrameTooShort { .. }
            | Self::CrcMismatch { .. }
            | Self::InvalidConfig { .. }
            | Self::QueueFull { .. } => None,
        }
    }

    /// Whether the error belongs to the framing layer (frame is dropped silently)
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::BufferOverflow { .. } | Self::FrameTooShort { .. } | Self::CrcMismatch { .. }
        )
    }
}

/// Modbus exception codes emitted by this slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Exception {
    /// Function code not supported
    IllegalFunction = EXCEPTION_ILLEGAL_FUNCTION,
    /// Register range outside the store
    IllegalDataAddress = EXCEPTION_ILLEGAL_DATA_ADDRESS,
    /// Quantity or byte count invalid
    IllegalDataValue = EXCEPTION_ILLEGAL_DATA_VALUE,
    /// Unrecoverable error while accessing the store
    ServerDeviceFailure = EXCEPTION_SERVER_DEVICE_FAILURE,
}

impl Exception {
    /// Wire value of the exception code
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Get human-readable description
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IllegalFunction => "Illegal Function",
            Self::IllegalDataAddress => "Illegal Data Address",
            Self::IllegalDataValue => "Illegal Data Value",
            Self::ServerDeviceFailure => "Server Device Failure",
        }
    }
}

impl core::fmt::Display for Exception {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} (0x{:02X})", self.as_str(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_codes() {
        assert_eq!(Exception::IllegalFunction.code(), 0x01);
        assert_eq!(Exception::IllegalDataAddress.code(), 0x02);
        assert_eq!(Exception::IllegalDataValue.code(), 0x03);
        assert_eq!(Exception::ServerDeviceFailure.code(), 0x04);
    }

    #[test]
    fn test_error_to_exception_mapping() {
        assert_eq!(
            SlaveError::IllegalFunction { code: 0x2B }.exception(),
            Some(Exception::IllegalFunction)
        );
        assert_eq!(
            SlaveError::AddressOutOfRange { address: 0x9000 }.exception(),
            Some(Exception::IllegalDataAddress)
        );
        assert_eq!(
            SlaveError::InvalidQuantity {
                quantity: 0,
                max: 125
            }
            .exception(),
            Some(Exception::IllegalDataValue)
        );
        assert_eq!(
            SlaveError::CrcMismatch {
                expected: 1,
                actual: 2
            }
            .exception(),
            None
        );
    }

    #[test]
    fn test_framing_classification() {
        assert!(SlaveError::FrameTooShort { len: 2, min: 4 }.is_framing());
        assert!(!SlaveError::IllegalFunction { code: 1 }.is_framing());
    }

    #[test]
    fn test_display_messages() {
        let err = SlaveError::CrcMismatch {
            expected: 0x0A84,
            actual: 0x1234,
        };
        assert_eq!(err.to_string(), "CRC mismatch: expected 0x0A84, got 0x1234");

        let err = SlaveError::IllegalFunction { code: 0x2B };
        assert_eq!(err.to_string(), "Illegal function code: 0x2B");

        assert_eq!(
            Exception::IllegalDataAddress.to_string(),
            "Illegal Data Address (0x02)"
        );
    }
}
