//! CRC-16/MODBUS checksum
//!
//! Polynomial 0xA001 (reflected 0x8005), initial value 0xFFFF. The checksum is
//! transmitted low byte first.

use crc::{Crc, CRC_16_MODBUS};

use crate::constants::{CRC_LEN, MIN_FRAME_LEN};
use crate::error::{SlaveError, SlaveResult};

/// CRC calculator for RTU
const CRC_MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Compute the Modbus CRC16 over `buffer`.
///
/// Pass a sub-slice to checksum only part of a larger buffer.
///
/// ```rust
/// use voltage_modbus_slave::checksum::compute_crc;
///
/// assert_eq!(compute_crc(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]), 0x0A84);
/// ```
#[inline]
pub fn compute_crc(buffer: &[u8]) -> u16 {
    CRC_MODBUS.checksum(buffer)
}

/// CRC of `buffer` in wire order (low byte, high byte).
#[inline]
pub fn crc_bytes(buffer: &[u8]) -> [u8; 2] {
    compute_crc(buffer).to_le_bytes()
}

/// Check the trailing CRC of a complete RTU frame.
pub fn verify_crc(frame: &[u8]) -> SlaveResult<()> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(SlaveError::FrameTooShort {
            len: frame.len(),
            min: MIN_FRAME_LEN,
        });
    }

    let data_len = frame.len() - CRC_LEN;
    let actual = u16::from_le_bytes([frame[data_len], frame[data_len + 1]]);
    let expected = compute_crc(&frame[..data_len]);

    if actual != expected {
        return Err(SlaveError::CrcMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Bit-by-bit CRC used to pin the table-driven one.
    fn reference_crc(buffer: &[u8]) -> u16 {
        let mut crc: u16 = 0xFFFF;
        for &byte in buffer {
            crc ^= byte as u16;
            for _ in 0..8 {
                if crc & 0x0001 != 0 {
                    crc = (crc >> 1) ^ 0xA001;
                } else {
                    crc >>= 1;
                }
            }
        }
        crc
    }

    #[test]
    fn test_known_vectors() {
        assert_eq!(compute_crc(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]), 0x0A84);
        assert_eq!(compute_crc(b"123456789"), 0x4B37);
        assert_eq!(compute_crc(&[]), 0xFFFF);
    }

    #[test]
    fn test_wire_order_is_low_byte_first() {
        assert_eq!(
            crc_bytes(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]),
            [0x84, 0x0A]
        );
    }

    #[test]
    fn test_sub_slice() {
        let buffer = [0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0xFF, 0xFF];
        assert_eq!(compute_crc(&buffer[..6]), 0x0A84);
    }

    #[test]
    fn test_verify_crc() {
        let frame = [0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x84, 0x0A];
        assert!(verify_crc(&frame).is_ok());

        let corrupted = [0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0x84, 0x0A];
        assert!(matches!(
            verify_crc(&corrupted),
            Err(SlaveError::CrcMismatch { actual: 0x0A84, .. })
        ));

        assert_eq!(
            verify_crc(&[0x01, 0x03, 0x84]),
            Err(SlaveError::FrameTooShort { len: 3, min: 4 })
        );
    }

    proptest! {
        #[test]
        fn prop_matches_bitwise_reference(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(compute_crc(&data), reference_crc(&data));
        }

        #[test]
        fn prop_appended_crc_verifies(data in proptest::collection::vec(any::<u8>(), 2..254)) {
            let mut frame = data.clone();
            frame.extend_from_slice(&crc_bytes(&data));
            prop_assert!(verify_crc(&frame).is_ok());
        }
    }
}
