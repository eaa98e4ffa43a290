//! RTU frame buffers
//!
//! Fixed-size stack arrays with a write cursor; no heap allocation.
//! The slave owns one inbound and one outbound [`FrameBuffer`].

use tracing::debug;

use crate::checksum::{crc_bytes, verify_crc};
use crate::constants::{
    CRC_LEN, FC_READ_HOLDING_REGISTERS, FC_READ_INPUT_REGISTERS, FC_WRITE_MULTIPLE_REGISTERS,
    FC_WRITE_SINGLE_REGISTER, MAX_ADU_SIZE, MAX_READ_REGISTERS, READ_RESPONSE_HEADER_LEN,
};
use crate::error::{SlaveError, SlaveResult};

/// Stack-allocated RTU frame with a write cursor
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    /// Fixed-size buffer (stack)
    data: [u8; MAX_ADU_SIZE],
    /// Write cursor, i.e. logical length
    len: usize,
}

impl FrameBuffer {
    /// Create an empty frame
    #[inline]
    pub const fn new() -> Self {
        Self {
            data: [0; MAX_ADU_SIZE],
            len: 0,
        }
    }

    /// Create a frame from a byte slice
    #[inline]
    pub fn from_slice(data: &[u8]) -> SlaveResult<Self> {
        let mut frame = Self::new();
        frame.extend(data)?;
        Ok(frame)
    }

    /// Fixed capacity in bytes
    #[inline]
    pub const fn capacity(&self) -> usize {
        MAX_ADU_SIZE
    }

    /// Bytes still available
    #[inline]
    pub fn remaining(&self) -> usize {
        MAX_ADU_SIZE - self.len
    }

    /// Push a single byte
    #[inline]
    pub fn push(&mut self, byte: u8) -> SlaveResult<()> {
        if self.len >= MAX_ADU_SIZE {
            return Err(SlaveError::BufferOverflow {
                capacity: MAX_ADU_SIZE,
                requested: self.len + 1,
            });
        }
        self.data[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    /// Push u16 in big-endian
    #[inline]
    pub fn push_u16(&mut self, value: u16) -> SlaveResult<()> {
        self.extend(&value.to_be_bytes())
    }

    /// Extend with a byte slice
    #[inline]
    pub fn extend(&mut self, data: &[u8]) -> SlaveResult<()> {
        if data.len() > self.remaining() {
            return Err(SlaveError::BufferOverflow {
                capacity: MAX_ADU_SIZE,
                requested: self.len + data.len(),
            });
        }
        self.data[self.len..self.len + data.len()].copy_from_slice(data);
        self.len += data.len();
        Ok(())
    }

    /// Append the CRC of everything written so far, low byte first
    pub fn append_crc(&mut self) -> SlaveResult<()> {
        let crc = crc_bytes(self.as_slice());
        self.extend(&crc)
    }

    /// Get immutable data slice up to the cursor
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// The first `len` bytes regardless of the cursor (clamped to capacity)
    ///
    /// Used to transmit a built frame after its cursor has been reset.
    #[inline]
    pub fn window(&self, len: usize) -> &[u8] {
        &self.data[..len.min(MAX_ADU_SIZE)]
    }

    /// Frame body: everything before the trailing CRC
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.data[..self.len.saturating_sub(CRC_LEN)]
    }

    /// Get current length
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Move the cursor back to 0, keeping the bytes
    #[inline]
    pub fn reset_cursor(&mut self) {
        self.len = 0;
    }

    /// Zero every byte and move the cursor back to 0
    #[inline]
    pub fn clear(&mut self) {
        self.data.fill(0);
        self.len = 0;
    }

    /// Slave address (first byte)
    #[inline]
    pub fn slave_id(&self) -> Option<u8> {
        self.as_slice().first().copied()
    }

    /// Function code (second byte)
    #[inline]
    pub fn function_code(&self) -> Option<u8> {
        self.as_slice().get(1).copied()
    }

    /// Get human-readable function code description
    pub fn function_code_description(fc: u8) -> &'static str {
        match fc & 0x7F {
            0x01 => "Read Coils",
            0x02 => "Read Discrete Inputs",
            0x03 => "Read Holding Registers",
            0x04 => "Read Input Registers",
            0x05 => "Write Single Coil",
            0x06 => "Write Single Register",
            0x0F => "Write Multiple Coils",
            0x10 => "Write Multiple Registers",
            _ => "Unknown Function",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Request frame builder - fluent API
///
/// Produces complete ADUs (`[slave][fc][fields][crc]`), as a master would put
/// them on the wire.
pub struct RequestBuilder {
    frame: FrameBuffer,
}

impl RequestBuilder {
    /// Start a frame addressed to `slave_id`
    #[inline]
    pub fn new(slave_id: u8) -> Self {
        let mut frame = FrameBuffer::new();
        frame.data[0] = slave_id;
        frame.len = 1;
        Self { frame }
    }

    /// Set function code
    #[inline]
    pub fn function_code(mut self, fc: u8) -> SlaveResult<Self> {
        self.frame.push(fc)?;
        Ok(self)
    }

    /// Add address
    #[inline]
    pub fn address(mut self, addr: u16) -> SlaveResult<Self> {
        self.frame.push_u16(addr)?;
        Ok(self)
    }

    /// Add quantity
    #[inline]
    pub fn quantity(mut self, qty: u16) -> SlaveResult<Self> {
        self.frame.push_u16(qty)?;
        Ok(self)
    }

    /// Add a byte
    #[inline]
    pub fn byte(mut self, b: u8) -> SlaveResult<Self> {
        self.frame.push(b)?;
        Ok(self)
    }

    /// Add data
    #[inline]
    pub fn data(mut self, data: &[u8]) -> SlaveResult<Self> {
        self.frame.extend(data)?;
        Ok(self)
    }

    /// Append the CRC and return the frame
    pub fn build(mut self) -> SlaveResult<FrameBuffer> {
        self.frame.append_crc()?;
        if let Some(fc) = self.frame.function_code() {
            debug!(
                "Frame built: slave={} FC={:02X} ({}), total_len={}",
                self.frame.data[0],
                fc,
                FrameBuffer::function_code_description(fc),
                self.frame.len()
            );
        }
        Ok(self.frame)
    }

    /// Build a read holding registers frame (FC03)
    pub fn build_read_holding_registers(
        slave_id: u8,
        start_address: u16,
        quantity: u16,
    ) -> SlaveResult<FrameBuffer> {
        Self::new(slave_id)
            .function_code(FC_READ_HOLDING_REGISTERS)?
            .address(start_address)?
            .quantity(quantity)?
            .build()
    }

    /// Build a read input registers frame (FC04)
    pub fn build_read_input_registers(
        slave_id: u8,
        start_address: u16,
        quantity: u16,
    ) -> SlaveResult<FrameBuffer> {
        Self::new(slave_id)
            .function_code(FC_READ_INPUT_REGISTERS)?
            .address(start_address)?
            .quantity(quantity)?
            .build()
    }

    /// Build a write single register frame (FC06)
    pub fn build_write_single_register(
        slave_id: u8,
        address: u16,
        value: u16,
    ) -> SlaveResult<FrameBuffer> {
        Self::new(slave_id)
            .function_code(FC_WRITE_SINGLE_REGISTER)?
            .address(address)?
            .quantity(value)?
            .build()
    }

    /// Build a write multiple registers frame (FC16)
    pub fn build_write_multiple_registers(
        slave_id: u8,
        address: u16,
        values: &[u16],
    ) -> SlaveResult<FrameBuffer> {
        let byte_count = values.len() * 2;
        if byte_count > u8::MAX as usize {
            return Err(SlaveError::ByteCountMismatch {
                declared: byte_count,
                expected: u8::MAX as usize,
            });
        }

        let mut builder = Self::new(slave_id)
            .function_code(FC_WRITE_MULTIPLE_REGISTERS)?
            .address(address)?
            .quantity(values.len() as u16)?
            .byte(byte_count as u8)?;

        // Register values in big-endian
        for &value in values {
            builder = builder.data(&value.to_be_bytes())?;
        }

        builder.build()
    }

    /// Build an arbitrary frame: `[slave][fc][payload][crc]`
    pub fn build_raw(slave_id: u8, fc: u8, payload: &[u8]) -> SlaveResult<FrameBuffer> {
        Self::new(slave_id).function_code(fc)?.data(payload)?.build()
    }
}

/// Decode the register values of a read response frame (FC03/FC04).
///
/// Checks the CRC and the byte count.
pub fn read_response_registers(
    frame: &[u8],
) -> SlaveResult<heapless::Vec<u16, { MAX_READ_REGISTERS as usize }>> {
    verify_crc(frame)?;

    let body = &frame[..frame.len() - CRC_LEN];
    if body.len() < READ_RESPONSE_HEADER_LEN {
        return Err(SlaveError::FrameTooShort {
            len: frame.len(),
            min: READ_RESPONSE_HEADER_LEN + CRC_LEN,
        });
    }

    let declared = body[2] as usize;
    let payload = &body[READ_RESPONSE_HEADER_LEN..];
    if declared != payload.len() || declared % 2 != 0 {
        return Err(SlaveError::ByteCountMismatch {
            declared,
            expected: payload.len(),
        });
    }

    let mut registers = heapless::Vec::new();
    for pair in payload.chunks_exact(2) {
        registers
            .push(u16::from_be_bytes([pair[0], pair[1]]))
            .map_err(|_| SlaveError::InvalidQuantity {
                quantity: (declared / 2) as u16,
                max: MAX_READ_REGISTERS,
            })?;
    }
    Ok(registers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_basic_operations() {
        let mut frame = FrameBuffer::new();
        assert_eq!(frame.len(), 0);
        assert!(frame.is_empty());
        assert_eq!(frame.capacity(), 256);

        frame.push(0x01).unwrap();
        frame.push(0x03).unwrap();
        assert_eq!(frame.slave_id(), Some(0x01));
        assert_eq!(frame.function_code(), Some(0x03));

        frame.push_u16(0x0100).unwrap();
        frame.push_u16(0x000A).unwrap();

        assert_eq!(frame.len(), 6);
        assert_eq!(frame.as_slice(), &[0x01, 0x03, 0x01, 0x00, 0x00, 0x0A]);
    }

    #[test]
    fn test_overflow_is_an_error() {
        let mut frame = FrameBuffer::from_slice(&[0xAA; 255]).unwrap();
        frame.push(0xBB).unwrap();
        assert_eq!(
            frame.push(0xCC),
            Err(SlaveError::BufferOverflow {
                capacity: 256,
                requested: 257
            })
        );
        assert_eq!(frame.len(), 256);

        let mut frame = FrameBuffer::from_slice(&[0; 250]).unwrap();
        assert!(frame.extend(&[0; 7]).is_err());
        assert_eq!(frame.len(), 250);
        assert!(FrameBuffer::from_slice(&[0; 257]).is_err());
    }

    #[test]
    fn test_reset_cursor_keeps_bytes_clear_zeroes_them() {
        let mut frame = FrameBuffer::from_slice(&[1, 2, 3]).unwrap();
        frame.reset_cursor();
        assert!(frame.is_empty());
        assert_eq!(frame.window(3), &[1, 2, 3]);

        frame.clear();
        assert_eq!(frame.window(3), &[0, 0, 0]);
        assert_eq!(frame.window(1000).len(), 256);
    }

    #[test]
    fn test_append_crc_and_body() {
        let mut frame = FrameBuffer::from_slice(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]).unwrap();
        frame.append_crc().unwrap();
        assert_eq!(frame.as_slice(), &[0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x84, 0x0A]);
        assert_eq!(frame.body(), &[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_build_read_holding_registers() {
        let frame = RequestBuilder::build_read_holding_registers(0x01, 0x0000, 1).unwrap();
        assert_eq!(frame.as_slice(), &[0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x84, 0x0A]);
    }

    #[test]
    fn test_build_write_single_register() {
        let frame = RequestBuilder::build_write_single_register(0x11, 0x0001, 0x0003).unwrap();
        assert_eq!(&frame.as_slice()[..6], &[0x11, 0x06, 0x00, 0x01, 0x00, 0x03]);
        assert!(verify_crc(frame.as_slice()).is_ok());
    }

    #[test]
    fn test_build_write_multiple_registers() {
        let frame =
            RequestBuilder::build_write_multiple_registers(0x01, 0x0001, &[0x000A, 0x0102])
                .unwrap();
        assert_eq!(
            frame.body(),
            &[0x01, 0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02]
        );
    }

    #[test]
    fn test_build_write_multiple_rejects_oversized_payload() {
        let values = [0u16; 128];
        assert!(RequestBuilder::build_write_multiple_registers(1, 0, &values).is_err());
    }

    #[test]
    fn test_read_response_registers() {
        let mut frame = FrameBuffer::from_slice(&[0x01, 0x03, 0x04, 0x12, 0x34, 0xAB, 0xCD]).unwrap();
        frame.append_crc().unwrap();
        let registers = read_response_registers(frame.as_slice()).unwrap();
        assert_eq!(registers.as_slice(), &[0x1234, 0xABCD]);

        let mut bad = FrameBuffer::from_slice(&[0x01, 0x03, 0x06, 0x12, 0x34]).unwrap();
        bad.append_crc().unwrap();
        assert!(matches!(
            read_response_registers(bad.as_slice()),
            Err(SlaveError::ByteCountMismatch { .. })
        ));
    }
}
