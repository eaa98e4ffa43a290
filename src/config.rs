//! # Slave Configuration
//!
//! Start-up constant data supplied by the surrounding firmware: slave
//! address, line speed, register layout and protocol limits.
//!
//! ## Modbus Specification Limits
//!
//! - **Read Holding/Input Registers (FC03/04)**: Max 125 registers per request
//! - **Write Multiple Registers (FC16)**: Max 123 registers per request
//!
//! Smaller devices may answer fewer registers per request; lower the limits
//! here and oversized requests get an Illegal Data Value exception.

use crate::bytes::ByteOrder;
use crate::constants::{
    DEFAULT_BAUD_RATE, DEFAULT_SLAVE_ID, MAX_READ_REGISTERS, MAX_SLAVE_ID, MAX_WRITE_REGISTERS,
    MIN_SLAVE_ID,
};
use crate::error::{SlaveError, SlaveResult};
use crate::function::{FunctionCode, FunctionSet};
use crate::store::MemoryMap;
use crate::timing;

/// Default maximum registers per read request (Modbus specification).
pub const DEFAULT_MAX_READ_REGISTERS: u16 = MAX_READ_REGISTERS;

/// Default maximum registers per write request (Modbus specification).
pub const DEFAULT_MAX_WRITE_REGISTERS: u16 = MAX_WRITE_REGISTERS;

/// RTU slave configuration.
///
/// # Example
///
/// ```rust
/// use voltage_modbus_slave::{MemoryMap, SlaveConfig};
///
/// let config = SlaveConfig::new(17)
///     .with_baud_rate(19200)
///     .with_memory_map(MemoryMap::new(0x0000, 0x8000))
///     .with_max_read_registers(32);
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.silence_interval().unwrap(), 40);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaveConfig {
    /// Address this slave answers to (1-247).
    pub slave_id: u8,
    /// Serial line speed, used for the silence interval.
    pub baud_rate: u32,
    /// Base offsets of the coil and register spaces.
    pub memory_map: MemoryMap,
    /// Maximum registers per read request.
    pub max_read_registers: u16,
    /// Maximum registers per write multiple request.
    pub max_write_registers: u16,
    /// Wire layout of a 32-bit cell.
    pub byte_order: ByteOrder,
    /// Set bit 0x80 on the function code of exception responses.
    pub exception_flag: bool,
    /// Function codes answered; the rest get Illegal Function.
    pub functions: FunctionSet,
}

impl SlaveConfig {
    /// Configuration for `slave_id` with defaults for everything else.
    pub fn new(slave_id: u8) -> Self {
        Self {
            slave_id,
            ..Self::default()
        }
    }

    /// Set baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set register store layout.
    pub fn with_memory_map(mut self, memory_map: MemoryMap) -> Self {
        self.memory_map = memory_map;
        self
    }

    /// Set maximum read registers.
    pub fn with_max_read_registers(mut self, count: u16) -> Self {
        self.max_read_registers = count;
        self
    }

    /// Set maximum write registers.
    pub fn with_max_write_registers(mut self, count: u16) -> Self {
        self.max_write_registers = count;
        self
    }

    /// Set cell byte order.
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Mark exception responses with bit 0x80 on the function code.
    pub fn with_exception_flag(mut self, enabled: bool) -> Self {
        self.exception_flag = enabled;
        self
    }

    /// Stop answering a function code.
    pub fn without_function(mut self, function: FunctionCode) -> Self {
        self.functions = self.functions.without(function);
        self
    }

    /// Silence interval for the configured baud rate, in timer ticks.
    pub fn silence_interval(&self) -> SlaveResult<u32> {
        timing::silence_interval(self.baud_rate)
    }

    /// Reject configurations the slave cannot run with.
    pub fn validate(&self) -> SlaveResult<()> {
        if !(MIN_SLAVE_ID..=MAX_SLAVE_ID).contains(&self.slave_id) {
            return Err(SlaveError::InvalidConfig {
                reason: "slave id must be within 1..=247",
            });
        }
        if self.baud_rate == 0 {
            return Err(SlaveError::InvalidConfig {
                reason: "baud rate must be non-zero",
            });
        }
        if self.max_read_registers == 0 || self.max_read_registers > MAX_READ_REGISTERS {
            return Err(SlaveError::InvalidConfig {
                reason: "max read registers must be within 1..=125",
            });
        }
        if self.max_write_registers == 0 || self.max_write_registers > MAX_WRITE_REGISTERS {
            return Err(SlaveError::InvalidConfig {
                reason: "max write registers must be within 1..=123",
            });
        }
        Ok(())
    }
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self {
            slave_id: DEFAULT_SLAVE_ID,
            baud_rate: DEFAULT_BAUD_RATE,
            memory_map: MemoryMap::default(),
            max_read_registers: DEFAULT_MAX_READ_REGISTERS,
            max_write_registers: DEFAULT_MAX_WRITE_REGISTERS,
            byte_order: ByteOrder::default(),
            exception_flag: false,
            functions: FunctionSet::all(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SlaveConfig::default();
        assert_eq!(config.slave_id, 1);
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.memory_map, MemoryMap::new(0x0000, 0x8000));
        assert_eq!(config.max_read_registers, DEFAULT_MAX_READ_REGISTERS);
        assert_eq!(config.max_write_registers, DEFAULT_MAX_WRITE_REGISTERS);
        assert_eq!(config.byte_order, ByteOrder::BigEndianSwap);
        assert!(!config.exception_flag);
        assert_eq!(config.functions, FunctionSet::all());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = SlaveConfig::new(5)
            .with_baud_rate(115200)
            .with_max_read_registers(60)
            .with_max_write_registers(40)
            .with_byte_order(ByteOrder::BigEndian)
            .with_exception_flag(true)
            .without_function(FunctionCode::WriteSingleRegister);

        assert_eq!(config.slave_id, 5);
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.max_read_registers, 60);
        assert_eq!(config.max_write_registers, 40);
        assert_eq!(config.byte_order, ByteOrder::BigEndian);
        assert!(config.exception_flag);
        assert!(!config.functions.contains(FunctionCode::WriteSingleRegister));
        assert!(config.functions.contains(FunctionCode::ReadHoldingRegisters));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(SlaveConfig::new(0).validate().is_err());
        assert!(SlaveConfig::new(248).validate().is_err());
        assert!(SlaveConfig::new(247).validate().is_ok());
        assert!(SlaveConfig::new(1).with_baud_rate(0).validate().is_err());
        assert!(SlaveConfig::new(1)
            .with_max_read_registers(126)
            .validate()
            .is_err());
        assert!(SlaveConfig::new(1)
            .with_max_write_registers(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_silence_interval() {
        assert_eq!(SlaveConfig::default().silence_interval(), Ok(80));
        assert!(SlaveConfig::default()
            .with_baud_rate(0)
            .silence_interval()
            .is_err());
    }
}
