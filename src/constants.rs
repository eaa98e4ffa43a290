//! Modbus RTU protocol constants
//!
//! Frame sizes and register limits follow Modbus over Serial Line: a frame
//! is at most 256 bytes and every request and response has to fit in one.
//! Silence timing is counted in 50 µs timer ticks.

// ============================================================================
// Frame Size Constants
// ============================================================================

/// Maximum RTU ADU (Application Data Unit) size
///
/// Slave Address (1) + PDU (253) + CRC (2) = 256 bytes
pub const MAX_ADU_SIZE: usize = 256;

/// Maximum PDU size: everything between the slave address and the CRC
pub const MAX_PDU_SIZE: usize = 253;

/// Length of the trailing CRC field
pub const CRC_LEN: usize = 2;

/// Smallest frame that can carry anything: address + function code + CRC
pub const MIN_FRAME_LEN: usize = 4;

/// Header of a read response: address + function code + byte count
pub const READ_RESPONSE_HEADER_LEN: usize = 3;

/// Offset of the first register value in a write multiple request
///
/// Address(1) + FC(1) + Start(2) + Quantity(2) + Byte Count(1) = 7
pub const WRITE_MULTIPLE_DATA_OFFSET: usize = 7;

/// Write single/multiple responses are always 8 bytes
///
/// Address(1) + FC(1) + Address(2) + Value/Quantity(2) + CRC(2)
pub const WRITE_RESPONSE_LEN: usize = 8;

/// Exception responses are always 5 bytes
///
/// Address(1) + FC(1) + Exception Code(1) + CRC(2)
pub const EXCEPTION_RESPONSE_LEN: usize = 5;

// ============================================================================
// Register Operation Limits
// ============================================================================

/// Maximum registers in one FC03/FC04 request
///
/// The response body is FC(1) + Byte Count(1) + 2N and has to fit the
/// 253-byte PDU, so N ≤ 125.
pub const MAX_READ_REGISTERS: u16 = 125;

/// Maximum registers in one FC16 request
///
/// The request body is FC(1) + Start(2) + Quantity(2) + Byte Count(1) + 2N,
/// so N ≤ 123.
pub const MAX_WRITE_REGISTERS: u16 = 123;

/// Number of 16-bit wire registers held by one 32-bit storage cell
pub const WORDS_PER_CELL: u32 = 2;

// ============================================================================
// Register Store Layout
// ============================================================================

/// Base offset of the coil / discrete input space
pub const DEFAULT_COIL_BASE: u32 = 0x0000;

/// Base offset of the holding / input register space
pub const DEFAULT_REGISTER_BASE: u32 = 0x8000;

// ============================================================================
// Timing Constants
// ============================================================================

/// Numerator factor of the T3.5 silence formula: 7 × 220000 / (2 × baud)
pub const T35_NUMERATOR: u32 = 7 * 220_000;

/// Denominator factor of the T3.5 silence formula
pub const T35_DENOMINATOR_FACTOR: u32 = 2;

/// Length of one silence timer tick in microseconds
pub const TIMER_TICK_US: u64 = 50;

/// Default serial line speed
pub const DEFAULT_BAUD_RATE: u32 = 9600;

// ============================================================================
// Slave Addressing
// ============================================================================

/// Broadcast address (never answered)
pub const BROADCAST_ADDRESS: u8 = 0;

/// Lowest assignable slave address
pub const MIN_SLAVE_ID: u8 = 1;

/// Highest assignable slave address
pub const MAX_SLAVE_ID: u8 = 247;

/// Default slave address
pub const DEFAULT_SLAVE_ID: u8 = 1;

// ============================================================================
// Modbus Function Codes
// ============================================================================

/// Read Coils (FC01)
pub const FC_READ_COILS: u8 = 0x01;

/// Read Discrete Inputs (FC02)
pub const FC_READ_DISCRETE_INPUTS: u8 = 0x02;

/// Read Holding Registers (FC03)
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Read Input Registers (FC04)
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;

/// Write Single Coil (FC05)
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;

/// Write Single Register (FC06)
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// Write Multiple Coils (FC15)
pub const FC_WRITE_MULTIPLE_COILS: u8 = 0x0F;

/// Write Multiple Registers (FC16)
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

/// Bit set on the function code of a standard exception response
pub const EXCEPTION_FLAG: u8 = 0x80;

// ============================================================================
// Modbus Exception Codes
// ============================================================================

/// Illegal Function
pub const EXCEPTION_ILLEGAL_FUNCTION: u8 = 0x01;

/// Illegal Data Address
pub const EXCEPTION_ILLEGAL_DATA_ADDRESS: u8 = 0x02;

/// Illegal Data Value
pub const EXCEPTION_ILLEGAL_DATA_VALUE: u8 = 0x03;

/// Server Device Failure
pub const EXCEPTION_SERVER_DEVICE_FAILURE: u8 = 0x04;
