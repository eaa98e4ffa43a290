//! Supported function codes and request decoding
//!
//! Request fields sit at fixed byte offsets per function code; nothing is
//! self-describing except the byte count of a write multiple request.

use tracing::trace;

use crate::constants::{
    CRC_LEN, FC_READ_HOLDING_REGISTERS, FC_READ_INPUT_REGISTERS, FC_WRITE_MULTIPLE_REGISTERS,
    FC_WRITE_SINGLE_REGISTER, WRITE_MULTIPLE_DATA_OFFSET,
};
use crate::error::{SlaveError, SlaveResult};

/// Length of a read or write single request without its CRC
const FIXED_REQUEST_LEN: usize = 6;

/// Function codes answered by this slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum FunctionCode {
    /// Read Holding Registers (FC03)
    ReadHoldingRegisters = FC_READ_HOLDING_REGISTERS,
    /// Read Input Registers (FC04)
    ReadInputRegisters = FC_READ_INPUT_REGISTERS,
    /// Write Single Register (FC06)
    WriteSingleRegister = FC_WRITE_SINGLE_REGISTER,
    /// Write Multiple Registers (FC16)
    WriteMultipleRegisters = FC_WRITE_MULTIPLE_REGISTERS,
}

impl FunctionCode {
    /// All supported codes, in wire order
    pub const ALL: [FunctionCode; 4] = [
        Self::ReadHoldingRegisters,
        Self::ReadInputRegisters,
        Self::WriteSingleRegister,
        Self::WriteMultipleRegisters,
    ];

    /// Wire value
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether the function reads registers
    #[inline]
    pub fn is_read(self) -> bool {
        matches!(self, Self::ReadHoldingRegisters | Self::ReadInputRegisters)
    }

    /// Get human-readable function code description
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadHoldingRegisters => "Read Holding Registers",
            Self::ReadInputRegisters => "Read Input Registers",
            Self::WriteSingleRegister => "Write Single Register",
            Self::WriteMultipleRegisters => "Write Multiple Registers",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Self::ReadHoldingRegisters => 0b0001,
            Self::ReadInputRegisters => 0b0010,
            Self::WriteSingleRegister => 0b0100,
            Self::WriteMultipleRegisters => 0b1000,
        }
    }
}

impl TryFrom<u8> for FunctionCode {
    type Error = SlaveError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            FC_READ_HOLDING_REGISTERS => Ok(Self::ReadHoldingRegisters),
            FC_READ_INPUT_REGISTERS => Ok(Self::ReadInputRegisters),
            FC_WRITE_SINGLE_REGISTER => Ok(Self::WriteSingleRegister),
            FC_WRITE_MULTIPLE_REGISTERS => Ok(Self::WriteMultipleRegisters),
            _ => Err(SlaveError::IllegalFunction { code }),
        }
    }
}

impl core::fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "FC{:02X} ({})", self.code(), self.as_str())
    }
}

/// Set of enabled function codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionSet(u8);

impl FunctionSet {
    /// Every supported function enabled
    pub const fn all() -> Self {
        Self(0b1111)
    }

    /// Nothing enabled
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Enable a function
    pub fn with(self, function: FunctionCode) -> Self {
        Self(self.0 | function.bit())
    }

    /// Disable a function
    pub fn without(self, function: FunctionCode) -> Self {
        Self(self.0 & !function.bit())
    }

    /// Check if a function is enabled
    pub fn contains(&self, function: FunctionCode) -> bool {
        self.0 & function.bit() != 0
    }

    /// Check if nothing is enabled
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl Default for FunctionSet {
    fn default() -> Self {
        Self::all()
    }
}

/// A decoded request.
///
/// Decoded from the frame body (everything before the CRC). `values` borrows
/// the raw big-endian register bytes of a write multiple request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'a> {
    /// FC03 / FC04
    ReadRegisters {
        function: FunctionCode,
        address: u16,
        quantity: u16,
    },
    /// FC06
    WriteSingleRegister { address: u16, value: u16 },
    /// FC16
    WriteMultipleRegisters {
        address: u16,
        quantity: u16,
        values: &'a [u8],
    },
}

impl<'a> Request<'a> {
    /// Decode a request from a frame body.
    ///
    /// `body` is `[slave][fc][fields...]` without the trailing CRC. Quantity
    /// limits are checked against `max_read` / `max_write`.
    ///
    /// # Errors
    /// - `FrameTooShort` when the body cannot hold the fixed fields
    /// - `IllegalFunction` for unsupported codes
    /// - `InvalidQuantity` / `ByteCountMismatch` for inconsistent fields
    pub fn parse(body: &'a [u8], max_read: u16, max_write: u16) -> SlaveResult<Self> {
        if body.len() < 2 {
            return Err(SlaveError::FrameTooShort {
                len: body.len() + CRC_LEN,
                min: 2 + CRC_LEN,
            });
        }

        let function = FunctionCode::try_from(body[1])?;
        trace!("Decoding {} request, {} bytes", function, body.len());

        match function {
            FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => {
                check_fixed_len(body)?;
                let address = be_u16(body, 2);
                let quantity = be_u16(body, 4);
                check_quantity(quantity, max_read)?;
                Ok(Self::ReadRegisters {
                    function,
                    address,
                    quantity,
                })
            }
            FunctionCode::WriteSingleRegister => {
                check_fixed_len(body)?;
                Ok(Self::WriteSingleRegister {
                    address: be_u16(body, 2),
                    value: be_u16(body, 4),
                })
            }
            FunctionCode::WriteMultipleRegisters => {
                if body.len() < WRITE_MULTIPLE_DATA_OFFSET {
                    return Err(SlaveError::FrameTooShort {
                        len: body.len() + CRC_LEN,
                        min: WRITE_MULTIPLE_DATA_OFFSET + CRC_LEN,
                    });
                }
                let address = be_u16(body, 2);
                let quantity = be_u16(body, 4);
                check_quantity(quantity, max_write)?;

                let declared = body[6] as usize;
                let expected = quantity as usize * 2;
                if declared != expected {
                    return Err(SlaveError::ByteCountMismatch { declared, expected });
                }
                let values = &body[WRITE_MULTIPLE_DATA_OFFSET..];
                if values.len() != declared {
                    return Err(SlaveError::ByteCountMismatch {
                        declared,
                        expected: values.len(),
                    });
                }

                Ok(Self::WriteMultipleRegisters {
                    address,
                    quantity,
                    values,
                })
            }
        }
    }

    /// Function code of the request
    pub fn function(&self) -> FunctionCode {
        match self {
            Self::ReadRegisters { function, .. } => *function,
            Self::WriteSingleRegister { .. } => FunctionCode::WriteSingleRegister,
            Self::WriteMultipleRegisters { .. } => FunctionCode::WriteMultipleRegisters,
        }
    }

    /// Starting wire address
    pub fn address(&self) -> u16 {
        match self {
            Self::ReadRegisters { address, .. }
            | Self::WriteSingleRegister { address, .. }
            | Self::WriteMultipleRegisters { address, .. } => *address,
        }
    }
}

#[inline]
fn be_u16(body: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([body[offset], body[offset + 1]])
}

fn check_fixed_len(body: &[u8]) -> SlaveResult<()> {
    if body.len() < FIXED_REQUEST_LEN {
        return Err(SlaveError::FrameTooShort {
            len: body.len() + CRC_LEN,
            min: FIXED_REQUEST_LEN + CRC_LEN,
        });
    }
    if body.len() > FIXED_REQUEST_LEN {
        return Err(SlaveError::ByteCountMismatch {
            declared: body.len(),
            expected: FIXED_REQUEST_LEN,
        });
    }
    Ok(())
}

fn check_quantity(quantity: u16, max: u16) -> SlaveResult<()> {
    if quantity == 0 || quantity > max {
        return Err(SlaveError::InvalidQuantity { quantity, max });
    }
    Ok(())
}
