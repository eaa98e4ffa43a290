//! # Voltage Modbus Slave - Modbus RTU Slave Core
//!
//! **Version:** 0.1.0
//! **License:** MIT
//!
//! The slave side of the Modbus RTU serial protocol for embedded
//! controllers: frames the incoming byte stream by inter-character silence,
//! validates and dispatches requests, reads and writes a 32-bit register store
//! and emits CRC-protected response frames.
//!
//! ## Features
//!
//! - **Allocation-Free Core**: fixed 256-byte frame buffers, `no_std` capable
//! - **Pluggable Hardware**: serial, timer and register store behind traits
//! - **Interrupt Friendly**: events are queued and handled one at a time
//! - **Host Server**: optional async server over any Tokio stream (`std`)
//! - **Built-in Monitoring**: frame, exception and error counters
//!
//! ## Supported Function Codes
//!
//! | Code | Function | Slave |
//! |------|----------|-------|
//! | 0x03 | Read Holding Registers | ✅ |
//! | 0x04 | Read Input Registers | ✅ |
//! | 0x06 | Write Single Register | ✅ |
//! | 0x10 | Write Multiple Registers | ✅ |
//!
//! Any other code is answered with an Illegal Function exception.
//!
//! ## Register Layout
//!
//! Each 32-bit storage cell carries two consecutive wire registers. With the
//! default [`ByteOrder::BigEndianSwap`] the first register of a pair is the
//! low half of the cell.
//!
//! ## Quick Start
//!
//! ```rust
//! use voltage_modbus_slave::{
//!     Event, EventQueue, InMemoryStore, RequestBuilder, RtuSlave, SerialPort, SlaveConfig,
//! };
//!
//! struct Uart(Vec<u8>);
//!
//! impl SerialPort for Uart {
//!     fn enable_receive(&mut self, _enabled: bool) {}
//!     fn enable_transmit(&mut self, _enabled: bool) {}
//!     fn transmit(&mut self, frame: &[u8]) {
//!         self.0.extend_from_slice(frame);
//!     }
//! }
//!
//! let mut slave = RtuSlave::new(SlaveConfig::new(1), InMemoryStore::<64>::new(0x8000))?;
//! let mut uart = Uart(Vec::new());
//! let mut events: EventQueue = EventQueue::new();
//!
//! // Interrupt handlers push, the main loop drains
//! let request = RequestBuilder::build_read_holding_registers(1, 0x0000, 2)?;
//! events.push(Event::Tick)?;
//! events.push_bytes(request.as_slice())?;
//! events.push(Event::SilenceElapsed)?;
//! events.push(Event::Tick)?;
//! events.push(Event::Tick)?;
//! slave.process_events(&mut events, &mut uart);
//!
//! assert_eq!(uart.0.len(), 9);
//! # Ok::<(), voltage_modbus_slave::SlaveError>(())
//! ```

#![cfg_attr(not(any(feature = "std", test)), no_std)]

// ============================================================================
// Core modules
// ============================================================================

/// Core error types and result handling
pub mod error;

/// Modbus RTU protocol constants
pub mod constants;

/// CRC16 (Modbus) checksum
pub mod checksum;

/// Byte order handling for 32-bit register cells
pub mod bytes;

/// Stack-allocated frame buffers and request encoding
pub mod frame;

/// Supported function codes and request decoding
pub mod function;

/// Register store abstraction
pub mod store;

/// Slave configuration
pub mod config;

/// Silence (T3.5) timing
pub mod timing;

/// Interrupt events and their queue
pub mod event;

/// Request dispatcher and function handlers
pub mod handler;

/// Framing state machine and slave engine
pub mod slave;

/// Async host server over a serial stream
#[cfg(feature = "std")]
pub mod server;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Async runtime (users can use voltage_modbus_slave::tokio) ===
#[cfg(feature = "std")]
pub use tokio;

// === Error handling ===
pub use error::{Exception, SlaveError, SlaveResult};

// === Core types ===
pub use bytes::ByteOrder;
pub use config::SlaveConfig;
pub use frame::{FrameBuffer, RequestBuilder};
pub use function::{FunctionCode, FunctionSet, Request};
pub use handler::{DropReason, Outcome};
pub use store::{InMemoryStore, MemoryMap, MmioStore, RegisterStore};

// === Engine ===
pub use event::{Event, EventQueue};
pub use slave::{ProtocolState, RtuSlave, SerialPort, SlaveStats};
pub use timing::{SilenceDetector, SilenceTimer};

// === Host server ===
#[cfg(feature = "std")]
pub use server::RtuSlaveServer;

// === Protocol limits (commonly needed constants) ===
pub use constants::{MAX_ADU_SIZE, MAX_READ_REGISTERS, MAX_WRITE_REGISTERS};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
#[cfg(feature = "std")]
pub fn info() -> String {
    format!(
        "Voltage Modbus Slave v{} - Modbus RTU slave core",
        VERSION
    )
}
