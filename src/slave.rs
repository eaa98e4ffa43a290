//! # RTU Slave Engine
//!
//! Owns the configuration, the register store, both frame buffers and the
//! protocol state. Interrupt sources call in through [`RtuSlave::handle_event`]
//! (or the individual `on_*` methods); the timer tick drives [`RtuSlave::tick`].
//!
//! ## State Cycle
//!
//! | From | Actions | To |
//! |------|---------|----|
//! | `Silence` | enable receive, disable transmit | `Waiting` |
//! | `Waiting` | none | `Waiting` |
//! | `Reading` | reset both cursors, disable receive, enable transmit | `SendPending` |
//! | `SendPending` | transmit response (if any), disable both | `Silence` |
//!
//! `Waiting` moves to `Reading` when the silence timer confirms the end of a
//! frame with bytes buffered; the response is built at that point.
//!
//! ## Example
//!
//! ```rust
//! use voltage_modbus_slave::{
//!     InMemoryStore, ProtocolState, RequestBuilder, RtuSlave, SerialPort, SlaveConfig,
//! };
//!
//! #[derive(Default)]
//! struct Uart {
//!     sent: Vec<u8>,
//! }
//!
//! impl SerialPort for Uart {
//!     fn enable_receive(&mut self, _enabled: bool) {}
//!     fn enable_transmit(&mut self, _enabled: bool) {}
//!     fn transmit(&mut self, frame: &[u8]) {
//!         self.sent.extend_from_slice(frame);
//!     }
//! }
//!
//! let store = InMemoryStore::<16>::new(0x8000);
//! let mut slave = RtuSlave::new(SlaveConfig::new(1), store).unwrap();
//! let mut uart = Uart::default();
//!
//! slave.tick(&mut uart);
//! assert_eq!(slave.state(), ProtocolState::Waiting);
//!
//! let request = RequestBuilder::build_write_single_register(1, 0, 0x1234).unwrap();
//! for &byte in request.as_slice() {
//!     slave.on_byte_received(byte);
//! }
//! slave.on_silence_elapsed(&mut uart);
//! slave.tick(&mut uart);
//! slave.tick(&mut uart);
//!
//! assert_eq!(uart.sent, request.as_slice());
//! ```

use tracing::{debug, trace, warn};

use crate::config::SlaveConfig;
use crate::error::SlaveResult;
use crate::event::{Event, EventQueue};
use crate::frame::FrameBuffer;
use crate::function::FunctionCode;
use crate::handler::{process_request, DropReason, Outcome};
use crate::store::RegisterStore;
use crate::timing::SilenceTimer;

/// Serial line collaborator (UART driver).
pub trait SerialPort {
    /// Enable or disable the receiver
    fn enable_receive(&mut self, enabled: bool);

    /// Enable or disable the transmitter (and the RS-485 driver, if any)
    fn enable_transmit(&mut self, enabled: bool);

    /// Put a complete frame on the line
    fn transmit(&mut self, frame: &[u8]);
}

impl<P: SerialPort + ?Sized> SerialPort for &mut P {
    fn enable_receive(&mut self, enabled: bool) {
        (**self).enable_receive(enabled)
    }

    fn enable_transmit(&mut self, enabled: bool) {
        (**self).enable_transmit(enabled)
    }

    fn transmit(&mut self, frame: &[u8]) {
        (**self).transmit(frame)
    }
}

/// Framing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolState {
    /// Line quiet; the receiver comes up on the next tick
    #[default]
    Silence,
    /// Accepting request bytes
    Waiting,
    /// Response built, waiting to switch the line around
    Reading,
    /// Transmitter enabled, response goes out on the next tick
    SendPending,
}

impl ProtocolState {
    /// Get state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Silence => "Silence",
            Self::Waiting => "Waiting",
            Self::Reading => "Reading",
            Self::SendPending => "SendPending",
        }
    }
}

impl core::fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Slave counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlaveStats {
    /// Frames terminated by silence
    pub frames_received: u32,
    /// Frames put on the line (normal and exception)
    pub responses_sent: u32,
    /// Exception responses built
    pub exceptions_sent: u32,
    /// Frames dropped for a bad CRC
    pub crc_errors: u32,
    /// Frames for another slave
    pub address_mismatches: u32,
    /// Frames too short to decode
    pub short_frames: u32,
    /// Frames longer than the inbound buffer
    pub overruns: u32,
    /// Read requests answered
    pub register_reads: u32,
    /// Write requests answered
    pub register_writes: u32,
}

/// Modbus RTU slave.
pub struct RtuSlave<S> {
    config: SlaveConfig,
    store: S,
    rx: FrameBuffer,
    tx: FrameBuffer,
    response_len: usize,
    state: ProtocolState,
    rx_overrun: bool,
    stats: SlaveStats,
}

impl<S: RegisterStore> RtuSlave<S> {
    /// Create a slave in the `Silence` state.
    ///
    /// # Errors
    /// `InvalidConfig` when the configuration does not validate.
    pub fn new(config: SlaveConfig, store: S) -> SlaveResult<Self> {
        config.validate()?;
        debug!(
            "RTU slave {} ready: {} baud, {}",
            config.slave_id, config.baud_rate, config.byte_order
        );
        Ok(Self {
            config,
            store,
            rx: FrameBuffer::new(),
            tx: FrameBuffer::new(),
            response_len: 0,
            state: ProtocolState::Silence,
            rx_overrun: false,
            stats: SlaveStats::default(),
        })
    }

    /// Quiesce the line and arm the silence timer.
    pub fn start<P, T>(&mut self, serial: &mut P, timer: &mut T) -> SlaveResult<()>
    where
        P: SerialPort + ?Sized,
        T: SilenceTimer + ?Sized,
    {
        let interval = self.config.silence_interval()?;
        serial.enable_receive(false);
        serial.enable_transmit(false);
        timer.start(interval);
        self.state = ProtocolState::Silence;
        debug!("Silence timer armed: {} ticks", interval);
        Ok(())
    }

    /// Current framing state
    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// Configuration
    pub fn config(&self) -> &SlaveConfig {
        &self.config
    }

    /// Register store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable register store (for the application between cycles)
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Give back the register store
    pub fn into_store(self) -> S {
        self.store
    }

    /// Counters
    pub fn stats(&self) -> SlaveStats {
        self.stats
    }

    /// Zero all counters
    pub fn reset_stats(&mut self) {
        self.stats = SlaveStats::default();
    }

    /// Bytes received so far in the current frame
    pub fn inbound(&self) -> &[u8] {
        self.rx.as_slice()
    }

    /// Outbound buffer
    pub fn outbound(&self) -> &FrameBuffer {
        &self.tx
    }

    /// Length of the pending response (0 = nothing to send)
    pub fn response_len(&self) -> usize {
        self.response_len
    }

    /// The pending response bytes
    pub fn response(&self) -> &[u8] {
        self.tx.window(self.response_len)
    }

    /// Advance the state machine by one timer tick.
    pub fn tick<P: SerialPort + ?Sized>(&mut self, serial: &mut P) {
        let next = match self.state {
            ProtocolState::Silence => {
                serial.enable_receive(true);
                serial.enable_transmit(false);
                ProtocolState::Waiting
            }
            ProtocolState::Waiting => return,
            ProtocolState::Reading => {
                self.rx.reset_cursor();
                self.tx.reset_cursor();
                serial.enable_receive(false);
                serial.enable_transmit(true);
                ProtocolState::SendPending
            }
            ProtocolState::SendPending => {
                if self.response_len > 0 {
                    serial.transmit(self.tx.window(self.response_len));
                    self.stats.responses_sent += 1;
                    trace!("Transmitted {} bytes", self.response_len);
                }
                self.response_len = 0;
                serial.enable_receive(false);
                serial.enable_transmit(false);
                ProtocolState::Silence
            }
        };
        trace!("State {} -> {}", self.state, next);
        self.state = next;
    }

    /// A byte arrived. Ignored unless the slave is `Waiting`.
    pub fn on_byte_received(&mut self, byte: u8) {
        if self.state != ProtocolState::Waiting {
            trace!("Byte 0x{:02X} ignored in state {}", byte, self.state);
            return;
        }
        if self.rx.push(byte).is_err() && !self.rx_overrun {
            warn!(
                "Inbound frame exceeds {} bytes, dropping it",
                self.rx.capacity()
            );
            self.rx_overrun = true;
            self.stats.overruns += 1;
        }
    }

    /// The silence timer expired. Builds the response if a frame is buffered.
    pub fn on_silence_elapsed<P: SerialPort + ?Sized>(&mut self, serial: &mut P) {
        if self.state == ProtocolState::Waiting && !self.rx.is_empty() {
            self.build_response(serial);
        }
    }

    /// Handle the buffered frame and move to `Reading`.
    pub fn build_response<P: SerialPort + ?Sized>(&mut self, serial: &mut P) -> Outcome {
        serial.enable_receive(false);
        serial.enable_transmit(true);
        self.stats.frames_received += 1;

        let outcome = if self.rx_overrun {
            self.tx.clear();
            Outcome::Dropped(DropReason::Overflow)
        } else {
            process_request(&self.config, &mut self.store, self.rx.as_slice(), &mut self.tx)
        };

        self.record(&outcome);
        self.response_len = outcome.len();
        self.rx_overrun = false;

        trace!("State {} -> {}", self.state, ProtocolState::Reading);
        self.state = ProtocolState::Reading;
        outcome
    }

    /// Feed one event to the engine.
    pub fn handle_event<P: SerialPort + ?Sized>(&mut self, event: Event, serial: &mut P) {
        match event {
            Event::ByteReceived(byte) => self.on_byte_received(byte),
            Event::SilenceElapsed => self.on_silence_elapsed(serial),
            Event::Tick => self.tick(serial),
        }
    }

    /// Drain `queue`, returning the number of events handled.
    pub fn process_events<P, const N: usize>(
        &mut self,
        queue: &mut EventQueue<N>,
        serial: &mut P,
    ) -> usize
    where
        P: SerialPort + ?Sized,
    {
        let mut handled = 0;
        while let Some(event) = queue.pop() {
            self.handle_event(event, serial);
            handled += 1;
        }
        handled
    }

    fn record(&mut self, outcome: &Outcome) {
        let stats = &mut self.stats;
        match outcome {
            Outcome::Dropped(DropReason::TooShort) => stats.short_frames += 1,
            Outcome::Dropped(DropReason::CrcMismatch) => stats.crc_errors += 1,
            Outcome::Dropped(DropReason::NotForUs) => stats.address_mismatches += 1,
            // Inbound overruns are counted as they happen
            Outcome::Dropped(DropReason::Overflow) => {}
            Outcome::Exception { .. } => stats.exceptions_sent += 1,
            Outcome::Response { .. } => {
                let is_read = self
                    .rx
                    .function_code()
                    .and_then(|fc| FunctionCode::try_from(fc).ok())
                    .is_some_and(FunctionCode::is_read);
                if is_read {
                    stats.register_reads += 1;
                } else {
                    stats.register_writes += 1;
                }
            }
        }
    }
}
