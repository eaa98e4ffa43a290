//! # Host Serial Server
//!
//! Runs an [`RtuSlave`] over any async byte stream: a `tokio_serial`
//! port, a pseudo terminal, or an in-memory mock in tests.
//!
//! Frame boundaries come from read timeouts: when no byte arrives for the
//! silence interval and bytes are buffered, the frame is complete. The state
//! machine is then ticked until the response is on the line and the slave is
//! back to `Waiting`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use voltage_modbus_slave::{InMemoryStore, RtuSlaveServer, SlaveConfig};
//!
//! # #[cfg(feature = "rtu")]
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SlaveConfig::new(1).with_baud_rate(19200);
//!     let store = InMemoryStore::<128>::new(0x8000);
//!
//!     let mut server = RtuSlaveServer::open("/dev/ttyUSB0", config, store)?;
//!     server.run().await?;
//!     Ok(())
//! }
//! # #[cfg(not(feature = "rtu"))]
//! # fn main() {}
//! ```

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::constants::MAX_ADU_SIZE;
use crate::error::{IoKind, SlaveError, SlaveResult};
use crate::slave::{ProtocolState, RtuSlave, SerialPort};
use crate::store::RegisterStore;
use crate::timing::silence_duration;

#[cfg(feature = "rtu")]
use crate::config::SlaveConfig;

/// Format raw bytes as hex string for packet logging
fn format_hex_packet(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Serial collaborator that queues transmitted frames for the async writer.
///
/// The stream is full duplex, so direction switching is a no-op.
#[derive(Debug, Default)]
struct BufferedPort {
    pending: Vec<u8>,
}

impl SerialPort for BufferedPort {
    fn enable_receive(&mut self, _enabled: bool) {}

    fn enable_transmit(&mut self, _enabled: bool) {}

    fn transmit(&mut self, frame: &[u8]) {
        self.pending.extend_from_slice(frame);
    }
}

/// RTU slave bound to an async stream.
pub struct RtuSlaveServer<S, T> {
    slave: RtuSlave<S>,
    stream: T,
    port: BufferedPort,
    silence: Duration,
    packet_logging: bool,
}

impl<S, T> RtuSlaveServer<S, T>
where
    S: RegisterStore,
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Bind `slave` to `stream`, with the silence interval of the configured baud rate.
    pub fn new(slave: RtuSlave<S>, stream: T) -> SlaveResult<Self> {
        let silence = silence_duration(slave.config().baud_rate)?;
        Ok(Self {
            slave,
            stream,
            port: BufferedPort::default(),
            silence,
            packet_logging: false,
        })
    }

    /// Override the silence interval.
    ///
    /// USB serial adapters deliver bytes in bursts; a longer interval keeps
    /// them from splitting frames.
    pub fn with_silence(mut self, silence: Duration) -> Self {
        self.silence = silence;
        self
    }

    /// Log every frame in hex at `debug` level.
    pub fn with_packet_logging(mut self, enabled: bool) -> Self {
        self.packet_logging = enabled;
        self
    }

    /// Silence interval in use
    pub fn silence(&self) -> Duration {
        self.silence
    }

    /// The slave engine
    pub fn slave(&self) -> &RtuSlave<S> {
        &self.slave
    }

    /// Mutable slave engine (store access between frames)
    pub fn slave_mut(&mut self) -> &mut RtuSlave<S> {
        &mut self.slave
    }

    /// Take the slave and the stream back
    pub fn into_inner(self) -> (RtuSlave<S>, T) {
        (self.slave, self.stream)
    }

    /// Serve requests until the stream reaches EOF.
    ///
    /// A frame still buffered at EOF is answered before returning.
    ///
    /// # Errors
    /// `Io` when reading or writing the stream fails.
    pub async fn run(&mut self) -> SlaveResult<()> {
        info!(
            "RTU slave {} serving (silence {:?})",
            self.slave.config().slave_id,
            self.silence
        );

        while self.slave.state() != ProtocolState::Waiting {
            self.slave.tick(&mut self.port);
        }

        let mut buffer = [0u8; MAX_ADU_SIZE];
        loop {
            match timeout(self.silence, self.stream.read(&mut buffer)).await {
                Ok(Ok(0)) => {
                    debug!("Serial stream closed");
                    if !self.slave.inbound().is_empty() {
                        self.complete_frame().await?;
                    }
                    return Ok(());
                }
                Ok(Ok(n)) => {
                    for &byte in &buffer[..n] {
                        self.slave.on_byte_received(byte);
                    }
                }
                Ok(Err(e)) => {
                    warn!("Serial read failed: {}", e);
                    return Err(SlaveError::Io { kind: IoKind::Read });
                }
                Err(_) => {
                    if !self.slave.inbound().is_empty() {
                        self.complete_frame().await?;
                    }
                }
            }
        }
    }

    async fn complete_frame(&mut self) -> SlaveResult<()> {
        if self.packet_logging {
            debug!("[RTU] RX {}", format_hex_packet(self.slave.inbound()));
        }

        self.slave.on_silence_elapsed(&mut self.port);

        while self.slave.state() != ProtocolState::Waiting {
            self.slave.tick(&mut self.port);

            if self.port.pending.is_empty() {
                continue;
            }
            let frame = std::mem::take(&mut self.port.pending);
            if self.packet_logging {
                debug!("[RTU] TX {}", format_hex_packet(&frame));
            }
            self.write_frame(&frame).await?;
        }
        Ok(())
    }

    async fn write_frame(&mut self, frame: &[u8]) -> SlaveResult<()> {
        self.stream.write_all(frame).await.map_err(|e| {
            warn!("Serial write failed: {}", e);
            SlaveError::Io {
                kind: IoKind::Write,
            }
        })?;
        self.stream.flush().await.map_err(|e| {
            warn!("Serial flush failed: {}", e);
            SlaveError::Io {
                kind: IoKind::Write,
            }
        })
    }
}

#[cfg(feature = "rtu")]
impl<S: RegisterStore> RtuSlaveServer<S, tokio_serial::SerialStream> {
    /// Open `path` at the configured baud rate, 8N1.
    pub fn open(path: &str, config: SlaveConfig, store: S) -> SlaveResult<Self> {
        let slave = RtuSlave::new(config, store)?;

        let builder = tokio_serial::new(path, config.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None);

        let stream = tokio_serial::SerialStream::open(&builder).map_err(|e| {
            warn!("Failed to open serial port {}: {}", path, e);
            SlaveError::Io { kind: IoKind::Open }
        })?;

        info!("Opened {} at {} baud", path, config.baud_rate);
        Self::new(slave, stream)
    }
}
