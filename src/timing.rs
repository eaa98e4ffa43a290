//! # Silence Timing
//!
//! Modbus RTU has no frame delimiter: a gap of at least 3.5 character times
//! (T3.5) ends a frame. The interval is
//!
//! ```text
//! ticks = 7 × 220000 / (2 × baud)
//! ```
//!
//! in integer arithmetic, with one tick = 50 µs. That equals 3.5 × 11 bit
//! times, so 9600 baud gives 80 ticks (4 ms).

use core::time::Duration;

use crate::constants::{T35_DENOMINATOR_FACTOR, T35_NUMERATOR, TIMER_TICK_US};
use crate::error::{SlaveError, SlaveResult};

/// Silence interval for `baud_rate`, in timer ticks.
///
/// ```rust
/// use voltage_modbus_slave::timing::silence_interval;
///
/// assert_eq!(silence_interval(9600).unwrap(), 80);
/// assert_eq!(silence_interval(19200).unwrap(), 40);
/// ```
pub fn silence_interval(baud_rate: u32) -> SlaveResult<u32> {
    match baud_rate.checked_mul(T35_DENOMINATOR_FACTOR) {
        Some(denominator) if denominator > 0 => Ok(T35_NUMERATOR / denominator),
        _ => Err(SlaveError::InvalidConfig {
            reason: "baud rate out of range for silence timing",
        }),
    }
}

/// Wall-clock length of `ticks` timer ticks.
#[inline]
pub fn ticks_to_duration(ticks: u32) -> Duration {
    Duration::from_micros(ticks as u64 * TIMER_TICK_US)
}

/// Silence interval for `baud_rate` as a [`Duration`].
pub fn silence_duration(baud_rate: u32) -> SlaveResult<Duration> {
    silence_interval(baud_rate).map(ticks_to_duration)
}

/// Silence timer collaborator.
///
/// The hardware timer counts the configured interval and raises
/// [`Event::SilenceElapsed`](crate::event::Event::SilenceElapsed) and periodic
/// [`Event::Tick`](crate::event::Event::Tick)s.
pub trait SilenceTimer {
    /// Arm the timer with an interval in 50 µs ticks.
    fn start(&mut self, interval_ticks: u32);
}

/// Software silence detector for firmware with a free-running tick.
///
/// Every received byte restarts the count; once the interval has passed with
/// at least one byte seen, [`advance`](Self::advance) reports the frame end
/// exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SilenceDetector {
    interval: u32,
    elapsed: u32,
    armed: bool,
}

impl SilenceDetector {
    /// Detector for an interval in ticks
    pub const fn new(interval_ticks: u32) -> Self {
        Self {
            interval: interval_ticks,
            elapsed: 0,
            armed: false,
        }
    }

    /// Detector for `baud_rate`
    pub fn for_baud_rate(baud_rate: u32) -> SlaveResult<Self> {
        silence_interval(baud_rate).map(Self::new)
    }

    /// Configured interval in ticks
    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// A byte arrived: restart the silence count.
    pub fn byte_received(&mut self) {
        self.elapsed = 0;
        self.armed = true;
    }

    /// Let `ticks` pass. Returns `true` when this completes a frame.
    pub fn advance(&mut self, ticks: u32) -> bool {
        if !self.armed {
            return false;
        }
        self.elapsed = self.elapsed.saturating_add(ticks);
        if self.elapsed >= self.interval {
            self.armed = false;
            self.elapsed = 0;
            return true;
        }
        false
    }

    /// Whether bytes were seen since the last reported frame end
    pub fn is_armed(&self) -> bool {
        self.armed
    }
}
