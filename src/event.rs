//! Interrupt events and the bounded queue that serialises them
//!
//! Interrupt handlers only push; the main loop pops and feeds each event to
//! [`RtuSlave::handle_event`](crate::RtuSlave::handle_event), one at a time.

use heapless::Deque;

use crate::error::{SlaveError, SlaveResult};

/// Default queue capacity: one full frame of bytes plus headroom for ticks
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 512;

/// Something the serial or timer collaborator observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// The UART received a byte
    ByteReceived(u8),
    /// T3.5 passed since the last received byte
    SilenceElapsed,
    /// Periodic timer tick driving the state machine
    Tick,
}

/// Fixed-capacity FIFO of events.
#[derive(Debug)]
pub struct EventQueue<const N: usize = DEFAULT_EVENT_QUEUE_CAPACITY> {
    events: Deque<Event, N>,
    dropped: u32,
}

impl<const N: usize> EventQueue<N> {
    /// Create an empty queue
    pub const fn new() -> Self {
        Self {
            events: Deque::new(),
            dropped: 0,
        }
    }

    /// Enqueue an event; a full queue drops it and reports `QueueFull`.
    pub fn push(&mut self, event: Event) -> SlaveResult<()> {
        self.events.push_back(event).map_err(|_| {
            self.dropped = self.dropped.saturating_add(1);
            SlaveError::QueueFull { capacity: N }
        })
    }

    /// Dequeue the oldest event
    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Enqueue every byte of `bytes` as `ByteReceived`
    pub fn push_bytes(&mut self, bytes: &[u8]) -> SlaveResult<()> {
        bytes
            .iter()
            .try_for_each(|&byte| self.push(Event::ByteReceived(byte)))
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Fixed capacity
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Events dropped because the queue was full
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Discard all queued events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl<const N: usize> Default for EventQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut queue = EventQueue::<8>::new();
        queue.push(Event::Tick).unwrap();
        queue.push_bytes(&[0x01, 0x03]).unwrap();
        queue.push(Event::SilenceElapsed).unwrap();

        assert_eq!(queue.len(), 4);
        assert_eq!(queue.pop(), Some(Event::Tick));
        assert_eq!(queue.pop(), Some(Event::ByteReceived(0x01)));
        assert_eq!(queue.pop(), Some(Event::ByteReceived(0x03)));
        assert_eq!(queue.pop(), Some(Event::SilenceElapsed));
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_full_queue_drops() {
        let mut queue = EventQueue::<2>::new();
        queue.push(Event::Tick).unwrap();
        queue.push(Event::Tick).unwrap();
        assert_eq!(
            queue.push(Event::SilenceElapsed),
            Err(SlaveError::QueueFull { capacity: 2 })
        );
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.len(), 2);

        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_default_capacity() {
        let queue: EventQueue = EventQueue::new();
        assert_eq!(queue.capacity(), DEFAULT_EVENT_QUEUE_CAPACITY);
    }
}
