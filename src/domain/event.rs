use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

pub const EVENT_QUEUE_CAPACITY: usize = 10;

/// Engine key codes shared by every input backend.
pub mod keys {
    pub const TAB: u8 = 9;
    pub const ENTER: u8 = 13;
    pub const ESCAPE: u8 = 27;
    pub const SPACE: u8 = 32;
    pub const COMMA: u8 = 44;
    pub const PERIOD: u8 = 46;
    pub const BACKSPACE: u8 = 127;
    pub const UP_ARROW: u8 = 128;
    pub const DOWN_ARROW: u8 = 129;
    pub const LEFT_ARROW: u8 = 130;
    pub const RIGHT_ARROW: u8 = 131;
    pub const ALT: u8 = 132;
    pub const CTRL: u8 = 133;
    pub const SHIFT: u8 = 134;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: u8,
    pub down: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerPosition {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug)]
struct Ring {
    slots: [KeyEvent; EVENT_QUEUE_CAPACITY],
    head: usize,
    tail: usize,
    len: usize,
}

/// Bounded key-event queue written by asynchronous producers and drained
/// by a single polling consumer. When full, the oldest unread event is
/// dropped so the last `EVENT_QUEUE_CAPACITY` events always win; drops are
/// counted but never reported to producers.
#[derive(Debug)]
pub struct EventQueue {
    ring: Mutex<Ring>,
    overflows: AtomicU64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            ring: Mutex::new(Ring {
                slots: [KeyEvent {
                    code: 0,
                    down: false,
                }; EVENT_QUEUE_CAPACITY],
                head: 0,
                tail: 0,
                len: 0,
            }),
            overflows: AtomicU64::new(0),
        }
    }

    /// Producer side. Never blocks beyond the cursor update itself.
    pub fn push(&self, code: u8, down: bool) {
        let mut ring = self.ring.lock().expect("event queue lock");
        if ring.len == EVENT_QUEUE_CAPACITY {
            ring.tail = (ring.tail + 1) % EVENT_QUEUE_CAPACITY;
            ring.len -= 1;
            self.overflows.fetch_add(1, Ordering::Relaxed);
        }
        let head = ring.head;
        ring.slots[head] = KeyEvent { code, down };
        ring.head = (head + 1) % EVENT_QUEUE_CAPACITY;
        ring.len += 1;
    }

    /// Consumer side. Returns `None` without touching the cursors when
    /// the queue is empty.
    pub fn pop(&self) -> Option<KeyEvent> {
        let mut ring = self.ring.lock().expect("event queue lock");
        if ring.len == 0 {
            return None;
        }
        let event = ring.slots[ring.tail];
        ring.tail = (ring.tail + 1) % EVENT_QUEUE_CAPACITY;
        ring.len -= 1;
        Some(event)
    }

    pub fn is_empty(&self) -> bool {
        self.ring.lock().expect("event queue lock").len == 0
    }

    /// Number of events silently dropped to make room for newer ones.
    pub fn overflow_count(&self) -> u64 {
        self.overflows.load(Ordering::Relaxed)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Backend-specific producer of key events and pointer readings.
pub trait InputSource {
    /// Gather pending backend events into the queue. Called once per
    /// frame by the main loop.
    fn poll(&mut self, queue: &EventQueue);

    /// Best-effort absolute pointer/touch position. `None` when the
    /// backend has no pointer hardware or no contact is detected.
    fn pointer_position(&self) -> Option<PointerPosition> {
        None
    }

    /// Whether the backend asked the application to stop (for example a
    /// window close request). Targets without that concept return false.
    fn quit_requested(&self) -> bool {
        false
    }
}

/// Input source for targets with no physical input.
#[derive(Debug, Default)]
pub struct NullInput;

impl InputSource for NullInput {
    fn poll(&mut self, _queue: &EventQueue) {}
}

#[cfg(test)]
mod tests {
    use super::{EVENT_QUEUE_CAPACITY, EventQueue, KeyEvent, keys};
    use proptest::prelude::*;

    #[test]
    fn empty_queue_reports_no_event() {
        let queue = EventQueue::new();

        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
        assert_eq!(queue.overflow_count(), 0);
    }

    #[test]
    fn pop_on_empty_does_not_disturb_later_events() {
        let queue = EventQueue::new();
        assert_eq!(queue.pop(), None);
        assert_eq!(queue.pop(), None);

        queue.push(keys::SPACE, true);
        assert_eq!(
            queue.pop(),
            Some(KeyEvent {
                code: keys::SPACE,
                down: true
            })
        );
    }

    #[test]
    fn delivers_in_fifo_order() {
        let queue = EventQueue::new();
        queue.push(keys::ENTER, true);
        queue.push(keys::ENTER, false);
        queue.push(keys::COMMA, true);

        assert_eq!(
            queue.pop(),
            Some(KeyEvent {
                code: keys::ENTER,
                down: true
            })
        );
        assert_eq!(
            queue.pop(),
            Some(KeyEvent {
                code: keys::ENTER,
                down: false
            })
        );
        assert_eq!(
            queue.pop(),
            Some(KeyEvent {
                code: keys::COMMA,
                down: true
            })
        );
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn overflow_drops_oldest_and_counts() {
        let queue = EventQueue::new();
        for code in 0..15u8 {
            queue.push(code, true);
        }

        for expected in 5..15u8 {
            assert_eq!(
                queue.pop(),
                Some(KeyEvent {
                    code: expected,
                    down: true
                })
            );
        }
        assert_eq!(queue.pop(), None);
        assert_eq!(queue.overflow_count(), 5);
    }

    proptest! {
        #[test]
        fn yields_last_capacity_events_in_order(codes in proptest::collection::vec(any::<u8>(), 0..40)) {
            let queue = EventQueue::new();
            for &code in &codes {
                queue.push(code, true);
            }

            let kept = codes.len().min(EVENT_QUEUE_CAPACITY);
            let expected = &codes[codes.len() - kept..];
            for &code in expected {
                prop_assert_eq!(queue.pop(), Some(KeyEvent { code, down: true }));
            }
            prop_assert_eq!(queue.pop(), None);
        }
    }
}
