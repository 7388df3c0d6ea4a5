//! Event mailbox between the notifier thread and the processing loop.
//!
//! The watcher thread only ever calls [`Mailbox::push`]; the processing
//! loop calls [`Mailbox::drain`] once at the start of each tick. The
//! queue is unbounded — events are small and infrequent (one per file
//! save), so backpressure would buy nothing.

use parking_lot::Mutex;
use std::collections::VecDeque;

/// Unbounded FIFO queue of pending events.
///
/// `push` ordering is preserved in `drain` order. Draining atomically
/// clears the queue, so each event is observed by exactly one tick.
///
/// # Example
///
/// ```
/// use weft_store::Mailbox;
///
/// let mailbox: Mailbox<&str> = Mailbox::new();
/// mailbox.push("first");
/// mailbox.push("second");
///
/// assert_eq!(mailbox.drain(), vec!["first", "second"]);
/// assert!(mailbox.drain().is_empty());
/// ```
pub struct Mailbox<E> {
    queue: Mutex<VecDeque<E>>,
}

impl<E> Mailbox<E> {
    /// Creates an empty mailbox.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Appends an event. Non-blocking, never fails.
    pub fn push(&self, event: E) {
        self.queue.lock().push_back(event);
    }

    /// Removes and returns all pending events in push order,
    /// atomically clearing the queue.
    #[must_use]
    pub fn drain(&self) -> Vec<E> {
        self.queue.lock().drain(..).collect()
    }

    /// Returns whether any event is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl<E> Default for Mailbox<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn drain_preserves_fifo_order() {
        let mailbox = Mailbox::new();
        for i in 0..5 {
            mailbox.push(i);
        }
        assert_eq!(mailbox.drain(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn drain_clears_atomically() {
        let mailbox = Mailbox::new();
        mailbox.push("a");
        assert_eq!(mailbox.drain(), vec!["a"]);
        assert!(mailbox.is_empty());
        assert!(mailbox.drain().is_empty());
    }

    #[test]
    fn push_from_second_thread() {
        let mailbox = Arc::new(Mailbox::new());
        let producer = Arc::clone(&mailbox);

        let handle = std::thread::spawn(move || {
            for i in 0..100 {
                producer.push(i);
            }
        });
        handle.join().expect("producer thread must not panic");

        let drained = mailbox.drain();
        assert_eq!(drained.len(), 100);
        // Single producer: order preserved end to end.
        assert!(drained.windows(2).all(|w| w[0] < w[1]));
    }
}
