//! Bounded byte queue between an interrupt-style producer and the poll loop
//!
//! The producer side is meant to live in a transport callback (a UART or USB
//! receive handler, a midir input thread); the consumer side is drained by
//! the single poll loop. Each side is a distinct, non-clonable handle so only
//! one context can write and only one can read.

use bytes::Bytes;
use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Default queue depth in bytes
pub const DEFAULT_CAPACITY: usize = 64;

struct Shared {
    ring: ArrayQueue<u8>,
    lost: AtomicU64,
    loss_indicator: AtomicBool,
}

impl Shared {
    fn record_loss(&self) {
        self.lost.fetch_add(1, Ordering::Relaxed);
        self.loss_indicator.fetch_xor(true, Ordering::Relaxed);
    }
}

/// Create a queue and split it into its two ends
///
/// A capacity of zero is raised to one.
pub fn byte_queue(capacity: usize) -> (QueueProducer, QueueConsumer) {
    let shared = Arc::new(Shared {
        ring: ArrayQueue::new(capacity.max(1)),
        lost: AtomicU64::new(0),
        loss_indicator: AtomicBool::new(false),
    });

    (
        QueueProducer {
            shared: shared.clone(),
        },
        QueueConsumer { shared },
    )
}

/// Writing end of a byte queue
pub struct QueueProducer {
    shared: Arc<Shared>,
}

impl QueueProducer {
    /// Append one byte
    ///
    /// Returns false when the queue is full; the byte is dropped and the loss
    /// counter incremented. Never blocks.
    pub fn enqueue(&self, byte: u8) -> bool {
        match self.shared.ring.push(byte) {
            Ok(()) => true,
            Err(_) => {
                self.shared.record_loss();
                false
            }
        }
    }

    /// Append a run of bytes, returning how many were accepted
    pub fn enqueue_slice(&self, bytes: &[u8]) -> usize {
        bytes.iter().filter(|&&b| self.enqueue(b)).count()
    }

    pub fn len(&self) -> usize {
        self.shared.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.shared.ring.capacity()
    }

    /// Total bytes dropped because the queue was full
    pub fn lost(&self) -> u64 {
        self.shared.lost.load(Ordering::Relaxed)
    }

    /// Flips on every dropped byte
    pub fn loss_indicator(&self) -> bool {
        self.shared.loss_indicator.load(Ordering::Relaxed)
    }
}

/// Reading end of a byte queue
pub struct QueueConsumer {
    shared: Arc<Shared>,
}

impl QueueConsumer {
    pub fn dequeue(&self) -> Option<u8> {
        self.shared.ring.pop()
    }

    /// Remove and return up to `max` of the oldest bytes, in order
    pub fn dequeue_batch(&self, max: usize) -> Bytes {
        let take = max.min(self.shared.ring.len());
        let mut out = Vec::with_capacity(take);
        while out.len() < max {
            match self.shared.ring.pop() {
                Some(byte) => out.push(byte),
                None => break,
            }
        }
        Bytes::from(out)
    }

    /// Drop everything currently queued, returning the number of bytes discarded
    pub fn clear(&self) -> usize {
        let mut discarded = 0;
        while self.shared.ring.pop().is_some() {
            discarded += 1;
        }
        discarded
    }

    pub fn len(&self) -> usize {
        self.shared.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.shared.ring.capacity()
    }

    pub fn lost(&self) -> u64 {
        self.shared.lost.load(Ordering::Relaxed)
    }

    pub fn loss_indicator(&self) -> bool {
        self.shared.loss_indicator.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let (tx, rx) = byte_queue(8);
        assert!(tx.enqueue(1));
        assert!(tx.enqueue(2));
        assert!(tx.enqueue(3));
        assert_eq!(rx.len(), 3);

        assert_eq!(&rx.dequeue_batch(2)[..], &[1, 2]);
        assert_eq!(&rx.dequeue_batch(10)[..], &[3]);
        assert!(rx.dequeue_batch(10).is_empty());
        assert!(rx.is_empty());
    }

    #[test]
    fn test_overflow_drops_newest() {
        let (tx, rx) = byte_queue(DEFAULT_CAPACITY);

        for i in 0..DEFAULT_CAPACITY {
            assert!(tx.enqueue(i as u8));
        }
        assert!(!tx.enqueue(0xAA));

        assert_eq!(rx.len(), DEFAULT_CAPACITY);
        assert_eq!(rx.lost(), 1);
        assert!(rx.loss_indicator());

        let drained = rx.dequeue_batch(DEFAULT_CAPACITY + 1);
        let expected: Vec<u8> = (0..DEFAULT_CAPACITY as u8).collect();
        assert_eq!(&drained[..], &expected[..]);
    }

    #[test]
    fn test_loss_indicator_toggles() {
        let (tx, rx) = byte_queue(1);
        assert!(tx.enqueue(1));
        assert!(!tx.enqueue(2));
        assert!(tx.loss_indicator());
        assert!(!tx.enqueue(3));
        assert!(!tx.loss_indicator());
        assert_eq!(rx.lost(), 2);
    }

    #[test]
    fn test_enqueue_slice_counts_accepted() {
        let (tx, rx) = byte_queue(4);
        assert_eq!(tx.enqueue_slice(&[1, 2, 3, 4, 5, 6]), 4);
        assert_eq!(tx.lost(), 2);
        assert_eq!(rx.clear(), 4);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let (tx, _rx) = byte_queue(0);
        assert_eq!(tx.capacity(), 1);
    }

    #[test]
    fn test_producer_thread_no_loss_or_duplication() {
        let (tx, rx) = byte_queue(16);
        let total = 10_000usize;

        let producer = thread::spawn(move || {
            let mut sent = 0usize;
            while sent < total {
                if tx.enqueue((sent % 128) as u8) {
                    sent += 1;
                } else {
                    thread::yield_now();
                }
            }
            tx
        });

        let mut received = Vec::with_capacity(total);
        while received.len() < total {
            let batch = rx.dequeue_batch(8);
            received.extend_from_slice(&batch);
            if batch.is_empty() {
                thread::yield_now();
            }
        }

        let tx = producer.join().unwrap();
        let expected: Vec<u8> = (0..total).map(|i| (i % 128) as u8).collect();
        assert_eq!(received, expected);
        assert_eq!(tx.len(), 0);
    }
}
