//! Bounded playback queue between the record source and the scheduler
//!
//! Single-producer single-consumer ring buffer. The producer half belongs
//! to the record source, the consumer half to the scheduler; each half can
//! be moved to its own thread.
//!
//! Design:
//! - Producer: fills the queue up to the high watermark, then stalls until
//!   the depth drains back to the low watermark (hysteresis)
//! - Consumer: non-blocking pop so the scheduler re-checks control flags
//!   on every iteration
//! - Dropping the producer marks the queue closed, letting the scheduler
//!   tell "empty for now" from "empty for good"

use crate::error::{Error, Result};
use crate::notification::Notification;
use ringbuf::{traits::*, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Default refill threshold
pub const DEFAULT_LOW_WATERMARK: usize = 500;

/// Default stall threshold (also the ring capacity)
pub const DEFAULT_HIGH_WATERMARK: usize = 1000;

/// Queue depth thresholds controlling producer suspend/resume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermarks {
    pub low: usize,
    pub high: usize,
}

impl Watermarks {
    pub fn new(low: usize, high: usize) -> Result<Self> {
        if high == 0 || low >= high {
            return Err(Error::Config(format!(
                "queue watermarks must satisfy low < high and high > 0 (low={}, high={})",
                low, high
            )));
        }
        Ok(Self { low, high })
    }
}

impl Default for Watermarks {
    fn default() -> Self {
        Self {
            low: DEFAULT_LOW_WATERMARK,
            high: DEFAULT_HIGH_WATERMARK,
        }
    }
}

/// Counters shared by both halves and any monitors
#[derive(Debug, Default)]
struct QueueCounters {
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    stalls: AtomicU64,
    peak_depth: AtomicUsize,
    closed: AtomicBool,
}

/// Playback queue prior to being split between the two workers
pub struct PlaybackQueue {
    buffer: HeapRb<Notification>,
    watermarks: Watermarks,
    counters: Arc<QueueCounters>,
}

impl PlaybackQueue {
    pub fn new(watermarks: Watermarks) -> Self {
        debug!(
            "Creating playback queue: low={}, high={}",
            watermarks.low, watermarks.high
        );

        Self {
            buffer: HeapRb::new(watermarks.high),
            watermarks,
            counters: Arc::new(QueueCounters::default()),
        }
    }

    /// Read-only view of the queue counters, usable after `split()`
    pub fn monitor(&self) -> QueueMonitor {
        QueueMonitor {
            counters: Arc::clone(&self.counters),
        }
    }

    /// Split into producer and consumer halves
    pub fn split(self) -> (QueueProducer, QueueConsumer) {
        let (prod, cons) = self.buffer.split();

        let producer = QueueProducer {
            producer: prod,
            watermarks: self.watermarks,
            stalled: false,
            counters: Arc::clone(&self.counters),
        };

        let consumer = QueueConsumer {
            consumer: cons,
            counters: self.counters,
        };

        (producer, consumer)
    }
}

/// Producer half (owned by the record source)
pub struct QueueProducer {
    producer: ringbuf::HeapProd<Notification>,
    watermarks: Watermarks,
    stalled: bool,
    counters: Arc<QueueCounters>,
}

impl QueueProducer {
    /// Push one notification.
    ///
    /// Returns the notification back if the ring is full. A producer that
    /// honors [`is_stalled`](Self::is_stalled) never sees this.
    pub fn try_push(
        &mut self,
        notification: Notification,
    ) -> std::result::Result<(), Notification> {
        self.producer.try_push(notification)?;

        self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        let depth = self.producer.occupied_len();
        self.counters.peak_depth.fetch_max(depth, Ordering::Relaxed);
        trace!("Enqueued notification, depth={}", depth);
        Ok(())
    }

    /// Whether the producer should hold off.
    ///
    /// Turns true once depth reaches the high watermark and stays true
    /// until depth has fallen to the low watermark.
    pub fn is_stalled(&mut self) -> bool {
        let depth = self.producer.occupied_len();

        if !self.stalled && depth >= self.watermarks.high {
            self.stalled = true;
            let stalls = self.counters.stalls.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("Playback queue full at depth {} (stall #{})", depth, stalls);
        } else if self.stalled && depth <= self.watermarks.low {
            self.stalled = false;
            debug!("Playback queue drained to depth {}, refilling", depth);
        }

        self.stalled
    }

    pub fn occupied_len(&self) -> usize {
        self.producer.occupied_len()
    }
}

impl Drop for QueueProducer {
    fn drop(&mut self) {
        self.counters.closed.store(true, Ordering::Release);
    }
}

/// Consumer half (owned by the scheduler)
pub struct QueueConsumer {
    consumer: ringbuf::HeapCons<Notification>,
    counters: Arc<QueueCounters>,
}

impl QueueConsumer {
    /// Pop the oldest notification, or `None` immediately if empty
    pub fn try_pop(&mut self) -> Option<Notification> {
        let notification = self.consumer.try_pop()?;
        self.counters.dequeued.fetch_add(1, Ordering::Relaxed);
        Some(notification)
    }

    /// The producer has gone away; whatever remains is all there will be
    pub fn is_closed(&self) -> bool {
        self.counters.closed.load(Ordering::Acquire)
    }

    pub fn occupied_len(&self) -> usize {
        self.consumer.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}

/// Shared read-only handle on the queue counters
#[derive(Debug, Clone)]
pub struct QueueMonitor {
    counters: Arc<QueueCounters>,
}

impl QueueMonitor {
    pub fn stats(&self) -> QueueStats {
        let enqueued = self.counters.enqueued.load(Ordering::Relaxed);
        let dequeued = self.counters.dequeued.load(Ordering::Relaxed);
        QueueStats {
            depth: enqueued.saturating_sub(dequeued) as usize,
            enqueued,
            dequeued,
            stalls: self.counters.stalls.load(Ordering::Relaxed),
            peak_depth: self.counters.peak_depth.load(Ordering::Relaxed),
            closed: self.counters.closed.load(Ordering::Relaxed),
        }
    }
}

/// Queue statistics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Notifications currently buffered
    pub depth: usize,
    /// Total notifications pushed
    pub enqueued: u64,
    /// Total notifications popped
    pub dequeued: u64,
    /// Times the producer hit the high watermark
    pub stalls: u64,
    /// Highest depth observed
    pub peak_depth: usize,
    /// Producer has finished
    pub closed: bool,
}
