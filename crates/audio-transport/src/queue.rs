//! Bounded queue of interleaved samples backing an output line.
//!
//! The engine pushes decoded PCM from its own thread; the device callback
//! drains without blocking. A full queue is what makes [`SampleQueue::push_blocking`]
//! the engine's principal suspension point: the push rate is gated by how fast
//! the device consumes audio.
//!
//! Shutdown is deterministic: `close()` wakes every waiter, pending pushes
//! return early, and the callback sees an empty queue from then on.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Thread-safe bounded queue of interleaved `f32` samples.
///
/// The `closed` flag lives under the same mutex as the sample buffer so a
/// close can never race a blocked push.
pub(crate) struct SampleQueue {
    inner: Mutex<QueueInner>,
    cv: Condvar,
    capacity: usize,
}

struct QueueInner {
    samples: VecDeque<f32>,
    closed: bool,
}

/// Queue capacity in **samples** for a `(rate, channels, seconds)` target.
///
/// Degenerate `buffer_seconds` values (non-finite or `<= 0`) fall back to a
/// safe default rather than producing a zero-capacity queue.
pub(crate) fn queue_capacity(rate_hz: u32, channels: usize, buffer_seconds: f32) -> usize {
    let secs = if buffer_seconds.is_finite() && buffer_seconds > 0.0 {
        buffer_seconds
    } else {
        2.0
    };

    let frames = (rate_hz as f32 * secs).ceil() as usize;
    frames.saturating_mul(channels).max(channels.max(1))
}

impl SampleQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                samples: VecDeque::new(),
                closed: false,
            }),
            cv: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    /// Push interleaved samples, blocking while the queue is full.
    ///
    /// Returns early (dropping the remainder) if the queue is closed while
    /// waiting. Callers push whole frames; the queue itself does not care.
    pub(crate) fn push_blocking(&self, samples: &[f32]) {
        let mut offset = 0;

        while offset < samples.len() {
            let mut guard = self.inner.lock().unwrap();

            while guard.samples.len() >= self.capacity && !guard.closed {
                guard = self.cv.wait(guard).unwrap();
            }
            if guard.closed {
                return;
            }

            while offset < samples.len() && guard.samples.len() < self.capacity {
                guard.samples.push_back(samples[offset]);
                offset += 1;
            }

            drop(guard);
            self.cv.notify_all();
        }
    }

    /// Pop up to `max_samples` without blocking.
    ///
    /// Returns an empty vec when nothing is buffered; the callback turns that
    /// into silence.
    pub(crate) fn pop(&self, max_samples: usize) -> Vec<f32> {
        let mut guard = self.inner.lock().unwrap();

        let take = guard.samples.len().min(max_samples);
        let mut out = Vec::with_capacity(take);
        for _ in 0..take {
            out.push(guard.samples.pop_front().unwrap_or(0.0));
        }

        drop(guard);
        if take > 0 {
            self.cv.notify_all();
        }
        out
    }

    /// Mark the queue closed and wake all waiters. Idempotent.
    pub(crate) fn close(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.closed = true;
        drop(guard);
        self.cv.notify_all();
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().unwrap().samples.len()
    }

    /// Block until the queue is fully drained, or `cancelled` reports true.
    ///
    /// Used on natural end of track: the engine has pushed the final frame and
    /// wants the callback to consume everything before the line is torn down.
    /// Returns `true` if the queue drained, `false` if cancelled first.
    pub(crate) fn wait_drained(&self, cancelled: impl Fn() -> bool) -> bool {
        let mut guard = self.inner.lock().unwrap();
        loop {
            if cancelled() {
                return false;
            }
            if guard.samples.is_empty() {
                return true;
            }
            let (next, _timeout) = self
                .cv
                .wait_timeout(guard, Duration::from_millis(50))
                .unwrap();
            guard = next;
        }
    }
}
