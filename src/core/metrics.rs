//! Counters for logger and transport health
//!
//! `LoggerMetrics` tracks the façade (records emitted, filtered, transport
//! failures). `DeliveryMetrics` tracks one background transport: what it
//! accepted, what the far side confirmed, and what it lost.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for the logger façade
///
/// # Example
///
/// ```
/// use rust_sink_logger::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
/// metrics.record_emitted();
/// metrics.record_transport_failure();
///
/// assert_eq!(metrics.emitted(), 1);
/// assert_eq!(metrics.transport_failures(), 1);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Records that passed the level filter and were fanned out
    emitted: AtomicU64,

    /// Records below the logger's minimum level
    filtered: AtomicU64,

    /// Individual transport calls that returned an error or panicked
    transport_failures: AtomicU64,

    /// Records emitted after the logger was closed
    rejected: AtomicU64,
}

impl LoggerMetrics {
    pub const fn new() -> Self {
        Self {
            emitted: AtomicU64::new(0),
            filtered: AtomicU64::new(0),
            transport_failures: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn filtered(&self) -> u64 {
        self.filtered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn transport_failures(&self) -> u64 {
        self.transport_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_emitted(&self) -> u64 {
        self.emitted.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_filtered(&self) -> u64 {
        self.filtered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_transport_failure(&self) -> u64 {
        self.transport_failures.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_rejected(&self) -> u64 {
        self.rejected.fetch_add(1, Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.emitted.store(0, Ordering::Relaxed);
        self.filtered.store(0, Ordering::Relaxed);
        self.transport_failures.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LoggerMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            emitted: AtomicU64::new(self.emitted()),
            filtered: AtomicU64::new(self.filtered()),
            transport_failures: AtomicU64::new(self.transport_failures()),
            rejected: AtomicU64::new(self.rejected()),
        }
    }
}

/// Metrics for a fire-and-forget transport (broker, HTTP)
#[derive(Debug)]
pub struct DeliveryMetrics {
    accepted: AtomicU64,
    delivered: AtomicU64,
    delivery_failures: AtomicU64,
    encoding_failures: AtomicU64,
    rejected: AtomicU64,
}

impl DeliveryMetrics {
    pub const fn new() -> Self {
        Self {
            accepted: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            encoding_failures: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Records handed to the transport by the logger
    #[inline]
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Records confirmed by the far side
    #[inline]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivery_failures(&self) -> u64 {
        self.delivery_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn encoding_failures(&self) -> u64 {
        self.encoding_failures.load(Ordering::Relaxed)
    }

    /// Records discarded because the transport was already closed
    #[inline]
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Accepted records whose outcome is still unknown
    pub fn in_flight(&self) -> u64 {
        self.accepted().saturating_sub(
            self.delivered() + self.delivery_failures() + self.encoding_failures(),
        )
    }

    #[inline]
    pub fn record_accepted(&self) -> u64 {
        self.accepted.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivered(&self) -> u64 {
        self.delivered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivery_failure(&self) -> u64 {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_encoding_failure(&self) -> u64 {
        self.encoding_failures.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_rejected(&self) -> u64 {
        self.rejected.fetch_add(1, Ordering::Relaxed)
    }

    /// Failure rate as a percentage (0.0 - 100.0) of settled records
    pub fn failure_rate(&self) -> f64 {
        let failed = (self.delivery_failures() + self.encoding_failures()) as f64;
        let total = self.delivered() as f64 + failed;
        if total == 0.0 {
            0.0
        } else {
            (failed / total) * 100.0
        }
    }
}

impl Default for DeliveryMetrics {
    fn default() -> Self {
        Self::new()
    }
}
