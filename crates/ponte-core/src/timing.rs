//! Stream timing and fault accounting.

use std::time::Instant;

use crate::lockfree::SaturatingCounter;

/// Timing snapshot delivered with every callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeInfo {
    /// Monotonic nanoseconds since the stream started.
    pub host_time_ns: u64,
    /// Hardware clock estimate in nanoseconds; 0 when the device exposes
    /// none. Passed through verbatim, never fabricated.
    pub device_time_ns: u64,
    /// Underruns since the previous callback.
    pub underruns: u32,
    /// Overruns since the previous callback.
    pub overruns: u32,
}

/// Underrun/overrun accumulators written by the stream engine.
///
/// Increments saturate; each fault is reported by exactly one snapshot.
#[derive(Debug, Default)]
pub struct FaultCounters {
    underruns: SaturatingCounter,
    overruns: SaturatingCounter,
}

impl FaultCounters {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_underrun(&self) {
        self.underruns.incr();
    }

    #[inline]
    pub fn add_overrun(&self) {
        self.overruns.incr();
    }
}

/// Produces one [`TimeInfo`] per cycle against a fixed monotonic origin.
#[derive(Debug)]
pub struct TimingTracker {
    origin: Instant,
}

impl TimingTracker {
    /// Capture the host-time origin; called once when streaming starts.
    pub fn start_now() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Build this cycle's snapshot, draining the fault counters.
    pub fn snapshot(&self, faults: &FaultCounters, device_time_ns: u64) -> TimeInfo {
        TimeInfo {
            host_time_ns: self.origin.elapsed().as_nanos() as u64,
            device_time_ns,
            underruns: faults.underruns.drain(),
            overruns: faults.overruns.drain(),
        }
    }
}
