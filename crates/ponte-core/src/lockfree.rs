//! Lock-free primitives shared between the control and audio threads.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Cache-line aligned atomic bool.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicFlag {
    value: AtomicBool,
}

impl AtomicFlag {
    pub fn new(value: bool) -> Self {
        Self {
            value: AtomicBool::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::Release);
    }
}

impl Default for AtomicFlag {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Cache-line aligned event counter that saturates instead of wrapping.
///
/// `drain` returns the accumulated count and resets it in one atomic step,
/// so an event is reported exactly once.
#[derive(Debug, Default)]
#[repr(align(64))]
pub struct SaturatingCounter {
    value: AtomicU32,
}

impl SaturatingCounter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn incr(&self) {
        // fetch_update never fails with an always-Some closure.
        let _ = self
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                Some(v.saturating_add(1))
            });
    }

    #[inline]
    pub fn drain(&self) -> u32 {
        self.value.swap(0, Ordering::AcqRel)
    }

    #[inline]
    pub fn peek(&self) -> u32 {
        self.value.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag() {
        let flag = AtomicFlag::new(false);
        assert!(!flag.get());
        flag.set(true);
        assert!(flag.get());
    }

    #[test]
    fn test_counter_drains_once() {
        let counter = SaturatingCounter::new();
        counter.incr();
        counter.incr();
        counter.incr();
        assert_eq!(counter.drain(), 3);
        assert_eq!(counter.drain(), 0);
    }

    #[test]
    fn test_counter_saturates() {
        let counter = SaturatingCounter::new();
        counter.value.store(u32::MAX, Ordering::Relaxed);
        counter.incr();
        assert_eq!(counter.peek(), u32::MAX);
    }
}
