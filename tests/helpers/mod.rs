//! Shared helpers for the behavior tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use ponte::prelude::*;

/// Everything a callback observed about one cycle.
#[derive(Debug, Clone)]
pub struct CycleRecord {
    pub frames: u32,
    pub time: TimeInfo,
    pub config: StreamConfig,
    pub input_peak: f32,
}

/// Counts cycles and hands per-cycle records to the test thread through a
/// bounded channel (RT-safe try_send; overflow drops records, not audio).
pub struct CollectingProcessor {
    pub cycles: Arc<AtomicU32>,
    pub reset_seen: Arc<AtomicBool>,
    records: Sender<CycleRecord>,
    /// Written into every output sample (F32 streams only).
    pub emit: f32,
    /// Return `false` once this many cycles have run (0 = never).
    pub stop_after: u32,
    /// Panic on this cycle number (0 = never).
    pub panic_on: u32,
}

impl CollectingProcessor {
    pub fn new(emit: f32) -> (Self, Receiver<CycleRecord>, Arc<AtomicU32>, Arc<AtomicBool>) {
        let (tx, rx) = crossbeam_channel::bounded(4096);
        let cycles = Arc::new(AtomicU32::new(0));
        let reset_seen = Arc::new(AtomicBool::new(false));
        (
            Self {
                cycles: cycles.clone(),
                reset_seen: reset_seen.clone(),
                records: tx,
                emit,
                stop_after: 0,
                panic_on: 0,
            },
            rx,
            cycles,
            reset_seen,
        )
    }
}

impl AudioProcessor for CollectingProcessor {
    fn process(&mut self, mut cycle: Cycle<'_>) -> bool {
        let n = self.cycles.fetch_add(1, Ordering::AcqRel) + 1;
        if self.panic_on != 0 && n == self.panic_on {
            panic!("scripted callback panic");
        }

        let input_peak = match cycle.input.data() {
            SampleSlice::F32(s) => s.iter().fold(0.0f32, |a, &b| a.max(b.abs())),
            SampleSlice::I16(s) => s
                .iter()
                .fold(0.0f32, |a, &b| a.max((b as f32 / 32768.0).abs())),
            SampleSlice::U16(s) => s
                .iter()
                .fold(0.0f32, |a, &b| a.max(((b as i32 - 32768) as f32 / 32768.0).abs())),
        };

        if let SampleSliceMut::F32(out) = cycle.output.data_mut() {
            out.fill(self.emit);
        }

        let record = CycleRecord {
            frames: cycle.frames,
            time: cycle.time,
            config: *cycle.config,
            input_peak,
        };
        match self.records.try_send(record) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => {}
        }

        !(self.stop_after != 0 && n >= self.stop_after)
    }

    fn reset_request(&mut self) {
        self.reset_seen.store(true, Ordering::Release);
    }
}

/// Spin until `predicate` holds or `timeout` elapses; true on success.
pub fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    predicate()
}

/// Small duplex config against the loopback device for fast tests.
pub fn fast_duplex_config() -> StreamConfig {
    StreamConfig {
        sample_rate: 48000,
        buffer_frames: 64,
        in_channels: 2,
        out_channels: 2,
        format: SampleFormat::F32,
        layout: BufferLayout::Interleaved,
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
