//! Realtime stream engine: the `ponte-rt` thread and its cycle loop.
//!
//! The engine owns the hardware port, the host processor and all scratch
//! buffers for the lifetime of a streaming session. The control thread
//! talks to it through two release/acquire flags (stop request, exit
//! acknowledgment) and a condvar-signaled exit latch; nothing in the cycle
//! loop allocates, locks or logs.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use parking_lot::{Condvar, Mutex};

use crate::buffer::{BufferMut, BufferRef, Samples};
use crate::callback::{AudioProcessor, Cycle};
use crate::config::{BufferLayout, StreamConfig};
use crate::convert::{convert, deinterleave, interleave};
use crate::driver::DriverEvent;
use crate::lockfree::AtomicFlag;
use crate::port::{CycleStart, HardwarePort, IoStatus};
use crate::timing::{FaultCounters, TimingTracker};
use crate::{Error, Result};

/// Why a streaming session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The control thread requested the stop.
    Requested,
    /// The host callback returned `false`.
    HostRequested,
    /// A fatal backend error or a panicking host callback.
    Fault,
}

/// State shared between the control thread and the engine thread.
pub(crate) struct EngineShared {
    running: AtomicFlag,
    exited: AtomicFlag,
    faults: FaultCounters,
    exit_lock: Mutex<bool>,
    exit_cond: Condvar,
}

impl EngineShared {
    fn new() -> Self {
        Self {
            running: AtomicFlag::new(true),
            exited: AtomicFlag::new(false),
            faults: FaultCounters::new(),
            exit_lock: Mutex::new(false),
            exit_cond: Condvar::new(),
        }
    }

    pub(crate) fn request_stop(&self) {
        self.running.set(false);
    }

    /// True once the engine thread will issue no further callbacks.
    pub(crate) fn has_exited(&self) -> bool {
        self.exited.get()
    }

    /// Bounded wait for the engine thread to acknowledge its exit.
    pub(crate) fn wait_exit(&self, timeout: Duration) -> bool {
        let mut done = self.exit_lock.lock();
        if *done {
            return true;
        }
        let _ = self.exit_cond.wait_for(&mut done, timeout);
        *done
    }

    fn mark_exited(&self) {
        self.exited.set(true);
        let mut done = self.exit_lock.lock();
        *done = true;
        self.exit_cond.notify_all();
    }
}

/// Everything the worker hands back to the control thread on exit.
pub(crate) struct WorkerExit {
    pub port: Box<dyn HardwarePort>,
    pub processor: Box<dyn AudioProcessor>,
    pub reason: StopReason,
    pub fault: Option<Error>,
}

/// Control-side handle to a running engine.
pub(crate) struct StreamHandle {
    pub join: JoinHandle<WorkerExit>,
    pub shared: Arc<EngineShared>,
    pub config: StreamConfig,
}

/// Spawn the engine thread for an armed port.
///
/// On failure the port and processor have been consumed; the caller must
/// treat the session as lost.
pub(crate) fn spawn(
    port: Box<dyn HardwarePort>,
    processor: Box<dyn AudioProcessor>,
    config: StreamConfig,
    events: Sender<DriverEvent>,
) -> Result<StreamHandle> {
    let shared = Arc::new(EngineShared::new());
    let worker = Worker::new(port, processor, config, shared.clone(), events);

    let join = thread::Builder::new()
        .name("ponte-rt".into())
        .spawn(move || worker.run())
        .map_err(|e| Error::Backend(format!("failed to spawn realtime thread: {e}")))?;

    Ok(StreamHandle {
        join,
        shared,
        config,
    })
}

struct Worker {
    port: Box<dyn HardwarePort>,
    processor: Box<dyn AudioProcessor>,
    config: StreamConfig,
    shared: Arc<EngineShared>,
    tracker: TimingTracker,
    events: Sender<DriverEvent>,

    // Scratch, allocated once here and reused every cycle.
    native_in: Samples,
    native_out: Samples,
    host_in: Samples,
    host_in_planar: Option<Samples>,
    host_out: Samples,
    host_out_inter: Option<Samples>,
}

impl Worker {
    fn new(
        port: Box<dyn HardwarePort>,
        processor: Box<dyn AudioProcessor>,
        config: StreamConfig,
        shared: Arc<EngineShared>,
        events: Sender<DriverEvent>,
    ) -> Self {
        let native = port.native_format();
        let planar = config.layout == BufferLayout::NonInterleaved;
        Self {
            tracker: TimingTracker::start_now(),
            native_in: Samples::silence(native, config.in_samples()),
            native_out: Samples::silence(native, config.out_samples()),
            host_in: Samples::silence(config.format, config.in_samples()),
            host_in_planar: (planar && config.in_channels > 0)
                .then(|| Samples::silence(config.format, config.in_samples())),
            host_out: Samples::silence(config.format, config.out_samples()),
            host_out_inter: (planar && config.out_channels > 0)
                .then(|| Samples::silence(config.format, config.out_samples())),
            port,
            processor,
            config,
            shared,
            events,
        }
    }

    fn run(mut self) -> WorkerExit {
        tracing::debug!(device = self.port.device_name(), "realtime thread started");
        let (reason, fault) = self.cycle_loop();
        self.port.close_stream();
        let _ = self.events.try_send(DriverEvent::Stopped { reason });
        self.shared.mark_exited();
        tracing::debug!(?reason, "realtime thread exited");
        WorkerExit {
            port: self.port,
            processor: self.processor,
            reason,
            fault,
        }
    }

    fn cycle_loop(&mut self) -> (StopReason, Option<Error>) {
        let frames = self.config.buffer_frames;
        let in_channels = self.config.in_channels;
        let out_channels = self.config.out_channels;
        let layout = self.config.layout;
        let format = self.config.format;

        loop {
            if !self.shared.running.get() {
                return (StopReason::Requested, None);
            }

            match self.port.wait_cycle() {
                Ok(CycleStart { late: true }) => self.shared.faults.add_underrun(),
                Ok(CycleStart { late: false }) => {}
                Err(e) => return (StopReason::Fault, Some(e)),
            }

            if in_channels > 0 {
                match self.port.read_input(self.native_in.as_slice_mut()) {
                    Ok(IoStatus::Complete) => {}
                    Ok(IoStatus::Xrun) => self.shared.faults.add_overrun(),
                    Err(e) => return (StopReason::Fault, Some(e)),
                }
                convert(self.native_in.as_slice(), self.host_in.as_slice_mut());
                if let Some(planar) = &mut self.host_in_planar {
                    reorder(
                        &self.host_in,
                        planar,
                        in_channels as usize,
                        frames as usize,
                        Direction::Deinterleave,
                    );
                }
            }

            let time = self
                .tracker
                .snapshot(&self.shared.faults, self.port.device_time_ns());

            self.host_out.fill_silence();

            let input = if in_channels > 0 {
                let samples = self.host_in_planar.as_ref().unwrap_or(&self.host_in);
                BufferRef::new(samples.as_slice(), layout, in_channels, frames)
            } else {
                BufferRef::empty(format, layout)
            };
            let output = BufferMut::new(self.host_out.as_slice_mut(), layout, out_channels, frames);
            let config = &self.config;
            let processor = &mut self.processor;

            let keep = catch_unwind(AssertUnwindSafe(move || {
                processor.process(Cycle {
                    input,
                    output,
                    frames,
                    time,
                    config,
                })
            }));

            match keep {
                Ok(true) => {}
                Ok(false) => return (StopReason::HostRequested, None),
                Err(_) => {
                    return (
                        StopReason::Fault,
                        Some(Error::Backend("host process callback panicked".into())),
                    );
                }
            }

            if out_channels > 0 {
                if let Some(staging) = &mut self.host_out_inter {
                    reorder(
                        &self.host_out,
                        staging,
                        out_channels as usize,
                        frames as usize,
                        Direction::Interleave,
                    );
                    convert(staging.as_slice(), self.native_out.as_slice_mut());
                } else {
                    convert(self.host_out.as_slice(), self.native_out.as_slice_mut());
                }
                match self.port.write_output(self.native_out.as_slice()) {
                    Ok(IoStatus::Complete) => {}
                    Ok(IoStatus::Xrun) => self.shared.faults.add_underrun(),
                    Err(e) => return (StopReason::Fault, Some(e)),
                }
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Interleave,
    Deinterleave,
}

/// Layout reorder between two same-format scratch buffers.
fn reorder(src: &Samples, dst: &mut Samples, channels: usize, frames: usize, dir: Direction) {
    match (src, dst, dir) {
        (Samples::F32(s), Samples::F32(d), Direction::Interleave) => {
            interleave(s, d, channels, frames)
        }
        (Samples::F32(s), Samples::F32(d), Direction::Deinterleave) => {
            deinterleave(s, d, channels, frames)
        }
        (Samples::I16(s), Samples::I16(d), Direction::Interleave) => {
            interleave(s, d, channels, frames)
        }
        (Samples::I16(s), Samples::I16(d), Direction::Deinterleave) => {
            deinterleave(s, d, channels, frames)
        }
        (Samples::U16(s), Samples::U16(d), Direction::Interleave) => {
            interleave(s, d, channels, frames)
        }
        (Samples::U16(s), Samples::U16(d), Direction::Deinterleave) => {
            deinterleave(s, d, channels, frames)
        }
        _ => unreachable!("layout staging buffers share one format"),
    }
}
