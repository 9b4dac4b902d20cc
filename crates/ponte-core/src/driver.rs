//! Driver lifecycle controller.
//!
//! The public state machine of the driver contract:
//! `Closed → Opened → Configured → Streaming`, back to `Opened` on stop and
//! to `Closed` on close. Every control operation serializes on one mutex;
//! none is ever blocked indefinitely by the audio thread.

use std::cmp;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::callback::AudioProcessor;
use crate::config::{Capabilities, DeviceInfo, Latency, StreamConfig};
use crate::port::Backend;
use crate::session::{DeviceHandle, DeviceSession};
use crate::stream::{self, StopReason, StreamHandle};
use crate::{Error, Result};

/// Lifecycle state of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverState {
    #[default]
    Closed,
    Opened,
    /// A device is open and `set_sample_rate`/`set_buffer_frames` have
    /// shaped its pending configuration.
    Configured,
    Streaming,
}

/// Control-plane notifications, observable without polling.
///
/// Delivered through a bounded queue with non-blocking sends; when no one
/// drains the queue, old notifications are simply dropped.
#[derive(Debug, Clone)]
pub enum DriverEvent {
    Opened { device: DeviceInfo },
    Closed,
    Started { config: StreamConfig },
    Stopped { reason: StopReason },
    LatencyChanged { latency: Latency },
    Fault { message: String },
}

/// Point-in-time view of the driver, readable without taking the control
/// mutex. Refreshed on every state transition.
#[derive(Debug, Clone, Default)]
pub struct DriverStatus {
    pub state: DriverState,
    pub device: Option<DeviceInfo>,
    pub config: Option<StreamConfig>,
    pub latency: Latency,
}

struct Inner {
    backend: Box<dyn Backend>,
    state: DriverState,
    session: Option<DeviceSession>,
    stream: Option<StreamHandle>,
    /// Parked host processor; loaned to the engine while streaming.
    processor: Option<Box<dyn AudioProcessor>>,
    /// Audio-thread fault awaiting its one synchronous surfacing.
    pending_fault: Option<Error>,
    next_handle: i32,
}

/// The driver: lifecycle controller plus everything it owns.
pub struct Driver {
    inner: Mutex<Inner>,
    status: ArcSwap<DriverStatus>,
    events_tx: Sender<DriverEvent>,
    events_rx: Receiver<DriverEvent>,
}

impl Driver {
    /// Create a driver over `backend`, consuming the host's processor.
    ///
    /// The processor is exclusively owned by the driver until it is
    /// dropped; the contract guarantees it is never retained past that.
    pub fn new(backend: Box<dyn Backend>, processor: Box<dyn AudioProcessor>) -> Driver {
        let (events_tx, events_rx) = bounded(64);
        Driver {
            inner: Mutex::new(Inner {
                backend,
                state: DriverState::Closed,
                session: None,
                stream: None,
                processor: Some(processor),
                pending_fault: None,
                next_handle: 0,
            }),
            status: ArcSwap::from_pointee(DriverStatus::default()),
            events_tx,
            events_rx,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DriverState {
        let mut guard = self.inner.lock();
        self.reap(&mut guard);
        guard.state
    }

    /// Lock-free status snapshot; may trail the true state until the next
    /// control operation.
    pub fn status(&self) -> Arc<DriverStatus> {
        self.status.load_full()
    }

    /// Subscribe to control-plane notifications.
    pub fn events(&self) -> Receiver<DriverEvent> {
        self.events_rx.clone()
    }

    /// Enumerate selectable devices. Valid in every state.
    pub fn devices(&self) -> Result<Vec<DeviceInfo>> {
        self.inner.lock().backend.devices()
    }

    /// Write the newline-delimited device name list into `buf`.
    ///
    /// Returns the number of bytes written. A buffer too small for the
    /// whole list fails with `InvalidArgument` naming the required size;
    /// the list is never silently truncated.
    pub fn enumerate_into(&self, buf: &mut [u8]) -> Result<usize> {
        let devices = self.devices()?;
        let mut list = String::new();
        for device in &devices {
            list.push_str(&device.name);
            list.push('\n');
        }
        let bytes = list.as_bytes();
        if bytes.len() > buf.len() {
            tracing::warn!(
                needed = bytes.len(),
                available = buf.len(),
                "device list does not fit the caller's buffer"
            );
            return Err(Error::InvalidArgument(format!(
                "device list requires {} bytes, buffer holds {}",
                bytes.len(),
                buf.len()
            )));
        }
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(bytes.len())
    }

    /// Capability bitset of the open device.
    pub fn capabilities(&self) -> Result<Capabilities> {
        let mut guard = self.inner.lock();
        self.reap(&mut guard);
        let inner = &mut *guard;
        surface_fault(inner)?;
        match &inner.session {
            Some(session) => Ok(session.capabilities()),
            None => Err(Error::State {
                op: "capabilities",
                state: inner.state,
            }),
        }
    }

    /// Open a device by name; `None` or `""` selects the backend default.
    ///
    /// Valid only while `Closed`. Returns a non-negative handle.
    pub fn open(&self, name: Option<&str>) -> Result<DeviceHandle> {
        let mut guard = self.inner.lock();
        self.reap(&mut guard);
        let inner = &mut *guard;
        if inner.state != DriverState::Closed {
            return Err(Error::State {
                op: "open",
                state: inner.state,
            });
        }
        let port = inner.backend.open(name.filter(|n| !n.is_empty()))?;
        let handle = DeviceHandle::new(inner.next_handle);
        inner.next_handle += 1;
        let session = DeviceSession::new(handle, port);
        tracing::info!(device = %session.info.name, handle = handle.as_i32(), "device opened");
        let _ = self.events_tx.try_send(DriverEvent::Opened {
            device: session.info.clone(),
        });
        inner.session = Some(session);
        inner.state = DriverState::Opened;
        self.publish(inner);
        Ok(handle)
    }

    /// Release the open device. Valid from `Opened`/`Configured`; a
    /// streaming driver must be stopped first.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        self.reap(&mut guard);
        let inner = &mut *guard;
        match inner.state {
            DriverState::Opened | DriverState::Configured => {
                inner.session = None;
                inner.pending_fault = None;
                inner.state = DriverState::Closed;
                tracing::info!("device closed");
                let _ = self.events_tx.try_send(DriverEvent::Closed);
                self.publish(inner);
                Ok(())
            }
            state => Err(Error::State { op: "close", state }),
        }
    }

    /// The open device's default configuration, with any
    /// `set_sample_rate`/`set_buffer_frames` adjustments applied.
    ///
    /// Pure query; fails with `StateError` while `Closed`.
    pub fn default_config(&self) -> Result<StreamConfig> {
        let mut guard = self.inner.lock();
        self.reap(&mut guard);
        let inner = &mut *guard;
        surface_fault(inner)?;
        match &inner.session {
            Some(session) => Ok(session.config),
            None => Err(Error::State {
                op: "get_default_config",
                state: inner.state,
            }),
        }
    }

    /// Arm the stream engine with `requested` and start streaming.
    ///
    /// Channel counts, format and layout are honored exactly or rejected;
    /// `sample_rate` and `buffer_frames` may be adjusted toward hardware
    /// limits. The effective configuration is returned and reported in
    /// every callback.
    pub fn start(&self, requested: &StreamConfig) -> Result<StreamConfig> {
        let mut guard = self.inner.lock();
        self.reap(&mut guard);
        let inner = &mut *guard;
        surface_fault(inner)?;
        match inner.state {
            DriverState::Opened | DriverState::Configured => {}
            state => return Err(Error::State { op: "start", state }),
        }
        requested.validate()?;

        let Some(session) = inner.session.as_mut() else {
            return Err(Error::State {
                op: "start",
                state: inner.state,
            });
        };
        if session.lost {
            return Err(Error::Backend("device lost after failed stop".into()));
        }

        let caps = session.capabilities();
        if requested.out_channels > 0 && !caps.contains(Capabilities::OUTPUT) {
            return Err(Error::Unsupported("device cannot render output"));
        }
        if requested.in_channels > 0 && !caps.contains(Capabilities::INPUT) {
            return Err(Error::Unsupported("device cannot capture input"));
        }
        if requested.in_channels > 0
            && requested.out_channels > 0
            && !caps.contains(Capabilities::FULL_DUPLEX)
        {
            return Err(Error::Unsupported("device cannot stream full duplex"));
        }

        let Some(mut port) = session.port.take() else {
            return Err(Error::Backend("hardware port unavailable".into()));
        };

        let effective = match port.negotiate(requested) {
            Ok(config) => config,
            Err(e) => {
                session.port = Some(port);
                return Err(e);
            }
        };
        if effective != *requested {
            tracing::debug!(
                sample_rate = effective.sample_rate,
                buffer_frames = effective.buffer_frames,
                "configuration adjusted during negotiation"
            );
        }
        if let Err(e) = port.open_stream(&effective) {
            session.port = Some(port);
            return Err(e);
        }

        let latency = port.latency(&effective);
        let latency_changed = latency != session.latency;
        session.config = effective;
        session.latency = latency;

        let Some(mut processor) = inner.processor.take() else {
            session.port = Some(port);
            return Err(Error::Backend("host processor unavailable".into()));
        };
        if latency_changed {
            processor.latency_changed(latency);
            let _ = self
                .events_tx
                .try_send(DriverEvent::LatencyChanged { latency });
        }

        match stream::spawn(port, processor, effective, self.events_tx.clone()) {
            Ok(handle) => {
                inner.stream = Some(handle);
                inner.state = DriverState::Streaming;
                tracing::info!(
                    sample_rate = effective.sample_rate,
                    buffer_frames = effective.buffer_frames,
                    "streaming started"
                );
                let _ = self.events_tx.try_send(DriverEvent::Started {
                    config: effective,
                });
                self.publish(inner);
                Ok(effective)
            }
            Err(e) => {
                // The failed spawn consumed port and processor.
                session.lost = true;
                self.publish(inner);
                Err(e)
            }
        }
    }

    /// Stop streaming.
    ///
    /// Blocks only until the audio thread acknowledges, bounded by
    /// max(4 buffer periods, 200 ms). Stop while `Opened`/`Configured` is
    /// a successful no-op; stop while `Closed` is a `StateError`.
    pub fn stop(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        self.reap(&mut guard);
        let inner = &mut *guard;
        match inner.state {
            DriverState::Streaming => {}
            DriverState::Opened | DriverState::Configured => return Ok(()),
            DriverState::Closed => {
                return Err(Error::State {
                    op: "stop",
                    state: DriverState::Closed,
                })
            }
        }
        let Some(handle) = inner.stream.take() else {
            inner.state = DriverState::Opened;
            self.publish(inner);
            return Ok(());
        };

        handle.shared.request_stop();
        let deadline = cmp::max(handle.config.period() * 4, Duration::from_millis(200));
        if !handle.shared.wait_exit(deadline) {
            // A hung host callback must not hold the control thread
            // hostage: abandon the thread and mark the session lost.
            if let Some(session) = inner.session.as_mut() {
                session.lost = true;
            }
            inner.state = DriverState::Opened;
            tracing::warn!("realtime thread did not acknowledge stop; abandoning it");
            self.publish(inner);
            return Err(Error::Backend(
                "realtime thread failed to acknowledge stop".into(),
            ));
        }

        match handle.join.join() {
            Ok(exit) => {
                if let Some(session) = inner.session.as_mut() {
                    session.port = Some(exit.port);
                }
                inner.processor = Some(exit.processor);
                if let Some(fault) = exit.fault {
                    inner.pending_fault = Some(fault);
                }
                inner.state = DriverState::Opened;
                tracing::info!(reason = ?exit.reason, "streaming stopped");
                self.publish(inner);
                Ok(())
            }
            Err(_) => {
                if let Some(session) = inner.session.as_mut() {
                    session.lost = true;
                }
                inner.state = DriverState::Opened;
                self.publish(inner);
                Err(Error::Backend("realtime thread terminated abnormally".into()))
            }
        }
    }

    /// Set the pending sample rate. Valid from `Opened`/`Configured`;
    /// requires the `SET_SAMPLE_RATE` capability; never valid while
    /// `Streaming`.
    pub fn set_sample_rate(&self, sample_rate: u32) -> Result<()> {
        if sample_rate == 0 {
            return Err(Error::InvalidArgument("sample_rate must be > 0".into()));
        }
        self.reconfigure(
            "set_sample_rate",
            Capabilities::SET_SAMPLE_RATE,
            |config| config.sample_rate = sample_rate,
            |effective| {
                (effective.sample_rate == sample_rate).then_some(()).ok_or_else(|| {
                    Error::InvalidArgument(format!("sample rate {sample_rate} not supported"))
                })
            },
        )
    }

    /// Set the pending buffer size in frames. Valid from
    /// `Opened`/`Configured`; requires the `SET_BUFFER_FRAMES` capability;
    /// never valid while `Streaming`.
    pub fn set_buffer_frames(&self, buffer_frames: u32) -> Result<()> {
        if buffer_frames == 0 {
            return Err(Error::InvalidArgument("buffer_frames must be > 0".into()));
        }
        self.reconfigure(
            "set_buffer_frames",
            Capabilities::SET_BUFFER_FRAMES,
            |config| config.buffer_frames = buffer_frames,
            |effective| {
                (effective.buffer_frames == buffer_frames)
                    .then_some(())
                    .ok_or_else(|| {
                        Error::InvalidArgument(format!(
                            "buffer size {buffer_frames} frames not supported"
                        ))
                    })
            },
        )
    }

    /// Latest latency figures. Valid from `Configured`/`Streaming`.
    pub fn latency(&self) -> Result<Latency> {
        let mut guard = self.inner.lock();
        self.reap(&mut guard);
        let inner = &mut *guard;
        surface_fault(inner)?;
        match inner.state {
            DriverState::Configured | DriverState::Streaming => {}
            state => {
                return Err(Error::State {
                    op: "get_latency",
                    state,
                })
            }
        }
        match &inner.session {
            Some(session) => Ok(session.latency),
            None => Err(Error::State {
                op: "get_latency",
                state: inner.state,
            }),
        }
    }

    fn reconfigure(
        &self,
        op: &'static str,
        required: Capabilities,
        apply: impl FnOnce(&mut StreamConfig),
        honored: impl FnOnce(&StreamConfig) -> Result<()>,
    ) -> Result<()> {
        let mut guard = self.inner.lock();
        self.reap(&mut guard);
        let inner = &mut *guard;
        surface_fault(inner)?;
        match inner.state {
            DriverState::Opened | DriverState::Configured => {}
            state => return Err(Error::State { op, state }),
        }
        let Some(session) = inner.session.as_mut() else {
            return Err(Error::State {
                op,
                state: inner.state,
            });
        };
        if !session.capabilities().contains(required) {
            return Err(Error::Unsupported("capability absent on this device"));
        }
        let Some(port) = session.port.as_ref() else {
            return Err(Error::Backend("hardware port unavailable".into()));
        };

        let mut candidate = session.config;
        apply(&mut candidate);
        let effective = port.negotiate(&candidate)?;
        honored(&effective)?;

        session.config = effective;
        let latency = port.latency(&effective);
        inner.state = DriverState::Configured;
        if latency != session.latency {
            session.latency = latency;
            if let Some(processor) = inner.processor.as_mut() {
                processor.latency_changed(latency);
            }
            let _ = self
                .events_tx
                .try_send(DriverEvent::LatencyChanged { latency });
        }
        tracing::debug!(op, "configuration updated");
        self.publish(inner);
        Ok(())
    }

    /// Reclaim an engine that stopped on its own (host returned `false`,
    /// backend fault, or callback panic). Faults are stored for their one
    /// synchronous surfacing on the next query.
    fn reap(&self, guard: &mut Inner) {
        if guard.state != DriverState::Streaming {
            return;
        }
        let finished = guard
            .stream
            .as_ref()
            .map(|s| s.shared.has_exited())
            .unwrap_or(false);
        if !finished {
            return;
        }
        let Some(handle) = guard.stream.take() else {
            return;
        };
        match handle.join.join() {
            Ok(exit) => {
                tracing::debug!(reason = ?exit.reason, "engine reclaimed");
                if let Some(session) = guard.session.as_mut() {
                    session.port = Some(exit.port);
                }
                guard.processor = Some(exit.processor);
                if let Some(fault) = exit.fault {
                    tracing::warn!(%fault, "engine stopped on a fault");
                    let _ = self.events_tx.try_send(DriverEvent::Fault {
                        message: fault.to_string(),
                    });
                    guard.pending_fault = Some(fault);
                    if let Some(processor) = guard.processor.as_mut() {
                        processor.reset_request();
                    }
                }
            }
            Err(_) => {
                guard.pending_fault =
                    Some(Error::Backend("realtime thread terminated abnormally".into()));
                if let Some(session) = guard.session.as_mut() {
                    session.lost = true;
                }
            }
        }
        guard.state = DriverState::Opened;
        self.publish(guard);
    }

    fn publish(&self, inner: &Inner) {
        self.status.store(Arc::new(DriverStatus {
            state: inner.state,
            device: inner.session.as_ref().map(|s| s.info.clone()),
            config: inner.session.as_ref().map(|s| s.config),
            latency: inner
                .session
                .as_ref()
                .map(|s| s.latency)
                .unwrap_or_default(),
        }));
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        let _ = self.stop();
        let _ = self.close();
    }
}

fn surface_fault(inner: &mut Inner) -> Result<()> {
    match inner.pending_fault.take() {
        Some(fault) => Err(fault),
        None => Ok(()),
    }
}
