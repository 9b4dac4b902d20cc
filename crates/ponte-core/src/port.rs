//! Hardware I/O port abstraction implemented by device backends.
//!
//! A port is the driver's only view of a physical or virtual device: a
//! period pacer, non-blocking-ish buffer exchange in the port's fixed native
//! wire format, and a clock/latency source. Ports are exclusively owned by
//! the stream engine while streaming and accessed only from the realtime
//! thread between `open_stream` and `close_stream`.

use crate::buffer::{SampleSlice, SampleSliceMut};
use crate::config::{Capabilities, DeviceInfo, Latency, SampleFormat, StreamConfig};
use crate::Result;

/// Outcome of one buffer exchange with the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoStatus {
    /// The full period was transferred.
    Complete,
    /// The hardware ring wrapped; missing samples were dropped or
    /// zero-filled. The engine counts it and continues.
    Xrun,
}

/// Result of waiting for the next period boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleStart {
    /// The period deadline had already passed when the engine arrived; the
    /// hardware was ready before the previous cycle finished.
    pub late: bool,
}

/// One opened device of a backend.
///
/// All buffer exchange uses the port's [`native_format`](Self::native_format)
/// and interleaved layout; the stream engine converts to and from the
/// negotiated host configuration.
pub trait HardwarePort: Send + 'static {
    /// Resolved device name.
    fn device_name(&self) -> &str;

    /// Fixed capability set of this device.
    fn capabilities(&self) -> Capabilities;

    /// The device's preferred configuration.
    fn default_config(&self) -> StreamConfig;

    /// Native wire format of `read_input`/`write_output`.
    fn native_format(&self) -> SampleFormat;

    /// Validate a requested configuration against hardware limits.
    ///
    /// May adjust `sample_rate` and `buffer_frames` toward the nearest
    /// supported values; channel counts, format and layout are either
    /// honored or rejected, never altered.
    fn negotiate(&self, requested: &StreamConfig) -> Result<StreamConfig>;

    /// Allocate hardware buffers and arm the device for `config`.
    fn open_stream(&mut self, config: &StreamConfig) -> Result<()>;

    /// Disarm the device and release hardware buffers. Idempotent.
    fn close_stream(&mut self);

    /// Wait for the next period boundary. The wait is bounded by a small
    /// number of periods; a stalled device returns an error instead of
    /// blocking indefinitely.
    fn wait_cycle(&mut self) -> Result<CycleStart>;

    /// Fill `dst` (`buffer_frames * in_channels` samples, native format,
    /// interleaved) with captured input. Short reads zero-fill the
    /// remainder and report [`IoStatus::Xrun`].
    fn read_input(&mut self, dst: SampleSliceMut<'_>) -> Result<IoStatus>;

    /// Submit `src` (`buffer_frames * out_channels` samples, native format,
    /// interleaved) for playback.
    fn write_output(&mut self, src: SampleSlice<'_>) -> Result<IoStatus>;

    /// Device clock in nanoseconds; 0 when the hardware exposes none.
    fn device_time_ns(&self) -> u64 {
        0
    }

    /// Latency figures for `config`.
    fn latency(&self, config: &StreamConfig) -> Latency;
}

/// Device discovery and acquisition for one backend family.
///
/// Process-wide factory symbols of the binary driver contract become plain
/// owned values: construct a backend, hand it to the driver, done.
pub trait Backend: Send + Sync + 'static {
    /// Backend family name (e.g. "loopback", "cpal").
    fn name(&self) -> &'static str;

    /// Enumerate selectable devices.
    fn devices(&self) -> Result<Vec<DeviceInfo>>;

    /// Open a device by name; `None` or `""` selects the backend default.
    fn open(&self, name: Option<&str>) -> Result<Box<dyn HardwarePort>>;
}
