//! Device session: one opened device and its negotiated state.

use crate::config::{Capabilities, DeviceInfo, Latency, StreamConfig};
use crate::port::HardwarePort;

/// Opaque handle issued by `open`, valid until `close`.
///
/// Handles are non-negative and increase monotonically across opens within
/// one driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceHandle(i32);

impl DeviceHandle {
    pub(crate) fn new(value: i32) -> Self {
        debug_assert!(value >= 0);
        Self(value)
    }

    pub fn as_i32(self) -> i32 {
        self.0
    }
}

/// Aggregate state of the currently open device.
pub(crate) struct DeviceSession {
    pub info: DeviceInfo,
    pub handle: DeviceHandle,
    /// `None` while the port is loaned to the stream engine.
    pub port: Option<Box<dyn HardwarePort>>,
    /// Pending configuration: the device default overlaid with
    /// `set_sample_rate`/`set_buffer_frames`; the effective configuration
    /// once streaming has started.
    pub config: StreamConfig,
    pub latency: Latency,
    /// The engine thread was abandoned; the port is gone for good.
    pub lost: bool,
}

impl DeviceSession {
    pub(crate) fn new(handle: DeviceHandle, port: Box<dyn HardwarePort>) -> Self {
        let config = port.default_config();
        let latency = port.latency(&config);
        let info = DeviceInfo {
            name: port.device_name().to_string(),
            capabilities: port.capabilities(),
        };
        Self {
            info,
            handle,
            port: Some(port),
            config,
            latency,
            lost: false,
        }
    }

    pub(crate) fn capabilities(&self) -> Capabilities {
        self.info.capabilities
    }
}
