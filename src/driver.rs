//! Host-facing driver facade.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use ponte_core::{
    Capabilities, DeviceHandle, DeviceInfo, Driver, DriverEvent, DriverState, DriverStatus,
    Latency, Result, StreamConfig,
};

use crate::PonteDriverBuilder;

/// The driver a host embeds: the kernel [`Driver`] plus construction and
/// convenience queries.
///
/// All control operations serialize internally; `PonteDriver` is `Send`
/// and `Sync` and may be shared across control threads. The realtime
/// callback runs on the driver's own `ponte-rt` thread.
pub struct PonteDriver {
    driver: Driver,
}

impl PonteDriver {
    /// Start configuring a driver.
    pub fn builder() -> PonteDriverBuilder {
        PonteDriverBuilder::default()
    }

    pub(crate) fn from_inner(driver: Driver) -> Self {
        Self { driver }
    }

    /// Enumerate selectable devices. Valid in every state.
    pub fn devices(&self) -> Result<Vec<DeviceInfo>> {
        self.driver.devices()
    }

    /// Write the newline-delimited device list into `buf`; truncation is
    /// signaled, never silent.
    pub fn enumerate_into(&self, buf: &mut [u8]) -> Result<usize> {
        self.driver.enumerate_into(buf)
    }

    /// Open a named device; valid only while `Closed`.
    pub fn open(&self, name: &str) -> Result<DeviceHandle> {
        self.driver.open(Some(name))
    }

    /// Open the backend's default device; valid only while `Closed`.
    pub fn open_default(&self) -> Result<DeviceHandle> {
        self.driver.open(None)
    }

    /// Release the open device; stop first if streaming.
    pub fn close(&self) -> Result<()> {
        self.driver.close()
    }

    /// Capability bitset of the open device.
    pub fn capabilities(&self) -> Result<Capabilities> {
        self.driver.capabilities()
    }

    /// The open device's default configuration with any pending
    /// `set_sample_rate`/`set_buffer_frames` adjustments applied.
    pub fn default_config(&self) -> Result<StreamConfig> {
        self.driver.default_config()
    }

    /// Start streaming with `requested`; returns the effective
    /// configuration after negotiation.
    pub fn start(&self, requested: &StreamConfig) -> Result<StreamConfig> {
        self.driver.start(requested)
    }

    /// Start streaming with the device's default configuration.
    pub fn start_default(&self) -> Result<StreamConfig> {
        let config = self.driver.default_config()?;
        self.driver.start(&config)
    }

    /// Stop streaming; bounded wait, no-op when already stopped.
    pub fn stop(&self) -> Result<()> {
        self.driver.stop()
    }

    /// Set the pending sample rate (stopped only).
    pub fn set_sample_rate(&self, sample_rate: u32) -> Result<()> {
        self.driver.set_sample_rate(sample_rate)
    }

    /// Set the pending buffer size in frames (stopped only).
    pub fn set_buffer_frames(&self, buffer_frames: u32) -> Result<()> {
        self.driver.set_buffer_frames(buffer_frames)
    }

    /// Latest latency figures (`Configured`/`Streaming`).
    pub fn latency(&self) -> Result<Latency> {
        self.driver.latency()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DriverState {
        self.driver.state()
    }

    /// Lock-free status snapshot.
    pub fn status(&self) -> Arc<DriverStatus> {
        self.driver.status()
    }

    /// Subscribe to control-plane notifications.
    pub fn events(&self) -> Receiver<DriverEvent> {
        self.driver.events()
    }

    /// The kernel driver, for embedders needing the full surface.
    pub fn inner(&self) -> &Driver {
        &self.driver
    }
}
