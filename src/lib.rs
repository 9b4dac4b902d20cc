//! # Ponte - Realtime Audio Driver Core
//!
//! Ponte is the streaming engine a hardware audio driver builds behind a
//! small, stable contract: the lifecycle state machine, the realtime
//! buffer loop, format/layout conversion, and timing with underrun/overrun
//! accounting. A DAW-style host plugs in through one callback; hardware
//! plugs in through one port trait.
//!
//! ## Architecture
//!
//! - **ponte-core** - the kernel: [`Driver`] lifecycle controller, the
//!   `ponte-rt` stream engine, [`convert`](ponte_core::convert),
//!   [`TimeInfo`] timing, and the [`Backend`]/[`HardwarePort`] seam with
//!   the built-in [`LoopbackBackend`] (plus `CpalBackend` behind the
//!   `cpal` feature).
//! - **ponte** (this crate) - the host-facing facade: [`PonteDriver`] and
//!   [`PonteDriverBuilder`].
//!
//! ## Quick start
//!
//! ```
//! use ponte::prelude::*;
//!
//! struct Gain(f32);
//!
//! impl AudioProcessor for Gain {
//!     fn process(&mut self, mut cycle: Cycle<'_>) -> bool {
//!         if let SampleSliceMut::F32(out) = cycle.output.data_mut() {
//!             out.fill(0.0);
//!         }
//!         true
//!     }
//! }
//!
//! let driver = PonteDriver::builder().processor(Gain(0.5)).build()?;
//! driver.open_default()?;
//! let config = driver.default_config()?;
//! driver.start(&config)?;
//! driver.stop()?;
//! driver.close()?;
//! # Ok::<(), ponte::Error>(())
//! ```
//!
//! ## Feature flags
//!
//! - `default` - the built-in virtual backend only; fully testable without
//!   hardware
//! - `cpal` - system-audio backend over CPAL

mod builder;
pub use builder::PonteDriverBuilder;

mod driver;
pub use driver::PonteDriver;

pub use ponte_core::{
    AudioProcessor, Backend, BufferLayout, BufferMut, BufferRef, Capabilities, Cycle,
    CycleStart, DeviceHandle, DeviceInfo, Driver, DriverEvent, DriverState, DriverStatus,
    Error, HardwarePort, IoStatus, Latency, LoopbackBackend, Result, SampleFormat,
    SampleSlice, SampleSliceMut, Samples, StopReason, StreamConfig, TimeInfo,
};

#[cfg(feature = "cpal")]
pub use ponte_core::CpalBackend;

/// Re-export of the kernel crate.
pub use ponte_core as core;

/// Common imports for hosts embedding the driver.
pub mod prelude {
    pub use crate::{
        AudioProcessor, BufferLayout, Capabilities, Cycle, DeviceInfo, DriverEvent,
        DriverState, Latency, PonteDriver, PonteDriverBuilder, SampleFormat, SampleSlice,
        SampleSliceMut, StopReason, StreamConfig, TimeInfo,
    };
}
