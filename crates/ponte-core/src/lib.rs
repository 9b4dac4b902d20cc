//! Realtime audio driver kernel: device lifecycle, stream engine, format
//! conversion, and timing/fault accounting.
//!
//! # Primary API
//!
//! - [`Driver`]: the lifecycle controller
//!   (`Closed → Opened → Configured → Streaming`)
//! - [`AudioProcessor`]: the host's realtime callback contract
//! - [`Backend`] / [`HardwarePort`]: the seam a hardware backend implements
//! - [`StreamConfig`] / [`Capabilities`] / [`TimeInfo`]: the negotiated
//!   contract types
//!
//! # Feature-gated APIs
//!
//! - `"cpal"`: [`CpalBackend`] system-audio backend
//!
//! # Example
//!
//! ```
//! use ponte_core::{AudioProcessor, Cycle, Driver, LoopbackBackend};
//!
//! struct Silence;
//!
//! impl AudioProcessor for Silence {
//!     fn process(&mut self, _cycle: Cycle<'_>) -> bool {
//!         true
//!     }
//! }
//!
//! let driver = Driver::new(Box::new(LoopbackBackend::new()), Box::new(Silence));
//! let handle = driver.open(None)?;
//! assert!(handle.as_i32() >= 0);
//! let config = driver.default_config()?;
//! let effective = driver.start(&config)?;
//! assert_eq!(effective.sample_rate, 48000);
//! driver.stop()?;
//! driver.close()?;
//! # Ok::<(), ponte_core::Error>(())
//! ```

pub mod error;
pub use error::{Error, Result};

mod config;
pub use config::{BufferLayout, Capabilities, DeviceInfo, Latency, SampleFormat, StreamConfig};

mod buffer;
pub use buffer::{BufferMut, BufferRef, Samples, SampleSlice, SampleSliceMut};

pub mod convert;

mod timing;
pub use timing::{FaultCounters, TimeInfo, TimingTracker};

mod callback;
pub use callback::{AudioProcessor, Cycle};

mod port;
pub use port::{Backend, CycleStart, HardwarePort, IoStatus};

pub mod backend;
pub use backend::LoopbackBackend;

#[cfg(feature = "cpal")]
pub use backend::CpalBackend;

mod session;
pub use session::DeviceHandle;

mod stream;
pub use stream::StopReason;

mod driver;
pub use driver::{Driver, DriverEvent, DriverState, DriverStatus};

pub(crate) mod lockfree;
pub use lockfree::{AtomicFlag, SaturatingCounter};
