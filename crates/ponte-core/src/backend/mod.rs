//! Built-in device backends.

mod loopback;
pub use loopback::LoopbackBackend;

#[cfg(feature = "cpal")]
mod cpal;
#[cfg(feature = "cpal")]
pub use self::cpal::CpalBackend;
