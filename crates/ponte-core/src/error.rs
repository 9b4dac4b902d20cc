//! Error types for ponte-core.

use thiserror::Error;

use crate::driver::DriverState;

/// Error type for driver operations.
///
/// Every variant maps onto one of the stable negative result codes of the
/// driver contract via [`Error::code`]; success is simply the absence of an
/// error.
#[derive(Error, Debug)]
pub enum Error {
    /// Unclassified failure.
    #[error("{0}")]
    Generic(String),

    /// The device lacks the capability required by the request.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    /// Malformed or unsupported request parameters. Caller error; no state
    /// change has occurred.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Device acquisition or enumeration failed.
    #[error("device error: {0}")]
    Device(String),

    /// Runtime I/O failure during or around streaming.
    #[error("backend error: {0}")]
    Backend(String),

    /// The operation is not valid in the current lifecycle state. No state
    /// change has occurred.
    #[error("{op} is not valid while {state:?}")]
    State {
        op: &'static str,
        state: DriverState,
    },

    #[cfg(feature = "cpal")]
    #[error("failed to enumerate devices")]
    Devices(#[from] cpal::DevicesError),

    #[cfg(feature = "cpal")]
    #[error("failed to query device name")]
    DeviceName(#[from] cpal::DeviceNameError),

    #[cfg(feature = "cpal")]
    #[error("failed to query default stream config")]
    DefaultStreamConfig(#[from] cpal::DefaultStreamConfigError),

    #[cfg(feature = "cpal")]
    #[error("failed to build audio stream")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[cfg(feature = "cpal")]
    #[error("failed to play audio stream")]
    PlayStream(#[from] cpal::PlayStreamError),
}

impl Error {
    /// Stable negative contract code for this error.
    ///
    /// `0` is reserved for success and never returned here.
    pub fn code(&self) -> i32 {
        match self {
            Error::Generic(_) => -1,
            Error::Unsupported(_) => -2,
            Error::InvalidArgument(_) => -3,
            Error::Device(_) => -4,
            Error::Backend(_) => -5,
            Error::State { .. } => -6,
            #[cfg(feature = "cpal")]
            Error::Devices(_) | Error::DeviceName(_) | Error::DefaultStreamConfig(_) => -4,
            #[cfg(feature = "cpal")]
            Error::BuildStream(_) | Error::PlayStream(_) => -5,
        }
    }
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
