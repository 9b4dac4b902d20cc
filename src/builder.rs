//! Builder for configuring and constructing a [`PonteDriver`].

use ponte_core::{AudioProcessor, Backend, Driver, Error, LoopbackBackend, Result};

use crate::PonteDriver;

/// Configures the backend and host processor for a [`PonteDriver`].
///
/// The processor is mandatory; the backend defaults to the built-in
/// virtual [`LoopbackBackend`].
///
/// # Example
///
/// ```ignore
/// let driver = PonteDriver::builder()
///     .processor(MyProcessor::new())
///     .build()?;
/// ```
#[derive(Default)]
pub struct PonteDriverBuilder {
    backend: Option<Box<dyn Backend>>,
    processor: Option<Box<dyn AudioProcessor>>,
}

impl PonteDriverBuilder {
    /// Use a specific hardware backend.
    pub fn backend(mut self, backend: impl Backend) -> Self {
        self.backend = Some(Box::new(backend));
        self
    }

    /// Use the system-audio backend (CPAL).
    #[cfg(feature = "cpal")]
    pub fn system_audio(mut self) -> Self {
        self.backend = Some(Box::new(ponte_core::CpalBackend::new()));
        self
    }

    /// The host's realtime processor. Required.
    pub fn processor(mut self, processor: impl AudioProcessor) -> Self {
        self.processor = Some(Box::new(processor));
        self
    }

    /// Build the driver in the `Closed` state.
    pub fn build(self) -> Result<PonteDriver> {
        let processor = self.processor.ok_or_else(|| {
            Error::InvalidArgument("a host processor is required; call .processor(..)".into())
        })?;
        let backend = self
            .backend
            .unwrap_or_else(|| Box::new(LoopbackBackend::new()));
        Ok(PonteDriver::from_inner(Driver::new(backend, processor)))
    }
}
