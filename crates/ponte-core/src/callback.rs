//! Host callback contract.

use crate::buffer::{BufferMut, BufferRef};
use crate::config::{Latency, StreamConfig};
use crate::timing::TimeInfo;

/// One buffer period as seen by the host.
pub struct Cycle<'a> {
    /// Captured input in the negotiated format and layout; a zero-channel
    /// view when the stream has no inputs.
    pub input: BufferRef<'a>,
    /// Output scratch to fill, pre-set to silence.
    pub output: BufferMut<'a>,
    /// Frames covered by this cycle; equals the effective
    /// `config.buffer_frames`.
    pub frames: u32,
    /// Timing snapshot for this cycle. Fault counts are since the previous
    /// cycle and reported exactly once.
    pub time: TimeInfo,
    /// The effective stream configuration negotiated at start.
    pub config: &'a StreamConfig,
}

/// Implemented by the host application consuming the driver.
pub trait AudioProcessor: Send + 'static {
    /// Called once per buffer period on the driver's realtime thread.
    ///
    /// This runs on the `ponte-rt` thread: no allocation, locks, blocking
    /// I/O or logging. Return `false` to request an orderly stop, identical
    /// to calling `stop` from the control thread.
    fn process(&mut self, cycle: Cycle<'_>) -> bool;

    /// Latency figures changed after a reconfiguration. Invoked from the
    /// control thread, never mid-cycle.
    fn latency_changed(&mut self, _latency: Latency) {}

    /// The device asks the host to re-open or re-negotiate. Invoked from
    /// the control thread, never mid-cycle.
    fn reset_request(&mut self) {}
}
