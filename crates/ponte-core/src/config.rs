//! Stream configuration, capabilities, latency figures, and device metadata.

use core::ops::BitOr;
use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Sample representation on the wire between driver and host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleFormat {
    /// 32-bit float in [-1, +1].
    F32,
    /// Signed 16-bit.
    I16,
    /// Unsigned 16-bit, silence at 32768.
    U16,
}

impl SampleFormat {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::F32 => 4,
            SampleFormat::I16 | SampleFormat::U16 => 2,
        }
    }
}

/// Memory layout of multi-channel buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferLayout {
    /// `frames * channels`, channels within each frame adjacent.
    Interleaved,
    /// Channel-major planes: plane `c` occupies `[c*frames, (c+1)*frames)`.
    NonInterleaved,
}

/// Negotiated streaming parameters.
///
/// `sample_rate` and `buffer_frames` are negotiable at `start`; channel
/// counts, format and layout are honored exactly or rejected. Immutable for
/// the duration of a streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Frames per callback; the driver may adjust toward hardware limits.
    pub buffer_frames: u32,
    pub in_channels: u16,
    pub out_channels: u16,
    pub format: SampleFormat,
    pub layout: BufferLayout,
}

impl StreamConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::InvalidArgument("sample_rate must be > 0".into()));
        }
        if self.buffer_frames == 0 {
            return Err(Error::InvalidArgument("buffer_frames must be > 0".into()));
        }
        if self.in_channels == 0 && self.out_channels == 0 {
            return Err(Error::InvalidArgument(
                "at least one of in_channels/out_channels must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Samples per input buffer (`buffer_frames * in_channels`).
    pub fn in_samples(&self) -> usize {
        self.buffer_frames as usize * self.in_channels as usize
    }

    /// Samples per output buffer (`buffer_frames * out_channels`).
    pub fn out_samples(&self) -> usize {
        self.buffer_frames as usize * self.out_channels as usize
    }

    /// Wall-clock duration of one buffer period.
    pub fn period(&self) -> Duration {
        Duration::from_nanos(
            self.buffer_frames as u64 * 1_000_000_000 / self.sample_rate.max(1) as u64,
        )
    }
}

/// Capability bitset of a device, fixed for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities(u32);

impl Capabilities {
    /// Device can render output.
    pub const OUTPUT: Capabilities = Capabilities(1 << 0);
    /// Device can capture input.
    pub const INPUT: Capabilities = Capabilities(1 << 1);
    /// Input and output may stream in the same session.
    pub const FULL_DUPLEX: Capabilities = Capabilities(1 << 2);
    /// `set_sample_rate` is available while stopped.
    pub const SET_SAMPLE_RATE: Capabilities = Capabilities(1 << 3);
    /// `set_buffer_frames` is available while stopped.
    pub const SET_BUFFER_FRAMES: Capabilities = Capabilities(1 << 4);

    pub const fn empty() -> Capabilities {
        Capabilities(0)
    }

    pub const fn all() -> Capabilities {
        Capabilities(
            Self::OUTPUT.0
                | Self::INPUT.0
                | Self::FULL_DUPLEX.0
                | Self::SET_SAMPLE_RATE.0
                | Self::SET_BUFFER_FRAMES.0,
        )
    }

    pub const fn union(self, other: Capabilities) -> Capabilities {
        Capabilities(self.0 | other.0)
    }

    /// True when every bit of `other` is present.
    pub fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        self.union(rhs)
    }
}

/// Per-direction latency in frames; `None` means the backend cannot report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Latency {
    pub input: Option<u32>,
    pub output: Option<u32>,
}

impl Latency {
    pub fn unknown() -> Latency {
        Latency::default()
    }
}

/// An enumerable device of one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub capabilities: Capabilities,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_out() -> StreamConfig {
        StreamConfig {
            sample_rate: 48000,
            buffer_frames: 256,
            in_channels: 0,
            out_channels: 2,
            format: SampleFormat::F32,
            layout: BufferLayout::Interleaved,
        }
    }

    #[test]
    fn test_validate_accepts_output_only() {
        assert!(stereo_out().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_fields() {
        let mut cfg = stereo_out();
        cfg.sample_rate = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = stereo_out();
        cfg.buffer_frames = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = stereo_out();
        cfg.in_channels = 0;
        cfg.out_channels = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_period_duration() {
        let cfg = stereo_out();
        // 256 frames at 48 kHz is 16/3 ms.
        let ns = cfg.period().as_nanos() as u64;
        assert_eq!(ns, 256 * 1_000_000_000 / 48000);
    }

    #[test]
    fn test_capability_bits() {
        let caps = Capabilities::OUTPUT | Capabilities::SET_SAMPLE_RATE;
        assert!(caps.contains(Capabilities::OUTPUT));
        assert!(!caps.contains(Capabilities::INPUT));
        assert!(!caps.contains(Capabilities::OUTPUT | Capabilities::INPUT));
        assert!(Capabilities::all().contains(caps));
        assert_eq!(Capabilities::empty().bits(), 0);
    }
}
