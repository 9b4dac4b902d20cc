//! Virtual loopback backend: deterministic devices for tests and headless
//! hosts.
//!
//! Two devices:
//! - `loopback` (default): full duplex. Everything written to the output
//!   comes back on every input channel one period later, mixed to mono
//!   through an SPSC ring. Native format is I16 so both converter
//!   directions are exercised on a real data path.
//! - `silence`: output-only sink with no reconfiguration capabilities and
//!   no clock/latency reporting; useful for capability-rejection paths.

use std::thread;
use std::time::{Duration, Instant};

use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};

use crate::buffer::{SampleSlice, SampleSliceMut};
use crate::config::{BufferLayout, Capabilities, DeviceInfo, Latency, SampleFormat, StreamConfig};
use crate::port::{Backend, CycleStart, HardwarePort, IoStatus};
use crate::{Error, Result};

const LOOPBACK: &str = "loopback";
const SILENCE: &str = "silence";

const SUPPORTED_RATES: &[u32] = &[
    8000, 11025, 16000, 22050, 32000, 44100, 48000, 88200, 96000, 176400, 192000,
];
const MIN_FRAMES: u32 = 16;
const MAX_FRAMES: u32 = 8192;
const MAX_CHANNELS: u16 = 16;

/// Backend exposing the built-in virtual devices.
#[derive(Debug, Default)]
pub struct LoopbackBackend;

impl LoopbackBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for LoopbackBackend {
    fn name(&self) -> &'static str {
        "loopback"
    }

    fn devices(&self) -> Result<Vec<DeviceInfo>> {
        Ok(vec![
            DeviceInfo {
                name: LOOPBACK.to_string(),
                capabilities: Capabilities::all(),
            },
            DeviceInfo {
                name: SILENCE.to_string(),
                capabilities: Capabilities::OUTPUT,
            },
        ])
    }

    fn open(&self, name: Option<&str>) -> Result<Box<dyn HardwarePort>> {
        match name {
            None | Some("") | Some(LOOPBACK) => Ok(Box::new(LoopbackPort::new())),
            Some(SILENCE) => Ok(Box::new(SilencePort::new())),
            Some(other) => Err(Error::Device(format!("unknown device: {other}"))),
        }
    }
}

/// Absolute-deadline period timer shared by the virtual devices.
#[derive(Debug)]
struct PeriodClock {
    period: Duration,
    next: Instant,
}

impl PeriodClock {
    fn new(period: Duration) -> Self {
        Self {
            period,
            next: Instant::now() + period,
        }
    }

    fn wait(&mut self) -> CycleStart {
        let now = Instant::now();
        if now >= self.next + self.period {
            // A whole period behind: resynchronize instead of bursting.
            self.next = now + self.period;
            return CycleStart { late: true };
        }
        if now < self.next {
            thread::sleep(self.next - now);
        }
        self.next += self.period;
        CycleStart { late: false }
    }
}

fn nearest_rate(requested: u32) -> u32 {
    SUPPORTED_RATES
        .iter()
        .copied()
        .min_by_key(|r| r.abs_diff(requested))
        .unwrap_or(48000)
}

fn check_channels(config: &StreamConfig) -> Result<()> {
    if config.in_channels > MAX_CHANNELS || config.out_channels > MAX_CHANNELS {
        return Err(Error::InvalidArgument(format!(
            "at most {MAX_CHANNELS} channels per direction, requested {}in/{}out",
            config.in_channels, config.out_channels
        )));
    }
    Ok(())
}

/// Full-duplex virtual device echoing output back to input.
struct LoopbackPort {
    config: Option<StreamConfig>,
    clock: Option<PeriodClock>,
    echo_prod: Option<HeapProd<i16>>,
    echo_cons: Option<HeapCons<i16>>,
    frames_elapsed: u64,
}

impl LoopbackPort {
    fn new() -> Self {
        Self {
            config: None,
            clock: None,
            echo_prod: None,
            echo_cons: None,
            frames_elapsed: 0,
        }
    }
}

impl HardwarePort for LoopbackPort {
    fn device_name(&self) -> &str {
        LOOPBACK
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    fn default_config(&self) -> StreamConfig {
        StreamConfig {
            sample_rate: 48000,
            buffer_frames: 256,
            in_channels: 2,
            out_channels: 2,
            format: SampleFormat::F32,
            layout: BufferLayout::Interleaved,
        }
    }

    fn native_format(&self) -> SampleFormat {
        SampleFormat::I16
    }

    fn negotiate(&self, requested: &StreamConfig) -> Result<StreamConfig> {
        check_channels(requested)?;
        let mut effective = *requested;
        effective.sample_rate = nearest_rate(requested.sample_rate);
        effective.buffer_frames = requested.buffer_frames.clamp(MIN_FRAMES, MAX_FRAMES);
        Ok(effective)
    }

    fn open_stream(&mut self, config: &StreamConfig) -> Result<()> {
        let frames = config.buffer_frames as usize;
        let (mut prod, cons) = HeapRb::<i16>::new(frames * 4).split();
        // One period of silence so the echo lags exactly one buffer.
        for _ in 0..frames {
            let _ = prod.try_push(0);
        }
        self.echo_prod = Some(prod);
        self.echo_cons = Some(cons);
        self.clock = Some(PeriodClock::new(config.period()));
        self.frames_elapsed = 0;
        self.config = Some(*config);
        Ok(())
    }

    fn close_stream(&mut self) {
        self.config = None;
        self.clock = None;
        self.echo_prod = None;
        self.echo_cons = None;
    }

    fn wait_cycle(&mut self) -> Result<CycleStart> {
        let clock = self
            .clock
            .as_mut()
            .ok_or_else(|| Error::Backend("stream not armed".into()))?;
        let start = clock.wait();
        if let Some(config) = &self.config {
            self.frames_elapsed += config.buffer_frames as u64;
        }
        Ok(start)
    }

    fn read_input(&mut self, dst: SampleSliceMut<'_>) -> Result<IoStatus> {
        let config = self
            .config
            .ok_or_else(|| Error::Backend("stream not armed".into()))?;
        let SampleSliceMut::I16(dst) = dst else {
            return Err(Error::Backend("loopback exchanges I16 samples".into()));
        };
        let cons = self
            .echo_cons
            .as_mut()
            .ok_or_else(|| Error::Backend("stream not armed".into()))?;

        let channels = config.in_channels as usize;
        let mut short = false;
        for frame in dst.chunks_mut(channels.max(1)) {
            let sample = if config.out_channels == 0 {
                // Nothing feeds the echo; input-only sessions capture silence.
                0
            } else {
                match cons.try_pop() {
                    Some(s) => s,
                    None => {
                        short = true;
                        0
                    }
                }
            };
            frame.fill(sample);
        }
        Ok(if short {
            IoStatus::Xrun
        } else {
            IoStatus::Complete
        })
    }

    fn write_output(&mut self, src: SampleSlice<'_>) -> Result<IoStatus> {
        let config = self
            .config
            .ok_or_else(|| Error::Backend("stream not armed".into()))?;
        let SampleSlice::I16(src) = src else {
            return Err(Error::Backend("loopback exchanges I16 samples".into()));
        };
        let prod = self
            .echo_prod
            .as_mut()
            .ok_or_else(|| Error::Backend("stream not armed".into()))?;

        let channels = config.out_channels as usize;
        let mut full = false;
        for frame in src.chunks(channels.max(1)) {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            let mono = (sum / channels.max(1) as i32) as i16;
            if prod.try_push(mono).is_err() {
                full = true;
            }
        }
        Ok(if full { IoStatus::Xrun } else { IoStatus::Complete })
    }

    fn device_time_ns(&self) -> u64 {
        match &self.config {
            Some(config) => {
                (self.frames_elapsed as u128 * 1_000_000_000 / config.sample_rate as u128) as u64
            }
            None => 0,
        }
    }

    fn latency(&self, config: &StreamConfig) -> Latency {
        Latency {
            input: (config.in_channels > 0).then_some(config.buffer_frames),
            output: (config.out_channels > 0).then_some(config.buffer_frames),
        }
    }
}

/// Output-only sink that discards everything.
struct SilencePort {
    config: Option<StreamConfig>,
    clock: Option<PeriodClock>,
}

impl SilencePort {
    fn new() -> Self {
        Self {
            config: None,
            clock: None,
        }
    }
}

impl HardwarePort for SilencePort {
    fn device_name(&self) -> &str {
        SILENCE
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::OUTPUT
    }

    fn default_config(&self) -> StreamConfig {
        StreamConfig {
            sample_rate: 48000,
            buffer_frames: 256,
            in_channels: 0,
            out_channels: 2,
            format: SampleFormat::F32,
            layout: BufferLayout::Interleaved,
        }
    }

    fn native_format(&self) -> SampleFormat {
        SampleFormat::F32
    }

    fn negotiate(&self, requested: &StreamConfig) -> Result<StreamConfig> {
        check_channels(requested)?;
        if requested.in_channels > 0 {
            return Err(Error::Unsupported("silence device has no inputs"));
        }
        let mut effective = *requested;
        effective.sample_rate = nearest_rate(requested.sample_rate);
        effective.buffer_frames = requested.buffer_frames.clamp(MIN_FRAMES, MAX_FRAMES);
        Ok(effective)
    }

    fn open_stream(&mut self, config: &StreamConfig) -> Result<()> {
        self.clock = Some(PeriodClock::new(config.period()));
        self.config = Some(*config);
        Ok(())
    }

    fn close_stream(&mut self) {
        self.config = None;
        self.clock = None;
    }

    fn wait_cycle(&mut self) -> Result<CycleStart> {
        let clock = self
            .clock
            .as_mut()
            .ok_or_else(|| Error::Backend("stream not armed".into()))?;
        Ok(clock.wait())
    }

    fn read_input(&mut self, dst: SampleSliceMut<'_>) -> Result<IoStatus> {
        // No inputs exist; fill silence defensively.
        match dst {
            SampleSliceMut::F32(d) => d.fill(0.0),
            SampleSliceMut::I16(d) => d.fill(0),
            SampleSliceMut::U16(d) => d.fill(32768),
        }
        Ok(IoStatus::Complete)
    }

    fn write_output(&mut self, _src: SampleSlice<'_>) -> Result<IoStatus> {
        Ok(IoStatus::Complete)
    }

    fn latency(&self, _config: &StreamConfig) -> Latency {
        // A discarding sink has no meaningful latency to report.
        Latency::unknown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duplex_config(frames: u32) -> StreamConfig {
        StreamConfig {
            sample_rate: 48000,
            buffer_frames: frames,
            in_channels: 2,
            out_channels: 2,
            format: SampleFormat::F32,
            layout: BufferLayout::Interleaved,
        }
    }

    #[test]
    fn test_negotiate_adjusts_rate_and_frames() {
        let port = LoopbackPort::new();
        let mut requested = duplex_config(10_000);
        requested.sample_rate = 47_000;
        let effective = port.negotiate(&requested).unwrap();
        assert_eq!(effective.sample_rate, 48000);
        assert_eq!(effective.buffer_frames, MAX_FRAMES);
        // Channels, format, layout are untouched.
        assert_eq!(effective.in_channels, requested.in_channels);
        assert_eq!(effective.format, requested.format);
        assert_eq!(effective.layout, requested.layout);
    }

    #[test]
    fn test_negotiate_rejects_channel_overflow() {
        let port = LoopbackPort::new();
        let mut requested = duplex_config(256);
        requested.in_channels = MAX_CHANNELS + 1;
        assert!(port.negotiate(&requested).is_err());
    }

    #[test]
    fn test_echo_arrives_one_period_late() {
        let mut port = LoopbackPort::new();
        let config = duplex_config(4);
        port.open_stream(&config).unwrap();

        let out = [100i16; 8];
        let mut inp = [0i16; 8];

        // First read sees the silence prefill.
        port.write_output(SampleSlice::I16(&out)).unwrap();
        port.read_input(SampleSliceMut::I16(&mut inp)).unwrap();
        assert_eq!(inp, [0i16; 8]);

        // Second read sees the first period's (mono-mixed) output.
        port.write_output(SampleSlice::I16(&out)).unwrap();
        port.read_input(SampleSliceMut::I16(&mut inp)).unwrap();
        assert_eq!(inp, [100i16; 8]);
    }

    #[test]
    fn test_device_clock_tracks_cycles() {
        let mut port = LoopbackPort::new();
        let mut config = duplex_config(16);
        config.sample_rate = 8000;
        port.open_stream(&config).unwrap();
        assert_eq!(port.device_time_ns(), 0);
        port.wait_cycle().unwrap();
        assert_eq!(port.device_time_ns(), 16 * 1_000_000_000 / 8000);
    }

    #[test]
    fn test_silence_rejects_inputs_and_reports_unknown_latency() {
        let port = SilencePort::new();
        let mut requested = port.default_config();
        requested.in_channels = 2;
        assert!(matches!(
            port.negotiate(&requested),
            Err(Error::Unsupported(_))
        ));
        assert_eq!(
            port.latency(&port.default_config()),
            Latency::unknown()
        );
        assert_eq!(port.device_time_ns(), 0);
    }
}
