//! System-audio backend over CPAL.
//!
//! CPAL pushes callbacks from its own device thread while the stream engine
//! pulls, so the port bridges the two with an SPSC ring sized at four
//! periods: `wait_cycle` blocks until the ring can absorb one period and
//! the device callback drains it. Render-only; capture is reserved.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use ringbuf::{traits::*, HeapProd, HeapRb};

use crate::buffer::{SampleSlice, SampleSliceMut};
use crate::config::{BufferLayout, Capabilities, DeviceInfo, Latency, SampleFormat, StreamConfig};
use crate::port::{Backend, CycleStart, HardwarePort, IoStatus};
use crate::{Error, Result};

const MIN_FRAMES: u32 = 16;
const MAX_FRAMES: u32 = 8192;

fn caps() -> Capabilities {
    Capabilities::OUTPUT | Capabilities::SET_SAMPLE_RATE | Capabilities::SET_BUFFER_FRAMES
}

/// Backend enumerating the host's output devices.
#[derive(Debug, Default)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn devices(&self) -> Result<Vec<DeviceInfo>> {
        let host = cpal::default_host();
        let mut devices = Vec::new();
        for device in host.output_devices()? {
            devices.push(DeviceInfo {
                name: device.name()?,
                capabilities: caps(),
            });
        }
        Ok(devices)
    }

    fn open(&self, name: Option<&str>) -> Result<Box<dyn HardwarePort>> {
        let host = cpal::default_host();
        let device = match name {
            None => host
                .default_output_device()
                .ok_or_else(|| Error::Device("no default output device".into()))?,
            Some(needle) => host
                .output_devices()?
                .find(|d| d.name().map(|n| n == needle).unwrap_or(false))
                .ok_or_else(|| Error::Device(format!("unknown device: {needle}")))?,
        };
        let name = device.name()?;
        Ok(Box::new(CpalPort {
            device,
            name,
            config: None,
            stream: None,
            prod: None,
            underflowed: Arc::new(AtomicBool::new(false)),
            error: Arc::new(Mutex::new(None)),
        }))
    }
}

/// Wrapper to hold a `cpal::Stream` in a `Send` context.
///
/// `cpal::Stream` is `!Send` due to platform internals. This is safe
/// because the port is exclusively owned — by the control thread between
/// `open_stream` and engine spawn, then by the `ponte-rt` thread until the
/// engine exits — so the stream is never touched from two threads at once.
struct StreamGuard(#[allow(dead_code)] cpal::Stream);

// SAFETY: see StreamGuard docs; ownership hands the whole port between
// threads, never sharing it.
unsafe impl Send for StreamGuard {}

struct CpalPort {
    device: cpal::Device,
    name: String,
    config: Option<StreamConfig>,
    stream: Option<StreamGuard>,
    prod: Option<HeapProd<f32>>,
    /// Set by the device callback whenever it ran dry.
    underflowed: Arc<AtomicBool>,
    /// Set by the cpal error callback from its own thread.
    error: Arc<Mutex<Option<String>>>,
}

impl CpalPort {
    fn take_error(&self) -> Option<String> {
        self.error.lock().take()
    }
}

impl HardwarePort for CpalPort {
    fn device_name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        caps()
    }

    fn default_config(&self) -> StreamConfig {
        let (sample_rate, out_channels) = match self.device.default_output_config() {
            Ok(config) => (config.sample_rate().0, config.channels()),
            Err(_) => (48000, 2),
        };
        StreamConfig {
            sample_rate,
            buffer_frames: 256,
            in_channels: 0,
            out_channels,
            format: SampleFormat::F32,
            layout: BufferLayout::Interleaved,
        }
    }

    fn native_format(&self) -> SampleFormat {
        SampleFormat::F32
    }

    fn negotiate(&self, requested: &StreamConfig) -> Result<StreamConfig> {
        if requested.in_channels > 0 {
            return Err(Error::Unsupported("capture is reserved on the cpal backend"));
        }
        let ranges: Vec<_> = self
            .device
            .supported_output_configs()
            .map_err(|e| Error::Device(e.to_string()))?
            .filter(|range| range.channels() == requested.out_channels)
            .collect();
        if ranges.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "device does not support {} output channels",
                requested.out_channels
            )));
        }

        let mut effective = *requested;
        effective.buffer_frames = requested.buffer_frames.clamp(MIN_FRAMES, MAX_FRAMES);
        if !ranges.iter().any(|range| {
            (range.min_sample_rate().0..=range.max_sample_rate().0)
                .contains(&requested.sample_rate)
        }) {
            // Clamp into the nearest supported range.
            effective.sample_rate = ranges
                .iter()
                .map(|range| {
                    requested
                        .sample_rate
                        .clamp(range.min_sample_rate().0, range.max_sample_rate().0)
                })
                .min_by_key(|rate| rate.abs_diff(requested.sample_rate))
                .unwrap_or(requested.sample_rate);
        }
        Ok(effective)
    }

    fn open_stream(&mut self, config: &StreamConfig) -> Result<()> {
        let samples = config.out_samples();
        let (mut prod, mut cons) = HeapRb::<f32>::new(samples * 4).split();
        // One period of silence keeps the device fed through spin-up.
        for _ in 0..samples {
            let _ = prod.try_push(0.0);
        }

        let underflowed = self.underflowed.clone();
        let error = self.error.clone();
        let stream_config = cpal::StreamConfig {
            channels: config.out_channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let stream = self.device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let got = cons.pop_slice(data);
                if got < data.len() {
                    data[got..].fill(0.0);
                    underflowed.store(true, Ordering::Release);
                }
            },
            move |err| {
                *error.lock() = Some(err.to_string());
            },
            None,
        )?;
        stream.play()?;

        self.prod = Some(prod);
        self.stream = Some(StreamGuard(stream));
        self.underflowed.store(false, Ordering::Release);
        self.config = Some(*config);
        Ok(())
    }

    fn close_stream(&mut self) {
        self.stream = None;
        self.prod = None;
        self.config = None;
    }

    fn wait_cycle(&mut self) -> Result<CycleStart> {
        let config = self
            .config
            .ok_or_else(|| Error::Backend("stream not armed".into()))?;
        let need = config.out_samples();
        let period = config.period();
        let nap = (period / 8).max(Duration::from_micros(500));
        let stall_deadline = Instant::now() + period.mul_f32(8.0).max(Duration::from_millis(500));

        let Some(prod) = self.prod.as_ref() else {
            return Err(Error::Backend("stream not armed".into()));
        };
        // Behind by a full period or more on entry: the device drained
        // faster than we produced.
        let late = prod.vacant_len() >= need * 2;
        loop {
            if let Some(message) = self.take_error() {
                return Err(Error::Backend(message));
            }
            let Some(prod) = self.prod.as_ref() else {
                return Err(Error::Backend("stream not armed".into()));
            };
            if prod.vacant_len() >= need {
                return Ok(CycleStart { late });
            }
            if Instant::now() >= stall_deadline {
                return Err(Error::Backend("output device stalled".into()));
            }
            thread::sleep(nap);
        }
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

    fn write_output(&mut self, src: SampleSlice<'_>) -> Result<IoStatus> {
        let SampleSlice::F32(src) = src else {
            return Err(Error::Backend("cpal backend exchanges F32 samples".into()));
        };
        let Some(prod) = self.prod.as_mut() else {
            return Err(Error::Backend("stream not armed".into()));
        };
        let pushed = prod.push_slice(src);
        let ran_dry = self.underflowed.swap(false, Ordering::AcqRel);
        Ok(if pushed < src.len() || ran_dry {
            IoStatus::Xrun
        } else {
            IoStatus::Complete
        })
    }

    fn latency(&self, config: &StreamConfig) -> Latency {
        // Ring depth only; device-internal latency is not visible here.
        Latency {
            input: None,
            output: Some(config.buffer_frames * 2),
        }
    }
}
