//! Lifecycle state machine tests.
//!
//! Every operation attempted from an invalid state must fail with a state
//! error and leave the state unchanged; the happy path walks
//! `Closed → Opened → Configured → Streaming` and back.

mod helpers;

use std::sync::atomic::Ordering;
use std::time::Duration;

use helpers::{fast_duplex_config, init_tracing, wait_until, CollectingProcessor};
use ponte::prelude::*;
use ponte::{Error, PonteDriver};

fn collecting_driver() -> (PonteDriver, std::sync::Arc<std::sync::atomic::AtomicU32>) {
    let (processor, _records, cycles, _reset) = CollectingProcessor::new(0.0);
    let driver = PonteDriver::builder().processor(processor).build().unwrap();
    (driver, cycles)
}

// =============================================================================
// Happy path
// =============================================================================

/// open("default") -> default config -> start -> 100 callbacks -> stop ->
/// close, checking every intermediate state.
#[test]
fn test_full_session_scenario() {
    init_tracing();
    let (driver, cycles) = collecting_driver();

    let handle = driver.open_default().unwrap();
    assert!(handle.as_i32() >= 0);
    assert_eq!(driver.state(), DriverState::Opened);

    let config = driver.default_config().unwrap();
    assert_eq!(config.sample_rate, 48000);
    assert_eq!(config.buffer_frames, 256);
    assert!(config.out_channels > 0);

    let mut requested = config;
    requested.buffer_frames = 64;
    let effective = driver.start(&requested).unwrap();
    assert_eq!(driver.state(), DriverState::Streaming);
    assert_eq!(effective.buffer_frames, 64);

    assert!(
        wait_until(Duration::from_secs(10), || {
            cycles.load(Ordering::Acquire) >= 100
        }),
        "expected 100 callbacks"
    );

    driver.stop().unwrap();
    assert_eq!(driver.state(), DriverState::Opened);

    driver.close().unwrap();
    assert_eq!(driver.state(), DriverState::Closed);
}

// =============================================================================
// Invalid-state transitions
// =============================================================================

#[test]
fn test_operations_before_open_fail_with_state_error() {
    let (driver, _) = collecting_driver();

    assert!(matches!(
        driver.start(&fast_duplex_config()),
        Err(Error::State { .. })
    ));
    assert!(matches!(driver.default_config(), Err(Error::State { .. })));
    assert!(matches!(driver.latency(), Err(Error::State { .. })));
    assert!(matches!(driver.stop(), Err(Error::State { .. })));
    assert!(matches!(driver.close(), Err(Error::State { .. })));
    assert!(matches!(
        driver.set_sample_rate(48000),
        Err(Error::State { .. })
    ));
    assert_eq!(driver.state(), DriverState::Closed);
}

#[test]
fn test_start_twice_fails_and_leaves_stream_running() {
    let (driver, cycles) = collecting_driver();
    driver.open_default().unwrap();
    driver.start(&fast_duplex_config()).unwrap();

    assert!(matches!(
        driver.start(&fast_duplex_config()),
        Err(Error::State { .. })
    ));
    assert_eq!(driver.state(), DriverState::Streaming);

    // The first session keeps running until the explicit stop.
    let before = cycles.load(Ordering::Acquire);
    assert!(wait_until(Duration::from_secs(5), || {
        cycles.load(Ordering::Acquire) > before
    }));
    driver.stop().unwrap();
}

#[test]
fn test_stop_is_idempotent() {
    let (driver, _) = collecting_driver();
    driver.open_default().unwrap();
    driver.start(&fast_duplex_config()).unwrap();

    driver.stop().unwrap();
    assert_eq!(driver.state(), DriverState::Opened);
    // Second stop is a documented no-op with identical observable state.
    driver.stop().unwrap();
    assert_eq!(driver.state(), DriverState::Opened);
}

#[test]
fn test_close_while_streaming_is_rejected() {
    let (driver, _) = collecting_driver();
    driver.open_default().unwrap();
    driver.start(&fast_duplex_config()).unwrap();

    assert!(matches!(driver.close(), Err(Error::State { .. })));
    assert_eq!(driver.state(), DriverState::Streaming);
    driver.stop().unwrap();
    driver.close().unwrap();
}

#[test]
fn test_reconfigure_while_streaming_is_rejected() {
    let (driver, _) = collecting_driver();
    driver.open_default().unwrap();
    driver.start(&fast_duplex_config()).unwrap();

    // Capability flags do not matter here; streaming always rejects.
    assert!(matches!(
        driver.set_buffer_frames(128),
        Err(Error::State { .. })
    ));
    assert!(matches!(
        driver.set_sample_rate(44100),
        Err(Error::State { .. })
    ));
    assert_eq!(driver.state(), DriverState::Streaming);
    driver.stop().unwrap();
}

// =============================================================================
// Negotiation and capabilities
// =============================================================================

#[test]
fn test_channels_and_format_are_never_silently_altered() {
    let (driver, _) = collecting_driver();
    driver.open_default().unwrap();

    let mut requested = fast_duplex_config();
    requested.in_channels = 1;
    requested.out_channels = 4;
    requested.format = SampleFormat::I16;
    requested.layout = BufferLayout::NonInterleaved;
    let effective = driver.start(&requested).unwrap();
    assert_eq!(effective.in_channels, 1);
    assert_eq!(effective.out_channels, 4);
    assert_eq!(effective.format, SampleFormat::I16);
    assert_eq!(effective.layout, BufferLayout::NonInterleaved);
    driver.stop().unwrap();
}

#[test]
fn test_rate_and_frames_may_be_adjusted() {
    let (driver, _) = collecting_driver();
    driver.open_default().unwrap();

    let mut requested = fast_duplex_config();
    requested.sample_rate = 47_000; // unsupported, nearest is 48000
    requested.buffer_frames = 5; // below the device minimum
    let effective = driver.start(&requested).unwrap();
    assert_eq!(effective.sample_rate, 48000);
    assert!(effective.buffer_frames >= 16);
    driver.stop().unwrap();
}

#[test]
fn test_capability_gated_input_is_rejected() {
    let (driver, _) = collecting_driver();
    driver.open("silence").unwrap();
    let caps = driver.capabilities().unwrap();
    assert!(caps.contains(Capabilities::OUTPUT));
    assert!(!caps.contains(Capabilities::INPUT));

    let mut requested = driver.default_config().unwrap();
    requested.in_channels = 2;
    assert!(matches!(
        driver.start(&requested),
        Err(Error::Unsupported(_))
    ));
    assert_eq!(driver.state(), DriverState::Opened);
}

#[test]
fn test_reconfiguration_updates_latency_and_state() {
    let (driver, _) = collecting_driver();
    driver.open_default().unwrap();
    assert!(matches!(driver.latency(), Err(Error::State { .. })));

    driver.set_buffer_frames(512).unwrap();
    assert_eq!(driver.state(), DriverState::Configured);
    let latency = driver.latency().unwrap();
    assert_eq!(latency.input, Some(512));
    assert_eq!(latency.output, Some(512));
}

#[test]
fn test_invalid_config_is_rejected_without_state_change() {
    let (driver, _) = collecting_driver();
    driver.open_default().unwrap();

    let mut requested = fast_duplex_config();
    requested.in_channels = 0;
    requested.out_channels = 0;
    assert!(matches!(
        driver.start(&requested),
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(driver.state(), DriverState::Opened);
}

// =============================================================================
// Enumeration
// =============================================================================

#[test]
fn test_enumeration_lists_and_signals_truncation() {
    let (driver, _) = collecting_driver();
    let devices = driver.devices().unwrap();
    let names: Vec<_> = devices.iter().map(|d| d.name.as_str()).collect();
    assert!(names.contains(&"loopback"));
    assert!(names.contains(&"silence"));

    let mut buf = [0u8; 128];
    let written = driver.enumerate_into(&mut buf).unwrap();
    assert_eq!(&buf[..written], b"loopback\nsilence\n");

    let mut tiny = [0u8; 3];
    assert!(matches!(
        driver.enumerate_into(&mut tiny),
        Err(Error::InvalidArgument(_))
    ));
}
