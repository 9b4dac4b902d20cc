//! Sample format and layout conversion.
//!
//! Float samples clamp to [-1, +1], scale by 32767 and round half to even on
//! the way to integers; integers divide by 32768 on the way back (U16 after
//! removing its +32768 bias). I16 and U16 interconvert exactly through the
//! bias flip. All functions run on caller-provided slices sized
//! `frames * channels` and never allocate.

use crate::buffer::{SampleSlice, SampleSliceMut};

#[inline]
fn sample_f32_to_i16(v: f32) -> i16 {
    (v.clamp(-1.0, 1.0) * 32767.0).round_ties_even() as i16
}

#[inline]
fn sample_i16_to_f32(v: i16) -> f32 {
    v as f32 / 32768.0
}

#[inline]
fn sample_f32_to_u16(v: f32) -> u16 {
    (sample_f32_to_i16(v) as i32 + 32768) as u16
}

#[inline]
fn sample_u16_to_f32(v: u16) -> f32 {
    (v as i32 - 32768) as f32 / 32768.0
}

#[inline]
fn sample_i16_to_u16(v: i16) -> u16 {
    (v as i32 + 32768) as u16
}

#[inline]
fn sample_u16_to_i16(v: u16) -> i16 {
    (v as i32 - 32768) as i16
}

macro_rules! convert_loop {
    ($src:expr, $dst:expr, $f:expr) => {{
        for (s, d) in $src.iter().zip($dst.iter_mut()) {
            *d = $f(*s);
        }
    }};
}

pub fn f32_to_i16(src: &[f32], dst: &mut [i16]) {
    convert_loop!(src, dst, sample_f32_to_i16)
}

pub fn i16_to_f32(src: &[i16], dst: &mut [f32]) {
    convert_loop!(src, dst, sample_i16_to_f32)
}

pub fn f32_to_u16(src: &[f32], dst: &mut [u16]) {
    convert_loop!(src, dst, sample_f32_to_u16)
}

pub fn u16_to_f32(src: &[u16], dst: &mut [f32]) {
    convert_loop!(src, dst, sample_u16_to_f32)
}

pub fn i16_to_u16(src: &[i16], dst: &mut [u16]) {
    convert_loop!(src, dst, sample_i16_to_u16)
}

pub fn u16_to_i16(src: &[u16], dst: &mut [i16]) {
    convert_loop!(src, dst, sample_u16_to_i16)
}

/// Convert between any two wire formats. `src` and `dst` must have equal
/// length; same-format pairs degenerate to a copy.
pub fn convert(src: SampleSlice<'_>, dst: SampleSliceMut<'_>) {
    debug_assert_eq!(src.len(), dst.len());
    match (src, dst) {
        (SampleSlice::F32(s), SampleSliceMut::F32(d)) => d.copy_from_slice(s),
        (SampleSlice::I16(s), SampleSliceMut::I16(d)) => d.copy_from_slice(s),
        (SampleSlice::U16(s), SampleSliceMut::U16(d)) => d.copy_from_slice(s),
        (SampleSlice::F32(s), SampleSliceMut::I16(d)) => f32_to_i16(s, d),
        (SampleSlice::F32(s), SampleSliceMut::U16(d)) => f32_to_u16(s, d),
        (SampleSlice::I16(s), SampleSliceMut::F32(d)) => i16_to_f32(s, d),
        (SampleSlice::I16(s), SampleSliceMut::U16(d)) => i16_to_u16(s, d),
        (SampleSlice::U16(s), SampleSliceMut::F32(d)) => u16_to_f32(s, d),
        (SampleSlice::U16(s), SampleSliceMut::I16(d)) => u16_to_i16(s, d),
    }
}

/// Reorder channel-major planes into interleaved frames.
pub fn interleave<T: Copy>(src: &[T], dst: &mut [T], channels: usize, frames: usize) {
    debug_assert_eq!(src.len(), channels * frames);
    debug_assert_eq!(dst.len(), channels * frames);
    for ch in 0..channels {
        let plane = &src[ch * frames..(ch + 1) * frames];
        for (frame, &sample) in plane.iter().enumerate() {
            dst[frame * channels + ch] = sample;
        }
    }
}

/// Reorder interleaved frames into channel-major planes.
pub fn deinterleave<T: Copy>(src: &[T], dst: &mut [T], channels: usize, frames: usize) {
    debug_assert_eq!(src.len(), channels * frames);
    debug_assert_eq!(dst.len(), channels * frames);
    for ch in 0..channels {
        let plane = &mut dst[ch * frames..(ch + 1) * frames];
        for (frame, sample) in plane.iter_mut().enumerate() {
            *sample = src[frame * channels + ch];
        }
    }
}
